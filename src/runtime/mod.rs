use std::time::{Duration, Instant};

use serde_json::{Value, json};

use crate::debounce::{Debouncer, SignalOutcome, TimerHandle, TimerScheduler};
use crate::logging::{LogEvent, LogLevel, json_kv};
use crate::metrics::{EngineMetrics, MetricSnapshot};
use crate::registry::{
    BreakpointChange, FanOutReport, Listener, ListenerContext, ListenerHandle, ListenerRegistry,
    ListenerResult,
};
use crate::table::{ActiveState, BreakpointId, BreakpointTable, Threshold, Transition};
use crate::{BreakpointError, Result};

pub mod audit;
pub mod config;
pub mod driver;
pub mod queue;

use audit::{AuditEvent, AuditStage};
use config::{BreakpointConfig, RuntimeConfig};

const LOG_TARGET: &str = "breakpoints::engine";

/// Environment query returning the current viewport width.
pub trait WidthSource {
    fn measure_width(&self) -> u32;
}

impl<F> WidthSource for F
where
    F: Fn() -> u32,
{
    fn measure_width(&self) -> u32 {
        self()
    }
}

/// Result of one resolution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub width: u32,
    pub resolved: Option<Threshold>,
    /// Set when the bucket differs from the previous evaluation.
    pub transition: Option<Transition>,
    /// Payload delivered to listeners, if a fan-out happened.
    pub fired: Option<BreakpointChange>,
    pub report: FanOutReport,
}

impl Evaluation {
    pub fn changed(&self) -> bool {
        self.transition.is_some()
    }

    pub fn fired_id(&self) -> Option<&str> {
        self.fired.as_ref().map(|change| change.id.as_str())
    }
}

/// Owns the breakpoint table, the listener registry and the debounce timer.
///
/// All methods run to completion on the caller's thread. The host feeds raw
/// resize signals through [`signal`](Self::signal) and timer expiries through
/// [`timer_fired`](Self::timer_fired).
pub struct BreakpointEngine {
    table: BreakpointTable,
    registry: ListenerRegistry,
    debouncer: Debouncer,
    width: Box<dyn WidthSource>,
    runtime: RuntimeConfig,
    metrics: EngineMetrics,
    started_at: Instant,
}

impl std::fmt::Debug for BreakpointEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakpointEngine")
            .field("table", &self.table)
            .field("debouncer", &self.debouncer)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl BreakpointEngine {
    pub fn new<W>(config: &BreakpointConfig, width: W) -> Result<Self>
    where
        W: WidthSource + 'static,
    {
        Self::with_runtime_config(config, RuntimeConfig::default(), width)
    }

    pub fn with_runtime_config<W>(
        config: &BreakpointConfig,
        runtime: RuntimeConfig,
        width: W,
    ) -> Result<Self>
    where
        W: WidthSource + 'static,
    {
        let prefix = config.id_prefix()?;
        let table = BreakpointTable::configure(&config.breakpoints, prefix)?;
        let registry = ListenerRegistry::initialize(table.ids().iter().cloned());

        let engine = Self {
            table,
            registry,
            debouncer: Debouncer::new(config.delay()),
            width: Box::new(width),
            runtime,
            metrics: EngineMetrics::new(),
            started_at: Instant::now(),
        };

        let thresholds: Vec<Value> = engine.table.thresholds().iter().map(|t| json!(t)).collect();
        engine.log(
            LogLevel::Info,
            "engine_constructed",
            [
                json_kv("prefix", prefix),
                json_kv("thresholds", thresholds.clone()),
                json_kv("delay_ms", config.delay_ms),
            ],
        );
        engine.audit(
            AuditEvent::new(AuditStage::EngineConstructed)
                .detail("prefix", prefix)
                .detail("thresholds", thresholds),
        );
        Ok(engine)
    }

    pub fn register<F>(&mut self, id: &str, listener: F) -> Result<ListenerHandle>
    where
        F: Fn(&mut ListenerContext<'_>, &BreakpointChange) -> ListenerResult + 'static,
    {
        self.registry.register(id, listener)
    }

    /// Alias of [`register`](Self::register).
    pub fn on<F>(&mut self, id: &str, listener: F) -> Result<ListenerHandle>
    where
        F: Fn(&mut ListenerContext<'_>, &BreakpointChange) -> ListenerResult + 'static,
    {
        self.register(id, listener)
    }

    pub fn register_shared(&mut self, id: &str, listener: Listener) -> Result<ListenerHandle> {
        self.registry.register_shared(id, listener)
    }

    /// Register a listener on the breakpoint starting at `threshold`.
    pub fn register_threshold<F>(
        &mut self,
        threshold: Threshold,
        listener: F,
    ) -> Result<ListenerHandle>
    where
        F: Fn(&mut ListenerContext<'_>, &BreakpointChange) -> ListenerResult + 'static,
    {
        let id = self.table.id_for(threshold);
        self.registry.register(&id, listener)
    }

    pub fn remove(&mut self, handle: ListenerHandle) -> bool {
        self.registry.remove(handle)
    }

    /// Raw resize notification. Restarts the debounce window.
    pub fn signal(&mut self, scheduler: &mut dyn TimerScheduler) -> SignalOutcome {
        let outcome = self.debouncer.signal(scheduler);
        self.metrics.record_signal(outcome.canceled.is_some());
        self.audit(AuditEvent::new(AuditStage::SignalReceived));
        if let Some(canceled) = outcome.canceled {
            self.audit(
                AuditEvent::new(AuditStage::TimerCanceled).detail("timer", canceled.raw()),
            );
        }
        self.audit(AuditEvent::new(AuditStage::TimerArmed).detail("timer", outcome.armed.raw()));
        self.log(
            LogLevel::Trace,
            "timer_armed",
            [
                json_kv("timer", outcome.armed.raw()),
                json_kv("delay_ms", self.debouncer.delay().as_millis() as u64),
            ],
        );
        outcome
    }

    /// Timer expiry reported by the host. Stale handles (timers already
    /// replaced by a later signal) are ignored and return `None`.
    pub fn timer_fired(&mut self, handle: TimerHandle) -> Option<Evaluation> {
        if !self.debouncer.fire(handle) {
            self.metrics.record_stale_timer();
            self.log(
                LogLevel::Debug,
                "stale_timer_ignored",
                [json_kv("timer", handle.raw())],
            );
            return None;
        }
        Some(self.evaluate_now())
    }

    /// Measure the width and evaluate immediately, bypassing the debounce.
    pub fn evaluate_now(&mut self) -> Evaluation {
        let width = self.width.measure_width();
        self.evaluate_width(width)
    }

    /// Evaluate against an explicit width.
    pub fn evaluate_width(&mut self, width: u32) -> Evaluation {
        let transition = self.table.observe(width);
        let resolved = self.table.current();
        self.metrics.record_evaluation(transition.is_some());
        self.audit(
            AuditEvent::new(AuditStage::Evaluated)
                .detail("width", width)
                .detail("resolved", resolved),
        );

        let mut evaluation = Evaluation {
            width,
            resolved,
            transition,
            fired: None,
            report: FanOutReport::default(),
        };

        let Some(transition) = transition else {
            return evaluation;
        };

        self.log(
            LogLevel::Info,
            "breakpoint_changed",
            [
                json_kv("width", width),
                json_kv("from", transition.from),
                json_kv("to", transition.to),
            ],
        );
        self.audit(
            AuditEvent::new(AuditStage::BreakpointChanged)
                .detail("from", transition.from)
                .detail("to", transition.to),
        );

        // Falling below every threshold updates state but has no id to notify.
        let Some(threshold) = transition.to else {
            return evaluation;
        };

        let change = BreakpointChange {
            id: self.table.id_for(threshold),
            threshold,
            previous: transition.from,
            width,
        };
        let report = self.registry.fire(&change);
        self.metrics
            .record_fan_out(report.invoked, report.failures.len());
        for failure in &report.failures {
            self.log(
                LogLevel::Warn,
                "listener_failed",
                [
                    json_kv("id", failure.id.as_str()),
                    json_kv("listener", failure.listener),
                    json_kv("error", failure.message.as_str()),
                ],
            );
            self.audit(
                AuditEvent::new(AuditStage::ListenerFailed)
                    .detail("id", failure.id.as_str())
                    .detail("error", failure.message.as_str()),
            );
        }

        evaluation.fired = Some(change);
        evaluation.report = report;
        evaluation
    }

    /// Cancel the pending debounce timer, if any.
    pub fn release_timer(&mut self, scheduler: &mut dyn TimerScheduler) -> Option<TimerHandle> {
        self.debouncer.release(scheduler)
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn delay(&self) -> Duration {
        self.debouncer.delay()
    }

    pub fn state(&self) -> ActiveState {
        self.table.state()
    }

    pub fn current(&self) -> Option<Threshold> {
        self.table.current()
    }

    pub fn previous(&self) -> Option<Threshold> {
        self.table.previous()
    }

    pub fn current_id(&self) -> Option<BreakpointId> {
        self.table.current().map(|threshold| self.table.id_for(threshold))
    }

    pub fn table(&self) -> &BreakpointTable {
        &self.table
    }

    pub fn thresholds(&self) -> &[Threshold] {
        self.table.thresholds()
    }

    pub fn ids(&self) -> &[BreakpointId] {
        self.table.ids()
    }

    pub fn id_for(&self, threshold: Threshold) -> BreakpointId {
        self.table.id_for(threshold)
    }

    pub fn listener_count(&self, id: &str) -> usize {
        self.registry.listener_count(id)
    }

    /// Number of evaluations run so far, debounced or forced.
    pub fn evaluation_count(&self) -> u64 {
        self.metrics.evaluations()
    }

    pub fn metrics_snapshot(&self) -> MetricSnapshot {
        self.metrics.snapshot(self.started_at.elapsed())
    }

    /// Push a metrics snapshot through the configured logger.
    pub fn emit_metrics(&self) {
        if let Some(logger) = self.runtime.logger.as_ref() {
            let event = self
                .metrics_snapshot()
                .to_log_event(&self.runtime.metrics_target);
            let _ = logger.log_event(event);
        }
    }

    pub fn runtime_config_mut(&mut self) -> &mut RuntimeConfig {
        &mut self.runtime
    }

    /// Look up the configured id, failing like registration does.
    pub fn require_id(&self, id: &str) -> Result<()> {
        if self.registry.contains(id) {
            Ok(())
        } else {
            Err(BreakpointError::UnknownBreakpoint(id.to_string()))
        }
    }

    pub(crate) fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        if let Some(logger) = self.runtime.logger.as_ref() {
            if !logger.enabled(level) {
                return;
            }
            let event = LogEvent::with_fields(level, LOG_TARGET, message, fields);
            let _ = logger.log_event(event);
        }
    }

    pub(crate) fn audit(&self, event: AuditEvent) {
        self.runtime.audit.record(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debounce::ManualScheduler;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn engine_with_width(width: Arc<AtomicU32>) -> BreakpointEngine {
        let config = BreakpointConfig::with_prefix("bp");
        BreakpointEngine::new(&config, move || width.load(Ordering::SeqCst)).unwrap()
    }

    #[test]
    fn construction_requires_prefix() {
        let err = BreakpointEngine::new(&BreakpointConfig::default(), || 0u32).unwrap_err();
        assert!(matches!(
            err,
            BreakpointError::Config(crate::ConfigError::MissingIdPrefix)
        ));
    }

    #[test]
    fn construction_rejects_empty_breakpoints() {
        let config = BreakpointConfig::with_prefix("bp").breakpoints(Vec::new());
        let err = BreakpointEngine::new(&config, || 0u32).unwrap_err();
        assert!(matches!(
            err,
            BreakpointError::Config(crate::ConfigError::EmptyThresholds)
        ));
    }

    #[test]
    fn evaluate_now_fires_once_per_change() {
        let width = Arc::new(AtomicU32::new(800));
        let mut engine = engine_with_width(Arc::clone(&width));
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            engine
                .on("bp768", move |_, change| {
                    seen.lock().unwrap().push((change.width, change.previous));
                    Ok(())
                })
                .unwrap();
        }

        assert_eq!(engine.evaluate_now().fired_id(), Some("bp768"));
        assert!(!engine.evaluate_now().changed());
        assert_eq!(*seen.lock().unwrap(), vec![(800, None)]);
        assert_eq!(engine.evaluation_count(), 2);
        assert_eq!(engine.current_id().as_deref(), Some("bp768"));
    }

    #[test]
    fn stale_timer_is_ignored() {
        let mut engine = engine_with_width(Arc::new(AtomicU32::new(500)));
        let mut scheduler = ManualScheduler::new();
        let first = engine.signal(&mut scheduler);
        let second = engine.signal(&mut scheduler);

        assert!(engine.timer_fired(first.armed).is_none());
        assert!(engine.is_pending());
        let evaluation = engine.timer_fired(second.armed).unwrap();
        assert_eq!(evaluation.fired_id(), Some("bp0"));
        assert!(!engine.is_pending());
        assert_eq!(engine.metrics_snapshot().stale_timers, 1);
    }

    #[test]
    fn falling_below_all_thresholds_does_not_fan_out() {
        let config = BreakpointConfig::with_prefix("bp").breakpoints(vec![320, 768]);
        let mut engine = BreakpointEngine::new(&config, || 0u32).unwrap();
        engine.evaluate_width(400);
        let evaluation = engine.evaluate_width(100);
        assert!(evaluation.changed());
        assert!(evaluation.fired.is_none());
        assert_eq!(engine.current(), None);
        assert_eq!(engine.previous(), None);
    }

    #[test]
    fn register_threshold_uses_derived_id() {
        let mut engine = engine_with_width(Arc::new(AtomicU32::new(0)));
        engine.register_threshold(992, |_, _| Ok(())).unwrap();
        assert_eq!(engine.listener_count("bp992"), 1);
        assert!(engine.register_threshold(5, |_, _| Ok(())).is_err());
    }
}
