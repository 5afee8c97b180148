use crate::logging::{LogEvent, LogLevel, json_kv};
use std::time::Duration;

/// Counters accumulated by the engine over its lifetime.
#[derive(Debug, Default, Clone)]
pub struct EngineMetrics {
    signals: u64,
    timers_armed: u64,
    timers_canceled: u64,
    stale_timers: u64,
    evaluations: u64,
    transitions: u64,
    listener_calls: u64,
    listener_failures: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_signal(&mut self, canceled_previous: bool) {
        self.signals = self.signals.saturating_add(1);
        self.timers_armed = self.timers_armed.saturating_add(1);
        if canceled_previous {
            self.timers_canceled = self.timers_canceled.saturating_add(1);
        }
    }

    pub fn record_stale_timer(&mut self) {
        self.stale_timers = self.stale_timers.saturating_add(1);
    }

    pub fn record_evaluation(&mut self, changed: bool) {
        self.evaluations = self.evaluations.saturating_add(1);
        if changed {
            self.transitions = self.transitions.saturating_add(1);
        }
    }

    pub fn record_fan_out(&mut self, invoked: usize, failed: usize) {
        self.listener_calls = self.listener_calls.saturating_add(invoked as u64);
        self.listener_failures = self.listener_failures.saturating_add(failed as u64);
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            signals: self.signals,
            timers_armed: self.timers_armed,
            timers_canceled: self.timers_canceled,
            stale_timers: self.stale_timers,
            evaluations: self.evaluations,
            transitions: self.transitions,
            listener_calls: self.listener_calls,
            listener_failures: self.listener_failures,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub signals: u64,
    pub timers_armed: u64,
    pub timers_canceled: u64,
    pub stale_timers: u64,
    pub evaluations: u64,
    pub transitions: u64,
    pub listener_calls: u64,
    pub listener_failures: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(
            LogLevel::Info,
            target,
            "engine_metrics",
            [
                json_kv("uptime_ms", self.uptime_ms),
                json_kv("signals", self.signals),
                json_kv("timers_armed", self.timers_armed),
                json_kv("timers_canceled", self.timers_canceled),
                json_kv("stale_timers", self.stale_timers),
                json_kv("evaluations", self.evaluations),
                json_kv("transitions", self.transitions),
                json_kv("listener_calls", self.listener_calls),
                json_kv("listener_failures", self.listener_failures),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn counters_accumulate() {
        let mut metrics = EngineMetrics::new();
        metrics.record_signal(false);
        metrics.record_signal(true);
        metrics.record_evaluation(true);
        metrics.record_evaluation(false);
        metrics.record_fan_out(3, 1);

        let snapshot = metrics.snapshot(Duration::from_millis(120));
        assert_eq!(snapshot.signals, 2);
        assert_eq!(snapshot.timers_canceled, 1);
        assert_eq!(snapshot.evaluations, 2);
        assert_eq!(snapshot.transitions, 1);
        assert_eq!(snapshot.listener_failures, 1);

        let event = snapshot.to_log_event("breakpoints::engine.metrics");
        assert_eq!(event.field("listener_calls"), Some(&json!(3)));
        assert_eq!(event.field("uptime_ms"), Some(&json!(120)));
    }
}
