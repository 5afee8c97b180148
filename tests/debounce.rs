use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use breakpoints::{
    AuditStage, BreakpointConfig, BreakpointEngine, DeferredQueue, LogLevel, Logger,
    ManualScheduler, MemorySink, RecordingAudit, RuntimeConfig,
};

struct Harness {
    engine: BreakpointEngine,
    scheduler: ManualScheduler,
    width: Arc<AtomicU32>,
    evaluated_at: Vec<Duration>,
}

impl Harness {
    fn new(runtime: RuntimeConfig) -> Self {
        let width = Arc::new(AtomicU32::new(500));
        let config = BreakpointConfig::with_prefix("bp").delay_ms(50);
        let source = Arc::clone(&width);
        let engine = BreakpointEngine::with_runtime_config(&config, runtime, move || {
            source.load(Ordering::SeqCst)
        })
        .unwrap();
        Self {
            engine,
            scheduler: ManualScheduler::new(),
            width,
            evaluated_at: Vec::new(),
        }
    }

    fn resize(&mut self, width: u32) {
        self.width.store(width, Ordering::SeqCst);
        self.engine.signal(&mut self.scheduler);
    }

    fn advance(&mut self, ms: u64) {
        for handle in self.scheduler.advance(Duration::from_millis(ms)) {
            if self.engine.timer_fired(handle).is_some() {
                self.evaluated_at.push(self.scheduler.now());
            }
        }
    }
}

#[test]
fn burst_of_signals_coalesces_into_one_evaluation() {
    let mut harness = Harness::new(RuntimeConfig::default());
    for step in 0..10 {
        harness.resize(700 + step * 10);
        harness.advance(5);
    }
    // Last signal landed at t=45ms.
    harness.advance(44);
    assert!(harness.evaluated_at.is_empty());
    harness.advance(1);
    assert_eq!(harness.evaluated_at, vec![Duration::from_millis(95)]);
    assert_eq!(harness.engine.evaluation_count(), 1);
    assert_eq!(harness.scheduler.pending(), 0);

    let snapshot = harness.engine.metrics_snapshot();
    assert_eq!(snapshot.signals, 10);
    assert_eq!(snapshot.timers_canceled, 9);
}

#[test]
fn continuous_resizing_never_evaluates_until_quiet() {
    let mut harness = Harness::new(RuntimeConfig::default());
    for _ in 0..100 {
        harness.resize(900);
        harness.advance(40);
    }
    assert!(harness.evaluated_at.is_empty());
    harness.advance(10);
    assert_eq!(harness.evaluated_at.len(), 1);
    assert_eq!(harness.engine.current(), Some(768));
}

#[test]
fn separate_bursts_evaluate_separately() {
    let mut harness = Harness::new(RuntimeConfig::default());
    let fired = Arc::new(Mutex::new(Vec::new()));
    for id in ["bp0", "bp992"] {
        let fired = Arc::clone(&fired);
        harness
            .engine
            .on(id, move |_, change| {
                fired.lock().unwrap().push(change.id.clone());
                Ok(())
            })
            .unwrap();
    }

    harness.resize(300);
    harness.advance(60);
    harness.resize(1000);
    harness.advance(60);
    assert_eq!(*fired.lock().unwrap(), vec!["bp0", "bp992"]);
}

#[test]
fn release_timer_drops_pending_evaluation() {
    let mut harness = Harness::new(RuntimeConfig::default());
    harness.resize(800);
    assert!(harness.engine.is_pending());
    harness.engine.release_timer(&mut harness.scheduler);
    harness.advance(100);
    assert!(harness.evaluated_at.is_empty());
}

#[test]
fn logs_and_audit_follow_the_lifecycle() {
    let sink = Arc::new(MemorySink::new());
    let audit = Arc::new(RecordingAudit::new());
    let runtime = RuntimeConfig::default()
        .with_logger(Logger::from_shared(sink.clone()).with_min_level(LogLevel::Debug))
        .with_audit(audit.clone());
    let mut harness = Harness::new(runtime);
    harness
        .engine
        .on("bp768", |_, _| Err("boom".into()))
        .unwrap();

    harness.resize(800);
    harness.resize(810);
    harness.advance(50);
    harness.engine.emit_metrics();

    let messages = sink.messages();
    assert_eq!(
        messages,
        vec![
            "engine_constructed",
            "breakpoint_changed",
            "listener_failed",
            "engine_metrics",
        ]
    );
    let failed = sink
        .events()
        .into_iter()
        .find(|event| event.message == "listener_failed")
        .unwrap();
    assert_eq!(failed.level, LogLevel::Warn);

    assert_eq!(audit.count(AuditStage::SignalReceived), 2);
    assert_eq!(audit.count(AuditStage::TimerCanceled), 1);
    assert_eq!(audit.count(AuditStage::BreakpointChanged), 1);
    assert_eq!(audit.count(AuditStage::ListenerFailed), 1);
    assert_eq!(audit.stages()[0], AuditStage::EngineConstructed);
}

#[test]
fn deferred_registrations_see_the_first_evaluation() {
    let fired = Arc::new(Mutex::new(Vec::new()));
    let mut queue = DeferredQueue::new();
    {
        let fired = Arc::clone(&fired);
        queue
            .push(move |engine| {
                engine.on("bp0", move |_, change| {
                    fired.lock().unwrap().push(change.width);
                    Ok(())
                })?;
                Ok(())
            })
            .unwrap();
    }

    let audit = Arc::new(RecordingAudit::new());
    let mut harness = Harness::new(RuntimeConfig::default().with_audit(audit.clone()));
    let report = queue.drain(&mut harness.engine);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(audit.count(AuditStage::QueueDrained), 1);

    harness.engine.evaluate_now();
    assert_eq!(*fired.lock().unwrap(), vec![500]);
}
