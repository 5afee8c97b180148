//! Lifecycle audit hooks.
//!
//! Records capture a stage plus structured details so callers can buffer or
//! assert on the engine's progression without parsing log lines.

use std::sync::Mutex;
use std::time::SystemTime;

use serde_json::Value;

/// Checkpoints emitted by `BreakpointEngine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStage {
    EngineConstructed,
    /// A raw resize signal arrived.
    SignalReceived,
    TimerArmed,
    /// A pending timer was replaced by a newer signal.
    TimerCanceled,
    /// Width was resolved, whether or not the bucket changed.
    Evaluated,
    BreakpointChanged,
    ListenerFailed,
    /// The pre-construction queue was drained into the engine.
    QueueDrained,
}

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub timestamp: SystemTime,
    pub stage: AuditStage,
    pub details: Vec<(String, Value)>,
}

impl AuditEvent {
    pub fn new(stage: AuditStage) -> Self {
        Self {
            timestamp: SystemTime::now(),
            stage,
            details: Vec::new(),
        }
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.push((key.into(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.details
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }
}

pub trait EngineAudit: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Default no-op implementation used when auditing is disabled.
#[derive(Debug, Default)]
pub struct NullAudit;

impl EngineAudit for NullAudit {
    fn record(&self, _event: AuditEvent) {}
}

/// Buffers every event in memory.
#[derive(Debug, Default)]
pub struct RecordingAudit {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn stages(&self) -> Vec<AuditStage> {
        self.events().iter().map(|event| event.stage).collect()
    }

    pub fn count(&self, stage: AuditStage) -> usize {
        self.events()
            .iter()
            .filter(|event| event.stage == stage)
            .count()
    }
}

impl EngineAudit for RecordingAudit {
    fn record(&self, event: AuditEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}
