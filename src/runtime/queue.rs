use std::panic::{self, AssertUnwindSafe};

use serde_json::json;

use crate::logging::{LogLevel, json_kv};
use crate::registry::panic_message;
use crate::{BreakpointError, Result};

use super::BreakpointEngine;
use super::audit::{AuditEvent, AuditStage};
use super::config::DEFAULT_QUEUE_CAPACITY;

pub type DeferredAction = Box<dyn FnOnce(&mut BreakpointEngine) -> Result<()>>;

/// Actions collected before the engine exists, typically early listener
/// registrations from code that loads ahead of the host.
pub struct DeferredQueue {
    actions: Vec<DeferredAction>,
    capacity: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub executed: usize,
    pub failed: Vec<String>,
}

impl DrainReport {
    pub fn succeeded(&self) -> usize {
        self.executed - self.failed.len()
    }
}

impl Default for DeferredQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            actions: Vec::new(),
            capacity,
        }
    }

    pub fn push<F>(&mut self, action: F) -> Result<()>
    where
        F: FnOnce(&mut BreakpointEngine) -> Result<()> + 'static,
    {
        if self.actions.len() >= self.capacity {
            return Err(BreakpointError::QueueFull {
                capacity: self.capacity,
            });
        }
        self.actions.push(Box::new(action));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Run every queued action against `engine`, in push order. An action
    /// that errors or panics is recorded and the drain moves on.
    pub fn drain(self, engine: &mut BreakpointEngine) -> DrainReport {
        let mut report = DrainReport::default();
        for (index, action) in self.actions.into_iter().enumerate() {
            report.executed += 1;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| action(&mut *engine)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err.to_string(),
                Err(payload) => panic_message(payload.as_ref()),
            };
            engine.log(
                LogLevel::Warn,
                "deferred_action_failed",
                [json_kv("index", index), json_kv("error", message.as_str())],
            );
            report.failed.push(message);
        }

        engine.log(
            LogLevel::Debug,
            "queue_drained",
            [
                json_kv("executed", report.executed),
                json_kv("failed", report.failed.len()),
            ],
        );
        engine.audit(
            AuditEvent::new(AuditStage::QueueDrained)
                .detail("executed", json!(report.executed))
                .detail("failed", json!(report.failed.len())),
        );
        report
    }
}
