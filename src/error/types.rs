use thiserror::Error;

use crate::table::BreakpointId;

/// Unified result type for the breakpoints crate.
pub type Result<T> = std::result::Result<T, BreakpointError>;

/// Errors surfaced by the breakpoint engine.
#[derive(Debug, Error)]
pub enum BreakpointError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("breakpoint `{0}` is not configured")]
    UnknownBreakpoint(BreakpointId),
    #[error("deferred queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Invalid construction input. Raised before any engine state exists.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("breakpoint list is empty")]
    EmptyThresholds,
    #[error("missing id prefix")]
    MissingIdPrefix,
    #[error("breakpoint {0} is configured more than once")]
    DuplicateThreshold(u32),
    #[error("invalid configuration json: {0}")]
    InvalidJson(String),
}

/// A listener that failed during fan-out. Never propagated past the
/// registry; collected into the fan-out report instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("listener #{listener} for `{id}` failed: {message}")]
pub struct ListenerError {
    pub id: BreakpointId,
    pub listener: u64,
    pub message: String,
}

impl ListenerError {
    pub fn new(id: impl Into<BreakpointId>, listener: u64, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            listener,
            message: message.into(),
        }
    }
}
