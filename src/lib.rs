//! Viewport breakpoint tracking with debounced change notifications.
//!
//! A [`BreakpointEngine`] resolves a width into the largest configured
//! threshold not exceeding it and fans out to the listeners registered for
//! that breakpoint whenever the active bucket changes. Raw resize signals are
//! debounced through a host supplied [`TimerScheduler`].

pub mod debounce;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod runtime;
pub mod table;

pub use debounce::{
    DeadlineScheduler, DebounceState, Debouncer, ManualScheduler, SignalOutcome, TimerHandle,
    TimerScheduler,
};
pub use error::{BreakpointError, ConfigError, ListenerError, Result};
pub use logging::{
    FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult,
    MemorySink,
};
pub use metrics::{EngineMetrics, MetricSnapshot};
pub use registry::{
    BreakpointChange, FanOutReport, Listener, ListenerContext, ListenerFailure, ListenerHandle,
    ListenerRegistry, ListenerResult,
};
pub use runtime::audit::{AuditEvent, AuditStage, EngineAudit, NullAudit, RecordingAudit};
pub use runtime::config::{
    BreakpointConfig, DEFAULT_BREAKPOINTS, DEFAULT_DELAY_MS, DEFAULT_QUEUE_CAPACITY,
    RuntimeConfig,
};
pub use runtime::driver::terminal::{DriverError, DriverResult, TerminalDriver, TerminalWidth};
pub use runtime::queue::{DeferredAction, DeferredQueue, DrainReport};
pub use runtime::{BreakpointEngine, Evaluation, WidthSource};
pub use table::{ActiveState, BreakpointId, BreakpointTable, Threshold, Transition};
