mod core;

pub(crate) use self::core::panic_message;
pub use self::core::{
    BreakpointChange, FanOutReport, Listener, ListenerContext, ListenerFailure, ListenerHandle,
    ListenerRegistry, ListenerResult,
};
