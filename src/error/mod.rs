mod types;

pub use self::types::{BreakpointError, ConfigError, ListenerError, Result};
