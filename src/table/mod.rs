mod core;

pub use self::core::{ActiveState, BreakpointId, BreakpointTable, Threshold, Transition};
