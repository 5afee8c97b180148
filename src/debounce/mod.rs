//! Debounce state machine and the timer primitives it drives.
//!
//! The engine never sleeps. A raw signal arms a one-shot timer through a
//! [`TimerScheduler`]; the host reports expiry back with the returned
//! [`TimerHandle`]. Every new signal cancels the outstanding timer first, so a
//! continuously resizing viewport produces no evaluation until it settles.

mod core;
mod scheduler;

pub use self::core::{DebounceState, Debouncer, SignalOutcome};
pub use self::scheduler::{DeadlineScheduler, ManualScheduler, TimerHandle, TimerScheduler};
