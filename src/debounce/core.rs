use std::time::Duration;

use super::scheduler::{TimerHandle, TimerScheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Pending(TimerHandle),
}

/// What a raw signal did to the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalOutcome {
    pub armed: TimerHandle,
    pub canceled: Option<TimerHandle>,
}

/// Two-state debounce driver owning at most one pending timer.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: DebounceState::Idle,
        }
    }

    /// Restart the quiet window: cancel whatever is pending and arm a fresh
    /// timer for the full delay.
    pub fn signal(&mut self, scheduler: &mut dyn TimerScheduler) -> SignalOutcome {
        let canceled = match self.state {
            DebounceState::Pending(handle) => {
                scheduler.cancel(handle);
                Some(handle)
            }
            DebounceState::Idle => None,
        };
        let armed = scheduler.schedule_once(self.delay);
        self.state = DebounceState::Pending(armed);
        SignalOutcome { armed, canceled }
    }

    /// Accept a timer expiry. Returns true when `handle` is the pending timer,
    /// in which case the driver is back to idle and the caller must evaluate.
    /// Stale handles leave the state untouched.
    pub fn fire(&mut self, handle: TimerHandle) -> bool {
        match self.state {
            DebounceState::Pending(pending) if pending == handle => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Cancel the pending timer, if any.
    pub fn release(&mut self, scheduler: &mut dyn TimerScheduler) -> Option<TimerHandle> {
        match std::mem::replace(&mut self.state, DebounceState::Idle) {
            DebounceState::Pending(handle) => {
                scheduler.cancel(handle);
                Some(handle)
            }
            DebounceState::Idle => None,
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, DebounceState::Pending(_))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}
