use std::time::{Duration, Instant};

/// Identifies one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Minimal "run once after delay, cancelable" primitive supplied by the host.
pub trait TimerScheduler {
    fn schedule_once(&mut self, delay: Duration) -> TimerHandle;

    fn cancel(&mut self, handle: TimerHandle);
}

/// Virtual-clock scheduler. Time only moves through [`advance`](Self::advance).
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    next_id: u64,
    timers: Vec<(TimerHandle, Duration)>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elapsed virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.iter().map(|(_, deadline)| *deadline).min()
    }

    /// Move the clock forward and return the timers that came due, earliest
    /// deadline first.
    pub fn advance(&mut self, by: Duration) -> Vec<TimerHandle> {
        self.now += by;
        let now = self.now;
        let (mut due, keep): (Vec<_>, Vec<_>) = self
            .timers
            .drain(..)
            .partition(|(_, deadline)| *deadline <= now);
        self.timers = keep;
        due.sort_by_key(|(handle, deadline)| (*deadline, *handle));
        due.into_iter().map(|(handle, _)| handle).collect()
    }
}

impl TimerScheduler for ManualScheduler {
    fn schedule_once(&mut self, delay: Duration) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.timers.push((handle, self.now + delay));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.timers.retain(|(armed, _)| *armed != handle);
    }
}

/// Wall-clock scheduler for hosts that own a poll loop.
#[derive(Debug, Default)]
pub struct DeadlineScheduler {
    next_id: u64,
    timers: Vec<(TimerHandle, Instant)>,
}

impl DeadlineScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer relative to an explicit instant.
    pub fn schedule_from(&mut self, now: Instant, delay: Duration) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.timers.push((handle, now + delay));
        handle
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().map(|(_, deadline)| *deadline).min()
    }

    /// Time left until the earliest deadline, saturating at zero.
    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    pub fn take_due(&mut self, now: Instant) -> Vec<TimerHandle> {
        let (mut due, keep): (Vec<_>, Vec<_>) = self
            .timers
            .drain(..)
            .partition(|(_, deadline)| *deadline <= now);
        self.timers = keep;
        due.sort_by_key(|(handle, deadline)| (*deadline, *handle));
        due.into_iter().map(|(handle, _)| handle).collect()
    }
}

impl TimerScheduler for DeadlineScheduler {
    fn schedule_once(&mut self, delay: Duration) -> TimerHandle {
        self.schedule_from(Instant::now(), delay)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.timers.retain(|(armed, _)| *armed != handle);
    }
}
