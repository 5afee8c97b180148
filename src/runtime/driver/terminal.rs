use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use thiserror::Error;

use crate::BreakpointError;
use crate::debounce::DeadlineScheduler;
use crate::runtime::{BreakpointEngine, WidthSource};

pub type DriverResult<T> = std::result::Result<T, DriverError>;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("engine error: {0}")]
    Engine(#[from] BreakpointError),
    #[error("terminal error: {0}")]
    Terminal(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Terminal column count as the width signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalWidth;

impl WidthSource for TerminalWidth {
    fn measure_width(&self) -> u32 {
        terminal::size().map(|(cols, _)| u32::from(cols)).unwrap_or(0)
    }
}

/// How long to block on input when no timer is armed.
const IDLE_POLL: Duration = Duration::from_millis(250);

/// Host loop wiring crossterm resize events and a wall-clock scheduler into a
/// [`BreakpointEngine`]. Evaluates once at startup so listeners learn the
/// initial breakpoint.
pub struct TerminalDriver {
    engine: BreakpointEngine,
    scheduler: DeadlineScheduler,
    idle_limit: Option<Duration>,
}

impl TerminalDriver {
    pub fn new(engine: BreakpointEngine) -> Self {
        Self {
            engine,
            scheduler: DeadlineScheduler::new(),
            idle_limit: None,
        }
    }

    /// Stop once nothing has happened for `limit` and no timer is pending.
    pub fn with_idle_limit(mut self, limit: Duration) -> Self {
        self.idle_limit = Some(limit);
        self
    }

    pub fn engine_mut(&mut self) -> &mut BreakpointEngine {
        &mut self.engine
    }

    /// Run until Esc / Ctrl-C (or the idle limit) and hand the engine back.
    pub fn run(mut self) -> DriverResult<BreakpointEngine> {
        terminal::enable_raw_mode().map_err(|err| DriverError::Terminal(err.to_string()))?;
        let result = self.run_inner();
        terminal::disable_raw_mode().ok();
        result?;
        Ok(self.engine)
    }

    fn run_inner(&mut self) -> DriverResult<()> {
        self.engine.evaluate_now();
        let mut last_activity = Instant::now();

        loop {
            let timeout = self
                .scheduler
                .time_until_next(Instant::now())
                .unwrap_or(IDLE_POLL);

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Resize(_, _) => {
                        self.engine.signal(&mut self.scheduler);
                        last_activity = Instant::now();
                    }
                    Event::Key(key) if is_exit_key(&key) => break,
                    _ => {}
                }
            }

            for handle in self.scheduler.take_due(Instant::now()) {
                if self.engine.timer_fired(handle).is_some() {
                    last_activity = Instant::now();
                }
            }

            if let Some(limit) = self.idle_limit {
                if !self.engine.is_pending() && last_activity.elapsed() >= limit {
                    break;
                }
            }
        }

        self.engine.release_timer(&mut self.scheduler);
        self.engine.emit_metrics();
        Ok(())
    }
}

fn is_exit_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_keys() {
        assert!(is_exit_key(&KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(is_exit_key(&KeyEvent::new(
            KeyCode::Char('c'),
            KeyModifiers::CONTROL
        )));
        assert!(!is_exit_key(&KeyEvent::new(
            KeyCode::Char('c'),
            KeyModifiers::NONE
        )));
    }
}
