use std::collections::HashSet;

use crate::error::ConfigError;

/// Lower bound of a breakpoint, in pixels (or terminal columns).
pub type Threshold = u32;

/// Listener bucket key derived from the id prefix and a threshold.
pub type BreakpointId = String;

/// Current and previous resolved thresholds. `None` means no threshold matched
/// (or nothing has been evaluated yet).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveState {
    pub current: Option<Threshold>,
    pub previous: Option<Threshold>,
}

/// Outcome of observing a width that moved the table to a different bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Option<Threshold>,
    pub to: Option<Threshold>,
}

/// Descending table of thresholds plus the active bucket.
#[derive(Debug, Clone)]
pub struct BreakpointTable {
    thresholds: Vec<Threshold>,
    ids: Vec<BreakpointId>,
    prefix: String,
    state: ActiveState,
}

impl BreakpointTable {
    /// Build a table from an unordered threshold list.
    ///
    /// Duplicates are rejected: a second copy of a threshold would share the
    /// first one's id and could never be resolved.
    pub fn configure(
        thresholds: &[Threshold],
        id_prefix: &str,
    ) -> std::result::Result<Self, ConfigError> {
        if id_prefix.is_empty() {
            return Err(ConfigError::MissingIdPrefix);
        }
        if thresholds.is_empty() {
            return Err(ConfigError::EmptyThresholds);
        }

        let mut seen = HashSet::with_capacity(thresholds.len());
        for &threshold in thresholds {
            if !seen.insert(threshold) {
                return Err(ConfigError::DuplicateThreshold(threshold));
            }
        }

        let mut sorted = thresholds.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        let ids = sorted
            .iter()
            .map(|threshold| format_id(id_prefix, *threshold))
            .collect();

        Ok(Self {
            thresholds: sorted,
            ids,
            prefix: id_prefix.to_string(),
            state: ActiveState::default(),
        })
    }

    /// Largest threshold not exceeding `width`.
    pub fn resolve(&self, width: u32) -> Option<Threshold> {
        self.thresholds
            .iter()
            .copied()
            .find(|threshold| *threshold <= width)
    }

    pub fn id_for(&self, threshold: Threshold) -> BreakpointId {
        format_id(&self.prefix, threshold)
    }

    /// Resolve `width` and roll the active state forward.
    ///
    /// Returns a transition only when the resolved threshold differs from the
    /// previous one. Widths sitting exactly on a boundary are not smoothed: a
    /// signal alternating between 767 and 768 toggles every time.
    pub fn observe(&mut self, width: u32) -> Option<Transition> {
        let resolved = self.resolve(width);
        self.state.current = resolved;
        if resolved == self.state.previous {
            return None;
        }
        let transition = Transition {
            from: self.state.previous,
            to: resolved,
        };
        self.state.previous = resolved;
        Some(transition)
    }

    pub fn state(&self) -> ActiveState {
        self.state
    }

    pub fn current(&self) -> Option<Threshold> {
        self.state.current
    }

    pub fn previous(&self) -> Option<Threshold> {
        self.state.previous
    }

    /// Thresholds, greatest first.
    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    /// Ids in the same order as [`thresholds`](Self::thresholds).
    pub fn ids(&self) -> &[BreakpointId] {
        &self.ids
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.ids.iter().any(|known| known == id)
    }
}

fn format_id(prefix: &str, threshold: Threshold) -> BreakpointId {
    format!("{prefix}{threshold}")
}
