use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::logging::Logger;
use crate::table::{BreakpointTable, Threshold};

use super::audit::{EngineAudit, NullAudit};

pub const DEFAULT_BREAKPOINTS: [Threshold; 4] = [0, 768, 992, 1200];
pub const DEFAULT_DELAY_MS: u64 = 50;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Serializable configuration snapshot. Omitted keys fall back to the
/// defaults; `id_prefix` has none and must be supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakpointConfig {
    pub breakpoints: Vec<Threshold>,
    #[serde(alias = "idPrefix", alias = "variableName")]
    pub id_prefix: Option<String>,
    #[serde(alias = "delay")]
    pub delay_ms: u64,
}

impl Default for BreakpointConfig {
    fn default() -> Self {
        Self {
            breakpoints: DEFAULT_BREAKPOINTS.to_vec(),
            id_prefix: None,
            delay_ms: DEFAULT_DELAY_MS,
        }
    }
}

impl BreakpointConfig {
    /// Default breakpoints and delay with the given prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            id_prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    pub fn breakpoints(mut self, breakpoints: Vec<Threshold>) -> Self {
        self.breakpoints = breakpoints;
        self
    }

    pub fn delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::InvalidJson(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check everything engine construction checks: a non-empty prefix and a
    /// non-empty, duplicate-free breakpoint list.
    pub fn validate(&self) -> Result<(), ConfigError> {
        BreakpointTable::configure(&self.breakpoints, self.id_prefix()?).map(|_| ())
    }

    pub fn id_prefix(&self) -> Result<&str, ConfigError> {
        match self.id_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => Ok(prefix),
            _ => Err(ConfigError::MissingIdPrefix),
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Non-serializable knobs: where logs, metrics and audit records go.
#[derive(Clone)]
pub struct RuntimeConfig {
    pub logger: Option<Logger>,
    pub audit: Arc<dyn EngineAudit>,
    /// Target used when emitting metrics snapshots.
    pub metrics_target: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            logger: None,
            audit: Arc::new(NullAudit),
            metrics_target: "breakpoints::engine.metrics".to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn EngineAudit>) -> Self {
        self.audit = audit;
        self
    }
}
