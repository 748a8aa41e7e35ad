//! Engine tunables, loadable from a YAML file with per-field defaults.

use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use resolution_executor::StabilizePolicy;
use retry_controller::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read engine config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse engine config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// All tunables in one place. Every threshold that started life as an
/// ad-hoc literal lives here so deployments can adjust it without a
/// rebuild.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Heuristic proposals below this confidence go to the advisor.
    pub heuristic_confidence_cutoff: f64,
    /// Verification confidence required to call a resolution verified.
    pub verify_threshold: f64,
    /// Analyze/execute/verify cycles allowed per obstruction session.
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Learned-pattern cap before low-value eviction kicks in.
    pub pattern_cap: usize,
    pub event_log_cap: usize,
    /// Where the pattern store persists its JSON snapshot; in-memory
    /// only when unset.
    pub pattern_snapshot_path: Option<PathBuf>,
    pub stabilize_quiet_ms: u64,
    pub stabilize_cap_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            heuristic_confidence_cutoff: 0.7,
            verify_threshold: 0.6,
            max_retries: 3,
            base_backoff_ms: 500,
            max_backoff_ms: 10_000,
            pattern_cap: 256,
            event_log_cap: 500,
            pattern_snapshot_path: None,
            stabilize_quiet_ms: 500,
            stabilize_cap_ms: 3000,
        }
    }
}

impl EngineConfig {
    /// Load from a YAML file if the path exists; defaults otherwise.
    pub fn load_from_path(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)?;
        let config: Self = serde_yaml::from_str(&raw)?;
        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_backoff_ms: self.base_backoff_ms,
            max_backoff_ms: self.max_backoff_ms,
            ..RetryPolicy::default()
        }
    }

    pub fn stabilize_policy(&self) -> StabilizePolicy {
        StabilizePolicy {
            quiet_ms: self.stabilize_quiet_ms,
            cap_ms: self.stabilize_cap_ms,
            ..StabilizePolicy::default()
        }
    }
}
