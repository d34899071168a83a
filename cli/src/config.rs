//! Settings file for the `repoguard` binary.
//!
//! ```toml
//! database = "forge.db"
//! busy_timeout_ms = 2000
//! policy = "roles.toml"
//! token_ttl_secs = 300
//! evaluator_time_limit_ms = 1000
//! ```
//!
//! Every key is optional. Command-line flags take precedence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use repoguard_contracts::error::{AuthzError, AuthzResult};
use repoguard_biscuit::DEFAULT_TIME_LIMIT;
use repoguard_store::DEFAULT_BUSY_TIMEOUT;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// SQLite database to read relationships from. Without one the built-in
    /// forge is served from memory.
    pub database: Option<PathBuf>,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Role table TOML. Without one the standard table is used.
    pub policy: Option<PathBuf>,
    /// Issue a credential valid for this many seconds and have the biscuit
    /// evaluator confirm every verdict.
    pub token_ttl_secs: Option<u64>,
    /// Base wall-clock budget for one evaluator run. Larger fact sets get
    /// more on top of it.
    #[serde(default = "default_evaluator_time_limit_ms")]
    pub evaluator_time_limit_ms: u64,
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT.as_millis() as u64
}

fn default_evaluator_time_limit_ms() -> u64 {
    DEFAULT_TIME_LIMIT.as_millis() as u64
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            policy: None,
            token_ttl_secs: None,
            evaluator_time_limit_ms: default_evaluator_time_limit_ms(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(s: &str) -> AuthzResult<Self> {
        toml::from_str(s).map_err(|e| AuthzError::ConfigError {
            reason: format!("failed to parse settings: {}", e),
        })
    }

    pub fn from_file(path: &Path) -> AuthzResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| AuthzError::ConfigError {
            reason: format!("failed to read settings '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Settings from `path`, or the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> AuthzResult<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::from_file)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn evaluator_time_limit(&self) -> Duration {
        Duration::from_millis(self.evaluator_time_limit_ms)
    }
}
