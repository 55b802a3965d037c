//! Engine configuration
//!
//! Defaults shared by every adapter built at startup: cache TTL, fan-out
//! parallelism, tie-breaking weight, and an optional upstream rate limit.
//! Loaded from YAML; every field is optional.

use crate::adapter::DEFAULT_WEIGHT;
use crate::cancel::CancellationToken;
use crate::fetch::DEFAULT_MAX_PARALLEL;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default cache TTL: one hour
pub const DEFAULT_CACHE_DURATION_SECS: u64 = 3600;

/// Longest accepted cache TTL: one year
pub const MAX_CACHE_DURATION_SECS: u64 = 365 * 24 * 3600;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_cache_duration_secs() -> u64 {
    DEFAULT_CACHE_DURATION_SECS
}

fn default_max_parallel() -> usize {
    DEFAULT_MAX_PARALLEL
}

fn default_weight() -> i32 {
    DEFAULT_WEIGHT
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_cache_duration_secs")]
    pub cache_duration_secs: u64,
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    #[serde(default = "default_weight")]
    pub default_weight: i32,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_duration_secs: DEFAULT_CACHE_DURATION_SECS,
            max_parallel: DEFAULT_MAX_PARALLEL,
            default_weight: DEFAULT_WEIGHT,
            rate_limit: None,
        }
    }
}

impl EngineConfig {
    /// `<config dir>/overlook/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("overlook").join("config.yaml"))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load from the default path, falling back to defaults when the file
    /// does not exist. A file that exists but fails to parse is an error.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parallel == 0 {
            return Err(ConfigError::Invalid("max_parallel must be at least 1".to_string()));
        }
        if self.cache_duration_secs > MAX_CACHE_DURATION_SECS {
            return Err(ConfigError::Invalid(format!(
                "cache_duration_secs must be at most {}",
                MAX_CACHE_DURATION_SECS
            )));
        }
        if let Some(limit) = &self.rate_limit {
            if limit.max_capacity == 0 || limit.refill_rate == 0 {
                return Err(ConfigError::Invalid(
                    "rate_limit max_capacity and refill_rate must be at least 1".to_string(),
                ));
            }
            if limit.refill_duration_ms == 0 {
                return Err(ConfigError::Invalid(
                    "rate_limit refill_duration_ms must be at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn cache_duration(&self) -> Duration {
        Duration::from_secs(self.cache_duration_secs)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Start the configured rate limiter, if any. Needs a tokio runtime.
    pub fn start_rate_limiter(&self, cancel: CancellationToken) -> Option<Arc<RateLimiter>> {
        self.rate_limit.map(|limit| RateLimiter::start(limit, cancel))
    }
}
