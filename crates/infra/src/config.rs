//! Recommendation settings.
//!
//! Loaded from defaults, then JSON (optional), then `STOCKFLOW_*` environment
//! variables. Every source goes through [`RecommendationConfig::validate`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_PREFIX: &str = "STOCKFLOW_";
pub const DEFAULT_HORIZON_DAYS: u32 = 30;
pub const DEFAULT_EXPIRY_WINDOW_DAYS: u32 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Used when a report request has a non-positive horizon.
    pub default_horizon_days: u32,
    /// Batches expiring within this many days of the report date count as expiring soon.
    pub expiry_window_days: u32,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            default_horizon_days: DEFAULT_HORIZON_DAYS,
            expiry_window_days: DEFAULT_EXPIRY_WINDOW_DAYS,
        }
    }
}

impl RecommendationConfig {
    pub fn with_default_horizon_days(mut self, days: u32) -> Self {
        self.default_horizon_days = days;
        self
    }

    pub fn with_expiry_window_days(mut self, days: u32) -> Self {
        self.expiry_window_days = days;
        self
    }

    /// Parse from JSON; missing fields keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `STOCKFLOW_DEFAULT_HORIZON_DAYS` and `STOCKFLOW_EXPIRY_WINDOW_DAYS`
    /// as returned by `lookup`.
    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(days) = read_days(&lookup, "DEFAULT_HORIZON_DAYS")? {
            self.default_horizon_days = days;
        }
        if let Some(days) = read_days(&lookup, "EXPIRY_WINDOW_DAYS")? {
            self.expiry_window_days = days;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_horizon_days == 0 {
            return Err(ConfigError::Invalid {
                key: "default_horizon_days".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Requested horizon if positive, the configured default otherwise.
    pub fn effective_horizon(&self, requested: i64) -> u32 {
        if requested > 0 {
            u32::try_from(requested).unwrap_or(u32::MAX)
        } else {
            self.default_horizon_days
        }
    }
}

fn read_days(lookup: &impl Fn(&str) -> Option<String>, suffix: &str) -> Result<Option<u32>, ConfigError> {
    let key = format!("{ENV_PREFIX}{suffix}");
    match lookup(&key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}
