//! Configuration Module
//!
//! Solver settings with defaults matching the reference dataset runs
//! (500€ budget, DP steps between 1€ and 20€). Settings can be read from
//! a TOML file and are then overridden by command line flags.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

fn default_budget() -> f64 {
    500.0
}

fn default_min_step_cents() -> u32 {
    100
}

fn default_max_step_cents() -> u32 {
    2000
}

fn default_true() -> bool {
    true
}

fn default_min_rate() -> f64 {
    0.05
}

fn default_time_limit_ms() -> Option<u64> {
    Some(820)
}

fn default_step_time_guard_ms() -> Option<u64> {
    Some(1000)
}

fn default_top() -> usize {
    10
}

fn default_max_brute_force_actions() -> usize {
    25
}

/// Solver and harness settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Maximum amount to invest, in euros
    #[serde(default = "default_budget")]
    pub budget: f64,
    /// Finest DP granularity tried, in cents
    #[serde(default = "default_min_step_cents")]
    pub min_step_cents: u32,
    /// Coarsest DP granularity tried, in cents
    #[serde(default = "default_max_step_cents")]
    pub max_step_cents: u32,
    #[serde(default = "default_true")]
    pub pre_filter: bool,
    /// Rates below this are dropped by the pre-filter
    #[serde(default = "default_min_rate")]
    pub min_rate: f64,
    #[serde(default = "default_true")]
    pub dedupe_same_cost: bool,
    /// Wall-clock budget for the whole step exploration
    #[serde(default = "default_time_limit_ms")]
    pub time_limit_ms: Option<u64>,
    /// A single step whose DP runs longer than this is discarded
    #[serde(default = "default_step_time_guard_ms")]
    pub step_time_guard_ms: Option<u64>,
    /// Thread count for step exploration (defaults to the CPU count)
    #[serde(default)]
    pub workers: Option<usize>,
    /// Number of ranked combinations kept by the brute force
    #[serde(default = "default_top")]
    pub top: usize,
    #[serde(default = "default_max_brute_force_actions")]
    pub max_brute_force_actions: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            budget: default_budget(),
            min_step_cents: default_min_step_cents(),
            max_step_cents: default_max_step_cents(),
            pre_filter: true,
            min_rate: default_min_rate(),
            dedupe_same_cost: true,
            time_limit_ms: default_time_limit_ms(),
            step_time_guard_ms: default_step_time_guard_ms(),
            workers: None,
            top: default_top(),
            max_brute_force_actions: default_max_brute_force_actions(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file. Missing keys take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.budget <= 0.0 || !self.budget.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "budget must be a positive amount, got {}",
                self.budget
            )));
        }
        if self.min_step_cents == 0 {
            return Err(ConfigError::Invalid("min_step_cents must be at least 1".to_string()));
        }
        if self.min_step_cents > self.max_step_cents {
            return Err(ConfigError::Invalid(format!(
                "min_step_cents ({}) is greater than max_step_cents ({})",
                self.min_step_cents, self.max_step_cents
            )));
        }
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Settings without wall-clock limits, so that results only depend on the input
    pub fn unbounded() -> Self {
        Self {
            time_limit_ms: None,
            step_time_guard_ms: None,
            ..Self::default()
        }
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }

    pub fn step_time_guard(&self) -> Option<Duration> {
        self.step_time_guard_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let settings = Settings::from_toml("budget = 250.0\ntop = 3\n").unwrap();
        assert_eq!(settings.budget, 250.0);
        assert_eq!(settings.top, 3);
        assert_eq!(settings.min_step_cents, 100);
        assert_eq!(settings.time_limit(), Some(Duration::from_millis(820)));
        assert!(settings.dedupe_same_cost);
    }

    #[test]
    fn rejects_inverted_step_range() {
        let err = Settings::from_toml("min_step_cents = 500\nmax_step_cents = 100\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_non_positive_budget() {
        let settings = Settings {
            budget: 0.0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }
}
