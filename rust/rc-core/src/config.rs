//! Run configuration schema.
//!
//! One YAML file configures the planner, the reward shaping and the episode runner.
//! The problem itself (track, catalogs) lives in a separate problem file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Planner settings.
    #[serde(default)]
    pub planner: PlannerConfig,
    /// Reward shaping.
    #[serde(default)]
    pub reward: RewardConfig,
    /// Episode runner settings.
    #[serde(default)]
    pub run: RunConfig,
}

/// Planner configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlannerConfig {
    /// Wall-clock planning budget per real step, in milliseconds.
    #[serde(default = "default_budget_ms")]
    pub budget_ms: u64,
    /// If set, plan a fixed number of sweeps instead of using the time budget.
    ///
    /// Useful for reproducible runs: the result no longer depends on machine speed.
    #[serde(default)]
    pub sweeps: Option<u32>,
    /// Extra default-policy steps taken after each simulated action.
    #[serde(default = "default_rollout_depth")]
    pub rollout_depth: u32,
    /// Override the greedy choice with `Move` when it repeats the previous action family.
    #[serde(default = "default_anti_oscillation")]
    pub anti_oscillation: bool,
}

fn default_budget_ms() -> u64 {
    200
}

fn default_rollout_depth() -> u32 {
    2
}

fn default_anti_oscillation() -> bool {
    true
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            budget_ms: default_budget_ms(),
            sweeps: None,
            rollout_depth: default_rollout_depth(),
            anti_oscillation: default_anti_oscillation(),
        }
    }
}

/// Reward shaping configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RewardConfig {
    /// Score for states behind the progress floor.
    #[serde(default = "default_regression_penalty")]
    pub regression_penalty: f64,
    /// Dense shaping weight `k` in `k * pos * steps_remaining`.
    #[serde(default = "default_progress_weight")]
    pub progress_weight: f64,
    /// Clamp the regression penalty into [0, 1] like the other branches.
    ///
    /// Off by default: the penalty stays negative so regressing states rank below
    /// every non-regressing one.
    #[serde(default)]
    pub clamp_penalty: bool,
}

fn default_regression_penalty() -> f64 {
    -0.05
}

fn default_progress_weight() -> f64 {
    0.0001
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            regression_penalty: default_regression_penalty(),
            progress_weight: default_progress_weight(),
            clamp_penalty: false,
        }
    }
}

/// Episode runner configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    /// Number of episodes to run.
    #[serde(default = "default_episodes")]
    pub episodes: u32,
    /// Base seed. The real environment and the planner's simulator derive their own
    /// streams from it per episode.
    #[serde(default)]
    pub seed: u64,
    /// Flush the NDJSON log every N lines (0 = only at the end).
    #[serde(default = "default_log_flush_every")]
    pub log_flush_every: u64,
}

fn default_episodes() -> u32 {
    1
}

fn default_log_flush_every() -> u64 {
    100
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            episodes: default_episodes(),
            seed: 0,
            log_flush_every: default_log_flush_every(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }
}
