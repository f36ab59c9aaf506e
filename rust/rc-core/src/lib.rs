//! rc-core: race problem model, legal actions, stochastic simulator and configuration.

pub mod action;
pub mod config;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod legal;
pub mod problem;
pub mod sim;
pub mod state;

pub use action::{Action, ActionKind};
pub use config::{Config, ConfigError, PlannerConfig, RewardConfig, RunConfig};
pub use legal::legal_actions;
pub use problem::{ProblemError, ProblemSpec};
pub use sim::{RaceSimulator, Stepper};
pub use state::{RaceState, Tire, TirePressure};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
