//! Episode runtime: drives the planner against a real stepper until the goal or the
//! step limit.

pub mod episode;

pub use episode::{planner_seed, Episode, EpisodeError, EpisodeReport, StepRecord};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
