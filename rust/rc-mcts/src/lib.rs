//! Online MCTS planner for the race problem.
//!
//! The search is greedy rather than UCB-driven: every sweep simulates each root action
//! once, extends the sampled state with a short default-policy rollout, and backs the
//! value up as a running mean. Between real steps the planner keeps the subtree whose
//! simulated state matches what actually happened.
//!
//! - Arena-backed node storage ([`arena::Tree`]), ids instead of owning back-pointers
//! - Reward shaping bound to a per-planner [`reward::SessionContext`]
//! - Any [`rc_core::Stepper`] can drive simulations

pub mod arena;
pub mod node;
pub mod planner;
pub mod reward;
pub mod rollout;

pub use arena::Tree;
pub use node::{ActionId, ActionNode, StateId, StateNode};
pub use planner::{PlanError, PlanStats, Planner, PlannerConfig, Reuse, SearchBudget};
pub use reward::{RewardFn, SessionContext};
pub use rollout::{default_action, RolloutSession};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");


#[cfg(test)]
mod mcts_tests;
