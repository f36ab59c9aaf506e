//! Reward shaping for reached states.

use crate::node::StateNode;
use rc_core::{ProblemSpec, RaceState, RewardConfig};

/// Per-planner session state read by every reward computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionContext {
    /// Position of the real car after the last real step. Simulated states behind it
    /// score the regression penalty.
    pub progress_floor: i32,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self { progress_floor: 1 }
    }
}

/// Reward function bound to one problem, config and session snapshot.
#[derive(Clone, Copy)]
pub struct RewardFn<'a> {
    pub spec: &'a ProblemSpec,
    pub cfg: &'a RewardConfig,
    pub session: &'a SessionContext,
}

impl<'a> RewardFn<'a> {
    pub fn new(spec: &'a ProblemSpec, cfg: &'a RewardConfig, session: &'a SessionContext) -> Self {
        Self { spec, cfg, session }
    }

    /// Score `state` reached after `step` elapsed steps.
    ///
    /// - behind the progress floor: `regression_penalty` (clamped only if configured)
    /// - at the goal: `0.5 + 0.5 * remaining / max_t`
    /// - otherwise: `progress_weight * pos * remaining`
    ///
    /// The last two are clamped to [0, 1].
    pub fn score(&self, state: &RaceState, step: u32) -> f64 {
        if state.pos < self.session.progress_floor {
            let p = self.cfg.regression_penalty;
            return if self.cfg.clamp_penalty {
                p.clamp(0.0, 1.0)
            } else {
                p
            };
        }

        let max_t = self.spec.max_t as f64;
        let remaining = max_t - step as f64;
        let r = if state.pos == self.spec.n {
            0.5 + 0.5 * remaining / max_t
        } else {
            self.cfg.progress_weight * state.pos as f64 * remaining
        };
        r.clamp(0.0, 1.0)
    }

    /// New detached node with its reward filled in.
    pub fn node(&self, state: RaceState, step: u32) -> StateNode {
        let reward = self.score(&state, step);
        StateNode::new(state, step, reward)
    }
}
