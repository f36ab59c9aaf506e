use std::sync::Arc;

use rc_core::{Action, ProblemSpec, RaceSimulator, RaceState, Stepper};
use rc_mcts::{PlanError, PlanStats, Planner, PlannerConfig, Reuse, SearchBudget};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EpisodeError {
    #[error("planning failed at step {step}: {source}")]
    Plan {
        step: u32,
        #[source]
        source: PlanError,
    },
    #[error(transparent)]
    Setup(#[from] PlanError),
}

/// One executed real step, handed to the `run_with` callback.
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// 0-based index of the real decision.
    pub index: u32,
    pub before: RaceState,
    pub action: Action,
    pub after: RaceState,
    /// Steps elapsed after the action, as reported by the real stepper.
    pub steps: u32,
    pub reward: f64,
    /// How the tree was carried over; `None` on the final step.
    pub reuse: Option<Reuse>,
    pub stats: PlanStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeReport {
    pub success: bool,
    pub steps: u32,
    pub total_reward: f64,
    /// Number of real decisions taken.
    pub moves: u32,
    pub final_state: RaceState,
}

/// Seed for the planner's private simulator, derived from the episode seed so that
/// planning and the real world draw from different streams.
pub fn planner_seed(seed: u64) -> u64 {
    seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ 0xD1E7_C437_9E37_79B9
}

/// Real-step loop: plan, execute on the real stepper, score, advance the tree.
pub struct Episode<P: Stepper, R: Stepper> {
    spec: Arc<ProblemSpec>,
    planner: Planner<P>,
    real: R,
    budget: SearchBudget,
}

impl Episode<RaceSimulator, RaceSimulator> {
    /// Episode on the reference simulator: the real world uses `seed`, the planner a
    /// derived seed.
    pub fn simulated(
        spec: Arc<ProblemSpec>,
        cfg: PlannerConfig,
        budget: SearchBudget,
        seed: u64,
    ) -> Result<Self, EpisodeError> {
        let planner_sim = RaceSimulator::new(spec.clone(), planner_seed(seed));
        let real = RaceSimulator::new(spec.clone(), seed);
        Self::new(spec, cfg, budget, planner_sim, real)
    }
}

impl<P: Stepper, R: Stepper> Episode<P, R> {
    pub fn new(
        spec: Arc<ProblemSpec>,
        cfg: PlannerConfig,
        budget: SearchBudget,
        planner_stepper: P,
        mut real: R,
    ) -> Result<Self, EpisodeError> {
        let start = spec.start_state();
        real.reset(&start, 0);
        let planner = Planner::new(spec.clone(), cfg, start, 0, planner_stepper)?;
        Ok(Self {
            spec,
            planner,
            real,
            budget,
        })
    }

    pub fn planner(&self) -> &Planner<P> {
        &self.planner
    }

    pub fn run(&mut self) -> Result<EpisodeReport, EpisodeError> {
        self.run_with(|_| {})
    }

    /// Run to completion, calling `on_step` after every executed real step.
    pub fn run_with<F>(&mut self, mut on_step: F) -> Result<EpisodeReport, EpisodeError>
    where
        F: FnMut(&StepRecord),
    {
        let mut state = self.planner.root_node().state.clone();
        let mut steps = self.planner.root_node().step;
        let mut total_reward = 0.0;
        let mut moves = 0u32;

        loop {
            if steps >= self.spec.max_t {
                return Ok(EpisodeReport {
                    success: false,
                    steps,
                    total_reward,
                    moves,
                    final_state: state,
                });
            }

            let action = self
                .planner
                .simulate(self.budget)
                .map_err(|source| EpisodeError::Plan {
                    step: steps,
                    source,
                })?;
            let next = self.real.step(&action);
            steps = self.real.steps();
            let reward = self.planner.reward_fn().score(&next, steps);
            total_reward += reward;

            let done = next.pos == self.spec.n;
            let reuse = if done {
                None
            } else {
                Some(self.planner.advance(&action, next.clone(), steps))
            };

            on_step(&StepRecord {
                index: moves,
                before: state,
                action,
                after: next.clone(),
                steps,
                reward,
                reuse,
                stats: self.planner.last_stats().clone(),
            });
            moves += 1;
            state = next;

            if done {
                return Ok(EpisodeReport {
                    success: true,
                    steps,
                    total_reward,
                    moves,
                    final_state: state,
                });
            }
        }
    }
}
