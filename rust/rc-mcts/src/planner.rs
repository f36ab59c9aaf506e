//! Online planner: greedy sweeps over the root's actions with rollouts, and tree reuse
//! between real steps.

use crate::arena::Tree;
use crate::node::{StateId, StateNode};
use crate::reward::{RewardFn, SessionContext};
use crate::rollout::RolloutSession;
use rc_core::{legal_actions, Action, ProblemSpec, RaceState, RewardConfig, Stepper};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, Copy)]
pub struct PlannerConfig {
    /// Default-policy steps after each simulated action.
    pub rollout_depth: u32,
    /// Replace a greedy choice that repeats the previous action family with `Move`.
    pub anti_oscillation: bool,
    pub reward: RewardConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            rollout_depth: 2,
            anti_oscillation: true,
            reward: RewardConfig::default(),
        }
    }
}

impl From<&rc_core::Config> for PlannerConfig {
    fn from(cfg: &rc_core::Config) -> Self {
        Self {
            rollout_depth: cfg.planner.rollout_depth,
            anti_oscillation: cfg.planner.anti_oscillation,
            reward: cfg.reward,
        }
    }
}

/// How long one `simulate` call keeps sweeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBudget {
    /// Wall clock, checked once per full sweep. A slow sweep can overrun it.
    Time(Duration),
    /// Exact number of sweeps.
    Sweeps(u32),
}

impl SearchBudget {
    /// Budget described by the run configuration: fixed sweeps if set, else time.
    pub fn from_config(cfg: &rc_core::PlannerConfig) -> Self {
        match cfg.sweeps {
            Some(n) => SearchBudget::Sweeps(n),
            None => SearchBudget::Time(Duration::from_millis(cfg.budget_ms)),
        }
    }
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid config: {msg}")]
    InvalidConfig { msg: &'static str },
    #[error("budget expired before one full sweep over the root actions")]
    NoCompletedSweep,
}

/// What `advance` did with the old tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reuse {
    /// A simulated outcome matched the real one; its subtree became the root.
    Reused,
    /// No match; planning restarts from a fresh root.
    Fresh,
}

impl Reuse {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reuse::Reused => "reused",
            Reuse::Fresh => "fresh",
        }
    }
}

impl fmt::Display for Reuse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Clone)]
pub struct PlanStats {
    pub sweeps: u32,
    pub simulations: u32,
    pub elapsed: Duration,
    pub state_nodes: usize,
    pub action_nodes: usize,
    pub root_value: f64,
    /// Best action by average value, before the anti-oscillation override.
    pub greedy: Option<Action>,
    /// True if the returned action is the `Move` override.
    pub overridden: bool,
}

pub struct Planner<S: Stepper> {
    spec: Arc<ProblemSpec>,
    cfg: PlannerConfig,
    stepper: S,
    tree: Tree,
    root: StateId,
    session: SessionContext,
    prev_action: Option<Action>,
    stats: PlanStats,
}

impl<S: Stepper> Planner<S> {
    /// Planner rooted at `(root_state, root_step)`. `stepper` is the planner's own
    /// simulation environment; it is reset before every simulated action.
    pub fn new(
        spec: Arc<ProblemSpec>,
        cfg: PlannerConfig,
        root_state: RaceState,
        root_step: u32,
        stepper: S,
    ) -> Result<Self, PlanError> {
        if !(cfg.reward.regression_penalty.is_finite()) {
            return Err(PlanError::InvalidConfig {
                msg: "regression_penalty must be finite",
            });
        }
        if !(cfg.reward.progress_weight.is_finite() && cfg.reward.progress_weight >= 0.0) {
            return Err(PlanError::InvalidConfig {
                msg: "progress_weight must be finite and >= 0",
            });
        }

        let session = SessionContext::default();
        let mut tree = Tree::new();
        let root = tree.push_state(
            RewardFn::new(&spec, &cfg.reward, &session).node(root_state, root_step),
        );
        Ok(Self {
            spec,
            cfg,
            stepper,
            tree,
            root,
            session,
            prev_action: None,
            stats: PlanStats::default(),
        })
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root(&self) -> StateId {
        self.root
    }

    pub fn root_node(&self) -> &StateNode {
        self.tree.state(self.root)
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn spec(&self) -> &ProblemSpec {
        &self.spec
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.cfg
    }

    /// Reward function under the current session, as used for the next simulation.
    pub fn reward_fn(&self) -> RewardFn<'_> {
        RewardFn::new(&self.spec, &self.cfg.reward, &self.session)
    }

    pub fn previous_action(&self) -> Option<&Action> {
        self.prev_action.as_ref()
    }

    /// Record the action executed in the last real step without moving the root.
    pub fn set_previous_action(&mut self, action: Option<Action>) {
        self.prev_action = action;
    }

    pub fn last_stats(&self) -> &PlanStats {
        &self.stats
    }

    /// Sweep the root's actions until `budget` runs out and return the action to play.
    ///
    /// Fails with `NoCompletedSweep` if the budget ends before the first sweep
    /// completes.
    pub fn simulate(&mut self, budget: SearchBudget) -> Result<Action, PlanError> {
        let start = Instant::now();
        self.stats = PlanStats::default();

        if !self.tree.state(self.root).is_expanded() {
            let legal = legal_actions(&self.spec, &self.tree.state(self.root).state);
            self.tree.expand(self.root, legal);
        }

        let mut sweeps = 0u32;
        loop {
            let more = match budget {
                SearchBudget::Time(limit) => start.elapsed() < limit,
                SearchBudget::Sweeps(n) => sweeps < n,
            };
            if !more {
                break;
            }
            self.stats.simulations += self.sweep();
            sweeps += 1;
        }

        self.stats.sweeps = sweeps;
        self.stats.elapsed = start.elapsed();
        self.stats.state_nodes = self.tree.state_count();
        self.stats.action_nodes = self.tree.action_count();
        self.stats.root_value = self.tree.state(self.root).value;

        if sweeps == 0 {
            return Err(PlanError::NoCompletedSweep);
        }
        let greedy = self.best_action().ok_or(PlanError::NoCompletedSweep)?;
        self.stats.greedy = Some(greedy.clone());

        let repeats_family = self
            .prev_action
            .as_ref()
            .is_some_and(|prev| prev.kind() == greedy.kind());
        if self.cfg.anti_oscillation && repeats_family && !greedy.is_move() {
            self.stats.overridden = true;
            return Ok(Action::Move);
        }
        Ok(greedy)
    }

    /// Root's best action by average value (ties go to `Move`), if any sweep has run.
    pub fn best_action(&self) -> Option<Action> {
        let best = self.tree.state(self.root).best?;
        Some(self.tree.action(best).action.clone())
    }

    /// One simulate + rollout + update cycle for every root action, in legal order.
    fn sweep(&mut self) -> u32 {
        let root = self.root;
        let actions = self.tree.state(root).children().to_vec();
        let root_state = self.tree.state(root).state.clone();
        let root_step = self.tree.state(root).step;
        let reward = RewardFn::new(&self.spec, &self.cfg.reward, &self.session);

        for &aid in &actions {
            self.stepper.reset(&root_state, root_step);
            let action = self.tree.action(aid).action.clone();
            let next = self.stepper.step(&action);
            let entry = self.tree.push_state(reward.node(next, self.stepper.steps()));

            RolloutSession::new(entry).run(
                &mut self.tree,
                &reward,
                self.cfg.rollout_depth,
                &mut self.stepper,
            );

            self.tree.attach(aid, entry);
            let v = self.tree.state(entry).value;
            self.tree.action_mut(aid).update(v);
            self.tree.recompute_value(root);
        }
        actions.len() as u32
    }

    /// Reconcile the tree with the real outcome of `executed`.
    ///
    /// If a simulated child of `executed` equals `actual` (first match wins), its subtree
    /// becomes the new root with its statistics intact. Otherwise the planner restarts
    /// from a fresh node. The rest of the old tree is dropped either way, and the
    /// progress floor moves to the new position.
    pub fn advance(&mut self, executed: &Action, actual: RaceState, actual_step: u32) -> Reuse {
        let root = self.tree.state(self.root);
        let matched = root
            .child(executed)
            .and_then(|aid| self.tree.lookup_child(aid, &actual));

        let new_pos = actual.pos;
        let reuse = match matched {
            Some(sid) => {
                self.move_pointer(sid);
                Reuse::Reused
            }
            None => {
                let node = RewardFn::new(&self.spec, &self.cfg.reward, &self.session)
                    .node(actual, actual_step);
                let mut tree = Tree::new();
                self.root = tree.push_state(node);
                self.tree = tree;
                Reuse::Fresh
            }
        };

        self.prev_action = Some(executed.clone());
        self.session.progress_floor = new_pos;
        reuse
    }

    /// Make `node` (any state of the current tree) the root, detaching it from its parent
    /// and dropping everything outside its subtree.
    ///
    /// This only rebinds the tree. The previous action and the progress floor are left as
    /// they are; after a real step use [`Planner::advance`], which updates both.
    pub fn move_pointer(&mut self, node: StateId) {
        let (tree, root) = self.tree.detach_subtree(node);
        self.tree = tree;
        self.root = root;
    }
}
