//! Default-policy rollout.
//!
//! A rollout starts at a freshly simulated, still detached state and extends it with the
//! default action for a bounded number of steps, building a thin chain of nodes. Every
//! visited state is fully expanded so later planning can reuse it. Values are then folded
//! back up the chain to the entry node.

use crate::arena::Tree;
use crate::node::{ActionId, StateId};
use crate::reward::RewardFn;
use rc_core::{legal_actions, Action, RaceState, Stepper};

/// Action taken at every rollout step.
pub fn default_action(_state: &RaceState) -> Action {
    Action::Move
}

/// One rollout: its entry node and the (action, child) links it created.
pub struct RolloutSession {
    entry: StateId,
    links: Vec<(ActionId, StateId)>,
}

impl RolloutSession {
    pub fn new(entry: StateId) -> Self {
        Self {
            entry,
            links: Vec::new(),
        }
    }

    pub fn entry(&self) -> StateId {
        self.entry
    }

    /// Nodes created beyond the entry, in creation order.
    pub fn chain(&self) -> impl Iterator<Item = StateId> + '_ {
        self.links.iter().map(|&(_, sid)| sid)
    }

    /// Extend the chain with up to `max_depth` default-policy steps, stopping early at a
    /// terminal state, then back the values up to the entry node.
    ///
    /// `stepper` must be positioned at the entry node's state and step.
    pub fn run<S: Stepper>(
        &mut self,
        tree: &mut Tree,
        reward: &RewardFn<'_>,
        max_depth: u32,
        stepper: &mut S,
    ) {
        let spec = reward.spec;
        let mut current = self.entry;
        let mut depth = 0u32;

        while depth < max_depth {
            let node = tree.state(current);
            if spec.is_terminal(&node.state, node.step) {
                break;
            }
            let action = default_action(&node.state);
            if !node.is_expanded() {
                let legal = legal_actions(spec, &node.state);
                tree.expand(current, legal);
            }
            let Some(aid) = tree.state(current).child(&action) else {
                break;
            };

            let next = stepper.step(&action);
            let child = tree.add_child(aid, reward.node(next, stepper.steps()));
            self.links.push((aid, child));
            current = child;
            depth += 1;
        }

        tree.recompute_value(current);
        self.backup(tree);
    }

    fn backup(&self, tree: &mut Tree) {
        for &(aid, child) in self.links.iter().rev() {
            let v = tree.state(child).value;
            let action = tree.action_mut(aid);
            action.update(v);
            let parent = action.parent;
            tree.recompute_value(parent);
        }
    }
}
