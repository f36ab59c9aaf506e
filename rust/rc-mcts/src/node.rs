//! State and action nodes.
//!
//! The tree alternates layers: a `StateNode` owns one `ActionNode` per legal action once
//! expanded, and each `ActionNode` owns the `StateNode`s sampled by taking its action.
//! Parent links are plain ids into the [`crate::arena::Tree`], never owning.

use rc_core::{Action, RaceState};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(pub u32);

/// Action children of an expanded state: legal order plus an index by action.
#[derive(Debug, Clone, Default)]
pub struct ActionChildren {
    pub(crate) order: Vec<ActionId>,
    pub(crate) index: FxHashMap<Action, ActionId>,
}

#[derive(Debug, Clone)]
pub struct StateNode {
    pub state: RaceState,
    /// Steps elapsed when this state was reached.
    pub step: u32,
    /// Action that produced this state; `None` for a root or a not-yet-attached node.
    pub parent: Option<ActionId>,
    /// Immediate reward, fixed at construction.
    pub reward: f64,
    /// `reward` plus the best child's average value (just `reward` while unexpanded).
    pub value: f64,
    /// Child with the best average value, set by `Tree::recompute_value`.
    pub best: Option<ActionId>,
    pub(crate) children: Option<ActionChildren>,
}

impl StateNode {
    pub fn new(state: RaceState, step: u32, reward: f64) -> Self {
        Self {
            state,
            step,
            parent: None,
            reward,
            value: reward,
            best: None,
            children: None,
        }
    }

    pub fn is_expanded(&self) -> bool {
        self.children.is_some()
    }

    /// Action children in legal order (empty while unexpanded).
    pub fn children(&self) -> &[ActionId] {
        self.children.as_ref().map_or(&[][..], |c| c.order.as_slice())
    }

    pub fn child(&self, action: &Action) -> Option<ActionId> {
        self.children
            .as_ref()
            .and_then(|c| c.index.get(action).copied())
    }
}

#[derive(Debug, Clone)]
pub struct ActionNode {
    pub action: Action,
    /// State this action is taken from.
    pub parent: StateId,
    /// Sampled outcomes in insertion order. Equal states may repeat.
    pub children: Vec<StateId>,
    /// Number of values folded into `q`.
    pub n: u32,
    /// Running mean of the folded values.
    pub q: f64,
}

impl ActionNode {
    pub fn new(action: Action, parent: StateId) -> Self {
        Self {
            action,
            parent,
            children: Vec::new(),
            n: 0,
            q: 0.0,
        }
    }

    /// Fold one sample into the running mean: `q' = (q*n + v) / (n+1)`.
    pub fn update(&mut self, v: f64) {
        let n = self.n as f64;
        self.q = (self.q * n + v) / (n + 1.0);
        self.n += 1;
    }
}
