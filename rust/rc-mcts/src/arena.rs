//! Arena-backed tree storage.

use crate::node::{ActionChildren, ActionId, ActionNode, StateId, StateNode};
use rc_core::{Action, RaceState};
use std::collections::VecDeque;

pub struct Tree {
    states: Vec<StateNode>,
    actions: Vec<ActionNode>,
}

impl Tree {
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Store a detached state node.
    pub fn push_state(&mut self, n: StateNode) -> StateId {
        let id = StateId(self.states.len() as u32);
        self.states.push(n);
        id
    }

    pub fn state(&self, id: StateId) -> &StateNode {
        &self.states[id.0 as usize]
    }

    pub fn state_mut(&mut self, id: StateId) -> &mut StateNode {
        &mut self.states[id.0 as usize]
    }

    pub fn action(&self, id: ActionId) -> &ActionNode {
        &self.actions[id.0 as usize]
    }

    pub fn action_mut(&mut self, id: ActionId) -> &mut ActionNode {
        &mut self.actions[id.0 as usize]
    }

    /// Create one action node per legal action. No-op if already expanded.
    ///
    /// Returns true if the state was expanded by this call.
    pub fn expand(&mut self, id: StateId, legal: Vec<Action>) -> bool {
        if self.state(id).is_expanded() {
            return false;
        }
        let mut children = ActionChildren::default();
        for action in legal {
            if children.index.contains_key(&action) {
                continue;
            }
            let aid = ActionId(self.actions.len() as u32);
            self.actions.push(ActionNode::new(action.clone(), id));
            children.order.push(aid);
            children.index.insert(action, aid);
        }
        self.state_mut(id).children = Some(children);
        true
    }

    /// Create a state node owned by `parent`.
    pub fn add_child(&mut self, parent: ActionId, node: StateNode) -> StateId {
        let id = self.push_state(node);
        self.attach(parent, id);
        id
    }

    /// Hand a detached state node to `parent`.
    pub fn attach(&mut self, parent: ActionId, child: StateId) {
        debug_assert!(self.state(child).parent.is_none(), "node already attached");
        self.state_mut(child).parent = Some(parent);
        self.action_mut(parent).children.push(child);
    }

    /// First child of `action` whose state equals `state`.
    pub fn lookup_child(&self, action: ActionId, state: &RaceState) -> Option<StateId> {
        self.action(action)
            .children
            .iter()
            .copied()
            .find(|&sid| self.state(sid).state == *state)
    }

    /// Recompute `value` and `best` of a state from its action children.
    ///
    /// The scan is seeded with the `Move` child and only replaced on a strictly greater
    /// average, so `Move` wins ties.
    pub fn recompute_value(&mut self, id: StateId) {
        let node = self.state(id);
        let reward = node.reward;
        let Some(children) = node.children.as_ref() else {
            self.state_mut(id).value = reward;
            return;
        };

        let seed = children
            .index
            .get(&Action::Move)
            .copied()
            .or_else(|| children.order.first().copied());
        let Some(seed) = seed else {
            let n = self.state_mut(id);
            n.value = reward;
            n.best = None;
            return;
        };

        let mut best = seed;
        let mut best_q = self.action(seed).q;
        for &aid in &children.order {
            let q = self.action(aid).q;
            if q > best_q {
                best_q = q;
                best = aid;
            }
        }

        let n = self.state_mut(id);
        n.best = Some(best);
        n.value = reward + best_q;
    }

    /// Copy the subtree rooted at `root` into a fresh tree and return it with the new
    /// root id. The new root has no parent; everything outside the subtree is dropped.
    pub fn detach_subtree(&self, root: StateId) -> (Tree, StateId) {
        let mut out = Tree::new();
        let mut queue: VecDeque<(StateId, Option<ActionId>)> = VecDeque::new();
        queue.push_back((root, None));
        let mut new_root = None;

        while let Some((old_sid, new_parent)) = queue.pop_front() {
            let old = self.state(old_sid);
            let sid = out.push_state(StateNode {
                state: old.state.clone(),
                step: old.step,
                parent: None,
                reward: old.reward,
                value: old.value,
                best: None,
                children: None,
            });
            if let Some(aid) = new_parent {
                out.attach(aid, sid);
            }
            new_root.get_or_insert(sid);

            let Some(old_children) = old.children.as_ref() else {
                continue;
            };
            let mut children = ActionChildren::default();
            for &old_aid in &old_children.order {
                let old_action = self.action(old_aid);
                let aid = ActionId(out.actions.len() as u32);
                out.actions.push(ActionNode {
                    action: old_action.action.clone(),
                    parent: sid,
                    children: Vec::new(),
                    n: old_action.n,
                    q: old_action.q,
                });
                children.order.push(aid);
                children.index.insert(old_action.action.clone(), aid);
                if old.best == Some(old_aid) {
                    out.state_mut(sid).best = Some(aid);
                }
                for &child in &old_action.children {
                    queue.push_back((child, Some(aid)));
                }
            }
            out.state_mut(sid).children = Some(children);
        }

        (out, new_root.unwrap_or(StateId(0)))
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}
