use crate::{
    PlanError, Planner, PlannerConfig, Reuse, RewardFn, RolloutSession, SearchBudget,
    SessionContext, StateNode, Tree,
};
use rc_core::fixtures::{self, NOISY};
use rc_core::{Action, RaceSimulator, RaceState, RewardConfig, Stepper, Tire};
use std::sync::Arc;
use std::time::Duration;

const EPS: f64 = 1e-9;

fn planner(seed: u64) -> Planner<RaceSimulator> {
    let spec = Arc::new(fixtures::alpha_beta());
    let start = spec.start_state();
    let sim = RaceSimulator::new(spec.clone(), seed);
    Planner::new(spec, PlannerConfig::default(), start, 0, sim).unwrap()
}

fn q_of(p: &Planner<impl Stepper>, action: &Action) -> (u32, f64) {
    let aid = p.root_node().child(action).unwrap();
    let a = p.tree().action(aid);
    (a.n, a.q)
}

/// Scripted stepper: `ChangeCar` jumps three cells ahead, `Move` advances one.
struct Teleport {
    n: i32,
    state: Option<RaceState>,
    steps: u32,
}

impl Stepper for Teleport {
    fn reset(&mut self, state: &RaceState, step: u32) {
        self.state = Some(state.clone());
        self.steps = step;
    }

    fn step(&mut self, action: &Action) -> RaceState {
        let s = self.state.as_mut().unwrap();
        match action {
            Action::Move => s.pos = (s.pos + 1).min(self.n),
            Action::ChangeCar(c) => {
                s.car = c.clone();
                s.pos = (s.pos + 3).min(self.n);
            }
            Action::ChangeDriver(d) => s.driver = d.clone(),
            _ => {}
        }
        self.steps += 1;
        s.clone()
    }

    fn steps(&self) -> u32 {
        self.steps
    }
}

#[test]
fn action_mean_is_running_average() {
    // Progress rewards, goal rewards and regression penalties mixed together.
    let samples = [
        0.2, -0.05, 0.9, 0.0, 0.0417, -0.05, 1.0, 0.5, 0.0029, -0.05, 0.75, 0.013,
    ];
    let mut a = crate::ActionNode::new(Action::Move, crate::StateId(0));
    assert_eq!(a.n, 0);
    assert_eq!(a.q, 0.0);
    for (i, &v) in samples.iter().enumerate() {
        a.update(v);
        let n = i + 1;
        let mean = samples[..n].iter().sum::<f64>() / n as f64;
        assert_eq!(a.n as usize, n);
        assert!((a.q - mean).abs() < 1e-12, "n={n} q={} mean={mean}", a.q);
    }

    // A long run of one value stays exactly on it.
    let mut b = crate::ActionNode::new(Action::Move, crate::StateId(0));
    for _ in 0..1000 {
        b.update(-0.05);
    }
    assert_eq!(b.n, 1000);
    assert!((b.q + 0.05).abs() < 1e-12);
}

#[test]
fn move_wins_ties_regardless_of_legal_order() {
    let spec = fixtures::alpha_beta();
    let mut tree = Tree::new();
    let root = tree.push_state(StateNode::new(spec.start_state(), 0, 0.1));
    tree.expand(
        root,
        vec![Action::ChangeCar("Beta".into()), Action::Move],
    );
    tree.recompute_value(root);
    let best = tree.state(root).best.unwrap();
    assert_eq!(tree.action(best).action, Action::Move);
    assert!((tree.state(root).value - 0.1).abs() < EPS);

    let change = tree.state(root).child(&Action::ChangeCar("Beta".into())).unwrap();
    tree.action_mut(change).update(0.3);
    tree.recompute_value(root);
    assert_eq!(tree.state(root).best, Some(change));
    assert!((tree.state(root).value - 0.4).abs() < EPS);
}

#[test]
fn expand_is_idempotent_and_skips_duplicates() {
    let spec = fixtures::alpha_beta();
    let mut tree = Tree::new();
    let root = tree.push_state(StateNode::new(spec.start_state(), 0, 0.0));
    assert!(tree.expand(root, vec![Action::Move, Action::Move]));
    assert_eq!(tree.state(root).children().len(), 1);
    assert!(!tree.expand(root, vec![Action::Move, Action::ChangeDriver("Yor".into())]));
    assert_eq!(tree.action_count(), 1);
}

#[test]
fn lookup_returns_first_equal_child() {
    let spec = fixtures::alpha_beta();
    let mut tree = Tree::new();
    let root = tree.push_state(StateNode::new(spec.start_state(), 0, 0.0));
    tree.expand(root, vec![Action::Move]);
    let aid = tree.state(root).child(&Action::Move).unwrap();

    let mut s = spec.start_state();
    s.pos = 2;
    let first = tree.add_child(aid, StateNode::new(s.clone(), 1, 0.0));
    let second = tree.add_child(aid, StateNode::new(s.clone(), 1, 0.0));
    assert_ne!(first, second);
    assert_eq!(tree.lookup_child(aid, &s), Some(first));

    s.pos = 3;
    assert_eq!(tree.lookup_child(aid, &s), None);
}

#[test]
fn rollout_builds_expanded_chain_and_backs_up() {
    let spec = fixtures::alpha_beta();
    let cfg = RewardConfig::default();
    let session = SessionContext::default();
    let rf = RewardFn::new(&spec, &cfg, &session);

    let mut entry_state = spec.start_state();
    entry_state.pos = 2;
    let mut tree = Tree::new();
    let entry = tree.push_state(rf.node(entry_state.clone(), 1));

    let mut sim = RaceSimulator::new(Arc::new(spec.clone()), 7);
    sim.reset(&entry_state, 1);
    let mut rollout = RolloutSession::new(entry);
    rollout.run(&mut tree, &rf, 2, &mut sim);

    let chain: Vec<_> = rollout.chain().collect();
    assert_eq!(chain.len(), 2);
    assert_eq!(tree.state(chain[0]).state.pos, 3);
    assert_eq!(tree.state(chain[1]).state.pos, 4);
    // Every node but the last was expanded with the full legal set.
    assert_eq!(tree.state(entry).children().len(), 3);
    assert_eq!(tree.state(chain[0]).children().len(), 3);
    assert!(!tree.state(chain[1]).is_expanded());

    // 0.0001 * pos * (30 - step) along the chain.
    let v_last = 0.0001 * 4.0 * 27.0;
    let v_mid = 0.0001 * 3.0 * 28.0 + v_last;
    let v_entry = 0.0001 * 2.0 * 29.0 + v_mid;
    assert!((tree.state(chain[1]).value - v_last).abs() < EPS);
    assert!((tree.state(chain[0]).value - v_mid).abs() < EPS);
    assert!((tree.state(entry).value - v_entry).abs() < EPS);
}

#[test]
fn rollout_stops_at_terminal_state() {
    let spec = fixtures::alpha_beta();
    let cfg = RewardConfig::default();
    let session = SessionContext::default();
    let rf = RewardFn::new(&spec, &cfg, &session);

    let mut s = spec.start_state();
    s.pos = spec.n - 1;
    let mut tree = Tree::new();
    let entry = tree.push_state(rf.node(s.clone(), 4));
    let mut sim = RaceSimulator::new(Arc::new(spec.clone()), 1);
    sim.reset(&s, 4);

    let mut rollout = RolloutSession::new(entry);
    rollout.run(&mut tree, &rf, 5, &mut sim);
    let chain: Vec<_> = rollout.chain().collect();
    assert_eq!(chain.len(), 1);
    assert_eq!(tree.state(chain[0]).state.pos, spec.n);
    assert!(!tree.state(chain[0]).is_expanded());
}

#[test]
fn rollout_depth_zero_leaves_entry_untouched() {
    let spec = fixtures::alpha_beta();
    let cfg = RewardConfig::default();
    let session = SessionContext::default();
    let rf = RewardFn::new(&spec, &cfg, &session);

    let s = spec.start_state();
    let mut tree = Tree::new();
    let entry = tree.push_state(rf.node(s.clone(), 0));
    let mut sim = RaceSimulator::new(Arc::new(spec.clone()), 1);
    sim.reset(&s, 0);

    let mut rollout = RolloutSession::new(entry);
    rollout.run(&mut tree, &rf, 0, &mut sim);
    assert_eq!(rollout.chain().count(), 0);
    assert!(!tree.state(entry).is_expanded());
    assert_eq!(tree.state(entry).value, tree.state(entry).reward);
}

#[test]
fn one_sweep_scores_every_root_action() {
    let mut p = planner(0);
    let a = p.simulate(SearchBudget::Sweeps(1)).unwrap();
    assert_eq!(a, Action::Move);

    let (n, q) = q_of(&p, &Action::Move);
    assert_eq!(n, 1);
    assert!((q - 0.025).abs() < EPS, "q={q}");
    for change in [Action::ChangeCar("Beta".into()), Action::ChangeDriver("Yor".into())] {
        let (n, q) = q_of(&p, &change);
        assert_eq!(n, 1);
        assert!((q - 0.0166).abs() < EPS, "{change}: q={q}");
    }
    let root_reward = 0.0001 * 1.0 * 30.0;
    assert!((p.root_node().value - (root_reward + 0.025)).abs() < EPS);

    let stats = p.last_stats();
    assert_eq!(stats.sweeps, 1);
    assert_eq!(stats.simulations, 3);
    assert_eq!(stats.greedy, Some(Action::Move));
    assert!(!stats.overridden);
}

#[test]
fn every_sweep_visits_every_root_action_once() {
    let mut p = planner(0);
    p.simulate(SearchBudget::Sweeps(3)).unwrap();
    for &aid in p.root_node().children() {
        let a = p.tree().action(aid);
        assert_eq!(a.n, 3, "{}", a.action);
        assert_eq!(a.children.len(), 3);
    }
}

#[test]
fn same_seed_gives_same_plan() {
    let spec = Arc::new(fixtures::problem(
        5,
        12,
        40,
        &["a", "b"],
        &["x", "y"],
        &[Tire::AllTerrain, Tire::Mud],
        NOISY,
    ));
    let run = |seed: u64| {
        let sim = RaceSimulator::new(spec.clone(), seed);
        let mut p = Planner::new(
            spec.clone(),
            PlannerConfig::default(),
            spec.start_state(),
            0,
            sim,
        )
        .unwrap();
        let a = p.simulate(SearchBudget::Sweeps(4)).unwrap();
        let qs: Vec<f64> = p
            .root_node()
            .children()
            .iter()
            .map(|&aid| p.tree().action(aid).q)
            .collect();
        (a, qs, p.tree().state_count())
    };
    assert_eq!(run(11), run(11));
}

#[test]
fn zero_budget_is_an_error() {
    let mut p = planner(0);
    let err = p.simulate(SearchBudget::Time(Duration::ZERO)).unwrap_err();
    assert!(matches!(err, PlanError::NoCompletedSweep));
    assert_eq!(p.last_stats().sweeps, 0);

    let err = p.simulate(SearchBudget::Sweeps(0)).unwrap_err();
    assert!(matches!(err, PlanError::NoCompletedSweep));
}

#[test]
fn non_finite_reward_config_is_rejected() {
    let spec = Arc::new(fixtures::alpha_beta());
    let cfg = PlannerConfig {
        reward: RewardConfig {
            progress_weight: f64::NAN,
            ..RewardConfig::default()
        },
        ..PlannerConfig::default()
    };
    let sim = RaceSimulator::new(spec.clone(), 0);
    let err = Planner::new(spec.clone(), cfg, spec.start_state(), 0, sim)
        .err()
        .unwrap();
    assert!(matches!(err, PlanError::InvalidConfig { .. }));
}

#[test]
fn advance_reuses_matching_subtree() {
    let mut p = planner(0);
    p.simulate(SearchBudget::Sweeps(2)).unwrap();

    let move_aid = p.root_node().child(&Action::Move).unwrap();
    let first = p.tree().action(move_aid).children[0];
    let kept = p.tree().state(first).clone();
    let (kept_n, kept_q) = {
        let aid = kept.child(&Action::Move).unwrap();
        (p.tree().action(aid).n, p.tree().action(aid).q)
    };
    let before = p.tree().state_count();

    let reuse = p.advance(&Action::Move, kept.state.clone(), kept.step);
    assert_eq!(reuse, Reuse::Reused);
    assert_eq!(reuse.as_str(), "reused");
    assert!(p.root_node().parent.is_none());
    assert_eq!(p.root_node().state, kept.state);
    assert!((p.root_node().value - kept.value).abs() < EPS);
    let (n, q) = q_of(&p, &Action::Move);
    assert_eq!(n, kept_n);
    assert!((q - kept_q).abs() < EPS);
    assert!(p.tree().state_count() < before);
    assert_eq!(p.session().progress_floor, kept.state.pos);
    assert_eq!(p.previous_action(), Some(&Action::Move));
}

#[test]
fn advance_starts_fresh_without_match() {
    let mut p = planner(0);
    p.simulate(SearchBudget::Sweeps(1)).unwrap();

    let mut actual = p.root_node().state.clone();
    actual.pos = 7;
    let reuse = p.advance(&Action::ChangeCar("Beta".into()), actual.clone(), 3);
    assert_eq!(reuse, Reuse::Fresh);
    assert_eq!(p.tree().state_count(), 1);
    assert_eq!(p.tree().action_count(), 0);
    assert!(!p.root_node().is_expanded());
    assert_eq!(p.root_node().state, actual);
    assert_eq!(p.root_node().step, 3);
    assert_eq!(p.session().progress_floor, 7);

    // Planning continues from the new root.
    p.simulate(SearchBudget::Sweeps(1)).unwrap();
    assert!(p.root_node().is_expanded());
}

#[test]
fn regression_behind_floor_is_penalised_after_advance() {
    let mut p = planner(0);
    let mut actual = p.root_node().state.clone();
    actual.pos = 5;
    p.advance(&Action::Move, actual.clone(), 1);

    let cfg = RewardConfig::default();
    let rf = RewardFn::new(p.spec(), &cfg, p.session());
    actual.pos = 4;
    assert_eq!(rf.score(&actual, 2), cfg.regression_penalty);
}

#[test]
fn move_pointer_detaches_subtree() {
    let mut p = planner(0);
    p.simulate(SearchBudget::Sweeps(1)).unwrap();
    let before = p.tree().state_count();

    let move_aid = p.root_node().child(&Action::Move).unwrap();
    let child = p.tree().action(move_aid).children[0];
    let grandchild = {
        let aid = p.tree().state(child).child(&Action::Move).unwrap();
        p.tree().action(aid).children[0]
    };
    let target = p.tree().state(grandchild).state.clone();

    p.set_previous_action(Some(Action::ChangeDriver("Yor".into())));
    let floor = p.session().progress_floor;
    p.move_pointer(grandchild);
    assert!(p.root_node().parent.is_none());
    // Rebinding alone leaves the session untouched.
    assert_eq!(p.session().progress_floor, floor);
    assert_eq!(p.previous_action(), Some(&Action::ChangeDriver("Yor".into())));
    assert_eq!(p.root_node().state, target);
    // Grandchild plus the single rollout node below it.
    assert_eq!(p.tree().state_count(), 2);
    assert!(p.tree().state_count() < before);
}

#[test]
fn repeated_family_is_replaced_by_move() {
    let spec = Arc::new(fixtures::alpha_beta());
    let make = || {
        let stepper = Teleport {
            n: spec.n,
            state: None,
            steps: 0,
        };
        Planner::new(
            spec.clone(),
            PlannerConfig::default(),
            spec.start_state(),
            0,
            stepper,
        )
        .unwrap()
    };

    // ChangeCar: 0.0001 * (4*29 + 5*28 + 6*27) beats Move's 0.025.
    let mut p = make();
    assert_eq!(
        p.simulate(SearchBudget::Sweeps(1)).unwrap(),
        Action::ChangeCar("Beta".into())
    );
    let (_, q) = q_of(&p, &Action::ChangeCar("Beta".into()));
    assert!((q - 0.0418).abs() < EPS, "q={q}");

    let mut p = make();
    p.set_previous_action(Some(Action::ChangeCar("Alpha".into())));
    assert_eq!(p.simulate(SearchBudget::Sweeps(1)).unwrap(), Action::Move);
    assert_eq!(
        p.last_stats().greedy,
        Some(Action::ChangeCar("Beta".into()))
    );
    assert!(p.last_stats().overridden);

    // Switched off, the greedy choice stands.
    let stepper = Teleport {
        n: spec.n,
        state: None,
        steps: 0,
    };
    let cfg = PlannerConfig {
        anti_oscillation: false,
        ..PlannerConfig::default()
    };
    let mut p = Planner::new(spec.clone(), cfg, spec.start_state(), 0, stepper).unwrap();
    p.set_previous_action(Some(Action::ChangeCar("Alpha".into())));
    assert_eq!(
        p.simulate(SearchBudget::Sweeps(1)).unwrap(),
        Action::ChangeCar("Beta".into())
    );
}
