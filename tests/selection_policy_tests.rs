//! Black-box tests of `greedy_ucb`'s tie-break/explore/exploit and cost-constrained behavior,
//! built directly on the tree/RC types rather than a full planner.

use cpomcp::config::{SearchParams, TreeAlgorithm};
use cpomcp::history::History;
use cpomcp::policy::{greedy_ucb, Policy, UcbTable};
use cpomcp::rc::RC;
use cpomcp::simulator::{KnowledgeLevel, Simulator, Status};
use cpomcp::tree::VNode;

/// A tiny two-action simulator, just enough to satisfy `greedy_ucb`'s `Sim` bound.
struct TwoArm;

impl Simulator for TwoArm {
    type State = ();
    fn num_actions(&self) -> usize {
        2
    }
    fn num_observations(&self) -> usize {
        1
    }
    fn discount(&self) -> f64 {
        0.99
    }
    fn reward_range(&self) -> f64 {
        10.0
    }
    fn create_start_state(&self) {}
    fn step(&self, _state: &mut Self::State, _action: usize, _rc: &mut RC) -> (usize, bool) {
        (0, true)
    }
}

fn expanded_root(num_obs: usize) -> VNode<()> {
    let mut root = VNode::new();
    root.expand(2, num_obs);
    root
}

#[test]
fn unvisited_child_always_wins_under_ucb() {
    let sim = TwoArm;
    let mut root = expanded_root(1);
    root.children[0].value.add(RC::new(5.0, 0.0));
    // action 1 is never visited; UCB's unvisited bonus should still pick it over
    // the already-rewarding but visited action 0.
    let params = SearchParams::default();
    let table = UcbTable::new(params.exploration_constant);
    let mut rng = rand::thread_rng();
    let policy = greedy_ucb(&root, &sim, None, 1, &table, &params, 0.0, true, false, &mut rng);
    assert_eq!(policy, Policy::Deterministic(1));
}

#[test]
fn greedy_ucb_skips_actions_flagged_illegal() {
    let sim = TwoArm;
    let mut root = expanded_root(1);
    root.children[0].illegal = true;
    root.children[1].value.add(RC::new(1.0, 0.0));
    let params = SearchParams::default();
    let table = UcbTable::new(params.exploration_constant);
    let mut rng = rand::thread_rng();
    let policy = greedy_ucb(&root, &sim, None, 1, &table, &params, 0.0, false, false, &mut rng);
    assert_eq!(policy, Policy::Deterministic(1));
}

#[test]
fn cc_mixes_actions_to_target_the_admissible_cost() {
    let sim = TwoArm;
    let mut root = expanded_root(1);
    // action 0: cheap and low reward; action 1: expensive and high reward.
    root.children[0].value.add(RC::new(1.0, 0.0));
    root.children[1].value.add(RC::new(10.0, 2.0));
    let params = SearchParams::default().with_admissible_cost(1.0).with_tree_algorithm(TreeAlgorithm::Cc);
    let table = UcbTable::new(params.exploration_constant);
    let mut rng = rand::thread_rng();
    let policy = greedy_ucb(&root, &sim, None, 0, &table, &params, 0.0, false, true, &mut rng);

    let expected = policy.expected(|a| root.children[a].value.value());
    assert!(expected.c <= 1.0 + 1e-6, "expected cost {} should not exceed the 1.0 bound", expected.c);
}

#[test]
fn baseline_restricts_to_feasible_actions_and_is_deterministic() {
    let sim = TwoArm;
    let mut root = expanded_root(1);
    root.children[0].value.add(RC::new(1.0, 0.0));
    root.children[1].value.add(RC::new(10.0, 5.0));
    let params = SearchParams::default()
        .with_admissible_cost(1.0)
        .with_tree_algorithm(TreeAlgorithm::Baseline);
    let table = UcbTable::new(params.exploration_constant);
    let mut rng = rand::thread_rng();
    let policy = greedy_ucb(&root, &sim, None, 0, &table, &params, 0.0, false, true, &mut rng);
    assert_eq!(policy, Policy::Deterministic(0));
}

#[test]
fn policy_prob_and_other_action_are_consistent_for_a_mixture() {
    let policy = Policy::Mixture { a_min: 0, a_max: 1, p_max: 0.3 };
    assert!((policy.prob(0) - 0.7).abs() < 1e-12);
    assert!((policy.prob(1) - 0.3).abs() < 1e-12);
    assert_eq!(policy.other_action(0), Some(1));
    assert_eq!(policy.other_action(1), Some(0));
    assert_eq!(policy.other_action(2), None);
}

#[allow(dead_code)]
fn unused_knowledge_level_reference(_: KnowledgeLevel, _: &History, _: &Status) {}
