//! The scalarized-UCB tree selector (`greedy_ucb`) and the cost-constrained policy it builds.

use rand::Rng;

use crate::config::{SearchParams, TreeAlgorithm};
use crate::rc::RC;
use crate::simulator::Simulator;
use crate::tree::VNode;
use crate::utils::clamp;

/// Bound of the precomputed UCB bonus table's parent-visit axis.
const MAX_N: usize = 10_000;
/// Bound of the precomputed UCB bonus table's child-visit axis.
const MAX_CHILD_N: usize = 100;

/// A precomputed, bounded lookup table of the UCB exploration bonus `c*sqrt(ln(N+1)/n)`.
///
/// Exploration bonuses are looked up many times per simulation; for the common case where
/// both visit counts stay within the table's bounds this avoids repeated `ln`/`sqrt` calls.
/// Outside the bounds (very long searches, or the rare very-high-arity node) the bonus falls
/// back to the direct formula.
pub struct UcbTable {
    exploration_constant: f64,
    table: Vec<f64>,
}

impl UcbTable {
    pub fn new(exploration_constant: f64) -> Self {
        let mut table = vec![0.0; MAX_N * MAX_CHILD_N];
        for parent_n in 0..MAX_N {
            for child_n in 1..=MAX_CHILD_N {
                table[parent_n * MAX_CHILD_N + (child_n - 1)] =
                    Self::compute(exploration_constant, parent_n as f64, child_n as f64);
            }
        }
        UcbTable { exploration_constant, table }
    }

    fn compute(c: f64, parent_n: f64, child_n: f64) -> f64 {
        c * ((parent_n + 1.0).ln() / child_n).sqrt()
    }

    /// Exploration bonus for a child visited `child_n` times under a parent visited
    /// `parent_n` times.
    pub fn bonus(&self, parent_n: u64, child_n: f64) -> f64 {
        if (parent_n as usize) < MAX_N && child_n >= 1.0 && child_n <= MAX_CHILD_N as f64 {
            let row = parent_n as usize;
            let col = child_n as usize - 1;
            self.table[row * MAX_CHILD_N + col]
        } else {
            Self::compute(self.exploration_constant, parent_n as f64, child_n)
        }
    }
}

/// Stochastic tie-break tolerance at tree depth `d` for a child visited `n` times:
/// `0.1*e^(-d)*ln(n+1)/(n+1)`, shrinking both with depth and with visit count so the window
/// narrows as the estimate firms up.
fn bias(depth: usize, n: f64) -> f64 {
    0.1 * (-(depth as f64)).exp() * (n + 1.0).ln() / (n + 1.0)
}

/// The final, possibly stochastic action recommendation produced by [`greedy_ucb`].
///
/// `Mixture` exists because the best-reward action within the tie-break window can have
/// expected cost above `c_hat`: rather than silently violating the constraint or discarding a
/// useful action outright, the policy interpolates between it and the cheaper alternative at
/// the window's other extreme so the *expected* cost over many draws lands exactly on `c_hat`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Policy {
    Deterministic(usize),
    Mixture { a_min: usize, a_max: usize, p_max: f64 },
}

impl Policy {
    /// Draws a concrete action from this policy.
    pub fn sample(&self, rng: &mut impl Rng) -> usize {
        match *self {
            Policy::Deterministic(a) => a,
            Policy::Mixture { a_min, a_max, p_max } => {
                if rng.gen::<f64>() < p_max {
                    a_max
                } else {
                    a_min
                }
            }
        }
    }

    /// The expected `(reward, cost)` of this policy, given each action's current value.
    pub fn expected(&self, value_of: impl Fn(usize) -> RC) -> RC {
        match *self {
            Policy::Deterministic(a) => value_of(a),
            Policy::Mixture { a_min, a_max, p_max } => {
                p_max * value_of(a_max) + (1.0 - p_max) * value_of(a_min)
            }
        }
    }

    /// Probability this policy plays `action`. Zero for any action besides the (at most two)
    /// actions the policy ever plays.
    pub fn prob(&self, action: usize) -> f64 {
        match *self {
            Policy::Deterministic(a) => {
                if a == action {
                    1.0
                } else {
                    0.0
                }
            }
            Policy::Mixture { a_min, a_max, p_max } => {
                if action == a_max {
                    p_max
                } else if action == a_min {
                    1.0 - p_max
                } else {
                    0.0
                }
            }
        }
    }

    /// For a [`Policy::Mixture`], the other action of the pair given one of them; `None` for a
    /// [`Policy::Deterministic`] policy or an action that is not part of this policy at all.
    ///
    /// Used by the experiment driver's admissible-cost recursion (see
    /// [`crate::experiment`]), which needs `Q_C` of whichever action was *not* played this step.
    pub fn other_action(&self, action: usize) -> Option<usize> {
        match *self {
            Policy::Deterministic(_) => None,
            Policy::Mixture { a_min, a_max, .. } => {
                if action == a_max {
                    Some(a_min)
                } else if action == a_min {
                    Some(a_max)
                } else {
                    None
                }
            }
        }
    }
}

/// Selects the action to descend into (or, at the root with `ucb=false`, the action to
/// recommend) and builds the cost-constrained [`Policy`] around it.
///
/// For every legal (non-illegal) child, computes the scalarized value `Q_R(a) - lambda*Q_C(a)`,
/// optionally blended with its RAVE/AMAF estimate (`beta = n2/(n+n2+k*n*n2)`) and, when the
/// simulator supplies alpha-vector estimates for `state`, with those too. `ucb` adds the
/// exploration bonus from `ucb_table` (an unvisited child always wins when `ucb` is set).
///
/// [`TreeAlgorithm::Cc`] then opens a stochastic tie-break window of half-width
/// `bias(depth, n_best) + bias(depth, n_a)` around the best score (zero when `stochastic` is
/// false) and mixes the cheapest and most expensive actions inside it so the policy's expected
/// cost meets `admissible_cost` as closely as possible. [`TreeAlgorithm::Baseline`] instead
/// restricts the argmax to actions already under the cost bound, falling back to a uniformly
/// chosen legal action when none qualify, and always returns a degenerate policy.
#[allow(clippy::too_many_arguments)]
pub fn greedy_ucb<Sim: Simulator>(
    node: &VNode<Sim::State>,
    sim: &Sim,
    state: Option<&Sim::State>,
    depth: usize,
    ucb_table: &UcbTable,
    params: &SearchParams,
    lambda: f64,
    ucb: bool,
    stochastic: bool,
    rng: &mut impl Rng,
) -> Policy {
    let legal: Vec<usize> =
        node.children.iter().enumerate().filter(|(_, q)| !q.illegal).map(|(a, _)| a).collect();
    debug_assert!(!legal.is_empty(), "greedy_ucb called with no legal actions");

    let parent_n: u64 = legal.iter().map(|&a| node.children[a].value.count() as u64).sum();

    let scored: Vec<(usize, f64, f64)> = legal
        .iter()
        .map(|&a| {
            let q = &node.children[a];
            let n = q.value.count();
            let rc = q.value.value();
            let mut score = rc.r - lambda * rc.c;

            let n2 = q.amaf.count();
            if params.rave_k > 0.0 && n2 > 0.0 {
                let beta = n2 / (n + n2 + params.rave_k * n * n2);
                let amaf_rc = q.amaf.value();
                let amaf_score = amaf_rc.r - lambda * amaf_rc.c;
                score = (1.0 - beta) * score + beta * amaf_score;
            }

            if params.alpha_weight > 0.0 && sim.has_alpha() && n > 0.0 {
                if let Some(state) = state {
                    let alpha = sim.alpha_value(state, a);
                    score = (1.0 - params.alpha_weight) * score + params.alpha_weight * alpha;
                }
            }

            let q_plus = if ucb {
                if n <= 0.0 {
                    f64::INFINITY
                } else {
                    score + ucb_table.bonus(parent_n, n)
                }
            } else {
                score
            };

            (a, q_plus, rc.c)
        })
        .collect();

    match params.tree_algorithm {
        TreeAlgorithm::Cc => greedy_ucb_cc(node, &scored, depth, params.admissible_cost, stochastic, rng),
        TreeAlgorithm::Baseline => greedy_ucb_baseline(node, &scored, params.admissible_cost, rng),
    }
}

fn greedy_ucb_cc<S>(
    node: &VNode<S>,
    scored: &[(usize, f64, f64)],
    depth: usize,
    c_hat: f64,
    stochastic: bool,
    rng: &mut impl Rng,
) -> Policy {
    let best_score =
        scored.iter().map(|&(_, q, _)| q).fold(f64::NEG_INFINITY, |acc, q| acc.max(q));
    let best_candidates: Vec<&(usize, f64, f64)> =
        scored.iter().filter(|&&(_, q, _)| q == best_score).collect();
    let &(a_best, _, _) = best_candidates[rng.gen_range(0..best_candidates.len())];
    let n_best = node.children[a_best].value.count();

    let window: Vec<&(usize, f64, f64)> = scored
        .iter()
        .filter(|&&(a, q, _)| {
            let n_a = node.children[a].value.count();
            let tau = if stochastic { bias(depth, n_best) + bias(depth, n_a) } else { 0.0 };
            (best_score - q).abs() <= tau
        })
        .collect();

    let &(a_min, _, c_min) =
        *window.iter().min_by(|a, b| a.2.partial_cmp(&b.2).unwrap()).unwrap();
    let &(a_max, _, c_max) =
        *window.iter().max_by(|a, b| a.2.partial_cmp(&b.2).unwrap()).unwrap();

    if c_max <= c_hat {
        Policy::Deterministic(a_max)
    } else if c_min >= c_hat {
        Policy::Deterministic(a_min)
    } else {
        let p_min = (c_hat - c_max) / (c_min - c_max);
        let p_max = clamp(1.0 - p_min, 0.0, 1.0);
        Policy::Mixture { a_min, a_max, p_max }
    }
}

fn greedy_ucb_baseline<S>(
    node: &VNode<S>,
    scored: &[(usize, f64, f64)],
    c_hat: f64,
    rng: &mut impl Rng,
) -> Policy {
    let feasible: Vec<&(usize, f64, f64)> = scored.iter().filter(|&&(_, _, c)| c < c_hat).collect();

    if feasible.is_empty() {
        let legal: Vec<usize> = node
            .children
            .iter()
            .enumerate()
            .filter(|(_, q)| !q.illegal)
            .map(|(a, _)| a)
            .collect();
        return Policy::Deterministic(legal[rng.gen_range(0..legal.len())]);
    }

    let best_score =
        feasible.iter().map(|&&(_, q, _)| q).fold(f64::NEG_INFINITY, |acc, q| acc.max(q));
    let best: Vec<usize> =
        feasible.iter().filter(|&&&(_, q, _)| q == best_score).map(|&&(a, _, _)| a).collect();
    Policy::Deterministic(best[rng.gen_range(0..best.len())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::QNode;

    #[derive(Clone)]
    struct DummyState;

    struct DummySim;

    impl Simulator for DummySim {
        type State = DummyState;

        fn num_actions(&self) -> usize {
            2
        }
        fn num_observations(&self) -> usize {
            1
        }
        fn discount(&self) -> f64 {
            0.95
        }
        fn reward_range(&self) -> f64 {
            10.0
        }
        fn create_start_state(&self) -> DummyState {
            DummyState
        }
        fn step(&self, _state: &mut DummyState, _action: usize, rc: &mut RC) -> (usize, bool) {
            *rc = RC::ZERO;
            (0, false)
        }
    }

    fn node_with(values: &[(f64, f64, f64)]) -> VNode<DummyState> {
        let mut v: VNode<DummyState> = VNode::new();
        v.children = values
            .iter()
            .map(|&(count, r, c)| {
                let mut q = QNode::new(1);
                if count > 0.0 {
                    q.value.set(count, RC::new(r * count, c * count));
                }
                q
            })
            .collect();
        v
    }

    #[test]
    fn greedy_ucb_prefers_unvisited_children() {
        let v = node_with(&[(1.0, 0.5, 0.0), (0.0, 0.0, 0.0)]);
        let table = UcbTable::new(1.0);
        let params = SearchParams::default();
        let sim = DummySim;
        let mut rng = rand::thread_rng();
        let policy = greedy_ucb(&v, &sim, None, 0, &table, &params, 0.0, true, true, &mut rng);
        assert_eq!(policy.sample(&mut rng), 1);
    }

    #[test]
    fn greedy_ucb_skips_illegal_actions() {
        let mut v = node_with(&[(1.0, 10.0, 0.0), (1.0, 1.0, 0.0)]);
        v.children[0].illegal = true;
        let table = UcbTable::new(1.0);
        let params = SearchParams::default();
        let sim = DummySim;
        let mut rng = rand::thread_rng();
        let policy = greedy_ucb(&v, &sim, None, 0, &table, &params, 0.0, true, true, &mut rng);
        assert_eq!(policy.sample(&mut rng), 1);
    }

    #[test]
    fn cc_deterministic_when_best_already_feasible() {
        let v = node_with(&[(10.0, 5.0, 1.0), (10.0, 2.0, 0.5)]);
        let table = UcbTable::new(1.0);
        let params = SearchParams::default().with_admissible_cost(2.0);
        let sim = DummySim;
        let mut rng = rand::thread_rng();
        let policy = greedy_ucb(&v, &sim, None, 5, &table, &params, 0.0, false, false, &mut rng);
        assert_eq!(policy, Policy::Deterministic(0));
    }

    #[test]
    fn cc_mixes_to_hit_cost_bound_exactly() {
        let v = node_with(&[(10.0, 5.0, 2.0), (10.0, 1.0, 0.0)]);
        let table = UcbTable::new(1.0);
        let params = SearchParams::default().with_admissible_cost(1.0);
        let sim = DummySim;
        let mut rng = rand::thread_rng();
        let policy = greedy_ucb(&v, &sim, None, 5, &table, &params, 0.0, false, false, &mut rng);
        match policy {
            Policy::Mixture { a_min, a_max, .. } => {
                assert_eq!(a_max, 0);
                assert_eq!(a_min, 1);
                let expected =
                    policy.expected(|a| if a == 0 { RC::new(5.0, 2.0) } else { RC::new(1.0, 0.0) });
                assert!((expected.c - 1.0).abs() < 1e-9);
                assert!((policy.prob(0) + policy.prob(1) - 1.0).abs() < 1e-12);
            }
            _ => panic!("expected a mixture policy"),
        }
    }

    #[test]
    fn other_action_pairs_mixture_members() {
        let policy = Policy::Mixture { a_min: 1, a_max: 0, p_max: 0.5 };
        assert_eq!(policy.other_action(0), Some(1));
        assert_eq!(policy.other_action(1), Some(0));
        assert_eq!(policy.other_action(2), None);
        assert_eq!(Policy::Deterministic(0).other_action(0), None);
    }

    #[test]
    fn cc_falls_back_to_cheapest_when_infeasible() {
        let v = node_with(&[(10.0, 5.0, 9.0), (10.0, 1.0, 4.0)]);
        let table = UcbTable::new(1.0);
        let params = SearchParams::default().with_admissible_cost(1.0);
        let sim = DummySim;
        let mut rng = rand::thread_rng();
        let policy = greedy_ucb(&v, &sim, None, 5, &table, &params, 0.0, false, false, &mut rng);
        assert_eq!(policy, Policy::Deterministic(1));
    }

    #[test]
    fn baseline_restricts_to_feasible_actions() {
        let v = node_with(&[(10.0, 5.0, 9.0), (10.0, 1.0, 0.1)]);
        let table = UcbTable::new(1.0);
        let params = SearchParams::default()
            .with_tree_algorithm(TreeAlgorithm::Baseline)
            .with_admissible_cost(1.0);
        let sim = DummySim;
        let mut rng = rand::thread_rng();
        let policy = greedy_ucb(&v, &sim, None, 5, &table, &params, 0.0, false, false, &mut rng);
        assert_eq!(policy, Policy::Deterministic(1));
    }

    #[test]
    fn baseline_falls_back_to_uniform_when_all_infeasible() {
        let v = node_with(&[(10.0, 5.0, 9.0), (10.0, 1.0, 4.0)]);
        let table = UcbTable::new(1.0);
        let params = SearchParams::default()
            .with_tree_algorithm(TreeAlgorithm::Baseline)
            .with_admissible_cost(1.0);
        let sim = DummySim;
        let mut rng = rand::thread_rng();
        let policy = greedy_ucb(&v, &sim, None, 5, &table, &params, 0.0, false, false, &mut rng);
        match policy {
            Policy::Deterministic(a) => assert!(a == 0 || a == 1),
            _ => panic!("baseline always returns a deterministic policy"),
        }
    }
}
