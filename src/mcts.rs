//! The online planner: ties the belief, the search tree, and the selector together
//! into `select_action` / `update` calls a driver loop makes once per real step.

use std::cell::Cell;
use std::time::Instant;

use log::{debug, trace, warn};
use rand::Rng;

use crate::config::{SearchParams, TreeAlgorithm};
use crate::error::{MctsError, Result};
use crate::history::History;
use crate::policy::{add_rave, expand_node, greedy_ucb, rollout, Policy, UcbTable};
use crate::rc::RC;
use crate::simulator::{Particles, Phase, Simulator, Status};
use crate::stats::SearchStatistics;
use crate::tree::VNode;
use crate::utils::{clamp, sign};

/// The online constrained-POMDP planner.
///
/// Generic over the `Simulator` it searches, so the hot recursive descent
/// (`simulate_v`/`simulate_q`) monomorphizes per domain instead of going through a trait
/// object. `GreedyUCB` is the only selector this engine uses, so unlike a general-purpose
/// game-tree search it has no swappable policy objects.
pub struct Mcts<Sim: Simulator> {
    sim: Sim,
    root: VNode<Sim::State>,
    params: SearchParams,
    lambda: f64,
    ucb_table: UcbTable,
    history: History,
    status: Status,
    stats: SearchStatistics,
}

/// Bundles the parameters constant across one simulation's recursive descent, so the
/// free functions below don't have to thread them individually.
struct Ctx<'a> {
    ucb_table: &'a UcbTable,
    params: &'a SearchParams,
    lambda: f64,
    max_depth: usize,
    nodes_expanded: Cell<usize>,
    max_depth_reached: Cell<usize>,
}

impl<Sim: Simulator> Mcts<Sim> {
    /// Creates a new planner over `sim`, seeding the root belief with `params.num_start_states`
    /// particles drawn from the simulator's initial-state distribution.
    ///
    /// Errors with [`MctsError::InvalidConfiguration`] if `sim` reports zero actions or
    /// observations, or a discount factor outside `(0, 1]` — these are checked once here
    /// rather than surfacing as a panic deep inside a simulation loop.
    pub fn new(sim: Sim, params: SearchParams) -> Result<Self> {
        if sim.num_actions() == 0 {
            return Err(MctsError::InvalidConfiguration("simulator reports zero actions".into()));
        }
        if sim.num_observations() == 0 {
            return Err(MctsError::InvalidConfiguration("simulator reports zero observations".into()));
        }
        let discount = sim.discount();
        if !(discount > 0.0 && discount <= 1.0) {
            return Err(MctsError::InvalidConfiguration(format!(
                "discount {discount} is outside (0, 1]"
            )));
        }

        let mut root = VNode::new();
        for _ in 0..params.num_start_states.max(1) {
            root.belief.add_sample(sim.create_start_state());
        }
        let lambda = params.initial_lambda;
        let ucb_table = UcbTable::new(params.exploration_constant);

        Ok(Mcts {
            sim,
            root,
            params,
            lambda,
            ucb_table,
            history: History::new(),
            status: Status::new(),
            stats: SearchStatistics::new(),
        })
    }

    /// Current Lagrange multiplier.
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Current admissible-cost bound the root policy targets.
    pub fn admissible_cost(&self) -> f64 {
        self.params.admissible_cost
    }

    /// Overrides the admissible-cost bound used by the next `select_action` call.
    pub fn set_admissible_cost(&mut self, c_hat: f64) {
        self.params.admissible_cost = c_hat;
    }

    /// Statistics from the most recent `select_action` call.
    pub fn statistics(&self) -> &SearchStatistics {
        &self.stats
    }

    /// The root's current scalarized expected cost `Q_C`.
    pub fn q_c(&self) -> f64 {
        self.root.value.value().c
    }

    /// The root's current scalarized expected reward `Q_R`.
    pub fn q_r(&self) -> f64 {
        self.root.value.value().r
    }

    /// The root's current `Q_C(action)` estimate, used by a driver loop to recurse the
    /// admissible-cost bound via the policy actually played (see `Policy::prob`).
    pub fn q_c_of(&self, action: usize) -> f64 {
        self.root.children[action].value.value().c
    }

    /// The simulator this planner was constructed with, e.g. so a driver loop can call
    /// `select_random` for the particle-deprivation fallback.
    pub fn simulator(&self) -> &Sim {
        &self.sim
    }

    /// The action/observation trace committed so far.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// The planner's current phase/particle status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Runs `params.num_simulations` simulations from the root and returns the resulting
    /// root-level policy.
    ///
    /// After every simulation, when using [`TreeAlgorithm::Cc`], nudges `lambda` by a
    /// diminishing-step subgradient on the Lagrangian: `lambda += (1/(i+1))*sign(Q_C(a*) -
    /// c_hat)`, where `a*` is the current greedy (non-stochastic) recommendation. This is what
    /// lets the scalarization track the admissible cost bound as the tree's value estimates
    /// firm up, rather than requiring the caller to supply observed per-episode costs.
    ///
    /// Errors if the root belief is empty: there is nothing left to plan from.
    pub fn select_action(&mut self) -> Result<Policy> {
        if self.root.belief.is_empty() {
            return Err(MctsError::NoLegalActions);
        }

        if !self.root.is_expanded() {
            let sample = self.root.belief.create_sample(&self.sim, &mut rand::thread_rng());
            expand_node(
                &mut self.root,
                &self.sim,
                &sample,
                &self.history,
                &self.status,
                self.params.tree_knowledge,
                &self.params,
            );
        }

        let max_depth = self
            .params
            .resolve_max_depth(self.sim.discount(), self.params.max_depth as f64);

        self.stats = SearchStatistics::new();
        let start = Instant::now();

        let mut rng = rand::thread_rng();
        let mut nodes_expanded = 0;
        let mut max_depth_reached = 0;

        for i in 0..self.params.num_simulations {
            let ctx = Ctx {
                ucb_table: &self.ucb_table,
                params: &self.params,
                lambda: self.lambda,
                max_depth,
                nodes_expanded: Cell::new(nodes_expanded),
                max_depth_reached: Cell::new(max_depth_reached),
            };

            if self.params.use_tree {
                Self::uct_search(&self.sim, &mut self.root, &self.history, self.status, &ctx, &mut rng);
            } else {
                Self::rollout_search(&self.sim, &mut self.root, &self.history, self.status, &self.params, &ctx, max_depth, &mut rng);
            }
            self.stats.simulations_run = i + 1;
            nodes_expanded = ctx.nodes_expanded.get();
            max_depth_reached = ctx.max_depth_reached.get();

            if self.params.tree_algorithm == TreeAlgorithm::Cc {
                let greedy = greedy_ucb(
                    &self.root,
                    &self.sim,
                    None,
                    0,
                    &self.ucb_table,
                    &self.params,
                    self.lambda,
                    false,
                    false,
                    &mut rng,
                );
                let a_star = greedy.sample(&mut rng);
                let v_c = self.root.children[a_star].value.value().c;
                let step = 1.0 / (i as f64 + 1.0);
                let g = sign(v_c - self.params.admissible_cost);
                self.lambda = clamp(self.lambda + step * g, 0.0, self.params.lambda_max);
            }
        }

        self.stats.total_time = start.elapsed();
        self.stats.nodes_expanded = nodes_expanded;
        self.stats.max_tree_depth_reached = max_depth_reached;

        trace!("select_action: {}", self.stats.summary());
        let mut rng = rand::thread_rng();
        Ok(greedy_ucb(
            &self.root,
            &self.sim,
            None,
            0,
            &self.ucb_table,
            &self.params,
            self.lambda,
            false,
            true,
            &mut rng,
        ))
    }

    /// Runs a single tree-search simulation from the root.
    fn uct_search(
        sim: &Sim,
        root: &mut VNode<Sim::State>,
        history: &History,
        status: Status,
        ctx: &Ctx,
        rng: &mut impl Rng,
    ) {
        let mut state = root.belief.create_sample(sim, rng);
        let mut history = history.clone();
        let mut status = status;
        status.phase = Phase::Tree;
        let start_len = history.len();

        let total = simulate_v(sim, root, &mut state, &mut history, &mut status, 0, ctx, rng);
        root.value.add(total);

        history.truncate(start_len);
    }

    /// Runs a single flat-rollout simulation from the root, used when `params.use_tree` is
    /// false: one real action is taken at the root's knowledge tier, then the shared
    /// `rollout` default policy plays out the remaining depth budget.
    fn rollout_search(
        sim: &Sim,
        root: &mut VNode<Sim::State>,
        history: &History,
        status: Status,
        params: &SearchParams,
        ctx: &Ctx,
        max_depth: usize,
        rng: &mut impl Rng,
    ) {
        let mut state = root.belief.create_sample(sim, rng);
        let mut history = history.clone();
        let mut status = status;
        status.phase = Phase::Rollout;
        let start_len = history.len();

        let action = sim.select_random(&state, &history, &status, params.tree_knowledge, rng);

        let mut step_rc = RC::ZERO;
        let (obs, terminal) = sim.step(&mut state, action, &mut step_rc);
        history.add(action, obs);

        let total = if terminal {
            step_rc
        } else {
            let future = rollout(sim, &mut state, &mut history, &mut status, 1, max_depth, params, rng);
            ctx.max_depth_reached.set(ctx.max_depth_reached.get().max(1));
            step_rc + sim.discount() * future
        };

        root.children[action].value.add(total);
        root.value.add(total);

        history.truncate(start_len);
    }

    /// Commits to `action`, observes `observation`, and advances the belief to the
    /// corresponding child node (discarding the rest of the tree).
    ///
    /// Returns `Ok(true)` on a normal transition. Returns `Ok(false)` if the belief ran out
    /// of consistent particles and the simulator's `local_move` recovery could not produce
    /// any either (particle deprivation); this is an expected, recoverable event, not an
    /// error, and the caller should fall back to the simulator's own default play for the
    /// rest of the episode.
    pub fn update(&mut self, action: usize, observation: usize) -> Result<bool> {
        if action >= self.root.children.len() {
            return Err(MctsError::InvalidConfiguration(format!(
                "update: action {action} out of range"
            )));
        }

        let num_actions = self.sim.num_actions();
        let num_observations = self.sim.num_observations();

        let mut new_root = VNode::new();
        let had_child = {
            let q = &mut self.root.children[action];
            match q.child_mut(observation) {
                Some(child) => {
                    new_root.belief.take_all(&mut child.belief);
                    true
                }
                None => false,
            }
        };

        if !had_child || new_root.belief.is_empty() {
            let recovered = self.recover_particles(action, observation, &mut new_root);
            self.status.particles = if recovered > 0 {
                Particles::Resampled
            } else {
                Particles::OutOfParticles
            };
            if recovered == 0 {
                warn!("particle deprivation: no consistent particle found for a{action}/o{observation}");
                self.history.add(action, observation);
                return Ok(false);
            }
        } else {
            self.status.particles = Particles::Consistent;
        }

        new_root.expand(num_actions, num_observations);
        self.root = new_root;
        self.history.add(action, observation);
        debug!("update: committed a{action}/o{observation}, {} particles", self.root.belief.num_samples());
        Ok(true)
    }

    /// Attempts to repopulate `new_root`'s belief by resampling from the old root's belief
    /// and either confirming the observation matches directly, or perturbing the particle
    /// with `sim.local_move` until it is consistent with `observation`.
    ///
    /// Tries for up to `params.max_attempts` draws to collect `params.num_transforms`
    /// particles.
    fn recover_particles(&mut self, action: usize, observation: usize, new_root: &mut VNode<Sim::State>) -> usize {
        let target = self.params.num_transforms.max(1);
        let attempts = self.params.max_attempts.max(target);
        let mut rng = rand::thread_rng();
        let mut recovered = 0;

        for _ in 0..attempts {
            if recovered >= target || self.root.belief.is_empty() {
                break;
            }
            let mut candidate = self.root.belief.create_sample(&self.sim, &mut rng);
            let mut step_rc = RC::ZERO;
            let (obs, _terminal) = self.sim.step(&mut candidate, action, &mut step_rc);
            if obs == observation {
                new_root.belief.add_sample(candidate);
                recovered += 1;
            } else if self.sim.local_move(&mut candidate, &self.history, observation, &self.status) {
                new_root.belief.add_sample(candidate);
                recovered += 1;
            }
        }

        recovered
    }
}

/// Recursively descends an observation node: expanding it (and rolling out) on first visit,
/// otherwise selecting an action via `greedy_ucb` and recursing through `simulate_q`.
fn simulate_v<Sim: Simulator>(
    sim: &Sim,
    v: &mut VNode<Sim::State>,
    state: &mut Sim::State,
    history: &mut History,
    status: &mut Status,
    depth: usize,
    ctx: &Ctx,
    rng: &mut impl Rng,
) -> RC {
    ctx.max_depth_reached.set(ctx.max_depth_reached.get().max(depth));

    if depth >= ctx.max_depth {
        return RC::ZERO;
    }

    if !v.is_expanded() {
        expand_node(v, sim, state, history, status, ctx.params.tree_knowledge, ctx.params);
        ctx.nodes_expanded.set(ctx.nodes_expanded.get() + 1);

        status.phase = Phase::Rollout;
        let total = rollout(sim, state, history, status, depth, ctx.max_depth, ctx.params, rng);
        status.phase = Phase::Tree;

        v.value.add(total);
        return total;
    }

    if depth == 1 {
        let particle = sim.copy(state);
        v.belief.add_sample(particle);
    }

    let entry_len = history.len();

    let policy = greedy_ucb(v, sim, Some(state), depth, ctx.ucb_table, ctx.params, ctx.lambda, true, true, rng);
    let action = policy.sample(rng);
    let total = simulate_q(sim, v, action, state, history, status, depth, ctx, rng);
    v.value.add(total);

    if ctx.params.rave_k > 0.0 {
        let trace: Vec<_> = history.iter().skip(entry_len).copied().collect();
        add_rave(v, &trace, total, ctx.params);
    }

    total
}

/// Steps `state` under `action`, routes the resulting observation to (or creates) the
/// corresponding child V-node, and recurses unless the step was terminal.
///
/// A child V-node is only materialized once the acting `QNode` has been visited at least
/// `expand_count` times (progressive widening, spec §4.5's `ExpandCount` gate); below that
/// threshold the simulation instead falls through to a rollout from the post-step state,
/// so the tree doesn't grow a fresh node per path on every single simulation.
fn simulate_q<Sim: Simulator>(
    sim: &Sim,
    v: &mut VNode<Sim::State>,
    action: usize,
    state: &mut Sim::State,
    history: &mut History,
    status: &mut Status,
    depth: usize,
    ctx: &Ctx,
    rng: &mut impl Rng,
) -> RC {
    let mut step_rc = RC::ZERO;
    let (obs, terminal) = sim.step(state, action, &mut step_rc);
    history.add(action, obs);

    let total = if terminal {
        step_rc
    } else {
        let child_absent = v.children[action].child(obs).is_none();
        let ready_to_expand = v.children[action].value.count() >= ctx.params.expand_count as f64;
        if child_absent && ready_to_expand {
            let particle = sim.copy(state);
            let child = v.children[action].child_or_insert(obs);
            child.belief.add_sample(particle);
        }

        let future = if let Some(child) = v.children[action].child_mut(obs) {
            simulate_v(sim, child, state, history, status, depth + 1, ctx, rng)
        } else {
            status.phase = Phase::Rollout;
            let r = rollout(sim, state, history, status, depth + 1, ctx.max_depth, ctx.params, rng);
            status.phase = Phase::Tree;
            r
        };
        step_rc + sim.discount() * future
    };

    v.children[action].value.add(total);
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchParams;
    use crate::simulator::KnowledgeLevel;

    /// A one-step bandit: `num_actions` arms, action `i` deterministically pays reward `i`
    /// and cost `i`, then terminates. Used to exercise `select_action`/`update` end to end
    /// without needing a full domain.
    struct BanditSim {
        arms: usize,
    }

    impl Simulator for BanditSim {
        type State = ();
        fn num_actions(&self) -> usize {
            self.arms
        }
        fn num_observations(&self) -> usize {
            1
        }
        fn discount(&self) -> f64 {
            1.0
        }
        fn reward_range(&self) -> f64 {
            self.arms as f64
        }
        fn create_start_state(&self) -> Self::State {}
        fn step(&self, _state: &mut Self::State, action: usize, rc: &mut RC) -> (usize, bool) {
            rc.r = action as f64;
            rc.c = action as f64;
            (0, true)
        }
    }

    #[test]
    fn select_action_prefers_highest_reward_arm_when_unconstrained() {
        let sim = BanditSim { arms: 4 };
        let params = SearchParams::default()
            .with_num_simulations(500)
            .with_admissible_cost(f64::INFINITY)
            .with_tree_knowledge(KnowledgeLevel::Legal)
            .with_rollout_knowledge(KnowledgeLevel::Legal)
            .with_num_start_states(10);
        let mut mcts = Mcts::new(sim, params).unwrap();
        let policy = mcts.select_action().unwrap();
        assert_eq!(policy.sample(&mut rand::thread_rng()), 3);
    }

    #[test]
    fn select_action_respects_admissible_cost() {
        let sim = BanditSim { arms: 4 };
        let params = SearchParams::default()
            .with_num_simulations(500)
            .with_admissible_cost(1.0)
            .with_tree_knowledge(KnowledgeLevel::Legal)
            .with_rollout_knowledge(KnowledgeLevel::Legal)
            .with_num_start_states(10);
        let mut mcts = Mcts::new(sim, params).unwrap();
        let policy = mcts.select_action().unwrap();
        let mut rng = rand::thread_rng();
        let draws = 200;
        let avg_cost: f64 =
            (0..draws).map(|_| policy.sample(&mut rng) as f64).sum::<f64>() / draws as f64;
        assert!(avg_cost <= 1.5, "expected average cost near the 1.0 bound, got {avg_cost}");
    }

    #[test]
    fn update_advances_root_and_history() {
        let sim = BanditSim { arms: 2 };
        let params = SearchParams::default().with_num_simulations(20).with_num_start_states(5);
        let mut mcts = Mcts::new(sim, params).unwrap();
        mcts.select_action().unwrap();
        let ok = mcts.update(0, 0).unwrap();
        assert!(ok);
        assert_eq!(mcts.history.len(), 1);
    }

    #[test]
    fn lambda_moves_toward_constraint_over_simulations() {
        let sim = BanditSim { arms: 4 };
        let params = SearchParams::default()
            .with_num_simulations(200)
            .with_admissible_cost(0.5)
            .with_initial_lambda(0.0)
            .with_num_start_states(10);
        let mut mcts = Mcts::new(sim, params).unwrap();
        mcts.select_action().unwrap();
        assert!(mcts.lambda() > 0.0);
    }

    #[test]
    fn baseline_tree_algorithm_always_returns_deterministic_policy() {
        let sim = BanditSim { arms: 4 };
        let params = SearchParams::default()
            .with_num_simulations(200)
            .with_admissible_cost(1.0)
            .with_tree_algorithm(TreeAlgorithm::Baseline)
            .with_num_start_states(10);
        let mut mcts = Mcts::new(sim, params).unwrap();
        let policy = mcts.select_action().unwrap();
        assert!(matches!(policy, Policy::Deterministic(_)));
    }
}
