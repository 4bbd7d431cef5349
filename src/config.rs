//! Configuration for the search engine and the experiment driver.
//!
//! `SearchParams` controls a single call to [`crate::mcts::Mcts`]; `ExperimentParams`
//! controls an outer sweep of many episodes run by [`crate::experiment`].

use std::time::Duration;

use crate::simulator::KnowledgeLevel;

/// Which root-level selection rule `select_action` uses.
///
/// `Cc` is the full scalarized-UCB selector with the stochastic tie-breaking policy that
/// interpolates between two actions to hit `admissible_cost` exactly. `Baseline` is the
/// simpler cost-filtered greedy rule: restrict to actions whose estimated cost is already
/// under the bound, falling back to a uniformly chosen legal action when none qualify.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeAlgorithm {
    Cc,
    Baseline,
}

/// Parameters controlling one planner instance.
///
/// Built with the builder methods below; `SearchParams::default()` gives reasonable
/// values for a small discrete domain but `c_hat`, `num_actions`/`num_observations`-scale
/// fields are domain dependent and should usually be set explicitly.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Exploration constant used inside the UCB bonus, `c` in `c*sqrt(ln(N+1)/n)`.
    pub exploration_constant: f64,

    /// Admissible expected-cost bound `c_hat` the Lagrangian tie-break targets.
    pub admissible_cost: f64,

    /// Initial Lagrange multiplier `lambda`. The reference algorithm hardcodes this to 2.0;
    /// kept configurable here since nothing about the search's correctness depends on the
    /// starting point, only on the dual-ascent step that follows.
    pub initial_lambda: f64,

    /// Upper bound lambda is clamped to after each update; the lower bound is always zero.
    pub lambda_max: f64,

    /// Which root-level / tree-descent selection rule to use.
    pub tree_algorithm: TreeAlgorithm,

    /// Number of simulations run per call to `select_action`.
    pub num_simulations: usize,

    /// Visit-count threshold a `QNode` must reach before its child V-node is actually
    /// expanded; below it, `simulate_q` rolls out instead of descending into a fresh node.
    /// Progressive widening: without this gate the tree grows a brand-new node per path on
    /// every simulation instead of concentrating visits before committing to a child.
    pub expand_count: usize,

    /// Maximum tree/rollout depth, in plies, before a search path is cut off.
    pub max_depth: usize,

    /// Desired value accuracy passed to `Simulator::horizon` to derive `max_depth`
    /// for infinite-horizon (discount < 1.0) domains. Ignored if `max_depth` is set
    /// explicitly via `with_max_depth`.
    pub search_accuracy: f64,

    /// Whether to build and reuse a search tree (`true`) or fall back to flat
    /// Monte Carlo rollouts from the root (`false`).
    pub use_tree: bool,

    /// Knowledge tier used to install priors when expanding a V-node.
    pub tree_knowledge: KnowledgeLevel,

    /// Knowledge tier used to pick actions during rollout.
    pub rollout_knowledge: KnowledgeLevel,

    /// RAVE/AMAF equivalence constant `k` in `beta = n2/(n+n2+k*n*n2)`. Zero disables RAVE.
    pub rave_k: f64,

    /// Geometric discount applied to RAVE updates for actions further down the trace.
    pub rave_discount: f64,

    /// Weight blending the alpha-vector hook's lower bound into selection, when a
    /// simulator provides one. Zero disables the hook (the bundled simulators never set
    /// `has_alpha`, so this is a vestigial knob exercised only by dedicated unit tests).
    pub alpha_weight: f64,

    /// Initial pseudo-visit count per child used as a `Smart`-tier prior, 0.0 means no
    /// optimistic pinning.
    pub unvisited_bias: f64,

    /// Number of particles seeding a freshly constructed root's belief.
    pub num_start_states: usize,

    /// Number of local-transform particles `update` tries to recover on particle
    /// deprivation.
    pub num_transforms: usize,

    /// Total attempts `update`'s particle-deprivation recovery may make across both the
    /// direct-match and `local_move` paths before giving up.
    pub max_attempts: usize,

    /// Process-wide node-pool size hint, accepted for symmetry with the crate this engine
    /// generalizes from but not backed by an actual allocator: the tree is plain owned
    /// `Box`/`Vec` recursion (see [`crate::tree`]).
    pub node_pool_size: usize,

    /// Process-wide node-pool chunk-growth hint, likewise unused.
    pub node_pool_chunk_size: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            exploration_constant: 1.0,
            admissible_cost: f64::INFINITY,
            initial_lambda: 2.0,
            lambda_max: 100.0,
            tree_algorithm: TreeAlgorithm::Cc,
            num_simulations: 1_000,
            expand_count: 1,
            max_depth: 100,
            search_accuracy: 0.01,
            use_tree: true,
            tree_knowledge: KnowledgeLevel::Legal,
            rollout_knowledge: KnowledgeLevel::Legal,
            rave_k: 0.0,
            rave_discount: 0.99,
            alpha_weight: 0.0,
            unvisited_bias: 0.0,
            num_start_states: 100,
            num_transforms: 1,
            max_attempts: 200,
            node_pool_size: 0,
            node_pool_chunk_size: 0,
        }
    }
}

impl SearchParams {
    pub fn with_exploration_constant(mut self, c: f64) -> Self {
        self.exploration_constant = c;
        self
    }

    pub fn with_admissible_cost(mut self, c_hat: f64) -> Self {
        self.admissible_cost = c_hat;
        self
    }

    pub fn with_initial_lambda(mut self, lambda: f64) -> Self {
        self.initial_lambda = lambda;
        self
    }

    pub fn with_lambda_max(mut self, max: f64) -> Self {
        self.lambda_max = max;
        self
    }

    pub fn with_tree_algorithm(mut self, algorithm: TreeAlgorithm) -> Self {
        self.tree_algorithm = algorithm;
        self
    }

    pub fn with_num_simulations(mut self, n: usize) -> Self {
        self.num_simulations = n;
        self
    }

    pub fn with_expand_count(mut self, n: usize) -> Self {
        self.expand_count = n;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_search_accuracy(mut self, accuracy: f64) -> Self {
        self.search_accuracy = accuracy;
        self
    }

    pub fn with_use_tree(mut self, use_tree: bool) -> Self {
        self.use_tree = use_tree;
        self
    }

    pub fn with_tree_knowledge(mut self, level: KnowledgeLevel) -> Self {
        self.tree_knowledge = level;
        self
    }

    pub fn with_rollout_knowledge(mut self, level: KnowledgeLevel) -> Self {
        self.rollout_knowledge = level;
        self
    }

    pub fn with_rave(mut self, k: f64, discount: f64) -> Self {
        self.rave_k = k;
        self.rave_discount = discount;
        self
    }

    pub fn with_alpha_weight(mut self, weight: f64) -> Self {
        self.alpha_weight = weight;
        self
    }

    pub fn with_unvisited_bias(mut self, bias: f64) -> Self {
        self.unvisited_bias = bias;
        self
    }

    pub fn with_num_start_states(mut self, n: usize) -> Self {
        self.num_start_states = n;
        self
    }

    pub fn with_num_transforms(mut self, n: usize) -> Self {
        self.num_transforms = n;
        self
    }

    pub fn with_max_attempts(mut self, n: usize) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn with_node_pool_config(mut self, size: usize, chunk_size: usize) -> Self {
        self.node_pool_size = size;
        self.node_pool_chunk_size = chunk_size;
        self
    }

    /// Resolves the effective max depth, deriving it from the simulator's horizon
    /// when the domain is infinite-horizon and `max_depth` was left at a placeholder.
    pub fn resolve_max_depth(&self, discount: f64, undiscounted_horizon: f64) -> usize {
        if discount >= 1.0 {
            self.max_depth.min(undiscounted_horizon as usize)
        } else {
            let horizon = self.search_accuracy.ln() / discount.ln();
            self.max_depth.min(horizon.ceil().max(0.0) as usize)
        }
    }
}

/// Parameters controlling an outer experiment: how many episodes to run, for how
/// many steps, and across what doubling sweep of simulation counts (see
/// [`crate::experiment::run_sweep`] and the tab-separated table it produces).
#[derive(Debug, Clone)]
pub struct ExperimentParams {
    /// Search parameters shared by every episode in the sweep. `num_simulations`,
    /// `num_start_states`, `num_transforms`, and `max_attempts` are overridden per sweep
    /// point by the doubling schedule below.
    pub search: SearchParams,

    /// Number of independent episodes run per sweep point.
    pub episodes_per_point: usize,

    /// Maximum number of steps run within a single episode before it is cut off.
    pub max_steps_per_episode: usize,

    /// Smallest `i` in the `num_simulations = 2^i` doubling sweep.
    pub min_doubles: u32,

    /// Largest `i` in the `num_simulations = 2^i` doubling sweep.
    pub max_doubles: u32,

    /// Offset applied to `i` when deriving `num_transforms = max(1, 2^(i+transform_doubles))`.
    /// Typically negative, since far fewer transform particles are needed than simulations.
    pub transform_doubles: i32,

    /// Multiplier applied to `num_transforms` to derive `max_attempts`.
    pub transform_attempts: usize,

    /// Optional wall-clock budget for a single episode; exceeding it ends the episode with
    /// whatever partial statistics have accumulated, rather than propagating an error.
    pub max_episode_wall_time: Option<Duration>,
}

impl ExperimentParams {
    pub fn new(search: SearchParams) -> Self {
        ExperimentParams {
            search,
            episodes_per_point: 100,
            max_steps_per_episode: 200,
            min_doubles: 0,
            max_doubles: 10,
            transform_doubles: -4,
            transform_attempts: 10,
            max_episode_wall_time: None,
        }
    }

    pub fn with_episodes_per_point(mut self, n: usize) -> Self {
        self.episodes_per_point = n;
        self
    }

    pub fn with_max_steps_per_episode(mut self, n: usize) -> Self {
        self.max_steps_per_episode = n;
        self
    }

    pub fn with_doubles_range(mut self, min_doubles: u32, max_doubles: u32) -> Self {
        self.min_doubles = min_doubles;
        self.max_doubles = max_doubles;
        self
    }

    pub fn with_transform_doubles(mut self, transform_doubles: i32) -> Self {
        self.transform_doubles = transform_doubles;
        self
    }

    pub fn with_transform_attempts(mut self, transform_attempts: usize) -> Self {
        self.transform_attempts = transform_attempts;
        self
    }

    pub fn with_max_episode_wall_time(mut self, max: Duration) -> Self {
        self.max_episode_wall_time = Some(max);
        self
    }

    /// `(num_simulations, num_start_states, num_transforms, max_attempts)` for sweep point `i`.
    pub fn sweep_point(&self, i: u32) -> (usize, usize, usize, usize) {
        let num_simulations = 1usize << i;
        let num_start_states = 1usize << i;
        let num_transforms = 2f64.powi(i as i32 + self.transform_doubles).max(1.0) as usize;
        let max_attempts = num_transforms * self.transform_attempts.max(1);
        (num_simulations, num_start_states, num_transforms, max_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let p = SearchParams::default()
            .with_exploration_constant(2.0)
            .with_admissible_cost(5.0)
            .with_num_simulations(256)
            .with_tree_algorithm(TreeAlgorithm::Baseline);
        assert_eq!(p.exploration_constant, 2.0);
        assert_eq!(p.admissible_cost, 5.0);
        assert_eq!(p.num_simulations, 256);
        assert_eq!(p.tree_algorithm, TreeAlgorithm::Baseline);
    }

    #[test]
    fn default_lambda_matches_reference_initialisation() {
        assert_eq!(SearchParams::default().initial_lambda, 2.0);
    }

    #[test]
    fn default_expand_count_matches_reference_initialisation() {
        assert_eq!(SearchParams::default().expand_count, 1);
    }

    #[test]
    fn resolve_max_depth_uses_discount_horizon() {
        let p = SearchParams::default().with_max_depth(1_000).with_search_accuracy(0.01);
        let depth = p.resolve_max_depth(0.9, 0.0);
        assert!(depth < 1_000);
        assert!(depth > 0);
    }

    #[test]
    fn resolve_max_depth_caps_undiscounted_horizon() {
        let p = SearchParams::default().with_max_depth(1_000);
        let depth = p.resolve_max_depth(1.0, 50.0);
        assert_eq!(depth, 50);
    }

    #[test]
    fn experiment_params_builder() {
        let e = ExperimentParams::new(SearchParams::default())
            .with_episodes_per_point(10)
            .with_doubles_range(0, 5);
        assert_eq!(e.episodes_per_point, 10);
        assert_eq!(e.max_doubles, 5);
    }

    #[test]
    fn sweep_point_doubles_simulations_and_floors_transforms_at_one() {
        let e = ExperimentParams::new(SearchParams::default()).with_transform_doubles(-4);
        let (sims0, start0, transforms0, attempts0) = e.sweep_point(0);
        assert_eq!(sims0, 1);
        assert_eq!(start0, 1);
        assert_eq!(transforms0, 1);
        assert_eq!(attempts0, 1 * e.transform_attempts);

        let (sims6, _, transforms6, _) = e.sweep_point(6);
        assert_eq!(sims6, 64);
        assert_eq!(transforms6, 4);
    }
}
