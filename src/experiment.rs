//! The outer driver: runs a planner against a real simulator episode by episode, and sweeps
//! simulation-count doublings to produce the tab-separated table a benchmark run reports.
//!
//! Grounded on `experiment.cpp`/`experiment.h` from the reference CC-POMCP implementation;
//! `run_episode` is `EXPERIMENT::Run`, `multi_run` is `EXPERIMENT::MultiRun`, and `run_sweep` is
//! `EXPERIMENT::DiscountedReturn`.

use std::fmt;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::config::{ExperimentParams, SearchParams};
use crate::error::Result;
use crate::mcts::Mcts;
use crate::rc::RC;
use crate::simulator::Simulator;
use crate::stats::RunningStats;

/// Outcome of one episode: real-world steps taken and the reward/cost accumulated both ways.
#[derive(Debug, Clone, Copy)]
pub struct EpisodeResult {
    pub wall_time: Duration,
    pub time_steps: usize,
    pub discounted_reward: f64,
    pub discounted_cost: f64,
    pub undiscounted_reward: f64,
    pub undiscounted_cost: f64,
}

impl EpisodeResult {
    fn one_step_time(&self) -> f64 {
        if self.time_steps == 0 {
            0.0
        } else {
            self.wall_time.as_secs_f64() / self.time_steps as f64
        }
    }
}

/// Computes the admissible-cost bound `update` should see *next* step, given the policy and
/// reward-cost the real environment just produced.
///
/// A [`crate::policy::Policy::Deterministic`] policy simply subtracts off the observed cost and
/// discounts the remainder back up: `(c_hat - rc.c) / gamma`. A
/// [`crate::policy::Policy::Mixture`] instead recurses only along the branch actually played,
/// crediting the *other* branch's current `Q_C` estimate for the probability mass that didn't
/// play this step, then floors the result at zero (a negative budget would make every future
/// action "too expensive" even though the constraint only binds in expectation).
fn next_admissible_cost(
    mcts: &Mcts<impl Simulator>,
    action: usize,
    policy: crate::policy::Policy,
    rc: RC,
    c_hat: f64,
    gamma: f64,
) -> f64 {
    match policy.other_action(action) {
        None => (c_hat - rc.c) / gamma,
        Some(other) => {
            let p = policy.prob(action);
            let q_other = mcts.q_c_of(other);
            ((c_hat - p * rc.c - (1.0 - p) * q_other) / (gamma * p)).max(0.0)
        }
    }
}

/// Plays one episode: repeatedly plans with a fresh [`Mcts`] over `sim`, acts on the real
/// environment `real`, and feeds the observation back in, up to `max_steps` real actions.
///
/// On particle deprivation (`Mcts::update` returning `Ok(false)`), finishes the remaining steps
/// by asking the search simulator for [`Simulator::select_random`] actions under full knowledge
/// of the real state — matching the reference implementation's comment that this is the one
/// place the real state is intentionally handed to the model, since there is no belief left to
/// plan from.
pub fn run_episode<Sim: Simulator>(
    real: &Sim,
    sim: Sim,
    params: SearchParams,
    max_steps: usize,
) -> Result<EpisodeResult> {
    let rollout_knowledge = params.rollout_knowledge;
    let gamma = real.discount();
    let mut mcts = Mcts::new(sim, params)?;
    let mut state = real.create_start_state();

    let mut discount = 1.0;
    let mut discounted = RC::ZERO;
    let mut undiscounted = RC::ZERO;
    let mut steps = 0;
    let mut out_of_particles = false;
    let start = Instant::now();

    while steps < max_steps {
        let policy = mcts.select_action()?;
        let action = policy.sample(&mut rand::thread_rng());
        let mut rc = RC::ZERO;
        let (obs, terminal) = real.step(&mut state, action, &mut rc);
        steps += 1;

        undiscounted += rc;
        discounted += rc * discount;
        discount *= gamma;

        let next = next_admissible_cost(&mcts, action, policy, rc, mcts.admissible_cost(), gamma);
        mcts.set_admissible_cost(next);

        if terminal {
            break;
        }

        if !mcts.update(action, obs)? {
            out_of_particles = true;
            break;
        }
    }

    if out_of_particles {
        warn!("particle deprivation after {steps} steps; finishing episode with select_random");
        let mut history = mcts.history().clone();
        let status = mcts.status();
        let sim = mcts.simulator();

        while steps < max_steps {
            let action = sim.select_random(&state, &history, &status, rollout_knowledge, &mut rand::thread_rng());
            let mut rc = RC::ZERO;
            let (obs, terminal) = real.step(&mut state, action, &mut rc);
            steps += 1;

            undiscounted += rc;
            discounted += rc * discount;
            discount *= gamma;

            if terminal {
                break;
            }
            history.add(action, obs);
        }
    }

    Ok(EpisodeResult {
        wall_time: start.elapsed(),
        time_steps: steps,
        discounted_reward: discounted.r,
        discounted_cost: discounted.c,
        undiscounted_reward: undiscounted.r,
        undiscounted_cost: undiscounted.c,
    })
}

/// Accumulated statistics across many episodes at one simulation-count setting.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub time: RunningStats,
    pub one_step_time: RunningStats,
    pub time_steps: RunningStats,
    pub undiscounted_reward_return: RunningStats,
    pub undiscounted_cost_return: RunningStats,
    pub discounted_reward_return: RunningStats,
    pub discounted_cost_return: RunningStats,
}

impl RunStats {
    fn push(&mut self, result: EpisodeResult) {
        self.time.push(result.wall_time.as_secs_f64());
        self.one_step_time.push(result.one_step_time());
        self.time_steps.push(result.time_steps as f64);
        self.undiscounted_reward_return.push(result.undiscounted_reward);
        self.undiscounted_cost_return.push(result.undiscounted_cost);
        self.discounted_reward_return.push(result.discounted_reward);
        self.discounted_cost_return.push(result.discounted_cost);
    }
}

/// Runs `episodes` independent episodes, stopping early if the cumulative wall time exceeds
/// `max_wall_time` (a budget, not a per-episode timeout).
pub fn multi_run<Sim: Simulator>(
    real: &Sim,
    mut make_sim: impl FnMut() -> Sim,
    params: &SearchParams,
    episodes: usize,
    max_steps: usize,
    max_wall_time: Option<Duration>,
) -> Result<RunStats> {
    let mut stats = RunStats::default();
    for n in 0..episodes {
        debug!("starting episode {} of {episodes} with {} simulations", n + 1, params.num_simulations);
        let result = run_episode(real, make_sim(), params.clone(), max_steps)?;
        stats.push(result);

        if let Some(budget) = max_wall_time {
            let elapsed = stats.time.mean() * stats.time.count() as f64;
            if Duration::from_secs_f64(elapsed) > budget {
                warn!("timed out after {} episodes", n + 1);
                break;
            }
        }
    }
    Ok(stats)
}

/// One row of the doubling-sweep results table.
#[derive(Debug, Clone)]
pub struct SweepRow {
    pub simulations: usize,
    pub runs: usize,
    pub stats: RunStats,
}

impl fmt::Display for SweepRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.simulations,
            self.stats.time_steps.mean(),
            self.runs,
            self.stats.undiscounted_reward_return.mean(),
            self.stats.undiscounted_reward_return.stderr(),
            self.stats.undiscounted_cost_return.mean(),
            self.stats.undiscounted_cost_return.stderr(),
            self.stats.discounted_reward_return.mean(),
            self.stats.discounted_reward_return.stderr(),
            self.stats.discounted_cost_return.mean(),
            self.stats.discounted_cost_return.stderr(),
            self.stats.time.mean(),
            self.stats.one_step_time.mean(),
        )
    }
}

/// The tab-separated header matching [`SweepRow`]'s column order.
pub const SWEEP_HEADER: &str = "Simulations\tTimeSteps\tRuns\t\
    Undiscounted reward return\tUndiscounted reward error\t\
    Undiscounted cost return\tUndiscounted cost error\t\
    Discounted reward return\tDiscounted reward error\t\
    Discounted cost return\tDiscounted cost error\t\
    Time\tTimePerStep";

/// Runs the full `min_doubles..=max_doubles` simulation-count sweep, doubling
/// `num_simulations`/`num_start_states`/`num_transforms` at each point per
/// [`ExperimentParams::sweep_point`], and returns one [`SweepRow`] per point.
pub fn run_sweep<Sim: Simulator>(
    real: &Sim,
    mut make_sim: impl FnMut() -> Sim,
    exp: &ExperimentParams,
) -> Result<Vec<SweepRow>> {
    let mut rows = Vec::new();
    for i in exp.min_doubles..=exp.max_doubles {
        let (num_simulations, num_start_states, num_transforms, max_attempts) = exp.sweep_point(i);
        let params = exp
            .search
            .clone()
            .with_num_simulations(num_simulations)
            .with_num_start_states(num_start_states)
            .with_num_transforms(num_transforms)
            .with_max_attempts(max_attempts);

        debug!("sweep point i={i}: {num_simulations} simulations");
        let stats = multi_run(
            real,
            &mut make_sim,
            &params,
            exp.episodes_per_point,
            exp.max_steps_per_episode,
            exp.max_episode_wall_time,
        )?;
        let runs = stats.time.count() as usize;
        rows.push(SweepRow { simulations: num_simulations, runs, stats });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::RockSample;

    #[test]
    fn run_episode_terminates_within_step_budget() {
        let real = RockSample::new(5, 5, 1);
        let sim = RockSample::new(5, 5, 2);
        let params = SearchParams::default().with_num_simulations(32).with_num_start_states(8);
        let result = run_episode(&real, sim, params, 50).unwrap();
        assert!(result.time_steps <= 50);
    }

    #[test]
    fn multi_run_aggregates_across_episodes() {
        let real = RockSample::new(5, 5, 7);
        let mut seed = 100u64;
        let params = SearchParams::default().with_num_simulations(16).with_num_start_states(4);
        let stats = multi_run(
            &real,
            || {
                seed += 1;
                RockSample::new(5, 5, seed)
            },
            &params,
            3,
            20,
            None,
        )
        .unwrap();
        assert_eq!(stats.time.count(), 3.0);
    }

    #[test]
    fn sweep_row_formats_as_tab_separated_columns() {
        let row = SweepRow { simulations: 4, runs: 2, stats: RunStats::default() };
        let rendered = row.to_string();
        assert_eq!(rendered.matches('\t').count(), 12);
    }

    #[test]
    fn next_admissible_cost_deterministic_branch_is_not_floored() {
        let sim = RockSample::new(5, 5, 1);
        let params = SearchParams::default().with_num_start_states(4);
        let mcts = Mcts::new(sim, params).unwrap();
        let policy = crate::policy::Policy::Deterministic(0);
        let rc = RC::new(0.0, 5.0);
        let next = next_admissible_cost(&mcts, 0, policy, rc, 1.0, 0.95);
        assert!((next - (1.0 - 5.0) / 0.95).abs() < 1e-9, "got {next}");
        assert!(next < 0.0, "the deterministic branch must not be floored at zero");
    }

    #[test]
    fn next_admissible_cost_mixture_branch_is_floored_at_zero() {
        let sim = RockSample::new(5, 5, 1);
        let params = SearchParams::default().with_num_simulations(8).with_num_start_states(4);
        let mut mcts = Mcts::new(sim, params).unwrap();
        mcts.select_action().unwrap();
        let policy = crate::policy::Policy::Mixture { a_min: 1, a_max: 0, p_max: 0.5 };
        let rc = RC::new(0.0, 100.0);
        let next = next_admissible_cost(&mcts, 0, policy, rc, 1.0, 0.95);
        assert_eq!(next, 0.0);
    }
}
