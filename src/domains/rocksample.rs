//! The rock-sample domain: an agent on a grid must decide which rocks are worth collecting by
//! noisily checking them before deciding whether to sample, risking a penalty for sampling a
//! worthless rock or checking too often (checks carry a unit cost).
//!
//! Grounded on `rocksample.cpp`/`rocksample.h` from the reference CC-POMCP implementation this
//! workspace's spec was distilled from; translated into the [`crate::simulator::Simulator`]
//! contract rather than the original's `STATE`/memory-pool inheritance hierarchy.

use std::cell::RefCell;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::coord::{Coord, Direction, Grid};
use crate::history::History;
use crate::rc::RC;
use crate::simulator::{Simulator, Status};
use crate::utils::bernoulli;

/// No observation: the step wasn't a rock check.
pub const OBS_NONE: usize = 0;
/// The check suggested the rock is valuable.
pub const OBS_GOOD: usize = 1;
/// The check suggested the rock is worthless.
pub const OBS_BAD: usize = 2;

const NUM_OBSERVATIONS: usize = 3;

/// Per-rock belief bookkeeping carried inside a particle.
#[derive(Clone, Copy, Debug)]
struct RockEntry {
    collected: bool,
    valuable: bool,
    /// Running tally of good (+1) minus bad (-1) checks, used by the bundled preferred-action
    /// heuristic and by [`RockSample::select_target`]'s (inert) uncertainty gate.
    count: i32,
    measured: u32,
    prob_valuable: f64,
    likelihood_valuable: f64,
    likelihood_worthless: f64,
}

/// A particle: the agent's position plus the hidden valuable/worthless state of every rock.
#[derive(Clone, Debug)]
pub struct RockSampleState {
    agent_pos: Coord,
    rocks: Vec<RockEntry>,
    /// Computed by [`RockSample::select_target`], which (faithfully reproducing a bug present in
    /// the reference implementation — see `SPEC_FULL.md` §9) never actually assigns anything but
    /// its initial `-1`. Retained as a field because the original state layout carries it, but no
    /// `step`/`generate_preferred` logic reads it.
    target: i32,
}

/// The rock-sample CPOMDP: `size x size` grid, `num_rocks` rocks at fixed positions.
pub struct RockSample {
    size: i32,
    num_rocks: usize,
    half_efficiency_distance: f64,
    start_pos: Coord,
    rock_pos: Vec<Coord>,
    /// Rock id at each cell, or `-1` if the cell holds no rock.
    rock_grid: Grid<i32>,
    uncertainty_count: i32,
    rng: RefCell<StdRng>,
}

impl RockSample {
    /// Action id of the "sample the rock under the agent" action. Actions below this are
    /// cardinal moves (`0..4`, ordered North/East/South/West to match [`Direction::ALL`]);
    /// actions above it are "check rock `action - SAMPLE_ACTION - 1`".
    pub const SAMPLE_ACTION: usize = 4;

    pub fn check_action(rock: usize) -> usize {
        Self::SAMPLE_ACTION + 1 + rock
    }

    fn rock_of_check(action: usize) -> usize {
        action - Self::SAMPLE_ACTION - 1
    }

    /// Builds a `size x size` rock-sample instance with `num_rocks` rocks, using one of the
    /// reference implementation's hand-tuned layouts when `(size, num_rocks)` matches a known
    /// benchmark configuration, otherwise placing rocks uniformly at random from `seed`.
    pub fn new(size: i32, num_rocks: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let (half_efficiency_distance, start_pos, rock_coords) =
            match (size, num_rocks) {
                (5, 5) => (
                    4.0,
                    Coord::new(0, 2),
                    vec![
                        Coord::new(2, 4),
                        Coord::new(0, 4),
                        Coord::new(3, 3),
                        Coord::new(2, 2),
                        Coord::new(4, 1),
                    ],
                ),
                (5, 7) => (
                    20.0,
                    Coord::new(0, 2),
                    vec![
                        Coord::new(1, 0),
                        Coord::new(2, 1),
                        Coord::new(1, 2),
                        Coord::new(2, 2),
                        Coord::new(4, 2),
                        Coord::new(0, 3),
                        Coord::new(3, 4),
                    ],
                ),
                (7, 8) => (
                    20.0,
                    Coord::new(0, 3),
                    vec![
                        Coord::new(2, 0),
                        Coord::new(0, 1),
                        Coord::new(3, 1),
                        Coord::new(6, 3),
                        Coord::new(2, 4),
                        Coord::new(3, 4),
                        Coord::new(5, 5),
                        Coord::new(1, 6),
                    ],
                ),
                (11, 11) => (
                    20.0,
                    Coord::new(0, 5),
                    vec![
                        Coord::new(0, 3),
                        Coord::new(0, 7),
                        Coord::new(1, 8),
                        Coord::new(2, 4),
                        Coord::new(3, 3),
                        Coord::new(3, 8),
                        Coord::new(4, 3),
                        Coord::new(5, 8),
                        Coord::new(6, 1),
                        Coord::new(9, 3),
                        Coord::new(9, 9),
                    ],
                ),
                _ => {
                    let mut grid = Grid::new(size, size, -1i32);
                    let mut coords = Vec::with_capacity(num_rocks);
                    for i in 0..num_rocks {
                        let pos = loop {
                            let candidate = Coord::new(rng.gen_range(0..size), rng.gen_range(0..size));
                            if *grid.get(candidate) < 0 {
                                break candidate;
                            }
                        };
                        grid.set(pos, i as i32);
                        coords.push(pos);
                    }
                    return RockSample {
                        size,
                        num_rocks,
                        half_efficiency_distance: 20.0,
                        start_pos: Coord::new(0, size / 2),
                        rock_pos: coords,
                        rock_grid: grid,
                        uncertainty_count: 0,
                        rng: RefCell::new(rng),
                    };
                }
            };

        let mut grid = Grid::new(size, size, -1i32);
        for (i, pos) in rock_coords.iter().enumerate() {
            grid.set(*pos, i as i32);
        }

        RockSample {
            size,
            num_rocks,
            half_efficiency_distance,
            start_pos,
            rock_pos: rock_coords,
            rock_grid: grid,
            uncertainty_count: 0,
            rng: RefCell::new(rng),
        }
    }

    fn sample_observation(&self, state: &RockSampleState, rock: usize, rng: &mut StdRng) -> usize {
        let distance = state.agent_pos.euclidean_distance(self.rock_pos[rock]);
        let efficiency = (1.0 + 2f64.powf(-distance / self.half_efficiency_distance)) * 0.5;
        let correct = bernoulli(rng, efficiency);
        let valuable = state.rocks[rock].valuable;
        if correct == valuable {
            OBS_GOOD
        } else {
            OBS_BAD
        }
    }

    /// Preserves a bug in the reference implementation: `best_rock` is initialized to `-1` and
    /// never updated (only the best distance is tracked), so this always returns `-1`. See
    /// `SPEC_FULL.md` §9 — intent is ambiguous upstream, so the behavior (and its inertness) is
    /// kept rather than guessed at.
    fn select_target(&self, state: &RockSampleState) -> i32 {
        let mut best_dist = self.size * 2;
        let best_rock = -1;
        for (rock, entry) in state.rocks.iter().enumerate() {
            if !entry.collected && entry.count >= self.uncertainty_count {
                let dist = state.agent_pos.manhattan_distance(self.rock_pos[rock]);
                if dist < best_dist {
                    best_dist = dist;
                }
            }
        }
        best_rock
    }

    fn history_tally(history: &History, rock: usize) -> i32 {
        let mut total = 0;
        for entry in history.iter() {
            if entry.action == Self::check_action(rock) {
                if entry.observation == OBS_GOOD {
                    total += 1;
                } else if entry.observation == OBS_BAD {
                    total -= 1;
                }
            }
        }
        total
    }
}

impl Simulator for RockSample {
    type State = RockSampleState;

    fn num_actions(&self) -> usize {
        self.num_rocks + 5
    }

    fn num_observations(&self) -> usize {
        NUM_OBSERVATIONS
    }

    fn discount(&self) -> f64 {
        0.95
    }

    fn reward_range(&self) -> f64 {
        20.0
    }

    fn create_start_state(&self) -> Self::State {
        let mut rng = self.rng.borrow_mut();
        let rocks = (0..self.num_rocks)
            .map(|_| RockEntry {
                collected: false,
                valuable: bernoulli(&mut rng, 0.5),
                count: 0,
                measured: 0,
                prob_valuable: 0.5,
                likelihood_valuable: 1.0,
                likelihood_worthless: 1.0,
            })
            .collect();
        let mut state = RockSampleState { agent_pos: self.start_pos, rocks, target: -1 };
        state.target = self.select_target(&state);
        state
    }

    fn validate(&self, state: &Self::State) {
        debug_assert!(self.rock_grid.inside(state.agent_pos), "agent left the grid");
    }

    fn step(&self, state: &mut Self::State, action: usize, rc: &mut RC) -> (usize, bool) {
        rc.r = 0.0;
        rc.c = 0.0;
        let mut observation = OBS_NONE;

        if action < Self::SAMPLE_ACTION {
            let dir = Direction::ALL[action];
            match dir {
                Direction::East => {
                    if state.agent_pos.x + 1 < self.size {
                        state.agent_pos.x += 1;
                    } else {
                        rc.r = 10.0;
                        return (observation, true);
                    }
                }
                Direction::North => {
                    if state.agent_pos.y + 1 < self.size {
                        state.agent_pos.y += 1;
                    } else {
                        rc.r = -100.0;
                    }
                }
                Direction::South => {
                    if state.agent_pos.y - 1 >= 0 {
                        state.agent_pos.y -= 1;
                    } else {
                        rc.r = -100.0;
                    }
                }
                Direction::West => {
                    if state.agent_pos.x - 1 >= 0 {
                        state.agent_pos.x -= 1;
                    } else {
                        rc.r = -100.0;
                    }
                }
            }
        } else if action == Self::SAMPLE_ACTION {
            let rock = *self.rock_grid.get(state.agent_pos);
            if rock >= 0 && !state.rocks[rock as usize].collected {
                let rock = rock as usize;
                state.rocks[rock].collected = true;
                rc.r = if state.rocks[rock].valuable { 10.0 } else { -10.0 };
            } else {
                rc.r = -100.0;
            }
        } else {
            rc.c = 1.0;
            let rock = Self::rock_of_check(action);
            debug_assert!(rock < self.num_rocks);
            let mut rng = self.rng.borrow_mut();
            observation = self.sample_observation(state, rock, &mut rng);
            drop(rng);

            state.rocks[rock].measured += 1;
            let distance = state.agent_pos.euclidean_distance(self.rock_pos[rock]);
            let efficiency = (1.0 + 2f64.powf(-distance / self.half_efficiency_distance)) * 0.5;

            let entry = &mut state.rocks[rock];
            if observation == OBS_GOOD {
                entry.count += 1;
                entry.likelihood_valuable *= efficiency;
                entry.likelihood_worthless *= 1.0 - efficiency;
            } else {
                entry.count -= 1;
                entry.likelihood_worthless *= efficiency;
                entry.likelihood_valuable *= 1.0 - efficiency;
            }
            let denom = 0.5 * entry.likelihood_valuable + 0.5 * entry.likelihood_worthless;
            entry.prob_valuable = 0.5 * entry.likelihood_valuable / denom;
        }

        if state.target < 0 || state.agent_pos == self.rock_pos[state.target.max(0) as usize] {
            state.target = self.select_target(state);
        }

        debug_assert!(rc.r != -100.0, "an illegal action reached Step; GenerateLegal should have excluded it");
        (observation, false)
    }

    fn local_move(&self, state: &mut Self::State, history: &History, step_obs: usize, _status: &Status) -> bool {
        let mut rng = self.rng.borrow_mut();
        let flip = rng.gen_range(0..self.num_rocks);
        state.rocks[flip].valuable = !state.rocks[flip].valuable;

        if let Some(last) = history.back() {
            if last.action > Self::SAMPLE_ACTION {
                let rock = Self::rock_of_check(last.action);
                let resampled = self.sample_observation(state, rock, &mut rng);
                if resampled != step_obs {
                    return false;
                }
                if step_obs == OBS_GOOD {
                    state.rocks[rock].count += 1;
                } else if step_obs == OBS_BAD {
                    state.rocks[rock].count -= 1;
                }
            }
        }
        true
    }

    fn generate_legal(&self, state: &Self::State, _history: &History, _status: &Status) -> Vec<usize> {
        let mut legal = Vec::new();
        if state.agent_pos.y + 1 < self.size {
            legal.push(Direction::ALL.iter().position(|d| *d == Direction::North).unwrap());
        }
        legal.push(Direction::ALL.iter().position(|d| *d == Direction::East).unwrap());
        if state.agent_pos.y - 1 >= 0 {
            legal.push(Direction::ALL.iter().position(|d| *d == Direction::South).unwrap());
        }
        if state.agent_pos.x - 1 >= 0 {
            legal.push(Direction::ALL.iter().position(|d| *d == Direction::West).unwrap());
        }

        let rock = *self.rock_grid.get(state.agent_pos);
        if rock >= 0 && !state.rocks[rock as usize].collected {
            legal.push(Self::SAMPLE_ACTION);
        }

        for rock in 0..self.num_rocks {
            if !state.rocks[rock].collected {
                legal.push(Self::check_action(rock));
            }
        }
        legal
    }

    fn generate_preferred(&self, state: &Self::State, history: &History, _status: &Status) -> Vec<usize> {
        let rock_here = *self.rock_grid.get(state.agent_pos);
        if rock_here >= 0 {
            let rock_here = rock_here as usize;
            if !state.rocks[rock_here].collected && Self::history_tally(history, rock_here) > 0 {
                return vec![Self::SAMPLE_ACTION];
            }
        }

        let mut all_bad = true;
        let mut north = false;
        let mut south = false;
        let mut west = false;
        let mut east = false;

        for rock in 0..self.num_rocks {
            if state.rocks[rock].collected {
                continue;
            }
            if Self::history_tally(history, rock) >= 0 {
                all_bad = false;
                let pos = self.rock_pos[rock];
                if pos.y > state.agent_pos.y {
                    north = true;
                }
                if pos.y < state.agent_pos.y {
                    south = true;
                }
                if pos.x < state.agent_pos.x {
                    west = true;
                }
                if pos.x > state.agent_pos.x {
                    east = true;
                }
            }
        }

        let north_idx = Direction::ALL.iter().position(|d| *d == Direction::North).unwrap();
        let east_idx = Direction::ALL.iter().position(|d| *d == Direction::East).unwrap();

        if all_bad {
            return vec![east_idx];
        }

        let mut actions = Vec::new();
        let south_idx = Direction::ALL.iter().position(|d| *d == Direction::South).unwrap();
        let west_idx = Direction::ALL.iter().position(|d| *d == Direction::West).unwrap();

        if state.agent_pos.y + 1 < self.size && north {
            actions.push(north_idx);
        }
        if east {
            actions.push(east_idx);
        }
        if state.agent_pos.y - 1 >= 0 && south {
            actions.push(south_idx);
        }
        if state.agent_pos.x - 1 >= 0 && west {
            actions.push(west_idx);
        }

        for rock in 0..self.num_rocks {
            let entry = &state.rocks[rock];
            if !entry.collected
                && entry.prob_valuable != 0.0
                && entry.prob_valuable != 1.0
                && entry.measured < 5
                && entry.count.abs() < 2
            {
                actions.push(Self::check_action(rock));
            }
        }
        actions
    }
}
