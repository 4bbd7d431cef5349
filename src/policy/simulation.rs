//! The default-policy rollout used to estimate value beyond the tree frontier.

use rand::Rng;

use crate::config::SearchParams;
use crate::history::History;
use crate::rc::RC;
use crate::simulator::{Simulator, Status};

/// Plays `state` forward under `sim.select_random(..., params.rollout_knowledge, ...)` until
/// `max_depth` is reached or a terminal state is hit, returning the discounted (reward, cost)
/// accumulated along the way.
///
/// Does not truncate `history` back to its entry length itself; the caller owns that, since
/// `history` may still be needed (at its extended length) by whatever invoked the rollout.
pub fn rollout<Sim: Simulator>(
    sim: &Sim,
    state: &mut Sim::State,
    history: &mut History,
    status: &mut Status,
    depth: usize,
    max_depth: usize,
    params: &SearchParams,
    rng: &mut impl Rng,
) -> RC {
    if depth >= max_depth {
        return RC::ZERO;
    }

    let action = sim.select_random(state, history, status, params.rollout_knowledge, rng);
    let mut step_rc = RC::ZERO;
    let (obs, terminal) = sim.step(state, action, &mut step_rc);
    history.add(action, obs);

    if terminal {
        return step_rc;
    }

    let future = rollout(sim, state, history, status, depth + 1, max_depth, params, rng);
    step_rc + sim.discount() * future
}
