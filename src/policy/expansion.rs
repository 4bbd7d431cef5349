//! Prior installation: what happens the first time a V-node is visited.

use std::collections::HashSet;

use crate::config::SearchParams;
use crate::history::History;
use crate::rc::RC;
use crate::simulator::{KnowledgeLevel, Simulator, Status};
use crate::tree::{QNode, VNode};

/// Expand `v` into one `QNode` per action and install priors for `level`.
///
/// `Pure` installs no priors at all (every action is tried). `Legal` additionally flags
/// actions absent from `sim.generate_legal` as `illegal`, so the selector never picks them.
/// `Smart` does the same legality pass and then seeds `sim.generate_preferred` actions with
/// an optimistic pseudo-count (`params.unvisited_bias`), so they are preferred over
/// unvisited siblings without being pinned to `+inf` the way the reference algorithm's
/// `+inf` count would (see [`QNode::illegal`] for why that literal encoding was dropped).
pub fn expand_node<Sim: Simulator>(
    v: &mut VNode<Sim::State>,
    sim: &Sim,
    state: &Sim::State,
    history: &History,
    status: &Status,
    level: KnowledgeLevel,
    params: &SearchParams,
) {
    v.expand(sim.num_actions(), sim.num_observations());

    if level < KnowledgeLevel::Legal {
        return;
    }

    let legal: HashSet<usize> = sim.generate_legal(state, history, status).into_iter().collect();
    for (a, q) in v.children.iter_mut().enumerate() {
        if !legal.contains(&a) {
            *q = QNode::illegal(sim.num_observations());
        }
    }

    if level < KnowledgeLevel::Smart || params.unvisited_bias <= 0.0 {
        return;
    }

    for a in sim.generate_preferred(state, history, status) {
        if let Some(q) = v.children.get_mut(a) {
            if !q.illegal {
                q.value.set(params.unvisited_bias, RC::ZERO);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rc::RC;

    struct DummySim;
    impl Simulator for DummySim {
        type State = i32;
        fn num_actions(&self) -> usize {
            3
        }
        fn num_observations(&self) -> usize {
            2
        }
        fn discount(&self) -> f64 {
            0.9
        }
        fn reward_range(&self) -> f64 {
            1.0
        }
        fn create_start_state(&self) -> Self::State {
            0
        }
        fn step(&self, state: &mut Self::State, _action: usize, _rc: &mut RC) -> (usize, bool) {
            *state += 1;
            (0, false)
        }
        fn generate_legal(&self, _state: &Self::State, _h: &History, _s: &Status) -> Vec<usize> {
            vec![0, 1]
        }
        fn generate_preferred(&self, _state: &Self::State, _h: &History, _s: &Status) -> Vec<usize> {
            vec![1]
        }
    }

    #[test]
    fn pure_level_flags_nothing_illegal() {
        let sim = DummySim;
        let mut v = VNode::new();
        expand_node(&mut v, &sim, &0, &History::new(), &Status::new(), KnowledgeLevel::Pure, &SearchParams::default());
        assert!(v.children.iter().all(|q| !q.illegal));
    }

    #[test]
    fn legal_level_flags_illegal_actions() {
        let sim = DummySim;
        let mut v = VNode::new();
        expand_node(&mut v, &sim, &0, &History::new(), &Status::new(), KnowledgeLevel::Legal, &SearchParams::default());
        assert!(!v.children[0].illegal);
        assert!(!v.children[1].illegal);
        assert!(v.children[2].illegal);
    }

    #[test]
    fn smart_level_seeds_preferred_action_bias() {
        let sim = DummySim;
        let mut v = VNode::new();
        let params = SearchParams::default().with_unvisited_bias(5.0);
        expand_node(&mut v, &sim, &0, &History::new(), &Status::new(), KnowledgeLevel::Smart, &params);
        assert_eq!(v.children[1].value.count(), 5.0);
        assert_eq!(v.children[0].value.count(), 0.0);
    }
}
