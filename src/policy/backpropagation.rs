//! AMAF/RAVE statistics update.

use crate::config::SearchParams;
use crate::history::Entry;
use crate::rc::RC;
use crate::tree::VNode;

/// Updates the AMAF accumulator of every action in `trace` that also appears as a child of
/// `v`, weighted by `rave_discount^offset` so actions further down the simulation's trace
/// contribute less.
///
/// `trace` is the slice of `History` entries produced *after* `v` was visited in this
/// simulation (i.e. `history[tree_depth..]`), mirroring the "all moves as first" idea: any
/// action played later in the same simulation is treated as informative evidence about that
/// action's value here too, not just at the node where it was actually taken.
pub fn add_rave<S>(v: &mut VNode<S>, trace: &[Entry], total: RC, params: &SearchParams) {
    if params.rave_k <= 0.0 {
        return;
    }
    for (offset, entry) in trace.iter().enumerate() {
        if let Some(q) = v.children.get_mut(entry.action) {
            let weight = params.rave_discount.powi(offset as i32);
            q.amaf.add_weighted(total, weight);
        }
    }
}
