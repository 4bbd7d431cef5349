//! Search tree data structures: alternating V-nodes (observation/belief nodes)
//! and Q-nodes (action nodes).
//!
//! The tree is a plain owned `Box`/`Vec` recursion, single-threaded. There is no
//! node pool or arena: each node is heap-allocated individually and dropped when
//! its owner is dropped, same as the upstream tree this crate is built from.

use crate::belief::BeliefState;
use crate::rc::{Value, RC};

/// An action node: owns one `Value` accumulator for the scalarized return, a
/// secondary AMAF/RAVE accumulator, and one V-node child per observation that has
/// actually been produced by stepping the simulator from this action.
pub struct QNode<S> {
    /// Scalarized (reward, cost) accumulator for this action.
    pub value: Value,

    /// AMAF/RAVE accumulator, updated for every action in a simulation's trace
    /// that matches this action, not just the one actually taken here.
    pub amaf: Value,

    /// Children indexed by observation id; `None` until that observation has
    /// actually occurred at least once.
    pub children: Vec<Option<Box<VNode<S>>>>,

    /// Set when this action was determined to be illegal at this node. Illegal
    /// actions are never selected: `Value` cannot represent `(-inf, +inf)` cleanly
    /// because `total / count` on infinities produces `NaN`, so the selector checks
    /// this flag directly instead of trying to encode it into the accumulator.
    pub illegal: bool,
}

impl<S> QNode<S> {
    pub fn new(num_observations: usize) -> Self {
        let mut children = Vec::with_capacity(num_observations);
        children.resize_with(num_observations, || None);
        QNode {
            value: Value::default(),
            amaf: Value::default(),
            children,
            illegal: false,
        }
    }

    pub fn illegal(num_observations: usize) -> Self {
        let mut node = QNode::new(num_observations);
        node.illegal = true;
        node
    }

    pub fn child(&self, observation: usize) -> Option<&VNode<S>> {
        self.children[observation].as_deref()
    }

    pub fn child_mut(&mut self, observation: usize) -> Option<&mut VNode<S>> {
        self.children[observation].as_deref_mut()
    }

    /// Returns the existing child for `observation`, creating an empty one first
    /// if necessary.
    pub fn child_or_insert(&mut self, observation: usize) -> &mut VNode<S> {
        if self.children[observation].is_none() {
            self.children[observation] = Some(Box::new(VNode::new()));
        }
        self.children[observation].as_deref_mut().unwrap()
    }
}

/// An observation node: owns a belief over hidden states and one Q-node child
/// per action.
pub struct VNode<S> {
    /// Scalarized value accumulator for this node (used by the root and by
    /// callers inspecting the overall value at a V-node).
    pub value: Value,

    /// Particle filter approximating the belief over hidden states at this node.
    pub belief: BeliefState<S>,

    /// Per-action children, lazily sized on first expansion.
    pub children: Vec<QNode<S>>,
}

impl<S> VNode<S> {
    pub fn new() -> Self {
        VNode {
            value: Value::default(),
            belief: BeliefState::new(),
            children: Vec::new(),
        }
    }

    pub fn is_expanded(&self) -> bool {
        !self.children.is_empty()
    }

    /// Initializes per-action children, one `QNode` per action, sized for
    /// `num_observations` observation slots each.
    pub fn expand(&mut self, num_actions: usize, num_observations: usize) {
        self.children = (0..num_actions).map(|_| QNode::new(num_observations)).collect();
    }
}

impl<S> Default for VNode<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qnode_child_or_insert_creates_once() {
        let mut q: QNode<i32> = QNode::new(3);
        assert!(q.child(0).is_none());
        q.child_or_insert(0).value.add(RC::new(1.0, 0.0));
        assert!(q.child(0).is_some());
    }

    #[test]
    fn vnode_expand_creates_one_qnode_per_action() {
        let mut v: VNode<i32> = VNode::new();
        assert!(!v.is_expanded());
        v.expand(4, 2);
        assert!(v.is_expanded());
        assert_eq!(v.children.len(), 4);
        assert_eq!(v.children[0].children.len(), 2);
    }

    #[test]
    fn illegal_qnode_is_flagged() {
        let q: QNode<i32> = QNode::illegal(2);
        assert!(q.illegal);
    }
}
