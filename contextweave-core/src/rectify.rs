// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Weight rectification.
//!
//! Greedy selection only ever considers a child after its parent has been
//! committed, so a cheap, low-weight wrapper around a valuable child would be
//! ranked below content it is needed for. Rectification fixes the ranking by
//! pooling value upwards: a node is grouped with every descendant group that
//! is worth more per unit of cost, and all members of a group share the
//! group's value. Afterwards value never increases from a parent to a child.
//!
//! # Algorithm
//!
//! Post-order. Each subtree hands its parent a max-priority queue of groups
//! keyed by value. A node merges its children's queues, starts a group of its
//! own and keeps absorbing the queue maximum while that maximum is worth
//! strictly more than the running group. A subtree with zero weight and no
//! positive group contributes nothing and is dropped.
//!
//! The result is a separate [`RectifiedWeights`] map; the tree itself stays
//! immutable.

use crate::error::{is_valid_quantity, ContextweaveError, Result};
use crate::node::{NodeId, RenderNode};
use crate::queue::PriorityQueue;
use std::collections::HashMap;

/// Relative tolerance when comparing a rectified weight against a raw one.
const LIFT_EPSILON: f64 = 1e-9;

/// Weights computed by [`rectify_weights`].
#[derive(Debug, Clone, Default)]
pub struct RectifiedWeights {
    weights: HashMap<NodeId, f64>,
    rectified: HashMap<NodeId, f64>,
}

impl RectifiedWeights {
    /// Raw weight used during rectification, falling back to the node's own.
    pub fn weight(&self, node: &RenderNode) -> f64 {
        self.weights
            .get(&node.id())
            .copied()
            .unwrap_or_else(|| node.weight())
    }

    /// Rectified weight, if the node belonged to a contributing group.
    pub fn rectified_weight(&self, id: NodeId) -> Option<f64> {
        self.rectified.get(&id).copied()
    }

    /// Rectified weight when present, otherwise the raw weight.
    pub fn effective_weight(&self, node: &RenderNode) -> f64 {
        self.rectified_weight(node.id())
            .unwrap_or_else(|| self.weight(node))
    }

    /// Weight per unit of cost, the ranking key for budgeted selection.
    pub fn value(&self, node: &RenderNode) -> f64 {
        self.effective_weight(node) / node.effective_cost()
    }

    /// True when descendants pushed this node's weight above its own.
    ///
    /// Such a node is only worth showing together with some of them.
    pub fn is_lifted(&self, node: &RenderNode) -> bool {
        match self.rectified_weight(node.id()) {
            Some(rectified) => {
                let weight = self.weight(node);
                rectified > weight + LIFT_EPSILON * weight.abs().max(1.0)
            }
            None => false,
        }
    }

    /// Number of nodes that received a rectified weight.
    pub fn len(&self) -> usize {
        self.rectified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rectified.is_empty()
    }
}

struct Group<'a> {
    members: Vec<&'a RenderNode>,
    cost: f64,
    weight: f64,
}

impl<'a> Group<'a> {
    fn single(node: &'a RenderNode, weight: f64) -> Self {
        Self {
            members: vec![node],
            cost: node.effective_cost(),
            weight,
        }
    }

    fn value(&self) -> f64 {
        self.weight / self.cost
    }

    fn absorb(&mut self, mut other: Group<'a>) {
        if other.members.len() > self.members.len() {
            std::mem::swap(&mut self.members, &mut other.members);
        }
        self.members.append(&mut other.members);
        self.cost += other.cost;
        self.weight += other.weight;
    }
}

struct Frame<'a> {
    node: &'a RenderNode,
    next_child: usize,
    groups: PriorityQueue<Group<'a>>,
}

impl<'a> Frame<'a> {
    fn new(node: &'a RenderNode) -> Self {
        Self {
            node,
            next_child: 0,
            groups: PriorityQueue::new(),
        }
    }
}

/// Compute rectified weights for every node under `root`.
///
/// `weight_fn` supplies each node's raw weight; without it the weight set on
/// the virtual node is used (0 when unset). Negative or non-finite weights
/// are rejected.
pub fn rectify_weights(
    root: &RenderNode,
    weight_fn: Option<&dyn Fn(&RenderNode) -> f64>,
) -> Result<RectifiedWeights> {
    let mut weights = HashMap::new();
    let mut top = PriorityQueue::new();
    let mut stack = vec![Frame::new(root)];

    while let Some(mut frame) = stack.pop() {
        let node = frame.node;
        if let Some(child) = node.children().get(frame.next_child) {
            frame.next_child += 1;
            stack.push(frame);
            stack.push(Frame::new(child));
            continue;
        }

        let weight = weight_fn.map_or_else(|| node.weight(), |f| f(node));
        if !is_valid_quantity(weight) {
            return Err(ContextweaveError::InvalidWeight {
                id: node.id(),
                weight,
            });
        }
        weights.insert(node.id(), weight);

        let mut groups = close_group(node, weight, frame.groups);
        match stack.last_mut() {
            Some(parent) => parent.groups.append(&mut groups),
            None => top = groups,
        }
    }

    let group_count = top.len();
    let mut rectified = HashMap::with_capacity(weights.len());
    for (group, value) in top.drain() {
        if let [only] = group.members.as_slice() {
            rectified.insert(only.id(), group.weight);
            continue;
        }
        for member in group.members {
            rectified.insert(member.id(), value * member.effective_cost());
        }
    }

    tracing::debug!(
        root = %root.id(),
        nodes = weights.len(),
        groups = group_count,
        rectified = rectified.len(),
        "Rectified weights"
    );

    Ok(RectifiedWeights { weights, rectified })
}

fn close_group<'a>(
    node: &'a RenderNode,
    weight: f64,
    mut groups: PriorityQueue<Group<'a>>,
) -> PriorityQueue<Group<'a>> {
    let has_positive = groups.peek_priority().is_some_and(|value| value > 0.0);
    if weight == 0.0 && !has_positive {
        return PriorityQueue::new();
    }

    let mut group = Group::single(node, weight);
    while groups
        .peek_priority()
        .is_some_and(|value| value > group.value())
    {
        if let Some((child, _)) = groups.pop() {
            group.absorb(child);
        }
    }

    let value = group.value();
    if group.members.len() > 1 {
        tracing::trace!(
            node = %node.id(),
            members = group.members.len(),
            value,
            "Pooled descendant value into ancestor"
        );
    }
    groups.insert(group, value);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Snapshotter, VirtualNode};
    use std::sync::Arc;

    fn unit_cost(_: &VirtualNode) -> f64 {
        1.0
    }

    fn snapshot(tree: &VirtualNode) -> Arc<RenderNode> {
        Snapshotter::new(&unit_cost).snapshot(tree).unwrap()
    }

    fn wrapper(id: u64, children: Vec<VirtualNode>) -> VirtualNode {
        let text = vec![String::new(); children.len() + 1];
        VirtualNode::new(id, text, children).unwrap()
    }

    #[test]
    fn test_child_value_pooled_into_parent() {
        // Parent worth 1, child worth 9: the child must not outrank the parent.
        let tree = wrapper(1, vec![VirtualNode::leaf(2, "x").with_weight(9.0)]).with_weight(1.0);
        let root = snapshot(&tree);

        let weights = rectify_weights(&root, None).unwrap();

        assert_eq!(weights.rectified_weight(NodeId(1)), Some(5.0));
        assert_eq!(weights.rectified_weight(NodeId(2)), Some(5.0));
        assert!(weights.is_lifted(&root));
        assert!(!weights.is_lifted(&root.children()[0]));
    }

    #[test]
    fn test_less_valuable_child_keeps_own_group() {
        let tree = wrapper(1, vec![VirtualNode::leaf(2, "x").with_weight(2.0)]).with_weight(6.0);
        let root = snapshot(&tree);

        let weights = rectify_weights(&root, None).unwrap();

        assert_eq!(weights.rectified_weight(NodeId(1)), Some(6.0));
        assert_eq!(weights.rectified_weight(NodeId(2)), Some(2.0));
        assert!(!weights.is_lifted(&root));
    }

    #[test]
    fn test_zero_weight_subtree_dropped() {
        let tree = wrapper(1, vec![VirtualNode::leaf(2, "x"), VirtualNode::leaf(3, "y")]);
        let root = snapshot(&tree);

        let weights = rectify_weights(&root, None).unwrap();

        assert!(weights.is_empty());
        assert_eq!(weights.value(&root), 0.0);
    }

    #[test]
    fn test_weight_fn_overrides_preset() {
        let tree = wrapper(1, vec![VirtualNode::leaf(2, "x").with_weight(100.0)]);
        let root = snapshot(&tree);
        let by_id = |node: &RenderNode| node.id().0 as f64;

        let weights = rectify_weights(&root, Some(&by_id)).unwrap();

        assert_eq!(weights.weight(&root.children()[0]), 2.0);
        // Child (2) outranks parent (1): pooled to 1.5 each.
        assert_eq!(weights.rectified_weight(NodeId(1)), Some(1.5));
    }

    #[test]
    fn test_pooling_cascades_through_levels() {
        // 0 -> 0 -> 12: both ancestors end up sharing the leaf's value.
        let tree = wrapper(
            1,
            vec![wrapper(2, vec![VirtualNode::leaf(3, "x").with_weight(12.0)])],
        );
        let root = snapshot(&tree);

        let weights = rectify_weights(&root, None).unwrap();

        for id in 1..=3 {
            assert_eq!(weights.rectified_weight(NodeId(id)), Some(4.0));
        }
    }

    #[test]
    fn test_negative_weight_rejected() {
        let tree = wrapper(1, vec![VirtualNode::leaf(2, "x")]);
        let root = snapshot(&tree);
        let negative = |_: &RenderNode| -1.0;

        let err = rectify_weights(&root, Some(&negative)).unwrap_err();
        assert!(matches!(err, ContextweaveError::InvalidWeight { .. }));
    }

    #[test]
    fn test_monotone_values_on_wide_tree() {
        let children: Vec<_> = (0..20u64)
            .map(|i| VirtualNode::leaf(10 + i, "x").with_weight((i % 7) as f64))
            .collect();
        let tree = wrapper(1, children).with_weight(2.0);
        let root = snapshot(&tree);

        let weights = rectify_weights(&root, None).unwrap();

        let parent_value = weights.value(&root);
        for child in root.children() {
            assert!(weights.value(child) <= parent_value + 1e-9);
        }
    }
}
