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

//! Tree model for budgeted rendering.
//!
//! Two representations of the same shape:
//!
//! - [`VirtualNode`]: mutable, owned by whoever assembles the content
//! - [`RenderNode`]: frozen snapshot with per-node cost and weight attached,
//!   shared through `Arc` and safe to hand to any number of threads
//!
//! Both hold `children.len() + 1` text fragments that interleave with the
//! children: `text[0], child[0], text[1], child[1], ..., text[n]`.

mod snapshot;

pub use snapshot::{CostModel, SnapshotCache, Snapshotter};

use crate::error::{ContextweaveError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Placeholder emitted for an unrendered node when nothing else is configured.
pub const DEFAULT_ELISION_MARKER: &str = "[...]";

/// Identity of a node.
///
/// Ids are chosen by the tree builder and must change whenever the subtree's
/// shape or content changes; snapshot caches rely on that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

fn check_shape(id: NodeId, fragments: usize, children: usize) -> Result<()> {
    if fragments != children + 1 {
        return Err(ContextweaveError::ShapeMismatch {
            id,
            fragments,
            children,
        });
    }
    Ok(())
}

/// Mutable precursor of a [`RenderNode`].
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualNode {
    id: NodeId,
    text: Vec<String>,
    children: Vec<VirtualNode>,
    can_merge: Option<bool>,
    elision_marker: Option<String>,
    require_rendered_child: Option<bool>,
    weight: Option<f64>,
}

impl VirtualNode {
    /// Create a node, failing unless `text.len() == children.len() + 1`.
    pub fn new(
        id: impl Into<NodeId>,
        text: Vec<String>,
        children: Vec<VirtualNode>,
    ) -> Result<Self> {
        let id = id.into();
        check_shape(id, text.len(), children.len())?;
        Ok(Self {
            id,
            text,
            children,
            can_merge: None,
            elision_marker: None,
            require_rendered_child: None,
            weight: None,
        })
    }

    /// A node with a single fragment and no children.
    pub fn leaf(id: impl Into<NodeId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: vec![text.into()],
            children: Vec::new(),
            can_merge: None,
            elision_marker: None,
            require_rendered_child: None,
            weight: None,
        }
    }

    pub fn with_can_merge(mut self, can_merge: bool) -> Self {
        self.can_merge = Some(can_merge);
        self
    }

    pub fn with_elision_marker(mut self, marker: impl Into<String>) -> Self {
        self.elision_marker = Some(marker.into());
        self
    }

    pub fn with_require_rendered_child(mut self, require: bool) -> Self {
        self.require_rendered_child = Some(require);
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Re-identify the node after its content changed.
    pub fn set_id(&mut self, id: impl Into<NodeId>) {
        self.id = id.into();
    }

    pub fn text(&self) -> &[String] {
        &self.text
    }

    /// Fragments are editable in place; their count is fixed by the children.
    pub fn text_mut(&mut self) -> &mut [String] {
        &mut self.text
    }

    pub fn children(&self) -> &[VirtualNode] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [VirtualNode] {
        &mut self.children
    }

    /// Append a child followed by the fragment that comes after it.
    pub fn push_child(&mut self, child: VirtualNode, trailing_text: impl Into<String>) {
        self.children.push(child);
        self.text.push(trailing_text.into());
    }

    /// Replace fragments and children together.
    pub fn set_content(&mut self, text: Vec<String>, children: Vec<VirtualNode>) -> Result<()> {
        check_shape(self.id, text.len(), children.len())?;
        self.text = text;
        self.children = children;
        Ok(())
    }

    pub fn can_merge(&self) -> bool {
        self.can_merge.unwrap_or(false)
    }

    pub fn elision_marker(&self) -> Option<&str> {
        self.elision_marker.as_deref()
    }

    pub fn require_rendered_child(&self) -> bool {
        self.require_rendered_child.unwrap_or(false)
    }

    pub fn weight(&self) -> Option<f64> {
        self.weight
    }

    /// The node's own fragments concatenated, children excluded.
    pub fn own_text(&self) -> String {
        self.text.concat()
    }
}

impl Drop for VirtualNode {
    // Unlinks descendants one level at a time so dropping a deep tree never
    // recurses.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Frozen node produced by [`Snapshotter::snapshot`].
#[derive(Debug)]
pub struct RenderNode {
    id: NodeId,
    text: Vec<String>,
    children: Vec<Arc<RenderNode>>,
    cost: f64,
    weight: f64,
    can_merge: bool,
    elision_marker: String,
    require_rendered_child: bool,
}

impl RenderNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn text(&self) -> &[String] {
        &self.text
    }

    pub fn children(&self) -> &[Arc<RenderNode>] {
        &self.children
    }

    /// Estimated cost of this node alone, children excluded.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Cost clamped to at least one unit, used for ranking and budget accounting.
    pub fn effective_cost(&self) -> f64 {
        self.cost.max(1.0)
    }

    /// Raw importance as set on the virtual node (0 if unset).
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Raw weight per unit of cost.
    pub fn value(&self) -> f64 {
        self.weight / self.effective_cost()
    }

    pub fn can_merge(&self) -> bool {
        self.can_merge
    }

    pub fn elision_marker(&self) -> &str {
        &self.elision_marker
    }

    pub fn require_rendered_child(&self) -> bool {
        self.require_rendered_child
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Pre-order traversal of this subtree.
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        self.iter().count()
    }

    /// Sum of the estimated costs of every node in this subtree.
    pub fn subtree_cost(&self) -> f64 {
        self.iter().map(RenderNode::cost).sum()
    }
}

impl Drop for RenderNode {
    // Children still shared with a cache or another tree are left to their
    // other owners.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(child) = pending.pop() {
            if let Some(mut node) = Arc::into_inner(child) {
                pending.append(&mut node.children);
            }
        }
    }
}

/// Document-order iterator over a [`RenderNode`] subtree.
pub struct PreOrder<'a> {
    stack: Vec<&'a RenderNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a RenderNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|child| child.as_ref()));
        Some(node)
    }
}
