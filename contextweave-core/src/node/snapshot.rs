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

//! Freezing virtual trees into render trees.

use super::{check_shape, NodeId, RenderNode, VirtualNode, DEFAULT_ELISION_MARKER};
use crate::error::{is_valid_quantity, ContextweaveError, Result};
use moka::sync::Cache;
use std::collections::HashSet;
use std::sync::Arc;

/// Assigns each node its standalone cost (children excluded).
pub trait CostModel {
    fn node_cost(&self, node: &VirtualNode) -> Result<f64>;
}

impl<F> CostModel for F
where
    F: Fn(&VirtualNode) -> f64,
{
    fn node_cost(&self, node: &VirtualNode) -> Result<f64> {
        Ok(self(node))
    }
}

/// Caller-owned cache of frozen subtrees keyed by node id.
///
/// A hit is only correct if the id was changed every time the subtree's
/// content changed, and if every snapshot sharing the cache uses the same
/// cost model and default marker.
#[derive(Clone)]
pub struct SnapshotCache {
    inner: Cache<NodeId, Arc<RenderNode>>,
}

impl SnapshotCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    pub fn get(&self, id: NodeId) -> Option<Arc<RenderNode>> {
        self.inner.get(&id)
    }

    pub fn insert(&self, node: Arc<RenderNode>) {
        self.inner.insert(node.id(), node);
    }

    pub fn invalidate(&self, id: NodeId) {
        self.inner.invalidate(&id);
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
    }
}

/// Builds [`RenderNode`] trees from [`VirtualNode`] trees.
pub struct Snapshotter<'a> {
    cost_model: &'a dyn CostModel,
    default_elision_marker: String,
    cache: Option<&'a SnapshotCache>,
}

struct Frame<'v> {
    node: &'v VirtualNode,
    next_child: usize,
    built: Vec<Arc<RenderNode>>,
}

impl<'v> Frame<'v> {
    fn enter(node: &'v VirtualNode) -> Result<Self> {
        check_shape(node.id(), node.text().len(), node.children().len())?;
        Ok(Self {
            node,
            next_child: 0,
            built: Vec::with_capacity(node.children().len()),
        })
    }
}

impl<'a> Snapshotter<'a> {
    pub fn new(cost_model: &'a dyn CostModel) -> Self {
        Self {
            cost_model,
            default_elision_marker: DEFAULT_ELISION_MARKER.to_string(),
            cache: None,
        }
    }

    /// Marker used by nodes that do not override it.
    pub fn default_elision_marker(mut self, marker: impl Into<String>) -> Self {
        self.default_elision_marker = marker.into();
        self
    }

    pub fn cache(mut self, cache: &'a SnapshotCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Freeze `root` and its whole subtree.
    ///
    /// The cost model runs once per node that is not served from the cache.
    /// Fails on a malformed node, a duplicated id, or an invalid cost/weight.
    pub fn snapshot(&self, root: &VirtualNode) -> Result<Arc<RenderNode>> {
        let mut seen = HashSet::new();
        let mut cache_hits = 0usize;

        if let Some(hit) = self.lookup(root) {
            register_subtree(&hit, &mut seen)?;
            return Ok(hit);
        }
        let mut stack = vec![Frame::enter(root)?];

        while let Some(mut frame) = stack.pop() {
            let node = frame.node;
            if let Some(child) = node.children().get(frame.next_child) {
                frame.next_child += 1;
                match self.lookup(child) {
                    Some(hit) => {
                        register_subtree(&hit, &mut seen)?;
                        cache_hits += 1;
                        frame.built.push(hit);
                        stack.push(frame);
                    }
                    None => {
                        let child_frame = Frame::enter(child)?;
                        stack.push(frame);
                        stack.push(child_frame);
                    }
                }
                continue;
            }

            let frozen = self.freeze(frame, &mut seen)?;
            match stack.last_mut() {
                Some(parent) => parent.built.push(frozen),
                None => {
                    tracing::debug!(
                        root = %root.id(),
                        nodes = seen.len(),
                        cache_hits,
                        "Snapshot complete"
                    );
                    return Ok(frozen);
                }
            }
        }

        unreachable!("the root frame returns once its children are frozen")
    }

    fn lookup(&self, node: &VirtualNode) -> Option<Arc<RenderNode>> {
        self.cache.and_then(|cache| cache.get(node.id()))
    }

    fn freeze(&self, frame: Frame<'_>, seen: &mut HashSet<NodeId>) -> Result<Arc<RenderNode>> {
        let node = frame.node;
        if !seen.insert(node.id()) {
            return Err(ContextweaveError::DuplicateNodeId(node.id()));
        }

        let cost = self.cost_model.node_cost(node)?;
        if !is_valid_quantity(cost) {
            return Err(ContextweaveError::InvalidCost { id: node.id(), cost });
        }

        let weight = node.weight().unwrap_or(0.0);
        if !is_valid_quantity(weight) {
            return Err(ContextweaveError::InvalidWeight {
                id: node.id(),
                weight,
            });
        }

        let frozen = Arc::new(RenderNode {
            id: node.id(),
            text: node.text().to_vec(),
            children: frame.built,
            cost,
            weight,
            can_merge: node.can_merge(),
            elision_marker: node
                .elision_marker()
                .unwrap_or(&self.default_elision_marker)
                .to_string(),
            require_rendered_child: node.require_rendered_child(),
        });

        if let Some(cache) = self.cache {
            cache.insert(Arc::clone(&frozen));
        }
        Ok(frozen)
    }
}

fn register_subtree(node: &RenderNode, seen: &mut HashSet<NodeId>) -> Result<()> {
    for descendant in node.iter() {
        if !seen.insert(descendant.id()) {
            return Err(ContextweaveError::DuplicateNodeId(descendant.id()));
        }
    }
    Ok(())
}
