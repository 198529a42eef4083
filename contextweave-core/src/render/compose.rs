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

//! Text reconstruction for a fixed inclusion test.

use crate::node::RenderNode;
use crate::rectify::RectifiedWeights;
use std::sync::Arc;

#[derive(Clone, Copy)]
struct Piece<'a> {
    text: &'a str,
    marker: bool,
}

impl Piece<'_> {
    fn is_blank(&self) -> bool {
        !self.marker && self.text.trim().is_empty()
    }
}

/// Output of one pass: emitted fragments plus the nodes that rendered, in
/// document order.
pub(crate) struct Composition<'a> {
    pieces: Vec<Piece<'a>>,
    rendered: Vec<&'a Arc<RenderNode>>,
}

impl<'a> Composition<'a> {
    /// The root rolled back or was never included.
    pub(crate) fn is_empty(&self) -> bool {
        self.rendered.is_empty()
    }

    pub(crate) fn text(&self) -> String {
        self.pieces.iter().map(|piece| piece.text).collect()
    }

    pub(crate) fn rendered(&self) -> &[&'a Arc<RenderNode>] {
        &self.rendered
    }

    /// Sum of the estimated costs of every rendered node.
    pub(crate) fn estimated_cost(&self) -> f64 {
        self.rendered.iter().map(|node| node.cost()).sum()
    }
}

struct Frame<'a> {
    node: &'a Arc<RenderNode>,
    next_child: usize,
    /// Merge flag this node was entered with, reused if it rolls back.
    merge: bool,
    needs_child: bool,
    any_child_rendered: bool,
    prev_rendered: bool,
    pieces_mark: usize,
    rendered_mark: usize,
}

struct Composer<'a, 'w, F> {
    include: F,
    weights: Option<&'w RectifiedWeights>,
    out: Composition<'a>,
}

impl<'a, F> Composer<'a, '_, F>
where
    F: Fn(&RenderNode) -> bool,
{
    fn enter(&mut self, node: &'a Arc<RenderNode>, merge: bool) -> Option<Frame<'a>> {
        if !(self.include)(node.as_ref()) {
            self.elide(node, merge);
            return None;
        }

        let needs_child = node.require_rendered_child()
            || self.weights.is_some_and(|weights| weights.is_lifted(node));
        let frame = Frame {
            node,
            next_child: 0,
            merge,
            needs_child,
            any_child_rendered: false,
            prev_rendered: false,
            pieces_mark: self.out.pieces.len(),
            rendered_mark: self.out.rendered.len(),
        };

        self.out.rendered.push(node);
        self.emit(&node.text()[0]);
        Some(frame)
    }

    fn after_child(&mut self, frame: &mut Frame<'a>, rendered: bool) {
        frame.any_child_rendered |= rendered;
        frame.prev_rendered = rendered;
        let node: &'a RenderNode = frame.node;
        self.emit(&node.text()[frame.next_child]);
    }

    /// Returns whether the node stays rendered.
    fn finish(&mut self, frame: Frame<'a>) -> bool {
        if frame.needs_child && !frame.any_child_rendered {
            self.out.pieces.truncate(frame.pieces_mark);
            self.out.rendered.truncate(frame.rendered_mark);
            self.elide(frame.node, frame.merge);
            return false;
        }
        true
    }

    fn emit(&mut self, text: &'a str) {
        self.out.pieces.push(Piece {
            text,
            marker: false,
        });
    }

    /// Emit the node's marker, or fold it into the marker already emitted.
    fn elide(&mut self, node: &'a RenderNode, merge: bool) {
        let pieces = &mut self.out.pieces;
        let follows_marker = match pieces.as_slice() {
            [.., before, last] => before.marker && last.is_blank(),
            _ => false,
        };

        if merge || follows_marker {
            if pieces.last().is_some_and(|piece| !piece.marker) {
                pieces.pop();
            }
            return;
        }

        pieces.push(Piece {
            text: node.elision_marker(),
            marker: true,
        });
    }
}

/// Render `root` in document order, keeping exactly the nodes `include`
/// accepts (and whose ancestors were kept).
///
/// A node that requires a rendered child, or whose rectified weight was lifted
/// above its own by descendants, is rolled back when none of its children
/// produced output.
pub(crate) fn compose<'a, F>(
    root: &'a Arc<RenderNode>,
    include: F,
    weights: Option<&RectifiedWeights>,
) -> Composition<'a>
where
    F: Fn(&RenderNode) -> bool,
{
    let mut composer = Composer {
        include,
        weights,
        out: Composition {
            pieces: Vec::new(),
            rendered: Vec::new(),
        },
    };

    let mut stack: Vec<Frame<'a>> = composer.enter(root, false).into_iter().collect();

    while let Some(mut frame) = stack.pop() {
        let node: &'a RenderNode = frame.node;
        if let Some(child) = node.children().get(frame.next_child) {
            let merge = node.can_merge() && frame.next_child > 0 && !frame.prev_rendered;
            frame.next_child += 1;
            match composer.enter(child, merge) {
                Some(child_frame) => {
                    stack.push(frame);
                    stack.push(child_frame);
                }
                None => {
                    composer.after_child(&mut frame, false);
                    stack.push(frame);
                }
            }
            continue;
        }

        let rendered = composer.finish(frame);
        if let Some(parent) = stack.last_mut() {
            composer.after_child(parent, rendered);
        }
    }

    composer.out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeId, Snapshotter, VirtualNode};

    fn unit_cost(_: &VirtualNode) -> f64 {
        1.0
    }

    fn node(id: u64, text: &[&str], children: Vec<VirtualNode>) -> VirtualNode {
        VirtualNode::new(id, text.iter().map(|s| s.to_string()).collect(), children).unwrap()
    }

    fn snapshot(tree: &VirtualNode) -> Arc<RenderNode> {
        Snapshotter::new(&unit_cost)
            .default_elision_marker("…")
            .snapshot(tree)
            .unwrap()
    }

    fn compose_without(root: &Arc<RenderNode>, excluded: &[u64]) -> (String, Vec<NodeId>) {
        let composition = compose(root, |n| !excluded.contains(&n.id().0), None);
        let ids = composition.rendered().iter().map(|n| n.id()).collect();
        (composition.text(), ids)
    }

    #[test]
    fn test_full_render_in_document_order() {
        let tree = node(
            1,
            &["<", "|", ">"],
            vec![
                VirtualNode::leaf(2, "a"),
                node(3, &["[", "]"], vec![VirtualNode::leaf(4, "b")]),
            ],
        );
        let root = snapshot(&tree);

        let (text, ids) = compose_without(&root, &[]);
        assert_eq!(text, "<a|[b]>");
        assert_eq!(ids, vec![NodeId(1), NodeId(2), NodeId(3), NodeId(4)]);
    }

    #[test]
    fn test_excluded_subtree_becomes_marker() {
        let tree = node(
            1,
            &["<", "|", ">"],
            vec![
                VirtualNode::leaf(2, "a"),
                node(3, &["[", "]"], vec![VirtualNode::leaf(4, "b")]),
            ],
        );
        let root = snapshot(&tree);

        let (text, ids) = compose_without(&root, &[3]);
        assert_eq!(text, "<a|…>");
        assert_eq!(ids, vec![NodeId(1), NodeId(2)]);
    }

    #[test]
    fn test_whitespace_between_markers_collapses() {
        let tree = node(
            1,
            &["start\n", "\n", "\n", "\nend"],
            vec![VirtualNode::leaf(2, "a"), VirtualNode::leaf(3, "b"), VirtualNode::leaf(4, "c")],
        );
        let root = snapshot(&tree);

        let (text, _) = compose_without(&root, &[2, 3, 4]);
        assert_eq!(text, "start\n…\nend");
    }

    #[test]
    fn test_non_blank_separator_keeps_markers_without_merge() {
        let tree = node(
            1,
            &["(", ", ", ")"],
            vec![VirtualNode::leaf(2, "a"), VirtualNode::leaf(3, "b")],
        );
        let root = snapshot(&tree);

        let (text, _) = compose_without(&root, &[2, 3]);
        assert_eq!(text, "(…, …)");
    }

    #[test]
    fn test_mergeable_node_collapses_adjacent_markers() {
        let tree = node(
            1,
            &["(", ", ", ", ", ")"],
            vec![VirtualNode::leaf(2, "a"), VirtualNode::leaf(3, "b"), VirtualNode::leaf(4, "c")],
        )
        .with_can_merge(true);
        let root = snapshot(&tree);

        assert_eq!(compose_without(&root, &[2, 3]).0, "(…, c)");
        assert_eq!(compose_without(&root, &[2, 4]).0, "(…, b, …)");
        assert_eq!(compose_without(&root, &[2, 3, 4]).0, "(…)");
    }

    #[test]
    fn test_required_child_rolls_back_parent() {
        let tree = node(
            1,
            &["head ", " tail"],
            vec![
                node(2, &["{", "}"], vec![VirtualNode::leaf(3, "x")])
                    .with_require_rendered_child(true),
            ],
        );
        let root = snapshot(&tree);

        let (text, ids) = compose_without(&root, &[3]);
        assert_eq!(text, "head … tail");
        assert_eq!(ids, vec![NodeId(1)]);

        let (text, _) = compose_without(&root, &[]);
        assert_eq!(text, "head {x} tail");
    }

    #[test]
    fn test_rolled_back_root_is_empty() {
        let tree =
            node(1, &["<", ">"], vec![VirtualNode::leaf(2, "x")]).with_require_rendered_child(true);
        let root = snapshot(&tree);

        let composition = compose(&root, |n| n.id() != NodeId(2), None);
        assert!(composition.is_empty());
        assert_eq!(composition.estimated_cost(), 0.0);
    }
}
