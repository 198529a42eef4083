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

//! Budgeted rendering.
//!
//! # Without a budget
//!
//! Every node is rendered except masked ones and their descendants.
//!
//! # With a budget
//!
//! 1. **Selection**: greedy by value. Nodes are popped from a max-priority
//!    queue seeded with the root; a node that fits the remaining budget is
//!    committed and its children become candidates. A child is therefore never
//!    considered before its parent is committed.
//! 2. **Verification**: the selection is rendered. Node costs are estimates,
//!    so when a true cost function is supplied the rendered text is measured
//!    and, while over budget, the most recently committed nodes are revoked
//!    and the text is rendered and measured again.
//!
//! An unreachable budget is answered with the root's elision marker.

mod compose;

use crate::error::{is_valid_quantity, ContextweaveError, Result};
use crate::node::{NodeId, RenderNode};
use crate::queue::PriorityQueue;
use crate::rectify::RectifiedWeights;
use compose::{compose, Composition};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Authoritative cost of concatenated text (e.g. a tokenizer).
///
/// Must be deterministic; it may be called several times per render.
pub trait TextCost {
    fn text_cost(&self, text: &str) -> Result<f64>;
}

impl<F> TextCost for F
where
    F: Fn(&str) -> f64,
{
    fn text_cost(&self, text: &str) -> Result<f64> {
        Ok(self(text))
    }
}

/// Parameters of a single [`render`] call.
#[derive(Default, Clone)]
pub struct RenderOptions<'a> {
    budget: Option<f64>,
    mask: HashSet<NodeId>,
    true_cost: Option<&'a dyn TextCost>,
    weights: Option<&'a RectifiedWeights>,
}

impl<'a> RenderOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(mut self, budget: f64) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Exclude nodes (and their subtrees) from the output.
    pub fn mask<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<NodeId>,
    {
        self.mask.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn mask_node(mut self, id: impl Into<NodeId>) -> Self {
        self.mask.insert(id.into());
        self
    }

    pub fn with_true_cost(mut self, true_cost: &'a dyn TextCost) -> Self {
        self.true_cost = Some(true_cost);
        self
    }

    /// Rank and roll back nodes by rectified weights instead of raw ones.
    pub fn with_weights(mut self, weights: &'a RectifiedWeights) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn budget(&self) -> Option<f64> {
        self.budget
    }

    pub fn is_masked(&self, id: NodeId) -> bool {
        self.mask.contains(&id)
    }

    fn value(&self, node: &RenderNode) -> f64 {
        match self.weights {
            Some(weights) => weights.value(node),
            None => node.value(),
        }
    }

    fn measure(&self, true_cost: &dyn TextCost, text: &str) -> Result<f64> {
        let cost = true_cost.text_cost(text)?;
        if !is_valid_quantity(cost) {
            return Err(ContextweaveError::InvalidTextCost(cost));
        }
        Ok(cost)
    }
}

/// Result of [`render`].
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub text: String,
    pub cost: f64,
    /// Nodes whose own fragments appear in `text`.
    pub rendered_nodes: HashMap<NodeId, Arc<RenderNode>>,
}

impl RenderOutput {
    /// Nothing but the root's elision marker was produced.
    pub fn is_elided(&self) -> bool {
        self.rendered_nodes.is_empty()
    }

    /// Serializable view with the rendered ids in ascending order.
    pub fn summary(&self) -> RenderSummary {
        let mut rendered: Vec<NodeId> = self.rendered_nodes.keys().copied().collect();
        rendered.sort_unstable();
        RenderSummary {
            text: self.text.clone(),
            cost: self.cost,
            rendered,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSummary {
    pub text: String,
    pub cost: f64,
    pub rendered: Vec<NodeId>,
}

/// Render `root` under the given options.
///
/// Errors only on contract violations: a negative or non-finite budget, or a
/// true cost function returning one.
pub fn render(root: &Arc<RenderNode>, options: &RenderOptions<'_>) -> Result<RenderOutput> {
    if let Some(budget) = options.budget {
        if !is_valid_quantity(budget) {
            return Err(ContextweaveError::InvalidBudget(budget));
        }
    }

    if options.is_masked(root.id()) {
        tracing::debug!(root = %root.id(), "Root is masked");
        return elided(root, options);
    }
    if options.budget.unwrap_or(root.cost()) < root.cost() {
        tracing::warn!(
            root = %root.id(),
            root_cost = root.cost(),
            budget = ?options.budget,
            "Budget cannot fit the root"
        );
        return elided(root, options);
    }

    match options.budget {
        None => render_all(root, options),
        Some(budget) => render_within(root, budget, options),
    }
}

fn render_all(root: &Arc<RenderNode>, options: &RenderOptions<'_>) -> Result<RenderOutput> {
    let composition = compose(root, |node| !options.is_masked(node.id()), options.weights);
    if composition.is_empty() {
        return elided(root, options);
    }

    let cost = match options.true_cost {
        Some(true_cost) => options.measure(true_cost, &composition.text())?,
        None => composition.estimated_cost(),
    };
    Ok(finish(&composition, cost))
}

fn render_within(
    root: &Arc<RenderNode>,
    budget: f64,
    options: &RenderOptions<'_>,
) -> Result<RenderOutput> {
    let (mut selected, mut marginal) = select(root, budget, options);
    let mut passes = 0usize;

    loop {
        passes += 1;
        let composition = compose(root, |node| selected.contains(&node.id()), options.weights);
        if composition.is_empty() {
            tracing::debug!(root = %root.id(), passes, "Nothing left to render");
            return elided(root, options);
        }

        let Some(true_cost) = options.true_cost else {
            // Sum of selected costs never exceeds the budget by construction.
            return Ok(finish(&composition, composition.estimated_cost()));
        };

        let text = composition.text();
        let cost = options.measure(true_cost, &text)?;
        if cost <= budget {
            tracing::debug!(
                root = %root.id(),
                passes,
                cost,
                budget,
                rendered = composition.rendered().len(),
                "Render fits budget"
            );
            return Ok(finish_with_text(&composition, text, cost));
        }

        // Node costs only approximate the true cost; the next pass re-measures.
        let mut estimate = cost;
        while estimate > budget {
            let Some(node) = marginal.pop() else {
                tracing::warn!(
                    root = %root.id(),
                    passes,
                    budget,
                    "True cost exceeds budget with every node revoked"
                );
                return elided(root, options);
            };
            selected.remove(&node.id());
            estimate -= node.effective_cost();
        }

        tracing::debug!(
            root = %root.id(),
            pass = passes,
            measured = cost,
            estimate,
            budget,
            remaining_marginal = marginal.len(),
            "Render over budget, revoking nodes"
        );
    }
}

/// Greedy selection. Returns the selected ids and the commit order.
fn select<'a>(
    root: &'a Arc<RenderNode>,
    budget: f64,
    options: &RenderOptions<'_>,
) -> (HashSet<NodeId>, Vec<&'a Arc<RenderNode>>) {
    let mut candidates = PriorityQueue::new();
    candidates.insert(root, options.value(root));

    let mut remaining = budget;
    let mut selected = HashSet::new();
    let mut marginal = Vec::new();

    while remaining > 0.0 {
        let Some((node, _)) = candidates.pop() else {
            break;
        };
        if options.is_masked(node.id()) {
            continue;
        }

        let cost = node.effective_cost();
        if cost > remaining {
            continue;
        }

        remaining -= cost;
        selected.insert(node.id());
        marginal.push(node);
        for child in node.children() {
            candidates.insert(child, options.value(child));
        }
    }

    tracing::debug!(
        root = %root.id(),
        selected = selected.len(),
        remaining,
        budget,
        "Greedy selection complete"
    );

    (selected, marginal)
}

fn finish(composition: &Composition<'_>, cost: f64) -> RenderOutput {
    finish_with_text(composition, composition.text(), cost)
}

fn finish_with_text(composition: &Composition<'_>, text: String, cost: f64) -> RenderOutput {
    RenderOutput {
        text,
        cost,
        rendered_nodes: composition
            .rendered()
            .iter()
            .map(|node| (node.id(), Arc::clone(node)))
            .collect(),
    }
}

/// The root's elision marker standing in for the whole tree.
fn elided(root: &RenderNode, options: &RenderOptions<'_>) -> Result<RenderOutput> {
    let text = root.elision_marker().to_string();
    let cost = match options.true_cost {
        Some(true_cost) => options.measure(true_cost, &text)?,
        None => text.chars().count() as f64,
    };
    Ok(RenderOutput {
        text,
        cost,
        rendered_nodes: HashMap::new(),
    })
}
