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

//! Contextweave Core
//!
//! Flattens a tree of text fragments into a single string under a hard cost
//! budget (typically LLM tokens), replacing low-value subtrees with elision
//! markers.
//!
//! # Pipeline
//!
//! 1. Build a [`VirtualNode`] tree.
//! 2. Freeze it with a [`Snapshotter`], which attaches per-node costs.
//! 3. Optionally [`rectify_weights`] so no descendant outranks its ancestors.
//! 4. [`render`] with a budget, mask and optional true cost function.
//!
//! ```
//! use contextweave_core::{render, RenderOptions, Snapshotter, TokenCalculator, VirtualNode};
//!
//! let tree = VirtualNode::new(
//!     1,
//!     vec!["Notes:\n".into(), "\n".into(), "".into()],
//!     vec![
//!         VirtualNode::leaf(2, "keep this line").with_weight(5.0),
//!         VirtualNode::leaf(3, "a very long and not very useful line").with_weight(0.1),
//!     ],
//! )?;
//!
//! let tokens = TokenCalculator::new();
//! let root = Snapshotter::new(&tokens).snapshot(&tree)?;
//! let output = render(&root, &RenderOptions::new().with_budget(8.0).with_true_cost(&tokens))?;
//!
//! assert_eq!(output.text, "Notes:\nkeep this line\n[...]");
//! # Ok::<(), contextweave_core::ContextweaveError>(())
//! ```

pub mod config;
pub mod error;
pub mod node;
pub mod queue;
pub mod rectify;
pub mod render;
pub mod tokens;

pub use config::RenderConfig;
pub use error::{ContextweaveError, Result};
pub use node::{
    CostModel, NodeId, RenderNode, SnapshotCache, Snapshotter, VirtualNode,
    DEFAULT_ELISION_MARKER,
};
pub use queue::PriorityQueue;
pub use rectify::{rectify_weights, RectifiedWeights};
pub use render::{render, RenderOptions, RenderOutput, RenderSummary, TextCost};
pub use tokens::TokenCalculator;
