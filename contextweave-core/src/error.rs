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

//! Error types for tree construction, snapshotting and rendering.
//!
//! An unreachable budget is not an error: the renderer answers it with the
//! root's elision marker. Everything here is either a malformed tree or a
//! caller handing in numbers the algorithms cannot work with.

use crate::node::NodeId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContextweaveError {
    /// Text fragments must interleave with children: `fragments == children + 1`.
    #[error(
        "Node {id}: expected {} text fragments for {children} children, got {fragments}",
        .children + 1
    )]
    ShapeMismatch {
        id: NodeId,
        fragments: usize,
        children: usize,
    },

    #[error("Node id {0} appears more than once in the tree")]
    DuplicateNodeId(NodeId),

    #[error("Node {id}: cost must be a finite non-negative number, got {cost}")]
    InvalidCost { id: NodeId, cost: f64 },

    #[error("Node {id}: weight must be a finite non-negative number, got {weight}")]
    InvalidWeight { id: NodeId, weight: f64 },

    #[error("Text cost must be a finite non-negative number, got {0}")]
    InvalidTextCost(f64),

    #[error("Budget must be a finite non-negative number, got {0}")]
    InvalidBudget(f64),

    #[error("Cost function failed: {0}")]
    CostFunction(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ContextweaveError>;

/// Finite and `>= 0`; shared by every numeric contract check.
pub(crate) fn is_valid_quantity(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message() {
        let err = ContextweaveError::ShapeMismatch {
            id: NodeId(7),
            fragments: 1,
            children: 2,
        };
        assert_eq!(
            err.to_string(),
            "Node 7: expected 3 text fragments for 2 children, got 1"
        );
    }

    #[test]
    fn test_valid_quantity() {
        assert!(is_valid_quantity(0.0));
        assert!(is_valid_quantity(12.5));
        assert!(!is_valid_quantity(-1.0));
        assert!(!is_valid_quantity(f64::NAN));
        assert!(!is_valid_quantity(f64::INFINITY));
    }
}
