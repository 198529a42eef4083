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

//! JSON tree documents.
//!
//! ```json
//! {
//!   "id": 1,
//!   "text": ["Notes:\n", "\n", ""],
//!   "can_merge": true,
//!   "children": [
//!     { "id": 2, "text": ["first"], "weight": 3.0 },
//!     { "id": 3, "text": ["second"], "elision_marker": "(more)" }
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use contextweave_core::{NodeId, VirtualNode};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDocument {
    pub id: NodeId,
    pub text: Vec<String>,
    #[serde(default)]
    pub children: Vec<NodeDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_merge: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elision_marker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_rendered_child: Option<bool>,
}

impl NodeDocument {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Invalid tree document")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tree document {:?}", path))?;
        Self::from_json(&content).with_context(|| format!("Failed to parse {:?}", path))
    }

    /// Convert into a [`VirtualNode`], checking every node's shape.
    pub fn into_virtual(self) -> Result<VirtualNode> {
        let Self {
            id,
            text,
            children,
            weight,
            can_merge,
            elision_marker,
            require_rendered_child,
        } = self;

        let children = children
            .into_iter()
            .map(NodeDocument::into_virtual)
            .collect::<Result<Vec<_>>>()?;
        let mut node = VirtualNode::new(id, text, children)?;

        if let Some(weight) = weight {
            node = node.with_weight(weight);
        }
        if let Some(can_merge) = can_merge {
            node = node.with_can_merge(can_merge);
        }
        if let Some(marker) = elision_marker {
            node = node.with_elision_marker(marker);
        }
        if let Some(require) = require_rendered_child {
            node = node.with_require_rendered_child(require);
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_nested_document() {
        let doc = NodeDocument::from_json(
            r#"{
                "id": 1,
                "text": ["(", ", ", ")"],
                "can_merge": true,
                "children": [
                    { "id": 2, "text": ["a"], "weight": 2.5 },
                    { "id": 3, "text": ["b"], "elision_marker": "~" }
                ]
            }"#,
        )
        .unwrap();

        let node = doc.into_virtual().unwrap();
        assert_eq!(node.id(), NodeId(1));
        assert!(node.can_merge());
        assert_eq!(node.children()[0].weight(), Some(2.5));
        assert_eq!(node.children()[1].elision_marker(), Some("~"));
        assert!(!node.require_rendered_child());
    }

    #[test]
    fn test_shape_mismatch_is_reported() {
        let doc = NodeDocument::from_json(
            r#"{ "id": 1, "text": ["only"], "children": [{ "id": 2, "text": ["x"] }] }"#,
        )
        .unwrap();

        let err = doc.into_virtual().unwrap_err();
        assert!(err.to_string().contains("Node 1"));
    }

    #[test]
    fn test_missing_text_rejected() {
        assert!(NodeDocument::from_json(r#"{ "id": 1 }"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "id": 9, "text": ["hello"] }}"#).unwrap();

        let node = NodeDocument::load(file.path()).unwrap().into_virtual().unwrap();
        assert_eq!(node.own_text(), "hello");
    }
}
