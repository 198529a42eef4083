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

//! Token estimation.
//!
//! A character-ratio approximation of cl100k-style tokenizers. It serves two
//! roles: per-node cost assignment at snapshot time, and the true cost of the
//! concatenated output at render time. Because `ceil` is applied to the whole
//! text rather than per fragment, the second is not simply the sum of the
//! first; the renderer's verification loop reconciles the two.

use crate::error::Result;
use crate::node::{CostModel, VirtualNode};
use crate::render::TextCost;

/// Default average characters per token for English text.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 4.0;

/// Token calculator for estimating text token counts.
#[derive(Debug, Clone, Copy)]
pub struct TokenCalculator {
    chars_per_token: f64,
}

impl Default for TokenCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCalculator {
    pub fn new() -> Self {
        Self {
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
        }
    }

    /// Calculator with a custom characters-per-token ratio.
    ///
    /// Ratios that are not strictly positive fall back to the default.
    pub fn with_ratio(chars_per_token: f64) -> Self {
        if chars_per_token.is_finite() && chars_per_token > 0.0 {
            Self { chars_per_token }
        } else {
            Self::new()
        }
    }

    pub fn chars_per_token(&self) -> f64 {
        self.chars_per_token
    }

    /// Estimate the number of tokens in a string.
    pub fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        ((text.len() as f64) / self.chars_per_token).ceil() as usize
    }

    /// Estimate each string separately and sum.
    pub fn estimate_all(&self, texts: &[&str]) -> usize {
        texts.iter().map(|t| self.estimate(t)).sum()
    }

    pub fn fits_budget(&self, text: &str, budget: usize) -> bool {
        self.estimate(text) <= budget
    }
}

impl CostModel for TokenCalculator {
    /// Tokens of the node's own fragments, children excluded.
    fn node_cost(&self, node: &VirtualNode) -> Result<f64> {
        Ok(self.estimate(&node.own_text()) as f64)
    }
}

impl TextCost for TokenCalculator {
    fn text_cost(&self, text: &str) -> Result<f64> {
        Ok(self.estimate(text) as f64)
    }
}
