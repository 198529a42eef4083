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

//! Render configuration.

use crate::error::{ContextweaveError, Result};
use crate::node::DEFAULT_ELISION_MARKER;
use crate::tokens::{TokenCalculator, DEFAULT_CHARS_PER_TOKEN};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for snapshotting and rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Marker for nodes that do not set their own.
    #[serde(default = "default_elision_marker")]
    pub default_elision_marker: String,

    /// Average characters per token for the built-in estimator.
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: f64,

    /// Token budget; `None` renders everything.
    #[serde(default)]
    pub budget: Option<f64>,

    /// Whether to rectify weights before rendering.
    #[serde(default = "default_true")]
    pub rectify: bool,

    /// Whether to verify the output against the whole-text token estimate.
    #[serde(default = "default_true")]
    pub use_true_cost: bool,

    /// Capacity of the snapshot cache, in nodes.
    #[serde(default = "default_snapshot_cache_capacity")]
    pub snapshot_cache_capacity: u64,
}

fn default_elision_marker() -> String {
    DEFAULT_ELISION_MARKER.to_string()
}

fn default_chars_per_token() -> f64 {
    DEFAULT_CHARS_PER_TOKEN
}

fn default_true() -> bool {
    true
}

fn default_snapshot_cache_capacity() -> u64 {
    10_000
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            default_elision_marker: default_elision_marker(),
            chars_per_token: default_chars_per_token(),
            budget: None,
            rectify: default_true(),
            use_true_cost: default_true(),
            snapshot_cache_capacity: default_snapshot_cache_capacity(),
        }
    }
}

impl RenderConfig {
    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| ContextweaveError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ContextweaveError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(budget) = self.budget {
            if !(budget.is_finite() && budget >= 0.0) {
                return Err(ContextweaveError::InvalidBudget(budget));
            }
        }
        if !(self.chars_per_token.is_finite() && self.chars_per_token > 0.0) {
            return Err(ContextweaveError::Config(format!(
                "chars_per_token must be positive, got {}",
                self.chars_per_token
            )));
        }
        Ok(())
    }

    pub fn with_budget(mut self, budget: f64) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn with_elision_marker(mut self, marker: impl Into<String>) -> Self {
        self.default_elision_marker = marker.into();
        self
    }

    pub fn token_calculator(&self) -> TokenCalculator {
        TokenCalculator::with_ratio(self.chars_per_token)
    }
}
