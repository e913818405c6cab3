//! # Resolution Engine
//!
//! - `resolver` — the bottom-up / top-down / final resolution passes and
//!   the per-graph step cache
//! - `walk` — top-down walks with per-edge context, and the resolution
//!   walks attributing conditions to the ancestors that ship them
//! - `reachable` — the shipped-node set
//!
//! The engine is configured by [`AnalysisConfig`], loaded from
//! `.metalic.toml`.

pub mod reachable;
pub mod resolver;
pub mod walk;

pub use reachable::{reachable_nodes, shipped_nodes};
pub use resolver::{resolve_bottom_up_conditions, resolve_top_down_conditions, StepResolutions};
pub use walk::{
    walk_actions_for_condition, walk_resolutions_for_condition, walk_top_down, ApplicableConditionsContext,
    EdgeContext, NoEdgeContext, WalkPath,
};

use crate::{MetalicError, MetalicResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

// ─── Configuration ─────────────────────────────────────────────────

/// Analysis configuration (loaded from `.metalic.toml`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Metadata files read at once
    #[serde(default = "default_concurrent_readers")]
    pub concurrent_readers: usize,

    /// Suffix appended to root names that lack it
    #[serde(default = "default_metadata_suffix")]
    pub metadata_suffix: String,

    /// Prefixes stripped from target names in dumps and notices
    #[serde(default)]
    pub strip_prefix: Vec<String>,

    /// Report every conflict rather than stopping at the first
    #[serde(default = "default_true")]
    pub full_walk: bool,
}

fn default_concurrent_readers() -> usize {
    5
}
fn default_metadata_suffix() -> String {
    ".meta_lic".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            concurrent_readers: default_concurrent_readers(),
            metadata_suffix: default_metadata_suffix(),
            strip_prefix: vec![],
            full_walk: true,
        }
    }
}

impl FromStr for AnalysisConfig {
    type Err = MetalicError;

    fn from_str(text: &str) -> MetalicResult<Self> {
        let mut config: AnalysisConfig =
            toml::from_str(text).map_err(|e| MetalicError::Config(format!("Failed to parse config: {}", e)))?;
        config.concurrent_readers = config.concurrent_readers.max(1);
        Ok(config)
    }
}

impl AnalysisConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> MetalicResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MetalicError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        content.parse()
    }

    /// Try `.metalic.toml`, then `metalic.toml`, in `root`; fall back to defaults
    pub fn from_project_root(root: &Path) -> Self {
        for file in [".metalic.toml", "metalic.toml"] {
            let path = root.join(file);
            if !path.exists() {
                continue;
            }
            match Self::from_file(&path) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load {}: {}; using defaults", path.display(), e);
                }
            }
        }
        Self::default()
    }

    /// `name` with the first matching `strip_prefix` entry removed.
    pub fn strip<'a>(&self, name: &'a str) -> &'a str {
        self.strip_prefix
            .iter()
            .find_map(|p| name.strip_prefix(p.as_str()))
            .unwrap_or(name)
    }
}

// ─── Resolution Steps ──────────────────────────────────────────────

/// One pass of the resolver. Results are cached per graph by step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResolutionStep {
    /// Conditions flowing up from dependencies
    BottomUp = 1,
    /// Conditions flowing down from the roots
    TopDown = 2,
    /// Bottom-up again, seeded with the top-down result
    Final = 3,
}

impl fmt::Display for ResolutionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionStep::BottomUp => write!(f, "bottom-up"),
            ResolutionStep::TopDown => write!(f, "top-down"),
            ResolutionStep::Final => write!(f, "final"),
        }
    }
}
