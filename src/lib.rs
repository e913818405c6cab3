//! # metalic — License Condition Resolution for Build Distributions
//!
//! Reads the license metadata emitted for every build target of a large
//! distribution (images, APEXes, containers, binaries, libraries), links
//! the records into a dependency graph and works out, for every artifact
//! that ships, which license conditions apply, which artifact they
//! originate from and which artifact the resulting action must be taken on.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  .meta_lic files ──► Reader (bounded fan-out, rayon pool)    │
//! │                          │                                   │
//! │                          ▼                                   │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │ LicenseGraph: nodes │ annotated edges │ action pool     │  │
//! │  └──────────────┬─────────────────────────────────────────┘  │
//! │                 ▼                                            │
//! │  Resolver: bottom-up ──► top-down ──► bottom-up (final)      │
//! │                 │        (Policy decides what crosses edges) │
//! │                 ▼                                            │
//! │  Walks: shipped nodes │ resolutions for a condition universe │
//! │                 │                                            │
//! │                 ▼                                            │
//! │  Consumers: notices │ share/privacy conflicts │ dumps │ JSON │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Capabilities
//!
//! - **Condition Algebra**: 10 canonical conditions as a 16-bit set with
//!   policy predicate groups (`IMPLIES_SHARED`, `IMPLIES_PRIVATE`, ...)
//! - **GPL Family Refinement**: LGPL, classpath-exception and generic GPL
//!   kinds resolved to their restricted variants
//! - **Edge-Aware Propagation**: static, dynamic and toolchain edges carry
//!   different conditions in each direction
//! - **Interned Actions**: all resolutions share one action pool indexed by
//!   interval sets
//! - **Conflict Detection**: source that must be shared and kept private
//! - **Reports**: check-share verdicts, graph and resolution dumps,
//!   GraphViz output, notice indexes

pub mod license;
pub mod resolution;
pub mod graph;
pub mod ingest;
pub mod policy;
pub mod engine;
pub mod detection;
pub mod report;

// Re-exports for convenience
pub use license::{conditions_from_names, ConditionSet, LicenseCondition};
pub use resolution::{ActionSet, IntervalSet, Resolution, ResolutionAction, ResolutionSet};
pub use graph::{GraphBuilder, LicenseGraph, NodeId, TargetEdge, TargetNode, TargetNodeSet};
pub use ingest::{read_license_graph, FsSource, MemorySource, MetadataSource, TargetRecord};
pub use engine::{
    resolve_bottom_up_conditions, resolve_top_down_conditions, shipped_nodes,
    walk_actions_for_condition, walk_resolutions_for_condition, AnalysisConfig, ResolutionStep,
};
pub use detection::{conflicting_shared_private_source, SourceSharePrivacyConflict};
pub use report::{check_share, CheckShareReport, DumpFormat};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetalicError {
    #[error("no license metadata to analyze")]
    EmptyInput,

    #[error("malformed license metadata {file} line {line}: {message}")]
    MalformedInput {
        file: String,
        line: usize,
        message: String,
    },

    #[error("{target} depends on unknown license metadata {dependency}")]
    UnknownDependency { target: String, dependency: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type MetalicResult<T> = Result<T, MetalicError>;
