//! License graph — metadata nodes and annotated dependency edges
//!
//! The graph owns everything: nodes live in a flat vector addressed by
//! [`NodeId`], edges in a flat vector addressed by position. Nothing holds
//! a node by ownership, so cycles in malformed input cannot leak or
//! double-free; walks guard against them instead.
//!
//! Node metadata is frozen once the graph is built. The only mutable state
//! is behind the graph's single mutex: the shared action pool and the
//! cached resolver steps. The forward index and the shipped-node set are
//! built lazily, at most once.

pub mod builder;

pub use builder::GraphBuilder;

use crate::engine::resolver::StepResolutions;
use crate::engine::ResolutionStep;
use crate::license::ConditionSet;
use crate::resolution::ActionPool;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

// ─── Identity ───────────────────────────────────────────────────────

/// Dense index of a node within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

// ─── Nodes ──────────────────────────────────────────────────────────

/// Path substitution applied when a built file moves into a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallMap {
    pub from_path: String,
    pub container_path: String,
}

/// One license metadata record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetNode {
    pub id: NodeId,
    /// Path of the metadata file; unique within the graph
    pub name: String,
    pub package_name: String,
    pub module_types: Vec<String>,
    pub module_classes: Vec<String>,
    pub projects: Vec<String>,
    /// e.g. `SPDX-license-identifier-Apache-2.0` or `legacy_notice`
    pub license_kinds: Vec<String>,
    /// Conditions originating at this node
    pub license_conditions: ConditionSet,
    pub license_texts: Vec<String>,
    /// Aggregates such as `.img` or `.zip` that merely group their contents
    pub is_container: bool,
    pub built: Vec<String>,
    pub installed: Vec<String>,
    pub install_map: Vec<InstallMap>,
    pub sources: Vec<String>,
}

impl TargetNode {
    /// The originating conditions; same as `license_conditions`.
    pub fn originating_conditions(&self) -> ConditionSet {
        self.license_conditions
    }
}

impl fmt::Display for TargetNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ─── Edges ──────────────────────────────────────────────────────────

/// The set of annotations on an edge. `static`, `dynamic` and `toolchain`
/// drive policy; anything else is carried along untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeAnnotations(BTreeSet<String>);

impl EdgeAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, annotation: &str) -> bool {
        self.0.contains(annotation)
    }

    pub fn insert(&mut self, annotation: impl Into<String>) {
        self.0.insert(annotation.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Annotation names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for EdgeAnnotations {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// A dependency of `target` on `dependency`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEdge {
    pub target: NodeId,
    pub dependency: NodeId,
    pub annotations: EdgeAnnotations,
}

// ─── Node Sets ──────────────────────────────────────────────────────

/// A deduplicated set of nodes from one graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetNodeSet(BTreeSet<NodeId>);

impl TargetNodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: NodeId) -> bool {
        self.0.insert(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.0.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.0.iter().copied()
    }

    /// Member names, sorted.
    pub fn names(&self, graph: &LicenseGraph) -> Vec<String> {
        let mut names: Vec<String> = self.iter().map(|id| graph.node(id).name.clone()).collect();
        names.sort();
        names
    }
}

impl FromIterator<NodeId> for TargetNodeSet {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ─── Graph ──────────────────────────────────────────────────────────

/// State shared by every resolution over one graph.
#[derive(Default)]
pub(crate) struct GraphState {
    pub(crate) pool: ActionPool,
    pub(crate) steps: HashMap<ResolutionStep, Arc<StepResolutions>>,
}

/// Nodes, edges and roots of one analysis, plus the caches derived from them.
pub struct LicenseGraph {
    nodes: Vec<TargetNode>,
    by_name: HashMap<String, NodeId>,
    edges: Vec<TargetEdge>,
    roots: Vec<NodeId>,
    forward: OnceCell<Vec<Vec<usize>>>,
    shipped: OnceCell<TargetNodeSet>,
    state: Mutex<GraphState>,
}

impl LicenseGraph {
    /// Assemble a graph from already-validated parts.
    pub(crate) fn from_parts(nodes: Vec<TargetNode>, edges: Vec<TargetEdge>, roots: Vec<NodeId>) -> Self {
        let mut by_name = HashMap::with_capacity(nodes.len());
        for node in &nodes {
            if let Some(prev) = by_name.insert(node.name.clone(), node.id) {
                panic!(
                    "identically named targets at different locations: {} ({} and {})",
                    node.name, prev, node.id
                );
            }
        }
        let mut state = GraphState::default();
        state.pool.reserve_nodes(nodes.len());
        Self {
            nodes,
            by_name,
            edges,
            roots,
            forward: OnceCell::new(),
            shipped: OnceCell::new(),
            state: Mutex::new(state),
        }
    }

    /// The node named `name`. Panics when absent.
    pub fn target_node(&self, name: &str) -> &TargetNode {
        match self.by_name.get(name) {
            Some(id) => &self.nodes[id.0],
            None => panic!("unknown target node {:?}", name),
        }
    }

    pub fn has_target_node(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn find_node(&self, name: &str) -> Option<&TargetNode> {
        self.by_name.get(name).map(|id| &self.nodes[id.0])
    }

    pub fn node(&self, id: NodeId) -> &TargetNode {
        &self.nodes[id.0]
    }

    pub fn targets(&self) -> impl Iterator<Item = &TargetNode> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges(&self) -> &[TargetEdge] {
        &self.edges
    }

    pub fn edge(&self, index: usize) -> &TargetEdge {
        &self.edges[index]
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Build the target → outgoing edge index. Idempotent.
    pub fn index_forward(&self) -> &[Vec<usize>] {
        self.forward.get_or_init(|| {
            let mut index = vec![Vec::new(); self.nodes.len()];
            for (i, e) in self.edges.iter().enumerate() {
                index[e.target.0].push(i);
            }
            index
        })
    }

    /// Positions of the edges leaving `id`.
    pub fn out_edge_indices(&self, id: NodeId) -> &[usize] {
        &self.index_forward()[id.0]
    }

    /// Edges leaving `id`.
    pub fn out_edges(&self, id: NodeId) -> impl Iterator<Item = &TargetEdge> + '_ {
        self.out_edge_indices(id).iter().map(move |&i| &self.edges[i])
    }

    pub(crate) fn shipped_cache(&self) -> &OnceCell<TargetNodeSet> {
        &self.shipped
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, GraphState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for LicenseGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LicenseGraph")
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .field("roots", &self.roots)
            .finish()
    }
}
