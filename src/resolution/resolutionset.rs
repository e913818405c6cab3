//! Resolution sets — action sets keyed by the node that triggers them

use super::{compare_nodes, ActionSet, Resolution};
use crate::graph::{LicenseGraph, NodeId, TargetNodeSet};
use crate::license::ConditionSet;
use std::collections::BTreeMap;
use std::fmt;
use std::ptr;

/// Maps `attaches_to` nodes to the actions their shipment requires. Nodes
/// with no actions are absent.
#[derive(Clone)]
pub struct ResolutionSet<'g> {
    graph: &'g LicenseGraph,
    resolutions: BTreeMap<NodeId, ActionSet<'g>>,
}

impl<'g> ResolutionSet<'g> {
    pub fn new(graph: &'g LicenseGraph) -> Self {
        Self {
            graph,
            resolutions: BTreeMap::new(),
        }
    }

    pub fn graph(&self) -> &'g LicenseGraph {
        self.graph
    }

    /// Require acting on `acts_on` for `conditions` when `attaches_to` ships.
    pub fn add(&mut self, attaches_to: NodeId, acts_on: NodeId, conditions: ConditionSet) {
        if conditions.is_empty() {
            return;
        }
        let graph = self.graph;
        self.resolutions
            .entry(attaches_to)
            .or_insert_with(|| ActionSet::new(graph))
            .add(acts_on, conditions);
    }

    /// Attach every action of `actions` to `attaches_to`.
    pub fn add_actions(&mut self, attaches_to: NodeId, actions: &ActionSet<'_>) {
        if !ptr::eq(self.graph, actions.graph()) {
            panic!("resolution sets from different license graphs cannot be combined");
        }
        if actions.is_empty() {
            return;
        }
        let graph = self.graph;
        self.resolutions
            .entry(attaches_to)
            .or_insert_with(|| ActionSet::new(graph))
            .add_set(actions);
    }

    /// Combine `sets`, all derived from one graph, into a new set.
    ///
    /// Panics when `sets` is empty or mixes graphs.
    pub fn join(sets: &[&ResolutionSet<'g>]) -> ResolutionSet<'g> {
        let Some(first) = sets.first() else {
            panic!("attempt to join 0 resolution sets");
        };
        let mut result = ResolutionSet::new(first.graph);
        for set in sets {
            result.union_with(set);
        }
        result
    }

    /// Add every resolution of `other`.
    pub fn union_with(&mut self, other: &ResolutionSet<'_>) {
        for (&attaches_to, actions) in &other.resolutions {
            self.add_actions(attaches_to, actions);
        }
    }

    /// The nodes that trigger actions, in id order.
    pub fn attaches_to(&self) -> Vec<NodeId> {
        self.resolutions.keys().copied().collect()
    }

    pub fn attaches_to_target(&self, node: NodeId) -> bool {
        self.resolutions.contains_key(&node)
    }

    /// The actions attached to `node`, if any.
    pub fn actions_for(&self, node: NodeId) -> Option<&ActionSet<'g>> {
        self.resolutions.get(&node)
    }

    /// Whether any action attached to `node` resolves a condition in any of
    /// `sets`.
    pub fn any_matching_attach_to_target(&self, node: NodeId, sets: &[ConditionSet]) -> bool {
        self.resolutions.get(&node).is_some_and(|a| a.matches_any_set(sets))
    }

    /// Every node acted on by some resolution.
    pub fn acts_on(&self) -> TargetNodeSet {
        let mut nodes = TargetNodeSet::new();
        for actions in self.resolutions.values() {
            actions.visit_all(|a| {
                nodes.insert(a.acts_on);
            });
        }
        nodes
    }

    /// The resolutions `node` must resolve when shipped.
    pub fn resolutions(&self, node: NodeId) -> Vec<Resolution> {
        let mut out = Vec::new();
        if let Some(actions) = self.resolutions.get(&node) {
            actions.visit_all(|a| {
                out.push(Resolution {
                    attaches_to: node,
                    acts_on: a.acts_on,
                    conditions: a.conditions,
                })
            });
        }
        out
    }

    /// Every resolution that acts on `node`.
    pub fn resolutions_by_acts_on(&self, node: NodeId) -> Vec<Resolution> {
        let mut out = Vec::new();
        for (&attaches_to, actions) in &self.resolutions {
            let cs = actions.conditions_on(node);
            if !cs.is_empty() {
                out.push(Resolution {
                    attaches_to,
                    acts_on: node,
                    conditions: cs,
                });
            }
        }
        out
    }

    /// Every resolution, sorted by attaches_to name, acts_on name, conditions.
    pub fn all_resolutions(&self) -> Vec<Resolution> {
        let mut out: Vec<Resolution> = self.resolutions.keys().flat_map(|&n| self.resolutions(n)).collect();
        out.sort_by(|a, b| a.compare(b, self.graph));
        out
    }

    /// Union of every condition in the set.
    pub fn conditions(&self) -> ConditionSet {
        self.resolutions
            .values()
            .fold(ConditionSet::empty(), |acc, a| acc | a.conditions())
    }

    /// Number of attaches_to nodes.
    pub fn len(&self) -> usize {
        self.resolutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolutions.values().all(ActionSet::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ActionSet<'g>)> {
        self.resolutions.iter().map(|(&n, a)| (n, a))
    }
}

impl fmt::Display for ResolutionSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys = self.attaches_to();
        keys.sort_by(|a, b| compare_nodes(self.graph, *a, *b));
        f.write_str("{")?;
        for (i, n) in keys.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} -> {}", self.graph.node(*n).name, self.resolutions[n])?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for ResolutionSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResolutionSet{}", self)
    }
}
