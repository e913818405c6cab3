//! Source share/privacy conflicts
//!
//! A conflict arises when one shipped node's source must be shared (a
//! restricted or reciprocal condition reaches it) and must also stay private
//! (it originates a proprietary condition).

use crate::engine::walk_resolutions_for_condition;
use crate::graph::{LicenseGraph, NodeId};
use crate::license::{LicenseCondition, IMPLIES_PRIVATE, IMPLIES_SHARED};
use crate::resolution::ResolutionSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A node whose source is required to be both shared and kept private.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSharePrivacyConflict {
    /// The node whose source is in question
    pub source_node: NodeId,
    pub source_name: String,
    /// The condition requiring the source to be shared
    pub share_condition: LicenseCondition,
    /// The condition requiring the source to stay private
    pub privacy_condition: LicenseCondition,
}

impl SourceSharePrivacyConflict {
    fn key(&self) -> (&str, LicenseCondition, LicenseCondition) {
        (&self.source_name, self.share_condition, self.privacy_condition)
    }
}

impl PartialOrd for SourceSharePrivacyConflict {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SourceSharePrivacyConflict {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for SourceSharePrivacyConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} and must share from {} condition",
            self.source_name, self.privacy_condition, self.share_condition
        )
    }
}

/// Every (node, share condition, privacy condition) combination in `graph`,
/// sorted by node name then conditions.
pub fn conflicting_shared_private_source(graph: &LicenseGraph) -> Vec<SourceSharePrivacyConflict> {
    let share = walk_resolutions_for_condition(graph, IMPLIES_SHARED);
    let private = walk_resolutions_for_condition(graph, IMPLIES_PRIVATE);
    if share.is_empty() || private.is_empty() {
        return Vec::new();
    }
    let combined = ResolutionSet::join(&[&share, &private]);

    // per acted-on node, every condition any attachment resolves there
    let mut by_node: BTreeMap<NodeId, (BTreeSet<LicenseCondition>, BTreeSet<LicenseCondition>)> = BTreeMap::new();
    for (_, actions) in combined.iter() {
        actions.visit_all(|a| {
            let entry = by_node.entry(a.acts_on).or_default();
            entry.0.extend((a.conditions & IMPLIES_SHARED).iter());
            entry.1.extend((a.conditions & IMPLIES_PRIVATE).iter());
        });
    }

    let mut conflicts = BTreeSet::new();
    for (node, (shared, private)) in by_node {
        for &s in &shared {
            for &p in &private {
                conflicts.insert(SourceSharePrivacyConflict {
                    source_node: node,
                    source_name: graph.node(node).name.clone(),
                    share_condition: s,
                    privacy_condition: p,
                });
            }
        }
    }
    if !conflicts.is_empty() {
        tracing::info!("{} source share/privacy conflicts", conflicts.len());
    }
    conflicts.into_iter().collect()
}
