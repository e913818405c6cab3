//! Resolutions — which conditions require action on which target
//!
//! A [`ResolutionAction`] says "act on this node to resolve these
//! conditions". Every action a graph ever realizes is interned once in the
//! graph's [`ActionPool`]; an [`ActionSet`] is just an [`IntervalSet`] of
//! pool indices, and a [`ResolutionSet`] maps the node whose shipment
//! triggers the actions (`attaches_to`) to such a set.
//!
//! ```text
//!   ResolutionSet ── attaches_to ──► ActionSet ── indexes ──► ActionPool
//!                                                              │
//!                                       (acts_on, conditions) ◄┘
//! ```

pub mod actionset;
pub mod intervalset;
pub mod resolutionset;

pub use actionset::ActionSet;
pub use intervalset::IntervalSet;
pub use resolutionset::ResolutionSet;

use crate::graph::{LicenseGraph, NodeId};
use crate::license::ConditionSet;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

// ─── Actions ────────────────────────────────────────────────────────

/// Act on `acts_on` to resolve `conditions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolutionAction {
    pub acts_on: NodeId,
    pub conditions: ConditionSet,
}

impl ResolutionAction {
    pub fn new(acts_on: NodeId, conditions: ConditionSet) -> Self {
        Self { acts_on, conditions }
    }

    /// Order by target name, then by condition bits.
    pub fn compare(&self, other: &Self, graph: &LicenseGraph) -> Ordering {
        compare_nodes(graph, self.acts_on, other.acts_on).then(self.conditions.cmp(&other.conditions))
    }

    pub fn display<'a>(&'a self, graph: &'a LicenseGraph) -> impl fmt::Display + 'a {
        DisplayAction { action: self, graph }
    }
}

struct DisplayAction<'a> {
    action: &'a ResolutionAction,
    graph: &'a LicenseGraph,
}

impl fmt::Display for DisplayAction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{{{}}}",
            self.graph.node(self.action.acts_on).name,
            self.action.conditions.names().join(", ")
        )
    }
}

/// Compare two nodes of `graph` by name. Distinct nodes sharing a name
/// break the graph's identity invariant and panic.
pub(crate) fn compare_nodes(graph: &LicenseGraph, a: NodeId, b: NodeId) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let (an, bn) = (&graph.node(a).name, &graph.node(b).name);
    if an == bn {
        panic!("identically named targets at different locations: {} and {}", a, b);
    }
    an.cmp(bn)
}

// ─── Pool ───────────────────────────────────────────────────────────

/// Append-only store of every distinct (acts_on, conditions) pair realized
/// over one graph, with a per-node index of the entries acting on it.
#[derive(Debug, Default)]
pub struct ActionPool {
    actions: Vec<ResolutionAction>,
    by_acts_on: Vec<IntervalSet>,
}

impl ActionPool {
    /// Make room for the per-node indexes of `n` nodes.
    pub(crate) fn reserve_nodes(&mut self, n: usize) {
        if self.by_acts_on.len() < n {
            self.by_acts_on.resize_with(n, IntervalSet::new);
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn get(&self, index: usize) -> ResolutionAction {
        self.actions[index]
    }

    /// Number of pool entries acting on `node`.
    pub fn entries_for(&self, node: NodeId) -> usize {
        self.by_acts_on.get(node.0).map_or(0, IntervalSet::len)
    }

    /// Index of the entry equal to (acts_on, conditions), appending one when
    /// none exists yet.
    pub(crate) fn intern(&mut self, acts_on: NodeId, conditions: ConditionSet) -> usize {
        self.reserve_nodes(acts_on.0 + 1);
        let actions = &self.actions;
        let found = self.by_acts_on[acts_on.0].find_first(|i| {
            let a = &actions[i];
            if a.acts_on != acts_on {
                panic!("action for wrong target: got {}, want {}", a.acts_on, acts_on);
            }
            a.conditions == conditions
        });
        if let Some(index) = found {
            return index;
        }
        let index = self.actions.len();
        self.actions.push(ResolutionAction { acts_on, conditions });
        self.by_acts_on[acts_on.0].insert(index);
        index
    }

    /// Add (acts_on, conditions) to the set of pool indexes `indexes`,
    /// keeping at most one entry per target: an existing entry for
    /// `acts_on` is replaced by one carrying the union of both.
    pub(crate) fn add_to(&mut self, indexes: &mut IntervalSet, acts_on: NodeId, conditions: ConditionSet) {
        if conditions.is_empty() {
            return;
        }
        self.reserve_nodes(acts_on.0 + 1);
        let mut cs = conditions;
        let existing = self.by_acts_on[acts_on.0].find_first(|i| indexes.has(i));
        if let Some(index) = existing {
            let have = self.actions[index].conditions;
            if have.contains_all(cs) {
                return;
            }
            cs = cs.union(have);
            indexes.remove(index);
        }
        let index = self.intern(acts_on, cs);
        indexes.insert(index);
    }
}

// ─── Resolutions ────────────────────────────────────────────────────

/// Shipping `attaches_to` requires acting on `acts_on` to resolve
/// `conditions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub attaches_to: NodeId,
    pub acts_on: NodeId,
    pub conditions: ConditionSet,
}

impl Resolution {
    pub fn action(&self) -> ResolutionAction {
        ResolutionAction::new(self.acts_on, self.conditions)
    }

    /// Order by attaches_to name, then acts_on name, then condition bits.
    pub fn compare(&self, other: &Self, graph: &LicenseGraph) -> Ordering {
        compare_nodes(graph, self.attaches_to, other.attaches_to).then_with(|| self.action().compare(&other.action(), graph))
    }

    pub fn display<'a>(&'a self, graph: &'a LicenseGraph) -> impl fmt::Display + 'a {
        DisplayResolution { resolution: self, graph }
    }
}

struct DisplayResolution<'a> {
    resolution: &'a Resolution,
    graph: &'a LicenseGraph,
}

impl fmt::Display for DisplayResolution<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.resolution;
        write!(
            f,
            "{} -> {} -> {}",
            self.graph.node(r.attaches_to).name,
            self.graph.node(r.acts_on).name,
            r.conditions
        )
    }
}

/// Filters over a flat list of resolutions.
pub trait ResolutionList {
    fn all_conditions(&self) -> ConditionSet;
    /// The resolutions resolving any of `conditions`, narrowed to them.
    fn matching(&self, conditions: ConditionSet) -> Vec<Resolution>;
    fn by_attaches_to(&self, node: NodeId) -> Vec<Resolution>;
    fn by_acts_on(&self, node: NodeId) -> Vec<Resolution>;
    fn sort_by_name(&mut self, graph: &LicenseGraph);
}

impl ResolutionList for Vec<Resolution> {
    fn all_conditions(&self) -> ConditionSet {
        self.iter().fold(ConditionSet::empty(), |acc, r| acc | r.conditions)
    }

    fn matching(&self, conditions: ConditionSet) -> Vec<Resolution> {
        self.iter()
            .filter_map(|r| {
                let cs = r.conditions & conditions;
                (!cs.is_empty()).then_some(Resolution { conditions: cs, ..*r })
            })
            .collect()
    }

    fn by_attaches_to(&self, node: NodeId) -> Vec<Resolution> {
        self.iter().filter(|r| r.attaches_to == node).copied().collect()
    }

    fn by_acts_on(&self, node: NodeId) -> Vec<Resolution> {
        self.iter().filter(|r| r.acts_on == node).copied().collect()
    }

    fn sort_by_name(&mut self, graph: &LicenseGraph) {
        self.sort_by(|a, b| a.compare(b, graph));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::LicenseCondition::*;

    #[test]
    fn test_intern_reuses_equal_entries() {
        let mut pool = ActionPool::default();
        pool.reserve_nodes(2);
        let a = pool.intern(NodeId(0), ConditionSet::of(&[Notice]));
        let b = pool.intern(NodeId(1), ConditionSet::of(&[Notice]));
        let c = pool.intern(NodeId(0), ConditionSet::of(&[Notice]));
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.entries_for(NodeId(0)), 1);
    }

    #[test]
    fn test_add_to_merges_same_target() {
        let mut pool = ActionPool::default();
        let mut set = IntervalSet::new();
        pool.add_to(&mut set, NodeId(0), ConditionSet::of(&[Notice]));
        pool.add_to(&mut set, NodeId(0), ConditionSet::of(&[Restricted]));
        assert_eq!(set.len(), 1);
        let only = set.iter().next().unwrap();
        assert_eq!(pool.get(only).conditions, ConditionSet::of(&[Notice, Restricted]));

        // subset of what is already present changes nothing
        pool.add_to(&mut set, NodeId(0), ConditionSet::of(&[Notice]));
        assert_eq!(set.iter().next(), Some(only));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_add_to_ignores_empty_conditions() {
        let mut pool = ActionPool::default();
        let mut set = IntervalSet::new();
        pool.add_to(&mut set, NodeId(3), ConditionSet::empty());
        assert!(set.is_empty());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_resolution_list_filters() {
        let list = vec![
            Resolution {
                attaches_to: NodeId(0),
                acts_on: NodeId(1),
                conditions: ConditionSet::of(&[Notice, Restricted]),
            },
            Resolution {
                attaches_to: NodeId(1),
                acts_on: NodeId(1),
                conditions: ConditionSet::of(&[Notice]),
            },
        ];
        assert_eq!(list.all_conditions(), ConditionSet::of(&[Notice, Restricted]));
        let restricted = list.matching(ConditionSet::of(&[Restricted]));
        assert_eq!(restricted.len(), 1);
        assert_eq!(restricted[0].conditions, ConditionSet::of(&[Restricted]));
        assert_eq!(list.by_attaches_to(NodeId(1)).len(), 1);
        assert_eq!(list.by_acts_on(NodeId(1)).len(), 2);
    }
}
