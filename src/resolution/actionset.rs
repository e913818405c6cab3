//! Action sets — canonical sets of interned resolution actions
//!
//! An action set holds at most one pool entry per `acts_on` node, and that
//! entry's conditions are the union of everything ever added for the node.
//! Sets borrow their graph; combining sets from different graphs panics.

use super::{compare_nodes, IntervalSet, ResolutionAction};
use crate::graph::{LicenseGraph, NodeId, TargetNodeSet};
use crate::license::{ConditionSet, LicenseCondition};
use std::fmt;
use std::ptr;

#[derive(Clone)]
pub struct ActionSet<'g> {
    graph: &'g LicenseGraph,
    indexes: IntervalSet,
}

impl<'g> ActionSet<'g> {
    pub fn new(graph: &'g LicenseGraph) -> Self {
        Self {
            graph,
            indexes: IntervalSet::new(),
        }
    }

    pub(crate) fn from_indexes(graph: &'g LicenseGraph, indexes: IntervalSet) -> Self {
        Self { graph, indexes }
    }

    pub fn graph(&self) -> &'g LicenseGraph {
        self.graph
    }

    pub(crate) fn indexes(&self) -> &IntervalSet {
        &self.indexes
    }

    fn check_same_graph(&self, other: &ActionSet<'_>) {
        if !ptr::eq(self.graph, other.graph) {
            panic!("action sets from different license graphs cannot be combined");
        }
    }

    /// The actions of the set, resolved against the pool in index order.
    fn snapshot(&self) -> Vec<ResolutionAction> {
        let state = self.graph.state();
        self.indexes.iter().map(|i| state.pool.get(i)).collect()
    }

    // ─── Mutation ───────────────────────────────────────────────────

    /// Make acting on `acts_on` to resolve `conditions` a member of the set.
    /// Adding an empty condition set is a no-op.
    pub fn add(&mut self, acts_on: NodeId, conditions: ConditionSet) {
        let mut state = self.graph.state();
        state.pool.add_to(&mut self.indexes, acts_on, conditions);
    }

    pub fn add_condition(&mut self, acts_on: NodeId, condition: LicenseCondition) {
        self.add(acts_on, condition.into());
    }

    /// Add every action of `other`.
    pub fn add_set(&mut self, other: &ActionSet<'_>) {
        self.check_same_graph(other);
        let mut state = self.graph.state();
        let pool = &mut state.pool;
        for i in other.indexes.iter() {
            let a = pool.get(i);
            pool.add_to(&mut self.indexes, a.acts_on, a.conditions);
        }
    }

    /// Add every action produced by `actions`.
    pub fn add_all<I: IntoIterator<Item = ResolutionAction>>(&mut self, actions: I) {
        for a in actions {
            self.add(a.acts_on, a.conditions);
        }
    }

    // ─── Queries ────────────────────────────────────────────────────

    pub fn visit_all<F: FnMut(ResolutionAction)>(&self, mut visit: F) {
        for a in self.snapshot() {
            visit(a);
        }
    }

    /// The first action in pool order matching `matches`.
    pub fn find_first<F: FnMut(&ResolutionAction) -> bool>(&self, mut matches: F) -> Option<ResolutionAction> {
        self.snapshot().into_iter().find(|a| matches(a))
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Same graph and same actions. Interning makes index equality the same
    /// as content equality.
    pub fn is_equal(&self, other: &ActionSet<'_>) -> bool {
        ptr::eq(self.graph, other.graph) && self.indexes.is_equal(&other.indexes)
    }

    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// The subset whose `acts_on` is in `nodes`.
    pub fn by_acts_on(&self, nodes: &TargetNodeSet) -> Self {
        let state = self.graph.state();
        let mut indexes = IntervalSet::new();
        for i in self.indexes.iter() {
            if nodes.contains(state.pool.get(i).acts_on) {
                indexes.insert(i);
            }
        }
        Self {
            graph: self.graph,
            indexes,
        }
    }

    pub fn has_any(&self, conditions: &[LicenseCondition]) -> bool {
        self.snapshot().iter().any(|a| a.conditions.has_any(conditions))
    }

    pub fn matches_any_set(&self, sets: &[ConditionSet]) -> bool {
        self.snapshot().iter().any(|a| a.conditions.matches_any_set(sets))
    }

    /// Actions resolving any of `conditions`, narrowed to those conditions.
    pub fn matching_any(&self, conditions: &[LicenseCondition]) -> impl Iterator<Item = ResolutionAction> {
        let wanted = ConditionSet::of(conditions);
        self.snapshot().into_iter().filter_map(move |a| {
            let cs = a.conditions & wanted;
            (!cs.is_empty()).then_some(ResolutionAction::new(a.acts_on, cs))
        })
    }

    /// Actions resolving any condition of any of `sets`, narrowed to them.
    pub fn matching_any_set(&self, sets: &[ConditionSet]) -> impl Iterator<Item = ResolutionAction> {
        let wanted = sets.iter().fold(ConditionSet::empty(), |acc, s| acc | *s);
        self.snapshot().into_iter().filter_map(move |a| {
            let cs = a.conditions & wanted;
            (!cs.is_empty()).then_some(ResolutionAction::new(a.acts_on, cs))
        })
    }

    /// Union of the conditions of every action.
    pub fn conditions(&self) -> ConditionSet {
        self.snapshot().iter().fold(ConditionSet::empty(), |acc, a| acc | a.conditions)
    }

    /// Conditions of the action on `node`, empty when there is none.
    pub fn conditions_on(&self, node: NodeId) -> ConditionSet {
        self.find_first(|a| a.acts_on == node).map_or(ConditionSet::empty(), |a| a.conditions)
    }

    /// The nodes acted on.
    pub fn acts_on(&self) -> TargetNodeSet {
        self.snapshot().into_iter().map(|a| a.acts_on).collect()
    }

    /// The actions sorted by target name then conditions.
    pub fn sorted(&self) -> Vec<ResolutionAction> {
        let mut actions = self.snapshot();
        actions.sort_by(|a, b| a.compare(b, self.graph));
        actions
    }
}

impl PartialEq for ActionSet<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal(other)
    }
}

impl Eq for ActionSet<'_> {}

impl fmt::Display for ActionSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut actions = self.snapshot();
        actions.sort_by(|a, b| compare_nodes(self.graph, a.acts_on, b.acts_on));
        f.write_str("{")?;
        for (i, a) in actions.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", a.display(self.graph))?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for ActionSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionSet{}", self)
    }
}
