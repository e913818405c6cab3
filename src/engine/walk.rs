//! Top-down walks and condition attribution
//!
//! [`walk_top_down`] visits the graph in pre-order from every root and
//! keeps the path of edges taken, each paired with a context value computed
//! by an [`EdgeContext`]. The resolution walks use
//! [`ApplicableConditionsContext`], whose context is the universe of
//! conditions still relevant below an edge: once policy filters a condition
//! out on the way down it cannot come back.

use super::reachable::shipped_nodes;
use super::resolver::step_resolutions;
use super::ResolutionStep;
use crate::graph::{LicenseGraph, NodeId, TargetEdge};
use crate::license::ConditionSet;
use crate::policy::edge_context_conditions;
use crate::resolution::{ActionSet, ResolutionSet};
use std::collections::HashSet;

// ─── Edge Context ───────────────────────────────────────────────────

/// Computes the value carried across an edge during a top-down walk.
pub trait EdgeContext {
    type Context: Clone;

    fn context(&self, graph: &LicenseGraph, path: &WalkPath<Self::Context>, edge: &TargetEdge) -> Self::Context;
}

/// Carries nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEdgeContext;

impl EdgeContext for NoEdgeContext {
    type Context = ();

    fn context(&self, _graph: &LicenseGraph, _path: &WalkPath<()>, _edge: &TargetEdge) {}
}

/// Carries the conditions of `universe` still applicable below each edge.
#[derive(Debug, Clone, Copy)]
pub struct ApplicableConditionsContext {
    pub universe: ConditionSet,
}

impl EdgeContext for ApplicableConditionsContext {
    type Context = ConditionSet;

    fn context(&self, graph: &LicenseGraph, path: &WalkPath<ConditionSet>, edge: &TargetEdge) -> ConditionSet {
        let universe = path.last_context().copied().unwrap_or(self.universe);
        edge_context_conditions(graph, edge, universe)
    }
}

// ─── Path ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WalkFrame<C> {
    /// Position of the edge in the graph's edge list
    pub edge: usize,
    pub context: C,
}

/// Edges from a root down to the node being visited. Reused across the
/// whole walk.
#[derive(Debug, Clone)]
pub struct WalkPath<C> {
    frames: Vec<WalkFrame<C>>,
}

impl<C> WalkPath<C> {
    fn new() -> Self {
        Self {
            frames: Vec::with_capacity(16),
        }
    }

    fn push(&mut self, edge: usize, context: C) {
        self.frames.push(WalkFrame { edge, context });
    }

    fn pop(&mut self) {
        self.frames.pop();
    }

    fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[WalkFrame<C>] {
        &self.frames
    }

    pub fn last_context(&self) -> Option<&C> {
        self.frames.last().map(|f| &f.context)
    }

    /// The edge leading to the node being visited.
    pub fn last_edge<'g>(&self, graph: &'g LicenseGraph) -> Option<&'g TargetEdge> {
        self.frames.last().map(|f| graph.edge(f.edge))
    }

    /// Targets of the path's edges, nearest first.
    pub fn ancestors<'a>(&'a self, graph: &'a LicenseGraph) -> impl Iterator<Item = NodeId> + 'a {
        self.frames.iter().rev().map(move |f| graph.edge(f.edge).target)
    }

    fn contains(&self, graph: &LicenseGraph, node: NodeId) -> bool {
        self.frames
            .iter()
            .any(|f| graph.edge(f.edge).target == node || graph.edge(f.edge).dependency == node)
    }
}

// ─── Top-Down Walk ──────────────────────────────────────────────────

/// Pre-order walk from every root. `visit` sees each node with the path
/// that led to it and returns whether to descend into its dependencies.
/// A dependency already on the path is never descended into.
pub fn walk_top_down<E, V>(ctx: &E, graph: &LicenseGraph, mut visit: V)
where
    E: EdgeContext,
    V: FnMut(&LicenseGraph, NodeId, &WalkPath<E::Context>) -> bool,
{
    let mut path = WalkPath::new();
    for &root in graph.roots() {
        path.clear();
        walk_node(ctx, graph, root, &mut path, &mut visit);
    }
}

fn walk_node<E, V>(ctx: &E, graph: &LicenseGraph, node: NodeId, path: &mut WalkPath<E::Context>, visit: &mut V)
where
    E: EdgeContext,
    V: FnMut(&LicenseGraph, NodeId, &WalkPath<E::Context>) -> bool,
{
    if !visit(graph, node, path) {
        return;
    }
    for &i in graph.out_edge_indices(node) {
        let edge = graph.edge(i);
        if edge.dependency == node || path.contains(graph, edge.dependency) {
            tracing::warn!(
                "Dependency cycle: not descending from {} into {}",
                graph.node(node).name,
                graph.node(edge.dependency).name
            );
            continue;
        }
        let context = ctx.context(graph, path, edge);
        path.push(i, context);
        walk_node(ctx, graph, edge.dependency, path, visit);
        path.pop();
    }
}

// ─── Resolution Walks ───────────────────────────────────────────────

/// Attribute `actions` to the ancestors on `path`, nearest first, through
/// the first one that is not a container.
fn attribute_to_ancestors<'g>(
    graph: &'g LicenseGraph,
    result: &mut ResolutionSet<'g>,
    path: &WalkPath<ConditionSet>,
    actions: &ActionSet<'g>,
) {
    for ancestor in path.ancestors(graph) {
        result.add_actions(ancestor, actions);
        if !graph.node(ancestor).is_container {
            break;
        }
    }
}

/// For every shipped node, the conditions of its final resolution within
/// `universe`, attached to the node itself and to each ancestor up to the
/// first non-container.
pub fn walk_resolutions_for_condition(graph: &LicenseGraph, universe: ConditionSet) -> ResolutionSet<'_> {
    let shipped = shipped_nodes(graph);
    let resolved = step_resolutions(graph, ResolutionStep::Final);
    let mut result = ResolutionSet::new(graph);
    let mut walked: HashSet<(NodeId, ConditionSet)> = HashSet::new();

    let ctx = ApplicableConditionsContext { universe };
    walk_top_down(&ctx, graph, |_, node, path| {
        if !shipped.contains(node) {
            return false;
        }
        let universe = path.last_context().copied().unwrap_or(universe);
        if universe.is_empty() {
            return false;
        }

        let is_container = graph.node(node).is_container;
        if !walked.insert((node, universe)) {
            // already resolved in this universe; pass its share up again
            let passed_up = match result.actions_for(node) {
                Some(actions) if is_container => {
                    let mut narrowed = ActionSet::new(graph);
                    narrowed.add_all(actions.matching_any_set(&[universe]));
                    narrowed
                }
                _ => {
                    let mut own = ActionSet::new(graph);
                    own.add(node, resolved.get(node) & universe);
                    own
                }
            };
            if !passed_up.is_empty() {
                attribute_to_ancestors(graph, &mut result, path, &passed_up);
            }
            return false;
        }

        let cs = resolved.get(node) & universe;
        if !cs.is_empty() {
            let mut own = ActionSet::new(graph);
            own.add(node, cs);
            result.add_actions(node, &own);
            attribute_to_ancestors(graph, &mut result, path, &own);
        }
        true
    });
    result
}

/// The final resolution of every shipped node within `universe`, without
/// attribution.
pub fn walk_actions_for_condition(graph: &LicenseGraph, universe: ConditionSet) -> ActionSet<'_> {
    let shipped = shipped_nodes(graph);
    let resolved = step_resolutions(graph, ResolutionStep::Final);
    let mut result = ActionSet::new(graph);
    for node in shipped.iter() {
        result.add(node, resolved.get(node) & universe);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::ingest::TargetRecord;
    use crate::license::LicenseCondition::*;
    use crate::license::{IMPLIES_NOTICE, IMPLIES_RESTRICTED};

    fn notice(name: &str) -> TargetRecord {
        TargetRecord::new(name)
            .package("Android")
            .kinds(&["SPDX-license-identifier-Apache-2.0"])
            .conditions(&["notice"])
    }

    fn make_graph() -> LicenseGraph {
        let mut b = GraphBuilder::new();
        b.add_record(
            notice("img.meta_lic")
                .container(true)
                .dep("bin.meta_lic", &["static"])
                .dep("tool.meta_lic", &["toolchain"]),
        );
        b.add_record(notice("bin.meta_lic").dep("lib.meta_lic", &["static"]).dep("so.meta_lic", &["dynamic"]));
        b.add_record(notice("lib.meta_lic"));
        b.add_record(notice("so.meta_lic"));
        b.add_record(notice("tool.meta_lic"));
        b.add_root("img.meta_lic");
        b.build().unwrap()
    }

    #[test]
    fn test_walk_top_down_preorder_with_context() {
        let g = make_graph();
        let mut seen = Vec::new();
        walk_top_down(&ApplicableConditionsContext { universe: IMPLIES_NOTICE }, &g, |g, node, path| {
            let ctx = path.last_context().copied().unwrap_or(IMPLIES_NOTICE);
            seen.push((g.node(node).name.clone(), path.len(), ctx.is_empty()));
            true
        });
        let names: Vec<_> = seen.iter().map(|(n, d, e)| format!("{}@{}{}", n, d, if *e { "!" } else { "" })).collect();
        assert_eq!(
            names,
            vec![
                "img.meta_lic@0",
                "bin.meta_lic@1",
                "lib.meta_lic@2",
                "so.meta_lic@2",
                "tool.meta_lic@1!",
            ]
        );
    }

    #[test]
    fn test_visit_false_stops_descent() {
        let g = make_graph();
        let mut count = 0;
        walk_top_down(&NoEdgeContext, &g, |g, node, _| {
            count += 1;
            g.node(node).name != "bin.meta_lic"
        });
        assert_eq!(count, 3);
    }

    #[test]
    fn test_notice_attribution_stops_at_binary() {
        let g = make_graph();
        let rs = walk_resolutions_for_condition(&g, IMPLIES_NOTICE);
        let id = |n: &str| g.target_node(n).id;
        assert_eq!(
            rs.actions_for(id("img.meta_lic")).unwrap().to_string(),
            "{bin.meta_lic{notice}, img.meta_lic{notice}}"
        );
        assert_eq!(
            rs.actions_for(id("bin.meta_lic")).unwrap().to_string(),
            "{bin.meta_lic{notice}, lib.meta_lic{notice}}"
        );
        assert_eq!(rs.actions_for(id("lib.meta_lic")).unwrap().to_string(), "{lib.meta_lic{notice}}");
        // neither dynamic nor toolchain dependencies ship
        assert!(!rs.attaches_to_target(id("so.meta_lic")));
        assert!(!rs.attaches_to_target(id("tool.meta_lic")));
    }

    #[test]
    fn test_actions_for_condition() {
        let g = make_graph();
        let acts = walk_actions_for_condition(&g, IMPLIES_NOTICE);
        assert_eq!(acts.len(), 3);
        assert!(walk_actions_for_condition(&g, IMPLIES_RESTRICTED).is_empty());
        assert_eq!(acts.conditions(), ConditionSet::of(&[Notice]));
    }

    #[test]
    fn test_shared_library_revisit_reaches_second_parent() {
        let mut b = GraphBuilder::new();
        b.add_record(
            notice("img.meta_lic")
                .container(true)
                .dep("a.meta_lic", &["static"])
                .dep("b.meta_lic", &["static"]),
        );
        b.add_record(notice("a.meta_lic").dep("lib.meta_lic", &["static"]));
        b.add_record(notice("b.meta_lic").dep("lib.meta_lic", &["static"]));
        b.add_record(notice("lib.meta_lic"));
        b.add_root("img.meta_lic");
        let g = b.build().unwrap();
        let rs = walk_resolutions_for_condition(&g, IMPLIES_NOTICE);
        let lib = g.target_node("lib.meta_lic").id;
        for parent in ["a.meta_lic", "b.meta_lic"] {
            let acts = rs.actions_for(g.target_node(parent).id).unwrap();
            assert_eq!(acts.conditions_on(lib), ConditionSet::of(&[Notice]), "{}", parent);
        }
    }
}
