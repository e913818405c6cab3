//! Propagation policy — which conditions cross a dependency edge
//!
//! Two pure functions drive the resolver. Conditions flow *up* an edge,
//! from dependency to target, through [`dep_actions_applicable_to_target`]
//! and *down* an edge, from target to dependency, through
//! [`target_conditions_applicable_to_dep`]. Neither touches resolver state.
//!
//! Edges are classified by their annotations:
//!
//! | annotation   | derivation | dynamic link |
//! |--------------|------------|--------------|
//! | (none)       | yes        | no           |
//! | `static`     | yes        | no           |
//! | `dynamic`    | no         | yes          |
//! | `toolchain`  | no         | no           |
//!
//! Targets and dependencies from different packages are independent
//! modules, which matters for the classpath exception.

use crate::graph::{LicenseGraph, TargetEdge};
use crate::license::{
    ConditionSet, LicenseCondition, IMPLIES_BY_EXCEPTION_ONLY, IMPLIES_NOTICE, IMPLIES_PERMISSIVE,
    IMPLIES_RECIPROCAL, IMPLIES_RESTRICTED, IMPLIES_UNENCUMBERED,
};
use crate::resolution::ActionSet;

/// Conditions that only ever bind the target depending on a work, never
/// the works it depends on.
pub const TARGET_ONLY_CONDITIONS: ConditionSet = IMPLIES_UNENCUMBERED
    .union(IMPLIES_PERMISSIVE)
    .union(ConditionSet::of(&[LicenseCondition::Notice]))
    .union(IMPLIES_RECIPROCAL)
    .union(IMPLIES_BY_EXCEPTION_ONLY);

const RESTRICTED: ConditionSet = ConditionSet::of(&[LicenseCondition::Restricted]);
const CLASSPATH: ConditionSet = ConditionSet::of(&[LicenseCondition::RestrictedWithClasspathException]);
const DYNAMIC_LINKING: ConditionSet = ConditionSet::of(&[LicenseCondition::RestrictedAllowsDynamicLinking]);

// ─── Edge Predicates ────────────────────────────────────────────────

/// The target is a derivative work of the dependency.
pub fn edge_is_derivation(edge: &TargetEdge) -> bool {
    !edge.annotations.has("dynamic") && !edge.annotations.has("toolchain")
}

pub fn edge_is_dynamic_link(edge: &TargetEdge) -> bool {
    edge.annotations.has("dynamic")
}

pub fn edge_nodes_are_independent_modules(graph: &LicenseGraph, edge: &TargetEdge) -> bool {
    graph.node(edge.target).package_name != graph.node(edge.dependency).package_name
}

/// The restricted conditions a dynamic link carries between its ends.
fn dynamic_link_conditions(graph: &LicenseGraph, edge: &TargetEdge) -> ConditionSet {
    if edge_nodes_are_independent_modules(graph, edge) {
        RESTRICTED
    } else {
        RESTRICTED | CLASSPATH
    }
}

// ─── Propagation ────────────────────────────────────────────────────

/// The actions of `dep_actions` (resolved at `edge.dependency`) that also
/// bind `edge.target`.
///
/// A derivation carries every action up and additionally makes the target
/// act on itself for any restricted condition. A dynamic link carries only
/// `restricted`, plus the classpath exception inside one package, and
/// applies it to both ends. Anything else carries nothing.
///
/// Container context does not change what flows up, so
/// `_treat_as_aggregate` is accepted for symmetry with
/// [`target_conditions_applicable_to_dep`] and ignored.
pub fn dep_actions_applicable_to_target<'g>(
    edge: &TargetEdge,
    dep_actions: &ActionSet<'g>,
    _treat_as_aggregate: bool,
) -> ActionSet<'g> {
    let graph = dep_actions.graph();
    let mut result = ActionSet::new(graph);

    if edge_is_derivation(edge) {
        result.add_set(dep_actions);
        for a in dep_actions.matching_any_set(&[IMPLIES_RESTRICTED]) {
            result.add(edge.target, a.conditions);
        }
        return result;
    }

    if edge_is_dynamic_link(edge) {
        let carried = dynamic_link_conditions(graph, edge);
        for a in dep_actions.matching_any_set(&[carried]) {
            result.add(a.acts_on, a.conditions);
            result.add(edge.target, a.conditions);
        }
    }
    result
}

/// The part of `target_conditions` (resolved at `edge.target`) that binds
/// `edge.dependency`.
///
/// Notice-like, reciprocal and proprietary conditions never flow down.
/// Restricted conditions flow down derivations and, less the dynamic
/// linking exception, dynamic links. A container only pushes restricted
/// conditions down when its own license originates one.
pub fn target_conditions_applicable_to_dep(
    graph: &LicenseGraph,
    edge: &TargetEdge,
    target_conditions: ConditionSet,
    treat_as_aggregate: bool,
) -> ConditionSet {
    let result = target_conditions - TARGET_ONLY_CONDITIONS;

    let derivation = edge_is_derivation(edge);
    if !derivation && !edge_is_dynamic_link(edge) {
        return result - IMPLIES_RESTRICTED;
    }

    if treat_as_aggregate {
        let own = graph.node(edge.target).license_conditions;
        if (own & IMPLIES_RESTRICTED).is_empty() {
            return result - IMPLIES_RESTRICTED;
        }
    }

    if derivation {
        return result;
    }

    let mut result = result - DYNAMIC_LINKING;
    if edge_nodes_are_independent_modules(graph, edge) {
        result = result - CLASSPATH;
    }
    result
}

/// Of `universe`, the conditions still relevant below `edge` when walking
/// down from its target.
pub fn edge_context_conditions(graph: &LicenseGraph, edge: &TargetEdge, universe: ConditionSet) -> ConditionSet {
    if edge_is_derivation(edge) {
        universe
    } else if edge_is_dynamic_link(edge) {
        universe & dynamic_link_conditions(graph, edge)
    } else {
        ConditionSet::empty()
    }
}

/// Whether `conditions` calls for a notice.
pub fn needs_notice(conditions: ConditionSet) -> bool {
    !(conditions & IMPLIES_NOTICE).is_empty()
}
