//! Condition resolver
//!
//! Three passes, each cached on the graph once computed:
//!
//! 1. **bottom-up** — every node collects the actions its dependencies
//!    pass up through policy, starting from its own license conditions;
//! 2. **top-down** — restricted conditions are pushed from the roots down
//!    into everything derived from them;
//! 3. **final** — bottom-up again, starting from the top-down result, so
//!    conditions introduced by the second pass flow back up to every other
//!    target that includes the same work.
//!
//! A node's resolution at a step is its starting conditions plus the
//! conditions of every propagated action that acts on the node itself.
//! Out-edges of a node are walked in parallel on the rayon pool; the graph
//! mutex guards the action pool and the step cache, a per-pass mutex guards
//! the memo. Walks never descend into a node already on the current path,
//! so a cyclic graph resolves instead of recursing forever.

use super::ResolutionStep;
use crate::graph::{LicenseGraph, NodeId};
use crate::license::ConditionSet;
use crate::policy::{dep_actions_applicable_to_target, target_conditions_applicable_to_dep};
use crate::resolution::{ActionSet, IntervalSet, ResolutionSet};
use rayon::prelude::*;
use std::sync::{Arc, Mutex, MutexGuard};

// ─── Step Results ───────────────────────────────────────────────────

/// The per-node results of one resolver pass.
#[derive(Debug, Clone)]
pub struct StepResolutions {
    step: ResolutionStep,
    conditions: Vec<ConditionSet>,
    actions: Vec<IntervalSet>,
}

impl StepResolutions {
    pub fn step(&self) -> ResolutionStep {
        self.step
    }

    /// The resolution of `node` at this step.
    pub fn get(&self, node: NodeId) -> ConditionSet {
        self.conditions[node.0]
    }

    /// Resolutions indexed by node id.
    pub fn conditions(&self) -> &[ConditionSet] {
        &self.conditions
    }

    /// The actions `node` carries at this step: its own resolution and
    /// whatever its dependencies passed up.
    pub fn actions<'g>(&self, graph: &'g LicenseGraph, node: NodeId) -> ActionSet<'g> {
        ActionSet::from_indexes(graph, self.actions[node.0].clone())
    }

    pub fn node_count(&self) -> usize {
        self.conditions.len()
    }

    /// The step as a resolution set keyed by the node carrying the actions.
    pub fn to_resolution_set<'g>(&self, graph: &'g LicenseGraph) -> ResolutionSet<'g> {
        let mut rs = ResolutionSet::new(graph);
        for (i, indexes) in self.actions.iter().enumerate() {
            if !indexes.is_empty() {
                rs.add_actions(NodeId(i), &ActionSet::from_indexes(graph, indexes.clone()));
            }
        }
        rs
    }
}

// ─── Path Guard ─────────────────────────────────────────────────────

/// The nodes on the way from a root to the node being walked.
struct Ancestry<'a> {
    node: NodeId,
    parent: Option<&'a Ancestry<'a>>,
}

impl Ancestry<'_> {
    fn contains(&self, node: NodeId) -> bool {
        let mut link = Some(self);
        while let Some(l) = link {
            if l.node == node {
                return true;
            }
            link = l.parent;
        }
        false
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

// ─── Bottom-Up ──────────────────────────────────────────────────────

struct BottomUpMemo {
    resolved: Vec<Option<(ConditionSet, IntervalSet)>>,
    /// walked only in aggregate context so far
    aggregate_only: Vec<bool>,
}

struct BottomUp<'g, F> {
    graph: &'g LicenseGraph,
    base: F,
    memo: Mutex<BottomUpMemo>,
}

impl<'g, F> BottomUp<'g, F>
where
    F: Fn(NodeId) -> ConditionSet + Sync,
{
    fn new(graph: &'g LicenseGraph, base: F) -> Self {
        let n = graph.node_count();
        Self {
            graph,
            base,
            memo: Mutex::new(BottomUpMemo {
                resolved: vec![None; n],
                aggregate_only: vec![false; n],
            }),
        }
    }

    fn walk(&self, node: NodeId, aggregate: bool, parent: Option<&Ancestry<'_>>) -> ActionSet<'g> {
        let graph = self.graph;
        {
            let mut memo = lock(&self.memo);
            if let Some((_, acts)) = &memo.resolved[node.0] {
                // an aggregate-only walk is weaker; redo it in full context
                if aggregate || !memo.aggregate_only[node.0] {
                    return ActionSet::from_indexes(graph, acts.clone());
                }
            }
            memo.aggregate_only[node.0] = aggregate;
        }

        let here = Ancestry { node, parent };
        let mut acts = graph
            .out_edge_indices(node)
            .par_iter()
            .map(|&i| {
                let edge = graph.edge(i);
                if here.contains(edge.dependency) {
                    tracing::warn!(
                        "Dependency cycle: not descending from {} into {}",
                        graph.node(edge.target).name,
                        graph.node(edge.dependency).name
                    );
                    return ActionSet::new(graph);
                }
                let dep_aggregate = aggregate && graph.node(edge.dependency).is_container;
                let dep_acts = self.walk(edge.dependency, dep_aggregate, Some(&here));
                dep_actions_applicable_to_target(edge, &dep_acts, aggregate)
            })
            .reduce(
                || ActionSet::new(graph),
                |mut a, b| {
                    a.add_set(&b);
                    a
                },
            );

        let resolution = (self.base)(node) | acts.conditions_on(node);
        acts.add(node, resolution);

        let mut memo = lock(&self.memo);
        memo.resolved[node.0] = Some((resolution, acts.indexes().clone()));
        acts
    }

    fn run(self, step: ResolutionStep) -> StepResolutions {
        let graph = self.graph;
        graph.roots().par_iter().for_each(|&root| {
            self.walk(root, graph.node(root).is_container, None);
        });

        let memo = self.memo.into_inner().unwrap_or_else(|p| p.into_inner());
        let (conditions, actions) = memo
            .resolved
            .into_iter()
            .map(|r| r.unwrap_or_default())
            .unzip();
        StepResolutions {
            step,
            conditions,
            actions,
        }
    }
}

// ─── Top-Down ───────────────────────────────────────────────────────

struct TopDownState {
    conditions: Vec<ConditionSet>,
    walked: Vec<bool>,
    aggregate_only: Vec<bool>,
}

struct TopDown<'g> {
    graph: &'g LicenseGraph,
    state: Mutex<TopDownState>,
}

impl<'g> TopDown<'g> {
    fn new(graph: &'g LicenseGraph, bottom_up: &StepResolutions) -> Self {
        let n = graph.node_count();
        Self {
            graph,
            state: Mutex::new(TopDownState {
                conditions: bottom_up.conditions.clone(),
                walked: vec![false; n],
                aggregate_only: vec![false; n],
            }),
        }
    }

    fn walk(&self, node: NodeId, incoming: ConditionSet, aggregate: bool, parent: Option<&Ancestry<'_>>) {
        let graph = self.graph;
        let current = {
            let mut st = lock(&self.state);
            st.conditions[node.0] |= incoming;
            if !st.walked[node.0] {
                st.walked[node.0] = true;
                st.aggregate_only[node.0] = aggregate;
            } else if !aggregate {
                st.aggregate_only[node.0] = false;
            }
            st.conditions[node.0]
        };

        let here = Ancestry { node, parent };
        graph.out_edge_indices(node).par_iter().for_each(|&i| {
            let edge = graph.edge(i);
            let dep = edge.dependency;
            if here.contains(dep) {
                tracing::warn!(
                    "Dependency cycle: not descending from {} into {}",
                    graph.node(node).name,
                    graph.node(dep).name
                );
                return;
            }
            let dcs = target_conditions_applicable_to_dep(graph, edge, current, aggregate);
            let dep_aggregate = aggregate && graph.node(dep).is_container;
            let descend = {
                let st = lock(&self.state);
                !st.walked[dep.0]
                    || !(dcs - st.conditions[dep.0]).is_empty()
                    || (st.aggregate_only[dep.0] && !dep_aggregate)
            };
            if descend {
                self.walk(dep, dcs, dep_aggregate, Some(&here));
            }
        });
    }

    fn run(self) -> StepResolutions {
        let graph = self.graph;
        for &root in graph.roots() {
            let seed = lock(&self.state).conditions[root.0];
            self.walk(root, seed, graph.node(root).is_container, None);
        }

        let st = self.state.into_inner().unwrap_or_else(|p| p.into_inner());
        let mut pool_sets = Vec::with_capacity(st.conditions.len());
        for (i, cs) in st.conditions.iter().enumerate() {
            let mut acts = ActionSet::new(graph);
            acts.add(NodeId(i), *cs);
            pool_sets.push(acts.indexes().clone());
        }
        StepResolutions {
            step: ResolutionStep::TopDown,
            conditions: st.conditions,
            actions: pool_sets,
        }
    }
}

// ─── Drivers ────────────────────────────────────────────────────────

/// The results of `step` over `graph`, computing and caching them (and any
/// step they depend on) when absent.
pub fn step_resolutions(graph: &LicenseGraph, step: ResolutionStep) -> Arc<StepResolutions> {
    let cached = graph.state().steps.get(&step).cloned();
    if let Some(hit) = cached {
        tracing::debug!("Resolution step {} served from cache", step);
        return hit;
    }

    let computed = match step {
        ResolutionStep::BottomUp => {
            BottomUp::new(graph, |n: NodeId| graph.node(n).license_conditions).run(step)
        }
        ResolutionStep::TopDown => {
            let bottom_up = step_resolutions(graph, ResolutionStep::BottomUp);
            TopDown::new(graph, &bottom_up).run()
        }
        ResolutionStep::Final => {
            let top_down = step_resolutions(graph, ResolutionStep::TopDown);
            BottomUp::new(graph, |n: NodeId| top_down.get(n)).run(step)
        }
    };
    tracing::info!("Resolved {} step over {} nodes", step, computed.node_count());

    let mut state = graph.state();
    state.steps.entry(step).or_insert_with(|| Arc::new(computed)).clone()
}

/// Re-run the bottom-up pass starting from `seed`, without caching.
pub fn resolve_bottom_up_from(graph: &LicenseGraph, seed: &StepResolutions) -> StepResolutions {
    BottomUp::new(graph, |n: NodeId| seed.get(n)).run(seed.step())
}

/// Conditions flowing up from dependencies, keyed by the node carrying the
/// actions.
pub fn resolve_bottom_up_conditions(graph: &LicenseGraph) -> ResolutionSet<'_> {
    step_resolutions(graph, ResolutionStep::BottomUp).to_resolution_set(graph)
}

/// The complete resolution: bottom-up, top-down, then bottom-up again.
pub fn resolve_top_down_conditions(graph: &LicenseGraph) -> ResolutionSet<'_> {
    step_resolutions(graph, ResolutionStep::Final).to_resolution_set(graph)
}
