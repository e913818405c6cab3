//! Properties that hold for every graph and every set

mod common;

use common::{graph, id};
use metalic::engine::resolver::{resolve_bottom_up_from, step_resolutions};
use metalic::license::{ALL_CONDITIONS, IMPLIES_PRIVATE, IMPLIES_SHARED, LICENSE_CONDITION_MASK};
use metalic::policy::dep_actions_applicable_to_target;
use metalic::report::{resolve_source_privacy, resolve_source_sharing};
use metalic::graph::EdgeAnnotations;
use metalic::{conflicting_shared_private_source, ActionSet, ConditionSet, IntervalSet, LicenseGraph, ResolutionStep};
use std::collections::BTreeSet;

/// Deterministic pseudo-random numbers for the set exercises.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: usize) -> usize {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 33) as usize) % bound
    }
}

fn all_subsets() -> impl Iterator<Item = ConditionSet> {
    (0..=LICENSE_CONDITION_MASK).map(|bits| {
        ALL_CONDITIONS
            .iter()
            .copied()
            .filter(|c| bits & c.bit() != 0)
            .collect::<ConditionSet>()
    })
}

fn bigger_graph() -> LicenseGraph {
    graph(
        &["gplContainer.meta_lic", "apacheContainer.meta_lic"],
        &[
            ("gplContainer.meta_lic", "apacheBin.meta_lic", &["static"]),
            ("gplContainer.meta_lic", "proprietary.meta_lic", &["static"]),
            ("apacheContainer.meta_lic", "apacheBin.meta_lic", &["static"]),
            ("apacheContainer.meta_lic", "mplBin.meta_lic", &["static"]),
            ("apacheBin.meta_lic", "lgplLib.meta_lic", &["dynamic"]),
            ("apacheBin.meta_lic", "mitLib.meta_lic", &["static"]),
            ("apacheBin.meta_lic", "gplLib.meta_lic", &["toolchain"]),
            ("mplBin.meta_lic", "mplLib.meta_lic", &["static"]),
            ("mplBin.meta_lic", "by_exception.meta_lic", &["static"]),
            ("mitLib.meta_lic", "apacheLib.meta_lic", &["static"]),
        ],
    )
}

// ─── Condition sets ─────────────────────────────────────────────────

#[test]
fn test_condition_set_idempotence() {
    for a in all_subsets() {
        assert_eq!(a | a, a);
        assert_eq!(a & a, a);
        assert!((a - a).is_empty());
    }
}

#[test]
fn test_canonical_names_per_bit() {
    for c in ALL_CONDITIONS {
        assert_eq!(ConditionSet::from(c).names(), vec![c.name()]);
    }
}

// ─── Interval sets ──────────────────────────────────────────────────

fn check_intervals(s: &IntervalSet) {
    let intervals: Vec<_> = s.intervals().collect();
    for w in intervals.windows(2) {
        assert!(w[0].1 + 1 < w[1].0, "intervals {:?} touch or overlap", w);
    }
    let total: usize = intervals.iter().map(|(a, b)| b - a + 1).sum();
    assert_eq!(total, s.len());
}

#[test]
fn test_interval_set_matches_reference() {
    let mut rng = Lcg(7);
    let mut s = IntervalSet::new();
    let mut reference = BTreeSet::new();
    for _ in 0..2000 {
        let x = rng.next(200);
        if rng.next(3) == 0 {
            assert_eq!(s.remove(x), reference.remove(&x));
        } else {
            assert_eq!(s.insert(x), reference.insert(x));
        }
        check_intervals(&s);
    }
    assert_eq!(s.iter().collect::<Vec<_>>(), reference.iter().copied().collect::<Vec<_>>());
    for x in 0..200 {
        assert_eq!(s.has(x), reference.contains(&x));
    }
}

#[test]
fn test_interval_set_insert_remove_round_trip() {
    let mut rng = Lcg(42);
    let mut s = IntervalSet::from_elements((0..100).filter(|x| x % 3 != 0));
    for _ in 0..500 {
        let x = rng.next(120);
        let before = s.clone();
        let present = s.has(x);
        s.insert(x);
        s.remove(x);
        if present {
            let mut expected = before.clone();
            expected.remove(x);
            assert!(s.is_equal(&expected));
            s = before;
        } else {
            assert!(s.is_equal(&before));
        }
    }
}

// ─── Actions ────────────────────────────────────────────────────────

#[test]
fn test_action_sets_are_canonical_and_interned() {
    let g = bigger_graph();
    let nodes: Vec<_> = g.targets().map(|n| n.id).collect();
    let mut rng = Lcg(3);
    let mut a = ActionSet::new(&g);
    let mut b = ActionSet::new(&g);
    for _ in 0..300 {
        let node = nodes[rng.next(nodes.len())];
        let c = ALL_CONDITIONS[rng.next(ALL_CONDITIONS.len())];
        a.add_condition(node, c);
        b.add_condition(node, c);
    }
    let acted: BTreeSet<_> = a.sorted().iter().map(|x| x.acts_on).collect();
    assert_eq!(acted.len(), a.len());
    // same content added in the same order yields the same pool entries
    assert_eq!(a, b);
}

// ─── Policy ─────────────────────────────────────────────────────────

#[test]
fn test_policy_monotonicity() {
    let g = graph(
        &["apacheBin.meta_lic"],
        &[
            ("apacheBin.meta_lic", "gplLib.meta_lic", &["static"]),
            ("apacheBin.meta_lic", "lgplLib.meta_lic", &["dynamic"]),
            ("apacheBin.meta_lic", "mitLib.meta_lic", &["toolchain"]),
        ],
    );
    let edges = g.edges();
    let carried = |edge_index: usize, cs: ConditionSet| {
        let mut deps = ActionSet::new(&g);
        deps.add(edges[edge_index].dependency, cs);
        dep_actions_applicable_to_target(&edges[edge_index], &deps, false).conditions()
    };
    let by_annotation = |a: &str| edges.iter().position(|e| e.annotations.has(a)).unwrap();
    let (stat, dynamic, tool) = (by_annotation("static"), by_annotation("dynamic"), by_annotation("toolchain"));

    let subsets: Vec<_> = all_subsets().collect();
    for &small in subsets.iter().step_by(7) {
        for c in ALL_CONDITIONS {
            let big = small | ConditionSet::from(c);
            for e in [stat, dynamic, tool] {
                let (s, b) = (carried(e, small), carried(e, big));
                assert_eq!(s & b, s, "adding {} to {} dropped conditions", c, small);
            }
        }
        // fewer linkage effects, fewer conditions carried
        let (s, d, t) = (carried(stat, small), carried(dynamic, small), carried(tool, small));
        assert_eq!(d & s, d);
        assert_eq!(t & d, t);
    }
}

#[test]
fn test_annotations_on_one_edge_only_narrow_propagation() {
    let g = graph(
        &["dependentModule.meta_lic"],
        &[("dependentModule.meta_lic", "gplWithClasspathException.meta_lic", &["static"])],
    );
    let edge = g.edges()[0].clone();
    let carried = |annotations: &[&str], cs: ConditionSet| {
        let mut e = edge.clone();
        e.annotations = annotations.iter().copied().collect::<EdgeAnnotations>();
        let mut deps = ActionSet::new(&g);
        deps.add(e.dependency, cs);
        dep_actions_applicable_to_target(&e, &deps, false).conditions()
    };

    // (with more annotations, with fewer)
    let pairs: [(&[&str], &[&str]); 5] = [
        (&["static", "toolchain"], &["static"]),
        (&["static", "dynamic"], &["static"]),
        (&["dynamic", "toolchain"], &["dynamic"]),
        (&["static"], &[]),
        (&["static", "custom"], &["static"]),
    ];
    for cs in all_subsets() {
        for (more, fewer) in pairs {
            let (m, f) = (carried(more, cs), carried(fewer, cs));
            assert_eq!(m & f, m, "{:?} carried {} but {:?} carried {}", more, m, fewer, f);
        }
    }

    let everything = ConditionSet::of(&ALL_CONDITIONS);
    assert!(carried(&["static", "toolchain"], everything).is_empty());
    assert_eq!(carried(&["static"], everything), carried(&[], everything));
}

// ─── Resolver ───────────────────────────────────────────────────────

#[test]
fn test_resolver_fixpoint() {
    let g = bigger_graph();
    let final_step = step_resolutions(&g, ResolutionStep::Final);
    let again = resolve_bottom_up_from(&g, &final_step);
    assert_eq!(again.conditions(), final_step.conditions());
}

#[test]
fn test_resolution_is_deterministic() {
    let a = bigger_graph();
    let b = bigger_graph();
    let ra = step_resolutions(&a, ResolutionStep::Final);
    let rb = step_resolutions(&b, ResolutionStep::Final);
    assert_eq!(ra.conditions(), rb.conditions());
    assert_eq!(
        resolve_source_sharing(&a).to_string(),
        resolve_source_sharing(&b).to_string()
    );
}

// ─── Conflicts ──────────────────────────────────────────────────────

#[test]
fn test_conflict_symmetry() {
    let g = bigger_graph();
    let conflicts = conflicting_shared_private_source(&g);
    assert!(!conflicts.is_empty());

    let share = resolve_source_sharing(&g);
    let private = resolve_source_privacy(&g);
    for c in &conflicts {
        let shares = share
            .resolutions_by_acts_on(c.source_node)
            .iter()
            .any(|r| r.conditions.has_any(&[c.share_condition]));
        let hides = private
            .resolutions_by_acts_on(c.source_node)
            .iter()
            .any(|r| r.conditions.has_any(&[c.privacy_condition]));
        assert!(shares && hides, "{}", c);
        assert!(IMPLIES_SHARED.has_any(&[c.share_condition]));
        assert!(IMPLIES_PRIVATE.has_any(&[c.privacy_condition]));
    }
    assert_eq!(conflicts[0].source_node, id(&g, "proprietary.meta_lic"));
}
