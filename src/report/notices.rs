//! Notice, sharing and privacy resolutions, and the notice index
//!
//! The index answers "which license texts must a distribution carry, and for
//! which shipped targets": every node acted on by a notice resolution
//! contributes each of its license texts.

use crate::engine::walk_resolutions_for_condition;
use crate::graph::{LicenseGraph, NodeId};
use crate::license::{IMPLIES_NOTICE, IMPLIES_PRIVATE, IMPLIES_SHARED};
use crate::resolution::ResolutionSet;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// The notices each shipped node must carry.
pub fn resolve_notices(graph: &LicenseGraph) -> ResolutionSet<'_> {
    walk_resolutions_for_condition(graph, IMPLIES_NOTICE)
}

/// The source each shipped node obliges the distributor to share.
pub fn resolve_source_sharing(graph: &LicenseGraph) -> ResolutionSet<'_> {
    walk_resolutions_for_condition(graph, IMPLIES_SHARED)
}

/// The source each shipped node requires to stay private.
pub fn resolve_source_privacy(graph: &LicenseGraph) -> ResolutionSet<'_> {
    walk_resolutions_for_condition(graph, IMPLIES_PRIVATE)
}

// ─── Notice Index ───────────────────────────────────────────────────

/// One license text and the targets it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoticeGroup {
    pub license_text: String,
    /// Target names, sorted
    pub targets: Vec<String>,
}

/// Shipped targets needing notice, grouped by license text.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NoticeIndex {
    groups: Vec<NoticeGroup>,
    /// Targets with no license text at all
    missing_text: Vec<String>,
    installs: BTreeMap<String, Vec<String>>,
}

impl NoticeIndex {
    pub fn new(graph: &LicenseGraph) -> Self {
        Self::with_strip_prefix(graph, &[])
    }

    /// Build the index, removing the first matching prefix of `strip_prefix`
    /// from every target name.
    pub fn with_strip_prefix(graph: &LicenseGraph, strip_prefix: &[String]) -> Self {
        let notices = resolve_notices(graph);
        let mut by_text: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        let mut missing_text = BTreeSet::new();
        let mut installs = BTreeMap::new();

        let acted_on: Vec<NodeId> = notices.acts_on().iter().collect();
        for id in acted_on {
            let node = graph.node(id);
            let name = super::strip_name(&node.name, strip_prefix).to_string();
            if node.license_texts.is_empty() {
                missing_text.insert(name.clone());
            }
            for text in &node.license_texts {
                by_text.entry(text.as_str()).or_default().insert(name.clone());
            }
            let mut paths = node.installed.clone();
            paths.sort();
            installs.insert(name, paths);
        }

        if !missing_text.is_empty() {
            tracing::warn!("{} targets need notice but declare no license text", missing_text.len());
        }

        Self {
            groups: by_text
                .into_iter()
                .map(|(text, targets)| NoticeGroup {
                    license_text: text.to_string(),
                    targets: targets.into_iter().collect(),
                })
                .collect(),
            missing_text: missing_text.into_iter().collect(),
            installs,
        }
    }

    /// Groups sorted by license text.
    pub fn groups(&self) -> &[NoticeGroup] {
        &self.groups
    }

    pub fn license_texts(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.license_text.as_str())
    }

    /// The targets covered by `license_text`.
    pub fn targets_for(&self, license_text: &str) -> &[String] {
        self.groups
            .iter()
            .find(|g| g.license_text == license_text)
            .map(|g| g.targets.as_slice())
            .unwrap_or(&[])
    }

    /// Where `target` is installed, sorted.
    pub fn installs(&self, target: &str) -> &[String] {
        self.installs.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn missing_text(&self) -> &[String] {
        &self.missing_text
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.missing_text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::ingest::TargetRecord;

    fn make_graph() -> LicenseGraph {
        let mut b = GraphBuilder::new();
        b.add_record(
            TargetRecord::new("out/bin.meta_lic")
                .package("Android")
                .kinds(&["SPDX-license-identifier-Apache-2.0"])
                .conditions(&["notice"])
                .texts(&["build/soong/licenses/LICENSE"])
                .installed(&["out/system/bin/tool"])
                .dep("out/lib.meta_lic", &["static"])
                .dep("out/mit.meta_lic", &["static"])
                .dep("out/so.meta_lic", &["dynamic"]),
        );
        b.add_record(
            TargetRecord::new("out/lib.meta_lic")
                .kinds(&["SPDX-license-identifier-Apache-2.0"])
                .conditions(&["notice"])
                .texts(&["build/soong/licenses/LICENSE"]),
        );
        b.add_record(
            TargetRecord::new("out/mit.meta_lic")
                .kinds(&["SPDX-license-identifier-MIT"])
                .conditions(&["notice"]),
        );
        b.add_record(
            TargetRecord::new("out/so.meta_lic")
                .conditions(&["notice"])
                .texts(&["external/so/LICENSE"]),
        );
        b.add_root("out/bin.meta_lic");
        b.build().unwrap()
    }

    #[test]
    fn test_groups_by_text() {
        let g = make_graph();
        let idx = NoticeIndex::with_strip_prefix(&g, &["out/".to_string()]);
        assert_eq!(idx.license_texts().collect::<Vec<_>>(), vec!["build/soong/licenses/LICENSE"]);
        assert_eq!(idx.targets_for("build/soong/licenses/LICENSE"), ["bin.meta_lic", "lib.meta_lic"]);
        assert!(idx.targets_for("external/so/LICENSE").is_empty());
        assert_eq!(idx.missing_text(), ["mit.meta_lic"]);
        assert_eq!(idx.installs("bin.meta_lic"), ["out/system/bin/tool"]);
        assert!(idx.installs("lib.meta_lic").is_empty());
    }

    #[test]
    fn test_derived_resolutions() {
        let g = make_graph();
        assert_eq!(resolve_notices(&g).acts_on().len(), 3);
        assert!(resolve_source_sharing(&g).is_empty());
        assert!(resolve_source_privacy(&g).is_empty());
    }
}
