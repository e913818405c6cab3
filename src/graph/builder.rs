//! Graph assembly — from parsed metadata records to a frozen [`LicenseGraph`]
//!
//! Node ids are handed out in sorted name order and edges are sorted by
//! (target, dependency) name, so two reads of the same files produce
//! identical graphs regardless of the order the records arrived in.

use super::{EdgeAnnotations, InstallMap, LicenseGraph, NodeId, TargetEdge, TargetNode};
use crate::ingest::{DependencyRecord, TargetRecord};
use crate::license::conditions_from_names;
use crate::{MetalicError, MetalicResult};
use std::collections::{BTreeMap, HashSet};

/// Collects records and roots, then validates and freezes them.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    records: BTreeMap<String, TargetRecord>,
    /// Edges added apart from their target's record
    edges: Vec<(String, DependencyRecord)>,
    roots: Vec<String>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parsed record. A second record under the same name is an
    /// invariant violation and panics.
    pub fn add_record(&mut self, record: TargetRecord) -> &mut Self {
        if self.records.contains_key(&record.name) {
            panic!("identically named targets at different locations: {}", record.name);
        }
        self.records.insert(record.name.clone(), record);
        self
    }

    /// Add a node with no dependencies from its license kinds and condition
    /// names.
    pub fn add_node(&mut self, name: &str, license_kinds: &[&str], conditions: &[&str]) -> &mut Self {
        self.add_record(TargetRecord::new(name).kinds(license_kinds).conditions(conditions))
    }

    /// Add a dependency of `target` on `dependency`. Both must be added as
    /// nodes by the time the graph is built.
    pub fn add_edge(&mut self, target: &str, dependency: &str, annotations: &[&str]) -> &mut Self {
        self.edges.push((
            target.to_string(),
            DependencyRecord {
                file: dependency.to_string(),
                annotations: annotations.iter().map(|a| a.to_string()).collect(),
            },
        ));
        self
    }

    pub fn add_root(&mut self, name: impl Into<String>) -> &mut Self {
        self.roots.push(name.into());
        self
    }

    pub fn has_record(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Validate names and freeze the graph.
    pub fn build(mut self) -> MetalicResult<LicenseGraph> {
        if self.roots.is_empty() {
            return Err(MetalicError::EmptyInput);
        }

        for (target, dep) in std::mem::take(&mut self.edges) {
            match self.records.get_mut(&target) {
                Some(record) => record.deps.push(dep),
                None => {
                    return Err(MetalicError::MalformedInput {
                        file: target,
                        line: 0,
                        message: format!("edge to {} from unknown target", dep.file),
                    })
                }
            }
        }

        let ids: BTreeMap<&str, NodeId> = self
            .records
            .keys()
            .enumerate()
            .map(|(i, name)| (name.as_str(), NodeId(i)))
            .collect();

        let mut roots = Vec::with_capacity(self.roots.len());
        let mut seen = HashSet::new();
        for root in &self.roots {
            let id = *ids.get(root.as_str()).ok_or_else(|| MetalicError::MalformedInput {
                file: root.clone(),
                line: 0,
                message: "root license metadata not found".to_string(),
            })?;
            if seen.insert(id) {
                roots.push(id);
            }
        }

        let mut edges = Vec::new();
        for (name, record) in &self.records {
            let target = ids[name.as_str()];
            let mut deps: Vec<_> = record.deps.iter().collect();
            deps.sort_by(|a, b| a.file.cmp(&b.file));
            for dep in deps {
                let dependency = *ids.get(dep.file.as_str()).ok_or_else(|| MetalicError::UnknownDependency {
                    target: name.clone(),
                    dependency: dep.file.clone(),
                })?;
                edges.push(TargetEdge {
                    target,
                    dependency,
                    annotations: dep.annotations.iter().cloned().collect::<EdgeAnnotations>(),
                });
            }
        }

        let nodes: Vec<TargetNode> = self
            .records
            .into_values()
            .enumerate()
            .map(|(i, r)| into_node(NodeId(i), r))
            .collect();

        let graph = LicenseGraph::from_parts(nodes, edges, roots);
        tracing::info!(
            "License graph built: {} nodes, {} edges, {} roots",
            graph.node_count(),
            graph.edges().len(),
            graph.roots().len()
        );
        Ok(graph)
    }
}

fn into_node(id: NodeId, r: TargetRecord) -> TargetNode {
    let license_conditions = conditions_from_names(&r.license_kinds, &r.license_conditions);
    TargetNode {
        id,
        name: r.name,
        package_name: r.package_name,
        module_types: r.module_types,
        module_classes: r.module_classes,
        projects: r.projects,
        license_kinds: r.license_kinds,
        license_conditions,
        license_texts: r.license_texts,
        is_container: r.is_container,
        built: r.built,
        installed: r.installed,
        install_map: r
            .install_map
            .into_iter()
            .map(|(from_path, container_path)| InstallMap { from_path, container_path })
            .collect(),
        sources: r.sources,
    }
}
