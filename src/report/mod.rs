//! Report generation — check-share verdicts, graph and resolution dumps
//!
//! Every report is plain data that derives `Serialize`; text renderings are
//! deterministic line-oriented output sorted by name, and graphs can also be
//! rendered as GraphViz dot.

pub mod notices;

pub use notices::{resolve_notices, resolve_source_privacy, resolve_source_sharing, NoticeGroup, NoticeIndex};

use crate::detection::{conflicting_shared_private_source, SourceSharePrivacyConflict};
use crate::engine::AnalysisConfig;
use crate::graph::{LicenseGraph, TargetEdge, TargetNode};
use crate::resolution::ResolutionSet;
use crate::{MetalicError, MetalicResult};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::path::Path;

/// Output format for dumps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DumpFormat {
    /// One space-separated tuple per line; multiple values colon-separated
    #[default]
    Text,
    /// GraphViz `strict digraph`
    Dot,
}

/// Remove the first matching prefix in `prefixes` from `name`.
pub(crate) fn strip_name<'a>(name: &'a str, prefixes: &[String]) -> &'a str {
    prefixes
        .iter()
        .find_map(|p| name.strip_prefix(p.as_str()))
        .unwrap_or(name)
}

/// Pretty-printed JSON for any report.
pub fn render_json<T: Serialize + ?Sized>(report: &T) -> MetalicResult<String> {
    serde_json::to_string_pretty(report).map_err(MetalicError::Serde)
}

/// Write rendered report text to `output`.
pub fn write_report(content: &str, output: &Path) -> MetalicResult<()> {
    std::fs::write(output, content)?;
    tracing::debug!("Wrote {} bytes to {}", content.len(), output.display());
    Ok(())
}

// ─── Check Share ────────────────────────────────────────────────────

/// Whether anything shipped must be both shared and kept private.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckShareReport {
    pub passed: bool,
    pub conflicts: Vec<SourceSharePrivacyConflict>,
}

impl fmt::Display for CheckShareReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.conflicts {
            writeln!(f, "{}", c)?;
        }
        f.write_str(if self.passed { "PASS" } else { "FAIL" })
    }
}

/// Check `graph` for share/privacy conflicts, reporting all of them.
pub fn check_share(graph: &LicenseGraph) -> CheckShareReport {
    check_share_with(graph, &AnalysisConfig::default())
}

/// Like [`check_share`]; when `config.full_walk` is off only the first
/// conflict is kept.
pub fn check_share_with(graph: &LicenseGraph, config: &AnalysisConfig) -> CheckShareReport {
    let mut conflicts = conflicting_shared_private_source(graph);
    if !config.full_walk {
        conflicts.truncate(1);
    }
    for c in &conflicts {
        tracing::warn!("{}", c);
    }
    CheckShareReport {
        passed: conflicts.is_empty(),
        conflicts,
    }
}

// ─── Graph Dump ─────────────────────────────────────────────────────

/// One edge of a dumped graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct EdgeRow {
    pub target: String,
    pub dependency: String,
    /// Sorted
    pub annotations: Vec<String>,
}

/// Dump options beyond the format.
#[derive(Debug, Clone, Default)]
pub struct DumpOptions {
    pub format: DumpFormat,
    /// Append each node's originating conditions to its name
    pub label_conditions: bool,
    pub strip_prefix: Vec<String>,
}

impl DumpOptions {
    pub fn new(format: DumpFormat, strip_prefix: &[String]) -> Self {
        Self {
            format,
            label_conditions: false,
            strip_prefix: strip_prefix.to_vec(),
        }
    }

    fn label(&self, node: &TargetNode, sep: &str) -> String {
        let mut out = strip_name(&node.name, &self.strip_prefix).to_string();
        if self.label_conditions {
            let mut names = node.license_conditions.names();
            names.sort_unstable();
            for n in names {
                out.push_str(sep);
                out.push_str(n);
            }
        }
        out
    }
}

/// Every edge of `graph` sorted by target, dependency, then annotations.
pub fn graph_edges(graph: &LicenseGraph, strip_prefix: &[String]) -> Vec<EdgeRow> {
    let mut rows: Vec<EdgeRow> = graph
        .edges()
        .iter()
        .map(|e| EdgeRow {
            target: strip_name(&graph.node(e.target).name, strip_prefix).to_string(),
            dependency: strip_name(&graph.node(e.dependency).name, strip_prefix).to_string(),
            annotations: e.annotations.names().map(str::to_string).collect(),
        })
        .collect();
    rows.sort();
    rows
}

pub fn dump_graph(graph: &LicenseGraph, format: DumpFormat, strip_prefix: &[String]) -> String {
    dump_graph_with(graph, &DumpOptions::new(format, strip_prefix))
}

pub fn dump_graph_with(graph: &LicenseGraph, options: &DumpOptions) -> String {
    let mut edges: Vec<_> = graph.edges().iter().collect();
    edges.sort_by(|a, b| {
        let key = |e: &TargetEdge| {
            (
                graph.node(e.target).name.clone(),
                graph.node(e.dependency).name.clone(),
                e.annotations.names().map(str::to_string).collect::<Vec<_>>(),
            )
        };
        key(*a).cmp(&key(*b))
    });

    let mut out = String::new();
    match options.format {
        DumpFormat::Text => {
            for e in edges {
                let annotations: Vec<&str> = e.annotations.names().collect();
                let _ = writeln!(
                    out,
                    "{} {} {}",
                    options.label(graph.node(e.target), ":"),
                    options.label(graph.node(e.dependency), ":"),
                    annotations.join(":")
                );
            }
        }
        DumpFormat::Dot => {
            let mut dot = DotWriter::new(&mut out, "RL");
            let mut targets: Vec<&TargetNode> = graph.targets().collect();
            targets.sort_by(|a, b| a.name.cmp(&b.name));
            for t in targets {
                dot.node(t, options);
            }
            for e in edges {
                let annotations: Vec<&str> = e.annotations.names().collect();
                dot.edge(e.dependency.0, e.target.0, &annotations.join("\\n"));
            }
            dot.finish(graph.roots().iter().map(|r| r.0));
        }
    }
    out
}

// ─── Resolution Dump ────────────────────────────────────────────────

/// One (attaches_to, acts_on) pair of a dumped resolution set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionRow {
    pub attaches_to: String,
    pub acts_on: String,
    pub conditions: Vec<&'static str>,
}

/// Every resolution of `rs`, sorted by attaches_to then acts_on name.
pub fn resolution_rows(rs: &ResolutionSet<'_>, strip_prefix: &[String]) -> Vec<ResolutionRow> {
    let graph = rs.graph();
    rs.all_resolutions()
        .into_iter()
        .map(|r| ResolutionRow {
            attaches_to: strip_name(&graph.node(r.attaches_to).name, strip_prefix).to_string(),
            acts_on: strip_name(&graph.node(r.acts_on).name, strip_prefix).to_string(),
            conditions: r.conditions.names(),
        })
        .collect()
}

pub fn dump_resolutions(rs: &ResolutionSet<'_>, strip_prefix: &[String]) -> String {
    let mut out = String::new();
    for row in resolution_rows(rs, strip_prefix) {
        let _ = writeln!(out, "{} {} {}", row.attaches_to, row.acts_on, row.conditions.join(":"));
    }
    out
}

/// `rs` as a GraphViz graph with an edge from each attaches_to node to each
/// node it acts on.
pub fn dump_resolutions_dot(rs: &ResolutionSet<'_>, options: &DumpOptions) -> String {
    let graph = rs.graph();
    let resolutions = rs.all_resolutions();
    let mut out = String::new();
    let mut dot = DotWriter::new(&mut out, "LR");
    for r in &resolutions {
        dot.node(graph.node(r.attaches_to), options);
        dot.node(graph.node(r.acts_on), options);
    }
    for r in &resolutions {
        dot.edge(r.attaches_to.0, r.acts_on.0, &r.conditions.names().join("\\n"));
    }
    dot.finish(graph.roots().iter().map(|r| r.0));
    out
}

// ─── Dot ────────────────────────────────────────────────────────────

/// Numbers nodes `n0, n1, ...` in the order they are first written.
struct DotWriter<'a> {
    out: &'a mut String,
    names: HashMap<usize, String>,
}

impl<'a> DotWriter<'a> {
    fn new(out: &'a mut String, rankdir: &str) -> Self {
        let _ = write!(out, "strict digraph {{\n\trankdir={};\n", rankdir);
        Self {
            out,
            names: HashMap::new(),
        }
    }

    fn node(&mut self, node: &TargetNode, options: &DumpOptions) {
        if self.names.contains_key(&node.id.0) {
            return;
        }
        let name = format!("n{}", self.names.len());
        let _ = writeln!(self.out, "\t{} [label=\"{}\"];", name, options.label(node, "\\n"));
        self.names.insert(node.id.0, name);
    }

    fn edge(&mut self, from: usize, to: usize, label: &str) {
        if let (Some(f), Some(t)) = (self.names.get(&from), self.names.get(&to)) {
            let _ = writeln!(self.out, "\t{} -> {} [label=\"{}\"];", f, t, label);
        }
    }

    fn finish(self, roots: impl Iterator<Item = usize>) {
        self.out.push_str("\t{rank=same;");
        for r in roots {
            if let Some(n) = self.names.get(&r) {
                self.out.push(' ');
                self.out.push_str(n);
            }
        }
        self.out.push_str("}\n}\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::resolve_bottom_up_conditions;
    use crate::graph::GraphBuilder;
    use crate::ingest::TargetRecord;

    fn make_graph() -> LicenseGraph {
        let mut b = GraphBuilder::new();
        b.add_record(
            TargetRecord::new("out/bin.meta_lic")
                .kinds(&["SPDX-license-identifier-Apache-2.0"])
                .conditions(&["notice"])
                .dep("out/lib.meta_lic", &["static"])
                .dep("out/gpl.meta_lic", &["dynamic", "static"]),
        );
        b.add_record(
            TargetRecord::new("out/lib.meta_lic")
                .kinds(&["SPDX-license-identifier-Apache-2.0"])
                .conditions(&["notice"]),
        );
        b.add_record(
            TargetRecord::new("out/gpl.meta_lic")
                .kinds(&["SPDX-license-identifier-GPL-2.0"])
                .conditions(&["restricted"]),
        );
        b.add_root("out/bin.meta_lic");
        b.build().unwrap()
    }

    fn strip() -> Vec<String> {
        vec!["out/".to_string()]
    }

    #[test]
    fn test_text_graph_dump() {
        let g = make_graph();
        assert_eq!(
            dump_graph(&g, DumpFormat::Text, &strip()),
            "bin.meta_lic gpl.meta_lic dynamic:static\nbin.meta_lic lib.meta_lic static\n"
        );
        let rows = graph_edges(&g, &strip());
        assert_eq!(rows[1].annotations, vec!["static"]);
    }

    #[test]
    fn test_labelled_text_dump() {
        let g = make_graph();
        let options = DumpOptions {
            label_conditions: true,
            ..DumpOptions::new(DumpFormat::Text, &strip())
        };
        let dump = dump_graph_with(&g, &options);
        assert!(dump.starts_with("bin.meta_lic:notice gpl.meta_lic:restricted dynamic:static\n"));
    }

    #[test]
    fn test_dot_graph_dump() {
        let g = make_graph();
        let dot = dump_graph(&g, DumpFormat::Dot, &strip());
        assert!(dot.starts_with("strict digraph {\n\trankdir=RL;\n"));
        assert!(dot.contains("\tn0 [label=\"bin.meta_lic\"];\n"));
        assert!(dot.contains("\tn2 [label=\"lib.meta_lic\"];\n"));
        assert!(dot.contains("\tn2 -> n0 [label=\"static\"];\n"));
        assert!(dot.ends_with("\t{rank=same; n0}\n}\n"));
    }

    #[test]
    fn test_resolution_dump() {
        let g = make_graph();
        let rs = resolve_bottom_up_conditions(&g);
        let dump = dump_resolutions(&rs, &strip());
        assert!(dump.contains("bin.meta_lic bin.meta_lic notice:restricted\n"));
        assert!(dump.contains("lib.meta_lic lib.meta_lic notice\n"));

        let dot = dump_resolutions_dot(&rs, &DumpOptions::new(DumpFormat::Dot, &strip()));
        assert!(dot.starts_with("strict digraph {\n\trankdir=LR;\n"));
    }

    #[test]
    fn test_check_share_pass_and_json() {
        let g = make_graph();
        let report = check_share(&g);
        assert!(report.passed);
        assert_eq!(report.to_string(), "PASS");
        let json = render_json(&report).unwrap();
        assert!(json.contains("\"passed\": true"));
    }

    #[test]
    fn test_strip_name() {
        let prefixes = vec!["a/".to_string(), "a/b/".to_string()];
        assert_eq!(strip_name("a/b/c", &prefixes), "b/c");
        assert_eq!(strip_name("x/c", &prefixes), "x/c");
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.txt");
        write_report("PASS", &path).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "PASS");
    }
}
