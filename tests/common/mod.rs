//! Fixture metadata shared by the integration suites

#![allow(dead_code)]

use metalic::{read_license_graph, AnalysisConfig, LicenseGraph, MemorySource, NodeId};

pub const AOSP: &str = r#"package_name: "Android"
license_kinds: "SPDX-license-identifier-Apache-2.0"
license_conditions: "notice"
"#;

pub const GPL: &str = r#"package_name: "Free Software"
license_kinds: "SPDX-license-identifier-GPL-2.0"
license_conditions: "restricted"
"#;

pub const CLASSPATH: &str = r#"package_name: "Free Software"
license_kinds: "SPDX-license-identifier-GPL-2.0-with-classpath-exception"
license_conditions: "restricted"
"#;

/// Same package as `CLASSPATH`
pub const DEPENDENT_MODULE: &str = r#"package_name: "Free Software"
license_kinds: "SPDX-license-identifier-MIT"
license_conditions: "notice"
"#;

pub const LGPL: &str = r#"package_name: "Free Library"
license_kinds: "SPDX-license-identifier-LGPL-2.0"
license_conditions: "restricted"
"#;

pub const MPL: &str = r#"package_name: "Reciprocal"
license_kinds: "SPDX-license-identifier-MPL-2.0"
license_conditions: "reciprocal"
"#;

pub const MIT: &str = r#"package_name: "Android"
license_kinds: "SPDX-license-identifier-MIT"
license_conditions: "notice"
"#;

pub const PROPRIETARY: &str = r#"package_name: "Android"
license_kinds: "legacy_proprietary"
license_conditions: "proprietary"
"#;

pub const BY_EXCEPTION: &str = r#"package_name: "Special"
license_kinds: "legacy_by_exception_only"
license_conditions: "by_exception_only"
"#;

/// Base metadata text for each fixture file, without dependencies.
pub fn base(name: &str) -> String {
    let text = match name {
        "apacheBin.meta_lic" | "apacheLib.meta_lic" => AOSP,
        "apacheContainer.meta_lic" => return format!("{}is_container: true\n", AOSP),
        "dependentModule.meta_lic" => DEPENDENT_MODULE,
        "gplWithClasspathException.meta_lic" => CLASSPATH,
        "gplBin.meta_lic" | "gplLib.meta_lic" => GPL,
        "gplContainer.meta_lic" => return format!("{}is_container: true\n", GPL),
        "lgplBin.meta_lic" | "lgplLib.meta_lic" => LGPL,
        "mitBin.meta_lic" | "mitLib.meta_lic" => MIT,
        "mplBin.meta_lic" | "mplLib.meta_lic" => MPL,
        "proprietary.meta_lic" => PROPRIETARY,
        "by_exception.meta_lic" => BY_EXCEPTION,
        other => panic!("no fixture named {}", other),
    };
    text.to_string()
}

/// A source holding the fixtures named by `edges` with those edges appended
/// as `deps` blocks. Each edge is (target, dependency, annotations).
pub fn source(edges: &[(&str, &str, &[&str])]) -> MemorySource {
    let mut texts: std::collections::BTreeMap<String, String> = std::collections::BTreeMap::new();
    for (target, dep, annotations) in edges {
        texts.entry(dep.to_string()).or_insert_with(|| base(dep));
        let text = texts.entry(target.to_string()).or_insert_with(|| base(target));
        text.push_str("deps: {\n");
        text.push_str(&format!("  file: \"{}\"\n", dep));
        for a in annotations.iter() {
            text.push_str(&format!("  annotations: \"{}\"\n", a));
        }
        text.push_str("}\n");
    }
    texts.into_iter().collect()
}

/// Read the graph reachable from `roots` over `edges`.
pub fn graph(roots: &[&str], edges: &[(&str, &str, &[&str])]) -> LicenseGraph {
    let mut src = source(edges);
    for r in roots {
        if !edges.iter().any(|(t, d, _)| t == r || d == r) {
            src.insert(r.to_string(), base(r));
        }
    }
    read_license_graph(&src, roots, &AnalysisConfig::default()).expect("fixture graph reads")
}

pub fn id(g: &LicenseGraph, name: &str) -> NodeId {
    g.target_node(name).id
}
