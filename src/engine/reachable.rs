//! Shipped nodes — everything a root incorporates through derivation edges

use super::walk::{walk_top_down, NoEdgeContext};
use crate::graph::{LicenseGraph, TargetNodeSet};
use crate::policy::edge_is_derivation;

/// The nodes reachable from any root along derivation edges only. Computed
/// once per graph.
pub fn shipped_nodes(graph: &LicenseGraph) -> &TargetNodeSet {
    graph.shipped_cache().get_or_init(|| {
        let mut shipped = TargetNodeSet::new();
        walk_top_down(&NoEdgeContext, graph, |g, node, path| {
            if shipped.contains(node) {
                return false;
            }
            if let Some(edge) = path.last_edge(g) {
                if !edge_is_derivation(edge) {
                    return false;
                }
            }
            shipped.insert(node);
            true
        });
        tracing::debug!("{} of {} nodes ship", shipped.len(), graph.node_count());
        shipped
    })
}

/// The shipping set under its query-API name. Returns the same cached
/// [`TargetNodeSet`] as [`shipped_nodes`]; nothing reachable only through
/// dynamic or toolchain edges is included.
pub fn reachable_nodes(graph: &LicenseGraph) -> &TargetNodeSet {
    shipped_nodes(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::ingest::TargetRecord;

    #[test]
    fn test_only_derivation_edges_ship() {
        let mut b = GraphBuilder::new();
        b.add_record(
            TargetRecord::new("bin.meta_lic")
                .dep("static.meta_lic", &["static"])
                .dep("plain.meta_lic", &[])
                .dep("so.meta_lic", &["dynamic"])
                .dep("cc.meta_lic", &["toolchain"]),
        );
        b.add_record(TargetRecord::new("static.meta_lic").dep("deep.meta_lic", &["static"]));
        b.add_record(TargetRecord::new("deep.meta_lic"));
        b.add_record(TargetRecord::new("plain.meta_lic"));
        b.add_record(TargetRecord::new("so.meta_lic").dep("behind_so.meta_lic", &["static"]));
        b.add_record(TargetRecord::new("behind_so.meta_lic"));
        b.add_record(TargetRecord::new("cc.meta_lic"));
        b.add_root("bin.meta_lic");
        let g = b.build().unwrap();

        let shipped = shipped_nodes(&g);
        assert_eq!(
            shipped.names(&g),
            vec!["bin.meta_lic", "deep.meta_lic", "plain.meta_lic", "static.meta_lic"]
        );
        assert!(std::ptr::eq(shipped, reachable_nodes(&g)));
    }
}
