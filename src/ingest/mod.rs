//! Metadata ingestion — license metadata files in, a linked graph out
//!
//! Every build target ships a small text record describing its license
//! kinds, conditions, install paths and dependencies. The ingestion layer
//! reads those records through a [`MetadataSource`], starting at the
//! requested roots and following `deps` entries until the closure is
//! complete, then hands them to the graph builder.
//!
//! ```text
//!   roots ──► Reader ──► MetadataSource::read ──► TargetRecord::parse
//!               ▲                                     │
//!               └──────────── deps ◄──────────────────┘
//!                                                     │
//!                                                     ▼
//!                                              GraphBuilder
//! ```

pub mod metadata;
pub mod reader;

pub use metadata::{DependencyRecord, TargetRecord};
pub use reader::read_license_graph;

use crate::MetalicResult;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

// ─── Sources ────────────────────────────────────────────────────────

/// Where metadata text comes from. Reads happen concurrently, so
/// implementations must be shareable across threads.
pub trait MetadataSource: Send + Sync {
    /// The full text of the metadata file `name`. A missing file is an
    /// `io::ErrorKind::NotFound` error.
    fn read(&self, name: &str) -> MetalicResult<String>;
}

/// Reads metadata from a directory tree; names are relative to `root`.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl MetadataSource for FsSource {
    fn read(&self, name: &str) -> MetalicResult<String> {
        let path = self.root.join(name.trim_start_matches('/'));
        tracing::debug!("Reading license metadata {}", path.display());
        Ok(std::fs::read_to_string(path)?)
    }
}

/// In-memory metadata, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.files.insert(name.into(), text.into());
        self
    }

    pub fn with(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl<N: Into<String>, T: Into<String>> FromIterator<(N, T)> for MemorySource {
    fn from_iter<I: IntoIterator<Item = (N, T)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().map(|(n, t)| (n.into(), t.into())).collect(),
        }
    }
}

impl MetadataSource for MemorySource {
    fn read(&self, name: &str) -> MetalicResult<String> {
        self.files.get(name).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no license metadata {}", name)).into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MetalicError;

    #[test]
    fn test_memory_source_reads() {
        let src = MemorySource::new().with("a.meta_lic", "package_name: \"A\"\n");
        assert_eq!(src.read("a.meta_lic").unwrap(), "package_name: \"A\"\n");
        assert_eq!(src.len(), 1);
    }

    #[test]
    fn test_memory_source_missing_is_not_found() {
        let src = MemorySource::new();
        match src.read("nope.meta_lic") {
            Err(MetalicError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[test]
    fn test_fs_source_reads_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("lib")).unwrap();
        std::fs::write(dir.path().join("lib/x.meta_lic"), "is_container: false\n").unwrap();
        let src = FsSource::new(dir.path());
        assert_eq!(src.read("lib/x.meta_lic").unwrap(), "is_container: false\n");
        assert_eq!(src.read("/lib/x.meta_lic").unwrap(), "is_container: false\n");
        assert!(matches!(src.read("lib/y.meta_lic"), Err(MetalicError::Io(_))));
    }
}
