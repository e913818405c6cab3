//! Concurrent metadata reader
//!
//! Reads run on a dedicated rayon pool sized by `concurrent_readers`, so at
//! most that many files are open at once. A file is marked scheduled before
//! its read is spawned and is therefore read exactly once, however many
//! targets depend on it. The first failure wins; reads still queued after a
//! failure return immediately.

use super::{MetadataSource, TargetRecord};
use crate::engine::AnalysisConfig;
use crate::graph::{GraphBuilder, LicenseGraph};
use crate::{MetalicError, MetalicResult};
use std::collections::HashSet;
use std::io;
use std::sync::Mutex;

struct ReadContext<'a, S: ?Sized> {
    source: &'a S,
    scheduled: Mutex<HashSet<String>>,
    records: Mutex<Vec<TargetRecord>>,
    error: Mutex<Option<MetalicError>>,
}

impl<'a, S: MetadataSource + ?Sized> ReadContext<'a, S> {
    /// Mark `name` scheduled; false when it already was.
    fn schedule(&self, name: &str) -> bool {
        let mut scheduled = self.scheduled.lock().unwrap_or_else(|p| p.into_inner());
        scheduled.insert(name.to_string())
    }

    fn failed(&self) -> bool {
        self.error.lock().unwrap_or_else(|p| p.into_inner()).is_some()
    }

    fn fail(&self, err: MetalicError) {
        let mut slot = self.error.lock().unwrap_or_else(|p| p.into_inner());
        if slot.is_none() {
            tracing::error!("License metadata read failed: {}", err);
            *slot = Some(err);
        }
    }

    fn load(&self, name: &str, parent: Option<&str>) -> MetalicResult<TargetRecord> {
        let text = self.source.read(name).map_err(|err| match (err, parent) {
            (MetalicError::Io(e), Some(target)) if e.kind() == io::ErrorKind::NotFound => {
                MetalicError::UnknownDependency {
                    target: target.to_string(),
                    dependency: name.to_string(),
                }
            }
            (err, _) => err,
        })?;
        TargetRecord::parse(name, &text)
    }
}

fn read_one<'scope, S>(
    scope: &rayon::Scope<'scope>,
    ctx: &'scope ReadContext<'scope, S>,
    name: String,
    parent: Option<String>,
) where
    S: MetadataSource + ?Sized,
{
    if ctx.failed() {
        return;
    }
    let record = match ctx.load(&name, parent.as_deref()) {
        Ok(r) => r,
        Err(e) => {
            ctx.fail(e);
            return;
        }
    };

    for dep in &record.deps {
        if ctx.schedule(&dep.file) {
            let file = dep.file.clone();
            let target = name.clone();
            scope.spawn(move |s| read_one(s, ctx, file, Some(target)));
        }
    }

    ctx.records.lock().unwrap_or_else(|p| p.into_inner()).push(record);
}

/// Append the metadata suffix to `name` unless it already ends with it.
fn with_suffix(name: &str, suffix: &str) -> String {
    if suffix.is_empty() || name.ends_with(suffix) {
        name.to_string()
    } else {
        format!("{}{}", name, suffix)
    }
}

/// Read the metadata files reachable from `roots` and build the graph.
///
/// Root names missing the configured suffix (`.meta_lic` by default) get it
/// appended. An empty root list is [`MetalicError::EmptyInput`]; a
/// dependency that cannot be found is [`MetalicError::UnknownDependency`].
pub fn read_license_graph<S, R>(source: &S, roots: &[R], config: &AnalysisConfig) -> MetalicResult<LicenseGraph>
where
    S: MetadataSource + ?Sized,
    R: AsRef<str>,
{
    if roots.is_empty() {
        return Err(MetalicError::EmptyInput);
    }
    let roots: Vec<String> = roots
        .iter()
        .map(|r| with_suffix(r.as_ref(), &config.metadata_suffix))
        .collect();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.concurrent_readers.max(1))
        .thread_name(|i| format!("metalic-reader-{}", i))
        .build()
        .map_err(|e| MetalicError::Config(format!("reader pool: {}", e)))?;

    let ctx = ReadContext {
        source,
        scheduled: Mutex::new(HashSet::new()),
        records: Mutex::new(Vec::new()),
        error: Mutex::new(None),
    };

    tracing::info!(
        "Reading license metadata from {} roots with {} readers",
        roots.len(),
        config.concurrent_readers.max(1)
    );

    {
        let ctx = &ctx;
        pool.scope(|s| {
            for root in &roots {
                if ctx.schedule(root) {
                    let name = root.clone();
                    s.spawn(move |s| read_one(s, ctx, name, None));
                }
            }
        });
    }

    if let Some(err) = ctx.error.into_inner().unwrap_or_else(|p| p.into_inner()) {
        return Err(err);
    }

    let records = ctx.records.into_inner().unwrap_or_else(|p| p.into_inner());
    tracing::debug!("Read {} license metadata files", records.len());

    let mut builder = GraphBuilder::new();
    for record in records {
        builder.add_record(record);
    }
    for root in roots {
        builder.add_root(root);
    }
    builder.build()
}
