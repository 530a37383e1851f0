//! fanout.rs
//!
//! Bounded-concurrency writer for the static JSON tree. Writes are dispatched
//! as tokio tasks and awaited in fixed batches: once `limit` operations are
//! pending, the whole batch must finish before the next one starts.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::errors::PipelineError;
use crate::metrics::{BATCH_HISTOGRAM, FILES_WRITTEN, WRITE_FAILURES};
use crate::model::{Child, Entity};

/// Fixed-size batch limiter. Not a sliding window: operation `limit + 1`
/// waits for all of the first `limit` to settle.
pub struct BatchWriter {
    limit: usize,
    pending: Vec<JoinHandle<Result<(), PipelineError>>>,
    batches: usize,
}

impl BatchWriter {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        BatchWriter {
            limit,
            pending: Vec::with_capacity(limit),
            batches: 0,
        }
    }

    /// Dispatch one operation, first draining the current batch if it is full.
    pub async fn push<F>(&mut self, op: F) -> Result<(), PipelineError>
    where
        F: Future<Output = Result<(), PipelineError>> + Send + 'static,
    {
        if self.pending.len() >= self.limit {
            self.flush().await?;
        }
        self.pending.push(tokio::spawn(op));
        Ok(())
    }

    /// Await the final partial batch. Returns how many batch waits occurred.
    pub async fn finish(mut self) -> Result<usize, PipelineError> {
        self.flush().await?;
        Ok(self.batches)
    }

    /// Number of batch waits so far.
    pub fn batches(&self) -> usize {
        self.batches
    }

    async fn flush(&mut self) -> Result<(), PipelineError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let start = Instant::now();
        let size = self.pending.len();
        let results = join_all(self.pending.drain(..)).await;
        self.batches += 1;
        BATCH_HISTOGRAM.observe(start.elapsed().as_secs_f64());
        debug!(batch = self.batches, size, "Batch settled");

        // Every dispatched operation has settled by now; surface the first failure.
        let mut first_err = None;
        for result in results {
            let outcome = result.map_err(PipelineError::from).and_then(|r| r);
            if let Err(e) = outcome {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Write one JSON payload, logging the target path on failure.
pub async fn write_json_file(path: PathBuf, bytes: Vec<u8>) -> Result<(), PipelineError> {
    match tokio::fs::write(&path, bytes).await {
        Ok(()) => {
            FILES_WRITTEN.inc();
            Ok(())
        }
        Err(e) => {
            WRITE_FAILURES.inc();
            error!(path = %path.display(), error = %e, "Error writing file");
            Err(PipelineError::io(path, e))
        }
    }
}

/// Layout of the static API tree under its root directory.
#[derive(Debug, Clone)]
pub struct ApiTree {
    root: PathBuf,
}

impl ApiTree {
    /// Per-entity and per-parent directories.
    pub const DIRS: [&'static str; 7] = [
        "province",
        "regencies",
        "regency",
        "districts",
        "district",
        "villages",
        "village",
    ];

    pub fn new(root: impl Into<PathBuf>) -> Self {
        ApiTree { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/{file}`
    pub fn file(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    /// `{root}/{dir}/{id}.json`
    pub fn entry(&self, dir: &str, id: &str) -> PathBuf {
        self.root.join(dir).join(format!("{id}.json"))
    }

    pub async fn ensure_dirs(&self) -> Result<(), PipelineError> {
        for dir in Self::DIRS {
            let path = self.root.join(dir);
            tokio::fs::create_dir_all(&path)
                .await
                .map_err(|e| PipelineError::io(&path, e))?;
        }
        Ok(())
    }
}

/// Write the whole list as a single JSON array file, e.g. `provinces.json`.
pub async fn write_aggregate<T: Serialize>(
    tree: &ApiTree,
    file: &str,
    items: &[T],
) -> Result<(), PipelineError> {
    info!("Writing \"{file}\"...");
    let bytes = serde_json::to_vec(items)?;
    write_json_file(tree.file(file), bytes).await?;
    info!("Successfully wrote \"{file}\".");
    Ok(())
}

/// Write `{dir}/{id}.json` for every entity. Returns the number of batch waits.
pub async fn write_entities<T: Entity>(
    tree: &ApiTree,
    dir: &str,
    items: &[T],
    limit: usize,
) -> Result<usize, PipelineError> {
    info!("Writing \"{dir}/*.json\"...");
    let mut writer = BatchWriter::new(limit);
    for item in items {
        let bytes = serde_json::to_vec(item)?;
        writer
            .push(write_json_file(tree.entry(dir, item.id()), bytes))
            .await?;
    }
    let batches = writer.finish().await?;
    info!(files = items.len(), batches, "Successfully wrote \"{dir}/*.json\".");
    Ok(batches)
}

/// Index children by parent id, keeping their original order.
pub fn group_by_parent<C: Child>(children: &[C]) -> HashMap<&str, Vec<&C>> {
    let mut groups: HashMap<&str, Vec<&C>> = HashMap::new();
    for child in children {
        groups.entry(child.parent_id()).or_default().push(child);
    }
    groups
}

/// Write `{dir}/{parent_id}.json` for every parent, holding its direct
/// children (`[]` when it has none). Returns the number of batch waits.
pub async fn write_groups<P: Entity, C: Child>(
    tree: &ApiTree,
    dir: &str,
    parents: &[P],
    children: &[C],
    limit: usize,
) -> Result<usize, PipelineError> {
    info!("Writing \"{dir}/*.json\"...");
    let groups = group_by_parent(children);
    let mut writer = BatchWriter::new(limit);
    for parent in parents {
        let bytes = match groups.get(parent.id()) {
            Some(group) => serde_json::to_vec(group)?,
            None => b"[]".to_vec(),
        };
        writer
            .push(write_json_file(tree.entry(dir, parent.id()), bytes))
            .await?;
    }
    let batches = writer.finish().await?;
    info!(files = parents.len(), batches, "Successfully wrote \"{dir}/*.json\".");
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Province, Regency};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn thirty_three_ops_take_two_waits() {
        let mut writer = BatchWriter::new(32);
        for _ in 0..33 {
            writer.push(async { Ok::<(), PipelineError>(()) }).await.unwrap();
        }
        assert_eq!(writer.batches(), 1);
        assert_eq!(writer.finish().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn exact_multiple_and_empty_batches() {
        let mut writer = BatchWriter::new(32);
        for _ in 0..32 {
            writer.push(async { Ok::<(), PipelineError>(()) }).await.unwrap();
        }
        assert_eq!(writer.finish().await.unwrap(), 1);
        assert_eq!(BatchWriter::new(32).finish().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn next_batch_starts_only_after_whole_batch_settles() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));
        let seen_at_start = Arc::new(AtomicUsize::new(usize::MAX));

        let mut writer = BatchWriter::new(32);
        for i in 0..33u64 {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            let completed = completed.clone();
            let seen_at_start = seen_at_start.clone();
            writer
                .push(async move {
                    if i == 32 {
                        seen_at_start.store(completed.load(Ordering::SeqCst), Ordering::SeqCst);
                    }
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    // Stagger completion so a sliding window would show up.
                    tokio::time::sleep(Duration::from_millis(i % 5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    completed.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), PipelineError>(())
                })
                .await
                .unwrap();
        }
        assert_eq!(writer.finish().await.unwrap(), 2);
        assert!(peak.load(Ordering::SeqCst) <= 32);
        assert_eq!(seen_at_start.load(Ordering::SeqCst), 32);
        assert_eq!(completed.load(Ordering::SeqCst), 33);
    }

    #[tokio::test]
    async fn failed_op_fails_batch_after_others_settle() {
        let completed = Arc::new(AtomicUsize::new(0));
        let mut writer = BatchWriter::new(4);
        for i in 0..4 {
            let completed = completed.clone();
            writer
                .push(async move {
                    if i == 1 {
                        return Err(PipelineError::io(
                            "broken.json",
                            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
                        ));
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    completed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
                .unwrap();
        }
        let err = writer.finish().await.unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
        assert_eq!(completed.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn zero_limit_is_clamped() {
        assert_eq!(BatchWriter::new(0).limit, 1);
    }

    #[test]
    fn entry_paths_follow_layout() {
        let tree = ApiTree::new("/srv/api");
        assert_eq!(tree.entry("village", "1101012001"), PathBuf::from("/srv/api/village/1101012001.json"));
        assert_eq!(tree.file("provinces.json"), PathBuf::from("/srv/api/provinces.json"));
    }

    #[test]
    fn grouping_keeps_order_and_only_direct_children() {
        let regencies = vec![
            Regency { id: "1101".into(), province_id: "11".into(), name: "A".into() },
            Regency { id: "1201".into(), province_id: "12".into(), name: "B".into() },
            Regency { id: "1102".into(), province_id: "11".into(), name: "C".into() },
        ];
        let groups = group_by_parent(&regencies);
        let ids: Vec<&str> = groups["11"].iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1101", "1102"]);
        assert_eq!(groups["12"].len(), 1);
        assert!(!groups.contains_key("13"));
    }

    #[test]
    fn childless_parent_gets_empty_array() {
        let dir = tempfile::TempDir::new().unwrap();
        let tree = ApiTree::new(dir.path());
        let provinces = vec![Province { id: "99".into(), name: "EMPTY".into() }];
        tokio_test::block_on(async {
            tree.ensure_dirs().await.unwrap();
            write_groups::<Province, Regency>(&tree, "regencies", &provinces, &[], 32)
                .await
                .unwrap();
        });
        let body = std::fs::read_to_string(tree.entry("regencies", "99")).unwrap();
        assert_eq!(body, "[]");
    }
}
