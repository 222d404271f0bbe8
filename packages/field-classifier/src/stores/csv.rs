//! CSV file storage.
//!
//! Layout:
//! - `{batch_dir}/batch_{id}.csv` with a single `raw_text` column
//! - `{result_dir}/result_batch_{id}.csv` with `raw_text,category,confidence,reason`
//!
//! Every batch owns exactly one file per directory, so concurrent result
//! writes never touch the same path.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{ClassifyError, Result};
use crate::traits::store::{BatchStore, Loaded, ResultStore};
use crate::types::{
    classification::{BatchResult, ClassificationRow},
    field::{Batch, BatchId},
};

/// Header of a batch file.
pub const BATCH_HEADERS: &[&str] = &["raw_text"];

/// Header of a result file.
pub const RESULT_HEADERS: &[&str] = &["raw_text", "category", "confidence", "reason"];

const RESULT_PREFIX: &str = "result_";

#[derive(Serialize, Deserialize)]
struct BatchRecord {
    raw_text: String,
}

/// Batch and result files on local disk.
#[derive(Debug, Clone)]
pub struct CsvStore {
    batch_dir: PathBuf,
    result_dir: PathBuf,
}

impl CsvStore {
    /// Create a store over the two directories. Nothing is touched until first use.
    pub fn new(batch_dir: impl Into<PathBuf>, result_dir: impl Into<PathBuf>) -> Self {
        Self {
            batch_dir: batch_dir.into(),
            result_dir: result_dir.into(),
        }
    }

    pub fn batch_dir(&self) -> &Path {
        &self.batch_dir
    }

    pub fn result_dir(&self) -> &Path {
        &self.result_dir
    }

    /// Path of the batch file for `id`.
    pub fn batch_path(&self, id: BatchId) -> PathBuf {
        self.batch_dir.join(format!("{}.csv", id.file_stem()))
    }

    /// Path of the result file for `id`.
    pub fn result_path(&self, id: BatchId) -> PathBuf {
        self.result_dir
            .join(format!("{}{}.csv", RESULT_PREFIX, id.file_stem()))
    }
}

/// Write `rows` to `path` as CSV with an explicit header row.
///
/// The header is written even when there are no rows. Parent directories are
/// created as needed.
pub fn write_rows<T: Serialize>(path: &Path, headers: &[&str], rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ClassifyError::file_io(parent, e))?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| ClassifyError::csv(path, e))?;
    writer
        .write_record(headers)
        .map_err(|e| ClassifyError::csv(path, e))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| ClassifyError::csv(path, e))?;
    }
    writer.flush().map_err(|e| ClassifyError::file_io(path, e))
}

/// Read every record of a headed CSV file.
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| ClassifyError::csv(path, e))?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(|e| ClassifyError::csv(path, e))
}

/// `.csv` files in `dir` whose stem parses as a batch id, sorted by id.
///
/// `prefix` must match exactly, so result files are never mistaken for batches.
fn list_batch_files(dir: &Path, prefix: &str) -> Result<Vec<(BatchId, PathBuf)>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(dir = %dir.display(), "Directory does not exist, nothing to load");
            return Ok(Vec::new());
        }
        Err(e) => return Err(ClassifyError::file_io(dir, e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ClassifyError::file_io(dir, e))?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(rest) = stem.strip_prefix(prefix) else {
            continue;
        };
        // Result files never load as batches
        if prefix.is_empty() && stem.starts_with(RESULT_PREFIX) {
            continue;
        }
        match BatchId::from_file_stem(rest) {
            Some(id) => files.push((id, path)),
            None => debug!(path = %path.display(), "Ignoring unrecognized CSV file"),
        }
    }

    files.sort_by_key(|(id, _)| *id);
    Ok(files)
}

/// Delete the files `list_batch_files` would return, creating `dir` if missing.
fn clear_batch_files(dir: &Path, prefix: &str) -> Result<usize> {
    std::fs::create_dir_all(dir).map_err(|e| ClassifyError::file_io(dir, e))?;
    let files = list_batch_files(dir, prefix)?;
    for (_, path) in &files {
        std::fs::remove_file(path).map_err(|e| ClassifyError::file_io(path, e))?;
    }
    Ok(files.len())
}

/// Run blocking file work off the async runtime.
async fn blocking<T, F>(path: PathBuf, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ClassifyError::file_io(path, std::io::Error::other(e)))?
}

#[async_trait]
impl BatchStore for CsvStore {
    async fn put_batch(&self, batch: &Batch) -> Result<()> {
        let path = self.batch_path(batch.id());
        let records: Vec<BatchRecord> = batch
            .fields()
            .iter()
            .map(|f| BatchRecord { raw_text: f.clone() })
            .collect();

        blocking(path.clone(), move || write_rows(&path, BATCH_HEADERS, &records)).await
    }

    async fn load_batches(&self) -> Result<Loaded<Batch>> {
        let dir = self.batch_dir.clone();
        blocking(dir.clone(), move || {
            let mut loaded = Loaded::new(Vec::new());
            for (id, path) in list_batch_files(&dir, "")? {
                match read_rows::<BatchRecord>(&path) {
                    Ok(records) => loaded.items.push(Batch::new(
                        id,
                        records.into_iter().map(|r| r.raw_text).collect(),
                    )),
                    Err(e) => {
                        warn!(error = %e, "Skipping unreadable batch file");
                        loaded.skipped.push(e);
                    }
                }
            }
            info!(
                dir = %dir.display(),
                batches = loaded.items.len(),
                skipped = loaded.skipped.len(),
                "Loaded batch files"
            );
            Ok(loaded)
        })
        .await
    }

    async fn clear_batches(&self) -> Result<()> {
        let dir = self.batch_dir.clone();
        blocking(dir.clone(), move || {
            let removed = clear_batch_files(&dir, "")?;
            debug!(dir = %dir.display(), removed = removed, "Cleared batch files");
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ResultStore for CsvStore {
    async fn put_result(&self, result: &BatchResult) -> Result<()> {
        let path = self.result_path(result.batch_id);
        let rows = result.rows.clone();

        blocking(path.clone(), move || write_rows(&path, RESULT_HEADERS, &rows)).await
    }

    async fn load_results(&self) -> Result<Loaded<BatchResult>> {
        let dir = self.result_dir.clone();
        blocking(dir.clone(), move || {
            let mut loaded = Loaded::new(Vec::new());
            for (batch_id, path) in list_batch_files(&dir, RESULT_PREFIX)? {
                match read_rows::<ClassificationRow>(&path) {
                    Ok(rows) => loaded.items.push(BatchResult {
                        batch_id,
                        rows,
                        stats: Default::default(),
                    }),
                    Err(e) => {
                        warn!(error = %e, "Skipping unreadable result file");
                        loaded.skipped.push(e);
                    }
                }
            }
            info!(
                dir = %dir.display(),
                results = loaded.items.len(),
                skipped = loaded.skipped.len(),
                "Loaded result files"
            );
            Ok(loaded)
        })
        .await
    }

    async fn clear_results(&self) -> Result<()> {
        let dir = self.result_dir.clone();
        blocking(dir.clone(), move || {
            let removed = clear_batch_files(&dir, RESULT_PREFIX)?;
            debug!(dir = %dir.display(), removed = removed, "Cleared result files");
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> CsvStore {
        CsvStore::new(dir.path().join("batches"), dir.path().join("results"))
    }

    fn row(raw: &str, category: &str, confidence: u8) -> ClassificationRow {
        ClassificationRow {
            raw_text: raw.into(),
            category: category.into(),
            confidence,
            reason: "test".into(),
        }
    }

    #[tokio::test]
    async fn test_batch_file_has_raw_text_header() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .put_batch(&Batch::new(BatchId(1), vec!["Acme Corp".into(), "a,b".into()]))
            .await
            .unwrap();

        let content = fs::read_to_string(store.batch_path(BatchId(1))).unwrap();
        assert_eq!(content, "raw_text\nAcme Corp\n\"a,b\"\n");

        let loaded = store.load_batches().await.unwrap();
        assert_eq!(loaded.items[0].fields(), &["Acme Corp", "a,b"]);
    }

    #[tokio::test]
    async fn test_batches_load_sorted_by_numeric_id() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        for id in [10, 2, 1] {
            store
                .put_batch(&Batch::new(BatchId(id), vec![format!("f{id}")]))
                .await
                .unwrap();
        }
        fs::write(store.batch_dir().join("notes.txt"), "ignored").unwrap();

        let loaded = store.load_batches().await.unwrap();
        let ids: Vec<u32> = loaded.items.iter().map(|b| b.id().0).collect();
        assert_eq!(ids, vec![1, 2, 10]);
    }

    #[tokio::test]
    async fn test_empty_result_still_writes_header() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .put_result(&BatchResult::empty(BatchId(4)))
            .await
            .unwrap();

        let content = fs::read_to_string(store.result_path(BatchId(4))).unwrap();
        assert_eq!(content, "raw_text,category,confidence,reason\n");

        let loaded = store.load_results().await.unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert!(loaded.items[0].is_empty());
    }

    #[tokio::test]
    async fn test_result_roundtrip_and_corrupt_file_skipped() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let result = BatchResult {
            batch_id: BatchId(1),
            rows: vec![row("Acme Corp", "Company", 95)],
            stats: Default::default(),
        };
        store.put_result(&result).await.unwrap();
        fs::write(
            store.result_path(BatchId(2)),
            "raw_text,category,confidence,reason\nx,y,not-a-number,z\n",
        )
        .unwrap();

        let loaded = store.load_results().await.unwrap();
        assert_eq!(loaded.items, vec![result]);
        assert_eq!(loaded.skipped.len(), 1);
        assert!(matches!(loaded.skipped[0], ClassifyError::Csv { .. }));
    }

    #[tokio::test]
    async fn test_clear_only_touches_own_files() {
        let dir = TempDir::new().unwrap();
        // Batches and results share one directory
        let store = CsvStore::new(dir.path(), dir.path());
        store
            .put_batch(&Batch::new(BatchId(1), vec!["aa".into()]))
            .await
            .unwrap();
        store
            .put_result(&BatchResult::empty(BatchId(1)))
            .await
            .unwrap();

        store.clear_results().await.unwrap();

        assert!(store.batch_path(BatchId(1)).exists());
        assert!(!store.result_path(BatchId(1)).exists());
        assert_eq!(store.load_batches().await.unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_directory_loads_nothing() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let loaded = store.load_batches().await.unwrap();
        assert!(loaded.items.is_empty());
        assert!(loaded.skipped.is_empty());
    }
}
