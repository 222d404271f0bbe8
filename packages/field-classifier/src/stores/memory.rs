//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use crate::error::{ClassifyError, Result};
use crate::traits::store::{BatchStore, Loaded, ResultStore};
use crate::types::{
    classification::BatchResult,
    field::{Batch, BatchId},
};

/// In-memory storage for batches and results.
///
/// Useful for testing and development. Not suitable for production
/// as data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    batches: RwLock<BTreeMap<BatchId, Batch>>,
    results: RwLock<BTreeMap<BatchId, BatchResult>>,

    /// Batches whose result writes fail with an I/O error
    failing_writes: RwLock<HashSet<BatchId>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `put_result` for `batch_id` fail.
    pub fn with_failing_write(self, batch_id: BatchId) -> Self {
        self.failing_writes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(batch_id);
        self
    }

    /// Get the number of stored batches.
    pub fn batch_count(&self) -> usize {
        self.batches.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Get the number of stored results.
    pub fn result_count(&self) -> usize {
        self.results.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Get the stored result for a batch.
    pub fn result(&self, batch_id: BatchId) -> Option<BatchResult> {
        self.results
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&batch_id)
            .cloned()
    }
}

#[async_trait]
impl BatchStore for MemoryStore {
    async fn put_batch(&self, batch: &Batch) -> Result<()> {
        self.batches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(batch.id(), batch.clone());
        Ok(())
    }

    async fn load_batches(&self) -> Result<Loaded<Batch>> {
        let batches = self.batches.read().unwrap_or_else(PoisonError::into_inner);
        Ok(Loaded::new(batches.values().cloned().collect()))
    }

    async fn clear_batches(&self) -> Result<()> {
        self.batches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn put_result(&self, result: &BatchResult) -> Result<()> {
        let failing = self
            .failing_writes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&result.batch_id);
        if failing {
            return Err(ClassifyError::file_io(
                PathBuf::from(format!("memory://result_{}", result.batch_id.file_stem())),
                io::Error::new(io::ErrorKind::PermissionDenied, "write refused"),
            ));
        }

        self.results
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(result.batch_id, result.clone());
        Ok(())
    }

    async fn load_results(&self) -> Result<Loaded<BatchResult>> {
        let results = self.results.read().unwrap_or_else(PoisonError::into_inner);
        Ok(Loaded::new(results.values().cloned().collect()))
    }

    async fn clear_results(&self) -> Result<()> {
        self.results
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::classification::ClassificationRow;

    #[tokio::test]
    async fn test_batches_load_in_id_order() {
        let store = MemoryStore::new();
        store
            .put_batch(&Batch::new(BatchId(2), vec!["bb".into()]))
            .await
            .unwrap();
        store
            .put_batch(&Batch::new(BatchId(1), vec!["aa".into()]))
            .await
            .unwrap();

        let loaded = store.load_batches().await.unwrap();
        let ids: Vec<BatchId> = loaded.items.iter().map(Batch::id).collect();
        assert_eq!(ids, vec![BatchId(1), BatchId(2)]);
        assert!(loaded.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_result_write_replaces_and_clears() {
        let store = MemoryStore::new();
        let mut result = BatchResult::empty(BatchId(1));
        store.put_result(&result).await.unwrap();

        result.rows.push(ClassificationRow {
            raw_text: "Acme Corp".into(),
            category: "Company".into(),
            confidence: 95,
            reason: "kw".into(),
        });
        store.put_result(&result).await.unwrap();

        assert_eq!(store.result_count(), 1);
        assert_eq!(store.result(BatchId(1)).unwrap().rows.len(), 1);

        store.clear_results().await.unwrap();
        assert_eq!(store.result_count(), 0);
    }

    #[tokio::test]
    async fn test_failing_write_is_file_error() {
        let store = MemoryStore::new().with_failing_write(BatchId(3));
        let err = store
            .put_result(&BatchResult::empty(BatchId(3)))
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifyError::FileIo { .. }));
        assert!(store.result(BatchId(3)).is_none());
    }
}
