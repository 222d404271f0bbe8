//! Storage traits for batches and batch results.
//!
//! Both stores behave as key-value maps from `BatchId` to a row set:
//! - `BatchStore`: prepared batches waiting for classification
//! - `ResultStore`: one persisted `BatchResult` per successful batch

use async_trait::async_trait;

use crate::error::{ClassifyError, Result};
use crate::types::{classification::BatchResult, field::Batch};

/// Outcome of loading every entry from a store.
///
/// Entries that fail to load are logged and skipped, not fatal.
#[derive(Debug)]
pub struct Loaded<T> {
    /// Successfully loaded entries, ordered by batch id
    pub items: Vec<T>,

    /// Entries that could not be read, with the reason
    pub skipped: Vec<ClassifyError>,
}

impl<T> Loaded<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            skipped: Vec::new(),
        }
    }
}

/// Store for prepared batches.
#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Persist a batch, replacing any batch with the same id.
    async fn put_batch(&self, batch: &Batch) -> Result<()>;

    /// Load every stored batch.
    async fn load_batches(&self) -> Result<Loaded<Batch>>;

    /// Remove every stored batch.
    async fn clear_batches(&self) -> Result<()>;
}

/// Store for classification results.
///
/// Each batch writes exactly one entry, so concurrent writers never collide.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persist a batch result. Written once per batch per run.
    async fn put_result(&self, result: &BatchResult) -> Result<()>;

    /// Load every stored result.
    async fn load_results(&self) -> Result<Loaded<BatchResult>>;

    /// Remove every stored result.
    async fn clear_results(&self) -> Result<()>;
}
