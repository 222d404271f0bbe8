//! Fields and the batches they are submitted in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequential batch identifier, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchId(pub u32);

impl BatchId {
    /// File stem used for this batch's files (`batch_7`).
    pub fn file_stem(&self) -> String {
        format!("batch_{}", self.0)
    }

    /// Parse a batch identifier back out of a file stem.
    ///
    /// Accepts `batch_7` and `result_batch_7`.
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        stem.trim_start_matches("result_")
            .strip_prefix("batch_")?
            .parse()
            .ok()
            .map(BatchId)
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_stem())
    }
}

/// An ordered group of fields submitted together in one LLM request.
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    id: BatchId,
    fields: Vec<String>,
}

impl Batch {
    /// Create a batch.
    pub fn new(id: BatchId, fields: Vec<String>) -> Self {
        Self { id, fields }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    /// Raw field texts in submission order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether `raw_text` is one of this batch's fields.
    pub fn contains(&self, raw_text: &str) -> bool {
        self.fields.iter().any(|f| f == raw_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stem_roundtrip() {
        let id = BatchId(12);
        assert_eq!(id.file_stem(), "batch_12");
        assert_eq!(BatchId::from_file_stem("batch_12"), Some(id));
        assert_eq!(BatchId::from_file_stem("result_batch_12"), Some(id));
        assert_eq!(BatchId::from_file_stem("all_problems"), None);
        assert_eq!(BatchId::from_file_stem("batch_x"), None);
    }
}
