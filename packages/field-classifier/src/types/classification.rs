//! Classification output types.

use serde::{Deserialize, Serialize};

use super::field::BatchId;

/// The classification of one field, as returned by the LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRow {
    /// Join key back to the batch field
    pub raw_text: String,
    pub category: String,
    /// 0 to 100
    pub confidence: u8,
    pub reason: String,
}

/// Counters describing how a raw response was reconciled with its batch.
///
/// Dropped lines are not errors; they only show up here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStats {
    /// Non-blank lines in the response
    pub lines: usize,
    /// Lines that did not split into exactly four parts
    pub malformed: usize,
    /// Well-formed lines whose raw text is not a field of the batch
    pub unmatched: usize,
    /// Well-formed lines repeating a raw text already seen
    pub duplicates: usize,
    /// Fields with no well-formed line at all
    pub missing: usize,
    /// Fields whose category was empty or a sentinel
    pub filtered: usize,
}

/// Filtered, merged classification output for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub batch_id: BatchId,
    /// Retained rows, in batch field order
    pub rows: Vec<ClassificationRow>,
    pub stats: ParseStats,
}

impl BatchResult {
    /// A result with no retained rows.
    pub fn empty(batch_id: BatchId) -> Self {
        Self {
            batch_id,
            rows: Vec::new(),
            stats: ParseStats::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up the row for a field.
    pub fn row(&self, raw_text: &str) -> Option<&ClassificationRow> {
        self.rows.iter().find(|r| r.raw_text == raw_text)
    }
}

/// One row of the final merged collection across all batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRow {
    pub source_batch: BatchId,
    pub row: ClassificationRow,
}
