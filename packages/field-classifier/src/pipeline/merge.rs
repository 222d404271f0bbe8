//! Final merge of every persisted batch result into one sorted collection.

use serde::Serialize;

use crate::types::classification::{BatchResult, MergedRow};

/// File name of the merged output.
pub const MERGED_FILE: &str = "merged_results.csv";

/// Column order of the merged output.
pub const MERGED_HEADERS: &[&str] = &["source_batch", "raw_text", "category", "confidence", "reason"];

/// Flat CSV shape of a [`MergedRow`].
#[derive(Debug, Serialize)]
pub struct MergedRecord<'a> {
    pub source_batch: u32,
    pub raw_text: &'a str,
    pub category: &'a str,
    pub confidence: u8,
    pub reason: &'a str,
}

impl MergedRow {
    pub fn to_record(&self) -> MergedRecord<'_> {
        MergedRecord {
            source_batch: self.source_batch.0,
            raw_text: &self.row.raw_text,
            category: &self.row.category,
            confidence: self.row.confidence,
            reason: &self.row.reason,
        }
    }
}

/// Concatenate results and sort by category, then raw text.
///
/// The sort is stable, so rows that tie on both keys keep batch order.
pub fn merge_results<I>(results: I) -> Vec<MergedRow>
where
    I: IntoIterator<Item = BatchResult>,
{
    let mut results: Vec<BatchResult> = results.into_iter().collect();
    results.sort_by_key(|r| r.batch_id);

    let mut merged: Vec<MergedRow> = results
        .into_iter()
        .flat_map(|result| {
            let source_batch = result.batch_id;
            result
                .rows
                .into_iter()
                .map(move |row| MergedRow { source_batch, row })
        })
        .collect();

    merged.sort_by(|a, b| {
        a.row
            .category
            .cmp(&b.row.category)
            .then_with(|| a.row.raw_text.cmp(&b.row.raw_text))
    });
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{classification::ClassificationRow, field::BatchId};

    fn result(id: u32, rows: &[(&str, &str)]) -> BatchResult {
        BatchResult {
            batch_id: BatchId(id),
            rows: rows
                .iter()
                .map(|(raw, category)| ClassificationRow {
                    raw_text: raw.to_string(),
                    category: category.to_string(),
                    confidence: 90,
                    reason: "r".into(),
                })
                .collect(),
            stats: Default::default(),
        }
    }

    #[test]
    fn test_sorted_by_category_then_raw_text() {
        let merged = merge_results(vec![
            result(2, &[("zeta", "Product"), ("Acme Corp", "Company")]),
            result(1, &[("beta", "Product"), ("alpha", "Product")]),
        ]);

        let order: Vec<(&str, u32)> = merged
            .iter()
            .map(|m| (m.row.raw_text.as_str(), m.source_batch.0))
            .collect();
        assert_eq!(
            order,
            vec![("Acme Corp", 2), ("alpha", 1), ("beta", 1), ("zeta", 2)]
        );
    }

    #[test]
    fn test_ties_keep_batch_order() {
        let merged = merge_results(vec![
            result(3, &[("same", "Word")]),
            result(1, &[("same", "Word")]),
        ]);
        let sources: Vec<u32> = merged.iter().map(|m| m.source_batch.0).collect();
        assert_eq!(sources, vec![1, 3]);
    }

    #[test]
    fn test_empty_results_merge_to_nothing() {
        assert!(merge_results(vec![BatchResult::empty(BatchId(1))]).is_empty());
    }
}
