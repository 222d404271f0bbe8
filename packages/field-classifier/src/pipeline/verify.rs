//! Rule-based verification of classified rows.
//!
//! Flags rows a human should look at: company-looking fields that were not
//! classified as companies, and low-confidence answers. Pure function of the
//! results and the thresholds.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::types::{
    classification::{BatchResult, ClassificationRow},
    config::VerifyConfig,
    field::BatchId,
};

/// File name of the combined problem report.
pub const PROBLEMS_FILE: &str = "all_problems.csv";

/// Column order of the problem report.
pub const PROBLEM_HEADERS: &[&str] = &[
    "source_batch",
    "raw_text",
    "category",
    "confidence",
    "reason",
    "problem_type",
];

/// Which rule a row broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemKind {
    /// Raw text carries a company keyword but the category is not a company label
    CompanyKeywordConflict,
    /// Confidence below the configured threshold
    LowConfidence,
}

impl ProblemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemKind::CompanyKeywordConflict => "company_keyword_conflict",
            ProblemKind::LowConfidence => "low_confidence",
        }
    }
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One flagged row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub source_batch: BatchId,
    pub row: ClassificationRow,
    pub kind: ProblemKind,
}

/// Flat CSV shape of a [`Problem`].
#[derive(Debug, Serialize)]
pub struct ProblemRecord<'a> {
    pub source_batch: String,
    pub raw_text: &'a str,
    pub category: &'a str,
    pub confidence: u8,
    pub reason: &'a str,
    pub problem_type: ProblemKind,
}

impl Problem {
    pub fn to_record(&self) -> ProblemRecord<'_> {
        ProblemRecord {
            source_batch: format!("result_{}.csv", self.source_batch.file_stem()),
            raw_text: &self.row.raw_text,
            category: &self.row.category,
            confidence: self.row.confidence,
            reason: &self.row.reason,
            problem_type: self.kind,
        }
    }
}

/// Every problem found across a set of batch results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProblemReport {
    /// Problems in batch order, then row order
    pub problems: Vec<Problem>,

    /// Rows examined
    pub rows_checked: usize,

    /// Batches that had at least one problem
    pub batches_with_problems: usize,
}

impl ProblemReport {
    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    /// Number of problems of one kind.
    pub fn count(&self, kind: ProblemKind) -> usize {
        self.problems.iter().filter(|p| p.kind == kind).count()
    }

    pub fn records(&self) -> Vec<ProblemRecord<'_>> {
        self.problems.iter().map(Problem::to_record).collect()
    }
}

/// Whether `raw_text` contains a company keyword (case-insensitive).
fn has_company_keyword(raw_text: &str, config: &VerifyConfig) -> bool {
    let haystack = raw_text.to_lowercase();
    config
        .company_keywords
        .iter()
        .filter(|k| !k.is_empty())
        .any(|k| haystack.contains(&k.to_lowercase()))
}

fn is_company_category(category: &str, config: &VerifyConfig) -> bool {
    config
        .company_categories
        .iter()
        .filter(|c| !c.is_empty())
        .any(|c| category.contains(c.as_str()))
}

/// The first rule `row` breaks, in rule order.
pub fn check_row(row: &ClassificationRow, config: &VerifyConfig) -> Option<ProblemKind> {
    if has_company_keyword(&row.raw_text, config) && !is_company_category(&row.category, config) {
        return Some(ProblemKind::CompanyKeywordConflict);
    }
    if row.confidence < config.low_confidence_threshold {
        return Some(ProblemKind::LowConfidence);
    }
    None
}

/// Check every row of every result. Each row is reported at most once.
pub fn verify(results: &[BatchResult], config: &VerifyConfig) -> ProblemReport {
    let mut report = ProblemReport::default();

    for result in results {
        let before = report.problems.len();
        for row in &result.rows {
            report.rows_checked += 1;
            if let Some(kind) = check_row(row, config) {
                report.problems.push(Problem {
                    source_batch: result.batch_id,
                    row: row.clone(),
                    kind,
                });
            }
        }
        if report.problems.len() > before {
            report.batches_with_problems += 1;
            debug!(
                batch_id = %result.batch_id,
                problems = report.problems.len() - before,
                "Batch has problems"
            );
        }
    }

    report
}
