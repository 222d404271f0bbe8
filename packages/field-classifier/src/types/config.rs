//! Configuration types for batching, filtering, retry and verification.
//!
//! Everything here is plain data: load it once, then pass it into the
//! components that need it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::pipeline::retry::RetryPolicy;
use crate::traits::backend::CompletionOptions;

/// Sentinel categories meaning "could not classify".
pub const DEFAULT_SENTINELS: &[&str] = &["Unclassified", "Unrecognized", "未分类", "无法识别"];

/// Keywords that mark a field as a likely company name.
pub const DEFAULT_COMPANY_KEYWORDS: &[&str] = &["Co., Ltd.", "Corp", "Inc", "LLC", "Group", "Company"];

/// Category labels that count as "company name".
pub const DEFAULT_COMPANY_CATEGORIES: &[&str] = &["Company", "公司名"];

/// Configuration for normalizing and batching raw tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Tokens shorter than this (in characters) are discarded. Default: 2.
    pub min_length: usize,

    /// Fields per batch; the last batch may be short. Default: 100.
    pub batch_size: usize,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            min_length: 2,
            batch_size: 100,
        }
    }
}

impl FieldConfig {
    /// Set minimum field length.
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    /// Set batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// Which classified rows survive into a `BatchResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// A category containing any of these (case-sensitive) is dropped.
    pub sentinels: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            sentinels: DEFAULT_SENTINELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl FilterConfig {
    /// Replace the sentinel list.
    pub fn with_sentinels(mut self, sentinels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.sentinels = sentinels.into_iter().map(|s| s.into()).collect();
        self
    }

    /// Whether a category should be kept.
    pub fn accepts(&self, category: &str) -> bool {
        let category = category.trim();
        !category.is_empty()
            && !self
                .sentinels
                .iter()
                .any(|s| !s.is_empty() && category.contains(s.as_str()))
    }
}

/// Rule thresholds for the verification pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Rows below this confidence need manual review. Default: 80.
    pub low_confidence_threshold: u8,

    /// Substrings (case-insensitive) that mark a company name.
    pub company_keywords: Vec<String>,

    /// Category labels accepted for fields carrying a company keyword.
    pub company_categories: Vec<String>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            low_confidence_threshold: 80,
            company_keywords: DEFAULT_COMPANY_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            company_categories: DEFAULT_COMPANY_CATEGORIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl VerifyConfig {
    /// Set the low-confidence threshold.
    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.low_confidence_threshold = threshold;
        self
    }

    /// Replace the company keyword list.
    pub fn with_company_keywords(
        mut self,
        keywords: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.company_keywords = keywords.into_iter().map(|k| k.into()).collect();
        self
    }

    /// Replace the accepted company category labels.
    pub fn with_company_categories(
        mut self,
        categories: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.company_categories = categories.into_iter().map(|c| c.into()).collect();
        self
    }
}

/// Everything the dispatcher needs besides the backend and the store.
#[derive(Debug, Clone, Default)]
pub struct ClassifierConfig {
    pub fields: FieldConfig,
    pub retry: RetryPolicy,
    pub filter: FilterConfig,
    pub verify: VerifyConfig,
    pub completion: CompletionOptions,

    /// Upper bound on concurrent batches, on top of the backend limit.
    ///
    /// None = available parallelism.
    pub max_workers: Option<usize>,
}

impl ClassifierConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fields(mut self, fields: FieldConfig) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_verify(mut self, verify: VerifyConfig) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_completion(mut self, completion: CompletionOptions) -> Self {
        self.completion = completion;
        self
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.completion.timeout = timeout;
        self
    }

    /// Cap concurrent batches.
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_rejects_sentinels_and_blank() {
        let filter = FilterConfig::default();
        assert!(filter.accepts("Company"));
        assert!(filter.accepts("公司名"));
        assert!(!filter.accepts(""));
        assert!(!filter.accepts("   "));
        assert!(!filter.accepts("Unclassified"));
        assert!(!filter.accepts("未分类"));
        // Substring match
        assert!(!filter.accepts("Unrecognized token"));
    }

    #[test]
    fn test_filter_is_case_sensitive() {
        let filter = FilterConfig::default();
        assert!(filter.accepts("unclassified"));
    }

    #[test]
    fn test_filter_sentinels_are_configurable() {
        let filter = FilterConfig::default().with_sentinels(["N/A"]);
        assert!(filter.accepts("Unclassified"));
        assert!(!filter.accepts("N/A"));
    }
}
