//! Batch LLM Field Classification Library
//!
//! Takes candidate text fields (typically strings pulled out of binaries),
//! deduplicates and batches them, asks an LLM to classify each batch, and
//! reconciles the delimited responses with the source rows.
//!
//! # Design
//!
//! - One capability trait per seam: [`LlmBackend`] for providers,
//!   [`BatchStore`]/[`ResultStore`] for storage
//! - Configuration is plain data, loaded once and passed in
//! - Retry is a pure delay schedule plus a generic executor
//! - Failures stay inside their batch; the run summary is the source of truth
//!
//! # Usage
//!
//! ```rust,ignore
//! use field_classifier::{build_backend, ClassifierConfig, CsvStore, Dispatcher, GatewayConfig};
//! use std::sync::Arc;
//!
//! let backend = build_backend(&GatewayConfig::default())?;
//! let store = Arc::new(CsvStore::new("data/preprocessed_batches", "data/classify_results"));
//! let batches = store.load_batches().await?.items;
//!
//! let dispatcher = Dispatcher::new(backend, store, ClassifierConfig::default());
//! let summary = dispatcher.run(batches, &template).await?;
//! println!("{} ok, {} failed", summary.success_count, summary.failure_count);
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Core trait abstractions (LlmBackend, BatchStore, ResultStore)
//! - [`types`] - Fields, batches, classification rows and configuration
//! - [`pipeline`] - Batching, prompting, retry, parsing, dispatch, verify, merge
//! - [`backends`] - Hosted and self-hosted backend implementations
//! - [`stores`] - Storage implementations (CsvStore, MemoryStore)
//! - [`testing`] - Mock implementations for testing

pub mod backends;
pub mod credentials;
pub mod error;
pub mod pipeline;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use credentials::ApiKey;
pub use error::{ClassifyError, Result};
pub use traits::{
    backend::{BackendKind, CompletionOptions, LlmBackend},
    store::{BatchStore, Loaded, ResultStore},
};
pub use types::{
    classification::{BatchResult, ClassificationRow, MergedRow, ParseStats},
    config::{ClassifierConfig, FieldConfig, FilterConfig, VerifyConfig},
    field::{Batch, BatchId},
};

// Re-export pipeline components
pub use pipeline::{
    // Field store
    ingest, is_valid_field, normalize_and_batch,
    // Prompt
    load_template, render, PromptTemplate,
    // Retry
    invoke_with_retry, RetryError, RetryPolicy,
    // Parsing
    parse_and_merge,
    // Dispatch
    BatchOutcome, BatchStatus, Dispatcher, Summary,
    // Post-run
    merge_results, verify, ProblemKind, ProblemReport,
    // Input preparation
    extract_strings, StringsReport,
};

// Re-export backends
pub use backends::{
    build_backend, ConcurrencyLimited, GatewayConfig, HostedBackend, LocalBackend, ProviderConfig,
};

// Re-export stores
pub use stores::{CsvStore, MemoryStore};

// Re-export testing utilities
pub use testing::{MockBackend, MockFailure};
