//! Classification pipeline - the core of the library.
//!
//! The pipeline orchestrates:
//! - Field store (ingest → filter → dedup → batch)
//! - Prompt rendering
//! - Backend calls with bounded exponential-backoff retry
//! - Response parsing and reconciliation with the source batch
//! - Concurrent dispatch across batches
//! - Post-run verification and merge
//! - Binary strings extraction (input preparation)

pub mod dispatch;
pub mod fields;
pub mod merge;
pub mod parse;
pub mod prompt;
pub mod retry;
pub mod strings;
pub mod verify;

pub use dispatch::{BatchOutcome, BatchStatus, Dispatcher, ProgressFn, Summary};
pub use fields::{ingest, is_valid_field, normalize_and_batch};
pub use merge::{merge_results, MERGED_FILE, MERGED_HEADERS};
pub use parse::{parse_and_merge, parse_line};
pub use prompt::{load_template, render, PromptTemplate, DEFAULT_TEMPLATE, PLACEHOLDER};
pub use retry::{invoke_with_retry, RetryError, RetryPolicy, Retryable};
pub use strings::{extract_strings, write_strings, StringsReport, STRINGS_FILE};
pub use verify::{
    check_row, verify, Problem, ProblemKind, ProblemReport, PROBLEMS_FILE, PROBLEM_HEADERS,
};
