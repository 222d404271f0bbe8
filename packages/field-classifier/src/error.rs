//! Typed errors for the classification library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can tell
//! fatal configuration problems apart from per-batch failures.

use std::path::PathBuf;

use llm_client::LlmError;
use thiserror::Error;

/// Errors that can occur while preparing or classifying batches.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// Missing or invalid static configuration. Fatal, raised before dispatch.
    #[error("configuration error: {0}")]
    Config(String),

    /// Prompt template is empty or lacks its placeholder.
    #[error("template error: {0}")]
    Template(String),

    /// LLM backend call failed
    #[error("backend error: {0}")]
    Backend(#[from] LlmError),

    /// A transient failure kept recurring until the retry budget ran out
    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<ClassifyError>,
    },

    /// The task running a batch panicked or was cancelled
    #[error("batch task aborted: {0}")]
    TaskAborted(String),

    /// Reading or writing a batch/result file failed
    #[error("file error at {}: {source}", path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A batch/result file has invalid CSV content
    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl ClassifyError {
    /// Whether the failed operation is worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ClassifyError::Backend(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Whether this error must abort the whole run rather than one batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClassifyError::Config(_) | ClassifyError::Template(_))
    }

    pub(crate) fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ClassifyError::FileIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        ClassifyError::Csv {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for classification operations.
pub type Result<T> = std::result::Result<T, ClassifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_backend_errors_retry() {
        assert!(ClassifyError::Backend(LlmError::Network("reset".into())).is_transient());
        assert!(!ClassifyError::Backend(LlmError::Config("no key".into())).is_transient());
        assert!(!ClassifyError::Config("unsupported backend".into()).is_transient());
        assert!(!ClassifyError::Template("missing placeholder".into()).is_transient());
    }

    #[test]
    fn test_exhausted_error_keeps_cause() {
        let err = ClassifyError::RetryExhausted {
            attempts: 6,
            source: Box::new(ClassifyError::Backend(LlmError::Envelope(
                "'choices' is empty".into(),
            ))),
        };
        let message = err.to_string();
        assert!(message.contains("6 attempts"));
        assert!(message.contains("'choices' is empty"));
        assert!(!err.is_fatal());
    }
}
