//! Concurrency-limited backend wrapper.
//!
//! Wraps any backend with a semaphore so the provider never sees more than
//! `max_concurrency` requests in flight, no matter how many callers share it.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::trace;

use crate::error::{ClassifyError, Result};
use crate::traits::backend::{BackendKind, CompletionOptions, LlmBackend};

/// A backend wrapper that enforces the provider's in-flight limit.
pub struct ConcurrencyLimited<B: LlmBackend> {
    inner: B,
    permits: Arc<Semaphore>,
    limit: usize,
}

impl<B: LlmBackend> ConcurrencyLimited<B> {
    /// Wrap `backend` with its own advertised limit.
    pub fn new(backend: B) -> Result<Self> {
        let limit = backend.max_concurrency();
        Self::with_limit(backend, limit)
    }

    /// Wrap `backend` with an explicit limit.
    pub fn with_limit(backend: B, limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(ClassifyError::Config(format!(
                "{} max concurrency must be at least 1",
                backend.kind()
            )));
        }
        Ok(Self {
            inner: backend,
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        })
    }

    /// Get the wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl<B: LlmBackend> LlmBackend for ConcurrencyLimited<B> {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    fn max_concurrency(&self) -> usize {
        self.limit
    }

    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ClassifyError::Config(format!("backend permits closed: {}", e)))?;
        trace!(backend = %self.inner.kind(), available = self.available(), "Acquired backend permit");
        self.inner.complete(prompt, options).await
    }
}
