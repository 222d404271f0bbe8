//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the classifier
//! without making real LLM or network calls.

use async_trait::async_trait;
use llm_client::LlmError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::Result;
use crate::traits::backend::{BackendKind, CompletionOptions, LlmBackend};

/// Kind of failure a mock backend can be scripted to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Network,
    Timeout,
    Envelope,
    Status(u16),
    Config,
}

impl MockFailure {
    fn to_error(self) -> LlmError {
        match self {
            MockFailure::Network => LlmError::Network("connection reset by mock".into()),
            MockFailure::Timeout => LlmError::Timeout(Duration::from_secs(60)),
            MockFailure::Envelope => LlmError::Envelope("'choices' is empty".into()),
            MockFailure::Status(status) => LlmError::Status {
                status,
                body: "mock status".into(),
            },
            MockFailure::Config => LlmError::Config("mock backend misconfigured".into()),
        }
    }
}

#[derive(Debug, Clone)]
struct ScriptedFailure {
    pattern: String,
    failure: MockFailure,
    /// None = fail forever
    remaining: Option<u32>,
}

/// Record of a call made to the mock backend.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub prompt: String,
    pub temperature: f32,
    pub timeout: Duration,
}

/// A mock LLM backend for testing.
///
/// Responses are chosen by prompt substring, first match wins, falling back
/// to a default (empty by default). Clones share all state, so a test can
/// keep a handle for assertions after handing one to a dispatcher.
#[derive(Clone)]
pub struct MockBackend {
    kind: BackendKind,
    max_concurrency: usize,
    latency: Duration,

    /// (prompt substring, response) pairs in insertion order
    responses: Arc<RwLock<Vec<(String, String)>>>,

    default_response: Arc<RwLock<String>>,

    failures: Arc<RwLock<Vec<ScriptedFailure>>>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<MockCall>>>,

    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a mock that answers every prompt with an empty response.
    pub fn new() -> Self {
        Self {
            kind: BackendKind::Local,
            max_concurrency: 8,
            latency: Duration::ZERO,
            responses: Arc::default(),
            default_response: Arc::default(),
            failures: Arc::default(),
            calls: Arc::default(),
            in_flight: Arc::default(),
            peak_in_flight: Arc::default(),
        }
    }

    /// Report a different backend kind.
    pub fn with_kind(mut self, kind: BackendKind) -> Self {
        self.kind = kind;
        self
    }

    /// Advertise a concurrency limit.
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit;
        self
    }

    /// Sleep this long inside every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Answer prompts containing `pattern` with `response`.
    pub fn with_response(self, pattern: impl Into<String>, response: impl Into<String>) -> Self {
        self.responses
            .write()
            .unwrap()
            .push((pattern.into(), response.into()));
        self
    }

    /// Answer unmatched prompts with `response`.
    pub fn with_default_response(self, response: impl Into<String>) -> Self {
        *self.default_response.write().unwrap() = response.into();
        self
    }

    /// Fail every prompt containing `pattern`.
    pub fn with_failure(self, pattern: impl Into<String>, failure: MockFailure) -> Self {
        self.push_failure(pattern.into(), failure, None)
    }

    /// Fail the first `times` prompts containing `pattern`, then answer normally.
    pub fn with_failures(
        self,
        pattern: impl Into<String>,
        failure: MockFailure,
        times: u32,
    ) -> Self {
        self.push_failure(pattern.into(), failure, Some(times))
    }

    fn push_failure(self, pattern: String, failure: MockFailure, remaining: Option<u32>) -> Self {
        self.failures.write().unwrap().push(ScriptedFailure {
            pattern,
            failure,
            remaining,
        });
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.read().unwrap().clone()
    }

    /// Number of calls whose prompt contains `pattern`.
    pub fn call_count_matching(&self, pattern: &str) -> usize {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.prompt.contains(pattern))
            .count()
    }

    /// Highest number of calls that were in flight at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Clear call history.
    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }

    fn take_failure(&self, prompt: &str) -> Option<MockFailure> {
        let mut failures = self.failures.write().unwrap();
        let scripted = failures.iter_mut().find(|f| {
            prompt.contains(f.pattern.as_str()) && f.remaining.map_or(true, |n| n > 0)
        })?;
        if let Some(n) = scripted.remaining.as_mut() {
            *n -= 1;
        }
        Some(scripted.failure)
    }

    fn response_for(&self, prompt: &str) -> String {
        self.responses
            .read()
            .unwrap()
            .iter()
            .find(|(pattern, _)| prompt.contains(pattern.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.default_response.read().unwrap().clone())
    }
}

/// Decrements the in-flight counter when a call ends, however it ends.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        self.calls.write().unwrap().push(MockCall {
            prompt: prompt.to_string(),
            temperature: options.temperature,
            timeout: options.timeout,
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(failure) = self.take_failure(prompt) {
            return Err(failure.to_error().into());
        }
        Ok(self.response_for(prompt))
    }
}
