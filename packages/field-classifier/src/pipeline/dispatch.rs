//! Dispatcher: runs every batch through prompt → backend (with retry) → parser.
//!
//! Batches run as independent tokio tasks behind a semaphore sized to
//! `min(available parallelism, backend limit, batch count, max_workers)`.
//! Tasks share nothing but the backend and the result store. Outcomes are
//! drained by the caller's task as they complete, which is the only place
//! the summary counters change.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::error::{ClassifyError, Result};
use crate::pipeline::{parse::parse_and_merge, prompt::PromptTemplate, retry::invoke_with_retry};
use crate::traits::{backend::LlmBackend, store::ResultStore};
use crate::types::{
    classification::{BatchResult, ParseStats},
    config::ClassifierConfig,
    field::{Batch, BatchId},
};

/// Callback invoked once per batch as soon as it finishes.
pub type ProgressFn = Arc<dyn Fn(&BatchOutcome) + Send + Sync>;

/// How one batch ended.
#[derive(Debug)]
pub enum BatchStatus {
    /// Result persisted. `rows` may be zero.
    Succeeded { rows: usize, stats: ParseStats },

    /// Retries exhausted, permanent backend error, or the result could not be written.
    Failed(ClassifyError),
}

/// Per-batch report handed to the progress callback.
#[derive(Debug)]
pub struct BatchOutcome {
    pub batch_id: BatchId,
    pub fields: usize,
    pub status: BatchStatus,
    pub elapsed: Duration,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, BatchStatus::Succeeded { .. })
    }
}

/// Aggregate result of a dispatch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub success_count: usize,
    pub failure_count: usize,

    /// Successful batches that kept no rows
    pub empty_count: usize,

    /// Rows written across all successful batches
    pub total_rows: usize,

    /// Failed batch ids, ascending
    pub failed_batches: Vec<BatchId>,

    /// Worker pool size actually used
    pub workers: usize,

    pub elapsed: Duration,
}

impl Summary {
    /// Batches that ran to completion either way.
    pub fn total(&self) -> usize {
        self.success_count + self.failure_count
    }

    /// True when no batch failed.
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }

    fn record(&mut self, outcome: &BatchOutcome) {
        match &outcome.status {
            BatchStatus::Succeeded { rows, .. } => {
                self.success_count += 1;
                self.total_rows += rows;
                if *rows == 0 {
                    self.empty_count += 1;
                }
            }
            BatchStatus::Failed(_) => {
                self.failure_count += 1;
                self.failed_batches.push(outcome.batch_id);
            }
        }
    }
}

/// Runs batches concurrently against one backend and one result store.
pub struct Dispatcher<B: ?Sized, S: ?Sized> {
    backend: Arc<B>,
    store: Arc<S>,
    config: Arc<ClassifierConfig>,
    progress: Option<ProgressFn>,
}

impl<B, S> Dispatcher<B, S>
where
    B: LlmBackend + ?Sized + 'static,
    S: ResultStore + ?Sized + 'static,
{
    pub fn new(backend: Arc<B>, store: Arc<S>, config: ClassifierConfig) -> Self {
        Self {
            backend,
            store,
            config: Arc::new(config),
            progress: None,
        }
    }

    /// Report each batch outcome as it completes.
    pub fn with_progress(mut self, progress: impl Fn(&BatchOutcome) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Worker pool size for `batch_count` batches.
    pub fn worker_count(&self, batch_count: usize) -> usize {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let mut workers = parallelism
            .min(self.backend.max_concurrency().max(1))
            .min(batch_count);
        if let Some(cap) = self.config.max_workers {
            workers = workers.min(cap.max(1));
        }
        workers
    }

    /// Validate `template` and run every batch.
    ///
    /// Only a bad template fails the whole run; batch failures are counted
    /// in the summary.
    pub async fn run(&self, batches: Vec<Batch>, template: &str) -> Result<Summary> {
        let template = PromptTemplate::new(template)?;
        Ok(self.run_with_template(batches, template).await)
    }

    /// Run every batch with an already validated template.
    pub async fn run_with_template(&self, batches: Vec<Batch>, template: PromptTemplate) -> Summary {
        let started = Instant::now();
        let workers = self.worker_count(batches.len());
        let mut summary = Summary {
            workers,
            ..Default::default()
        };

        if batches.is_empty() {
            warn!("No batches to classify");
            return summary;
        }

        info!(
            batches = batches.len(),
            workers = workers,
            backend = %self.backend.kind(),
            "Starting classification"
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        let template = Arc::new(template);
        let mut tasks = JoinSet::new();
        // Lets a panicked task still be reported under its batch
        let mut task_batches = HashMap::new();

        for batch in batches {
            let backend = self.backend.clone();
            let store = self.store.clone();
            let config = self.config.clone();
            let template = template.clone();
            let sem = semaphore.clone();

            let batch_id = batch.id();
            let fields = batch.len();
            let handle = tasks.spawn(async move {
                let started = Instant::now();
                let status = match sem.acquire_owned().await {
                    Ok(_permit) => {
                        match classify_batch(&*backend, &*store, &config, &template, &batch).await {
                            Ok(result) => BatchStatus::Succeeded {
                                rows: result.rows.len(),
                                stats: result.stats,
                            },
                            Err(e) => BatchStatus::Failed(e),
                        }
                    }
                    Err(e) => BatchStatus::Failed(ClassifyError::Config(format!(
                        "worker pool closed: {}",
                        e
                    ))),
                };
                BatchOutcome {
                    batch_id,
                    fields,
                    status,
                    elapsed: started.elapsed(),
                }
            });
            task_batches.insert(handle.id(), (batch_id, fields));
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let outcome = match joined {
                Ok((_, outcome)) => outcome,
                Err(e) => {
                    let Some((batch_id, fields)) = task_batches.remove(&e.id()) else {
                        error!(error = %e, "Unknown batch task aborted");
                        summary.failure_count += 1;
                        continue;
                    };
                    BatchOutcome {
                        batch_id,
                        fields,
                        status: BatchStatus::Failed(ClassifyError::TaskAborted(e.to_string())),
                        elapsed: Duration::ZERO,
                    }
                }
            };

            match &outcome.status {
                BatchStatus::Succeeded { rows, .. } => info!(
                    batch_id = %outcome.batch_id,
                    fields = outcome.fields,
                    rows = rows,
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "Batch classified"
                ),
                BatchStatus::Failed(e) => error!(
                    batch_id = %outcome.batch_id,
                    error = %e,
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "Batch failed, skipping"
                ),
            }

            summary.record(&outcome);
            if let Some(progress) = &self.progress {
                progress(&outcome);
            }
        }

        summary.failed_batches.sort();
        summary.elapsed = started.elapsed();

        info!(
            success = summary.success_count,
            failed = summary.failure_count,
            empty = summary.empty_count,
            rows = summary.total_rows,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Classification complete"
        );

        summary
    }
}

/// Prompt → backend with retry → parse → persist, for one batch.
async fn classify_batch<B, S>(
    backend: &B,
    store: &S,
    config: &ClassifierConfig,
    template: &PromptTemplate,
    batch: &Batch,
) -> Result<BatchResult>
where
    B: LlmBackend + ?Sized,
    S: ResultStore + ?Sized,
{
    let prompt = template.render(batch.fields());
    let response = invoke_with_retry(&config.retry, || {
        backend.complete(&prompt, &config.completion)
    })
    .await?;

    let result = parse_and_merge(&response, batch, &config.filter);
    store.put_result(&result).await?;
    Ok(result)
}
