//! Integration tests for the classification pipeline.
//!
//! These tests run the full flow against mock backends:
//! 1. Prepare batches (from raw files or directly)
//! 2. Dispatch them concurrently through retry and parsing
//! 3. Persist results to a CSV store
//! 4. Verify and merge the persisted results

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use field_classifier::{
    ingest, merge_results, normalize_and_batch, verify, Batch, BatchId, BatchStore,
    ClassifierConfig, ConcurrencyLimited, CsvStore, Dispatcher, FieldConfig, MemoryStore,
    ProblemKind, ResultStore, RetryPolicy, VerifyConfig,
    testing::{MockBackend, MockFailure},
};
use tempfile::TempDir;

const TEMPLATE: &str = "Classify each field.\n{{fields_text}}";

/// Retry quickly so failing batches don't slow the suite down.
fn fast_config() -> ClassifierConfig {
    ClassifierConfig::new()
        .with_retry(RetryPolicy::new(2, Duration::ZERO, 2.0).with_jitter(Duration::ZERO))
}

fn batch(id: u32, fields: &[&str]) -> Batch {
    Batch::new(BatchId(id), fields.iter().map(|f| f.to_string()).collect())
}

#[tokio::test]
async fn test_acme_batch_end_to_end() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(CsvStore::new(dir.path().join("batches"), dir.path().join("results")));
    store
        .put_batch(&batch(1, &["Acme Corp", "xk29qz", "hello"]))
        .await
        .unwrap();

    let backend = Arc::new(MockBackend::new().with_response(
        "1. Acme Corp",
        "Acme Corp\tCompany\t95\tmatches keyword\nxk29qz\tUnclassified\t40\tno match",
    ));
    let dispatcher = Dispatcher::new(backend.clone(), store.clone(), fast_config());

    let batches = store.load_batches().await.unwrap().items;
    let summary = dispatcher.run(batches, TEMPLATE).await.unwrap();

    assert_eq!(summary.success_count, 1);
    assert_eq!(summary.failure_count, 0);
    assert_eq!(summary.total_rows, 1);

    // The prompt numbers fields from 1 in batch order
    let prompt = &backend.calls()[0].prompt;
    assert!(prompt.ends_with("1. Acme Corp\n2. xk29qz\n3. hello"));

    let content = fs::read_to_string(store.result_path(BatchId(1))).unwrap();
    assert_eq!(
        content,
        "raw_text,category,confidence,reason\nAcme Corp,Company,95,matches keyword\n"
    );

    let results = store.load_results().await.unwrap().items;
    let report = verify(&results, &VerifyConfig::default());
    assert!(report.is_empty());

    let merged = merge_results(results);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].row.raw_text, "Acme Corp");
    assert_eq!(merged[0].source_batch, BatchId(1));
}

#[tokio::test]
async fn test_ten_batches_with_limit_three_isolate_failure() {
    let backend = MockBackend::new()
        .with_max_concurrency(3)
        .with_latency(Duration::from_millis(25))
        .with_default_response("")
        .with_failure("field_7", MockFailure::Network);
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Dispatcher::new(Arc::new(backend.clone()), store.clone(), fast_config());

    let batches: Vec<Batch> = (1..=10)
        .map(|i| Batch::new(BatchId(i), vec![format!("field_{i}")]))
        .collect();
    let summary = dispatcher.run(batches, TEMPLATE).await.unwrap();

    assert_eq!(summary.total(), 10);
    assert_eq!(summary.success_count, 9);
    assert_eq!(summary.failure_count, 1);
    assert_eq!(summary.failed_batches, vec![BatchId(7)]);
    assert!(summary.workers <= 3);
    assert!(backend.peak_in_flight() <= 3);
    assert_eq!(store.result_count(), 9);
    assert!(store.result(BatchId(7)).is_none());
}

#[tokio::test]
async fn test_shared_limited_backend_caps_concurrent_runs() {
    let mock = MockBackend::new()
        .with_max_concurrency(8)
        .with_latency(Duration::from_millis(20));
    let backend = Arc::new(ConcurrencyLimited::with_limit(mock.clone(), 2).unwrap());

    // Two dispatchers share one backend; the wrapper still holds the line
    let first = Dispatcher::new(backend.clone(), Arc::new(MemoryStore::new()), fast_config());
    let second = Dispatcher::new(backend.clone(), Arc::new(MemoryStore::new()), fast_config());

    let make = |offset: u32| -> Vec<Batch> {
        (1..=5)
            .map(|i| Batch::new(BatchId(offset + i), vec![format!("f{}", offset + i)]))
            .collect()
    };
    let (a, b) = tokio::join!(
        first.run(make(0), TEMPLATE),
        second.run(make(100), TEMPLATE)
    );

    assert_eq!(a.unwrap().success_count + b.unwrap().success_count, 10);
    assert!(mock.peak_in_flight() <= 2);
}

#[tokio::test]
async fn test_raw_files_to_batches() {
    let dir = TempDir::new().unwrap();
    let raw = dir.path().join("raw");
    fs::create_dir_all(&raw).unwrap();
    fs::write(raw.join("a.txt"), "Acme Corp\nhello x -- hello\n").unwrap();
    fs::write(raw.join("b.txt"), "Globex Inc Acme\n").unwrap();

    let tokens = ingest(&[&raw]).unwrap();
    let batches =
        normalize_and_batch(tokens, &FieldConfig::default().with_batch_size(2)).unwrap();

    let fields: Vec<Vec<String>> = batches.iter().map(|b| b.fields().to_vec()).collect();
    assert_eq!(
        fields,
        vec![
            vec!["Acme".to_string(), "Corp".to_string()],
            vec!["hello".to_string(), "Globex".to_string()],
            vec!["Inc".to_string()],
        ]
    );

    let store = CsvStore::new(dir.path().join("batches"), dir.path().join("results"));
    for batch in &batches {
        store.put_batch(batch).await.unwrap();
    }
    let reloaded = store.load_batches().await.unwrap();
    assert_eq!(reloaded.items, batches);
}

#[tokio::test]
async fn test_low_confidence_rows_are_reported() {
    let backend = Arc::new(MockBackend::new().with_default_response(
        "Initech Corp\tProduct\t90\tlooks like a product\nwidget\tProduct\t45\tunsure",
    ));
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Dispatcher::new(backend, store.clone(), fast_config());

    dispatcher
        .run(vec![batch(3, &["Initech Corp", "widget"])], TEMPLATE)
        .await
        .unwrap();

    let results = store.load_results().await.unwrap().items;
    let report = verify(&results, &VerifyConfig::default());

    assert_eq!(report.len(), 2);
    assert_eq!(report.count(ProblemKind::CompanyKeywordConflict), 1);
    assert_eq!(report.count(ProblemKind::LowConfidence), 1);
    assert!(report.problems.iter().all(|p| p.source_batch == BatchId(3)));
}
