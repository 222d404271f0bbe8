//! Pipeline stages driven by the CLI.
//!
//! Each stage reads its inputs from disk and writes its outputs back, so
//! stages can be run one at a time or chained by `run`.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use field_classifier::{
    extract_strings, ingest, load_template, merge_results, normalize_and_batch,
    pipeline::{
        write_strings, MERGED_FILE, MERGED_HEADERS, PROBLEMS_FILE, PROBLEM_HEADERS, STRINGS_FILE,
    },
    stores::csv::write_rows,
    verify, BatchOutcome, BatchStatus, BatchStore, CsvStore, Dispatcher, LlmBackend,
    ProblemKind, ProblemReport, ResultStore, StringsReport, Summary,
};

use crate::config::Config;

fn csv_store(config: &Config) -> CsvStore {
    CsvStore::new(&config.batch_save_path, &config.classify_save_path)
}

/// Read raw files, then write fresh batch files. Returns the batch count.
pub async fn preprocess(config: &Config) -> Result<usize> {
    let tokens = ingest(&[&config.raw_files_path])
        .with_context(|| format!("Failed to read {}", config.raw_files_path.display()))?;
    let batches = normalize_and_batch(tokens, &config.classifier.fields)?;

    let store = csv_store(config);
    store.clear_batches().await?;
    for batch in &batches {
        store.put_batch(batch).await?;
    }

    let fields: usize = batches.iter().map(|b| b.len()).sum();
    println!(
        "{} {} fields in {} batches → {}",
        "✓".green(),
        fields,
        batches.len(),
        config.batch_save_path.display()
    );
    Ok(batches.len())
}

/// Classify every stored batch with `backend`.
///
/// Fails only on fatal errors (template, unreadable batch directory).
/// Per-batch failures are reported in the returned summary.
pub async fn classify(config: &Config, backend: Arc<dyn LlmBackend>) -> Result<Summary> {
    let template = load_template(&config.prompt_template_path).with_context(|| {
        format!(
            "Failed to load prompt template {}",
            config.prompt_template_path.display()
        )
    })?;

    let store = Arc::new(csv_store(config));
    let loaded = store.load_batches().await?;
    for error in &loaded.skipped {
        println!("{} {}", "⚠".yellow(), error);
    }
    if loaded.items.is_empty() {
        println!(
            "{}",
            "No batches found. Run `field-classify preprocess` first.".yellow()
        );
        let summary = Summary::default();
        print_summary(&summary);
        return Ok(summary);
    }

    // Results from an earlier run would otherwise leak into verify and merge
    store.clear_results().await?;

    let dispatcher = Dispatcher::new(backend, store, config.classifier.clone())
        .with_progress(print_outcome);
    let summary = dispatcher.run_with_template(loaded.items, template).await;

    print_summary(&summary);
    Ok(summary)
}

fn print_outcome(outcome: &BatchOutcome) {
    let elapsed = format!("{:.1}s", outcome.elapsed.as_secs_f64());
    match &outcome.status {
        BatchStatus::Succeeded { rows, stats } => println!(
            "  {} {:<12} {:>4} rows  {:>3} dropped  {}",
            "✓".green(),
            outcome.batch_id.to_string(),
            rows,
            stats.malformed + stats.unmatched + stats.duplicates,
            elapsed.dimmed()
        ),
        BatchStatus::Failed(error) => println!(
            "  {} {:<12} {}  {}",
            "✗".red(),
            outcome.batch_id.to_string(),
            error.to_string().red(),
            elapsed.dimmed()
        ),
    }
}

fn print_summary(summary: &Summary) {
    println!();
    println!("{}", "Classification summary".bold());
    println!("  Batches:   {}", summary.total());
    println!("  Succeeded: {}", summary.success_count.to_string().green());
    if summary.failure_count > 0 {
        let failed: Vec<String> = summary.failed_batches.iter().map(|id| id.to_string()).collect();
        println!(
            "  Failed:    {} ({})",
            summary.failure_count.to_string().red(),
            failed.join(", ")
        );
    } else {
        println!("  Failed:    0");
    }
    println!("  Empty:     {}", summary.empty_count);
    println!("  Rows:      {}", summary.total_rows);
    println!("  Workers:   {}", summary.workers);
    println!("  Elapsed:   {:.1}s", summary.elapsed.as_secs_f64());
}

/// Check stored results and write the problem report.
pub async fn verify_results(config: &Config) -> Result<ProblemReport> {
    let results = csv_store(config).load_results().await?.items;
    let report = verify(&results, &config.classifier.verify);

    clear_dir(&config.problem_save_path)?;
    let path = config.problem_save_path.join(PROBLEMS_FILE);
    write_rows(&path, PROBLEM_HEADERS, &report.records())?;

    if report.is_empty() {
        println!(
            "{} {} rows checked, no problems found",
            "✓".green(),
            report.rows_checked
        );
    } else {
        println!(
            "{} {} of {} rows need review across {} batches → {}",
            "⚠".yellow(),
            report.len(),
            report.rows_checked,
            report.batches_with_problems,
            path.display()
        );
        for kind in [ProblemKind::CompanyKeywordConflict, ProblemKind::LowConfidence] {
            println!("  {:<26} {}", kind.as_str(), report.count(kind));
        }
    }
    Ok(report)
}

/// Merge stored results into one sorted file. Returns the row count.
pub async fn merge(config: &Config) -> Result<usize> {
    let results = csv_store(config).load_results().await?.items;
    let merged = merge_results(results);

    let path = config.classify_save_path.join(MERGED_FILE);
    let records: Vec<_> = merged.iter().map(|row| row.to_record()).collect();
    write_rows(&path, MERGED_HEADERS, &records)?;

    println!("{} {} rows → {}", "✓".green(), merged.len(), path.display());
    Ok(merged.len())
}

/// Extract strings from binaries under `root` and write them to `output`.
pub fn extract(root: &Path, output: &Path) -> Result<StringsReport> {
    let report = extract_strings(root)?;
    write_strings(output, &report.strings)?;

    println!(
        "{} {} unique strings from {} binaries ({} files scanned) → {}",
        "✓".green(),
        report.strings.len(),
        report.binaries,
        report.files_scanned,
        output.display()
    );
    Ok(report)
}

/// Default output path for `extract-strings`.
pub fn default_strings_output(config: &Config) -> PathBuf {
    config.raw_files_path.join(STRINGS_FILE)
}

/// Remove every file directly inside `dir`, creating it if missing.
fn clear_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use field_classifier::MockBackend;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let root = dir.path();
        let template = root.join("prompt.txt");
        fs::write(&template, "Classify:\n{{fields_text}}").unwrap();

        let vars: HashMap<&str, String> = [
            ("RAW_FILES_PATH", root.join("raw")),
            ("BATCH_SAVE_PATH", root.join("batches")),
            ("CLASSIFY_SAVE_PATH", root.join("results")),
            ("PROBLEM_SAVE_PATH", root.join("problems")),
            ("PROMPT_TEMPLATE_PATH", template),
        ]
        .into_iter()
        .map(|(k, v)| (k, v.display().to_string()))
        .chain([
            ("BATCH_SIZE", "2".to_string()),
            ("MAX_RETRY_COUNT", "0".to_string()),
        ])
        .collect();

        Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    #[tokio::test]
    async fn test_stages_end_to_end() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        fs::create_dir_all(&config.raw_files_path).unwrap();
        fs::write(
            config.raw_files_path.join("fields.txt"),
            "Acme Corp\nwidget widget\n",
        )
        .unwrap();

        assert_eq!(preprocess(&config).await.unwrap(), 2);

        let backend = MockBackend::new()
            .with_response(
                "1. Acme",
                "Acme\tBrand\t90\tknown brand\nCorp\tProduct\t70\tguess",
            )
            .with_response("1. widget", "widget\tUnclassified\t10\tno idea");
        let summary = classify(&config, Arc::new(backend)).await.unwrap();
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.empty_count, 1);
        assert_eq!(summary.total_rows, 2);

        let report = verify_results(&config).await.unwrap();
        // "Corp" carries a company keyword but was not labeled a company
        assert_eq!(report.len(), 1);
        let problems =
            fs::read_to_string(config.problem_save_path.join(PROBLEMS_FILE)).unwrap();
        assert!(problems.starts_with("source_batch,raw_text,category,confidence,reason,problem_type\n"));
        assert!(problems.contains("result_batch_1.csv,Corp,Product,70,guess,company_keyword_conflict"));

        assert_eq!(merge(&config).await.unwrap(), 2);
        let merged = fs::read_to_string(config.classify_save_path.join(MERGED_FILE)).unwrap();
        assert_eq!(
            merged,
            "source_batch,raw_text,category,confidence,reason\n\
             1,Acme,Brand,90,known brand\n\
             1,Corp,Product,70,guess\n"
        );
    }

    #[tokio::test]
    async fn test_classify_missing_template_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.prompt_template_path = dir.path().join("missing.txt");

        let backend = MockBackend::new();
        assert!(classify(&config, Arc::new(backend.clone())).await.is_err());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_classify_without_batches_keeps_previous_results() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        fs::create_dir_all(&config.classify_save_path).unwrap();
        let previous = config.classify_save_path.join("result_batch_1.csv");
        fs::write(&previous, "raw_text,category,confidence,reason
Acme,Brand,90,x
").unwrap();

        let backend = MockBackend::new();
        let summary = classify(&config, Arc::new(backend.clone())).await.unwrap();

        assert_eq!(summary.total(), 0);
        assert!(backend.calls().is_empty());
        assert!(previous.exists());
    }

    #[tokio::test]
    async fn test_preprocess_missing_input_is_error() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        assert!(preprocess(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_verify_clears_old_problem_files() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        fs::create_dir_all(&config.problem_save_path).unwrap();
        fs::write(config.problem_save_path.join("stale.csv"), "old").unwrap();

        let report = verify_results(&config).await.unwrap();
        assert!(report.is_empty());
        assert!(!config.problem_save_path.join("stale.csv").exists());
        assert!(config.problem_save_path.join(PROBLEMS_FILE).exists());
    }
}
