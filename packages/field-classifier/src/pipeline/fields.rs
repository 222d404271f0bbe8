//! Field store: raw token ingestion, normalization and batching.

use indexmap::IndexSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{ClassifyError, Result};
use crate::types::{
    config::FieldConfig,
    field::{Batch, BatchId},
};

/// Read every file under `paths` and split it into whitespace-separated tokens.
///
/// Directories are walked recursively with entries sorted by file name, so
/// the token order is stable across runs. Files that cannot be read as UTF-8
/// are logged and skipped. A path that does not exist is an error.
pub fn ingest<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut files_read = 0usize;
    let mut files_skipped = 0usize;

    for root in paths {
        let root = root.as_ref();
        if !root.exists() {
            return Err(ClassifyError::file_io(
                root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "input path does not exist"),
            ));
        }

        for file in walk_files(root) {
            match std::fs::read_to_string(&file) {
                Ok(content) => {
                    let before = tokens.len();
                    tokens.extend(content.split_whitespace().map(str::to_string));
                    files_read += 1;
                    info!(
                        path = %file.display(),
                        tokens = tokens.len() - before,
                        "Read input file"
                    );
                }
                Err(e) => {
                    files_skipped += 1;
                    warn!(
                        error = %ClassifyError::file_io(&file, e),
                        "Skipping unreadable input file"
                    );
                }
            }
        }
    }

    if files_read == 0 {
        warn!("No readable input files found");
    }
    info!(
        files_read = files_read,
        files_skipped = files_skipped,
        tokens = tokens.len(),
        "Ingest complete"
    );

    Ok(tokens)
}

/// Files under `root` in sorted traversal order (or `root` itself if it is a file).
pub(crate) fn walk_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) if entry.file_type().is_file() => Some(entry.into_path()),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read directory entry");
                None
            }
        })
        .collect()
}

/// Whether a token is worth classifying.
///
/// Length is counted in characters, not bytes.
pub fn is_valid_field(token: &str, min_length: usize) -> bool {
    token.chars().count() >= min_length && token.chars().any(char::is_alphanumeric)
}

/// Filter, deduplicate and partition tokens into batches.
///
/// Deduplication keeps the first occurrence of each token, so batch contents
/// are reproducible for a given input order. Batch ids start at 1, every
/// batch except the last holds exactly `batch_size` fields, and no empty
/// batch is produced.
pub fn normalize_and_batch<I, S>(tokens: I, config: &FieldConfig) -> Result<Vec<Batch>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    if config.batch_size == 0 {
        return Err(ClassifyError::Config("batch size must be at least 1".into()));
    }

    let mut total = 0usize;
    let mut valid = 0usize;
    let mut unique: IndexSet<String> = IndexSet::new();

    for token in tokens {
        total += 1;
        let token = token.into();
        if is_valid_field(&token, config.min_length) {
            valid += 1;
            unique.insert(token);
        }
    }

    let fields: Vec<String> = unique.into_iter().collect();
    let batches: Vec<Batch> = fields
        .chunks(config.batch_size)
        .enumerate()
        .map(|(i, chunk)| Batch::new(BatchId(i as u32 + 1), chunk.to_vec()))
        .collect();

    info!(
        tokens = total,
        removed_invalid = total - valid,
        unique_fields = fields.len(),
        batches = batches.len(),
        batch_size = config.batch_size,
        "Normalized fields into batches"
    );

    Ok(batches)
}
