//! Binary strings extraction: the usual source of raw input tokens.
//!
//! Walks a directory, picks out executables by their magic bytes, pulls
//! printable runs out of them the way `strings` does, and cleans each run
//! down to alphabetic words.

use regex::Regex;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::error::{ClassifyError, Result};
use crate::pipeline::fields::walk_files;

/// Shortest printable run worth keeping.
pub const MIN_RUN_LENGTH: usize = 4;

/// Default output file name for extracted strings.
pub const STRINGS_FILE: &str = "strings_all_binary.txt";

static NON_LETTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-zA-Z]").unwrap());

const MAGICS: &[&[u8]] = &[
    b"\x7fELF",
    b"MZ",
    b"\xfe\xed\xfa\xce",
    b"\xfe\xed\xfa\xcf",
    b"\xce\xfa\xed\xfe",
    b"\xcf\xfa\xed\xfe",
    b"\xca\xfe\xba\xbe",
    b"#!",
];

/// Whether `header` starts with a known executable magic.
pub fn is_executable(header: &[u8]) -> bool {
    MAGICS.iter().any(|magic| header.starts_with(magic))
}

fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut header = Vec::with_capacity(4);
    std::fs::File::open(path)?.take(4).read_to_end(&mut header)?;
    Ok(header)
}

fn is_printable(byte: u8) -> bool {
    byte == b'\t' || (0x20..=0x7e).contains(&byte)
}

/// Printable ASCII runs of at least `min_len` bytes.
pub fn printable_runs(data: &[u8], min_len: usize) -> Vec<&str> {
    data.split(|b| !is_printable(*b))
        .filter(|run| run.len() >= min_len)
        // Printable ASCII is always valid UTF-8
        .filter_map(|run| std::str::from_utf8(run).ok())
        .collect()
}

/// Replace every run of three or more identical characters with one space.
fn blank_repeats(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let mut j = i + 1;
        while j < chars.len() && chars[j] == chars[i] {
            j += 1;
        }
        if j - i >= 3 {
            out.push(' ');
        } else {
            out.extend(&chars[i..j]);
        }
        i = j;
    }
    out
}

fn has_two_distinct(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => chars.any(|c| c != first),
        None => false,
    }
}

/// Clean one printable run into candidate words.
///
/// Non-letters become spaces, runs of 3+ identical characters become a
/// space, and only words with at least two distinct letters are kept.
pub fn clean_run(run: &str) -> Vec<String> {
    let letters = NON_LETTER.replace_all(run.trim_matches([' ', '\t']), " ");
    blank_repeats(&letters)
        .split(' ')
        .filter(|part| part.len() > 1 && has_two_distinct(part))
        .map(str::to_string)
        .collect()
}

/// Cleaned words from one binary's contents.
pub fn strings_in(data: &[u8]) -> BTreeSet<String> {
    printable_runs(data, MIN_RUN_LENGTH)
        .into_iter()
        .flat_map(clean_run)
        .collect()
}

/// Result of scanning a directory for binaries.
#[derive(Debug, Clone, Default)]
pub struct StringsReport {
    /// Unique words, sorted ascending
    pub strings: BTreeSet<String>,
    pub files_scanned: usize,
    pub binaries: usize,
    pub skipped: usize,
}

/// Extract cleaned strings from every executable under `root`.
pub fn extract_strings(root: impl AsRef<Path>) -> Result<StringsReport> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(ClassifyError::file_io(
            root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }

    let mut report = StringsReport::default();
    for path in walk_files(root) {
        report.files_scanned += 1;

        let header = match read_header(&path) {
            Ok(header) => header,
            Err(e) => {
                warn!(error = %ClassifyError::file_io(&path, e), "Skipping unreadable file");
                report.skipped += 1;
                continue;
            }
        };
        if !is_executable(&header) {
            continue;
        }

        match std::fs::read(&path) {
            Ok(data) => {
                let found = strings_in(&data);
                report.binaries += 1;
                debug!(path = %path.display(), strings = found.len(), "Scanned binary");
                report.strings.extend(found);
            }
            Err(e) => {
                warn!(error = %ClassifyError::file_io(&path, e), "Skipping unreadable binary");
                report.skipped += 1;
            }
        }
    }

    info!(
        root = %root.display(),
        files = report.files_scanned,
        binaries = report.binaries,
        unique_strings = report.strings.len(),
        "String extraction complete"
    );
    Ok(report)
}

/// Write one string per line.
pub fn write_strings(path: impl AsRef<Path>, strings: &BTreeSet<String>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ClassifyError::file_io(parent, e))?;
    }
    let body = strings.iter().map(String::as_str).collect::<Vec<_>>().join("\n");
    std::fs::write(path, body).map_err(|e| ClassifyError::file_io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_magic_detection() {
        assert!(is_executable(b"\x7fELF\x02\x01"));
        assert!(is_executable(b"MZ\x90\x00"));
        assert!(is_executable(b"\xcf\xfa\xed\xfe"));
        assert!(is_executable(b"#!/bin/sh"));
        assert!(!is_executable(b"hello"));
        assert!(!is_executable(b""));
    }

    #[test]
    fn test_printable_runs_need_four_bytes() {
        let data = b"\x00abc\x00abcd\x01Acme Corp\xff";
        assert_eq!(printable_runs(data, 4), vec!["abcd", "Acme Corp"]);
    }

    #[test]
    fn test_clean_run_strips_noise() {
        assert_eq!(clean_run("  libc.so.6\t"), vec!["libc", "so"]);
        assert_eq!(clean_run("Acme_Corp-2024"), vec!["Acme", "Corp"]);
        // Repeated letters and single-letter words vanish
        assert_eq!(clean_run("aaaa x zz GLIBC"), vec!["GLIBC"]);
        assert!(clean_run("AAAAAA").is_empty());
    }

    #[test]
    fn test_repeat_run_splits_word() {
        assert_eq!(blank_repeats("abbbc"), "a c");
        assert_eq!(blank_repeats("abbc"), "abbc");
    }

    #[test]
    fn test_extract_only_reads_executables() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("bin")).unwrap();
        fs::write(
            dir.path().join("bin").join("app"),
            b"\x7fELF\x00\x00printf\x00Acme Corp Ltd\x00",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "plain text words here").unwrap();

        let report = extract_strings(dir.path()).unwrap();

        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.binaries, 1);
        let words: Vec<&str> = report.strings.iter().map(String::as_str).collect();
        assert_eq!(words, vec!["Acme", "Corp", "Ltd", "printf"]);
    }

    #[test]
    fn test_write_strings_one_per_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join(STRINGS_FILE);
        let strings: BTreeSet<String> = ["beta", "alpha"].iter().map(|s| s.to_string()).collect();

        write_strings(&path, &strings).unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), "alpha\nbeta");
    }

    #[test]
    fn test_extract_requires_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f");
        fs::write(&file, "x").unwrap();
        assert!(extract_strings(&file).is_err());
    }
}
