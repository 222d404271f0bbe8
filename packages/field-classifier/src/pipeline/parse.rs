//! Response parser and reconciler.
//!
//! Turns the raw tab-delimited LLM output into a `BatchResult`:
//! parse each line, join the parsed rows onto the batch fields by raw text,
//! then drop rows without a usable category. Pure: the same response and
//! batch always produce the same result.

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::types::{
    classification::{BatchResult, ClassificationRow, ParseStats},
    config::FilterConfig,
    field::Batch,
};

/// Two-character escape some models emit instead of a real tab.
const ESCAPED_TAB: &str = "\\t";

/// Split a line into its four trimmed columns.
///
/// A line with a literal tab is split on tabs only; the escaped form is a
/// fallback for lines without one.
fn split_columns(line: &str) -> Option<[&str; 4]> {
    if line.contains('\t') {
        split_exact(line, "\t")
    } else {
        split_exact(line, ESCAPED_TAB)
    }
}

fn split_exact<'a>(line: &'a str, delimiter: &str) -> Option<[&'a str; 4]> {
    let mut parts = line.split(delimiter);
    let columns = [parts.next()?, parts.next()?, parts.next()?, parts.next()?];
    if parts.next().is_some() {
        return None;
    }
    Some(columns.map(str::trim))
}

/// Normalize a confidence column to 0..=100.
///
/// A trailing `%` is ignored, decimals are rounded and out-of-range values
/// clamped. Anything non-numeric becomes 0 so verification flags the row.
fn parse_confidence(value: &str) -> u8 {
    let number = value.trim_end_matches('%').trim();
    match number.parse::<f64>() {
        Ok(n) if n.is_finite() => n.round().clamp(0.0, 100.0) as u8,
        _ => 0,
    }
}

/// Parse one response line into a row, or `None` if it is malformed.
pub fn parse_line(line: &str) -> Option<ClassificationRow> {
    let [raw_text, category, confidence, reason] = split_columns(line)?;
    Some(ClassificationRow {
        raw_text: raw_text.to_string(),
        category: category.to_string(),
        confidence: parse_confidence(confidence),
        reason: reason.to_string(),
    })
}

/// Reconcile a raw LLM response with the batch it answers.
///
/// Rows are emitted in batch field order. A field gets a row only when the
/// response has a well-formed line for it and the category passes `filter`.
/// The first well-formed line for a raw text wins; later repeats are counted
/// as duplicates.
pub fn parse_and_merge(raw_response: &str, batch: &Batch, filter: &FilterConfig) -> BatchResult {
    let mut stats = ParseStats::default();
    let mut parsed: HashMap<&str, ClassificationRow> = HashMap::new();

    for line in raw_response.lines().filter(|l| !l.trim().is_empty()) {
        stats.lines += 1;

        let Some(row) = parse_line(line) else {
            stats.malformed += 1;
            continue;
        };

        // Key by the batch's own string so lookups below borrow nothing from `row`
        let Some(field) = batch.fields().iter().find(|f| **f == row.raw_text) else {
            stats.unmatched += 1;
            continue;
        };

        if parsed.contains_key(field.as_str()) {
            stats.duplicates += 1;
        } else {
            parsed.insert(field.as_str(), row);
        }
    }

    let mut rows = Vec::with_capacity(parsed.len());
    for field in batch.fields() {
        match parsed.remove(field.as_str()) {
            Some(row) if filter.accepts(&row.category) => rows.push(row),
            Some(_) => stats.filtered += 1,
            None => stats.missing += 1,
        }
    }

    if stats.lines > 0 && stats.malformed == stats.lines {
        warn!(
            batch_id = %batch.id(),
            lines = stats.lines,
            "Every response line was malformed"
        );
    } else {
        debug!(
            batch_id = %batch.id(),
            lines = stats.lines,
            malformed = stats.malformed,
            unmatched = stats.unmatched,
            duplicates = stats.duplicates,
            missing = stats.missing,
            filtered = stats.filtered,
            rows = rows.len(),
            "Reconciled response with batch"
        );
    }

    BatchResult {
        batch_id: batch.id(),
        rows,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::field::BatchId;

    fn batch(fields: &[&str]) -> Batch {
        Batch::new(BatchId(1), fields.iter().map(|f| f.to_string()).collect())
    }

    #[test]
    fn test_acme_scenario() {
        let batch = batch(&["Acme Corp", "xk29qz", "hello"]);
        let response = "Acme Corp\tCompany\t95\tmatches keyword\nxk29qz\tUnclassified\t40\tno match";

        let result = parse_and_merge(response, &batch, &FilterConfig::default());

        assert_eq!(result.rows.len(), 1);
        let row = result.row("Acme Corp").unwrap();
        assert_eq!(row.category, "Company");
        assert_eq!(row.confidence, 95);
        assert_eq!(row.reason, "matches keyword");
        assert!(result.row("xk29qz").is_none());
        assert!(result.row("hello").is_none());
        assert_eq!(result.stats.filtered, 1);
        assert_eq!(result.stats.missing, 1);
    }

    #[test]
    fn test_malformed_lines_contribute_nothing() {
        let batch = batch(&["alpha", "beta", "gamma"]);
        let response = "alpha\tCompany\t90\n\
                        beta\tProduct\t80\tok\textra\n\
                        gamma Product 80 ok";

        let result = parse_and_merge(response, &batch, &FilterConfig::default());

        assert!(result.is_empty());
        assert_eq!(result.stats.lines, 3);
        assert_eq!(result.stats.malformed, 3);
        assert_eq!(result.stats.missing, 3);
    }

    #[test]
    fn test_foreign_rows_are_never_introduced() {
        let batch = batch(&["alpha"]);
        let response = "alpha\tProduct\t70\tok\nintruder\tCompany\t99\tnot in batch";

        let result = parse_and_merge(response, &batch, &FilterConfig::default());

        assert_eq!(result.rows.len(), 1);
        assert!(result.rows.iter().all(|r| batch.contains(&r.raw_text)));
        assert_eq!(result.stats.unmatched, 1);
    }

    #[test]
    fn test_escaped_tab_fallback_and_trimming() {
        let batch = batch(&["Acme Corp"]);
        let response = "  Acme Corp \\t Company \\t 88 \\t  keyword  ";

        let result = parse_and_merge(response, &batch, &FilterConfig::default());

        let row = result.row("Acme Corp").unwrap();
        assert_eq!(row.category, "Company");
        assert_eq!(row.confidence, 88);
        assert_eq!(row.reason, "keyword");
    }

    #[test]
    fn test_literal_tab_preferred_over_escape() {
        // Splits into 4 on real tabs; the escape inside the reason stays text
        let line = "path\tPath\t60\tcontains \\t escape";
        let row = parse_line(line).unwrap();
        assert_eq!(row.reason, "contains \\t escape");
    }

    #[test]
    fn test_literal_tab_line_never_falls_back() {
        // Splits into four on the escape, but the real tab rules it out
        assert!(parse_line("a\ta\\tCompany\\t90\\tx").is_none());
        assert!(parse_line("aa\\tCompany\\t90\\tx").is_some());
    }

    #[test]
    fn test_confidence_is_normalized() {
        let confidence = |c: &str| parse_line(&format!("aa\tCompany\t{c}\tx")).unwrap().confidence;
        assert_eq!(confidence("95"), 95);
        assert_eq!(confidence("95%"), 95);
        assert_eq!(confidence(" 87 %"), 87);
        assert_eq!(confidence("72.6"), 73);
        assert_eq!(confidence("0.9"), 1);
        assert_eq!(confidence("101"), 100);
        assert_eq!(confidence("-1"), 0);
    }

    #[test]
    fn test_non_numeric_confidence_keeps_row_at_zero() {
        let row = parse_line("aa\tCompany\thigh\tnot a number").unwrap();
        assert_eq!(row.confidence, 0);
        assert_eq!(row.reason, "not a number");
    }

    #[test]
    fn test_odd_confidence_rows_are_kept() {
        let batch = batch(&["Acme", "Globex"]);
        let response = "Acme\tCompany\t95%\tkw\nGlobex\tCompany\t0.9\tkw";

        let result = parse_and_merge(response, &batch, &FilterConfig::default());

        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.stats.malformed, 0);
        assert_eq!(result.row("Acme").unwrap().confidence, 95);
        assert_eq!(result.row("Globex").unwrap().confidence, 1);
    }

    #[test]
    fn test_first_duplicate_wins() {
        let batch = batch(&["alpha"]);
        let response = "alpha\tCompany\t90\tfirst\nalpha\tProduct\t50\tsecond";

        let result = parse_and_merge(response, &batch, &FilterConfig::default());

        assert_eq!(result.row("alpha").unwrap().reason, "first");
        assert_eq!(result.stats.duplicates, 1);
    }

    #[test]
    fn test_rows_follow_batch_order() {
        let batch = batch(&["one", "two", "three"]);
        let response = "three\tNumber\t90\tx\none\tNumber\t90\tx\ntwo\tNumber\t90\tx";

        let result = parse_and_merge(response, &batch, &FilterConfig::default());

        let order: Vec<&str> = result.rows.iter().map(|r| r.raw_text.as_str()).collect();
        assert_eq!(order, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_empty_response_is_empty_result() {
        let batch = batch(&["alpha"]);
        let result = parse_and_merge("", &batch, &FilterConfig::default());
        assert!(result.is_empty());
        assert_eq!(result.stats.lines, 0);
        assert_eq!(result.stats.missing, 1);
    }

    #[test]
    fn test_blank_category_is_filtered() {
        let batch = batch(&["alpha", "beta"]);
        let response = "alpha\t \t90\tx\nbeta\t无法识别\t20\tx";

        let result = parse_and_merge(response, &batch, &FilterConfig::default());

        assert!(result.is_empty());
        assert_eq!(result.stats.filtered, 2);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let batch = batch(&["Acme Corp", "hello"]);
        let response = "Acme Corp\tCompany\t95\tkw\nhello\tGreeting\t85\tword\ngarbage";
        let filter = FilterConfig::default();

        assert_eq!(
            parse_and_merge(response, &batch, &filter),
            parse_and_merge(response, &batch, &filter)
        );
    }
}
