//! Post-fusion cleanup: trimming chunk whitespace, coalescing overlapping
//! same-file hits, and producing the compact wire representation.

use crate::hybrid_search::FusedResult;
use serde::Serialize;
use std::collections::HashMap;

/// Trim leading/trailing blank lines from a chunk's text without disturbing
/// internal indentation or internal blank lines. Idempotent.
pub fn trim_chunk_whitespace(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.iter().position(|l| !l.trim().is_empty()).unwrap_or(lines.len());
    let end = lines.iter().rposition(|l| !l.trim().is_empty()).map(|i| i + 1).unwrap_or(0);
    if start >= end {
        String::new()
    } else {
        lines[start..end].join("\n")
    }
}

/// Group results by path, sort by `start_line`, and merge rows whose line
/// ranges overlap or are separated by at most one line. Merged score is the
/// max of the group; merged text deduplicates the overlapping lines.
pub fn deduplicate_same_file_results(results: Vec<FusedResult>) -> Vec<FusedResult> {
    let mut by_path: HashMap<String, Vec<FusedResult>> = HashMap::new();
    for r in results {
        by_path.entry(r.path.clone()).or_default().push(r);
    }

    let mut merged_all = Vec::new();
    for (_, mut group) in by_path {
        group.sort_by_key(|r| r.start_line);
        let mut merged: Vec<FusedResult> = Vec::new();
        for r in group {
            match merged.last_mut() {
                Some(prev) if r.start_line <= prev.end_line + 1 => {
                    prev.text = merge_overlapping_text(prev, &r);
                    prev.end_line = prev.end_line.max(r.end_line);
                    prev.score = prev.score.max(r.score);
                }
                _ => merged.push(r),
            }
        }
        merged_all.extend(merged);
    }

    merged_all.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    merged_all
}

/// Append `next`'s lines to `prev`'s, skipping the lines `next` shares with
/// `prev` by virtue of the overlapping line range.
fn merge_overlapping_text(prev: &FusedResult, next: &FusedResult) -> String {
    if next.end_line <= prev.end_line {
        return prev.text.clone();
    }
    let overlap_lines = prev.end_line.saturating_sub(next.start_line) + 1;
    let next_lines: Vec<&str> = next.text.lines().collect();
    let fresh = if overlap_lines < next_lines.len() { &next_lines[overlap_lines..] } else { &[] };
    if fresh.is_empty() {
        prev.text.clone()
    } else {
        format!("{}\n{}", prev.text, fresh.join("\n"))
    }
}

/// Compact wire form: `l` (`"<path>:<start>-<end>"`), `r` (relative path),
/// `n` (raw text), `ms` (score, rounded to 2 decimals), `w` (trimmed text).
#[derive(Serialize)]
pub struct CompactResult {
    pub l: String,
    pub r: String,
    pub n: String,
    pub ms: f32,
    pub w: String,
}

pub fn to_compact(result: &FusedResult) -> CompactResult {
    CompactResult {
        l: format!("{}:{}-{}", result.path, result.start_line, result.end_line),
        r: result.path.clone(),
        n: result.text.clone(),
        ms: (result.score * 100.0).round() / 100.0,
        w: trim_chunk_whitespace(&result.text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fused(path: &str, start: usize, end: usize, score: f32, text: &str) -> FusedResult {
        FusedResult { id: format!("{path}#{start}-{end}"), path: path.into(), start_line: start, end_line: end, text: text.into(), score }
    }

    #[test]
    fn trims_leading_and_trailing_blank_lines_only() {
        let trimmed = trim_chunk_whitespace("\n\n  fn a() {\n    1\n  }\n\n");
        assert_eq!(trimmed, "  fn a() {\n    1\n  }");
    }

    #[test]
    fn trim_is_idempotent() {
        let once = trim_chunk_whitespace("\n\nbody\n\n");
        let twice = trim_chunk_whitespace(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn internal_blank_lines_survive_trim() {
        let trimmed = trim_chunk_whitespace("a\n\nb");
        assert_eq!(trimmed, "a\n\nb");
    }

    #[test]
    fn adjacent_chunks_merge_with_max_score() {
        let results = vec![
            fused("a.rs", 1, 5, 0.5, "l1\nl2\nl3\nl4\nl5"),
            fused("a.rs", 6, 10, 0.9, "l6\nl7\nl8\nl9\nl10"),
        ];
        let merged = deduplicate_same_file_results(results);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].start_line, 1);
        assert_eq!(merged[0].end_line, 10);
        assert_eq!(merged[0].score, 0.9);
    }

    #[test]
    fn overlapping_chunks_merge_and_dedupe_shared_lines() {
        let results = vec![
            fused("a.rs", 1, 3, 0.4, "l1\nl2\nl3"),
            fused("a.rs", 2, 5, 0.6, "l2\nl3\nl4\nl5"),
        ];
        let merged = deduplicate_same_file_results(results);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "l1\nl2\nl3\nl4\nl5");
    }

    #[test]
    fn far_apart_chunks_in_same_file_stay_separate() {
        let results = vec![fused("a.rs", 1, 3, 0.4, "x"), fused("a.rs", 100, 103, 0.6, "y")];
        let merged = deduplicate_same_file_results(results);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn compact_form_has_expected_keys_and_values() {
        let r = fused("a.rs", 1, 5, 0.666, "\n\nbody\n\n");
        let compact = to_compact(&r);
        assert_eq!(compact.l, "a.rs:1-5");
        assert_eq!(compact.r, "a.rs");
        assert_eq!(compact.ms, 0.67);
        assert_eq!(compact.w, "body");
    }
}
