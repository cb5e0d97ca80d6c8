//! Mode validation, per-leg score normalization, and alpha fusion for hybrid
//! (vector + keyword) search.

use crate::error::{ErrorKind, Result, SearchError};
use crate::fulltext_store::FullTextResult;
use crate::vector_store::ScoredChunk;
use std::collections::HashMap;

pub const DEFAULT_ALPHA: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchMode {
    Hybrid,
    Vector,
    Fts,
}

impl SearchMode {
    /// Invalid values fall back to `hybrid` rather than erroring, per the
    /// mode-validation protocol.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("vector") => SearchMode::Vector,
            Some("fts") => SearchMode::Fts,
            Some("hybrid") | None | Some(_) => SearchMode::Hybrid,
        }
    }
}

/// `hybrid` downgrades silently to `vector` when full-text is unavailable;
/// an explicit `fts` request downgrades to `vector` too, but carries a
/// warning the caller must surface.
pub struct ModeDecision {
    pub mode: SearchMode,
    pub warning: Option<&'static str>,
}

pub fn effective_mode(requested: SearchMode, fulltext_available: bool) -> ModeDecision {
    match requested {
        SearchMode::Hybrid if !fulltext_available => {
            ModeDecision { mode: SearchMode::Vector, warning: None }
        }
        SearchMode::Fts if !fulltext_available => {
            ModeDecision { mode: SearchMode::Vector, warning: Some("full-text engine unavailable, fell back to vector search") }
        }
        other => ModeDecision { mode: other, warning: None },
    }
}

pub fn validate_alpha(alpha: Option<f32>) -> Result<f32> {
    let alpha = alpha.unwrap_or(DEFAULT_ALPHA);
    if !(0.0..=1.0).contains(&alpha) {
        return Err(SearchError::new(
            ErrorKind::InvalidRequest,
            format!("alpha must be in [0.0, 1.0], got {alpha}"),
        ));
    }
    Ok(alpha)
}

/// Over-pull window for each leg before fusion: `max(topK*2, 20)`.
pub fn over_pull_limit(top_k: usize) -> usize {
    (top_k.saturating_mul(2)).max(20)
}

#[derive(Clone, Debug, PartialEq)]
pub struct FusedResult {
    pub id: String,
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
    pub score: f32,
}

/// Divide every score by the largest observed raw score in this leg's
/// result set; an all-zero leg maps to all zeros.
fn normalize_by_top(scores: &[(String, f32)]) -> HashMap<String, f32> {
    let top = scores.iter().map(|(_, s)| *s).fold(0.0f32, f32::max);
    scores
        .iter()
        .map(|(id, s)| (id.clone(), if top > 0.0 { s / top } else { 0.0 }))
        .collect()
}

/// Normalize fts raw scores to `[0,1]` by dividing by this query's top raw
/// score (§4.11).
pub fn normalize_fts_scores(fulltext_results: &[FullTextResult]) -> HashMap<String, f32> {
    let scores: Vec<(String, f32)> =
        fulltext_results.iter().map(|r| (r.doc_id.clone(), r.raw_score)).collect();
    normalize_by_top(&scores)
}

/// Fuse vector and keyword legs with `alpha * vector + (1-alpha) * fts`
/// after independently normalizing each leg to `[0,1]` by its own top score.
/// A row missing from one leg contributes zero from that leg.
pub fn fuse(
    vector_results: &[ScoredChunk],
    fulltext_results: &[FullTextResult],
    alpha: f32,
    top_k: usize,
) -> Vec<FusedResult> {
    let vector_scores: Vec<(String, f32)> =
        vector_results.iter().map(|r| (r.record.id.clone(), r.score)).collect();
    let vector_norm = normalize_by_top(&vector_scores);
    let fulltext_norm = normalize_fts_scores(fulltext_results);

    let mut combined: HashMap<String, (f32, Option<(String, usize, usize, String)>)> = HashMap::new();

    for r in vector_results {
        let norm = vector_norm.get(&r.record.id).copied().unwrap_or(0.0);
        let entry = combined.entry(r.record.id.clone()).or_insert((0.0, None));
        entry.0 += alpha * norm;
        entry.1 = Some((r.record.path.clone(), r.record.start_line, r.record.end_line, r.record.text.clone()));
    }
    for r in fulltext_results {
        let norm = fulltext_norm.get(&r.doc_id).copied().unwrap_or(0.0);
        let entry = combined.entry(r.doc_id.clone()).or_insert((0.0, None));
        entry.0 += (1.0 - alpha) * norm;
        if entry.1.is_none() {
            entry.1 = Some((r.path.clone(), r.start_line, r.end_line, r.text.clone()));
        }
    }

    let mut results: Vec<FusedResult> = combined
        .into_iter()
        .filter_map(|(id, (score, meta))| {
            meta.map(|(path, start_line, end_line, text)| FusedResult { id, path, start_line, end_line, text, score })
        })
        .collect();
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(top_k);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::ChunkRecord;

    fn vchunk(id: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            record: ChunkRecord { id: id.into(), path: "a.rs".into(), start_line: 1, end_line: 5, text: "t".into(), embedding: vec![] },
            score,
        }
    }

    fn fchunk(id: &str, score: f32) -> FullTextResult {
        FullTextResult { doc_id: id.into(), path: "a.rs".into(), start_line: 1, end_line: 5, text: "t".into(), raw_score: score }
    }

    #[test]
    fn unknown_mode_falls_back_to_hybrid() {
        assert_eq!(SearchMode::parse(Some("bogus")), SearchMode::Hybrid);
    }

    #[test]
    fn missing_mode_defaults_to_hybrid() {
        assert_eq!(SearchMode::parse(None), SearchMode::Hybrid);
    }

    #[test]
    fn hybrid_downgrades_silently_without_fulltext() {
        let decision = effective_mode(SearchMode::Hybrid, false);
        assert_eq!(decision.mode, SearchMode::Vector);
        assert!(decision.warning.is_none());
    }

    #[test]
    fn explicit_fts_downgrade_carries_a_warning() {
        let decision = effective_mode(SearchMode::Fts, false);
        assert_eq!(decision.mode, SearchMode::Vector);
        assert!(decision.warning.is_some());
    }

    #[test]
    fn alpha_out_of_range_is_rejected() {
        assert!(validate_alpha(Some(1.5)).is_err());
        assert!(validate_alpha(Some(-0.1)).is_err());
        assert!(validate_alpha(Some(0.5)).is_ok());
    }

    #[test]
    fn fusion_favors_result_present_in_both_legs() {
        let vector = vec![vchunk("a", 1.0), vchunk("b", 0.5)];
        let fulltext = vec![fchunk("a", 10.0)];
        let fused = fuse(&vector, &fulltext, 0.5, 10);
        assert_eq!(fused[0].id, "a");
    }

    #[test]
    fn all_zero_leg_normalizes_to_all_zero() {
        let zeros = vec![("a".to_string(), 0.0), ("b".to_string(), 0.0)];
        let norm = normalize_by_top(&zeros);
        assert_eq!(norm["a"], 0.0);
        assert_eq!(norm["b"], 0.0);
    }

    #[test]
    fn over_pull_limit_has_a_twenty_row_floor() {
        assert_eq!(over_pull_limit(5), 20);
        assert_eq!(over_pull_limit(30), 60);
    }
}
