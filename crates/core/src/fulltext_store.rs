//! Custom BM25-style inverted index. Generalizes the teacher's
//! `TermDocFreq`/`grep_relevance_score` IDF machinery into a standalone
//! store with a literal `serialize()->bytes` / `deserialize(bytes)->bool`
//! contract, which a directory-based engine like tantivy cannot satisfy.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const K1: f32 = 1.5;
const B: f32 = 0.75;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct Posting {
    doc_id: String,
    term_freq: u32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
struct DocInfo {
    length: u32,
    path: String,
    start_line: usize,
    end_line: usize,
    text: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FullTextStore {
    postings: HashMap<String, Vec<Posting>>,
    docs: HashMap<String, DocInfo>,
    total_length: u64,
}

pub struct FullTextResult {
    pub doc_id: String,
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
    pub raw_score: f32,
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

impl FullTextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index (or re-index) one document. Replaces any existing postings for
    /// the same `doc_id`.
    pub fn ingest(&mut self, doc_id: &str, path: &str, start_line: usize, end_line: usize, text: &str) {
        self.remove(doc_id);

        let tokens = tokenize(text);
        let length = tokens.len() as u32;
        let mut freqs: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *freqs.entry(token.clone()).or_insert(0) += 1;
        }
        for (term, freq) in freqs {
            self.postings.entry(term).or_default().push(Posting { doc_id: doc_id.to_string(), term_freq: freq });
        }
        self.docs.insert(
            doc_id.to_string(),
            DocInfo { length, path: path.to_string(), start_line, end_line, text: text.to_string() },
        );
        self.total_length += length as u64;
    }

    pub fn remove(&mut self, doc_id: &str) -> bool {
        let Some(info) = self.docs.remove(doc_id) else { return false };
        self.total_length = self.total_length.saturating_sub(info.length as u64);
        self.postings.retain(|_, postings| {
            postings.retain(|p| p.doc_id != doc_id);
            !postings.is_empty()
        });
        true
    }

    pub fn remove_by_path(&mut self, path: &str) -> usize {
        let ids: Vec<String> =
            self.docs.iter().filter(|(_, info)| info.path == path).map(|(id, _)| id.clone()).collect();
        let count = ids.len();
        for id in ids {
            self.remove(&id);
        }
        count
    }

    fn avg_doc_length(&self) -> f32 {
        if self.docs.is_empty() {
            0.0
        } else {
            self.total_length as f32 / self.docs.len() as f32
        }
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.docs.len() as f32;
        let df = self.postings.get(term).map(|p| p.len()).unwrap_or(0) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    pub fn search(&self, query: &str, top_k: usize) -> Vec<FullTextResult> {
        let terms = tokenize(query);
        let avg_len = self.avg_doc_length();
        let mut scores: HashMap<String, f32> = HashMap::new();

        for term in &terms {
            let Some(postings) = self.postings.get(term) else { continue };
            let idf = self.idf(term);
            for posting in postings {
                let Some(info) = self.docs.get(&posting.doc_id) else { continue };
                let tf = posting.term_freq as f32;
                let denom = tf + K1 * (1.0 - B + B * (info.length as f32 / avg_len.max(1.0)));
                let score = idf * (tf * (K1 + 1.0)) / denom.max(f32::EPSILON);
                *scores.entry(posting.doc_id.clone()).or_insert(0.0) += score;
            }
        }

        let mut results: Vec<FullTextResult> = scores
            .into_iter()
            .filter_map(|(doc_id, raw_score)| {
                self.docs.get(&doc_id).map(|info| FullTextResult {
                    doc_id: doc_id.clone(),
                    path: info.path.clone(),
                    start_line: info.start_line,
                    end_line: info.end_line,
                    text: info.text.clone(),
                    raw_score,
                })
            })
            .collect();
        results.sort_by(|a, b| b.raw_score.partial_cmp(&a.raw_score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);
        results
    }

    pub fn stats(&self) -> (usize, usize) {
        (self.docs.len(), self.postings.len())
    }

    pub fn serialize(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap_or_default()
    }

    /// Replace this store's contents with the deserialized blob. Returns
    /// `false` (leaving the store untouched) on a corrupt blob.
    pub fn deserialize(&mut self, bytes: &[u8]) -> bool {
        match bincode::deserialize::<FullTextStore>(bytes) {
            Ok(store) => {
                *self = store;
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_ranks_by_term_frequency() {
        let mut store = FullTextStore::new();
        store.ingest("a#1-5", "a.rs", 1, 5, "fn parse_config() { config config config }");
        store.ingest("b#1-5", "b.rs", 1, 5, "fn other() { config }");

        let results = store.search("config", 10);
        assert_eq!(results[0].doc_id, "a#1-5");
    }

    #[test]
    fn reingest_replaces_previous_postings() {
        let mut store = FullTextStore::new();
        store.ingest("a#1-5", "a.rs", 1, 5, "alpha beta");
        store.ingest("a#1-5", "a.rs", 1, 5, "gamma delta");

        assert!(store.search("alpha", 10).is_empty());
        assert_eq!(store.search("gamma", 10).len(), 1);
    }

    #[test]
    fn remove_by_path_drops_all_its_documents() {
        let mut store = FullTextStore::new();
        store.ingest("a#1-5", "a.rs", 1, 5, "alpha");
        store.ingest("a#6-10", "a.rs", 6, 10, "alpha beta");
        store.ingest("b#1-5", "b.rs", 1, 5, "alpha");

        let removed = store.remove_by_path("a.rs");
        assert_eq!(removed, 2);
        assert_eq!(store.search("alpha", 10).len(), 1);
    }

    #[test]
    fn serialize_round_trip_preserves_search_results() {
        let mut store = FullTextStore::new();
        store.ingest("a#1-5", "a.rs", 1, 5, "needle in a haystack");
        let bytes = store.serialize();

        let mut restored = FullTextStore::new();
        assert!(restored.deserialize(&bytes));
        assert_eq!(restored.search("needle", 10).len(), 1);
    }

    #[test]
    fn deserialize_rejects_corrupt_bytes_without_mutating() {
        let mut store = FullTextStore::new();
        store.ingest("a#1-5", "a.rs", 1, 5, "content");
        let ok = store.deserialize(b"not a valid blob");
        assert!(!ok);
        assert_eq!(store.search("content", 10).len(), 1);
    }
}
