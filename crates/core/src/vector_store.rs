//! Embedded-SQLite vector store: one `.db` file per (project, corpus) pair
//! (`code.db` / `docs.db`). Bounded brute-force cosine search, modeled on the
//! upsert-by-id / bounded-heap-top-k pattern used for on-device vector
//! storage elsewhere in the ecosystem.

use crate::error::{ErrorKind, Result, SearchError};
use rusqlite::{params, Connection, OptionalExtension};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::Path;

pub const DEFAULT_SCAN_CAP: usize = 200_000;

#[derive(Clone, Debug, PartialEq)]
pub struct ChunkRecord {
    pub id: String,
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredChunk {
    pub record: ChunkRecord,
    pub score: f32,
}

struct HeapEntry {
    score: f32,
    record: ChunkRecord,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse so the binary heap behaves as a min-heap on score.
        other.score.partial_cmp(&self.score).unwrap_or(Ordering::Equal)
    }
}

pub struct VectorStore {
    conn: Connection,
    scan_cap: usize,
}

impl VectorStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| {
            SearchError::new(ErrorKind::IndexCorrupt, "failed to open vector store").with_cause(e)
        })?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                path TEXT NOT NULL,
                start_line INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL
            )",
            [],
        )
        .map_err(sqlite_err)?;
        conn.execute("CREATE INDEX IF NOT EXISTS idx_chunks_path ON chunks(path)", [])
            .map_err(sqlite_err)?;
        Ok(Self { conn, scan_cap: DEFAULT_SCAN_CAP })
    }

    pub fn with_scan_cap(mut self, cap: usize) -> Self {
        self.scan_cap = cap;
        self
    }

    /// Insert or replace chunks, keyed by id.
    pub fn insert_chunks(&mut self, chunks: &[ChunkRecord]) -> Result<()> {
        let tx = self.conn.transaction().map_err(sqlite_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO chunks (id, path, start_line, end_line, text, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(id) DO UPDATE SET
                        path=excluded.path, start_line=excluded.start_line,
                        end_line=excluded.end_line, text=excluded.text,
                        embedding=excluded.embedding",
                )
                .map_err(sqlite_err)?;
            for chunk in chunks {
                stmt.execute(params![
                    chunk.id,
                    chunk.path,
                    chunk.start_line as i64,
                    chunk.end_line as i64,
                    chunk.text,
                    encode_embedding(&chunk.embedding),
                ])
                .map_err(sqlite_err)?;
            }
        }
        tx.commit().map_err(sqlite_err)?;
        Ok(())
    }

    pub fn delete_by_path(&mut self, rel_path: &str) -> Result<usize> {
        let tx = self.conn.transaction().map_err(sqlite_err)?;
        let n = tx
            .execute("DELETE FROM chunks WHERE path = ?1", params![rel_path])
            .map_err(sqlite_err)?;
        tx.commit().map_err(sqlite_err)?;
        Ok(n)
    }

    pub fn get_chunks_by_id(&self, ids: &[String]) -> Result<Vec<ChunkRecord>> {
        let mut out = Vec::with_capacity(ids.len());
        let mut stmt = self
            .conn
            .prepare("SELECT id, path, start_line, end_line, text, embedding FROM chunks WHERE id = ?1")
            .map_err(sqlite_err)?;
        for id in ids {
            let row = stmt
                .query_row(params![id], row_to_record)
                .optional()
                .map_err(sqlite_err)?;
            if let Some(record) = row {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Cosine-similarity top-k, optionally restricted to a path prefix.
    /// Scans at most `scan_cap` rows, newest first by rowid, to bound cost
    /// on very large corpora.
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
        path_prefix: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        let sql = match path_prefix {
            Some(_) => {
                "SELECT id, path, start_line, end_line, text, embedding FROM chunks \
                 WHERE path LIKE ?1 ESCAPE '\\' ORDER BY rowid DESC LIMIT ?2"
            }
            None => "SELECT id, path, start_line, end_line, text, embedding FROM chunks ORDER BY rowid DESC LIMIT ?1",
        };
        let mut stmt = self.conn.prepare(sql).map_err(sqlite_err)?;

        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
        let cap = self.scan_cap as i64;

        let mut visit = |record: ChunkRecord| {
            let score = cosine_similarity(query, &record.embedding);
            heap.push(HeapEntry { score, record });
            if heap.len() > top_k {
                heap.pop();
            }
        };

        if let Some(prefix) = path_prefix {
            let pattern = format!("{}%", escape_like(prefix));
            let rows = stmt
                .query_map(params![pattern, cap], row_to_record)
                .map_err(sqlite_err)?;
            for row in rows {
                visit(row.map_err(sqlite_err)?);
            }
        } else {
            let rows = stmt.query_map(params![cap], row_to_record).map_err(sqlite_err)?;
            for row in rows {
                visit(row.map_err(sqlite_err)?);
            }
        }

        let mut results: Vec<ScoredChunk> =
            heap.into_iter().map(|e| ScoredChunk { record: e.record, score: e.score }).collect();
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        Ok(results)
    }

    pub fn count_chunks(&self) -> Result<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(sqlite_err)
    }

    pub fn count_files(&self) -> Result<usize> {
        self.conn
            .query_row("SELECT COUNT(DISTINCT path) FROM chunks", [], |r| r.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(sqlite_err)
    }

    pub fn indexed_files(&self) -> Result<Vec<String>> {
        let mut stmt =
            self.conn.prepare("SELECT DISTINCT path FROM chunks ORDER BY path").map_err(sqlite_err)?;
        let rows = stmt
            .query_map([], |r| r.get::<_, String>(0))
            .map_err(sqlite_err)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(sqlite_err)?);
        }
        Ok(out)
    }

    pub fn has_data(&self) -> Result<bool> {
        Ok(self.count_chunks()? > 0)
    }

    pub fn storage_size_bytes(&self, path: &Path) -> u64 {
        std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ChunkRecord> {
    let embedding_bytes: Vec<u8> = row.get(5)?;
    Ok(ChunkRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        start_line: row.get::<_, i64>(2)? as usize,
        end_line: row.get::<_, i64>(3)? as usize,
        text: row.get(4)?,
        embedding: decode_embedding(&embedding_bytes),
    })
}

fn encode_embedding(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// Escape `%`, `_`, and `\` for a `LIKE ... ESCAPE '\'` clause so a path
/// prefix can never be interpreted as a pattern.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\\' | '%' | '_' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

fn sqlite_err(e: rusqlite::Error) -> SearchError {
    SearchError::new(ErrorKind::IndexCorrupt, "vector store operation failed").with_cause(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, path: &str, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord { id: id.into(), path: path.into(), start_line: 1, end_line: 5, text: "body".into(), embedding }
    }

    #[test]
    fn insert_and_search_returns_nearest_neighbor() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = VectorStore::open(&tmp.path().join("code.db")).unwrap();
        store
            .insert_chunks(&[
                record("a#1-5", "a.rs", vec![1.0, 0.0]),
                record("b#1-5", "b.rs", vec![0.0, 1.0]),
            ])
            .unwrap();

        let results = store.search(&[1.0, 0.0], 1, None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.id, "a#1-5");
        assert!(results[0].score > 0.99);
    }

    #[test]
    fn upsert_by_id_replaces_existing_row() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = VectorStore::open(&tmp.path().join("code.db")).unwrap();
        store.insert_chunks(&[record("a#1-5", "a.rs", vec![1.0, 0.0])]).unwrap();
        store.insert_chunks(&[record("a#1-5", "a.rs", vec![0.0, 1.0])]).unwrap();
        assert_eq!(store.count_chunks().unwrap(), 1);
    }

    #[test]
    fn delete_by_path_removes_all_its_chunks() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = VectorStore::open(&tmp.path().join("code.db")).unwrap();
        store
            .insert_chunks(&[
                record("a#1-5", "a.rs", vec![1.0, 0.0]),
                record("a#6-10", "a.rs", vec![1.0, 0.0]),
                record("b#1-5", "b.rs", vec![0.0, 1.0]),
            ])
            .unwrap();
        let deleted = store.delete_by_path("a.rs").unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.count_chunks().unwrap(), 1);
    }

    #[test]
    fn path_prefix_filter_escapes_like_wildcards() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = VectorStore::open(&tmp.path().join("code.db")).unwrap();
        store
            .insert_chunks(&[
                record("a#1-5", "src/a_b.rs", vec![1.0, 0.0]),
                record("c#1-5", "srcXabYrs", vec![1.0, 0.0]),
            ])
            .unwrap();
        let results = store.search(&[1.0, 0.0], 10, Some("src/a_b")).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.path, "src/a_b.rs");
    }

    #[test]
    fn count_files_counts_distinct_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = VectorStore::open(&tmp.path().join("code.db")).unwrap();
        store
            .insert_chunks(&[record("a#1-5", "a.rs", vec![1.0, 0.0]), record("a#6-10", "a.rs", vec![0.0, 1.0])])
            .unwrap();
        assert_eq!(store.count_files().unwrap(), 1);
        assert_eq!(store.count_chunks().unwrap(), 2);
    }

    #[test]
    fn has_data_reflects_emptiness() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = VectorStore::open(&tmp.path().join("code.db")).unwrap();
        assert!(!store.has_data().unwrap());
        store.insert_chunks(&[record("a#1-5", "a.rs", vec![1.0])]).unwrap();
        assert!(store.has_data().unwrap());
    }
}
