//! Splits file contents into line-bounded, overlapping chunks for embedding.

pub const MAX_LINES_PER_CHUNK: usize = 60;
pub const CHUNK_OVERLAP_LINES: usize = 2;
pub const MAX_CHUNKS_PER_FILE: usize = 1000;
pub const MAX_CHUNKS_WARNING_THRESHOLD: usize = (MAX_CHUNKS_PER_FILE * 8) / 10;

#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
}

pub struct ChunkResult {
    pub chunks: Vec<Chunk>,
    pub truncated: bool,
    pub near_cap_warning: bool,
}

/// Stable chunk id: `<rel_path>#<start_line>-<end_line>`.
fn chunk_id(rel_path: &str, start_line: usize, end_line: usize) -> String {
    format!("{rel_path}#{start_line}-{end_line}")
}

/// Chunk `content` into overlapping windows of up to `MAX_LINES_PER_CHUNK`
/// lines, each window stepping forward by `MAX_LINES_PER_CHUNK -
/// CHUNK_OVERLAP_LINES` lines. Lines are 1-indexed in chunk ids.
pub fn chunk_file(rel_path: &str, content: &str) -> ChunkResult {
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return ChunkResult { chunks: Vec::new(), truncated: false, near_cap_warning: false };
    }

    let step = MAX_LINES_PER_CHUNK - CHUNK_OVERLAP_LINES;
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut truncated = false;

    while start < lines.len() {
        if chunks.len() >= MAX_CHUNKS_PER_FILE {
            truncated = true;
            break;
        }
        let end = (start + MAX_LINES_PER_CHUNK).min(lines.len());
        let text = lines[start..end].join("\n");
        let start_line = start + 1;
        let end_line = end;
        chunks.push(Chunk { id: chunk_id(rel_path, start_line, end_line), text, start_line, end_line });

        if end == lines.len() {
            break;
        }
        start += step;
    }

    let near_cap_warning = chunks.len() >= MAX_CHUNKS_WARNING_THRESHOLD;
    ChunkResult { chunks, truncated, near_cap_warning }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_produces_no_chunks() {
        let result = chunk_file("a.rs", "");
        assert!(result.chunks.is_empty());
    }

    #[test]
    fn single_short_file_is_one_chunk() {
        let content = "line1\nline2\nline3";
        let result = chunk_file("a.rs", content);
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.chunks[0].start_line, 1);
        assert_eq!(result.chunks[0].end_line, 3);
        assert_eq!(result.chunks[0].id, "a.rs#1-3");
    }

    #[test]
    fn long_file_overlaps_by_two_lines() {
        let content = (1..=150).map(|n| format!("line{n}")).collect::<Vec<_>>().join("\n");
        let result = chunk_file("a.rs", &content);
        assert!(result.chunks.len() > 1);
        let first = &result.chunks[0];
        let second = &result.chunks[1];
        assert_eq!(first.end_line, 60);
        assert_eq!(second.start_line, first.end_line - CHUNK_OVERLAP_LINES + 1);
    }

    #[test]
    fn chunk_ids_are_stable_across_calls() {
        let content = "a\nb\nc\n";
        let r1 = chunk_file("foo.rs", content);
        let r2 = chunk_file("foo.rs", content);
        assert_eq!(r1.chunks[0].id, r2.chunks[0].id);
    }

    #[test]
    fn caps_at_max_chunks_per_file_and_flags_truncated() {
        let content = (1..=(MAX_CHUNKS_PER_FILE + 50) * 58)
            .map(|n| format!("l{n}"))
            .collect::<Vec<_>>()
            .join("\n");
        let result = chunk_file("huge.rs", &content);
        assert_eq!(result.chunks.len(), MAX_CHUNKS_PER_FILE);
        assert!(result.truncated);
    }

    #[test]
    fn near_cap_warning_fires_above_eighty_percent() {
        let lines_needed = MAX_CHUNKS_WARNING_THRESHOLD * (MAX_LINES_PER_CHUNK - CHUNK_OVERLAP_LINES) + 1;
        let content = (1..=lines_needed).map(|n| format!("l{n}")).collect::<Vec<_>>().join("\n");
        let result = chunk_file("big.rs", &content);
        assert!(result.near_cap_warning);
    }
}
