//! Content chunker.
//! A small sentence-aware splitter, reusing the same sentence-boundary
//! heuristics essence extraction uses: a single-chunk passthrough for
//! content under a configurable size, else greedy sentence packing up to
//! that size per chunk.

use crate::essence::split_sentences;

/// Default per-chunk character budget when the caller doesn't override it.
pub const DEFAULT_CHUNK_SIZE: usize = 2_000;

/// Split `content` into one or more chunks, each at most `chunk_size`
/// characters, packing whole sentences greedily. Falls back to a single
/// chunk containing the whole input when it has no sentence boundaries
/// (e.g. shorter than the minimum sentence length) or already fits.
pub fn chunk_content(content: &str, chunk_size: usize) -> Vec<String> {
    if content.len() <= chunk_size {
        return vec![content.to_string()];
    }

    let sentences = split_sentences(content);
    if sentences.is_empty() {
        return hard_chunk(content, chunk_size);
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    for sentence in sentences {
        let addition_len = sentence.len() + 2;
        if !current.is_empty() && current.len() + addition_len > chunk_size {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str(". ");
        }
        current.push_str(sentence);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    if chunks.is_empty() {
        hard_chunk(content, chunk_size)
    } else {
        chunks
    }
}

fn hard_chunk(content: &str, chunk_size: usize) -> Vec<String> {
    let chars: Vec<char> = content.chars().collect();
    chars
    .chunks(chunk_size.max(1))
    .map(|c| c.iter().collect())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_a_single_chunk() {
        let chunks = chunk_content("a short sentence here.", 2_000);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn long_content_is_split_on_sentence_boundaries() {
        let content = "This is sentence one here now. ".repeat(200);
        let chunks = chunk_content(&content, 500);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 520);
        }
    }

    #[test]
    fn content_with_no_sentence_boundaries_hard_chunks() {
        let content = "a".repeat(5_000);
        let chunks = chunk_content(&content, 2_000);
        assert!(chunks.len() >= 2);
    }
}
