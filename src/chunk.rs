//! Overlapping character-window text chunker.
//!
//! Splits resume text into [`Chunk`]s of at most `chunk_size` characters,
//! with up to `overlap` characters shared between neighbouring chunks so a
//! fact that straddles a boundary is still retrievable.
//!
//! A window prefers to end at a paragraph break (`\n\n`), then a line break,
//! then a space, as long as that boundary lies in the back half of the
//! window. Otherwise the window is split hard at `chunk_size`.
//!
//! Each chunk receives a random UUID plus a SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Split text into overlapping chunks.
/// Returns chunks with contiguous indices starting at 0; whitespace-only text yields none.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size - 1);

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let hard_end = (start + chunk_size).min(chars.len());
        let end = if hard_end < chars.len() {
            soft_boundary(&chars, start + chunk_size / 2, hard_end).unwrap_or(hard_end)
        } else {
            hard_end
        };

        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            chunks.push(make_chunk(chunks.len() as i64, trimmed));
        }

        if end >= chars.len() {
            break;
        }
        start = overlap_start(&chars, start, end, overlap);
    }

    chunks
}

/// Start of the next window: `overlap` chars before `end`, moved forward to a word start.
fn overlap_start(chars: &[char], start: usize, end: usize, overlap: usize) -> usize {
    let back = end.saturating_sub(overlap).max(start + 1);
    if back >= end || chars[back - 1].is_whitespace() {
        return back;
    }
    chars[back..end]
        .iter()
        .position(|c| c.is_whitespace())
        .map(|i| back + i + 1)
        .unwrap_or(back)
}

/// Position just past the best separator in `chars[from..to]`, if any.
fn soft_boundary(chars: &[char], from: usize, to: usize) -> Option<usize> {
    let window = &chars[from..to];

    let paragraph = window
        .windows(2)
        .rposition(|w| w[0] == '\n' && w[1] == '\n')
        .map(|i| i + 2);

    paragraph
        .or_else(|| window.iter().rposition(|&c| c == '\n').map(|i| i + 1))
        .or_else(|| window.iter().rposition(|&c| c == ' ').map(|i| i + 1))
        .map(|i| from + i)
}

fn make_chunk(index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 1000, 200).is_empty());
        assert!(chunk_text(" \n\n\t ", 1000, 200).is_empty());
    }

    #[test]
    fn test_chunks_respect_size_and_indices() {
        let text = "word ".repeat(1000);
        let chunks = chunk_text(&text, 100, 20);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert!(c.text.chars().count() <= 100);
            assert!(!c.text.is_empty());
        }
    }

    #[test]
    fn test_neighbours_overlap() {
        let text: String = (0..60).map(|i| format!("tok{:02} ", i)).collect();
        let chunks = chunk_text(&text, 60, 20);
        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let last_word = pair[0].text.split(' ').last().unwrap();
            assert!(
                pair[1].text.contains(last_word),
                "{:?} should share {:?}",
                pair[1].text,
                last_word
            );
        }
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let first = "a".repeat(70);
        let text = format!("{}\n\n{}", first, "b ".repeat(40));
        let chunks = chunk_text(&text, 100, 0);
        assert_eq!(chunks[0].text, first);
        assert!(chunks[1].text.starts_with('b'));
    }

    #[test]
    fn test_hard_split_without_separators() {
        let text = "x".repeat(250);
        let chunks = chunk_text(&text, 100, 0);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.text.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
    }

    #[test]
    fn test_multibyte_text_counts_chars() {
        let text = "é".repeat(30);
        let chunks = chunk_text(&text, 10, 2);
        for c in &chunks {
            assert!(c.text.chars().count() <= 10);
        }
        assert_eq!(chunks[0].text, "é".repeat(10));
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = chunk_text("Same text", 1000, 200);
        let b = chunk_text("Same text", 1000, 200);
        assert_eq!(a[0].hash, b[0].hash);
        assert_ne!(a[0].id, b[0].id);
    }
}
