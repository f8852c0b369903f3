//! Word-boundary text chunking for embedding.

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 400;
/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_OVERLAP: usize = 50;

/// Split `text` into chunks of roughly `chunk_size` characters with
/// `overlap` characters carried over between consecutive chunks.
///
/// Splits happen at word boundaries, so chunks can run slightly short of
/// `chunk_size`. Words longer than `chunk_size` are emitted as their own
/// chunk rather than split mid-word.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size.saturating_sub(1));

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let mut end = start;
        let mut len = 0;
        while end < words.len() {
            let added = words[end].len() + usize::from(len > 0);
            if len + added > chunk_size && end > start {
                break;
            }
            len += added;
            end += 1;
        }

        chunks.push(words[start..end].join(" "));

        if end >= words.len() {
            break;
        }

        // Walk back far enough to carry `overlap` characters into the next chunk
        let mut overlap_len = 0;
        let mut next_start = end;
        while next_start > start + 1 && overlap_len < overlap {
            next_start -= 1;
            overlap_len += words[next_start].len() + 1;
        }
        start = next_start;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 400, 50).is_empty());
        assert!(chunk_text("   \n\t  ", 400, 50).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("air quality in Delhi", 400, 50);
        assert_eq!(chunks, vec!["air quality in Delhi"]);
    }

    #[test]
    fn test_chunks_respect_size() {
        let text = "word ".repeat(300);
        let chunks = chunk_text(&text, 100, 20);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 100, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text: String = (0..100)
            .map(|i| format!("tok{:03}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text(&text, 120, 30);

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail: Vec<&str> = pair[0].split_whitespace().rev().take(2).collect();
            // At least one of the previous chunk's last words reappears
            assert!(tail.iter().any(|w| pair[1].contains(w)));
        }
    }

    #[test]
    fn test_all_words_covered() {
        let text: String = (0..50)
            .map(|i| format!("unique{:02}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text(&text, 80, 10);
        let joined = chunks.join(" ");

        for i in 0..50 {
            assert!(joined.contains(&format!("unique{:02}", i)));
        }
    }

    #[test]
    fn test_oversized_word_not_split() {
        let long_word = "x".repeat(500);
        let text = format!("short {} tail", long_word);
        let chunks = chunk_text(&text, 100, 10);

        assert!(chunks.iter().any(|c| c.contains(&long_word)));
    }
}
