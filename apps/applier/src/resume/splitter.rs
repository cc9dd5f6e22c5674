//! Character splitter for resume text.
//!
//! Splits on a single separator, then greedily merges the pieces back into
//! chunks of at most `chunk_size` characters, carrying up to `chunk_overlap`
//! characters of trailing pieces into the next chunk. A single piece longer
//! than `chunk_size` becomes its own oversized chunk; it is never cut.

use std::collections::VecDeque;

use tracing::warn;

pub const DEFAULT_CHUNK_SIZE: usize = 2000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

#[derive(Debug, Clone)]
pub struct CharacterSplitter {
    separator: String,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for CharacterSplitter {
    fn default() -> Self {
        Self::new("\n", DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl CharacterSplitter {
    pub fn new(separator: &str, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            separator: separator.to_string(),
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size),
        }
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let pieces: Vec<&str> = if self.separator.is_empty() {
            vec![text]
        } else {
            text.split(self.separator.as_str())
                .filter(|p| !p.is_empty())
                .collect()
        };
        self.merge(&pieces)
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let sep_len = char_len(&self.separator);
        let mut chunks = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joined_sep = if current.is_empty() { 0 } else { sep_len };

            if total + len + joined_sep > self.chunk_size && !current.is_empty() {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of {} characters, longer than the limit of {}",
                        total, self.chunk_size
                    );
                }
                self.push_chunk(&mut chunks, &current);

                // Drop pieces from the front until the remainder fits the overlap
                // and leaves room for the incoming piece.
                while total > self.chunk_overlap
                    || (total > 0
                        && total + len + if current.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    let Some(first) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(first) + if current.is_empty() { 0 } else { sep_len };
                }
            }

            let joined_sep = if current.is_empty() { 0 } else { sep_len };
            current.push_back(piece);
            total += len + joined_sep;
        }

        self.push_chunk(&mut chunks, &current);
        chunks
    }

    fn push_chunk(&self, chunks: &mut Vec<String>, current: &VecDeque<&str>) {
        let joined = current
            .iter()
            .copied()
            .collect::<Vec<_>>()
            .join(&self.separator);
        let trimmed = joined.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_a_single_chunk() {
        let splitter = CharacterSplitter::default();
        let chunks = splitter.split_text("Swift\nUIKit\nCombine");
        assert_eq!(chunks, vec!["Swift\nUIKit\nCombine".to_string()]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        let splitter = CharacterSplitter::default();
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text("\n\n\n").is_empty());
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        // 10 lines of 9 chars ("line-NNNN"), chunk 30 → 3 lines per chunk.
        let text = (0..10)
            .map(|i| format!("line-{i:04}"))
            .collect::<Vec<_>>()
            .join("\n");
        let splitter = CharacterSplitter::new("\n", 30, 10);
        let chunks = splitter.split_text(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 30, "chunk too long: {chunk:?}");
        }
        // Consecutive chunks share the trailing line of the previous chunk.
        for pair in chunks.windows(2) {
            let last_line = pair[0].lines().last().unwrap();
            assert!(
                pair[1].starts_with(last_line),
                "{:?} does not overlap {:?}",
                pair[1],
                pair[0]
            );
        }
        // Nothing is lost.
        assert!(chunks.last().unwrap().ends_with("line-0009"));
    }

    #[test]
    fn test_zero_overlap_partitions_lines() {
        let text = "aaaa\nbbbb\ncccc\ndddd";
        let splitter = CharacterSplitter::new("\n", 9, 0);
        let chunks = splitter.split_text(text);
        assert_eq!(chunks, vec!["aaaa\nbbbb", "cccc\ndddd"]);
    }

    #[test]
    fn test_oversized_piece_is_kept_whole() {
        let long_line = "x".repeat(50);
        let text = format!("short\n{long_line}\ntail");
        let splitter = CharacterSplitter::new("\n", 20, 0);
        let chunks = splitter.split_text(&text);
        assert!(chunks.contains(&long_line));
        assert_eq!(chunks.first().unwrap(), "short");
        assert_eq!(chunks.last().unwrap(), "tail");
    }

    #[test]
    fn test_length_is_counted_in_characters() {
        // Six CJK characters per line: 18 bytes but 6 chars.
        let text = "深圳移动开发\n苹果系统工程\n界面组件设计";
        let splitter = CharacterSplitter::new("\n", 13, 0);
        let chunks = splitter.split_text(text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "深圳移动开发\n苹果系统工程");
    }
}
