//! Recursive character text splitting
//!
//! Text is split on the coarsest separator that occurs in it (paragraphs, then
//! lines, then words, then characters). Pieces are merged back into chunks of
//! at most `chunk_size` characters, and consecutive chunks share up to
//! `chunk_overlap` characters of trailing context. Lengths are counted in
//! `char`s, so multi-byte text is never cut inside a code point.

use crate::crawler::Document;
use crate::index::IndexError;
use crate::storage::Chunk;

/// Separators tried in order, coarsest first
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    /// Creates a splitter using the default separators
    ///
    /// # Returns
    ///
    /// * `Ok(TextSplitter)` - Valid settings
    /// * `Err(IndexError::InvalidSettings)` - Zero chunk size, or overlap not smaller than it
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, IndexError> {
        if chunk_size == 0 {
            return Err(IndexError::InvalidSettings(
                "chunk size must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(IndexError::InvalidSettings(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Splits text into chunks
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Splits every document, carrying its metadata onto each chunk
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.content)
                    .into_iter()
                    .enumerate()
                    .map(move |(i, content)| Chunk {
                        content,
                        source: doc.source.clone(),
                        title: doc.title.clone(),
                        position: i as u32,
                    })
            })
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        // Coarsest separator present; "" always matches
        let (index, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, s)| s.is_empty() || text.contains(s.as_str()))
            .map(|(i, s)| (i, s.as_str()))
            .unwrap_or((separators.len(), ""));
        let finer = separators.get(index + 1..).unwrap_or(&[]);

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_on(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge(&pending, separator));
                pending.clear();
            }

            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending, separator));
        }

        chunks
    }

    /// Greedily packs pieces into chunks, keeping an overlapping tail
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: Vec<&str> = Vec::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len + joiner_for(&window, sep_len) > self.chunk_size && !window.is_empty() {
                push_joined(&mut chunks, &window, separator);

                // Drop from the front until the tail fits as overlap
                while total > self.chunk_overlap
                    || (total > 0 && total + len + joiner_for(&window, sep_len) > self.chunk_size)
                {
                    let first = window.remove(0);
                    total -= char_len(first) + joiner_for(&window, sep_len);
                }
            }

            if !window.is_empty() {
                total += sep_len;
            }
            window.push(piece);
            total += len;
        }

        push_joined(&mut chunks, &window, separator);
        chunks
    }
}

fn joiner_for(window: &[&str], sep_len: usize) -> usize {
    if window.is_empty() {
        0
    } else {
        sep_len
    }
}

fn push_joined(chunks: &mut Vec<String>, window: &[&str], separator: &str) {
    let joined = window.join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn split_on<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split(separator).filter(|s| !s.is_empty()).collect()
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let splitter = TextSplitter::new(100, 10).unwrap();
        assert_eq!(splitter.split_text("Hello wiki"), vec!["Hello wiki"]);
    }

    #[test]
    fn test_empty_text() {
        let splitter = TextSplitter::new(100, 10).unwrap();
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text("\n\n  \n").is_empty());
    }

    #[test]
    fn test_chunks_respect_size() {
        let splitter = TextSplitter::new(50, 10).unwrap();
        let text = (0..40)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = splitter.split_text(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 50, "chunk too long: {:?}", chunk);
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let splitter = TextSplitter::new(30, 10).unwrap();
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu";
        let chunks = splitter.split_text(text);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let first_word = pair[1].split(' ').next().unwrap();
            assert!(
                pair[0].split(' ').any(|w| w == first_word),
                "{:?} should repeat the tail of {:?}",
                pair[1],
                pair[0]
            );
        }
        assert_eq!(chunks[0], "alpha beta gamma delta epsilon");
        assert_eq!(chunks[1], "epsilon zeta eta theta iota");
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let splitter = TextSplitter::new(40, 0).unwrap();
        let text = "First paragraph here.\n\nSecond paragraph here.\n\nThird one.";
        let chunks = splitter.split_text(text);
        assert_eq!(
            chunks,
            vec!["First paragraph here.", "Second paragraph here.\n\nThird one."]
        );
    }

    #[test]
    fn test_long_word_falls_back_to_characters() {
        let splitter = TextSplitter::new(10, 2).unwrap();
        let chunks = splitter.split_text("abcdefghijklmnopqrstuvwxyz");
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert!(chunks[0].starts_with("abcdefghij"));
        let rejoined: String = chunks.iter().map(|c| c.as_str()).collect();
        assert!(rejoined.contains("xyz"));
    }

    #[test]
    fn test_multibyte_text() {
        let splitter = TextSplitter::new(8, 2).unwrap();
        let chunks = splitter.split_text("ñandú ñandú ñandú ñandú 日本語のテキスト");
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.chars().count() <= 8));
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(
            TextSplitter::new(0, 0),
            Err(IndexError::InvalidSettings(_))
        ));
        assert!(matches!(
            TextSplitter::new(100, 100),
            Err(IndexError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_split_documents_carries_metadata() {
        let splitter = TextSplitter::new(40, 5).unwrap();
        let doc = Document::from_page(
            "https://wiki.example.com/bms",
            "BMS",
            "Cells are balanced passively.\n\nThe pack has 96 cells in series.",
        );
        let chunks = splitter.split_documents(&[doc]);
        assert!(chunks.len() >= 2);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.source, "https://wiki.example.com/bms");
            assert_eq!(chunk.title, "BMS");
            assert_eq!(chunk.position, i as u32);
        }
    }
}
