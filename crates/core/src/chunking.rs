use crate::error::IngestError;
use crate::models::{IngestionOptions, LogicalDocument, MeetingChunk, SOURCE_KEY};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Split points tried from coarsest to finest. The empty separator splits
/// between characters and always applies.
pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::from(&IngestionOptions::default())
    }
}

impl From<&IngestionOptions> for ChunkingConfig {
    fn from(value: &IngestionOptions) -> Self {
        Self {
            max_chars: value.chunk_max_chars,
            overlap_chars: value.chunk_overlap_chars,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }

        if self.overlap_chars > self.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk overlap {} is larger than chunk size {}",
                self.overlap_chars, self.max_chars
            )));
        }

        Ok(())
    }
}

/// Recursive character splitter that stamps every chunk with its document's metadata.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self, IngestError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    /// Splits a document into ordered chunks. Each chunk carries a full copy
    /// of the document metadata; an empty document yields no chunks.
    pub fn chunk_document(&self, document: &LogicalDocument) -> Vec<MeetingChunk> {
        let source = document.metadata.text(SOURCE_KEY).unwrap_or_default();

        let chunks: Vec<MeetingChunk> = self
            .split_text(&document.text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                let chunk_index = index as u64;
                MeetingChunk {
                    chunk_id: make_chunk_id(source, chunk_index, &text),
                    chunk_index,
                    text,
                    metadata: document.metadata.clone(),
                }
            })
            .collect();

        debug!(source, chunk_count = chunks.len(), "chunked document");
        chunks
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &DEFAULT_SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&'static str]) -> Vec<String> {
        let (separator, finer) = pick_separator(text, separators);
        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.config.max_chars {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge_pieces(&pending));
                pending.clear();
            }

            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge_pieces(&pending));
        }

        chunks
    }

    /// Packs adjacent pieces into windows of at most `max_chars`, carrying
    /// up to `overlap_chars` of trailing pieces into the next window.
    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let ChunkingConfig {
            max_chars,
            overlap_chars,
        } = self.config;

        let mut merged = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > max_chars && !window.is_empty() {
                if total > max_chars {
                    warn!(total, max_chars, "created a chunk longer than the configured size");
                }

                push_window(&mut merged, &window);

                while total > overlap_chars || (total + len > max_chars && total > 0) {
                    let Some((_, front_len)) = window.pop_front() else {
                        break;
                    };
                    total -= front_len;
                }
            }

            window.push_back((piece, len));
            total += len;
        }

        push_window(&mut merged, &window);
        merged
    }
}

fn pick_separator<'s>(
    text: &str,
    separators: &'s [&'static str],
) -> (&'static str, &'s [&'static str]) {
    for (position, &separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return ("", &[]);
        }
        if text.contains(separator) {
            return (separator, &separators[position + 1..]);
        }
    }
    ("", &[])
}

/// Splits on `separator`, keeping it attached to the start of the following piece.
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(index, ch)| &text[index..index + ch.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (index, _) in text.match_indices(separator) {
        if index > start {
            pieces.push(&text[start..index]);
        }
        start = index;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn push_window(out: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn make_chunk_id(source: &str, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentMetadata, PARTICIPANTS_KEY, TOPIC_KEY};

    fn chunker(max_chars: usize, overlap_chars: usize) -> Chunker {
        Chunker::new(ChunkingConfig {
            max_chars,
            overlap_chars,
        })
        .expect("valid chunking config")
    }

    fn document(text: &str) -> LogicalDocument {
        let mut metadata = DocumentMetadata::new();
        metadata.insert(SOURCE_KEY, "meetings/2024-03-15_Project_Kickoff.md");
        metadata.insert(TOPIC_KEY, "Project Kickoff");
        metadata.insert(PARTICIPANTS_KEY, "Alice, Bob");
        LogicalDocument {
            text: text.to_string(),
            metadata,
        }
    }

    fn numbered_words(count: usize) -> String {
        (0..count)
            .map(|index| format!("word{index}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(Chunker::new(ChunkingConfig {
            max_chars: 0,
            overlap_chars: 0
        })
        .is_err());
        assert!(Chunker::new(ChunkingConfig {
            max_chars: 10,
            overlap_chars: 11
        })
        .is_err());
        assert!(Chunker::new(ChunkingConfig::default()).is_ok());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let text = "First paragraph.\n\nSecond paragraph.";
        assert_eq!(chunker(512, 50).split_text(text), vec![text.to_string()]);
    }

    #[test]
    fn paragraphs_are_preferred_split_points() {
        let chunks = chunker(20, 5).split_text("First paragraph.\n\nSecond paragraph.");
        assert_eq!(chunks, vec!["First paragraph.", "Second paragraph."]);
    }

    #[test]
    fn neighbouring_windows_share_overlap() {
        let chunks = chunker(10, 5).split_text("aaaa bbbb cccc dddd");
        assert_eq!(chunks, vec!["aaaa bbbb", "bbbb cccc", "cccc dddd"]);
    }

    #[test]
    fn unbroken_runs_fall_back_to_character_splits() {
        let chunks = chunker(5, 0).split_text("abcdefghijkl");
        assert_eq!(chunks, vec!["abcde", "fghij", "kl"]);
    }

    #[test]
    fn multibyte_text_is_measured_in_characters() {
        let chunks = chunker(4, 0).split_text("äöüßäöüß");
        assert_eq!(chunks, vec!["äöüß", "äöüß"]);
    }

    #[test]
    fn empty_and_blank_documents_yield_no_chunks() {
        let chunker = chunker(512, 50);
        assert!(chunker.chunk_document(&document("")).is_empty());
        assert!(chunker.chunk_document(&document(" \n\n \n")).is_empty());
    }

    #[test]
    fn every_chunk_carries_the_document_metadata() {
        let document = document(&numbered_words(200));
        let chunks = chunker(64, 16).chunk_document(&document);

        assert!(chunks.len() > 1);
        for (position, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata, document.metadata);
            assert_eq!(chunk.chunk_index, position as u64);
        }
    }

    #[test]
    fn chunk_ids_are_stable_and_distinct() {
        let document = document(&numbered_words(100));
        let chunker = chunker(50, 10);
        let first = chunker.chunk_document(&document);
        let second = chunker.chunk_document(&document);

        assert_eq!(first, second);
        let mut ids = first.iter().map(|chunk| chunk.chunk_id.as_str()).collect::<Vec<_>>();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), first.len());
    }

    #[test]
    fn chunks_respect_size_and_cover_the_text_in_order() {
        let mut text = String::from("# Weekly sync\n\nParticipants: Alice, Bob\n\n");
        for paragraph in 0..6 {
            for sentence in 0..5 {
                text.push_str(&format!("Paragraph {paragraph} sentence {sentence} has words. "));
            }
            text.push_str("\n\n");
        }

        let max_chars = 80;
        let chunks = chunker(max_chars, 20).split_text(&text);
        assert!(chunks.len() > 3);

        let mut covered_to = 0usize;
        let mut previous_start = 0usize;
        for (position, chunk) in chunks.iter().enumerate() {
            assert!(chunk.chars().count() <= max_chars, "chunk too long: {chunk:?}");

            let search_from = if position == 0 { 0 } else { previous_start + 1 };
            let start = text[search_from..]
                .find(chunk.as_str())
                .map(|offset| offset + search_from)
                .expect("chunk is a substring of the source text");

            if start > covered_to {
                assert!(
                    text[covered_to..start].trim().is_empty(),
                    "text lost between chunks: {:?}",
                    &text[covered_to..start]
                );
            }

            previous_start = start;
            covered_to = covered_to.max(start + chunk.len());
        }
        assert!(text[covered_to..].trim().is_empty());
    }

    #[test]
    fn split_keeps_separator_on_following_piece() {
        assert_eq!(
            split_keeping_separator("a\n\n\n\nb", "\n\n"),
            vec!["a", "\n\n", "\n\nb"]
        );
        assert_eq!(split_keeping_separator("\n\nb", "\n\n"), vec!["\n\nb"]);
    }
}
