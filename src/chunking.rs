//! Token-window chunking with sentence-boundary snapping.
//!
//! Documents are split on the token sequence, not on raw characters: a cursor
//! walks the encoded document emitting windows of at most `max_tokens` tokens.
//! When a sentence terminator appears near the tentative cut, the window shrinks
//! to end just after it so chunks avoid truncating mid-sentence; a terminator
//! further back than the lookback threshold is ignored and the hard cut wins.
//! The emitted ranges always partition the token sequence exactly, so chunk
//! identity stays deterministic across re-ingestion of the same document.

use std::ops::Range;
use thiserror::Error;

use crate::tokenizer::{TokenizerAdapter, TokenizerError};

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible token budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Tokenizer failed to encode or decode the document.
    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),
}

/// A contiguous slice of a document's token sequence.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Decoded text of the token slice.
    pub text: String,
    /// Number of tokens covered, always in `(0, max_tokens]`.
    pub token_count: usize,
    /// Ordinal position among sibling chunks of the same document.
    pub index: usize,
}

/// Compute chunk boundaries over a token sequence.
///
/// Returns ranges that are contiguous, non-overlapping, and whose union is
/// `[0, tokens.len())`. Each range spans at most `max_tokens` tokens. A range
/// is shortened to end just past the last `terminator` token in its window
/// when that terminator lies within `lookback` tokens of the tentative cut.
pub fn chunk_ranges(
    tokens: &[u32],
    max_tokens: usize,
    lookback: usize,
    terminator: Option<u32>,
) -> Result<Vec<Range<usize>>, ChunkingError> {
    if max_tokens == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }

    let total = tokens.len();
    let mut ranges = Vec::new();
    let mut start = 0;

    while start < total {
        let mut end = (start + max_tokens).min(total);

        if let Some(terminator) = terminator
            && let Some(offset) = tokens[start..end]
                .iter()
                .rposition(|token| *token == terminator)
        {
            let position = start + offset;
            // Snap only when the terminator is close enough to the cut;
            // otherwise accept a mid-sentence hard cut.
            if end - position < lookback {
                end = position + 1;
            }
        }

        ranges.push(start..end);
        start = end;
    }

    Ok(ranges)
}

/// Split text into ordered, token-bounded chunks.
///
/// Empty input yields an empty vector; callers must treat that as "nothing to
/// index" rather than an error.
pub fn chunk_text(
    text: &str,
    max_tokens: usize,
    lookback: usize,
    tokenizer: &TokenizerAdapter,
) -> Result<Vec<Chunk>, ChunkingError> {
    let tokens = tokenizer.encode(text);
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let ranges = chunk_ranges(&tokens, max_tokens, lookback, tokenizer.sentence_terminator())?;
    let mut chunks = Vec::with_capacity(ranges.len());
    for (index, range) in ranges.into_iter().enumerate() {
        let token_count = range.len();
        let text = tokenizer.decode(&tokens[range])?;
        chunks.push(Chunk {
            text,
            token_count,
            index,
        });
    }

    tracing::debug!(chunks = chunks.len(), tokens = tokens.len(), "Chunked text");
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TERMINATOR: u32 = 99;

    fn assert_partition(ranges: &[Range<usize>], total: usize, max_tokens: usize) {
        let mut cursor = 0;
        for range in ranges {
            assert_eq!(range.start, cursor, "ranges must be contiguous");
            assert!(range.len() > 0, "ranges must be non-empty");
            assert!(range.len() <= max_tokens, "ranges must respect the budget");
            cursor = range.end;
        }
        assert_eq!(cursor, total, "ranges must cover the full sequence");
    }

    #[test]
    fn empty_sequence_yields_no_ranges() {
        let ranges = chunk_ranges(&[], 8, 4, Some(TERMINATOR)).expect("ranges");
        assert!(ranges.is_empty());
    }

    #[test]
    fn zero_budget_is_rejected() {
        let error = chunk_ranges(&[1, 2, 3], 0, 4, None).expect_err("zero budget");
        assert!(matches!(error, ChunkingError::InvalidChunkSize));
    }

    #[test]
    fn short_sequence_fits_one_range() {
        let tokens = vec![1; 50];
        let ranges = chunk_ranges(&tokens, 8000, 100, Some(TERMINATOR)).expect("ranges");
        assert_eq!(ranges, vec![0..50]);
    }

    #[test]
    fn boundary_snaps_to_terminator_within_lookback() {
        // 17000 tokens with a sentence end shortly before the first 8000-token cut.
        let mut tokens = vec![1; 17_000];
        tokens[7_995] = TERMINATOR;
        let ranges = chunk_ranges(&tokens, 8_000, 100, Some(TERMINATOR)).expect("ranges");
        assert_eq!(ranges[0], 0..7_996);
        assert_partition(&ranges, tokens.len(), 8_000);
    }

    #[test]
    fn distant_terminator_is_ignored() {
        let mut tokens = vec![1; 9_000];
        tokens[100] = TERMINATOR;
        let ranges = chunk_ranges(&tokens, 8_000, 100, Some(TERMINATOR)).expect("ranges");
        assert_eq!(ranges[0], 0..8_000);
        assert_partition(&ranges, tokens.len(), 8_000);
    }

    #[test]
    fn terminator_at_window_edge_keeps_full_window() {
        // Terminator as the final token of the window: snapping changes nothing.
        let mut tokens = vec![1; 9_000];
        tokens[7_999] = TERMINATOR;
        let ranges = chunk_ranges(&tokens, 8_000, 100, Some(TERMINATOR)).expect("ranges");
        assert_eq!(ranges[0], 0..8_000);
    }

    #[test]
    fn ranges_partition_for_varied_inputs() {
        for total in [1usize, 7, 8, 9, 64, 1_000] {
            let mut tokens = vec![1; total];
            for position in (5..total).step_by(13) {
                tokens[position] = TERMINATOR;
            }
            let ranges = chunk_ranges(&tokens, 8, 4, Some(TERMINATOR)).expect("ranges");
            assert_partition(&ranges, total, 8);
        }
    }

    mod with_tokenizer {
        use super::*;
        use crate::tokenizer::TokenizerAdapter;

        fn tokenizer() -> TokenizerAdapter {
            TokenizerAdapter::for_model("text-embedding-3-large").expect("tokenizer")
        }

        #[test]
        fn empty_text_yields_zero_chunks() {
            let chunks = chunk_text("", 8_000, 100, &tokenizer()).expect("chunks");
            assert!(chunks.is_empty());
        }

        #[test]
        fn small_document_stays_whole() {
            let tokenizer = tokenizer();
            let text = "Quarterly revenue grew by twelve percent. Costs fell slightly.";
            assert!(tokenizer.encode(text).len() < 8_000);

            let chunks = chunk_text(text, 8_000, 100, &tokenizer).expect("chunks");
            assert_eq!(chunks.len(), 1);
            assert_eq!(chunks[0].text, text);
            assert_eq!(chunks[0].index, 0);
        }

        #[test]
        fn token_counts_cover_the_document() {
            let tokenizer = tokenizer();
            let sentence = "The committee approved the budget after a short debate. ";
            let text = sentence.repeat(40);
            let total = tokenizer.encode(&text).len();

            let chunks = chunk_text(&text, 64, 16, &tokenizer).expect("chunks");
            assert!(chunks.len() > 1);
            let counted: usize = chunks.iter().map(|chunk| chunk.token_count).sum();
            assert_eq!(counted, total);
            for (expected_index, chunk) in chunks.iter().enumerate() {
                assert_eq!(chunk.index, expected_index);
                assert!(chunk.token_count > 0 && chunk.token_count <= 64);
            }

            let reassembled: String = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
            assert_eq!(reassembled, text);
        }

        #[test]
        fn chunks_prefer_sentence_endings() {
            let tokenizer = tokenizer();
            let sentence = "Shipment eleven arrived at the warehouse on Tuesday morning. ";
            let text = sentence.repeat(30);

            let chunks = chunk_text(&text, 64, 32, &tokenizer).expect("chunks");
            // Every non-final chunk should end at a sentence boundary given the
            // generous lookback and regular sentence length.
            for chunk in &chunks[..chunks.len() - 1] {
                assert!(
                    chunk.text.trim_end().ends_with('.'),
                    "chunk did not end at a sentence boundary: {:?}",
                    chunk.text
                );
            }
        }
    }
}
