//! Tokenizer adapter for the configured embedding/completion vocabulary.
//!
//! The adapter only converts text to and from token ids; it performs no chunking
//! or semantic analysis. The chunker slices token sequences and decodes the
//! slices back through this adapter, so both directions must use the same fixed
//! encoding. Resolution prefers the model lookup in `tiktoken-rs`, accepts bare
//! encoding names, and falls back to `cl100k_base` for unknown models.

use anyhow::Error as TokenizerSource;
use std::sync::Arc;
use thiserror::Error;
use tiktoken_rs::{
    CoreBPE, cl100k_base, get_bpe_from_model, model::get_context_size, o200k_base, p50k_base,
    p50k_edit, r50k_base,
};

/// Errors raised while resolving or using a tokenizer.
#[derive(Debug, Error)]
pub enum TokenizerError {
    /// Tokenizer resources were unavailable for the configured model.
    #[error("failed to initialize tokenizer for model '{model}': {source}")]
    Unavailable {
        /// Model we attempted to load an encoding for.
        model: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerSource,
    },
    /// A token slice could not be decoded back into text.
    #[error("failed to decode token sequence: {0}")]
    Decode(#[source] TokenizerSource),
}

/// Shared, process-lifetime handle to a fixed BPE vocabulary.
#[derive(Clone)]
pub struct TokenizerAdapter {
    encoding: Arc<CoreBPE>,
    terminator: Option<u32>,
}

impl TokenizerAdapter {
    /// Resolve the encoding for `model` and precompute the sentence terminator token.
    pub fn for_model(model: &str) -> Result<Self, TokenizerError> {
        let normalized = model.trim();
        let target = if normalized.is_empty() {
            "cl100k_base"
        } else {
            normalized
        };
        let encoding = resolve_encoding(target).map_err(|source| TokenizerError::Unavailable {
            model: target.to_string(),
            source,
        })?;
        let encoding = Arc::new(encoding);
        let terminator = encoding.encode_ordinary(".").first().copied();

        Ok(Self {
            encoding,
            terminator,
        })
    }

    /// Encode text into the vocabulary's token ids.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        self.encoding.encode_ordinary(text)
    }

    /// Decode a token slice back into text.
    pub fn decode(&self, tokens: &[u32]) -> Result<String, TokenizerError> {
        self.encoding
            .decode(tokens.to_vec())
            .map_err(TokenizerError::Decode)
    }

    /// Token id produced by encoding a period, used for boundary snapping.
    ///
    /// `None` only when the vocabulary has no single-token encoding for `"."`,
    /// in which case the chunker falls back to hard cuts.
    pub fn sentence_terminator(&self) -> Option<u32> {
        self.terminator
    }
}

/// Look up the input limit of an OpenAI-compatible embedding model.
pub fn embedding_context_window(model: &str) -> usize {
    if model.starts_with("text-embedding-3") || model.starts_with("text-embedding-ada-002") {
        return 8192;
    }
    get_context_size(model)
}

fn resolve_encoding(model: &str) -> Result<CoreBPE, TokenizerSource> {
    match get_bpe_from_model(model) {
        Ok(encoding) => Ok(encoding),
        Err(model_err) => {
            tracing::debug!(
                model,
                error = %model_err,
                "Tokenizer model lookup failed; trying encoding name"
            );
            if let Some(candidate) = encoding_from_name(model) {
                candidate
            } else {
                tracing::warn!(model, "Falling back to 'cl100k_base' encoding");
                cl100k_base()
            }
        }
    }
}

fn encoding_from_name(name: &str) -> Option<Result<CoreBPE, TokenizerSource>> {
    match name {
        "cl100k_base" => Some(cl100k_base()),
        "o200k_base" => Some(o200k_base()),
        "p50k_base" => Some(p50k_base()),
        "p50k_edit" => Some(p50k_edit()),
        "r50k_base" | "gpt2" => Some(r50k_base()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plain_text() {
        let tokenizer = TokenizerAdapter::for_model("text-embedding-3-large").expect("tokenizer");
        let text = "The quick brown fox jumps over the lazy dog.";
        let tokens = tokenizer.encode(text);
        assert!(!tokens.is_empty());
        let decoded = tokenizer.decode(&tokens).expect("decode");
        assert_eq!(decoded, text);
    }

    #[test]
    fn sentence_terminator_is_a_single_token() {
        let tokenizer = TokenizerAdapter::for_model("text-embedding-3-large").expect("tokenizer");
        let terminator = tokenizer.sentence_terminator().expect("terminator");
        assert_eq!(tokenizer.encode("."), vec![terminator]);
    }

    #[test]
    fn unknown_model_falls_back_to_default_encoding() {
        let tokenizer = TokenizerAdapter::for_model("definitely-not-a-model").expect("fallback");
        let tokens = tokenizer.encode("hello world");
        assert!(!tokens.is_empty());
    }

    #[test]
    fn encoding_names_resolve_directly() {
        let tokenizer = TokenizerAdapter::for_model("o200k_base").expect("named encoding");
        assert!(!tokenizer.encode("hello").is_empty());
    }

    #[test]
    fn embedding_window_known_models() {
        assert_eq!(embedding_context_window("text-embedding-3-large"), 8192);
        assert_eq!(embedding_context_window("text-embedding-ada-002"), 8192);
    }
}
