//! Retrieval result mapping and context-block assembly.
//!
//! Every top-K hit is used regardless of its score; no similarity floor and no
//! per-document dedupe is applied. Callers wanting a relevance cutoff must
//! filter upstream of the completion call.

use crate::qdrant::ScoredPoint;
use serde_json::Value;

/// A retrieved chunk with the metadata needed for context rendering.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    /// Deterministic chunk identity stored in the payload.
    pub chunk_key: String,
    /// Similarity score reported by the vector store.
    pub score: f32,
    /// Sender of the originating email.
    pub sender: String,
    /// Subject of the originating email.
    pub subject: String,
    /// Stored (possibly truncated) chunk text.
    pub text: String,
}

/// Map a Qdrant scored point into a retrieved chunk.
///
/// Missing payload fields degrade to empty strings rather than dropping the
/// hit; a chunk with partial metadata is still usable context.
pub fn map_scored_point(point: ScoredPoint) -> RetrievedChunk {
    let ScoredPoint { id, score, payload } = point;

    let mut chunk_key = String::new();
    let mut sender = String::new();
    let mut subject = String::new();
    let mut text = String::new();

    if let Some(mut map) = payload {
        if let Some(Value::String(value)) = map.remove("chunk_key") {
            chunk_key = value;
        }
        if let Some(Value::String(value)) = map.remove("sender") {
            sender = value;
        }
        if let Some(Value::String(value)) = map.remove("subject") {
            subject = value;
        }
        if let Some(Value::String(value)) = map.remove("text") {
            text = value;
        }
    }

    if chunk_key.is_empty() {
        chunk_key = id;
    }

    RetrievedChunk {
        chunk_key,
        score,
        sender,
        subject,
        text,
    }
}

/// Order chunks for context assembly: descending score, chunk key as tie-break.
///
/// The tie-break keeps the assembled context stable across repeats of the same
/// query when distinct documents score identically.
pub fn order_for_context(chunks: &mut [RetrievedChunk]) {
    chunks.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.chunk_key.cmp(&b.chunk_key))
    });
}

/// Render retrieved chunks into a single context block.
pub fn assemble_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| {
            format!(
                "From: {}\nSubject: {}\nContent: {}",
                chunk.sender, chunk.subject, chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the system instruction embedding the assembled context.
pub fn system_prompt(context: &str) -> String {
    format!("Answer using email context:\n{context}")
}
