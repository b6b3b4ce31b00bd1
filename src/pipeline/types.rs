//! Core data types and error definitions for the ingestion and query pipeline.

use crate::{
    chunking::ChunkingError, completion::CompletionError, embedding::EmbeddingError,
    extract::ExtractError, qdrant::QdrantError, tokenizer::TokenizerError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One forwarded email as delivered by the upstream collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailEnvelope {
    /// Address of the original sender.
    pub sender: String,
    /// Subject line of the email.
    pub subject: String,
    /// Attachments to extract, chunk, and index.
    #[serde(default)]
    pub attachments: Vec<EmailAttachment>,
}

/// A single attachment within an email envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAttachment {
    /// File name as declared by the sender; may be empty.
    #[serde(default)]
    pub name: String,
    /// Declared MIME type used for extractor dispatch.
    pub content_type: String,
    /// Base64-encoded attachment bytes.
    pub content_bytes: String,
    /// Stable attachment identifier assigned upstream.
    pub id: String,
}

/// Errors that abort a single attachment without affecting its siblings.
#[derive(Debug, Error)]
pub enum AttachmentError {
    /// Attachment bytes were not valid base64.
    #[error("attachment payload was not valid base64: {0}")]
    InvalidPayload(String),
    /// Text extraction failed or the format is unsupported.
    #[error(transparent)]
    Extraction(#[from] ExtractError),
    /// Chunking the extracted text failed.
    #[error(transparent)]
    Chunking(#[from] ChunkingError),
}

/// Pipeline stage at which a single chunk failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Embedding call failed for the chunk.
    Embedding,
    /// Vector-store upsert failed for the chunk; likely transient.
    IndexWrite,
}

/// A chunk that could not be indexed, recorded against its position.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkFailure {
    /// Position of the failed chunk within its attachment.
    pub chunk_index: usize,
    /// Stage at which the chunk failed.
    pub stage: FailureStage,
    /// Human-readable failure detail.
    pub message: String,
}

/// Outcome of processing one attachment.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttachmentStatus {
    /// Attachment was chunked; some chunks may still have failed individually.
    Indexed {
        /// Chunks successfully embedded and upserted.
        chunks_indexed: usize,
        /// Chunks that failed embedding or upsert, in index order.
        chunk_failures: Vec<ChunkFailure>,
    },
    /// Attachment was rejected before chunking.
    Skipped {
        /// Why the attachment was skipped.
        reason: String,
    },
}

/// Per-attachment entry in an ingestion report.
#[derive(Debug, Serialize)]
pub struct AttachmentOutcome {
    /// Original attachment file name (possibly empty).
    pub file_name: String,
    /// Upstream attachment identifier.
    pub attachment_id: String,
    /// What happened to this attachment.
    #[serde(flatten)]
    pub status: AttachmentStatus,
}

/// Aggregated result of ingesting one email envelope.
///
/// Per-chunk and per-attachment failures are collected here instead of being
/// logged and discarded, so callers can observe degraded ingestion and retry.
#[derive(Debug, Default, Serialize)]
pub struct IngestReport {
    /// Outcome for each attachment, in envelope order.
    pub attachments: Vec<AttachmentOutcome>,
    /// Total chunks indexed across the envelope.
    pub chunks_indexed: usize,
    /// Total chunks that failed across the envelope.
    pub chunks_failed: usize,
    /// Attachments rejected before chunking.
    pub attachments_skipped: usize,
}

impl IngestReport {
    /// Fold an attachment outcome into the aggregate counters.
    pub fn push(&mut self, outcome: AttachmentOutcome) {
        match &outcome.status {
            AttachmentStatus::Indexed {
                chunks_indexed,
                chunk_failures,
            } => {
                self.chunks_indexed += chunks_indexed;
                self.chunks_failed += chunk_failures.len();
            }
            AttachmentStatus::Skipped { .. } => {
                self.attachments_skipped += 1;
            }
        }
        self.attachments.push(outcome);
    }
}

/// Errors terminal for a single query request.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Embedding the question failed.
    #[error("Failed to embed question: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Query embedding dimensionality does not match the index.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the index was created with.
        expected: usize,
        /// Dimension of the produced query embedding.
        actual: usize,
    },
    /// Vector-store retrieval failed.
    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] QdrantError),
    /// Completion call failed; no partial answer is returned.
    #[error("Completion failed: {0}")]
    Completion(#[from] CompletionError),
}

/// Errors raised while constructing the pipeline at startup.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Tokenizer for the configured embedding model could not be resolved.
    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),
    /// Vector store was unreachable or misconfigured.
    #[error(transparent)]
    Qdrant(#[from] QdrantError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_accumulates_outcomes() {
        let mut report = IngestReport::default();
        report.push(AttachmentOutcome {
            file_name: "a.txt".into(),
            attachment_id: "att-1".into(),
            status: AttachmentStatus::Indexed {
                chunks_indexed: 3,
                chunk_failures: vec![ChunkFailure {
                    chunk_index: 1,
                    stage: FailureStage::Embedding,
                    message: "rate limited".into(),
                }],
            },
        });
        report.push(AttachmentOutcome {
            file_name: "b.png".into(),
            attachment_id: "att-2".into(),
            status: AttachmentStatus::Skipped {
                reason: "unsupported attachment format: image/png".into(),
            },
        });

        assert_eq!(report.chunks_indexed, 3);
        assert_eq!(report.chunks_failed, 1);
        assert_eq!(report.attachments_skipped, 1);
        assert_eq!(report.attachments.len(), 2);
    }

    #[test]
    fn envelope_accepts_upstream_field_names() {
        let raw = serde_json::json!({
            "sender": "cfo@example.com",
            "subject": "Q3 numbers",
            "attachments": [
                {
                    "name": "report.pdf",
                    "contentType": "application/pdf",
                    "contentBytes": "aGVsbG8=",
                    "id": "att-1"
                }
            ]
        });

        let envelope: EmailEnvelope = serde_json::from_value(raw).expect("envelope");
        assert_eq!(envelope.attachments.len(), 1);
        assert_eq!(envelope.attachments[0].content_type, "application/pdf");
        assert_eq!(envelope.attachments[0].content_bytes, "aGVsbG8=");
    }
}
