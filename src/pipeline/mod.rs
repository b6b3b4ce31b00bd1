//! Ingestion and query pipeline coordinating chunking, embedding, and Qdrant.

pub mod context;
pub mod service;
pub mod types;

pub use service::{PipelineSettings, RagApi, RagService};
pub use types::{
    AttachmentError, AttachmentOutcome, AttachmentStatus, ChunkFailure, EmailAttachment,
    EmailEnvelope, FailureStage, IngestReport, PipelineError, QueryError,
};
