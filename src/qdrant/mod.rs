//! Qdrant vector store integration.

pub mod client;
pub mod payload;
pub mod types;

pub use client::QdrantService;
pub use payload::{chunk_key, point_uuid, sanitize_file_name};
pub use types::{ChunkRecord, QdrantError, ScoredPoint};
