//! Shared types used by the Qdrant client and helpers.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while interacting with Qdrant.
#[derive(Debug, Error)]
pub enum QdrantError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Qdrant responded with an unexpected status code.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// An existing collection stores vectors of a different dimensionality.
    #[error(
        "Collection '{collection}' stores {actual}-dimensional vectors, configured dimension is {expected}"
    )]
    DimensionMismatch {
        /// Name of the offending collection.
        collection: String,
        /// Dimension required by the configured embedding model.
        expected: u64,
        /// Dimension the collection was created with.
        actual: u64,
    },
}

/// One chunk prepared for upsert: identity, vector, and stored metadata.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    /// Deterministic human-readable identity of the chunk.
    pub chunk_key: String,
    /// Embedding vector produced for the chunk.
    pub vector: Vec<f32>,
    /// Chunk text stored for context assembly, already capped in length.
    pub source_text: String,
    /// Sender of the originating email.
    pub sender: String,
    /// Subject of the originating email.
    pub subject: String,
    /// Position of this chunk within its attachment.
    pub chunk_index: usize,
    /// Total chunks produced for the attachment.
    pub total_chunks: usize,
    /// Original attachment file name.
    pub file_name: String,
}

/// Scored payload returned by Qdrant queries.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    /// Identifier assigned to the vector.
    pub id: String,
    /// Similarity score computed by Qdrant.
    pub score: f32,
    /// Optional payload associated with the vector.
    pub payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
pub(crate) struct CollectionInfoResponse {
    pub(crate) result: CollectionInfo,
}

#[derive(Deserialize)]
pub(crate) struct CollectionInfo {
    pub(crate) config: CollectionConfig,
}

#[derive(Deserialize)]
pub(crate) struct CollectionConfig {
    pub(crate) params: CollectionParams,
}

#[derive(Deserialize)]
pub(crate) struct CollectionParams {
    pub(crate) vectors: VectorParams,
}

#[derive(Deserialize)]
pub(crate) struct VectorParams {
    pub(crate) size: u64,
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    pub(crate) result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
pub(crate) struct QueryPoint {
    pub(crate) id: Value,
    pub(crate) score: f32,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}
