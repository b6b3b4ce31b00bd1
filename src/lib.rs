#![deny(missing_docs)]

//! Core library for the mailrag server.
//!
//! Forwarded emails arrive with attachments; mailrag extracts their text, splits
//! it into token-bounded chunks, embeds each chunk, and upserts the results into
//! Qdrant. Questions are answered by embedding the query, retrieving the nearest
//! chunks, and handing the assembled context to a chat completion model.

/// HTTP routing and REST handlers.
pub mod api;
/// Token-aware text chunking.
pub mod chunking;
/// Chat completion client abstraction and adapter.
pub mod completion;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapter.
pub mod embedding;
/// Attachment text extraction.
pub mod extract;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// Ingestion and query pipeline.
pub mod pipeline;
/// Qdrant vector store integration.
pub mod qdrant;
/// Tokenizer adapter shared by chunking and budget validation.
pub mod tokenizer;
