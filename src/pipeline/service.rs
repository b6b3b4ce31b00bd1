//! Pipeline service coordinating extraction, chunking, embedding, and Qdrant.

use crate::{
    chunking::{Chunk, chunk_text},
    completion::{CompletionClient, OpenAiCompletionClient},
    config::get_config,
    embedding::{EmbeddingClient, OpenAiEmbeddingClient},
    extract::extract_text,
    metrics::{IngestMetrics, MetricsSnapshot},
    pipeline::{
        context::{assemble_context, map_scored_point, order_for_context, system_prompt},
        types::{
            AttachmentError, AttachmentOutcome, AttachmentStatus, ChunkFailure, EmailAttachment,
            EmailEnvelope, FailureStage, IngestReport, PipelineError, QueryError,
        },
    },
    qdrant::{ChunkRecord, QdrantService, chunk_key},
    tokenizer::TokenizerAdapter,
};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use futures_util::{StreamExt, stream};
use std::sync::Arc;

/// Pipeline parameters captured once from configuration at startup.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Qdrant collection holding attachment chunks.
    pub collection: String,
    /// Dimensionality shared by the index and every embedding call.
    pub embedding_dimension: usize,
    /// Hard token budget per chunk.
    pub max_chunk_tokens: usize,
    /// Boundary-snap lookback in tokens.
    pub chunk_boundary_lookback: usize,
    /// Character cap for chunk text stored in record metadata.
    pub source_text_cap: usize,
    /// Number of nearest chunks retrieved per query.
    pub retrieval_top_k: usize,
    /// Concurrent embed-and-upsert operations per attachment.
    pub ingest_concurrency: usize,
}

impl PipelineSettings {
    /// Capture pipeline settings from the global configuration.
    pub fn from_config() -> Self {
        let config = get_config();
        Self {
            collection: config.qdrant_collection_name.clone(),
            embedding_dimension: config.embedding_dimension,
            max_chunk_tokens: config.max_chunk_tokens,
            chunk_boundary_lookback: config.chunk_boundary_lookback,
            source_text_cap: config.source_text_cap,
            retrieval_top_k: config.retrieval_top_k,
            ingest_concurrency: config.ingest_concurrency,
        }
    }
}

/// Abstraction over the pipeline used by external surfaces (HTTP, tests).
#[async_trait]
pub trait RagApi: Send + Sync {
    /// Extract, chunk, embed, and index every attachment of an envelope.
    async fn ingest_email(&self, envelope: EmailEnvelope) -> IngestReport;

    /// Answer a question from the indexed attachment chunks.
    async fn answer(&self, question: &str) -> Result<String, QueryError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Coordinates the full pipeline: extraction, chunking, embedding, Qdrant
/// writes, retrieval, and completion.
///
/// The service owns long-lived handles to the tokenizer, the embedding and
/// completion clients, the Qdrant transport, and the metrics registry.
/// Construct it once near process start and share it through an `Arc`; the
/// collection is ensured (and its dimension validated) during construction,
/// never per request.
pub struct RagService {
    tokenizer: TokenizerAdapter,
    embedder: Box<dyn EmbeddingClient>,
    completer: Box<dyn CompletionClient>,
    store: QdrantService,
    metrics: Arc<IngestMetrics>,
    settings: PipelineSettings,
}

impl RagService {
    /// Build the service from configuration, provisioning the collection.
    pub async fn new() -> Result<Self, PipelineError> {
        let config = get_config();
        let settings = PipelineSettings::from_config();
        tracing::info!(
            collection = %settings.collection,
            embedding_model = %config.embedding_model,
            dimension = settings.embedding_dimension,
            "Initializing pipeline"
        );
        let tokenizer = TokenizerAdapter::for_model(&config.embedding_model)?;
        let store = QdrantService::from_config()?;
        store
            .ensure_collection(&settings.collection, settings.embedding_dimension as u64)
            .await?;

        Ok(Self::with_components(
            tokenizer,
            Box::new(OpenAiEmbeddingClient::from_config()),
            Box::new(OpenAiCompletionClient::from_config()),
            store,
            settings,
        ))
    }

    /// Assemble a service from explicit components.
    pub fn with_components(
        tokenizer: TokenizerAdapter,
        embedder: Box<dyn EmbeddingClient>,
        completer: Box<dyn CompletionClient>,
        store: QdrantService,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            tokenizer,
            embedder,
            completer,
            store,
            metrics: Arc::new(IngestMetrics::new()),
            settings,
        }
    }

    /// Process every attachment of an envelope, isolating failures per
    /// attachment and per chunk.
    pub async fn ingest_email(&self, envelope: EmailEnvelope) -> IngestReport {
        self.metrics.record_email();
        tracing::info!(
            sender = %envelope.sender,
            subject = %envelope.subject,
            attachments = envelope.attachments.len(),
            "Processing email"
        );

        let mut report = IngestReport::default();
        for attachment in &envelope.attachments {
            let outcome = self
                .ingest_attachment(&envelope.sender, &envelope.subject, attachment)
                .await;
            report.push(outcome);
        }

        tracing::info!(
            chunks_indexed = report.chunks_indexed,
            chunks_failed = report.chunks_failed,
            attachments_skipped = report.attachments_skipped,
            "Email processed"
        );
        report
    }

    async fn ingest_attachment(
        &self,
        sender: &str,
        subject: &str,
        attachment: &EmailAttachment,
    ) -> AttachmentOutcome {
        let status = match self.process_attachment(sender, subject, attachment).await {
            Ok((chunks_indexed, chunk_failures)) => {
                self.metrics
                    .record_attachment(chunks_indexed as u64, chunk_failures.len() as u64);
                AttachmentStatus::Indexed {
                    chunks_indexed,
                    chunk_failures,
                }
            }
            Err(error) => {
                self.metrics.record_skipped_attachment();
                tracing::warn!(
                    file_name = %attachment.name,
                    attachment_id = %attachment.id,
                    error = %error,
                    "Attachment skipped"
                );
                AttachmentStatus::Skipped {
                    reason: error.to_string(),
                }
            }
        };

        AttachmentOutcome {
            file_name: attachment.name.clone(),
            attachment_id: attachment.id.clone(),
            status,
        }
    }

    async fn process_attachment(
        &self,
        sender: &str,
        subject: &str,
        attachment: &EmailAttachment,
    ) -> Result<(usize, Vec<ChunkFailure>), AttachmentError> {
        let bytes = STANDARD
            .decode(attachment.content_bytes.trim())
            .map_err(|error| AttachmentError::InvalidPayload(error.to_string()))?;
        let text = extract_text(&attachment.content_type, &bytes)?;
        let chunks = chunk_text(
            &text,
            self.settings.max_chunk_tokens,
            self.settings.chunk_boundary_lookback,
            &self.tokenizer,
        )?;
        let total_chunks = chunks.len();
        tracing::debug!(
            file_name = %attachment.name,
            attachment_id = %attachment.id,
            chunks = total_chunks,
            "Attachment chunked"
        );

        // Bounded fan-out; completion order is irrelevant because each chunk's
        // upsert id is deterministic.
        let mut results: Vec<(usize, Result<(), ChunkFailure>)> = stream::iter(chunks)
            .map(|chunk| async move {
                let index = chunk.index;
                let result = self
                    .index_chunk(sender, subject, attachment, chunk, total_chunks)
                    .await;
                (index, result)
            })
            .buffer_unordered(self.settings.ingest_concurrency)
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);

        let mut chunk_failures = Vec::new();
        let mut chunks_indexed = 0;
        for (index, result) in results {
            match result {
                Ok(()) => chunks_indexed += 1,
                Err(failure) => {
                    tracing::warn!(
                        file_name = %attachment.name,
                        attachment_id = %attachment.id,
                        chunk_index = index,
                        stage = ?failure.stage,
                        error = %failure.message,
                        "Chunk failed"
                    );
                    chunk_failures.push(failure);
                }
            }
        }

        Ok((chunks_indexed, chunk_failures))
    }

    async fn index_chunk(
        &self,
        sender: &str,
        subject: &str,
        attachment: &EmailAttachment,
        chunk: Chunk,
        total_chunks: usize,
    ) -> Result<(), ChunkFailure> {
        let chunk_index = chunk.index;
        let vector = self
            .embedder
            .embed(&chunk.text)
            .await
            .map_err(|error| ChunkFailure {
                chunk_index,
                stage: FailureStage::Embedding,
                message: error.to_string(),
            })?;

        if vector.len() != self.settings.embedding_dimension {
            return Err(ChunkFailure {
                chunk_index,
                stage: FailureStage::Embedding,
                message: format!(
                    "embedding dimension {} does not match configured {}",
                    vector.len(),
                    self.settings.embedding_dimension
                ),
            });
        }

        let record = ChunkRecord {
            chunk_key: chunk_key(&attachment.name, &attachment.id, chunk_index),
            vector,
            source_text: truncate_chars(&chunk.text, self.settings.source_text_cap),
            sender: sender.to_string(),
            subject: subject.to_string(),
            chunk_index,
            total_chunks,
            file_name: display_file_name(&attachment.name),
        };

        self.store
            .upsert_chunk(&self.settings.collection, &record)
            .await
            .map_err(|error| ChunkFailure {
                chunk_index,
                stage: FailureStage::IndexWrite,
                message: error.to_string(),
            })
    }

    /// Embed a question, retrieve the nearest chunks, and complete an answer.
    pub async fn answer(&self, question: &str) -> Result<String, QueryError> {
        let vector = self.embedder.embed(question).await?;
        // The dimension invariant is checked before any vector-store call.
        if vector.len() != self.settings.embedding_dimension {
            return Err(QueryError::DimensionMismatch {
                expected: self.settings.embedding_dimension,
                actual: vector.len(),
            });
        }

        let hits = self
            .store
            .search_points(&self.settings.collection, vector, self.settings.retrieval_top_k)
            .await?;
        let mut retrieved: Vec<_> = hits.into_iter().map(map_scored_point).collect();
        order_for_context(&mut retrieved);
        tracing::debug!(hits = retrieved.len(), "Assembling context");

        let context = assemble_context(&retrieved);
        let answer = self
            .completer
            .complete(&system_prompt(&context), question)
            .await?;
        Ok(answer)
    }

    /// Return the current ingestion metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl RagApi for RagService {
    async fn ingest_email(&self, envelope: EmailEnvelope) -> IngestReport {
        RagService::ingest_email(self, envelope).await
    }

    async fn answer(&self, question: &str) -> Result<String, QueryError> {
        RagService::answer(self, question).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        RagService::metrics_snapshot(self)
    }
}

fn display_file_name(name: &str) -> String {
    if name.trim().is_empty() {
        "unnamed".to_string()
    } else {
        name.to_string()
    }
}

fn truncate_chars(text: &str, cap: usize) -> String {
    match text.char_indices().nth(cap) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}
