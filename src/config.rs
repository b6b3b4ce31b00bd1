use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

use crate::tokenizer::embedding_context_window;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Chunk budget would exceed what the embedding model can accept.
    #[error(
        "MAX_CHUNK_TOKENS ({budget}) must be positive and stay below the embedding context window ({window})"
    )]
    ChunkBudgetOutOfRange {
        /// Configured per-chunk token budget.
        budget: usize,
        /// Context window of the configured embedding model.
        window: usize,
    },
}

/// Runtime configuration for the mailrag server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection used for attachment chunks.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// API key passed to the OpenAI-compatible embedding/completion endpoints.
    pub openai_api_key: String,
    /// Optional base URL override for the OpenAI-compatible API.
    pub openai_base_url: Option<String>,
    /// Embedding model identifier pinned for both ingestion and queries.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Chat model used to answer questions over retrieved context.
    pub completion_model: String,
    /// Hard upper bound on tokens per chunk.
    pub max_chunk_tokens: usize,
    /// How far back (in tokens) a chunk boundary may snap to a sentence end.
    pub chunk_boundary_lookback: usize,
    /// Maximum number of characters of chunk text stored in record metadata.
    pub source_text_cap: usize,
    /// Number of nearest chunks retrieved per query.
    pub retrieval_top_k: usize,
    /// Concurrent embed-and-upsert operations per attachment.
    pub ingest_concurrency: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

const DEFAULT_COLLECTION: &str = "email-attachments";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";
const DEFAULT_EMBEDDING_DIMENSION: usize = 3072;
const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-2024-08-06";
const DEFAULT_MAX_CHUNK_TOKENS: usize = 8000;
const DEFAULT_BOUNDARY_LOOKBACK: usize = 100;
const DEFAULT_SOURCE_TEXT_CAP: usize = 30_000;
const DEFAULT_TOP_K: usize = 5;
const DEFAULT_INGEST_CONCURRENCY: usize = 4;

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env_optional("QDRANT_COLLECTION_NAME")
                .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            openai_api_key: load_env("OPENAI_API_KEY")?,
            openai_base_url: load_env_optional("OPENAI_BASE_URL"),
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dimension: parse_env_or("EMBEDDING_DIMENSION", DEFAULT_EMBEDDING_DIMENSION)?,
            completion_model: load_env_optional("COMPLETION_MODEL")
                .unwrap_or_else(|| DEFAULT_COMPLETION_MODEL.to_string()),
            max_chunk_tokens: parse_env_or("MAX_CHUNK_TOKENS", DEFAULT_MAX_CHUNK_TOKENS)?,
            chunk_boundary_lookback: parse_env_or(
                "CHUNK_BOUNDARY_LOOKBACK",
                DEFAULT_BOUNDARY_LOOKBACK,
            )?,
            source_text_cap: parse_env_or("SOURCE_TEXT_CAP", DEFAULT_SOURCE_TEXT_CAP)?,
            retrieval_top_k: parse_env_or("RETRIEVAL_TOP_K", DEFAULT_TOP_K)?,
            ingest_concurrency: parse_env_or("INGEST_CONCURRENCY", DEFAULT_INGEST_CONCURRENCY)?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants that cannot be expressed per variable.
    ///
    /// A chunk budget at or above the embedding model's input limit would make
    /// every embedding call fail, so it is rejected before the server starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let window = embedding_context_window(&self.embedding_model);
        if self.max_chunk_tokens == 0 || self.max_chunk_tokens >= window {
            return Err(ConfigError::ChunkBudgetOutOfRange {
                budget: self.max_chunk_tokens,
                window,
            });
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        if self.retrieval_top_k == 0 {
            return Err(ConfigError::InvalidValue("RETRIEVAL_TOP_K".into()));
        }
        if self.ingest_concurrency == 0 {
            return Err(ConfigError::InvalidValue("INGEST_CONCURRENCY".into()));
        }
        Ok(())
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        embedding_model = %config.embedding_model,
        embedding_dimension = config.embedding_dimension,
        max_chunk_tokens = config.max_chunk_tokens,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
