//! HTTP surface for the attachment pipeline.
//!
//! This module exposes a compact Axum router with three endpoints:
//!
//! - `POST /api/emails` – Ingest an email envelope: decode each attachment,
//!   extract its text, chunk it token-wise, embed the chunks, and index them
//!   in Qdrant. Always returns a per-attachment report; attachment and chunk
//!   failures are recorded in the body rather than failing the request.
//! - `POST /api/query` – Embed a question, retrieve the nearest attachment
//!   chunks, and return a model-generated answer grounded in them.
//! - `GET /metrics` – Observe ingestion counters.

use crate::metrics::MetricsSnapshot;
use crate::pipeline::{EmailEnvelope, IngestReport, QueryError, RagApi};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Build the HTTP router exposing the pipeline API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: RagApi + 'static,
{
    Router::new()
        .route("/api/emails", post(ingest_email::<S>))
        .route("/api/query", post(query::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(service)
}

/// Ingest an email and index its attachments.
///
/// The response enumerates every attachment with its outcome. A request only
/// fails wholesale when the envelope itself cannot be deserialized.
async fn ingest_email<S>(
    State(service): State<Arc<S>>,
    Json(envelope): Json<EmailEnvelope>,
) -> Json<IngestReport>
where
    S: RagApi,
{
    let report = service.ingest_email(envelope).await;
    Json(report)
}

/// Request body for the `POST /api/query` endpoint.
#[derive(Deserialize)]
struct QueryRequest {
    /// Natural-language question to answer from indexed attachments.
    query: String,
}

/// Success response for the `POST /api/query` endpoint.
#[derive(Serialize)]
struct QueryResponse {
    /// Model-generated answer grounded in retrieved chunks.
    answer: String,
}

/// Answer a question from the indexed attachment chunks.
async fn query<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError>
where
    S: RagApi,
{
    if request.query.trim().is_empty() {
        return Err(AppError::bad_request("query must not be empty"));
    }
    let answer = service.answer(&request.query).await?;
    Ok(Json(QueryResponse { answer }))
}

/// Return the ingestion counters snapshot.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: RagApi,
{
    Json(service.metrics_snapshot())
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<QueryError> for AppError {
    fn from(inner: QueryError) -> Self {
        let status = match inner {
            QueryError::DimensionMismatch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            QueryError::Embedding(_) | QueryError::Retrieval(_) | QueryError::Completion(_) => {
                StatusCode::BAD_GATEWAY
            }
        };
        tracing::error!(error = %inner, "Query failed");
        Self {
            status,
            message: inner.to_string(),
        }
    }
}
