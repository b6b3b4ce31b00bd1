//! End-to-end pipeline tests with mocked Qdrant and OpenAI endpoints.
//!
//! These exercise the real HTTP clients and the full ingest/query path; only
//! the remote services are replaced by `httpmock`.

use base64::{Engine, engine::general_purpose::STANDARD};
use httpmock::{
    Method::{GET, POST, PUT},
    MockServer,
};
use mailrag::completion::OpenAiCompletionClient;
use mailrag::embedding::OpenAiEmbeddingClient;
use mailrag::pipeline::{
    AttachmentStatus, EmailAttachment, EmailEnvelope, PipelineSettings, RagService,
};
use mailrag::qdrant::{QdrantService, chunk_key, point_uuid};
use mailrag::tokenizer::TokenizerAdapter;
use serde_json::json;

const COLLECTION: &str = "email-attachments-it";
const DIMENSION: usize = 4;

fn settings() -> PipelineSettings {
    PipelineSettings {
        collection: COLLECTION.into(),
        embedding_dimension: DIMENSION,
        max_chunk_tokens: 8000,
        chunk_boundary_lookback: 100,
        source_text_cap: 30_000,
        retrieval_top_k: 5,
        ingest_concurrency: 4,
    }
}

fn build_service(server: &MockServer) -> RagService {
    let base_url = server.base_url();
    RagService::with_components(
        TokenizerAdapter::for_model("text-embedding-3-large").expect("tokenizer"),
        Box::new(OpenAiEmbeddingClient::new(
            base_url.clone(),
            "test-key".into(),
            "text-embedding-3-large".into(),
        )),
        Box::new(OpenAiCompletionClient::new(
            base_url.clone(),
            "test-key".into(),
            "gpt-4o-2024-08-06".into(),
        )),
        QdrantService::new(&base_url, None).expect("qdrant client"),
        settings(),
    )
}

fn text_attachment(id: &str, name: &str, body: &str) -> EmailAttachment {
    EmailAttachment {
        name: name.into(),
        content_type: "text/plain".into(),
        content_bytes: STANDARD.encode(body),
        id: id.into(),
    }
}

#[tokio::test]
async fn ensure_collection_creates_when_missing() {
    let server = MockServer::start_async().await;
    let lookup = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/collections/{COLLECTION}"));
            then.status(404).body("collection not found");
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path(format!("/collections/{COLLECTION}"))
                .json_body_partial(
                    json!({ "vectors": { "size": DIMENSION, "distance": "Cosine" } }).to_string(),
                );
            then.status(200).json_body(json!({ "result": true }));
        })
        .await;

    let store = QdrantService::new(&server.base_url(), None).expect("qdrant client");
    store
        .ensure_collection(COLLECTION, DIMENSION as u64)
        .await
        .expect("collection provisioned");

    assert_eq!(lookup.hits_async().await, 1);
    assert_eq!(create.hits_async().await, 1);
}

#[tokio::test]
async fn ingest_indexes_chunks_with_deterministic_point_ids() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(200).json_body(json!({
                "data": [{ "embedding": [0.1, 0.2, 0.3, 0.4] }]
            }));
        })
        .await;
    let expected_id = point_uuid(&chunk_key("notes.txt", "att-1", 0)).to_string();
    let upsert = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path(format!("/collections/{COLLECTION}/points"))
                .query_param("wait", "true")
                .body_contains(&expected_id);
            then.status(200)
                .json_body(json!({ "result": { "status": "completed" } }));
        })
        .await;

    let service = build_service(&server);
    let envelope = EmailEnvelope {
        sender: "cfo@example.com".into(),
        subject: "Q3 numbers".into(),
        attachments: vec![text_attachment(
            "att-1",
            "notes.txt",
            "Revenue grew nine percent. Costs were flat.",
        )],
    };

    let report = service.ingest_email(envelope).await;
    assert_eq!(report.chunks_indexed, 1);
    assert_eq!(report.chunks_failed, 0);
    assert!(matches!(
        report.attachments[0].status,
        AttachmentStatus::Indexed { chunks_indexed: 1, .. }
    ));
    assert_eq!(upsert.hits_async().await, 1);

    // Re-ingesting the same attachment must address the same point.
    let envelope = EmailEnvelope {
        sender: "cfo@example.com".into(),
        subject: "Q3 numbers".into(),
        attachments: vec![text_attachment(
            "att-1",
            "notes.txt",
            "Revenue grew nine percent. Costs were flat.",
        )],
    };
    service.ingest_email(envelope).await;
    assert_eq!(upsert.hits_async().await, 2);
}

#[tokio::test]
async fn query_grounds_the_completion_in_retrieved_chunks() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(200).json_body(json!({
                "data": [{ "embedding": [0.1, 0.2, 0.3, 0.4] }]
            }));
        })
        .await;
    let retrieval = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/collections/{COLLECTION}/points/query"));
            then.status(200).json_body(json!({
                "result": [{
                    "id": "11111111-2222-3333-4444-555555555555",
                    "score": 0.91,
                    "payload": {
                        "chunk_key": "notes.txt-att-1-chunk-0",
                        "sender": "cfo@example.com",
                        "subject": "Q3 numbers",
                        "text": "Revenue grew nine percent."
                    }
                }]
            }));
        })
        .await;
    let completion = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("Answer using email context:")
                .body_contains("From: cfo@example.com")
                .body_contains("Revenue grew nine percent.");
            then.status(200).json_body(json!({
                "choices": [{ "message": { "content": "Revenue grew nine percent." } }]
            }));
        })
        .await;

    let service = build_service(&server);
    let answer = service
        .answer("how did revenue change?")
        .await
        .expect("grounded answer");

    assert_eq!(answer, "Revenue grew nine percent.");
    assert_eq!(retrieval.hits_async().await, 1);
    assert_eq!(completion.hits_async().await, 1);
}

#[tokio::test]
async fn unreadable_attachment_is_skipped_without_store_traffic() {
    let server = MockServer::start_async().await;
    let upsert = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path(format!("/collections/{COLLECTION}/points"));
            then.status(200)
                .json_body(json!({ "result": { "status": "completed" } }));
        })
        .await;

    let service = build_service(&server);
    let envelope = EmailEnvelope {
        sender: "hr@example.com".into(),
        subject: "Team photo".into(),
        attachments: vec![EmailAttachment {
            name: "team.png".into(),
            content_type: "image/png".into(),
            content_bytes: STANDARD.encode([0x89, 0x50, 0x4e, 0x47]),
            id: "att-9".into(),
        }],
    };

    let report = service.ingest_email(envelope).await;
    assert_eq!(report.attachments_skipped, 1);
    assert_eq!(report.chunks_indexed, 0);
    assert_eq!(upsert.hits_async().await, 0);
}
