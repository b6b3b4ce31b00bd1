//! Chunk identity and payload construction for Qdrant records.
//!
//! Record identity must be deterministic for a given (file name, attachment id,
//! chunk index) so that re-ingesting the same attachment overwrites prior
//! records instead of duplicating them. Qdrant only accepts UUID or integer
//! point ids, so the readable chunk key is hashed into a stable UUID and kept
//! in the payload for traceability.

use crate::qdrant::types::ChunkRecord;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Replace whitespace runs in an attachment name with a single separator.
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized = name.split_whitespace().collect::<Vec<_>>().join("_");
    if sanitized.is_empty() {
        "unnamed".to_string()
    } else {
        sanitized
    }
}

/// Deterministic, human-readable identity of one chunk.
pub fn chunk_key(file_name: &str, attachment_id: &str, chunk_index: usize) -> String {
    format!(
        "{}-{attachment_id}-chunk-{chunk_index}",
        sanitize_file_name(file_name)
    )
}

/// Derive the stable Qdrant point id for a chunk key.
pub fn point_uuid(chunk_key: &str) -> Uuid {
    let digest = Sha256::digest(chunk_key.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

/// Build the payload object stored alongside an indexed chunk.
pub(crate) fn build_payload(record: &ChunkRecord, timestamp_rfc3339: &str) -> Value {
    let mut payload = Map::new();
    payload.insert("chunk_key".into(), Value::String(record.chunk_key.clone()));
    payload.insert("text".into(), Value::String(record.source_text.clone()));
    payload.insert("sender".into(), Value::String(record.sender.clone()));
    payload.insert("subject".into(), Value::String(record.subject.clone()));
    payload.insert("chunk_index".into(), json!(record.chunk_index));
    payload.insert("total_chunks".into(), json!(record.total_chunks));
    payload.insert("file_name".into(), Value::String(record.file_name.clone()));
    payload.insert(
        "ingested_at".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    Value::Object(payload)
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ChunkRecord {
        ChunkRecord {
            chunk_key: chunk_key("Q3 report.pdf", "att-7", 2),
            vector: vec![0.0; 4],
            source_text: "Revenue grew.".into(),
            sender: "cfo@example.com".into(),
            subject: "Q3 numbers".into(),
            chunk_index: 2,
            total_chunks: 5,
            file_name: "Q3 report.pdf".into(),
        }
    }

    #[test]
    fn file_name_whitespace_collapses_to_separator() {
        assert_eq!(sanitize_file_name("Q3   report final.pdf"), "Q3_report_final.pdf");
        assert_eq!(sanitize_file_name("plain.txt"), "plain.txt");
        assert_eq!(sanitize_file_name("   "), "unnamed");
        assert_eq!(sanitize_file_name(""), "unnamed");
    }

    #[test]
    fn chunk_key_is_deterministic() {
        let first = chunk_key("Q3 report.pdf", "att-7", 0);
        let second = chunk_key("Q3 report.pdf", "att-7", 0);
        assert_eq!(first, "Q3_report.pdf-att-7-chunk-0");
        assert_eq!(first, second);
        assert_ne!(first, chunk_key("Q3 report.pdf", "att-7", 1));
    }

    #[test]
    fn point_uuid_is_stable_per_key() {
        let key = chunk_key("notes.txt", "att-1", 3);
        assert_eq!(point_uuid(&key), point_uuid(&key));
        assert_ne!(point_uuid(&key), point_uuid("other-key"));
    }

    #[test]
    fn payload_carries_all_metadata_fields() {
        let record = sample_record();
        let payload = build_payload(&record, "2026-01-01T00:00:00Z");
        assert_eq!(payload["chunk_key"], "Q3_report.pdf-att-7-chunk-2");
        assert_eq!(payload["text"], "Revenue grew.");
        assert_eq!(payload["sender"], "cfo@example.com");
        assert_eq!(payload["subject"], "Q3 numbers");
        assert_eq!(payload["chunk_index"], 2);
        assert_eq!(payload["total_chunks"], 5);
        assert_eq!(payload["file_name"], "Q3 report.pdf");
        assert_eq!(payload["ingested_at"], "2026-01-01T00:00:00Z");
    }

    #[test]
    fn timestamp_is_rfc3339_like() {
        let ts = current_timestamp_rfc3339();
        assert!(ts.contains('T') && ts.ends_with('Z'));
    }
}
