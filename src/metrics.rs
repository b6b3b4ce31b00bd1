//! Thread-safe ingestion counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing ingestion activity since process start.
#[derive(Default)]
pub struct IngestMetrics {
    emails_received: AtomicU64,
    attachments_indexed: AtomicU64,
    attachments_skipped: AtomicU64,
    chunks_indexed: AtomicU64,
    chunks_failed: AtomicU64,
}

impl IngestMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one processed email envelope.
    pub fn record_email(&self) {
        self.emails_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a fully processed attachment and its per-chunk outcomes.
    pub fn record_attachment(&self, chunks_indexed: u64, chunks_failed: u64) {
        self.attachments_indexed.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed
            .fetch_add(chunks_indexed, Ordering::Relaxed);
        self.chunks_failed
            .fetch_add(chunks_failed, Ordering::Relaxed);
    }

    /// Record an attachment skipped before chunking (unsupported or undecodable).
    pub fn record_skipped_attachment(&self) {
        self.attachments_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            emails_received: self.emails_received.load(Ordering::Relaxed),
            attachments_indexed: self.attachments_indexed.load(Ordering::Relaxed),
            attachments_skipped: self.attachments_skipped.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            chunks_failed: self.chunks_failed.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of ingestion counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of email envelopes accepted since startup.
    pub emails_received: u64,
    /// Attachments that produced at least a chunking pass.
    pub attachments_indexed: u64,
    /// Attachments rejected before chunking.
    pub attachments_skipped: u64,
    /// Chunks successfully embedded and upserted.
    pub chunks_indexed: u64,
    /// Chunks whose embedding or index write failed.
    pub chunks_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_attachments_and_chunks() {
        let metrics = IngestMetrics::new();
        metrics.record_email();
        metrics.record_attachment(3, 1);
        metrics.record_attachment(2, 0);
        metrics.record_skipped_attachment();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.emails_received, 1);
        assert_eq!(snapshot.attachments_indexed, 2);
        assert_eq!(snapshot.attachments_skipped, 1);
        assert_eq!(snapshot.chunks_indexed, 5);
        assert_eq!(snapshot.chunks_failed, 1);
    }

    #[test]
    fn snapshot_starts_at_zero() {
        let metrics = IngestMetrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.emails_received, 0);
        assert_eq!(snapshot.chunks_indexed, 0);
    }
}
