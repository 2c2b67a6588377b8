use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing service activity since startup.
///
/// Shared between the document and workflow services through an `Arc`; every field is an
/// atomic so concurrent requests never contend on a lock to record activity.
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    documents_ingested: AtomicU64,
    ingest_failures: AtomicU64,
    documents_deleted: AtomicU64,
    queries_served: AtomicU64,
    synthesis_fallbacks: AtomicU64,
}

impl ServiceMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successfully stored document.
    pub fn record_ingest(&self) {
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an ingestion attempt that failed validation, embedding, or storage.
    pub fn record_ingest_failure(&self) {
        self.ingest_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a deleted document.
    pub fn record_delete(&self) {
        self.documents_deleted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed query, noting whether synthesis fell back to raw documents.
    pub fn record_query(&self, synthesis_fell_back: bool) {
        self.queries_served.fetch_add(1, Ordering::Relaxed);
        if synthesis_fell_back {
            self.synthesis_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            ingest_failures: self.ingest_failures.load(Ordering::Relaxed),
            documents_deleted: self.documents_deleted.load(Ordering::Relaxed),
            queries_served: self.queries_served.load(Ordering::Relaxed),
            synthesis_fallbacks: self.synthesis_fallbacks.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of the service counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents stored since startup.
    pub documents_ingested: u64,
    /// Ingestion attempts that failed.
    pub ingest_failures: u64,
    /// Documents removed since startup.
    pub documents_deleted: u64,
    /// Queries answered successfully.
    pub queries_served: u64,
    /// Queries whose answer synthesis failed and fell back to ranked documents.
    pub synthesis_fallbacks: u64,
}
