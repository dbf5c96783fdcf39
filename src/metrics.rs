use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing rewrite activity.
#[derive(Default)]
pub struct RewriteMetrics {
    documents_processed: AtomicU64,
    chunks_rewritten: AtomicU64,
    chunks_fallback: AtomicU64,
    last_chunk_budget: AtomicU64,
}

impl RewriteMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed document run.
    pub fn record_document(&self, rewritten: u64, fallbacks: u64, chunk_budget: u64) {
        self.documents_processed.fetch_add(1, Ordering::Relaxed);
        self.chunks_rewritten.fetch_add(rewritten, Ordering::Relaxed);
        self.chunks_fallback.fetch_add(fallbacks, Ordering::Relaxed);
        self.last_chunk_budget.store(chunk_budget, Ordering::Relaxed);
    }

    /// Record a run that aborted because no chunk could be rewritten.
    pub fn record_failed_run(&self, attempted: u64) {
        self.chunks_fallback.fetch_add(attempted, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let last_chunk_budget = self.last_chunk_budget.load(Ordering::Relaxed);
        MetricsSnapshot {
            documents_processed: self.documents_processed.load(Ordering::Relaxed),
            chunks_rewritten: self.chunks_rewritten.load(Ordering::Relaxed),
            chunks_fallback: self.chunks_fallback.load(Ordering::Relaxed),
            last_chunk_budget: (last_chunk_budget > 0).then_some(last_chunk_budget),
        }
    }
}

/// Immutable view of rewrite counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents that completed the pipeline since startup.
    pub documents_processed: u64,
    /// Chunks successfully rewritten by the remote service.
    pub chunks_rewritten: u64,
    /// Chunks that kept their original text after a remote failure.
    pub chunks_fallback: u64,
    /// Token budget used for the most recent document, if any.
    pub last_chunk_budget: Option<u64>,
}
