//! Ingestion counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters updated by concurrent processing units.
///
/// All counters are monotonic and relaxed; they exist for operator
/// visibility, not for synchronization.
#[derive(Debug, Default)]
pub struct CompanionMetrics {
    batches_processed: AtomicU64,
    events_buffered: AtomicU64,
    events_discarded_at_origin: AtomicU64,
    buffer_drains: AtomicU64,
}

/// Point-in-time copy of the ingestion counters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricsSnapshot {
    /// Batches fully applied by processing units.
    pub batches_processed: u64,
    /// Visit events appended to a staging buffer.
    pub events_buffered: u64,
    /// Visit events discarded because the walk was still at its origin.
    pub events_discarded_at_origin: u64,
    /// Staging buffers swapped out and merged.
    pub buffer_drains: u64,
}

impl CompanionMetrics {
    pub(crate) fn record_batch(&self, buffered: u64, discarded: u64, drains: u64) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
        self.events_buffered.fetch_add(buffered, Ordering::Relaxed);
        self.events_discarded_at_origin
            .fetch_add(discarded, Ordering::Relaxed);
        self.buffer_drains.fetch_add(drains, Ordering::Relaxed);
    }

    pub(crate) fn record_drain(&self) {
        self.buffer_drains.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the current counter values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_processed: self.batches_processed.load(Ordering::Relaxed),
            events_buffered: self.events_buffered.load(Ordering::Relaxed),
            events_discarded_at_origin: self.events_discarded_at_origin.load(Ordering::Relaxed),
            buffer_drains: self.buffer_drains.load(Ordering::Relaxed),
        }
    }
}
