//! Companion tuning knobs.

/// Configuration for the companion service.
#[derive(Debug, Clone)]
pub struct CompanionConfig {
    /// Soft initial capacity of each per-source staging buffer.
    pub buffer_capacity: usize,
    /// Staged-visit count at which a buffer is swapped out and merged.
    pub drain_threshold: usize,
    /// Maximum number of concurrently in-flight processing units.
    pub max_outstanding: usize,
    /// Entries written per source on export.
    pub top_k: usize,
    /// Worker threads sized into the processing runtime by the daemon.
    pub worker_threads: usize,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 64,
            drain_threshold: 256,
            max_outstanding: 4,
            top_k: 10,
            worker_threads: 4,
        }
    }
}

impl CompanionConfig {
    /// Preset for heavy walker fleets: deeper buffers, more admission slots.
    pub fn high_throughput() -> Self {
        Self {
            buffer_capacity: 256,
            drain_threshold: 4096,
            max_outstanding: 16,
            top_k: 10,
            worker_threads: 8,
        }
    }
}
