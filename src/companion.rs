//! The companion service core.
//!
//! Walkers report walk positions in batches; the companion decodes which
//! source each walk belongs to, stages the visit in that source's buffer,
//! and folds saturated buffers into the source's distribution. Admission of
//! batches is throttled by a counting semaphore whose consumed permits are
//! the number of in-flight processing units; export acquires every permit,
//! which both waits out in-flight units and parks new submissions until the
//! output file is written.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task;
use tracing::{debug, error, info};

use crate::buffer::VisitBuffer;
use crate::config::CompanionConfig;
use crate::distribution::{Distribution, VertexCount};
use crate::error::{CompanionError, Result};
use crate::metrics::{CompanionMetrics, MetricsSnapshot};
use crate::types::VertexId;
use crate::walk::WalkId;

/// Summary returned by a completed export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    /// Number of source lines written.
    pub sources: usize,
    /// Path the distributions were written to.
    pub path: PathBuf,
    /// Duration of the export in milliseconds.
    pub duration_ms: f64,
}

/// Point-in-time operational state of the companion.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    /// Number of registered sources.
    pub sources: usize,
    /// Processing units currently in flight.
    pub in_flight: usize,
    /// Ingestion counters.
    #[serde(flatten)]
    pub counters: MetricsSnapshot,
}

struct SlotState {
    buffer: VisitBuffer,
    distribution: Distribution,
}

/// One source's mutual-exclusion domain: its seed vertex plus the
/// mutex-guarded buffer and distribution. Slots never coordinate with each
/// other.
struct SourceSlot {
    seed: VertexId,
    state: Mutex<SlotState>,
}

struct Inner {
    config: CompanionConfig,
    slots: OnceLock<Vec<SourceSlot>>,
    admission: Arc<Semaphore>,
    metrics: CompanionMetrics,
}

/// Aggregation companion for a fleet of random-walk processes.
///
/// Cheap to clone; clones share state. [`Companion::register_sources`] must
/// run once before any other call — the remaining operations treat an
/// unregistered companion as a programming error and panic.
#[derive(Clone)]
pub struct Companion {
    inner: Arc<Inner>,
}

impl Companion {
    /// Creates an empty companion with the given configuration.
    pub fn new(config: CompanionConfig) -> Self {
        let admission = Arc::new(Semaphore::new(config.max_outstanding));
        Companion {
            inner: Arc::new(Inner {
                config,
                slots: OnceLock::new(),
                admission,
                metrics: CompanionMetrics::default(),
            }),
        }
    }

    /// Registers the seed vertex of every source, in source-index order.
    ///
    /// Each source gets a fresh staging buffer and a distribution whose
    /// avoid-set already contains the source's own seed vertex. Callable
    /// exactly once.
    pub fn register_sources(&self, seeds: &[VertexId]) -> Result<()> {
        let slots: Vec<SourceSlot> = seeds
            .iter()
            .map(|&seed| SourceSlot {
                seed,
                state: Mutex::new(SlotState {
                    buffer: VisitBuffer::with_capacity(self.inner.config.buffer_capacity),
                    distribution: Distribution::avoidance(&[seed]),
                }),
            })
            .collect();
        self.inner
            .slots
            .set(slots)
            .map_err(|_| CompanionError::AlreadyRegistered)?;
        info!(sources = seeds.len(), "companion.sources.registered");
        Ok(())
    }

    /// Number of registered sources, or `None` before registration.
    pub fn source_count(&self) -> Option<usize> {
        self.inner.slots.get().map(Vec::len)
    }

    /// Processing units currently holding an admission permit.
    pub fn outstanding(&self) -> usize {
        self.inner.config.max_outstanding - self.inner.admission.available_permits()
    }

    /// Permanently excludes the given vertices from one source's results.
    ///
    /// Any counts already held for them are dropped and later visits are
    /// ignored. Repeating ids is harmless.
    pub fn add_avoidance(&self, source_index: usize, vertices: &[VertexId]) {
        let slot = &self.inner.registered()[source_index];
        let avoid = Distribution::avoidance(vertices);
        slot.state.lock().distribution.absorb(avoid);
        debug!(source_index, vertices = vertices.len(), "companion.avoidance.added");
    }

    /// Submits one batch of (walk, vertex) pairs for asynchronous processing.
    ///
    /// Suspends until an admission permit is free, then spawns a
    /// blocking-pool unit owning the permit and returns. The two vectors
    /// must be equal-length and index-aligned; a mismatch is a programming
    /// error in the walker and panics.
    pub async fn process_batch(&self, walks: Vec<WalkId>, vertices: Vec<VertexId>) {
        assert_eq!(
            walks.len(),
            vertices.len(),
            "walk and vertex arrays must be index-aligned"
        );
        // Fail in the caller if registration never happened.
        let _ = self.inner.registered();

        let permit = self
            .inner
            .admission
            .clone()
            .acquire_owned()
            .await
            .expect("admission semaphore is never closed");
        let inner = Arc::clone(&self.inner);
        let unit = task::spawn_blocking(move || {
            // Holds the admission slot for the unit's whole lifetime; drop
            // releases it on success and panic alike.
            let _permit = permit;
            inner.apply_batch(&walks, &vertices);
        });
        // At-most-once: a failed unit is logged, never requeued.
        tokio::spawn(async move {
            if let Err(err) = unit.await {
                error!(%err, "companion.batch.failed");
            }
        });
    }

    /// Current top-`k` for one source.
    ///
    /// Force-drains the source's staging buffer first, so the answer
    /// reflects every visit whose processing unit has completed.
    pub fn top(&self, source_index: usize, k: usize) -> Vec<VertexCount> {
        let slot = &self.inner.registered()[source_index];
        self.inner.drain_slot(slot);
        slot.state.lock().distribution.top(k)
    }

    /// Waits for all in-flight units, then writes every source's top-K.
    ///
    /// Acquiring the full admission capacity doubles as the drain barrier:
    /// no unit is in flight while the permits are held, and new submissions
    /// stay parked until the export finishes. One line per source, in
    /// registration order; an I/O failure is logged and returned without
    /// retracting lines already written, and the service stays usable.
    pub async fn export_top(&self, path: impl AsRef<Path>) -> Result<ExportReport> {
        let path = path.as_ref().to_path_buf();
        let capacity = self.inner.config.max_outstanding as u32;
        let permits = self
            .inner
            .admission
            .clone()
            .acquire_many_owned(capacity)
            .await
            .expect("admission semaphore is never closed");
        let inner = Arc::clone(&self.inner);
        let result = task::spawn_blocking(move || {
            let _permits = permits;
            inner.write_distributions(&path)
        })
        .await?;
        if let Err(err) = &result {
            error!(%err, "companion.export.failed");
        }
        result
    }

    /// Operational snapshot for the stats surface.
    pub fn stats(&self) -> StatsReport {
        StatsReport {
            sources: self.source_count().unwrap_or(0),
            in_flight: self.outstanding(),
            counters: self.inner.metrics.snapshot(),
        }
    }
}

impl Inner {
    fn registered(&self) -> &[SourceSlot] {
        self.slots
            .get()
            .expect("register_sources must run before any other companion call")
    }

    fn apply_batch(&self, walks: &[WalkId], vertices: &[VertexId]) {
        let start = Instant::now();
        let slots = self.registered();
        let mut buffered = 0u64;
        let mut discarded = 0u64;
        let mut drains = 0u64;
        for (walk, &vertex) in walks.iter().zip(vertices) {
            // Out-of-range decode is a walker bug; the index panic fails
            // this unit only, and its permit is released by drop.
            let slot = &slots[walk.source_index()];
            if vertex == slot.seed {
                // Walk has not left its origin, not a meaningful visit.
                discarded += 1;
                continue;
            }
            buffered += 1;
            let detached = {
                let mut state = slot.state.lock();
                state.buffer.push(vertex);
                if state.buffer.len() >= self.config.drain_threshold {
                    Some(mem::replace(
                        &mut state.buffer,
                        VisitBuffer::with_capacity(self.config.buffer_capacity),
                    ))
                } else {
                    None
                }
            };
            if let Some(full) = detached {
                drains += 1;
                // Counting the detached buffer is the expensive half of the
                // drain; keep it outside the slot lock.
                let delta = Distribution::from_visits(full.visits());
                slot.state.lock().distribution.absorb(delta);
            }
        }
        self.metrics.record_batch(buffered, discarded, drains);
        debug!(
            walks = walks.len(),
            buffered,
            discarded,
            drains,
            duration_ms = start.elapsed().as_secs_f64() * 1_000.0,
            "companion.batch.applied"
        );
    }

    fn drain_slot(&self, slot: &SourceSlot) {
        let detached = {
            let mut state = slot.state.lock();
            if state.buffer.is_empty() {
                return;
            }
            mem::replace(
                &mut state.buffer,
                VisitBuffer::with_capacity(self.config.buffer_capacity),
            )
        };
        let delta = Distribution::from_visits(detached.visits());
        slot.state.lock().distribution.absorb(delta);
        self.metrics.record_drain();
    }

    fn write_distributions(&self, path: &Path) -> Result<ExportReport> {
        let start = Instant::now();
        let slots = self.registered();
        let mut writer = BufWriter::new(File::create(path)?);
        for slot in slots {
            self.drain_slot(slot);
            let top = {
                let state = slot.state.lock();
                state.distribution.top(self.config.top_k)
            };
            write!(writer, "{}\t", slot.seed)?;
            for entry in &top {
                write!(writer, "\t{},{}", entry.vertex, entry.count)?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        let report = ExportReport {
            sources: slots.len(),
            path: path.to_path_buf(),
            duration_ms: start.elapsed().as_secs_f64() * 1_000.0,
        };
        info!(
            sources = report.sources,
            duration_ms = report.duration_ms,
            path = %report.path.display(),
            "companion.export.complete"
        );
        Ok(report)
    }
}
