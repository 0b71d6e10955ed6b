//! Per-source staging of visits awaiting merge.

use crate::types::VertexId;

/// Append-only staging buffer for visited vertices.
///
/// Starts at a soft initial capacity and grows as needed; the companion
/// swaps a saturated buffer for a fresh one instead of resizing in place,
/// so a detached buffer is owned exclusively by whoever drained it.
#[derive(Debug)]
pub struct VisitBuffer {
    visits: Vec<VertexId>,
}

impl VisitBuffer {
    /// Empty buffer with the given soft initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        VisitBuffer {
            visits: Vec::with_capacity(capacity),
        }
    }

    /// Appends one visited vertex.
    pub fn push(&mut self, vertex: VertexId) {
        self.visits.push(vertex);
    }

    /// Number of staged visits.
    pub fn len(&self) -> usize {
        self.visits.len()
    }

    /// Whether the buffer holds no visits.
    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }

    /// The staged visits, insertion order irrelevant.
    pub fn visits(&self) -> &[VertexId] {
        &self.visits
    }
}
