//! Walk identifiers.
//!
//! Walkers tag every walk with an opaque 64-bit id packing the originating
//! source index into the upper half and a per-source instance counter into
//! the lower half. The companion only ever consumes the source half; the
//! instance counter exists so walkers can tell their own walks apart.

use serde::{Deserialize, Serialize};

/// Opaque identifier of one simulated random walk.
///
/// Decoding is pure and total: every `u64` decodes to *some* source index.
/// Whether that index names a registered source is the walker's contract to
/// uphold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalkId(pub u64);

impl WalkId {
    /// Packs a source index and instance counter into a walk id.
    pub fn encode(source_index: u32, instance: u32) -> Self {
        WalkId((u64::from(source_index) << 32) | u64::from(instance))
    }

    /// Index of the source this walk was launched from.
    pub fn source_index(self) -> usize {
        (self.0 >> 32) as usize
    }

    /// Per-source instance counter. Not consumed by the companion.
    pub fn instance(self) -> u32 {
        self.0 as u32
    }
}

impl From<u64> for WalkId {
    fn from(raw: u64) -> Self {
        WalkId(raw)
    }
}
