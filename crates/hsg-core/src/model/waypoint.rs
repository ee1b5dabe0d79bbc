//! `Waypoint` : a directed weighted edge in the associative graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Edges with weight below this are pruned.
pub const PRUNE_THRESHOLD: f64 = 0.05;

/// Weight assigned to the ingest-time anchor edge when the best candidate
/// similarity clears the link threshold.
pub const ANCHOR_WEIGHT: f64 = 0.5;

/// Weight of the self-loop inserted when no neighbor clears the link
/// threshold.
pub const SELF_LOOP_WEIGHT: f64 = 1.0;

/// Cosine threshold above which two memories are linked at ingest.
pub const LINK_SIMILARITY_THRESHOLD: f64 = 0.75;

/// Base weight for a freshly-created contextual link.
pub const CONTEXTUAL_BASE_WEIGHT: f64 = 0.3;

/// Increment applied to an existing contextual link on repeat.
pub const CONTEXTUAL_INCREMENT: f64 = 0.1;

/// Weight of the virtual cross-sector edge recorded at ingest.
pub const CROSS_SECTOR_WEIGHT: f64 = 0.5;

/// A directed weighted edge `src_id -> dst_id`.
/// Keyed by the composite `(src_id, dst_id, namespace)` — *not* the
/// single-outbound-edge-per-namespace shape some reference code paths
/// suggest. Insertion is idempotent: a repeat insert upserts `weight` and
/// `updated_at`.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    pub src_id: Uuid,
    pub dst_id: Uuid,
    pub namespaces: BTreeSet<String>,
    /// In `(0, 1]`.
    pub weight: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Waypoint {
    pub fn new(
        src_id: Uuid,
        dst_id: Uuid,
        namespaces: BTreeSet<String>,
        weight: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            src_id,
            dst_id,
            namespaces,
            weight: weight.clamp(f64::MIN_POSITIVE, 1.0),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.src_id == self.dst_id
    }

    pub fn is_prunable(&self) -> bool {
        self.weight < PRUNE_THRESHOLD
    }
}
