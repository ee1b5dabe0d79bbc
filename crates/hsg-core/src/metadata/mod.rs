//! Metadata store contract.
//! Pluggable behind the [`MetadataStore`] trait; `sqlite` is the reference
//! implementation. Duplicate code paths per backend are avoided by
//! abstracting behind this one contract instead of
//! hand-rolling parallel embedded/remote code paths).

pub mod migrations;
pub mod sqlite;

use crate::error::Result;
use crate::model::{EmbedLog, Memory, Sector, Waypoint};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Join a namespace set into its canonical storage/key representation.
/// `BTreeSet` iterates in sorted order, so two equal sets always produce an
/// identical key string — load-bearing for the waypoint composite key.
pub fn namespaces_key(namespaces: &BTreeSet<String>) -> String {
    namespaces.iter().cloned().collect::<Vec<_>>().join(",")
}

pub fn parse_namespaces_key(key: &str) -> BTreeSet<String> {
    key.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect()
}

/// Atomic transactions plus the prepared CRUD/lookup statements: row
/// insert/update/delete per entity, secondary lookups by
/// sector/segment/simhash/namespace, and bulk load by segment.
pub trait MetadataStore: Send + Sync {
    fn insert_memory(&self, memory: &Memory) -> Result<()>;
    fn get_memory(&self, id: Uuid) -> Result<Option<Memory>>;
    /// Full-row overwrite, used by update/decay/compression writers.
    fn replace_memory(&self, memory: &Memory) -> Result<()>;
    /// Removes the memory row and every waypoint touching it as `src` or
    /// `dst`.
    fn delete_memory(&self, id: Uuid) -> Result<()>;

    /// `upd_seen`: bump `last_seen_at` and overwrite `salience`.
    fn update_salience_and_last_seen(
        &self,
        id: Uuid,
        last_seen: DateTime<Utc>,
        salience: f64,
    ) -> Result<()>;

    /// Salience-only write, persisted only by callers that already checked
    /// the `> 0.001` delta threshold.
    fn update_salience(&self, id: Uuid, salience: f64) -> Result<()>;

    /// Nearest existing memory by simhash Hamming distance, restricted to
    /// the given namespaces . Returns
    /// `(id, hamming_distance)`.
    fn nearest_by_simhash(
        &self,
        simhash: u64,
        namespaces: &BTreeSet<String>,
    ) -> Result<Option<(Uuid, u32)>>;

    /// `(id, mean_vec)` pairs for every memory whose `primary_sector`
    /// matches, visible within `namespaces`.
    fn memories_by_primary_sector(
        &self,
        sector: Sector,
        namespaces: &BTreeSet<String>,
    ) -> Result<Vec<(Uuid, Vec<f32>)>>;

    /// `(id, mean_vec)` for every memory visible within `namespaces`, used
    /// for the ingest-time anchor-waypoint scan.
    fn all_memory_mean_vecs(&self, namespaces: &BTreeSet<String>) -> Result<Vec<(Uuid, Vec<f32>)>>;

    /// `(current_segment, rows_in_current_segment)`, used to resume
    /// [`crate::model::SegmentAllocator`] across restarts.
    fn max_segment(&self) -> Result<(u64, u64)>;

    /// All distinct segment numbers, oldest first (decay pass iterates these).
    fn all_segments(&self) -> Result<Vec<u64>>;

    /// Random sample of memory ids in `segment`, of size
    /// `⌈count(segment) · ratio⌉`.
    fn sample_segment_memory_ids(&self, segment: u64, ratio: f64) -> Result<Vec<Uuid>>;

    /// Increments `coactivation_count` by one.
    fn bump_coactivation_count(&self, id: Uuid) -> Result<()>;

    fn upsert_waypoint(&self, waypoint: &Waypoint) -> Result<()>;
    fn get_waypoint(
        &self,
        src: Uuid,
        dst: Uuid,
        namespaces: &BTreeSet<String>,
    ) -> Result<Option<Waypoint>>;
    /// All waypoints with `src_id = id`, for BFS expansion.
    fn outgoing_waypoints(&self, id: Uuid) -> Result<Vec<Waypoint>>;
    /// Deletes every waypoint where `id` appears as `src` or `dst`.
    fn delete_waypoints_touching(&self, id: Uuid) -> Result<()>;
    /// Deletes edges with weight `< PRUNE_THRESHOLD`; returns the count
    /// removed.
    fn prune_waypoints(&self) -> Result<u64>;

    fn upsert_embed_log(&self, log: &EmbedLog) -> Result<()>;
    fn get_embed_log(&self, id: Uuid, model: &str) -> Result<Option<EmbedLog>>;

    /// Append a row to `stats` ; purely
    /// observational, failures here are non-fatal to callers.
    fn record_stat(&self, kind: &str, count: i64, ts: DateTime<Utc>) -> Result<()>;
}
