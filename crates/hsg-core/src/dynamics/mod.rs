//! Co-activation buffer / Hebbian dynamics and retrieval reinforcement.
//!
//! Modeled as a deterministic phase (reinforcement, path propagation) plus a
//! separate periodic task draining a bounded [`tokio::sync::mpsc`] channel
//! fed by query side effects, drained by a `tokio::time::interval` loop
//! owned by the engine (see `engine.rs`), not a global singleton.

use crate::error::Result;
use crate::metadata::MetadataStore;
use crate::model::Waypoint;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

/// Temporal factor time constant, 1 hour.
const CO_ACTIVATION_TAU_MS: f64 = 3_600_000.0;
/// Hebbian learning rate.
const CO_ACTIVATION_ETA: f64 = 0.1;
/// Default boost for `reinforce_memory` / retrieval reinforcement.
pub const RETRIEVAL_TRACE_DEFAULT_BOOST: f64 = 0.1;
/// Per-edge path reinforcement cap.
const PATH_EDGE_REINFORCE_STEP: f64 = 0.05;
/// Propagation fraction to linked nodes.
const PROPAGATION_GAMMA: f64 = 0.2;
/// Propagation's own time-decay rate.
const PROPAGATION_DECAY_RATE: f64 = 0.02;
/// Pairs drained per tick.
pub const DRAIN_BATCH_SIZE: usize = 50;

/// `sal' = apply_retrieval_trace(id, sal)` : a clamped
/// additive boost, shared with the explicit `reinforce_memory` operation.
pub fn apply_retrieval_trace(salience: f64, boost: f64) -> f64 {
    (salience + boost).clamp(0.0, 1.0)
}

/// Reinforce every edge along `path` by up to `+0.05`, clamped to 1.
/// Applies to results whose traversal path length is greater than 1.
pub fn reinforce_path_edges(
    store: &dyn MetadataStore,
    path: &[Uuid],
    namespaces: &BTreeSet<String>,
    now: DateTime<Utc>,
) -> Result<()> {
    for pair in path.windows(2) {
        let (src, dst) = (pair[0], pair[1]);
        let weight = store
        .get_waypoint(src, dst, namespaces)?
        .map(|w| w.weight)
        .unwrap_or(0.0);
        let new_weight = (weight + PATH_EDGE_REINFORCE_STEP).min(1.0);
        store.upsert_waypoint(&Waypoint::new(src, dst, namespaces.clone(), new_weight, now))?;
    }
    Ok(())
}

/// Propagate a fraction of `from_salience_new`'s gain over `linked_id`'s
/// current salience, decayed by `delta_days`.
pub fn propagate_to_linked(
    store: &dyn MetadataStore,
    linked_id: Uuid,
    from_salience_new: f64,
    delta_days: f64,
) -> Result<()> {
    let Some(linked) = store.get_memory(linked_id)? else {
        return Ok(());
    };
    let delta = PROPAGATION_GAMMA * (from_salience_new - linked.salience) * (-PROPAGATION_DECAY_RATE * delta_days).exp();
    let new_salience = (linked.salience + delta).clamp(0.0, 1.0);
    store.update_salience(linked_id, new_salience)
}

fn hebbian_weight(existing: f64, dt_ms: f64) -> f64 {
    let f = (-dt_ms / CO_ACTIVATION_TAU_MS).exp();
    (existing + CO_ACTIVATION_ETA * (1.0 - existing) * f).min(1.0)
}

/// Process one co-activation pair : missing endpoints are
/// skipped silently. The pair is unordered, so edges are canonicalized
/// `min(a,b) -> max(a,b)` to avoid two drifting directed edges for what is
/// really a single undirected strengthening event.
fn process_pair(store: &dyn MetadataStore, a: Uuid, b: Uuid, now: DateTime<Utc>) -> Result<()> {
    let (Some(mem_a), Some(mem_b)) = (store.get_memory(a)?, store.get_memory(b)?) else {
        return Ok(());
    };
    let dt_ms = (mem_a.last_seen_at - mem_b.last_seen_at).num_milliseconds().unsigned_abs() as f64;
    let namespaces: BTreeSet<String> = mem_a.namespaces.intersection(&mem_b.namespaces).cloned().collect();
    let namespaces = if namespaces.is_empty() { mem_a.namespaces.clone() } else { namespaces };

    let (src, dst) = if a <= b { (a, b) } else { (b, a) };
    let existing = store.get_waypoint(src, dst, &namespaces)?.map(|w| w.weight).unwrap_or(0.0);
    let new_weight = hebbian_weight(existing, dt_ms);
    store.upsert_waypoint(&Waypoint::new(src, dst, namespaces, new_weight, now))?;
    store.bump_coactivation_count(a)?;
    store.bump_coactivation_count(b)?;
    Ok(())
}

/// Producer handle for the co-activation buffer: pushes every unordered
/// pair among `ids`.
#[derive(Clone)]
pub struct CoActivationSender {
    tx: mpsc::Sender<(Uuid, Uuid)>,
}

impl CoActivationSender {
    pub fn push_result_set(&self, ids: &[Uuid]) {
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                if let Err(e) = self.tx.try_send((ids[i], ids[j])) {
                    warn!(error = %e, "co-activation buffer full, dropping pair");
                }
            }
        }
    }
}

/// Create a bounded co-activation channel; `capacity` bounds the FIFO to a
/// small fixed size per tick.
pub fn co_activation_channel(capacity: usize) -> (CoActivationSender, mpsc::Receiver<(Uuid, Uuid)>) {
    let (tx, rx) = mpsc::channel(capacity);
    (CoActivationSender { tx }, rx)
}

/// Drain up to [`DRAIN_BATCH_SIZE`] pairs from `receiver`, applying the
/// Hebbian update to each . Per-pair errors are logged and
/// swallowed so one bad pair never blocks the rest of the tick.
pub fn drain_tick(store: &dyn MetadataStore, receiver: &mut mpsc::Receiver<(Uuid, Uuid)>) -> usize {
    let now = Utc::now();
    let mut processed = 0;
    while processed < DRAIN_BATCH_SIZE {
        match receiver.try_recv() {
            Ok((a, b)) => {
                if let Err(e) = process_pair(store, a, b, now) {
                    warn!(error = %e, "co-activation drain: failed to update edge, skipping");
                }
                processed += 1;
            }
            Err(_) => break,
        }
    }
    processed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::sqlite::SqliteMetadataStore;
    use crate::model::{Memory, Sector};

    fn store() -> (tempfile::TempDir, SqliteMetadataStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteMetadataStore::open(&dir.path().join("db.sqlite3")).unwrap();
        (dir, store)
    }

    fn insert(store: &SqliteMetadataStore) -> Uuid {
        let m = Memory::new(
            "e".into(),
            "0".repeat(16),
            Sector::Semantic,
            vec![],
            serde_json::Value::Null,
            serde_json::Value::Null,
            BTreeSet::from(["global".to_string()]),
            0,
            0.4,
            Utc::now(),
        );
        store.insert_memory(&m).unwrap();
        m.id
    }

    #[test]
    fn drain_tick_creates_edges_for_coactivated_pairs() {
        let (_dir, store) = store();
        let a = insert(&store);
        let b = insert(&store);
        let c = insert(&store);
        let (sender, mut receiver) = co_activation_channel(64);
        sender.push_result_set(&[a, b, c]);
        let processed = drain_tick(&store, &mut receiver);
        assert_eq!(processed, 3);

        let ns = BTreeSet::from(["global".to_string()]);
        for (x, y) in [(a, b), (a, c), (b, c)] {
            let (lo, hi) = if x <= y { (x, y) } else { (y, x) };
            let edge = store.get_waypoint(lo, hi, &ns).unwrap().unwrap();
            assert!(edge.weight > 0.0 && edge.weight <= 1.0);
        }
    }

    #[test]
    fn missing_endpoint_is_skipped_silently() {
        let (_dir, store) = store();
        let a = insert(&store);
        let missing = Uuid::new_v4();
        let (sender, mut receiver) = co_activation_channel(8);
        sender.push_result_set(&[a, missing]);
        let processed = drain_tick(&store, &mut receiver);
        assert_eq!(processed, 1);
    }

    #[test]
    fn retrieval_trace_is_clamped() {
        assert_eq!(apply_retrieval_trace(0.95, 0.1), 1.0);
        assert!((apply_retrieval_trace(0.5, 0.1) - 0.6).abs() < 1e-9);
    }
}
