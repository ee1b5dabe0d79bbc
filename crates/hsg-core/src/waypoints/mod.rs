//! Waypoint graph maintenance : insert/update/prune edges,
//! BFS expansion for query-time candidate widening, and contextual linking.
//! **Cross-sector linking.** Virtual edges `(id <-> id:sector)` record a
//! memory's participation in
//! additional sectors, but waypoints only ever connect two memory ids —
//! sectors are not separately addressable graph nodes in this schema.
//! Resolved here (recorded in DESIGN.md) by realizing cross-sector
//! participation through the memory's `additional_sectors` column plus the
//! resonance multiplier applied during hybrid scoring,
//! rather than as a persisted waypoint row.

use crate::error::Result;
use crate::metadata::MetadataStore;
use crate::model::{Waypoint, CONTEXTUAL_BASE_WEIGHT, CONTEXTUAL_INCREMENT};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, VecDeque};
use uuid::Uuid;

/// Edge weight decays by this factor per BFS hop.
const EXPANSION_DECAY: f64 = 0.8;
/// Stop expanding a branch once its accumulated weight drops below this.
const EXPANSION_MIN_WEIGHT: f64 = 0.1;

/// Upsert `(mem, rel, base=0.3)`, incrementing by 0.1 (capped at 1) on
/// repeat.
pub fn contextual_link(
    store: &dyn MetadataStore,
    mem: Uuid,
    related: &[Uuid],
    namespaces: &BTreeSet<String>,
    now: DateTime<Utc>,
) -> Result<()> {
    for &rel in related {
        let weight = match store.get_waypoint(mem, rel, namespaces)? {
            Some(existing) => (existing.weight + CONTEXTUAL_INCREMENT).min(1.0),
            None => CONTEXTUAL_BASE_WEIGHT,
        };
        store.upsert_waypoint(&Waypoint::new(mem, rel, namespaces.clone(), weight, now))?;
    }
    Ok(())
}

pub fn prune(store: &dyn MetadataStore) -> Result<u64> {
    store.prune_waypoints()
}

/// A candidate reached via BFS expansion from one or more query seeds.
#[derive(Debug, Clone)]
pub struct ExpansionHit {
    /// `parent.weight · edge.weight · 0.8`, accumulated along the path.
    pub weight: f64,
    /// Number of hops from the originating seed (1 for a direct neighbor).
    pub path_len: usize,
    /// The actual traversed path, seed first and this hit's id last —
    /// exactly the nodes `reinforce_path_edges` should strengthen, never a
    /// synthetic seed-to-hit shortcut.
    pub path: Vec<Uuid>,
}

/// BFS over the waypoint graph from `seeds`, visiting at most `budget`
/// neighbors total . Self-loops are retained as rows
/// but skipped during traversal so they never themselves expand
/// the frontier.
pub fn bfs_expand(
    store: &dyn MetadataStore,
    seeds: &[Uuid],
    budget: usize,
) -> Result<HashMap<Uuid, ExpansionHit>> {
    let mut results: HashMap<Uuid, ExpansionHit> = HashMap::new();
    let mut visited: std::collections::HashSet<Uuid> = seeds.iter().copied().collect();
    let mut frontier: VecDeque<(Uuid, f64, usize, Vec<Uuid>)> =
    seeds.iter().map(|&id| (id, 1.0, 0, vec![id])).collect();
    let mut visits = 0usize;

    while let Some((current, parent_weight, path_len, path_so_far)) = frontier.pop_front() {
        if visits >= budget {
            break;
        }
        let edges = store.outgoing_waypoints(current)?;
        for edge in edges {
            if edge.is_self_loop() {
                continue;
            }
            let child_weight = parent_weight * edge.weight * EXPANSION_DECAY;
            if child_weight < EXPANSION_MIN_WEIGHT {
                continue;
            }
            visits += 1;
            let mut child_path = path_so_far.clone();
            child_path.push(edge.dst_id);
            let entry = results.entry(edge.dst_id).or_insert(ExpansionHit {
                    weight: child_weight,
                    path_len: path_len + 1,
                    path: child_path.clone(),
            });
            if child_weight > entry.weight {
                *entry = ExpansionHit {
                    weight: child_weight,
                    path_len: path_len + 1,
                    path: child_path.clone(),
                };
            }
            if visited.insert(edge.dst_id) {
                frontier.push_back((edge.dst_id, child_weight, path_len + 1, child_path));
            }
            if visits >= budget {
                break;
            }
        }
    }

    Ok(results)
}
