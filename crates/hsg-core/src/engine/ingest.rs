//! Memory ingest: dedup check, classification, segment allocation, essence
//! extraction, per-sector embedding, and waypoint anchoring for a brand new
//! memory.

use super::HsgEngine;
use crate::classifier::{self, Classification};
use crate::chunker::{chunk_content, DEFAULT_CHUNK_SIZE};
use crate::embeddings::fuse_mean_vec;
use crate::error::Result;
use crate::essence::extract_essence;
use crate::model::{cosine_similarity, Memory, Sector, Waypoint, ANCHOR_WEIGHT, SELF_LOOP_WEIGHT};
use crate::tokenizer::{canonical_tokens, simhash::simhash_hex};
use chrono::Utc;
use std::collections::BTreeSet;
use tracing::warn;
use uuid::Uuid;

/// Inputs to [`HsgEngine::add_memory`].
#[derive(Debug, Clone, Default)]
pub struct AddMemoryRequest {
    pub namespaces: BTreeSet<String>,
    /// Caller-supplied sector override, taking precedence over classification.
    pub meta_sector: Option<Sector>,
    pub tags: serde_json::Value,
    pub meta: serde_json::Value,
    /// Initial salience; defaults to 0.5 when unset.
    pub salience: Option<f64>,
}

/// Outcome of an [`HsgEngine::add_memory`] call.
#[derive(Debug, Clone, Copy)]
pub struct AddMemoryOutcome {
    pub id: Uuid,
    /// True if this call matched an existing near-duplicate instead of
    /// inserting a new row; `id` then refers to the existing memory.
    pub deduplicated: bool,
}

/// Salience bump applied when a near-duplicate is reinforced instead of
/// inserted as a new memory.
const DEDUP_SALIENCE_BOOST: f64 = 0.15;

impl HsgEngine {
    /// Ingest one piece of content as a new memory, or reinforce an existing
    /// near-duplicate in place.
    pub fn add_memory(&self, content: &str, request: AddMemoryRequest) -> Result<AddMemoryOutcome> {
        if content.trim().is_empty() {
            return Err(crate::error::HsgError::Validation("content must not be empty".into()));
        }
        let namespaces = if request.namespaces.is_empty() {
            BTreeSet::from(["global".to_string()])
        } else {
            request.namespaces
        };

        let tokens = canonical_tokens(content);
        let memory_simhash = simhash_hex(&tokens);
        let simhash_value = crate::tokenizer::simhash::parse_hex(&memory_simhash).unwrap_or(0);

        if let Some((existing_id, distance)) = self.store.nearest_by_simhash(simhash_value, &namespaces)? {
            if distance <= self.config.hamming_dedup_threshold {
                let existing = self.store.get_memory(existing_id)?;
                if let Some(existing) = existing {
                    let boosted = (existing.salience + DEDUP_SALIENCE_BOOST).clamp(0.0, 1.0);
                    self.store.update_salience_and_last_seen(existing_id, Utc::now(), boosted)?;
                    self.salience_cache.invalidate(&existing_id);
                    return Ok(AddMemoryOutcome {
                        id: existing_id,
                        deduplicated: true,
                    });
                }
            }
        }

        let classification: Classification = classifier::classify(content, request.meta_sector);
        let segment = self.segments.lock().expect("poisoned").allocate();
        let essence = extract_essence(content, self.config.summary_max_length);
        let salience = request.salience.unwrap_or_else(|| {
            (0.4 + 0.1 * classification.additional.len() as f64).clamp(0.0, 1.0)
        });

        let chunks = chunk_content(content, DEFAULT_CHUNK_SIZE);
        let (pooled, embed_failures) =
            self.embed_chunks_all_sectors(&chunks, classification.primary, &classification.additional)?;

        let mut memory = Memory::new(
            essence,
            memory_simhash,
            classification.primary,
            classification.additional.clone(),
            request.tags,
            request.meta,
            namespaces.clone(),
            segment,
            salience,
            Utc::now(),
        );

        let rollback = |engine: &Self, id: Uuid| {
            if let Err(e) = engine.store.delete_waypoints_touching(id) {
                warn!(error = %e, %id, "rollback: failed to clear waypoints");
            }
            if let Err(e) = engine.vectors.delete(id, None, None) {
                warn!(error = %e, %id, "rollback: failed to clear vectors");
            }
            if let Err(e) = engine.store.delete_memory(id) {
                warn!(error = %e, %id, "rollback: failed to delete memory row");
            }
        };

        self.store.insert_memory(&memory)?;
        self.record_embed_failures(memory.id, &embed_failures);

        let write_result = (|| -> Result<()> {
            for (sector, vector) in &pooled {
                self.vectors.upsert(memory.id, *sector, namespaces.clone(), vector.clone())?;
            }
            let fused = fuse_mean_vec(&pooled);
            memory.mean_dim = Some(fused.len() as u32);
            memory.mean_vec = Some(fused.clone());
            self.store.replace_memory(&memory)?;
            self.link_into_graph(&memory, &fused)?;
            Ok(())
        })();

        if let Err(e) = write_result {
            rollback(self, memory.id);
            return Err(e);
        }

        self.query_cache.clear();
        Ok(AddMemoryOutcome {
            id: memory.id,
            deduplicated: false,
        })
    }

    /// Anchor the new memory into the waypoint graph: link to its nearest
    /// existing neighbor by mean-vector cosine similarity if one clears the
    /// link threshold, otherwise record a self-loop so every memory has at
    /// least one outgoing edge; then fan out contextual links to other
    /// memories sharing its primary sector.
    fn link_into_graph(&self, memory: &Memory, mean_vec: &[f32]) -> Result<()> {
        let now = Utc::now();
        let candidates = self.store.all_memory_mean_vecs(&memory.namespaces)?;
        let mut best: Option<(Uuid, f32)> = None;
        for (id, vector) in &candidates {
            if *id == memory.id {
                continue;
            }
            let similarity = cosine_similarity(mean_vec, vector);
            if best.map(|(_, s)| similarity > s).unwrap_or(true) {
                best = Some((*id, similarity));
            }
        }

        match best {
            Some((neighbor, similarity)) if similarity >= self.config.link_similarity_threshold => {
                self.store
                    .upsert_waypoint(&Waypoint::new(memory.id, neighbor, memory.namespaces.clone(), ANCHOR_WEIGHT, now))?;
            }
            _ => {
                self.store.upsert_waypoint(&Waypoint::new(
                    memory.id,
                    memory.id,
                    memory.namespaces.clone(),
                    SELF_LOOP_WEIGHT,
                    now,
                ))?;
            }
        }

        // Inter-memory waypoints within the new memory's primary sector: every
        // existing memory there clearing the link threshold gets a symmetric
        // pair of edges, distinct from the incrementing contextual-link weight
        // used by `waypoints::contextual_link` for caller-driven linking.
        let sector_mates = self.store.memories_by_primary_sector(memory.primary_sector, &memory.namespaces)?;
        for (other, vector) in &sector_mates {
            if *other == memory.id {
                continue;
            }
            if cosine_similarity(mean_vec, vector) >= self.config.link_similarity_threshold {
                self.store
                    .upsert_waypoint(&Waypoint::new(memory.id, *other, memory.namespaces.clone(), ANCHOR_WEIGHT, now))?;
                self.store
                    .upsert_waypoint(&Waypoint::new(*other, memory.id, memory.namespaces.clone(), ANCHOR_WEIGHT, now))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::sqlite::SqliteMetadataStore;
    use crate::vector_repo::embedded::EmbeddedVectorRepository;
    use std::sync::Arc;

    fn engine() -> (tempfile::TempDir, HsgEngine) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteMetadataStore::open(&dir.path().join("db.sqlite3")).unwrap());
        let vectors = Arc::new(EmbeddedVectorRepository::new());
        let engine = HsgEngine::new(crate::config::Config::default(), store, vectors).unwrap();
        (dir, engine)
    }

    #[test]
    fn rejects_empty_content() {
        let (_dir, engine) = engine();
        let err = engine.add_memory("   ", AddMemoryRequest::default());
        assert!(err.is_err());
    }

    #[test]
    fn first_memory_gets_a_self_loop_anchor() {
        let (_dir, engine) = engine();
        let outcome = engine
            .add_memory("Yesterday I met Alice at the park for coffee.", AddMemoryRequest::default())
            .unwrap();
        assert!(!outcome.deduplicated);
        let edges = engine.store.outgoing_waypoints(outcome.id).unwrap();
        assert_eq!(edges.len(), 1);
        assert!(edges[0].is_self_loop());
    }

    #[test]
    fn near_duplicate_reinforces_instead_of_inserting() {
        let (_dir, engine) = engine();
        let first = engine
            .add_memory("Bob taught me how to solder a circuit board.", AddMemoryRequest::default())
            .unwrap();
        let second = engine
            .add_memory("Bob taught me how to solder a circuit board!", AddMemoryRequest::default())
            .unwrap();
        assert!(second.deduplicated);
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn similar_memory_anchors_to_existing_neighbor() {
        let (_dir, engine) = engine();
        let first = engine
            .add_memory(
                "The quarterly revenue report showed growth across every region this year.",
                AddMemoryRequest::default(),
            )
            .unwrap();
        let second = engine
            .add_memory(
                "The quarterly revenue report showed growth across every region last quarter.",
                AddMemoryRequest::default(),
            )
            .unwrap();
        if first.id != second.id {
            let edges = engine.store.outgoing_waypoints(second.id).unwrap();
            assert!(edges.iter().any(|w| !w.is_self_loop()));
        }
    }
}
