//! Hybrid query: per-sector vector search widened by waypoint-graph
//! expansion, scored by a blend of similarity, token overlap, graph
//! proximity, recency, and sector resonance.

use super::HsgEngine;
use crate::classifier;
use crate::decay::{self, needs_reembedding};
use crate::dynamics::{self, RETRIEVAL_TRACE_DEFAULT_BOOST};
use crate::error::Result;
use crate::model::{Memory, Sector, CROSS_SECTOR_WEIGHT};
use crate::tokenizer::{canonical_tokens, token_overlap};
use crate::vector_repo::embedded::MAX_SCAN_CANDIDATES;
use crate::waypoints::{bfs_expand, ExpansionHit};
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;
use uuid::Uuid;

/// Inputs to [`HsgEngine::query`].
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub text: String,
    pub k: usize,
    pub namespaces: BTreeSet<String>,
    /// Restrict candidate sectors to this set, if non-empty.
    pub sectors: BTreeSet<Sector>,
    /// Drop candidates whose decayed salience falls below this floor.
    pub min_salience: Option<f64>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            text: String::new(),
            k: 10,
            namespaces: BTreeSet::new(),
            sectors: BTreeSet::new(),
            min_salience: None,
        }
    }
}

/// One ranked result.
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub id: Uuid,
    pub score: f64,
    pub primary_sector: Sector,
    /// Every sector this memory has a vector in, `{primary} ∪ additional`.
    pub sectors: BTreeSet<Sector>,
    pub essence: String,
    pub salience: f64,
    pub last_seen_at: chrono::DateTime<Utc>,
    /// Hop count from the nearest direct vector match; 0 for a direct hit.
    pub path_len: usize,
}

/// A merged scan/expansion candidate, keyed by memory id.
struct Candidate {
    similarity: f32,
    expansion: Option<ExpansionHit>,
}

/// Minimum candidate pool width a mean-of-top-8 confidence check needs.
const CONFIDENCE_SAMPLE: usize = 8;
/// Confidence floor above which graph expansion is skipped entirely.
const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.55;
/// Sigmoid steepness applied to the boosted-similarity input.
const BOOST_TAU: f64 = 3.0;
/// Z-score normalization epsilon.
const Z_EPSILON: f64 = 1e-8;

impl HsgEngine {
    /// Run a hybrid query and return up to `options.k` ranked hits.
    pub fn query(&self, options: QueryOptions) -> Result<Vec<QueryHit>> {
        let _guard = self.admit_query()?;
        let namespaces = if options.namespaces.is_empty() {
            BTreeSet::from(["global".to_string()])
        } else {
            options.namespaces.clone()
        };
        let k = options.k.max(1);

        let cache_key = crate::cache::query_cache_key(
            &options.text,
            k,
            &namespaces,
            &options.sectors,
            options.min_salience,
        );
        if let Some(cached) = self.query_cache.get(&cache_key) {
            return Ok(cached);
        }

        let classification = classifier::classify(&options.text, None);
        let query_tokens = canonical_tokens(&options.text);

        // Candidate sectors = {primary} ∪ additional, intersected with the
        // caller's sector filter if present; default to {semantic} if that
        // intersection is empty.
        let mut candidate_sectors: BTreeSet<Sector> = BTreeSet::from([classification.primary]);
        candidate_sectors.extend(classification.additional.iter().copied());
        if !options.sectors.is_empty() {
            candidate_sectors = candidate_sectors
                .intersection(&options.sectors)
                .copied()
                .collect();
        }
        if candidate_sectors.is_empty() {
            candidate_sectors.insert(Sector::Semantic);
        }

        // Query embedding has no memory id to attach an `EmbedLog` to; a
        // provider failure here just falls back to the synthetic vector
        // (handled inside `embed_one_sector`), so the failure list is only
        // worth a warning, not a persisted record.
        let (per_sector_query_vec, query_embed_failures) =
            self.embed_sectors(&options.text, &candidate_sectors)?;
        for (sector, err) in &query_embed_failures {
            warn!(%sector, error = %err, "query embedding fell back to synthetic");
        }

        // Step 4: per candidate sector, retain the top `3k` scan hits before
        // merging sectors so one dense sector can't crowd out the others.
        let mut candidates: HashMap<Uuid, Candidate> = HashMap::new();
        for (sector, vector) in &per_sector_query_vec {
            let mut hits = self
                .vectors
                .search(vector, *sector, Some(&namespaces), MAX_SCAN_CANDIDATES, false)?;
            hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
            hits.truncate(k * 3);
            for hit in hits {
                let entry = candidates.entry(hit.id).or_insert(Candidate {
                    similarity: hit.similarity,
                    expansion: None,
                });
                if hit.similarity > entry.similarity {
                    entry.similarity = hit.similarity;
                }
            }
        }

        let mut ranked: Vec<(Uuid, f32)> = candidates.iter().map(|(id, c)| (*id, c.similarity)).collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));

        // Step 5: mean of the top-8 similarities, confidence gate, expansion budget.
        let sample = ranked.len().min(CONFIDENCE_SAMPLE);
        let mean_top = if sample == 0 {
            0.0
        } else {
            ranked[..sample].iter().map(|(_, s)| *s as f64).sum::<f64>() / sample as f64
        };
        let high_conf = mean_top >= HIGH_CONFIDENCE_THRESHOLD;
        let adapt_exp = ((0.3 * k as f64 * (1.0 - mean_top)).ceil() as usize).max(0);
        let eff_k = k + adapt_exp;

        let seeds: Vec<Uuid> = ranked.iter().map(|(id, _)| *id).collect();
        if !high_conf && !seeds.is_empty() {
            let visit_budget = (2 * k).max(1);
            let expansions = bfs_expand(self.store.as_ref(), &seeds, visit_budget)?;
            for (id, hit) in expansions {
                let entry = candidates.entry(id).or_insert(Candidate {
                    similarity: 0.0,
                    expansion: None,
                });
                let better = entry.expansion.as_ref().map(|e| hit.weight > e.weight).unwrap_or(true);
                if better {
                    entry.expansion = Some(hit);
                }
            }
        }

        let now = Utc::now();
        // (id, sigmoid score, memory, path_len, decayed salience, traversal path)
        let mut scored: Vec<(Uuid, f64, Memory, usize, f64, Option<Vec<Uuid>>)> = Vec::new();
        for (id, candidate) in &candidates {
            let Some(memory) = self.store.get_memory(*id)? else {
                continue;
            };
            if !memory.visible_in(&namespaces) {
                continue;
            }
            let (raw, decayed_sal) = self.hybrid_raw_score(&query_tokens, &classification, candidate, &memory, now);
            if let Some(floor) = options.min_salience {
                if decayed_sal < floor {
                    continue;
                }
            }
            let sigmoid = 1.0 / (1.0 + (-raw).exp());
            let path_len = candidate.expansion.as_ref().map(|e| e.path_len).unwrap_or(0);
            let path = candidate.expansion.as_ref().map(|e| e.path.clone());
            scored.push((*id, sigmoid, memory, path_len, decayed_sal, path));
        }

        // Step 8: take the top `eff_k` by raw score, z-score within that
        // slice, re-sort, then truncate to `k`.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(eff_k.max(k));

        let mean: f64 = if scored.is_empty() {
            0.0
        } else {
            scored.iter().map(|(_, s, _, _, _, _)| *s).sum::<f64>() / scored.len() as f64
        };
        let variance: f64 = if scored.is_empty() {
            0.0
        } else {
            scored.iter().map(|(_, s, _, _, _, _)| (s - mean).powi(2)).sum::<f64>() / scored.len() as f64
        };
        let std_dev = variance.sqrt();

        scored.sort_by(|a, b| {
            let za = (a.1 - mean) / (std_dev + Z_EPSILON);
            let zb = (b.1 - mean) / (std_dev + Z_EPSILON);
            zb.partial_cmp(&za).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);

        let hits: Vec<QueryHit> = scored
            .iter()
            .map(|(id, score, memory, path_len, _, _)| {
                let mut sectors = BTreeSet::from([memory.primary_sector]);
                sectors.extend(memory.additional_sectors.iter().copied());
                QueryHit {
                    id: *id,
                    score: *score,
                    primary_sector: memory.primary_sector,
                    sectors,
                    essence: memory.essence.clone(),
                    salience: memory.salience,
                    last_seen_at: memory.last_seen_at,
                    path_len: *path_len,
                }
            })
            .collect();

        self.apply_query_side_effects(&scored, now);

        self.query_cache.put(cache_key, hits.clone());
        Ok(hits)
    }

    /// Hybrid raw score: `0.6·boosted(bs) + 0.2·tok_ov + 0.15·ww + 0.05·rec +
    /// keyword_boost`, `boosted(s) = 1 − exp(−3·s)`. `bs` (best-observed
    /// per-sector similarity) is multiplied by a cross-sector resonance
    /// factor first, folding the resonance signal into the one similarity
    /// input the formula actually consumes. Also returns the memory's
    /// salience decayed to `now`, carried forward into the retrieval-trace
    /// reinforcement side effect.
    fn hybrid_raw_score(
        &self,
        query_tokens: &[String],
        classification: &classifier::Classification,
        candidate: &Candidate,
        memory: &Memory,
        now: chrono::DateTime<Utc>,
    ) -> (f64, f64) {
        let resonates = memory.primary_sector == classification.primary
            || memory.additional_sectors.contains(&classification.primary)
            || classification.additional.iter().any(|s| *s == memory.primary_sector);
        let resonance_factor = if resonates { 1.0 + CROSS_SECTOR_WEIGHT } else { 1.0 };
        let bs = (candidate.similarity.max(0.0) as f64 * resonance_factor).min(1.0);
        let boosted_bs = 1.0 - (-BOOST_TAU * bs).exp();

        let memory_tokens = canonical_tokens(&memory.essence);
        let tok_ov = token_overlap(query_tokens, &memory_tokens);
        let ww = candidate.expansion.as_ref().map(|e| e.weight).unwrap_or(0.0);

        let age_days = (now - memory.last_seen_at).num_seconds() as f64 / 86_400.0;
        let rec = ((-age_days / 7.0).exp() * (1.0 - age_days / 60.0)).max(0.0);
        let keyword_boost = self.config.keyword_boost * tok_ov;

        let raw = 0.6 * boosted_bs + 0.2 * tok_ov + 0.15 * ww + 0.05 * rec + keyword_boost;

        let since_seen_days = (now - memory.last_seen_at).num_seconds() as f64 / 86_400.0;
        let factor = decay::decay_factor(memory.decay_lambda, since_seen_days.max(0.0), memory.salience);
        let decayed_sal = decay::decayed_salience(memory.salience, factor);

        (raw, decayed_sal)
    }

    /// Apply the ordered post-query updates: feedback EMA, co-activation
    /// push, salience reinforcement, path-edge reinforcement/propagation for
    /// graph-expanded hits, and opportunistic re-embedding of compressed
    /// vectors. All of these are best-effort: a failure here is logged and
    /// never turns a successful query into an error.
    fn apply_query_side_effects(
        &self,
        scored: &[(Uuid, f64, Memory, usize, f64, Option<Vec<Uuid>>)],
        now: chrono::DateTime<Utc>,
    ) {
        let ids: Vec<Uuid> = scored.iter().map(|(id, _, _, _, _, _)| *id).collect();
        if ids.len() >= 2 {
            self.push_coactivation(&ids);
        }

        for (id, score, memory, path_len, decayed_sal, path) in scored {
            let new_feedback = (0.9 * memory.feedback_score + 0.1 * score).clamp(0.0, 1.0);
            let mut updated = memory.clone();
            updated.feedback_score = new_feedback;
            if let Err(e) = self.store.replace_memory(&updated) {
                warn!(error = %e, %id, "failed to persist feedback score");
            }

            let boosted_salience = dynamics::apply_retrieval_trace(*decayed_sal, RETRIEVAL_TRACE_DEFAULT_BOOST);
            if let Err(e) = self.store.update_salience_and_last_seen(*id, now, boosted_salience) {
                warn!(error = %e, %id, "failed to reinforce retrieved memory");
            }
            self.salience_cache.invalidate(id);

            // Only reinforce when the BFS expansion actually recorded the
            // traversed path; a synthetic seed-to-hit shortcut would
            // strengthen an edge the traversal never crossed.
            if *path_len > 0 {
                if let Some(real_path) = path {
                    if let Err(e) = dynamics::reinforce_path_edges(self.store.as_ref(), real_path, &memory.namespaces, now) {
                        warn!(error = %e, %id, "failed to reinforce traversal path");
                    }
                    if let Err(e) = dynamics::propagate_to_linked(self.store.as_ref(), *id, boosted_salience, 0.0) {
                        warn!(error = %e, %id, "failed to propagate salience to linked memory");
                    }
                }
            }

            if let Some(dim) = memory.mean_dim {
                if needs_reembedding(dim as usize, self.config.compression.fingerprint_dim) {
                    self.reembed_opportunistically(memory);
                }
            }
        }
    }

    fn reembed_opportunistically(&self, memory: &Memory) {
        let (per_sector, failures) =
            match self.embed_all_sectors(&memory.essence, memory.primary_sector, &memory.additional_sectors) {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, id = %memory.id, "opportunistic re-embed failed");
                    return;
                }
            };
        self.record_embed_failures(memory.id, &failures);
        for (sector, vector) in &per_sector {
            if let Err(e) = self.vectors.upsert(memory.id, *sector, memory.namespaces.clone(), vector.clone()) {
                warn!(error = %e, id = %memory.id, "opportunistic re-embed: vector upsert failed");
            }
            self.vector_cache.invalidate(&(memory.id, *sector));
        }
        let fused = crate::embeddings::fuse_mean_vec(&per_sector);
        let mut updated = memory.clone();
        updated.mean_dim = Some(fused.len() as u32);
        updated.mean_vec = Some(fused);
        if let Err(e) = self.store.replace_memory(&updated) {
            warn!(error = %e, id = %memory.id, "opportunistic re-embed: memory replace failed");
        }
    }
}
