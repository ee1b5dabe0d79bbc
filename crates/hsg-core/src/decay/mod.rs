//! Tier classification, salience decay, vector pooling, summary
//! compression, fingerprinting.

use crate::config::DecayConstants;
use crate::embeddings::synthetic::embed_synthetic;
use crate::error::Result;
use crate::essence::extract_essence;
use crate::metadata::MetadataStore;
use crate::model::{l2_normalize, pool_to_dim, Memory, Sector};
use crate::tokenizer::canonical_tokens;
use crate::vector_repo::VectorRepository;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

/// A memory's lifecycle tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Hot,
    Warm,
    Cold,
}

impl Tier {
    pub fn decay_lambda(self, constants: &DecayConstants) -> f64 {
        match self {
            Tier::Hot => constants.lambda_hot,
            Tier::Warm => constants.lambda_warm,
            Tier::Cold => constants.lambda_cold,
        }
    }
}

/// Classify a memory's tier:
/// `hot` if recent (`< hot_window_days`) AND (`coactivations > threshold`
/// OR `salience > hot_salience_threshold`); `warm` if recent or
/// `salience > warm_salience_threshold`; `cold` otherwise.
pub fn classify_tier(
    now: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    salience: f64,
    coactivation_count: u32,
    constants: &DecayConstants,
) -> Tier {
    let age_days = (now - last_seen_at).num_seconds() as f64 / 86_400.0;
    let recent = age_days < constants.hot_window_days as f64;
    if recent && (coactivation_count > constants.hot_coactivation_threshold || salience > constants.hot_salience_threshold) {
        return Tier::Hot;
    }
    if recent || salience > constants.warm_salience_threshold {
        return Tier::Warm;
    }
    Tier::Cold
}

/// `f = exp(−λ·Δdays / (sal + 0.1))`.
pub fn decay_factor(lambda: f64, delta_days: f64, salience: f64) -> f64 {
    (-lambda * delta_days / (salience + 0.1)).exp()
}

/// `clamp(sal·f, 0, 1)`.
pub fn decayed_salience(salience: f64, factor: f64) -> f64 {
    (salience * factor).clamp(0.0, 1.0)
}

/// Pooled target dimension: `max(min_dim, ⌊dim·f⌋)`.
fn pooled_dim(current_dim: usize, factor: f64, min_dim: usize) -> usize {
    min_dim.max((current_dim as f64 * factor).floor() as usize)
}

/// Extract the top-3 most frequent canonical tokens, space-joined. Used
/// as the fingerprint-tier summary replacement.
fn top_keywords(text: &str, n: usize) -> String {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in canonical_tokens(text) {
        *counts.entry(token).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(n).map(|(t, _)| t).collect::<Vec<_>>().join(" ")
}

/// Three-tier compression proportional to `f` : near-raw
/// truncation; extractive sentence summary; top-keyword reduction. The
/// keyword tier only applies below the caller's fingerprint threshold, so
/// this function only ever produces the first two.
fn compress_summary(essence: &str, factor: f64, max_length: usize) -> String {
    if factor >= 0.5 {
        let bound = max_length.min(essence.len());
        essence.chars().take(bound).collect()
    } else {
        extract_essence(essence, (max_length / 2).max(32))
    }
}

/// A 32-dim hash-based pseudo-vector derived from `id + summary`, reusing
/// the synthetic embedder's hashing-trick.
fn fingerprint_vector(id: Uuid, summary: &str, dim: usize) -> Vec<f32> {
    embed_synthetic(&format!("{id}{summary}"), dim, 1.0)
}

/// Outcome of one [`run_decay_pass`] invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecayOutcome {
    pub processed: u64,
    pub decayed: u64,
}

/// Decay + compress + fingerprint a single memory in place. Returns `true`
/// if `salience` changed by more than the persistence threshold.
fn decay_one(
    memory: &mut Memory,
    vector_repo: &dyn VectorRepository,
    now: DateTime<Utc>,
    constants: &DecayConstants,
    min_dim: usize,
    fingerprint_dim: usize,
    summary_max_length: usize,
) -> bool {
    let age_days = (now - memory.last_seen_at).num_seconds() as f64 / 86_400.0;
    let tier = classify_tier(now, memory.last_seen_at, memory.salience, memory.coactivation_count, constants);
    let lambda = tier.decay_lambda(constants);
    let factor = decay_factor(lambda, age_days.max(0.0), memory.salience);
    let new_salience = decayed_salience(memory.salience, factor);
    let salience_changed = (new_salience - memory.salience).abs() > 0.001;
    memory.salience = new_salience;

    if factor < 0.7 {
        memory.essence = compress_summary(&memory.essence, factor, summary_max_length);
        if let Some(mean_vec) = &memory.mean_vec {
            let target = pooled_dim(mean_vec.len(), factor, min_dim);
            let mut pooled = pool_to_dim(mean_vec, target);
            l2_normalize(&mut pooled, 1e-8);
            memory.mean_dim = Some(pooled.len() as u32);
            memory.mean_vec = Some(pooled);
        }
        for sector in std::iter::once(memory.primary_sector).chain(memory.additional_sectors.iter().copied()) {
            if let Ok(Some(vector)) = vector_repo.get(memory.id, sector) {
                let target = pooled_dim(vector.len(), factor, min_dim);
                let mut pooled = pool_to_dim(&vector, target);
                l2_normalize(&mut pooled, 1e-8);
                if let Err(e) = vector_repo.upsert(memory.id, sector, memory.namespaces.clone(), pooled) {
                    warn!(error = %e, id = %memory.id, "failed to write pooled sector vector");
                }
            }
        }
    }

    let fingerprint_threshold = constants.cold_threshold.max(0.3);
    if factor < fingerprint_threshold {
        let keywords = top_keywords(&memory.essence, 3);
        let fingerprint = fingerprint_vector(memory.id, &keywords, fingerprint_dim);
        memory.compressed_vec = Some(fingerprint.clone());
        memory.essence = keywords;
        memory.mean_dim = Some(fingerprint.len() as u32);
        memory.mean_vec = Some(fingerprint.clone());
        for sector in std::iter::once(memory.primary_sector).chain(memory.additional_sectors.iter().copied()) {
            if let Err(e) = vector_repo.upsert(memory.id, sector, memory.namespaces.clone(), fingerprint.clone()) {
                warn!(error = %e, id = %memory.id, "failed to write fingerprint vector");
            }
        }
    }

    salience_changed || factor < 0.7
}

/// Run one decay pass over every segment. Errors for an individual memory
/// are logged and do not abort the pass.
pub fn run_decay_pass(
    store: &dyn MetadataStore,
    vector_repo: &dyn VectorRepository,
    decay_ratio: f64,
    constants: &DecayConstants,
    min_dim: usize,
    fingerprint_dim: usize,
    summary_max_length: usize,
    now: DateTime<Utc>,
) -> Result<DecayOutcome> {
    let mut outcome = DecayOutcome::default();
    for segment in store.all_segments()? {
        let ids = store.sample_segment_memory_ids(segment, decay_ratio)?;
        for id in ids {
            outcome.processed += 1;
            let Ok(Some(mut memory)) = store.get_memory(id) else {
                continue;
            };
            let changed = decay_one(
                &mut memory,
                vector_repo,
                now,
                constants,
                min_dim,
                fingerprint_dim,
                summary_max_length,
            );
            if changed {
                if let Err(e) = store.replace_memory(&memory) {
                    warn!(error = %e, id = %id, "decay: failed to persist memory, skipping");
                    continue;
                }
                outcome.decayed += 1;
            }
        }
    }
    Ok(outcome)
}

/// Whether a memory is still fresh enough to skip fingerprinting, used by
/// query-time opportunistic re-embedding.
pub fn needs_reembedding(vector_dim: usize, fingerprint_dim: usize) -> bool {
    vector_dim <= fingerprint_dim * 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::sqlite::SqliteMetadataStore;
    use crate::vector_repo::embedded::EmbeddedVectorRepository;
    use std::collections::BTreeSet;

    fn constants() -> DecayConstants {
        DecayConstants {
            lambda_hot: 0.005,
            lambda_warm: 0.02,
            lambda_cold: 0.05,
            hot_window_days: 6,
            hot_coactivation_threshold: 5,
            hot_salience_threshold: 0.7,
            warm_salience_threshold: 0.4,
            cold_threshold: 0.3,
            pass_cooldown: std::time::Duration::from_secs(60),
        }
    }

    #[test]
    fn classify_tier_respects_tier_boundaries() {
        let now = Utc::now();
        let c = constants();
        assert_eq!(classify_tier(now, now, 0.8, 0, &c), Tier::Hot);
        assert_eq!(classify_tier(now, now - chrono::Duration::days(10), 0.5, 0, &c), Tier::Warm);
        assert_eq!(classify_tier(now, now - chrono::Duration::days(10), 0.1, 0, &c), Tier::Cold);
    }

    #[test]
    fn decay_factor_and_salience_bounds() {
        let f = decay_factor(0.05, 400.0, 0.5);
        assert!(f < 1.0 && f >= 0.0);
        let sal = decayed_salience(0.5, f);
        assert!((0.0..=1.0).contains(&sal));
    }

    #[test]
    fn cold_memory_decays_and_fingerprints() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteMetadataStore::open(&dir.path().join("db.sqlite3")).unwrap();
        let vector_repo = EmbeddedVectorRepository::default();
        let now = Utc::now();

        let mut memory = Memory::new(
            "The quarterly report was filed on 2026-01-01 with amount $4200 noted for review repeatedly."
            .into(),
            "0".repeat(16),
            Sector::Semantic,
            vec![],
            serde_json::Value::Null,
            serde_json::Value::Null,
            BTreeSet::from(["global".to_string()]),
            0,
            0.5,
            now - chrono::Duration::days(400),
        );
        memory.last_seen_at = now - chrono::Duration::days(400);
        memory.mean_dim = Some(8);
        memory.mean_vec = Some(vec![0.1; 8]);
        store.insert_memory(&memory).unwrap();

        let outcome = run_decay_pass(&store, &vector_repo, 1.0, &constants(), 64, 32, 500, now).unwrap();
        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.decayed, 1);

        let fetched = store.get_memory(memory.id).unwrap().unwrap();
        assert!(fetched.salience < 0.5);
        assert_eq!(fetched.mean_dim, Some(32));
        assert_eq!(fetched.mean_vec.as_ref().unwrap().len(), 32);
    }
}
