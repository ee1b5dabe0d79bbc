//! Engine orchestration: memory ingest, hybrid query, update/delete, and the
//! background decay / co-activation loops.
//!
//! Every operation on `HsgEngine` takes `&self`, so the whole engine is
//! usable behind a single `Arc` without an outer lock. Only the segment
//! allocator and the admission counter carry their own interior mutability;
//! the metadata store and vector repository are themselves `Send + Sync`
//! trait objects that manage their own synchronization underneath.

pub mod ingest;
pub mod query;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::dynamics::{self, CoActivationSender};
use crate::embeddings::EmbeddingProvider;
use crate::error::{HsgError, Result};
use crate::metadata::MetadataStore;
use crate::model::{SegmentAllocator, Sector};
use crate::vector_repo::VectorRepository;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

pub use ingest::{AddMemoryOutcome, AddMemoryRequest};
pub use query::{QueryHit, QueryOptions};

/// The associative memory engine: wires together a metadata store, a vector
/// repository, an embedding backend, and the decay / co-activation
/// dynamics into the operations external callers see.
pub struct HsgEngine {
    pub(crate) config: Config,
    pub(crate) store: Arc<dyn MetadataStore>,
    pub(crate) vectors: Arc<dyn VectorRepository>,
    pub(crate) semantic: Option<Arc<dyn EmbeddingProvider>>,
    pub(crate) segments: Mutex<SegmentAllocator>,
    active_queries: AtomicUsize,
    last_decay_at: Mutex<Option<chrono::DateTime<Utc>>>,
    coactivation_tx: CoActivationSender,
    coactivation_rx: Mutex<Option<mpsc::Receiver<(Uuid, Uuid)>>>,
    pub(crate) query_cache: TtlCache<String, Vec<QueryHit>>,
    pub(crate) vector_cache: TtlCache<(Uuid, Sector), Vec<f32>>,
    pub(crate) salience_cache: TtlCache<Uuid, f64>,
}

/// Bounds the co-activation channel so a burst of large result sets can
/// never grow it unboundedly; excess pairs are dropped and logged rather
/// than blocking the caller (see [`dynamics::CoActivationSender`]).
const COACTIVATION_CHANNEL_CAPACITY: usize = 256;

impl HsgEngine {
    /// Build an engine over the synthetic embedder only.
    pub fn new(
        config: Config,
        store: Arc<dyn MetadataStore>,
        vectors: Arc<dyn VectorRepository>,
    ) -> Result<Self> {
        Self::with_semantic_provider(config, store, vectors, None)
    }

    /// Build an engine with an optional semantic provider, used when
    /// `config.tier` calls for fused synthetic/semantic vectors.
    pub fn with_semantic_provider(
        config: Config,
        store: Arc<dyn MetadataStore>,
        vectors: Arc<dyn VectorRepository>,
        semantic: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Result<Self> {
        let (current, count) = store.max_segment()?;
        let segments = SegmentAllocator::resume(current, count, config.seg_size);
        let (coactivation_tx, coactivation_rx) = dynamics::co_activation_channel(COACTIVATION_CHANNEL_CAPACITY);
        let query_cache = TtlCache::new(config.query_cache_capacity, config.cache_ttl);
        let vector_cache = TtlCache::new(config.vector_cache_capacity, config.cache_ttl);
        let salience_cache = TtlCache::new(config.salience_cache_capacity, config.cache_ttl);
        Ok(Self {
            config,
            store,
            vectors,
            semantic,
            segments: Mutex::new(segments),
            active_queries: AtomicUsize::new(0),
            last_decay_at: Mutex::new(None),
            coactivation_tx,
            coactivation_rx: Mutex::new(Some(coactivation_rx)),
            query_cache,
            vector_cache,
            salience_cache,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn active_queries(&self) -> usize {
        self.active_queries.load(Ordering::SeqCst)
    }

    /// Admit one query slot, failing with `RateLimit` once `max_active`
    /// concurrent queries are already in flight. The returned guard releases
    /// the slot on drop.
    pub(crate) fn admit_query(&self) -> Result<QueryGuard<'_>> {
        let mut active = self.active_queries.load(Ordering::SeqCst);
        loop {
            if active >= self.config.max_active {
                return Err(HsgError::RateLimit(format!(
                    "max_active ({}) concurrent queries exceeded",
                    self.config.max_active
                )));
            }
            match self.active_queries.compare_exchange_weak(
                active,
                active + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(QueryGuard { engine: self }),
                Err(observed) => active = observed,
            }
        }
    }

    /// Explicit reinforcement: boost a memory's salience and bump its
    /// `last_seen_at`, independent of query-time side effects.
    pub fn reinforce_memory(&self, id: Uuid, boost: f64) -> Result<()> {
        let memory = self
            .store
            .get_memory(id)?
            .ok_or_else(|| HsgError::NotFound(id.to_string()))?;
        let new_salience = dynamics::apply_retrieval_trace(memory.salience, boost);
        self.store.update_salience_and_last_seen(id, Utc::now(), new_salience)?;
        self.salience_cache.invalidate(&id);
        Ok(())
    }

    /// Update a memory's editable fields (essence, tags, meta). Replacing
    /// the essence re-runs the simhash and re-embeds every owned sector so
    /// derived state (`mean_vec`, dedup key) never drifts from the stored
    /// text.
    pub fn update_memory(
        &self,
        id: Uuid,
        essence: Option<String>,
        tags: Option<serde_json::Value>,
        meta: Option<serde_json::Value>,
    ) -> Result<()> {
        let mut memory = self
            .store
            .get_memory(id)?
            .ok_or_else(|| HsgError::NotFound(id.to_string()))?;

        let re_embed = essence.is_some();
        if let Some(essence) = essence {
            let bounded = if essence.len() > self.config.summary_max_length {
                crate::essence::extract_essence(&essence, self.config.summary_max_length)
            } else {
                essence
            };
            let tokens = crate::tokenizer::canonical_tokens(&bounded);
            memory.simhash = crate::tokenizer::simhash::simhash_hex(&tokens);

            let classification = crate::classifier::classify(&bounded, None);
            memory.primary_sector = classification.primary;
            memory.additional_sectors = classification.additional;
            memory.essence = bounded;
        }
        if let Some(tags) = tags {
            memory.tags = tags;
        }
        if let Some(meta) = meta {
            memory.meta = meta;
        }
        memory.updated_at = Utc::now();

        if re_embed {
            memory.version += 1;

            let chunks = crate::chunker::chunk_content(&memory.essence, crate::chunker::DEFAULT_CHUNK_SIZE);
            let (pooled, failures) =
                self.embed_chunks_all_sectors(&chunks, memory.primary_sector, &memory.additional_sectors)?;
            self.record_embed_failures(memory.id, &failures);

            for (sector, vector) in &pooled {
                self.vectors.upsert(memory.id, *sector, memory.namespaces.clone(), vector.clone())?;
                self.vector_cache.invalidate(&(memory.id, *sector));
            }
            let fused = crate::embeddings::fuse_mean_vec(&pooled);
            memory.mean_dim = Some(fused.len() as u32);
            memory.mean_vec = Some(fused);
        }

        self.store.replace_memory(&memory)?;
        self.query_cache.clear();
        Ok(())
    }

    /// Delete a memory, its sector vectors, and every waypoint touching it.
    /// `namespaces` must overlap the memory's own namespaces, or the call
    /// fails `Forbidden` rather than silently deleting across a tenant
    /// boundary.
    pub fn delete_memory(&self, id: Uuid, namespaces: &std::collections::BTreeSet<String>) -> Result<()> {
        let memory = self
            .store
            .get_memory(id)?
            .ok_or_else(|| HsgError::NotFound(id.to_string()))?;
        if !namespaces.is_empty() && !memory.visible_in(namespaces) {
            return Err(HsgError::Forbidden(format!(
                "memory {id} is not visible in the requested namespaces"
            )));
        }
        self.store.delete_waypoints_touching(id)?;
        self.vectors.delete(id, None, None)?;
        self.store.delete_memory(id)?;
        self.salience_cache.invalidate(&id);
        self.query_cache.clear();
        Ok(())
    }

    /// Run one decay pass immediately, outside the background schedule.
    ///
    /// A no-op while any query is in flight, and a no-op if the previous
    /// pass completed within `config.decay.pass_cooldown` — both make the
    /// pass idempotent within its cooldown window rather than racing
    /// concurrent query-time reads and writes of the same rows.
    pub fn run_decay(&self) -> Result<crate::decay::DecayOutcome> {
        let now = Utc::now();
        if self.active_queries() > 0 {
            return Ok(crate::decay::DecayOutcome::default());
        }
        {
            let mut last = self.last_decay_at.lock().expect("poisoned");
            if let Some(prev) = *last {
                let elapsed = (now - prev).to_std().unwrap_or_default();
                if elapsed < self.config.decay.pass_cooldown {
                    return Ok(crate::decay::DecayOutcome::default());
                }
            }
            *last = Some(now);
        }
        let outcome = crate::decay::run_decay_pass(
            self.store.as_ref(),
            self.vectors.as_ref(),
            self.config.decay_ratio,
            &self.config.decay,
            self.config.compression.min_dim,
            self.config.compression.fingerprint_dim,
            self.config.summary_max_length,
            now,
        )?;
        info!(processed = outcome.processed, decayed = outcome.decayed, "decay pass complete");
        Ok(outcome)
    }

    /// Prune waypoints whose weight has fallen below the retention floor.
    pub fn prune_waypoints(&self) -> Result<u64> {
        crate::waypoints::prune(self.store.as_ref())
    }

    /// Link `mem` to each id in `related` with a contextual waypoint,
    /// strengthening it by `CONTEXTUAL_INCREMENT` on repeat calls. Exposed
    /// for callers outside the ingest path (e.g. a collaborator that derives
    /// relatedness from its own knowledge-graph store).
    pub fn link_contextual(&self, mem: Uuid, related: &[Uuid], namespaces: &std::collections::BTreeSet<String>) -> Result<()> {
        crate::waypoints::contextual_link(self.store.as_ref(), mem, related, namespaces, Utc::now())
    }

    pub(crate) fn push_coactivation(&self, ids: &[Uuid]) {
        self.coactivation_tx.push_result_set(ids);
    }

    /// Embed `essence` for `primary` plus every sector in `additional`, one
    /// thread per sector. `std::thread::scope` is used instead of a thread
    /// pool crate since the only other parallel workload in this engine
    /// (decay batching) is just as happy with it.
    ///
    /// Per §7, a provider failure is never fatal here: `embed_one_sector`
    /// already falls back to the synthetic vector, and the second element of
    /// the return tuple carries the sectors where that happened (with the
    /// provider's error text) so the caller can persist an `EmbedLog` once it
    /// knows the memory id.
    pub(crate) fn embed_all_sectors(
        &self,
        essence: &str,
        primary: Sector,
        additional: &[Sector],
    ) -> Result<(Vec<(Sector, Vec<f32>)>, Vec<(Sector, String)>)> {
        let sectors: Vec<Sector> = std::iter::once(primary).chain(additional.iter().copied()).collect();
        self.embed_sectors_inner(essence, &sectors)
    }

    /// Embed `essence` for an arbitrary caller-supplied sector set, one
    /// thread per sector. Used by the query path once its candidate
    /// sectors have already been intersected with a caller filter.
    pub(crate) fn embed_sectors(
        &self,
        essence: &str,
        sectors: &std::collections::BTreeSet<Sector>,
    ) -> Result<(Vec<(Sector, Vec<f32>)>, Vec<(Sector, String)>)> {
        let sectors: Vec<Sector> = sectors.iter().copied().collect();
        self.embed_sectors_inner(essence, &sectors)
    }

    /// Embed every chunk of a multi-chunk memory body for `primary` plus
    /// every sector in `additional`, mean-pooling each sector's per-chunk
    /// vectors into the pooled vector `add_memory`/`update_memory` store.
    /// One thread per sector, as in [`Self::embed_sectors_inner`]; within a
    /// sector's thread the whole chunk batch is handed to the provider in a
    /// single `embed_batch` call instead of one `embed` call per chunk.
    pub(crate) fn embed_chunks_all_sectors(
        &self,
        chunks: &[String],
        primary: Sector,
        additional: &[Sector],
    ) -> Result<(Vec<(Sector, Vec<f32>)>, Vec<(Sector, String)>)> {
        let sectors: Vec<Sector> = std::iter::once(primary).chain(additional.iter().copied()).collect();

        let results: Mutex<Vec<(Sector, Vec<f32>)>> = Mutex::new(Vec::with_capacity(sectors.len()));
        let failures: Mutex<Vec<(Sector, String)>> = Mutex::new(Vec::new());

        std::thread::scope(|scope| {
            for &sector in &sectors {
                let results = &results;
                let failures = &failures;
                scope.spawn(move || {
                    let (per_chunk, failure) = self.embed_chunks_one_sector(chunks, sector);
                    if let Some(err) = failure {
                        failures.lock().expect("poisoned").push((sector, err));
                    }
                    let pooled = crate::model::mean_pool(&per_chunk);
                    results.lock().expect("poisoned").push((sector, pooled));
                });
            }
        });

        let mut out = results.into_inner().expect("poisoned");
        out.sort_by_key(|(s, _)| sectors.iter().position(|x| x == s).unwrap_or(usize::MAX));
        Ok((out, failures.into_inner().expect("poisoned")))
    }

    /// Embed every chunk for one sector. Synthetic vectors are cheap and
    /// computed per chunk locally; the semantic-provider call (when active)
    /// covers the whole chunk batch in one `embed_batch` request rather than
    /// one request per chunk. A provider failure falls back to the
    /// per-chunk synthetic vectors, same fallback policy as
    /// [`Self::embed_one_sector`].
    fn embed_chunks_one_sector(&self, chunks: &[String], sector: Sector) -> (Vec<Vec<f32>>, Option<String>) {
        let synthetics: Vec<Vec<f32>> = chunks
            .iter()
            .map(|chunk| {
                crate::embeddings::synthetic::embed_synthetic(chunk, self.config.vec_dim, sector.default_fusion_weight())
            })
            .collect();

        match (&self.semantic, self.config.tier) {
            (Some(provider), crate::config::Tier::Smart) => {
                let texts: Vec<&str> = chunks.iter().map(String::as_str).collect();
                match provider.embed_batch(&texts) {
                    Ok(semantics) => {
                        let fused = synthetics
                            .iter()
                            .zip(semantics.iter())
                            .map(|(syn, sem)| crate::embeddings::fuse_smart_tier(syn, sem))
                            .collect();
                        (fused, None)
                    }
                    Err(e) => (synthetics, Some(e.to_string())),
                }
            }
            _ => (synthetics, None),
        }
    }

    fn embed_sectors_inner(
        &self,
        essence: &str,
        sectors: &[Sector],
    ) -> Result<(Vec<(Sector, Vec<f32>)>, Vec<(Sector, String)>)> {
        let results: Mutex<Vec<(Sector, Vec<f32>)>> = Mutex::new(Vec::with_capacity(sectors.len()));
        let failures: Mutex<Vec<(Sector, String)>> = Mutex::new(Vec::new());

        std::thread::scope(|scope| {
            for &sector in sectors {
                let results = &results;
                let failures = &failures;
                scope.spawn(move || {
                    let (vector, failure) = self.embed_one_sector(essence, sector);
                    if let Some(err) = failure {
                        failures.lock().expect("poisoned").push((sector, err));
                    }
                    results.lock().expect("poisoned").push((sector, vector));
                });
            }
        });

        let mut out = results.into_inner().expect("poisoned");
        out.sort_by_key(|(s, _)| sectors.iter().position(|x| x == s).unwrap_or(usize::MAX));
        Ok((out, failures.into_inner().expect("poisoned")))
    }

    /// Embed one sector. A semantic-provider failure falls back to the
    /// synthetic vector rather than failing ingest/update/query outright
    /// (§7 propagation policy); the second return value carries the
    /// provider's error text when that happened.
    fn embed_one_sector(&self, essence: &str, sector: Sector) -> (Vec<f32>, Option<String>) {
        let synthetic = crate::embeddings::synthetic::embed_synthetic(
            essence,
            self.config.vec_dim,
            sector.default_fusion_weight(),
        );
        match (&self.semantic, self.config.tier) {
            (Some(provider), crate::config::Tier::Smart) => match provider.embed(essence) {
                Ok(semantic) => (crate::embeddings::fuse_smart_tier(&synthetic, &semantic), None),
                Err(e) => (synthetic, Some(e.to_string())),
            },
            _ => (synthetic, None),
        }
    }

    /// Persist a `failed` `EmbedLog` row per sector that fell back to
    /// synthetic embedding during this call. Best-effort: a logging failure
    /// is warned and swallowed, never propagated as an ingest/update error.
    pub(crate) fn record_embed_failures(&self, memory_id: Uuid, failures: &[(Sector, String)]) {
        for (sector, err) in failures {
            let log = crate::model::EmbedLog::failed(memory_id, sector.as_str(), Utc::now(), err.clone());
            if let Err(e) = self.store.upsert_embed_log(&log) {
                warn!(error = %e, %memory_id, "failed to persist embed log");
            }
        }
    }

    /// Spawn the periodic co-activation drain and decay background tasks.
    /// The caller owns the runtime these run on; dropping the returned
    /// handles (or aborting them) stops the loops. May only be called once
    /// per engine — the co-activation receiver is handed off to the drain
    /// task and cannot be retrieved afterwards.
    pub fn spawn_background_tasks(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        let drain_engine = Arc::clone(&self);
        let mut receiver = drain_engine
            .coactivation_rx
            .lock()
            .expect("poisoned")
            .take()
            .expect("background tasks already spawned");
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                ticker.tick().await;
                let store = Arc::clone(&drain_engine.store);
                tokio::task::block_in_place(|| {
                    dynamics::drain_tick(store.as_ref(), &mut receiver);
                });
            }
        }));

        let decay_engine = Arc::clone(&self);
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(decay_engine.config.decay.pass_cooldown);
            loop {
                ticker.tick().await;
                let engine = Arc::clone(&decay_engine);
                match tokio::task::spawn_blocking(move || engine.run_decay()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!(error = %e, "scheduled decay pass failed"),
                    Err(e) => warn!(error = %e, "decay task panicked"),
                }
            }
        }));

        handles
    }
}

/// RAII guard releasing one admitted query slot on drop.
pub(crate) struct QueryGuard<'a> {
    engine: &'a HsgEngine,
}

impl Drop for QueryGuard<'_> {
    fn drop(&mut self) {
        self.engine.active_queries.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::sqlite::SqliteMetadataStore;
    use crate::vector_repo::embedded::EmbeddedVectorRepository;

    fn engine() -> (tempfile::TempDir, HsgEngine) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteMetadataStore::open(&dir.path().join("db.sqlite3")).unwrap());
        let vectors = Arc::new(EmbeddedVectorRepository::new());
        let mut config = Config::default();
        config.max_active = 1;
        let engine = HsgEngine::new(config, store, vectors).unwrap();
        (dir, engine)
    }

    #[test]
    fn admission_cap_rejects_beyond_max_active() {
        let (_dir, engine) = engine();
        let guard = engine.admit_query().unwrap();
        assert!(engine.admit_query().is_err());
        drop(guard);
        assert!(engine.admit_query().is_ok());
    }

    #[test]
    fn reinforce_missing_memory_is_not_found() {
        let (_dir, engine) = engine();
        let err = engine.reinforce_memory(Uuid::new_v4(), 0.1);
        assert!(matches!(err, Err(HsgError::NotFound(_))));
    }

    #[test]
    fn delete_missing_memory_is_not_found() {
        let (_dir, engine) = engine();
        let err = engine.delete_memory(Uuid::new_v4(), &std::collections::BTreeSet::new());
        assert!(matches!(err, Err(HsgError::NotFound(_))));
    }

    #[test]
    fn delete_across_namespace_boundary_is_forbidden() {
        let (_dir, engine) = engine();
        let outcome = engine
            .add_memory(
                "Bob taught me how to solder a circuit board.",
                crate::engine::ingest::AddMemoryRequest {
                    namespaces: std::collections::BTreeSet::from(["team-a".to_string()]),
                    ..Default::default()
                },
            )
            .unwrap();
        let err = engine.delete_memory(outcome.id, &std::collections::BTreeSet::from(["team-b".to_string()]));
        assert!(matches!(err, Err(HsgError::Forbidden(_))));
        engine
            .delete_memory(outcome.id, &std::collections::BTreeSet::from(["team-a".to_string()]))
            .unwrap();
    }

    #[test]
    fn run_decay_is_a_no_op_within_its_cooldown() {
        let (_dir, engine) = engine();
        let first = engine.run_decay().unwrap();
        assert_eq!(first.processed, 0);
        let second = engine.run_decay().unwrap();
        assert_eq!(second.processed, 0);
        assert_eq!(second.decayed, 0);
    }

    #[test]
    fn run_decay_is_a_no_op_while_a_query_is_active() {
        let (_dir, engine) = engine();
        let guard = engine.admit_query().unwrap();
        let outcome = engine.run_decay().unwrap();
        assert_eq!(outcome.processed, 0);
        drop(guard);
    }

    struct AlwaysFailsProvider;

    impl crate::embeddings::EmbeddingProvider for AlwaysFailsProvider {
        fn name(&self) -> &str {
            "always-fails"
        }
        fn dimensions(&self) -> usize {
            256
        }
        fn embed_batch(&self, _texts: &[&str]) -> std::result::Result<Vec<Vec<f32>>, crate::embeddings::EmbeddingError> {
            Err(crate::embeddings::EmbeddingError::Unavailable("provider down".into()))
        }
    }

    #[test]
    fn provider_failure_falls_back_to_synthetic_and_logs_embed_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteMetadataStore::open(&dir.path().join("db.sqlite3")).unwrap());
        let vectors = Arc::new(EmbeddedVectorRepository::new());
        let mut config = Config::default();
        config.tier = crate::config::Tier::Smart;
        let engine = HsgEngine::with_semantic_provider(
            config,
            store.clone(),
            vectors,
            Some(Arc::new(AlwaysFailsProvider)),
        )
        .unwrap();

        let outcome = engine
            .add_memory(
                "A provider outage should never block ingest of this memory.",
                crate::engine::ingest::AddMemoryRequest::default(),
            )
            .unwrap();
        assert!(!outcome.deduplicated);

        let memory = store.get_memory(outcome.id).unwrap().unwrap();
        assert!(memory.mean_vec.is_some());

        let log = store.get_embed_log(outcome.id, memory.primary_sector.as_str()).unwrap();
        assert!(log.is_some());
        assert_eq!(log.unwrap().status, crate::model::EmbedLogStatusWire::Failed);
    }
}
