//! Engine configuration.
//! Every option has a sane default and can be overridden by an
//! `OM_*`-prefixed environment variable rather than pulling in a
//! config-file crate.

use std::time::Duration;

/// Selects which metadata backend a [`crate::engine::HsgEngine`] is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataBackend {
    /// Embedded SQLite file, the reference backend.
    Embedded,
    /// A remote relational service implementing the same contract.
    Remote,
}

/// Embedding tier, selecting synthetic / semantic / fused / batch policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tier {
    /// Synthetic-only, CPU-bound, deterministic.
    #[default]
    Fast,
    /// Fused synthetic + pooled semantic vector.
    Smart,
    /// Hybrid scoring tier (keyword boost enabled).
    Hybrid,
    /// Batch-oriented provider embedding with advanced retry/backoff.
    Deep,
}

/// Embedding call mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedMode {
    /// Single call per chunk.
    #[default]
    Simple,
    /// Batched provider calls with an inter-call delay.
    Advanced,
}

/// Engine-wide configuration, seeded with sane reference defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub metadata_backend: MetadataBackend,
    /// Embedding vector width used by the synthetic embedder and for
    /// resizing provider vectors.
    pub vec_dim: usize,
    /// Number of memories per segment before rotation.
    pub seg_size: u64,
    /// Fraction of rows sampled per segment during a decay pass.
    pub decay_ratio: f64,
    /// Sleep inserted between decay batches, to bound write pressure.
    pub decay_sleep_ms: u64,
    /// Cap on cached segment rows.
    pub cache_segments: usize,
    /// Admission cap on concurrent queries.
    pub max_active: usize,
    /// Maximum length of the stored essence.
    pub summary_max_length: usize,
    /// When true, scoring and embedding only ever see the essence, never raw content.
    pub use_summary_only: bool,
    pub tier: Tier,
    /// Provider tag surfaced to embed logs (not interpreted by the engine).
    pub emb_kind: String,
    pub embed_mode: EmbedMode,
    /// Delay between provider calls in advanced embed mode.
    pub embed_delay_ms: u64,
    /// Additive keyword-boost weight applied in the hybrid tier.
    pub keyword_boost: f64,
    pub decay: DecayConstants,
    pub compression: CompressionBounds,
    /// TTL for query/segment/vector/salience caches.
    pub cache_ttl: Duration,
    /// Similarity threshold for waypoint anchoring / inter-memory linking.
    pub link_similarity_threshold: f32,
    /// Maximum simhash Hamming distance treated as a near-duplicate.
    pub hamming_dedup_threshold: u32,
    /// Entry cap for the query-result cache.
    pub query_cache_capacity: usize,
    /// Entry cap for the per-`(id, sector)` vector-byte cache.
    pub vector_cache_capacity: usize,
    /// Entry cap for the per-memory salience cache.
    pub salience_cache_capacity: usize,
}

/// `OM_DECAY_*` constants.
#[derive(Debug, Clone, Copy)]
pub struct DecayConstants {
    pub lambda_hot: f64,
    pub lambda_warm: f64,
    pub lambda_cold: f64,
    pub hot_window_days: i64,
    pub hot_coactivation_threshold: u32,
    pub hot_salience_threshold: f64,
    pub warm_salience_threshold: f64,
    pub cold_threshold: f64,
    /// Cooldown between decay passes; a pass within the window is a no-op.
    pub pass_cooldown: Duration,
}

impl Default for DecayConstants {
    fn default() -> Self {
        Self {
            lambda_hot: 0.005,
            lambda_warm: 0.02,
            lambda_cold: 0.05,
            hot_window_days: 6,
            hot_coactivation_threshold: 5,
            hot_salience_threshold: 0.7,
            warm_salience_threshold: 0.4,
            cold_threshold: 0.3,
            pass_cooldown: Duration::from_secs(60),
        }
    }
}

/// `OM_MIN_VECTOR_DIM` / `OM_MAX_VECTOR_DIM` bounds.
#[derive(Debug, Clone, Copy)]
pub struct CompressionBounds {
    pub min_dim: usize,
    pub max_dim: usize,
    pub fingerprint_dim: usize,
}

impl Default for CompressionBounds {
    fn default() -> Self {
        Self {
            min_dim: 64,
            max_dim: 1024,
            fingerprint_dim: 32,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            metadata_backend: MetadataBackend::Embedded,
            vec_dim: 256,
            seg_size: 10_000,
            decay_ratio: 0.1,
            decay_sleep_ms: 5,
            cache_segments: 64,
            max_active: 16,
            summary_max_length: 500,
            use_summary_only: true,
            tier: Tier::Fast,
            emb_kind: "synthetic".to_string(),
            embed_mode: EmbedMode::Simple,
            embed_delay_ms: 0,
            keyword_boost: 0.05,
            decay: DecayConstants::default(),
            compression: CompressionBounds::default(),
            cache_ttl: Duration::from_secs(60),
            link_similarity_threshold: 0.75,
            hamming_dedup_threshold: 3,
            query_cache_capacity: 512,
            vector_cache_capacity: 4_096,
            salience_cache_capacity: 4_096,
        }
    }
}

impl Config {
    /// Build a configuration from defaults overridden by `OM_*` environment
    /// variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_usize("OM_VEC_DIM") {
            cfg.vec_dim = v;
        }
        if let Some(v) = env_u64("OM_SEG_SIZE") {
            cfg.seg_size = v;
        }
        if let Some(v) = env_f64("OM_DECAY_RATIO") {
            cfg.decay_ratio = v;
        }
        if let Some(v) = env_u64("OM_DECAY_SLEEP_MS") {
            cfg.decay_sleep_ms = v;
        }
        if let Some(v) = env_usize("OM_CACHE_SEGMENTS") {
            cfg.cache_segments = v;
        }
        if let Some(v) = env_usize("OM_MAX_ACTIVE") {
            cfg.max_active = v;
        }
        if let Some(v) = env_usize("OM_SUMMARY_MAX_LENGTH") {
            cfg.summary_max_length = v;
        }
        if let Some(v) = env_f64("OM_KEYWORD_BOOST") {
            cfg.keyword_boost = v;
        }
        if let Some(v) = env_usize("OM_MIN_VECTOR_DIM") {
            cfg.compression.min_dim = v;
        }
        if let Some(v) = env_usize("OM_MAX_VECTOR_DIM") {
            cfg.compression.max_dim = v;
        }
        if let Some(v) = env_usize("OM_QUERY_CACHE_CAPACITY") {
            cfg.query_cache_capacity = v;
        }
        if let Some(v) = env_usize("OM_VECTOR_CACHE_CAPACITY") {
            cfg.vector_cache_capacity = v;
        }
        cfg
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.parse().ok()
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.parse().ok()
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.decay.lambda_hot, 0.005);
        assert_eq!(cfg.decay.lambda_warm, 0.02);
        assert_eq!(cfg.decay.lambda_cold, 0.05);
        assert_eq!(cfg.compression.min_dim, 64);
        assert_eq!(cfg.compression.fingerprint_dim, 32);
        assert_eq!(cfg.link_similarity_threshold, 0.75);
    }

    #[test]
    fn from_env_overrides_defaults() {
        // SAFETY: test runs single-threaded within this process for this var.
        unsafe {
            std::env::set_var("OM_VEC_DIM", "64");
        }
        let cfg = Config::from_env();
        assert_eq!(cfg.vec_dim, 64);
        unsafe {
            std::env::remove_var("OM_VEC_DIM");
        }
    }
}
