//! Hierarchical Semantic Graph engine: a multi-tenant associative memory
//! store for AI agents.
//!
//! Memories are classified into cognitive sectors, embedded per sector,
//! fused into a unified vector, and linked into a waypoint graph that hybrid
//! queries traverse alongside vector similarity. Salience decays over time
//! and reinforces on retrieval, with older memories progressively compressed
//! and fingerprinted.
//!
//! The reference stack is embedded: [`metadata::sqlite::SqliteMetadataStore`]
//! over bundled SQLite and [`vector_repo::embedded::EmbeddedVectorRepository`]
//! as an in-process linear-scan vector table. Both are trait objects
//! ([`metadata::MetadataStore`], [`vector_repo::VectorRepository`]), so a
//! deployment can swap in a remote-backed implementation of either without
//! touching [`engine::HsgEngine`].

pub mod cache;
pub mod chunker;
pub mod classifier;
pub mod config;
pub mod decay;
pub mod dynamics;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod essence;
pub mod metadata;
pub mod model;
pub mod tokenizer;
pub mod vector_repo;
pub mod waypoints;

pub use config::Config;
pub use engine::{AddMemoryOutcome, AddMemoryRequest, HsgEngine, QueryHit, QueryOptions};
pub use error::{HsgError, Result};
pub use model::{Memory, Sector, Waypoint};

/// Convenience re-exports for `use hsg_core::prelude::*;`.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::engine::{AddMemoryOutcome, AddMemoryRequest, HsgEngine, QueryHit, QueryOptions};
    pub use crate::error::{HsgError, Result};
    pub use crate::metadata::sqlite::SqliteMetadataStore;
    pub use crate::metadata::MetadataStore;
    pub use crate::model::{Memory, Sector, Waypoint};
    pub use crate::vector_repo::embedded::EmbeddedVectorRepository;
    pub use crate::vector_repo::VectorRepository;
}
