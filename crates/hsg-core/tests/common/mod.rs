//! Shared setup for the crate's end-to-end scenario tests.

use hsg_core::metadata::sqlite::SqliteMetadataStore;
use hsg_core::vector_repo::embedded::EmbeddedVectorRepository;
use hsg_core::{Config, HsgEngine};
use std::sync::Arc;

/// An engine plus a direct handle to its backing store, so a test can
/// inspect or mutate rows the public `HsgEngine` API doesn't expose (e.g.
/// backdating `last_seen_at` to simulate an aged memory).
pub struct Harness {
    pub _dir: tempfile::TempDir,
    pub engine: HsgEngine,
    pub store: Arc<SqliteMetadataStore>,
}

pub fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteMetadataStore::open(&dir.path().join("db.sqlite3")).unwrap());
    let vectors = Arc::new(EmbeddedVectorRepository::new());
    let engine = HsgEngine::new(Config::default(), store.clone(), vectors).unwrap();
    Harness {
        _dir: dir,
        engine,
        store,
    }
}
