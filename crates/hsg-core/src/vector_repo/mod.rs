//! Vector repository contract.

pub mod embedded;

use crate::error::Result;
use crate::model::Sector;
use std::collections::BTreeSet;
use uuid::Uuid;

/// One ranked hit from [`VectorRepository::search`].
#[derive(Debug, Clone)]
pub struct VectorSearchHit {
    pub id: Uuid,
    pub sector: Sector,
    pub similarity: f32,
    pub vector: Option<Vec<f32>>,
}

/// Pluggable per-sector vector storage, keyed by `(id, sector)` . Reference implementations include an embedded in-process table
/// ([`embedded::EmbeddedVectorRepository`]) and a remote vector-DB backend
/// (not shipped in this crate).
pub trait VectorRepository: Send + Sync {
    /// Upsert the vector for `(id, sector)`. `namespaces` scopes subsequent
    /// `search` visibility.
    fn upsert(
        &self,
        id: Uuid,
        sector: Sector,
        namespaces: BTreeSet<String>,
        vector: Vec<f32>,
    ) -> Result<()>;

    /// Search for the `limit` nearest vectors to `query` within `sector`,
    /// optionally restricted to `namespaces` (namespace isolation MUST hold:
    /// a search scoped to namespace A never returns a vector exclusively in
    /// namespace B).
    fn search(
        &self,
        query: &[f32],
        sector: Sector,
        namespaces: Option<&BTreeSet<String>>,
        limit: usize,
        with_vectors: bool,
    ) -> Result<Vec<VectorSearchHit>>;

    /// Remove vectors for `id`, optionally scoped to one `sector` and/or one
    /// `namespace`. `delete(id, None, None)` removes every sector vector the
    /// memory owns; vectors are cascade-deleted with their owning memory.
    fn delete(&self, id: Uuid, sector: Option<Sector>, namespace: Option<&str>) -> Result<()>;

    /// Fetch the stored vector for `(id, sector)`, if present.
    fn get(&self, id: Uuid, sector: Sector) -> Result<Option<Vec<f32>>>;
}
