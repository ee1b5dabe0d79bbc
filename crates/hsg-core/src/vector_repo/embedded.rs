//! In-process linear-scan vector repository.
//! A linear scan with per-sector candidate capping, chosen over an HNSW
//! or IVF index for simplicity; see DESIGN.md for the tradeoff.

use super::{VectorRepository, VectorSearchHit};
use crate::error::Result;
use crate::model::{cosine_similarity, Sector};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use uuid::Uuid;

/// Cap on candidates scanned per sector per search.
pub const MAX_SCAN_CANDIDATES: usize = 1000;

struct Entry {
    namespaces: BTreeSet<String>,
    vector: Vec<f32>,
}

/// Reference [`VectorRepository`]: an in-memory table keyed by `(id,
/// sector)`, scanned linearly and namespace-filtered on every search.
#[derive(Default)]
pub struct EmbeddedVectorRepository {
    entries: Mutex<HashMap<(Uuid, Sector), Entry>>,
}

impl EmbeddedVectorRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn visible(entry_ns: &BTreeSet<String>, filter: Option<&BTreeSet<String>>) -> bool {
        match filter {
            None => true,
            Some(f) if f.is_empty() => true,
            Some(f) => entry_ns.iter().any(|n| f.contains(n)),
        }
    }
}

impl VectorRepository for EmbeddedVectorRepository {
    fn upsert(
        &self,
        id: Uuid,
        sector: Sector,
        namespaces: BTreeSet<String>,
        vector: Vec<f32>,
    ) -> Result<()> {
        let mut entries = self.entries.lock().expect("vector repo lock poisoned");
        entries.insert((id, sector), Entry { namespaces, vector });
        Ok(())
    }

    fn search(
        &self,
        query: &[f32],
        sector: Sector,
        namespaces: Option<&BTreeSet<String>>,
        limit: usize,
        with_vectors: bool,
    ) -> Result<Vec<VectorSearchHit>> {
        let entries = self.entries.lock().expect("vector repo lock poisoned");

        let mut scanned = 0usize;
        let mut hits: Vec<VectorSearchHit> = Vec::new();
        for ((id, entry_sector), entry) in entries.iter() {
            if *entry_sector != sector || !Self::visible(&entry.namespaces, namespaces) {
                continue;
            }
            if scanned >= MAX_SCAN_CANDIDATES {
                break;
            }
            scanned += 1;
            let similarity = cosine_similarity(query, &entry.vector);
            hits.push(VectorSearchHit {
                    id: *id,
                    sector,
                    similarity,
                    vector: if with_vectors { Some(entry.vector.clone()) } else { None },
            });
        }

        // Highest similarity first; ties broken by lexicographic id.
        hits.sort_by(|a, b| {
                b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    fn delete(&self, id: Uuid, sector: Option<Sector>, namespace: Option<&str>) -> Result<()> {
        let mut entries = self.entries.lock().expect("vector repo lock poisoned");
        entries.retain(|(entry_id, entry_sector), entry| {
                if *entry_id != id {
                    return true;
                }
                if let Some(s) = sector {
                    if *entry_sector != s {
                        return true;
                    }
                }
                if let Some(ns) = namespace {
                    if !entry.namespaces.contains(ns) {
                        return true;
                    }
                }
                false
        });
        Ok(())
    }

    fn get(&self, id: Uuid, sector: Sector) -> Result<Option<Vec<f32>>> {
        let entries = self.entries.lock().expect("vector repo lock poisoned");
        Ok(entries.get(&(id, sector)).map(|e| e.vector.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(s: &str) -> BTreeSet<String> {
        BTreeSet::from([s.to_string()])
    }

    #[test]
    fn search_respects_namespace_isolation() {
        let repo = EmbeddedVectorRepository::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        repo.upsert(a, Sector::Semantic, ns("team-a"), vec![1.0, 0.0]).unwrap();
        repo.upsert(b, Sector::Semantic, ns("team-b"), vec![1.0, 0.0]).unwrap();

        let hits = repo
        .search(&[1.0, 0.0], Sector::Semantic, Some(&ns("team-a")), 10, false)
        .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, a);
    }

    #[test]
    fn search_orders_by_similarity_desc() {
        let repo = EmbeddedVectorRepository::new();
        let close = Uuid::new_v4();
        let far = Uuid::new_v4();
        repo.upsert(close, Sector::Episodic, ns("global"), vec![1.0, 0.0]).unwrap();
        repo.upsert(far, Sector::Episodic, ns("global"), vec![0.0, 1.0]).unwrap();

        let hits = repo
        .search(&[1.0, 0.0], Sector::Episodic, None, 10, false)
        .unwrap();
        assert_eq!(hits[0].id, close);
    }

    #[test]
    fn delete_cascades_all_sectors_when_unscoped() {
        let repo = EmbeddedVectorRepository::new();
        let id = Uuid::new_v4();
        repo.upsert(id, Sector::Episodic, ns("global"), vec![1.0]).unwrap();
        repo.upsert(id, Sector::Semantic, ns("global"), vec![1.0]).unwrap();
        repo.delete(id, None, None).unwrap();
        assert!(repo.get(id, Sector::Episodic).unwrap().is_none());
        assert!(repo.get(id, Sector::Semantic).unwrap().is_none());
    }
}
