//! `SectorVector` and little-endian f32 packing utilities.

use super::sector::Sector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// A per-sector embedding owned by exactly one memory . A memory may own up to five of these, one per sector it
/// was classified into.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorVector {
    pub id: Uuid,
    pub sector: Sector,
    pub namespaces: BTreeSet<String>,
    pub vector: Vec<f32>,
    pub dim: u32,
}

impl SectorVector {
    pub fn new(id: Uuid, sector: Sector, namespaces: BTreeSet<String>, vector: Vec<f32>) -> Self {
        let dim = vector.len() as u32;
        Self {
            id,
            sector,
            namespaces,
            vector,
            dim,
        }
    }

    /// Pack into little-endian float32 bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        to_bytes(&self.vector)
    }

    pub fn from_bytes(bytes: &[u8]) -> Vec<f32> {
        from_bytes(bytes)
    }
}

/// Pack a vector into little-endian float32 bytes.
pub fn to_bytes(vector: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Unpack little-endian float32 bytes into a vector. Trailing bytes that
/// don't form a full `f32` are ignored.
pub fn from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
    .chunks_exact(4)
    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
    .collect()
}

/// Cosine similarity, bounded to `[-1, 1]` . Returns 0.0
/// if either vector has zero magnitude or the dimensions mismatch.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt()
}

pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// L2-normalize in place with a small `epsilon` floor to avoid dividing by
/// zero on an all-zero vector.
pub fn l2_normalize(vector: &mut [f32], epsilon: f32) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm.max(epsilon);
    for v in vector.iter_mut() {
        *v /= denom;
    }
}

pub fn is_normalized(vector: &[f32], tolerance: f32) -> bool {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    (norm - 1.0).abs() < tolerance
}

/// Truncate or zero-pad `vector` to exactly `dim` elements.
pub fn resize(vector: &[f32], dim: usize) -> Vec<f32> {
    let mut out = vector.to_vec();
    out.resize(dim, 0.0);
    out
}

/// Mean-pool a set of same-length vectors . Returns an empty vector if `vectors` is empty.
pub fn mean_pool(vectors: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let dim = first.len();
    let mut acc = vec![0.0f32; dim];
    for v in vectors {
        for (a, x) in acc.iter_mut().zip(v) {
            *a += x;
        }
    }
    let n = vectors.len() as f32;
    for a in acc.iter_mut() {
        *a /= n;
    }
    acc
}

/// Average-pool `vector` down to `target_dim` contiguous buckets (used for
/// the "pooled-to-128-dim semantic half" in smart-tier fusion and for
/// `compressed_vec` construction during decay).
pub fn pool_to_dim(vector: &[f32], target_dim: usize) -> Vec<f32> {
    if vector.is_empty() || target_dim == 0 {
        return Vec::new();
    }
    if vector.len() <= target_dim {
        return resize(vector, target_dim);
    }
    let bucket = vector.len() as f64 / target_dim as f64;
    (0..target_dim)
    .map(|i| {
            let start = (i as f64 * bucket).floor() as usize;
            let end = (((i + 1) as f64 * bucket).ceil() as usize).min(vector.len()).max(start + 1);
            let slice = &vector[start..end];
            slice.iter().sum::<f32>() / slice.len() as f32
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_round_trip() {
        let v = vec![1.0_f32, -2.5, 0.0, 3.25];
        let bytes = to_bytes(&v);
        assert_eq!(bytes.len(), 16);
        assert_eq!(from_bytes(&bytes), v);
    }

    #[test]
    fn cosine_similarity_is_bounded() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert_eq!(cosine_similarity(&a, &a), 1.0);
        assert!((cosine_similarity(&a, &b) - 0.0).abs() < 1e-6);
        let neg = vec![-1.0, 0.0];
        assert_eq!(cosine_similarity(&a, &neg), -1.0);
    }

    #[test]
    fn cosine_similarity_zero_vector_is_zero() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn l2_normalize_yields_unit_vector() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v, 1e-8);
        assert!(is_normalized(&v, 1e-3));
    }

    #[test]
    fn resize_truncates_and_pads() {
        assert_eq!(resize(&[1.0, 2.0, 3.0], 2), vec![1.0, 2.0]);
        assert_eq!(resize(&[1.0], 3), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn mean_pool_averages_elementwise() {
        let pooled = mean_pool(&[vec![1.0, 1.0], vec![3.0, 5.0]]);
        assert_eq!(pooled, vec![2.0, 3.0]);
    }

    #[test]
    fn pool_to_dim_shrinks_and_passes_through() {
        let v: Vec<f32> = (0..256).map(|i| i as f32).collect();
        let pooled = pool_to_dim(&v, 128);
        assert_eq!(pooled.len(), 128);
        let passthrough = pool_to_dim(&[1.0, 2.0], 4);
        assert_eq!(passthrough.len(), 4);
    }
}
