//! Vector fusion : the softmax-weighted `mean_vec` and the
//! "smart" tier's synthetic/semantic concatenation.

use crate::model::{l2_normalize, pool_to_dim, Sector};

/// Softmax temperature for `mean_vec` fusion.
const BETA: f64 = 2.0;
const L2_EPSILON: f32 = 1e-8;

/// Fuse per-sector vectors into `mean_vec` using a softmax-weighted average
/// of `w_s = exp(β · sector_weight_s) / Σ exp(β · sector_weight_*)`, then
/// L2-normalize.
/// All input vectors must share the same dimension; mismatched entries are
/// skipped since a memory should never hold malformed sector vectors.
pub fn fuse_mean_vec(per_sector: &[(Sector, Vec<f32>)]) -> Vec<f32> {
    if per_sector.is_empty() {
        return Vec::new();
    }
    let dim = per_sector[0].1.len();
    let usable: Vec<&(Sector, Vec<f32>)> = per_sector.iter().filter(|(_, v)| v.len() == dim).collect();
    if usable.is_empty() {
        return Vec::new();
    }

    let exp_weights: Vec<f64> = usable
    .iter()
    .map(|(s, _)| (BETA * s.default_fusion_weight()).exp())
    .collect();
    let total: f64 = exp_weights.iter().sum();

    let mut fused = vec![0.0f32; dim];
    for ((_, vector), exp_w) in usable.iter().zip(exp_weights.iter()) {
        let w = (*exp_w / total) as f32;
        for (acc, v) in fused.iter_mut().zip(vector.iter()) {
            *acc += v * w;
        }
    }
    l2_normalize(&mut fused, L2_EPSILON);
    fused
}

/// Concatenate a synthetic vector (weight 0.6) with a semantic vector
/// pooled to 128 dims (weight 0.4), then L2-normalize.
pub fn fuse_smart_tier(synthetic: &[f32], semantic: &[f32]) -> Vec<f32> {
    let pooled_semantic = pool_to_dim(semantic, 128);
    let mut fused: Vec<f32> = synthetic.iter().map(|v| v * 0.6).collect();
    fused.extend(pooled_semantic.iter().map(|v| v * 0.4));
    l2_normalize(&mut fused, L2_EPSILON);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::is_normalized;

    #[test]
    fn mean_vec_is_normalized_and_nonempty() {
        let per_sector = vec![
            (Sector::Episodic, vec![1.0, 0.0, 0.0]),
            (Sector::Semantic, vec![0.0, 1.0, 0.0]),
        ];
        let fused = fuse_mean_vec(&per_sector);
        assert_eq!(fused.len(), 3);
        assert!(is_normalized(&fused, 1e-3));
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(fuse_mean_vec(&[]).is_empty());
    }

    #[test]
    fn smart_tier_concatenates_and_normalizes() {
        let synth = vec![1.0; 64];
        let semantic = vec![1.0; 256];
        let fused = fuse_smart_tier(&synth, &semantic);
        assert_eq!(fused.len(), 64 + 128);
        assert!(is_normalized(&fused, 1e-3));
    }
}
