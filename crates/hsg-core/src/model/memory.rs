//! The `Memory` entity and its lifecycle invariants.

use super::sector::Sector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// An embedding state a [`Memory`]'s sector vectors may be in ;
/// not persisted directly but useful to callers inspecting a memory.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedLogStatus {
    Pending,
    Completed,
    Failed,
}

impl EmbedLogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EmbedLogStatus::Pending => "pending",
            EmbedLogStatus::Completed => "completed",
            EmbedLogStatus::Failed => "failed",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EmbedLogStatus::Pending),
            "completed" => Some(EmbedLogStatus::Completed),
            "failed" => Some(EmbedLogStatus::Failed),
            _ => None,
        }
    }
}

/// A single persisted memory.
/// `content` is never stored raw: the field actually persisted is the lossy
/// essence.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub id: Uuid,
    pub namespaces: BTreeSet<String>,
    pub segment: u64,
    /// The lossy essence actually stored; raw content is discarded at ingest.
    pub essence: String,
    /// 16-character lowercase hex encoding of the 64-bit simhash.
    pub simhash: String,
    pub primary_sector: Sector,
    #[serde(default)]
    pub additional_sectors: Vec<Sector>,
    #[serde(default)]
    pub tags: serde_json::Value,
    #[serde(default)]
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub salience: f64,
    pub decay_lambda: f64,
    pub version: u64,
    pub mean_dim: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_vec: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_vec: Option<Vec<f32>>,
    pub feedback_score: f64,
    /// Count of co-activation events touching this memory; part of the
    /// `hot` tier test alongside `salience`.
    pub coactivation_count: u32,
}

impl Memory {
    /// Construct a new memory with its core invariants already enforced
    /// (salience clamp, namespace default, version seeded at 1,
    /// `created_at`/`updated_at`/`last_seen_at` all set to `now`).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        essence: String,
        simhash: String,
        primary_sector: Sector,
        additional_sectors: Vec<Sector>,
        tags: serde_json::Value,
        meta: serde_json::Value,
        namespaces: BTreeSet<String>,
        segment: u64,
        salience: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let namespaces = if namespaces.is_empty() {
            BTreeSet::from(["global".to_string()])
        } else {
            namespaces
        };
        Self {
            id: Uuid::new_v4(),
            namespaces,
            segment,
            essence,
            simhash,
            decay_lambda: primary_sector.default_decay_lambda(),
            primary_sector,
            additional_sectors,
            tags,
            meta,
            created_at: now,
            updated_at: now,
            last_seen_at: now,
            salience: salience.clamp(0.0, 1.0),
            version: 1,
            mean_dim: None,
            mean_vec: None,
            compressed_vec: None,
            feedback_score: 0.0,
            coactivation_count: 0,
        }
    }

    /// True iff every invariant this type can self-check holds.
    pub fn check_invariants(&self) -> bool {
        let salience_ok = (0.0..=1.0).contains(&self.salience);
        let version_ok = self.version >= 1;
        let mean_vec_ok = match (&self.mean_vec, self.mean_dim) {
            (Some(v), Some(d)) => v.len() as u32 == d,
            (None, None) => true,
            _ => false,
        };
        let timestamps_ok = self.created_at <= self.updated_at && self.created_at <= self.last_seen_at;
        salience_ok && version_ok && mean_vec_ok && timestamps_ok
    }

    /// Whether `namespaces` overlaps one of `filter` (or `filter` is empty,
    /// meaning "no namespace restriction").
    pub fn visible_in(&self, filter: &BTreeSet<String>) -> bool {
        filter.is_empty() || self.namespaces.iter().any(|n| filter.contains(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
    }

    #[test]
    fn empty_namespaces_rewritten_to_global() {
        let m = Memory::new(
            "essence".into(),
            "0".repeat(16),
            Sector::Semantic,
            vec![],
            serde_json::Value::Null,
            serde_json::Value::Null,
            BTreeSet::new(),
            0,
            0.4,
            now(),
        );
        assert_eq!(m.namespaces, BTreeSet::from(["global".to_string()]));
        assert!(m.check_invariants());
    }

    #[test]
    fn salience_is_clamped() {
        let m = Memory::new(
            "e".into(),
            "0".repeat(16),
            Sector::Semantic,
            vec![],
            serde_json::Value::Null,
            serde_json::Value::Null,
            BTreeSet::from(["global".to_string()]),
            0,
            1.4,
            now(),
        );
        assert_eq!(m.salience, 1.0);
    }

    #[test]
    fn visible_in_respects_namespace_filter() {
        let m = Memory::new(
            "e".into(),
            "0".repeat(16),
            Sector::Semantic,
            vec![],
            serde_json::Value::Null,
            serde_json::Value::Null,
            BTreeSet::from(["team-a".to_string()]),
            0,
            0.4,
            now(),
        );
        assert!(m.visible_in(&BTreeSet::from(["team-a".to_string()])));
        assert!(!m.visible_in(&BTreeSet::from(["team-b".to_string()])));
        assert!(m.visible_in(&BTreeSet::new()));
    }
}
