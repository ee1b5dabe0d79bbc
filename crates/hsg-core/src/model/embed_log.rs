//! `EmbedLog` : per-memory provenance of embedding attempts, used to
//! replay re-embedding after a provider outage.

use super::memory::EmbedLogStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedLog {
    pub memory_id: Uuid,
    pub model: String,
    pub status: EmbedLogStatusWire,
    pub ts: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

/// Wire-friendly status, kept distinct from [`EmbedLogStatus`] so the
/// storage boundary can serialize/deserialize without pulling `serde`
/// derives onto the in-memory enum used purely for control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedLogStatusWire {
    Pending,
    Completed,
    Failed,
}

impl From<EmbedLogStatus> for EmbedLogStatusWire {
    fn from(s: EmbedLogStatus) -> Self {
        match s {
            EmbedLogStatus::Pending => EmbedLogStatusWire::Pending,
            EmbedLogStatus::Completed => EmbedLogStatusWire::Completed,
            EmbedLogStatus::Failed => EmbedLogStatusWire::Failed,
        }
    }
}

impl EmbedLog {
    pub fn pending(memory_id: Uuid, model: impl Into<String>, ts: DateTime<Utc>) -> Self {
        Self {
            memory_id,
            model: model.into(),
            status: EmbedLogStatusWire::Pending,
            ts,
            err: None,
        }
    }

    pub fn completed(memory_id: Uuid, model: impl Into<String>, ts: DateTime<Utc>) -> Self {
        Self {
            memory_id,
            model: model.into(),
            status: EmbedLogStatusWire::Completed,
            ts,
            err: None,
        }
    }

    pub fn failed(memory_id: Uuid, model: impl Into<String>, ts: DateTime<Utc>, err: String) -> Self {
        Self {
            memory_id,
            model: model.into(),
            status: EmbedLogStatusWire::Failed,
            ts,
            err: Some(err),
        }
    }
}
