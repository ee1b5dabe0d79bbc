//! SQLite reference implementation of [`MetadataStore`].
//!
//! A `writer` / `reader` connection pair, each behind its own `Mutex`, a
//! shared PRAGMA tuning block, and a migration table of `&'static str`
//! statements applied in order (see `migrations.rs`).

use super::migrations::MIGRATIONS;
use super::{namespaces_key, parse_namespaces_key, MetadataStore};
use crate::error::{HsgError, Result, StorageError};
use crate::model::{from_bytes, to_bytes, EmbedLog, EmbedLogStatusWire, Memory, Sector, Waypoint};
use crate::tokenizer::simhash::{hamming_distance, parse_hex};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// WAL journaling, relaxed synchronous mode, a generous page cache, foreign
/// keys on, and a bounded busy timeout so concurrent writer/reader access
/// doesn't deadlock.
fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA cache_size = -16000;
        PRAGMA temp_store = MEMORY;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        PRAGMA mmap_size = 268435456;
        ",
    )
}

fn apply_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .map_err(StorageError::Database)?;
    let current: u32 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))
        .map_err(StorageError::Database)?;
    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        conn.execute_batch(migration.up).map_err(StorageError::Database)?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            params![migration.version],
        )
        .map_err(StorageError::Database)?;
    }
    Ok(())
}

/// The SQLite-backed reference [`MetadataStore`].
pub struct SqliteMetadataStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl SqliteMetadataStore {
    /// Open (creating if absent) the database file at `path`, applying any
    /// pending migrations on the writer connection.
    pub fn open(path: &Path) -> Result<Self> {
        let writer = Connection::open(path).map_err(StorageError::Database)?;
        configure_connection(&writer).map_err(StorageError::Database)?;
        apply_migrations(&writer)?;

        let reader = Connection::open(path).map_err(StorageError::Database)?;
        configure_connection(&reader).map_err(StorageError::Database)?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        })
    }

    /// Default on-disk path, under the platform data directory via
    /// `ProjectDirs`.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("engine", "hsg", "hsg")
            .ok_or_else(|| HsgError::Storage(StorageError::Init("no home directory".into())))?;
        let dir = dirs.data_dir();
        std::fs::create_dir_all(dir).map_err(StorageError::Io)?;
        Ok(dir.join("hsg.sqlite3"))
    }

    pub fn open_default() -> Result<Self> {
        Self::open(&Self::default_path()?)
    }

    fn row_to_memory(row: &rusqlite::Row) -> rusqlite::Result<Memory> {
        let id: String = row.get("id")?;
        let namespaces_json: String = row.get("namespaces")?;
        let segment: i64 = row.get("segment")?;
        let essence: String = row.get("essence")?;
        let simhash: String = row.get("simhash")?;
        let primary_sector: String = row.get("primary_sector")?;
        let additional_sectors_json: String = row.get("additional_sectors")?;
        let tags_json: String = row.get("tags")?;
        let meta_json: String = row.get("meta")?;
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;
        let last_seen_at: String = row.get("last_seen_at")?;
        let salience: f64 = row.get("salience")?;
        let decay_lambda: f64 = row.get("decay_lambda")?;
        let version: i64 = row.get("version")?;
        let mean_dim: Option<i64> = row.get("mean_dim")?;
        let mean_vec: Option<Vec<u8>> = row.get("mean_vec")?;
        let compressed_vec: Option<Vec<u8>> = row.get("compressed_vec")?;
        let feedback_score: f64 = row.get("feedback_score")?;
        let coactivations: i64 = row.get("coactivations")?;

        Ok(Memory {
            id: Uuid::parse_str(&id).unwrap_or_default(),
            namespaces: serde_json::from_str(&namespaces_json).unwrap_or_default(),
            segment: segment as u64,
            essence,
            simhash,
            primary_sector: Sector::parse_name(&primary_sector).unwrap_or(Sector::Semantic),
            additional_sectors: serde_json::from_str::<Vec<String>>(&additional_sectors_json)
                .unwrap_or_default()
                .iter()
                .filter_map(|s| Sector::parse_name(s))
                .collect(),
            tags: serde_json::from_str(&tags_json).unwrap_or(serde_json::Value::Null),
            meta: serde_json::from_str(&meta_json).unwrap_or(serde_json::Value::Null),
            created_at: parse_ts(&created_at),
            updated_at: parse_ts(&updated_at),
            last_seen_at: parse_ts(&last_seen_at),
            salience,
            decay_lambda,
            version: version as u64,
            mean_dim: mean_dim.map(|d| d as u32),
            mean_vec: mean_vec.map(|b| from_bytes(&b)),
            compressed_vec: compressed_vec.map(|b| from_bytes(&b)),
            feedback_score,
            coactivation_count: coactivations as u32,
        })
    }

    fn upsert_memory_row(conn: &Connection, memory: &Memory) -> Result<()> {
        let namespaces_json = serde_json::to_string(&memory.namespaces).unwrap();
        let additional_json = serde_json::to_string(
            &memory
                .additional_sectors
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>(),
        )
        .unwrap();
        let tags_json = memory.tags.to_string();
        let meta_json = memory.meta.to_string();
        conn.execute(
            "INSERT INTO memories (
                id, namespaces, segment, essence, simhash, primary_sector, additional_sectors,
                tags, meta, created_at, updated_at, last_seen_at, salience, decay_lambda,
                version, mean_dim, mean_vec, compressed_vec, feedback_score, coactivations
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20)
            ON CONFLICT(id) DO UPDATE SET
                namespaces=excluded.namespaces, segment=excluded.segment, essence=excluded.essence,
                simhash=excluded.simhash, primary_sector=excluded.primary_sector,
                additional_sectors=excluded.additional_sectors, tags=excluded.tags, meta=excluded.meta,
                created_at=excluded.created_at, updated_at=excluded.updated_at,
                last_seen_at=excluded.last_seen_at, salience=excluded.salience,
                decay_lambda=excluded.decay_lambda, version=excluded.version, mean_dim=excluded.mean_dim,
                mean_vec=excluded.mean_vec, compressed_vec=excluded.compressed_vec,
                feedback_score=excluded.feedback_score, coactivations=excluded.coactivations",
            params![
                memory.id.to_string(),
                namespaces_json,
                memory.segment as i64,
                memory.essence,
                memory.simhash,
                memory.primary_sector.as_str(),
                additional_json,
                tags_json,
                meta_json,
                fmt_ts(memory.created_at),
                fmt_ts(memory.updated_at),
                fmt_ts(memory.last_seen_at),
                memory.salience,
                memory.decay_lambda,
                memory.version as i64,
                memory.mean_dim.map(|d| d as i64),
                memory.mean_vec.as_ref().map(|v| to_bytes(v)),
                memory.compressed_vec.as_ref().map(|v| to_bytes(v)),
                memory.feedback_score,
                memory.coactivation_count as i64,
            ],
        )
        .map_err(StorageError::Database)?;
        Ok(())
    }
}

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl MetadataStore for SqliteMetadataStore {
    fn insert_memory(&self, memory: &Memory) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        Self::upsert_memory_row(&conn, memory)
    }

    fn get_memory(&self, id: Uuid) -> Result<Option<Memory>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        conn.query_row(
            "SELECT * FROM memories WHERE id = ?1",
            params![id.to_string()],
            Self::row_to_memory,
        )
        .optional()
        .map_err(|e| HsgError::Storage(StorageError::Database(e)))
    }

    fn replace_memory(&self, memory: &Memory) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        Self::upsert_memory_row(&conn, memory)
    }

    fn delete_memory(&self, id: Uuid) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        let tx = conn.unchecked_transaction().map_err(StorageError::Database)?;
        tx.execute("DELETE FROM memories WHERE id = ?1", params![id.to_string()])
            .map_err(StorageError::Database)?;
        tx.execute(
            "DELETE FROM waypoints WHERE src_id = ?1 OR dst_id = ?1",
            params![id.to_string()],
        )
        .map_err(StorageError::Database)?;
        tx.commit().map_err(StorageError::Database)?;
        Ok(())
    }

    fn update_salience_and_last_seen(
        &self,
        id: Uuid,
        last_seen: DateTime<Utc>,
        salience: f64,
    ) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute(
            "UPDATE memories SET last_seen_at = ?1, salience = ?2 WHERE id = ?3",
            params![fmt_ts(last_seen), salience, id.to_string()],
        )
        .map_err(StorageError::Database)?;
        Ok(())
    }

    fn update_salience(&self, id: Uuid, salience: f64) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute(
            "UPDATE memories SET salience = ?1 WHERE id = ?2",
            params![salience, id.to_string()],
        )
        .map_err(StorageError::Database)?;
        Ok(())
    }

    fn nearest_by_simhash(
        &self,
        simhash: u64,
        namespaces: &BTreeSet<String>,
    ) -> Result<Option<(Uuid, u32)>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let mut stmt = conn
            .prepare("SELECT id, simhash, namespaces FROM memories")
            .map_err(StorageError::Database)?;
        let mut best: Option<(Uuid, u32)> = None;
        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let hex: String = row.get(1)?;
                let ns_json: String = row.get(2)?;
                Ok((id, hex, ns_json))
            })
            .map_err(StorageError::Database)?;
        for row in rows {
            let (id, hex, ns_json) = row.map_err(StorageError::Database)?;
            let entry_ns: BTreeSet<String> = serde_json::from_str(&ns_json).unwrap_or_default();
            if !namespaces.is_empty() && !entry_ns.iter().any(|n| namespaces.contains(n)) {
                continue;
            }
            let Some(entry_hash) = parse_hex(&hex) else { continue };
            let dist = hamming_distance(simhash, entry_hash);
            if best.is_none_or(|(_, best_dist)| dist < best_dist) {
                let Ok(uuid) = Uuid::parse_str(&id) else { continue };
                best = Some((uuid, dist));
            }
        }
        Ok(best)
    }

    fn memories_by_primary_sector(
        &self,
        sector: Sector,
        namespaces: &BTreeSet<String>,
    ) -> Result<Vec<(Uuid, Vec<f32>)>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let mut stmt = conn
            .prepare("SELECT id, namespaces, mean_vec FROM memories WHERE primary_sector = ?1")
            .map_err(StorageError::Database)?;
        let rows = stmt
            .query_map(params![sector.as_str()], |row| {
                let id: String = row.get(0)?;
                let ns_json: String = row.get(1)?;
                let mean_vec: Option<Vec<u8>> = row.get(2)?;
                Ok((id, ns_json, mean_vec))
            })
            .map_err(StorageError::Database)?;
        collect_mean_vecs(rows, namespaces)
    }

    fn all_memory_mean_vecs(&self, namespaces: &BTreeSet<String>) -> Result<Vec<(Uuid, Vec<f32>)>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let mut stmt = conn
            .prepare("SELECT id, namespaces, mean_vec FROM memories")
            .map_err(StorageError::Database)?;
        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let ns_json: String = row.get(1)?;
                let mean_vec: Option<Vec<u8>> = row.get(2)?;
                Ok((id, ns_json, mean_vec))
            })
            .map_err(StorageError::Database)?;
        collect_mean_vecs(rows, namespaces)
    }

    fn max_segment(&self) -> Result<(u64, u64)> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let max_segment: Option<i64> = conn
            .query_row("SELECT MAX(segment) FROM memories", [], |r| r.get(0))
            .map_err(StorageError::Database)?;
        let Some(max_segment) = max_segment else {
            return Ok((0, 0));
        };
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM memories WHERE segment = ?1",
                params![max_segment],
                |r| r.get(0),
            )
            .map_err(StorageError::Database)?;
        Ok((max_segment as u64, count as u64))
    }

    fn all_segments(&self) -> Result<Vec<u64>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let mut stmt = conn
            .prepare("SELECT DISTINCT segment FROM memories ORDER BY segment ASC")
            .map_err(StorageError::Database)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, i64>(0))
            .map_err(StorageError::Database)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(StorageError::Database)? as u64);
        }
        Ok(out)
    }

    fn sample_segment_memory_ids(&self, segment: u64, ratio: f64) -> Result<Vec<Uuid>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM memories WHERE segment = ?1",
                params![segment as i64],
                |r| r.get(0),
            )
            .map_err(StorageError::Database)?;
        let sample_size = ((count as f64) * ratio).ceil().max(0.0) as i64;
        if sample_size <= 0 {
            return Ok(Vec::new());
        }
        let mut stmt = conn
            .prepare("SELECT id FROM memories WHERE segment = ?1 ORDER BY RANDOM() LIMIT ?2")
            .map_err(StorageError::Database)?;
        let rows = stmt
            .query_map(params![segment as i64, sample_size], |row| row.get::<_, String>(0))
            .map_err(StorageError::Database)?;
        let mut out = Vec::new();
        for row in rows {
            let id = row.map_err(StorageError::Database)?;
            if let Ok(uuid) = Uuid::parse_str(&id) {
                out.push(uuid);
            }
        }
        Ok(out)
    }

    fn bump_coactivation_count(&self, id: Uuid) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute(
            "UPDATE memories SET coactivations = coactivations + 1 WHERE id = ?1",
            params![id.to_string()],
        )
        .map_err(StorageError::Database)?;
        Ok(())
    }

    fn upsert_waypoint(&self, waypoint: &Waypoint) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        let key = namespaces_key(&waypoint.namespaces);
        conn.execute(
            "INSERT INTO waypoints (src_id, dst_id, namespaces, weight, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6)
             ON CONFLICT(src_id, dst_id, namespaces) DO UPDATE SET
                weight=excluded.weight, updated_at=excluded.updated_at",
            params![
                waypoint.src_id.to_string(),
                waypoint.dst_id.to_string(),
                key,
                waypoint.weight,
                fmt_ts(waypoint.created_at),
                fmt_ts(waypoint.updated_at),
            ],
        )
        .map_err(StorageError::Database)?;
        Ok(())
    }

    fn get_waypoint(
        &self,
        src: Uuid,
        dst: Uuid,
        namespaces: &BTreeSet<String>,
    ) -> Result<Option<Waypoint>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let key = namespaces_key(namespaces);
        conn.query_row(
            "SELECT src_id, dst_id, namespaces, weight, created_at, updated_at
             FROM waypoints WHERE src_id = ?1 AND dst_id = ?2 AND namespaces = ?3",
            params![src.to_string(), dst.to_string(), key],
            row_to_waypoint,
        )
        .optional()
        .map_err(|e| HsgError::Storage(StorageError::Database(e)))
    }

    fn outgoing_waypoints(&self, id: Uuid) -> Result<Vec<Waypoint>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT src_id, dst_id, namespaces, weight, created_at, updated_at
                 FROM waypoints WHERE src_id = ?1",
            )
            .map_err(StorageError::Database)?;
        let rows = stmt
            .query_map(params![id.to_string()], row_to_waypoint)
            .map_err(StorageError::Database)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(StorageError::Database)?);
        }
        Ok(out)
    }

    fn delete_waypoints_touching(&self, id: Uuid) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute(
            "DELETE FROM waypoints WHERE src_id = ?1 OR dst_id = ?1",
            params![id.to_string()],
        )
        .map_err(StorageError::Database)?;
        Ok(())
    }

    fn prune_waypoints(&self) -> Result<u64> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        let removed = conn
            .execute(
                "DELETE FROM waypoints WHERE weight < ?1",
                params![crate::model::PRUNE_THRESHOLD],
            )
            .map_err(StorageError::Database)?;
        Ok(removed as u64)
    }

    fn upsert_embed_log(&self, log: &EmbedLog) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        let status = match log.status {
            EmbedLogStatusWire::Pending => "pending",
            EmbedLogStatusWire::Completed => "completed",
            EmbedLogStatusWire::Failed => "failed",
        };
        conn.execute(
            "INSERT INTO embed_logs (id, model, status, ts, err) VALUES (?1,?2,?3,?4,?5)
             ON CONFLICT(id, model) DO UPDATE SET status=excluded.status, ts=excluded.ts, err=excluded.err",
            params![
                log.memory_id.to_string(),
                log.model,
                status,
                fmt_ts(log.ts),
                log.err,
            ],
        )
        .map_err(StorageError::Database)?;
        Ok(())
    }

    fn get_embed_log(&self, id: Uuid, model: &str) -> Result<Option<EmbedLog>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        conn.query_row(
            "SELECT id, model, status, ts, err FROM embed_logs WHERE id = ?1 AND model = ?2",
            params![id.to_string(), model],
            |row| {
                let id: String = row.get(0)?;
                let model: String = row.get(1)?;
                let status: String = row.get(2)?;
                let ts: String = row.get(3)?;
                let err: Option<String> = row.get(4)?;
                Ok(EmbedLog {
                    memory_id: Uuid::parse_str(&id).unwrap_or_default(),
                    model,
                    status: match status.as_str() {
                        "completed" => EmbedLogStatusWire::Completed,
                        "failed" => EmbedLogStatusWire::Failed,
                        _ => EmbedLogStatusWire::Pending,
                    },
                    ts: parse_ts(&ts),
                    err,
                })
            },
        )
        .optional()
        .map_err(|e| HsgError::Storage(StorageError::Database(e)))
    }

    fn record_stat(&self, kind: &str, count: i64, ts: DateTime<Utc>) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute(
            "INSERT INTO stats (type, count, ts) VALUES (?1,?2,?3)",
            params![kind, count, fmt_ts(ts)],
        )
        .map_err(StorageError::Database)?;
        Ok(())
    }
}

fn row_to_waypoint(row: &rusqlite::Row) -> rusqlite::Result<Waypoint> {
    let src_id: String = row.get(0)?;
    let dst_id: String = row.get(1)?;
    let namespaces: String = row.get(2)?;
    let weight: f64 = row.get(3)?;
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;
    Ok(Waypoint {
        src_id: Uuid::parse_str(&src_id).unwrap_or_default(),
        dst_id: Uuid::parse_str(&dst_id).unwrap_or_default(),
        namespaces: parse_namespaces_key(&namespaces),
        weight,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

fn collect_mean_vecs(
    rows: impl Iterator<Item = rusqlite::Result<(String, String, Option<Vec<u8>>)>>,
    namespaces: &BTreeSet<String>,
) -> Result<Vec<(Uuid, Vec<f32>)>> {
    let mut out = Vec::new();
    for row in rows {
        let (id, ns_json, mean_vec) = row.map_err(StorageError::Database)?;
        let Some(mean_vec) = mean_vec else { continue };
        let entry_ns: BTreeSet<String> = serde_json::from_str(&ns_json).unwrap_or_default();
        if !namespaces.is_empty() && !entry_ns.iter().any(|n| namespaces.contains(n)) {
            continue;
        }
        let Ok(uuid) = Uuid::parse_str(&id) else { continue };
        out.push((uuid, from_bytes(&mean_vec)));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Memory;

    fn store() -> (tempfile::TempDir, SqliteMetadataStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite3");
        let store = SqliteMetadataStore::open(&path).unwrap();
        (dir, store)
    }

    fn sample_memory() -> Memory {
        Memory::new(
            "essence text".into(),
            "0".repeat(16),
            Sector::Semantic,
            vec![],
            serde_json::Value::Null,
            serde_json::Value::Null,
            BTreeSet::from(["global".to_string()]),
            0,
            0.4,
            Utc::now(),
        )
    }

    #[test]
    fn insert_and_get_round_trips() {
        let (_dir, store) = store();
        let memory = sample_memory();
        store.insert_memory(&memory).unwrap();
        let fetched = store.get_memory(memory.id).unwrap().unwrap();
        assert_eq!(fetched.essence, memory.essence);
        assert_eq!(fetched.primary_sector, memory.primary_sector);
    }

    #[test]
    fn delete_removes_memory_and_waypoints() {
        let (_dir, store) = store();
        let memory = sample_memory();
        store.insert_memory(&memory).unwrap();
        let other = Uuid::new_v4();
        store
            .upsert_waypoint(&Waypoint::new(
                memory.id,
                other,
                BTreeSet::from(["global".to_string()]),
                0.5,
                Utc::now(),
            ))
            .unwrap();
        store.delete_memory(memory.id).unwrap();
        assert!(store.get_memory(memory.id).unwrap().is_none());
        assert!(store.outgoing_waypoints(memory.id).unwrap().is_empty());
    }

    #[test]
    fn waypoint_upsert_is_idempotent_on_weight() {
        let (_dir, store) = store();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ns = BTreeSet::from(["global".to_string()]);
        store.upsert_waypoint(&Waypoint::new(a, b, ns.clone(), 0.3, Utc::now())).unwrap();
        store.upsert_waypoint(&Waypoint::new(a, b, ns.clone(), 0.6, Utc::now())).unwrap();
        let fetched = store.get_waypoint(a, b, &ns).unwrap().unwrap();
        assert_eq!(fetched.weight, 0.6);
        assert_eq!(store.outgoing_waypoints(a).unwrap().len(), 1);
    }

    #[test]
    fn prune_waypoints_removes_only_low_weight_edges() {
        let (_dir, store) = store();
        let a = Uuid::new_v4();
        let ns = BTreeSet::from(["global".to_string()]);
        store.upsert_waypoint(&Waypoint::new(a, Uuid::new_v4(), ns.clone(), 0.01, Utc::now())).unwrap();
        store.upsert_waypoint(&Waypoint::new(a, Uuid::new_v4(), ns.clone(), 0.5, Utc::now())).unwrap();
        let removed = store.prune_waypoints().unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.outgoing_waypoints(a).unwrap().len(), 1);
    }

    #[test]
    fn bump_coactivation_count_increments() {
        let (_dir, store) = store();
        let memory = sample_memory();
        store.insert_memory(&memory).unwrap();
        store.bump_coactivation_count(memory.id).unwrap();
        store.bump_coactivation_count(memory.id).unwrap();
        let fetched = store.get_memory(memory.id).unwrap().unwrap();
        assert_eq!(fetched.coactivation_count, 2);
    }

    #[test]
    fn nearest_by_simhash_respects_namespace_filter() {
        let (_dir, store) = store();
        let mut a = sample_memory();
        a.namespaces = BTreeSet::from(["team-a".to_string()]);
        a.simhash = format!("{:016x}", 0u64);
        store.insert_memory(&a).unwrap();

        let found = store
            .nearest_by_simhash(0u64, &BTreeSet::from(["team-b".to_string()]))
            .unwrap();
        assert!(found.is_none());

        let found = store
            .nearest_by_simhash(0u64, &BTreeSet::from(["team-a".to_string()]))
            .unwrap();
        assert_eq!(found.map(|(id, _)| id), Some(a.id));
    }
}
