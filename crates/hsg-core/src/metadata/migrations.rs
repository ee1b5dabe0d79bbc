//! Relational reference schema: a const array of
//! `Migration { version, description, up }`, each `up` a raw-SQL constant,
//! applied in order against the writer connection only.

pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    namespaces TEXT NOT NULL,
    segment INTEGER NOT NULL,
    essence TEXT NOT NULL,
    simhash TEXT NOT NULL,
    primary_sector TEXT NOT NULL,
    additional_sectors TEXT NOT NULL DEFAULT '[]',
    tags TEXT NOT NULL DEFAULT 'null',
    meta TEXT NOT NULL DEFAULT 'null',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL,
    salience REAL NOT NULL,
    decay_lambda REAL NOT NULL,
    version INTEGER NOT NULL,
    mean_dim INTEGER,
    mean_vec BLOB,
    compressed_vec BLOB,
    feedback_score REAL NOT NULL DEFAULT 0.0,
    coactivations INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_memories_primary_sector ON memories(primary_sector);
CREATE INDEX IF NOT EXISTS idx_memories_segment ON memories(segment);
CREATE INDEX IF NOT EXISTS idx_memories_simhash ON memories(simhash);
CREATE INDEX IF NOT EXISTS idx_memories_last_seen_at ON memories(last_seen_at);
CREATE INDEX IF NOT EXISTS idx_memories_namespaces ON memories(namespaces);
"#;

const MIGRATION_V2_UP: &str = r#"
CREATE TABLE IF NOT EXISTS vectors (
    id TEXT NOT NULL,
    sector TEXT NOT NULL,
    namespaces TEXT NOT NULL,
    v BLOB NOT NULL,
    dim INTEGER NOT NULL,
    PRIMARY KEY (id, sector)
);

CREATE INDEX IF NOT EXISTS idx_vectors_sector ON vectors(sector);
"#;

const MIGRATION_V3_UP: &str = r#"
-- Composite primary key on (src_id, dst_id, namespaces): a memory can have
-- at most one outgoing edge to a given destination per namespace set.
CREATE TABLE IF NOT EXISTS waypoints (
    src_id TEXT NOT NULL,
    dst_id TEXT NOT NULL,
    namespaces TEXT NOT NULL,
    weight REAL NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (src_id, dst_id, namespaces)
);

CREATE INDEX IF NOT EXISTS idx_waypoints_src ON waypoints(src_id);
CREATE INDEX IF NOT EXISTS idx_waypoints_dst ON waypoints(dst_id);
"#;

const MIGRATION_V4_UP: &str = r#"
CREATE TABLE IF NOT EXISTS embed_logs (
    id TEXT NOT NULL,
    model TEXT NOT NULL,
    status TEXT NOT NULL,
    ts TEXT NOT NULL,
    err TEXT,
    PRIMARY KEY (id, model)
);
"#;

const MIGRATION_V5_UP: &str = r#"
CREATE TABLE IF NOT EXISTS stats (
    type TEXT NOT NULL,
    count INTEGER NOT NULL,
    ts TEXT NOT NULL
);
"#;

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "memories table",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "vectors table (reference relational layout)",
        up: MIGRATION_V2_UP,
    },
    Migration {
        version: 3,
        description: "waypoints table, composite (src_id, dst_id, namespaces) key",
        up: MIGRATION_V3_UP,
    },
    Migration {
        version: 4,
        description: "embed_logs table",
        up: MIGRATION_V4_UP,
    },
    Migration {
        version: 5,
        description: "stats table",
        up: MIGRATION_V5_UP,
    },
];
