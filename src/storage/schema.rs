//! Database schema definitions for imported health data.

/// Current schema version.
pub const CURRENT_VERSION: i32 = 1;

/// Version tracking table, created before any migration runs.
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL
);
"#;

/// SQL schema for all data tables.
pub const SCHEMA: &str = r#"
-- One row per observation; record_hash is the dedup key.
CREATE TABLE IF NOT EXISTS health_record (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_type TEXT NOT NULL,
    start_at TEXT NOT NULL,
    end_at TEXT NOT NULL,
    creation_at TEXT,
    source_name TEXT,
    unit TEXT,
    value REAL,
    value_str TEXT,
    record_hash TEXT NOT NULL UNIQUE
);

CREATE INDEX IF NOT EXISTS idx_health_record_type_start
    ON health_record(record_type, start_at);

-- Weak reference to health_record by hash value, not by rowid.
CREATE TABLE IF NOT EXISTS record_metadata (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_hash TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    UNIQUE(record_hash, key, value)
);

CREATE INDEX IF NOT EXISTS idx_record_metadata_hash
    ON record_metadata(record_hash);

CREATE TABLE IF NOT EXISTS workout (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    activity_type TEXT NOT NULL,
    start_at TEXT NOT NULL,
    end_at TEXT NOT NULL,
    creation_at TEXT,
    source_name TEXT,
    device TEXT,
    duration_s REAL,
    total_energy_kcal REAL,
    total_distance_m REAL,
    workout_hash TEXT NOT NULL UNIQUE
);

CREATE INDEX IF NOT EXISTS idx_workout_type_start
    ON workout(activity_type, start_at);

CREATE TABLE IF NOT EXISTS workout_metadata (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    workout_hash TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    UNIQUE(workout_hash, key, value)
);

CREATE INDEX IF NOT EXISTS idx_workout_metadata_hash
    ON workout_metadata(workout_hash);

-- One row per calendar day, keyed by the day itself.
CREATE TABLE IF NOT EXISTS activity_summary (
    day TEXT PRIMARY KEY,
    active_energy_kcal INTEGER,
    active_energy_goal_kcal INTEGER,
    exercise_time_min INTEGER,
    exercise_time_goal_min INTEGER,
    stand_hours INTEGER,
    stand_hours_goal INTEGER
);
"#;
