//! Store operations for imported health data.
//!
//! All writes use INSERT OR IGNORE keyed on the content hash (or the day,
//! for activity summaries) and run inside one transaction per call: a batch
//! either lands completely or not at all, and an already-flushed batch stays
//! durable even when a later one fails.

use chrono::{DateTime, FixedOffset};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::identity;
use crate::model::{ActivitySummary, HealthRecord, RecordMetadata, Workout, WorkoutMetadata};
use crate::storage::database::DatabaseError;
use crate::temporal::{
    format_storage_date, format_storage_datetime, parse_storage_date, parse_storage_datetime,
};

/// Filter for record queries. All fields optional; both time bounds apply to
/// the record's `start_at`.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub record_type: Option<String>,
    pub start_at: Option<DateTime<FixedOffset>>,
    pub end_at: Option<DateTime<FixedOffset>>,
}

/// Ordering for paged record queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrder {
    StartAtAsc,
    StartAtDesc,
}

impl RecordOrder {
    fn sql(self) -> &'static str {
        match self {
            RecordOrder::StartAtAsc => "start_at ASC",
            RecordOrder::StartAtDesc => "start_at DESC",
        }
    }
}

/// One page entry from the record browser: the record plus its dedup key,
/// so callers can fetch metadata without re-deriving the hash.
#[derive(Debug, Clone, Serialize)]
pub struct RecordRow {
    #[serde(flatten)]
    pub record: HealthRecord,
    pub record_hash: String,
}

/// Store for imported health data, borrowing an open connection.
pub struct HealthStore<'a> {
    conn: &'a Connection,
}

impl<'a> HealthStore<'a> {
    /// Create a store over the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    // ========== Upserts ==========

    /// Insert records, ignoring duplicates by content hash.
    /// Returns the number of rows actually inserted.
    pub fn upsert_records(&self, records: &[HealthRecord]) -> Result<usize, DatabaseError> {
        if records.is_empty() {
            return Ok(0);
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO health_record (
                        record_type, start_at, end_at, creation_at,
                        source_name, unit, value, value_str, record_hash
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

            for record in records {
                inserted += stmt
                    .execute(params![
                        record.record_type,
                        format_storage_datetime(&record.start_at),
                        format_storage_datetime(&record.end_at),
                        record.creation_at.as_ref().map(format_storage_datetime),
                        record.source_name,
                        record.unit,
                        record.value,
                        record.value_str,
                        identity::record_hash(record),
                    ])
                    .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            }
        }

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok(inserted)
    }

    /// Insert record metadata triples, ignoring duplicates.
    pub fn upsert_record_metadata(
        &self,
        metadata: &[RecordMetadata],
    ) -> Result<usize, DatabaseError> {
        if metadata.is_empty() {
            return Ok(0);
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO record_metadata (record_hash, key, value)
                     VALUES (?1, ?2, ?3)",
                )
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

            for entry in metadata {
                inserted += stmt
                    .execute(params![entry.record_hash, entry.key, entry.value])
                    .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            }
        }

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok(inserted)
    }

    /// Insert workouts and their metadata, ignoring duplicates.
    /// Returns `(workouts_inserted, metadata_inserted)`.
    pub fn upsert_workouts(
        &self,
        workouts: &[Workout],
        metadata: &[WorkoutMetadata],
    ) -> Result<(usize, usize), DatabaseError> {
        if workouts.is_empty() && metadata.is_empty() {
            return Ok((0, 0));
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        let mut workouts_inserted = 0;
        let mut metadata_inserted = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO workout (
                        activity_type, start_at, end_at, creation_at, source_name,
                        device, duration_s, total_energy_kcal, total_distance_m, workout_hash
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

            for workout in workouts {
                workouts_inserted += stmt
                    .execute(params![
                        workout.activity_type,
                        format_storage_datetime(&workout.start_at),
                        format_storage_datetime(&workout.end_at),
                        workout.creation_at.as_ref().map(format_storage_datetime),
                        workout.source_name,
                        workout.device,
                        workout.duration_s,
                        workout.total_energy_kcal,
                        workout.total_distance_m,
                        identity::workout_hash(workout),
                    ])
                    .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            }

            let mut meta_stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO workout_metadata (workout_hash, key, value)
                     VALUES (?1, ?2, ?3)",
                )
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

            for entry in metadata {
                metadata_inserted += meta_stmt
                    .execute(params![entry.workout_hash, entry.key, entry.value])
                    .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            }
        }

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok((workouts_inserted, metadata_inserted))
    }

    /// Insert activity summaries, ignoring duplicate days.
    pub fn upsert_activity_summaries(
        &self,
        summaries: &[ActivitySummary],
    ) -> Result<usize, DatabaseError> {
        if summaries.is_empty() {
            return Ok(0);
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO activity_summary (
                        day, active_energy_kcal, active_energy_goal_kcal,
                        exercise_time_min, exercise_time_goal_min,
                        stand_hours, stand_hours_goal
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

            for summary in summaries {
                inserted += stmt
                    .execute(params![
                        format_storage_date(&summary.day),
                        summary.active_energy_kcal,
                        summary.active_energy_goal_kcal,
                        summary.exercise_time_min,
                        summary.exercise_time_goal_min,
                        summary.stand_hours,
                        summary.stand_hours_goal,
                    ])
                    .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            }
        }

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok(inserted)
    }

    // ========== Queries ==========

    /// Load records matching the filter, ordered by start_at ascending.
    pub fn load_records(&self, filter: &RecordFilter) -> Result<Vec<HealthRecord>, DatabaseError> {
        let (where_sql, filter_params) = build_record_filter(filter);
        let sql = format!(
            "SELECT record_type, start_at, end_at, creation_at, source_name,
                    unit, value, value_str
             FROM health_record {where_sql}
             ORDER BY start_at ASC"
        );

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(rusqlite::params_from_iter(filter_params.iter()), |row| {
                Ok(RawRecord {
                    record_type: row.get(0)?,
                    start_at: row.get(1)?,
                    end_at: row.get(2)?,
                    creation_at: row.get(3)?,
                    source_name: row.get(4)?,
                    unit: row.get(5)?,
                    value: row.get(6)?,
                    value_str: row.get(7)?,
                    record_hash: None,
                })
            })
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            records.push(raw.into_record()?);
        }
        Ok(records)
    }

    /// Query a bounded page of records with their hashes.
    pub fn query_records_page(
        &self,
        filter: &RecordFilter,
        order: RecordOrder,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<RecordRow>, DatabaseError> {
        let (where_sql, mut query_params) = build_record_filter(filter);
        let sql = format!(
            "SELECT record_type, start_at, end_at, creation_at, source_name,
                    unit, value, value_str, record_hash
             FROM health_record {where_sql}
             ORDER BY {}
             LIMIT ? OFFSET ?",
            order.sql()
        );
        query_params.push(Box::new(limit));
        query_params.push(Box::new(offset));

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(rusqlite::params_from_iter(query_params.iter()), |row| {
                Ok(RawRecord {
                    record_type: row.get(0)?,
                    start_at: row.get(1)?,
                    end_at: row.get(2)?,
                    creation_at: row.get(3)?,
                    source_name: row.get(4)?,
                    unit: row.get(5)?,
                    value: row.get(6)?,
                    value_str: row.get(7)?,
                    record_hash: Some(row.get(8)?),
                })
            })
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut page = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            page.push(raw.into_record_row()?);
        }
        Ok(page)
    }

    /// Count records matching the filter.
    pub fn count_records(&self, filter: &RecordFilter) -> Result<u64, DatabaseError> {
        let (where_sql, filter_params) = build_record_filter(filter);
        let sql = format!("SELECT COUNT(*) FROM health_record {where_sql}");

        self.conn
            .query_row(&sql, rusqlite::params_from_iter(filter_params.iter()), |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as u64)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
    }

    /// List distinct record types, sorted.
    pub fn list_record_types(&self) -> Result<Vec<String>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT record_type FROM health_record ORDER BY record_type")
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
    }

    /// Metadata entries for one record hash, ordered by key.
    pub fn record_metadata_for_hash(
        &self,
        record_hash: &str,
    ) -> Result<Vec<(String, String)>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT key, value FROM record_metadata
                 WHERE record_hash = ?1 ORDER BY key",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![record_hash], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
    }

    /// Load all workouts, ordered by start_at ascending.
    pub fn load_workouts(&self) -> Result<Vec<Workout>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT activity_type, start_at, end_at, creation_at, source_name,
                        device, duration_s, total_energy_kcal, total_distance_m
                 FROM workout ORDER BY start_at ASC",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<f64>>(6)?,
                    row.get::<_, Option<f64>>(7)?,
                    row.get::<_, Option<f64>>(8)?,
                ))
            })
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut workouts = Vec::new();
        for row in rows {
            let (activity_type, start, end, creation, source_name, device, duration, energy, distance) =
                row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            workouts.push(Workout {
                activity_type,
                start_at: parse_stored(&start)?,
                end_at: parse_stored(&end)?,
                creation_at: creation.as_deref().map(parse_stored).transpose()?,
                source_name,
                device,
                duration_s: duration,
                total_energy_kcal: energy,
                total_distance_m: distance,
            });
        }
        Ok(workouts)
    }

    /// Load all activity summaries, ordered by day.
    pub fn load_activity_summaries(&self) -> Result<Vec<ActivitySummary>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT day, active_energy_kcal, active_energy_goal_kcal,
                        exercise_time_min, exercise_time_goal_min,
                        stand_hours, stand_hours_goal
                 FROM activity_summary ORDER BY day ASC",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, Option<i64>>(5)?,
                    row.get::<_, Option<i64>>(6)?,
                ))
            })
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut summaries = Vec::new();
        for row in rows {
            let (day, energy, energy_goal, exercise, exercise_goal, stand, stand_goal) =
                row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            summaries.push(ActivitySummary {
                day: parse_storage_date(&day)
                    .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
                active_energy_kcal: energy,
                active_energy_goal_kcal: energy_goal,
                exercise_time_min: exercise,
                exercise_time_goal_min: exercise_goal,
                stand_hours: stand,
                stand_hours_goal: stand_goal,
            });
        }
        Ok(summaries)
    }

    /// Count workouts in the store.
    pub fn count_workouts(&self) -> Result<u64, DatabaseError> {
        self.count_table("workout")
    }

    /// Count activity summaries in the store.
    pub fn count_activity_summaries(&self) -> Result<u64, DatabaseError> {
        self.count_table("activity_summary")
    }

    /// Count record metadata rows in the store.
    pub fn count_record_metadata(&self) -> Result<u64, DatabaseError> {
        self.count_table("record_metadata")
    }

    /// Count workout metadata rows in the store.
    pub fn count_workout_metadata(&self) -> Result<u64, DatabaseError> {
        self.count_table("workout_metadata")
    }

    fn count_table(&self, table: &str) -> Result<u64, DatabaseError> {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        self.conn
            .query_row(&sql, [], |row| row.get::<_, i64>(0))
            .map(|n| n as u64)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
    }
}

struct RawRecord {
    record_type: String,
    start_at: String,
    end_at: String,
    creation_at: Option<String>,
    source_name: Option<String>,
    unit: Option<String>,
    value: Option<f64>,
    value_str: Option<String>,
    record_hash: Option<String>,
}

impl RawRecord {
    fn into_record(self) -> Result<HealthRecord, DatabaseError> {
        Ok(HealthRecord {
            record_type: self.record_type,
            start_at: parse_stored(&self.start_at)?,
            end_at: parse_stored(&self.end_at)?,
            creation_at: self.creation_at.as_deref().map(parse_stored).transpose()?,
            source_name: self.source_name,
            unit: self.unit,
            value: self.value,
            value_str: self.value_str,
        })
    }

    fn into_record_row(mut self) -> Result<RecordRow, DatabaseError> {
        let record_hash = self.record_hash.take().unwrap_or_default();
        Ok(RecordRow {
            record: self.into_record()?,
            record_hash,
        })
    }
}

fn parse_stored(value: &str) -> Result<DateTime<FixedOffset>, DatabaseError> {
    parse_storage_datetime(value).map_err(|e| DatabaseError::QueryFailed(e.to_string()))
}

fn build_record_filter(filter: &RecordFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clauses: Vec<&str> = Vec::new();
    let mut filter_params: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(record_type) = &filter.record_type {
        clauses.push("record_type = ?");
        filter_params.push(Box::new(record_type.clone()));
    }
    if let Some(start_at) = &filter.start_at {
        clauses.push("start_at >= ?");
        filter_params.push(Box::new(format_storage_datetime(start_at)));
    }
    if let Some(end_at) = &filter.end_at {
        clauses.push("start_at <= ?");
        filter_params.push(Box::new(format_storage_datetime(end_at)));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    (where_sql, filter_params)
}
