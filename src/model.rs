//! Normalized entities extracted from a health-data export.
//!
//! All entities are created during import and never mutated afterward. The
//! store owns persisted rows; in-memory values are transient extraction
//! artifacts that live for a single batch.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// One timestamped physiological or behavioral observation.
///
/// At most one of `value` / `value_str` is populated: numeric parsing is
/// attempted first and the raw string is kept only when it fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    /// Metric code, e.g. `HKQuantityTypeIdentifierStepCount`.
    pub record_type: String,
    pub start_at: DateTime<FixedOffset>,
    pub end_at: DateTime<FixedOffset>,
    pub creation_at: Option<DateTime<FixedOffset>>,
    pub source_name: Option<String>,
    pub unit: Option<String>,
    pub value: Option<f64>,
    pub value_str: Option<String>,
}

/// Key/value annotation belonging to a record, addressed by the owning
/// record's content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub record_hash: String,
    pub key: String,
    pub value: String,
}

/// One exercise session with aggregate metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    /// Activity code, e.g. `HKWorkoutActivityTypeRunning`.
    pub activity_type: String,
    pub start_at: DateTime<FixedOffset>,
    pub end_at: DateTime<FixedOffset>,
    pub creation_at: Option<DateTime<FixedOffset>>,
    pub source_name: Option<String>,
    pub device: Option<String>,
    pub duration_s: Option<f64>,
    pub total_energy_kcal: Option<f64>,
    pub total_distance_m: Option<f64>,
}

/// Key/value annotation belonging to a workout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutMetadata {
    pub workout_hash: String,
    pub key: String,
    pub value: String,
}

/// One calendar day's activity-ring summary. Keyed by the day itself: a
/// later import of the same day is ignored, not merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub day: NaiveDate,
    pub active_energy_kcal: Option<i64>,
    pub active_energy_goal_kcal: Option<i64>,
    pub exercise_time_min: Option<i64>,
    pub exercise_time_goal_min: Option<i64>,
    pub stand_hours: Option<i64>,
    pub stand_hours_goal: Option<i64>,
}
