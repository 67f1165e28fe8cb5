//! Stable content hashes used as deduplication keys.
//!
//! The export format carries no global identifiers, so each record and
//! workout gets a SHA-256 digest over a pipe-joined, fixed-order tuple of its
//! defining fields. Absent optionals render as the empty string; timestamps
//! render as RFC 3339; floats render with Rust's `{:?}` formatting, the
//! shortest round-trip representation, which is locale-independent and stable
//! across platforms. Collision-resistant against real-world export variation,
//! not against adversarial input.

use sha2::{Digest, Sha256};

use crate::model::{HealthRecord, Workout};
use crate::temporal::format_storage_datetime;

fn float_field(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:?}"),
        None => String::new(),
    }
}

fn str_field(value: Option<&String>) -> &str {
    value.map(String::as_str).unwrap_or("")
}

fn digest(fields: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(fields.join("|").as_bytes());
    hex::encode(hasher.finalize())
}

/// Content hash over a record's defining fields.
pub fn record_hash(record: &HealthRecord) -> String {
    let start = format_storage_datetime(&record.start_at);
    let end = format_storage_datetime(&record.end_at);
    let creation = record
        .creation_at
        .as_ref()
        .map(format_storage_datetime)
        .unwrap_or_default();
    let value = float_field(record.value);

    digest(&[
        &record.record_type,
        &start,
        &end,
        &creation,
        str_field(record.source_name.as_ref()),
        str_field(record.unit.as_ref()),
        &value,
        str_field(record.value_str.as_ref()),
    ])
}

/// Content hash over a workout's defining fields.
pub fn workout_hash(workout: &Workout) -> String {
    let start = format_storage_datetime(&workout.start_at);
    let end = format_storage_datetime(&workout.end_at);
    let creation = workout
        .creation_at
        .as_ref()
        .map(format_storage_datetime)
        .unwrap_or_default();
    let duration = float_field(workout.duration_s);
    let energy = float_field(workout.total_energy_kcal);
    let distance = float_field(workout.total_distance_m);

    digest(&[
        &workout.activity_type,
        &start,
        &end,
        &creation,
        str_field(workout.source_name.as_ref()),
        str_field(workout.device.as_ref()),
        &duration,
        &energy,
        &distance,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::parse_export_datetime;

    fn sample_record() -> HealthRecord {
        HealthRecord {
            record_type: "HKQuantityTypeIdentifierStepCount".to_string(),
            start_at: parse_export_datetime("2020-01-01 10:00:00 +0100").unwrap(),
            end_at: parse_export_datetime("2020-01-01 10:05:00 +0100").unwrap(),
            creation_at: None,
            source_name: Some("iPhone".to_string()),
            unit: Some("count".to_string()),
            value: Some(42.0),
            value_str: None,
        }
    }

    #[test]
    fn test_record_hash_deterministic() {
        let a = sample_record();
        let b = sample_record();
        assert_eq!(record_hash(&a), record_hash(&b));
        assert_eq!(record_hash(&a).len(), 64);
    }

    #[test]
    fn test_record_hash_sensitive_to_each_field() {
        let base = sample_record();
        let base_hash = record_hash(&base);

        let mut changed = sample_record();
        changed.value = Some(43.0);
        assert_ne!(record_hash(&changed), base_hash);

        let mut changed = sample_record();
        changed.unit = None;
        assert_ne!(record_hash(&changed), base_hash);

        let mut changed = sample_record();
        changed.start_at = parse_export_datetime("2020-01-01 10:00:01 +0100").unwrap();
        assert_ne!(record_hash(&changed), base_hash);
    }

    #[test]
    fn test_record_hash_absent_optionals_are_distinct_from_empty_value() {
        // "unit absent" vs "no value at all" must not collide via field
        // position: the pipe-joined tuple keeps positions fixed.
        let mut a = sample_record();
        a.unit = None;
        let mut b = sample_record();
        b.value = None;
        assert_ne!(record_hash(&a), record_hash(&b));
    }

    #[test]
    fn test_workout_hash_deterministic() {
        let w = Workout {
            activity_type: "HKWorkoutActivityTypeRunning".to_string(),
            start_at: parse_export_datetime("2020-01-01 07:00:00 +0100").unwrap(),
            end_at: parse_export_datetime("2020-01-01 07:30:00 +0100").unwrap(),
            creation_at: None,
            source_name: Some("Watch".to_string()),
            device: None,
            duration_s: Some(1800.0),
            total_energy_kcal: Some(250.5),
            total_distance_m: Some(5000.0),
        };
        assert_eq!(workout_hash(&w), workout_hash(&w.clone()));

        let mut other = w.clone();
        other.duration_s = Some(1801.0);
        assert_ne!(workout_hash(&other), workout_hash(&w));
    }
}
