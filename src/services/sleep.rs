//! Sleep rollups over record collections.
//!
//! Sleep arrives as categorical interval records. Phases (asleep, in bed,
//! REM) are not interpreted here; durations sum as-is.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::model::HealthRecord;

/// Record type carrying sleep intervals.
pub const SLEEP_RECORD_TYPE: &str = "HKCategoryTypeIdentifierSleepAnalysis";

/// One day's total sleep hours, keyed by the UTC day each interval starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SleepDay {
    pub day: NaiveDate,
    pub hours: f64,
}

/// Sleep records from a mixed collection.
pub fn sleep_records(records: &[HealthRecord]) -> Vec<HealthRecord> {
    records
        .iter()
        .filter(|r| r.record_type == SLEEP_RECORD_TYPE)
        .cloned()
        .collect()
}

/// Occurrence counts of the categorical sleep values, most frequent first.
/// Records without a `value_str` count under `(null)`.
pub fn sleep_value_counts(records: &[HealthRecord], limit: usize) -> Vec<(String, u64)> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for record in records {
        let value = record.value_str.as_deref().unwrap_or("(null)");
        *counts.entry(value).or_default() += 1;
    }

    let mut out: Vec<(String, u64)> = counts
        .into_iter()
        .map(|(value, count)| (value.to_string(), count))
        .collect();
    // Count descending, value ascending on ties.
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out.truncate(limit);
    out
}

/// Total hours of sleep per UTC calendar day, summed over the intervals
/// starting on that day.
pub fn sleep_duration_by_day(records: &[HealthRecord]) -> Vec<SleepDay> {
    let mut days: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for record in records {
        let day = record.start_at.with_timezone(&Utc).date_naive();
        let seconds = (record.end_at - record.start_at).num_seconds() as f64;
        *days.entry(day).or_default() += seconds / 3600.0;
    }

    days.into_iter()
        .map(|(day, hours)| SleepDay { day, hours })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::parse_export_datetime;

    fn sleep(start: &str, end: &str, value: &str) -> HealthRecord {
        HealthRecord {
            record_type: SLEEP_RECORD_TYPE.to_string(),
            start_at: parse_export_datetime(start).unwrap(),
            end_at: parse_export_datetime(end).unwrap(),
            creation_at: None,
            source_name: None,
            unit: None,
            value: None,
            value_str: Some(value.to_string()),
        }
    }

    #[test]
    fn test_sleep_records_filters_by_type() {
        let mut other = sleep(
            "2020-01-01 23:00:00 +0000",
            "2020-01-02 07:00:00 +0000",
            "Asleep",
        );
        other.record_type = "HKQuantityTypeIdentifierStepCount".to_string();
        let records = vec![
            sleep(
                "2020-01-01 23:00:00 +0000",
                "2020-01-02 07:00:00 +0000",
                "Asleep",
            ),
            other,
        ];

        let filtered = sleep_records(&records);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].record_type, SLEEP_RECORD_TYPE);
    }

    #[test]
    fn test_duration_sums_intervals_per_start_day() {
        // Two intervals starting Jan 1 UTC (the second crosses midnight),
        // one starting Jan 2.
        let records = vec![
            sleep(
                "2020-01-01 13:00:00 +0000",
                "2020-01-01 14:30:00 +0000",
                "Asleep",
            ),
            sleep(
                "2020-01-01 23:00:00 +0000",
                "2020-01-02 06:00:00 +0000",
                "InBed",
            ),
            sleep(
                "2020-01-02 23:30:00 +0000",
                "2020-01-03 06:30:00 +0000",
                "Asleep",
            ),
        ];

        let out = sleep_duration_by_day(&records);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].day.to_string(), "2020-01-01");
        assert!((out[0].hours - 8.5).abs() < 1e-9);
        assert_eq!(out[1].day.to_string(), "2020-01-02");
        assert!((out[1].hours - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_value_counts_ordered_and_limited() {
        let mut records = vec![
            sleep(
                "2020-01-01 23:00:00 +0000",
                "2020-01-02 07:00:00 +0000",
                "Asleep",
            ),
            sleep(
                "2020-01-02 23:00:00 +0000",
                "2020-01-03 07:00:00 +0000",
                "Asleep",
            ),
            sleep(
                "2020-01-03 23:00:00 +0000",
                "2020-01-04 07:00:00 +0000",
                "InBed",
            ),
        ];
        records[2].value_str = Some("InBed".to_string());
        let mut nullish = records[0].clone();
        nullish.value_str = None;
        records.push(nullish);

        let counts = sleep_value_counts(&records, 20);
        assert_eq!(
            counts,
            vec![
                ("Asleep".to_string(), 2),
                ("(null)".to_string(), 1),
                ("InBed".to_string(), 1),
            ]
        );

        let top = sleep_value_counts(&records, 1);
        assert_eq!(top, vec![("Asleep".to_string(), 2)]);
    }

    #[test]
    fn test_empty_input() {
        assert!(sleep_records(&[]).is_empty());
        assert!(sleep_duration_by_day(&[]).is_empty());
        assert!(sleep_value_counts(&[], 20).is_empty());
    }
}
