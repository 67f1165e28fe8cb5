//! Daily rollups over record collections.
//!
//! Consumer-facing aggregation for the presentation layer: records are
//! grouped by UTC calendar day over their numeric values. Non-numeric and
//! malformed rows are dropped rather than surfaced as errors, so an empty or
//! all-categorical input yields an empty result instead of a failure.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::model::HealthRecord;

/// How to combine a day's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    /// Sum per day (e.g. step counts).
    Sum,
    /// Mean per day (e.g. heart rate).
    Mean,
    /// Last value per day by start time (e.g. body mass).
    Last,
}

/// One day's aggregated value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyValue {
    pub day: NaiveDate,
    pub value: f64,
    pub count: u64,
}

/// Roll numeric records up into one value per UTC calendar day.
pub fn summarize_by_day(records: &[HealthRecord], agg: Aggregate) -> Vec<DailyValue> {
    let mut days: BTreeMap<NaiveDate, Vec<(DateTime<Utc>, f64)>> = BTreeMap::new();

    for record in records {
        let Some(value) = record.value else { continue };
        if !value.is_finite() {
            continue;
        }
        let at = record.start_at.with_timezone(&Utc);
        days.entry(at.date_naive()).or_default().push((at, value));
    }

    days.into_iter()
        .map(|(day, mut values)| {
            let count = values.len() as u64;
            let value = match agg {
                Aggregate::Sum => values.iter().map(|(_, v)| v).sum(),
                Aggregate::Mean => {
                    values.iter().map(|(_, v)| v).sum::<f64>() / values.len() as f64
                }
                Aggregate::Last => {
                    values.sort_by_key(|(at, _)| *at);
                    values[values.len() - 1].1
                }
            };
            DailyValue { day, value, count }
        })
        .collect()
}

/// Distinct record types present in a collection, sorted.
pub fn available_record_types(records: &[HealthRecord]) -> Vec<String> {
    let mut types: Vec<String> = records.iter().map(|r| r.record_type.clone()).collect();
    types.sort();
    types.dedup();
    types
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::parse_export_datetime;

    fn record(start: &str, value: Option<f64>, value_str: Option<&str>) -> HealthRecord {
        HealthRecord {
            record_type: "HKQuantityTypeIdentifierStepCount".to_string(),
            start_at: parse_export_datetime(start).unwrap(),
            end_at: parse_export_datetime(start).unwrap(),
            creation_at: None,
            source_name: None,
            unit: None,
            value,
            value_str: value_str.map(str::to_string),
        }
    }

    #[test]
    fn test_sum_groups_by_utc_day() {
        // 00:30 +0100 is 23:30 UTC the previous day.
        let records = vec![
            record("2020-01-02 00:30:00 +0100", Some(10.0), None),
            record("2020-01-02 08:00:00 +0100", Some(5.0), None),
            record("2020-01-02 09:00:00 +0100", Some(7.0), None),
        ];

        let out = summarize_by_day(&records, Aggregate::Sum);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].day.to_string(), "2020-01-01");
        assert_eq!(out[0].value, 10.0);
        assert_eq!(out[1].day.to_string(), "2020-01-02");
        assert_eq!(out[1].value, 12.0);
        assert_eq!(out[1].count, 2);
    }

    #[test]
    fn test_mean_and_last() {
        let records = vec![
            record("2020-01-01 10:00:00 +0000", Some(60.0), None),
            record("2020-01-01 12:00:00 +0000", Some(80.0), None),
        ];

        let mean = summarize_by_day(&records, Aggregate::Mean);
        assert_eq!(mean[0].value, 70.0);

        let last = summarize_by_day(&records, Aggregate::Last);
        assert_eq!(last[0].value, 80.0);
    }

    #[test]
    fn test_empty_input_yields_empty_result() {
        assert!(summarize_by_day(&[], Aggregate::Sum).is_empty());
    }

    #[test]
    fn test_non_numeric_rows_are_dropped_not_raised() {
        let records = vec![
            record("2020-01-01 10:00:00 +0000", None, Some("Asleep")),
            record("2020-01-01 11:00:00 +0000", Some(f64::NAN), None),
        ];
        assert!(summarize_by_day(&records, Aggregate::Sum).is_empty());
    }

    #[test]
    fn test_available_record_types_sorted_unique() {
        let mut a = record("2020-01-01 10:00:00 +0000", Some(1.0), None);
        a.record_type = "B".to_string();
        let mut b = a.clone();
        b.record_type = "A".to_string();
        let c = a.clone();

        assert_eq!(
            available_record_types(&[a, b, c]),
            vec!["A".to_string(), "B".to_string()]
        );
    }
}
