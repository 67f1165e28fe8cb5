//! Weekly workout rollups.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc, Weekday};
use serde::Serialize;

use crate::model::Workout;

/// One week's workout totals. Weeks start on Monday.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklySummary {
    pub week_start: NaiveDate,
    pub count: u64,
    pub duration_hours: f64,
}

/// Roll workouts up into per-week session counts and total hours.
/// Missing durations count as zero hours.
pub fn summarize_workouts_by_week(workouts: &[Workout]) -> Vec<WeeklySummary> {
    let mut weeks: BTreeMap<NaiveDate, (u64, f64)> = BTreeMap::new();

    for workout in workouts {
        let day = workout.start_at.with_timezone(&Utc).date_naive();
        let week_start = day.week(Weekday::Mon).first_day();
        let entry = weeks.entry(week_start).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += workout.duration_s.unwrap_or(0.0) / 3600.0;
    }

    weeks
        .into_iter()
        .map(|(week_start, (count, duration_hours))| WeeklySummary {
            week_start,
            count,
            duration_hours,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::parse_export_datetime;

    fn workout(start: &str, duration_s: Option<f64>) -> Workout {
        Workout {
            activity_type: "HKWorkoutActivityTypeRunning".to_string(),
            start_at: parse_export_datetime(start).unwrap(),
            end_at: parse_export_datetime(start).unwrap(),
            creation_at: None,
            source_name: None,
            device: None,
            duration_s,
            total_energy_kcal: None,
            total_distance_m: None,
        }
    }

    #[test]
    fn test_groups_by_monday_week() {
        // 2020-01-06 is a Monday; 2020-01-05 belongs to the prior week.
        let workouts = vec![
            workout("2020-01-05 08:00:00 +0000", Some(3600.0)),
            workout("2020-01-06 08:00:00 +0000", Some(1800.0)),
            workout("2020-01-08 08:00:00 +0000", None),
        ];

        let out = summarize_workouts_by_week(&workouts);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].week_start.to_string(), "2019-12-30");
        assert_eq!(out[0].count, 1);
        assert_eq!(out[1].week_start.to_string(), "2020-01-06");
        assert_eq!(out[1].count, 2);
        assert!((out[1].duration_hours - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input() {
        assert!(summarize_workouts_by_week(&[]).is_empty());
    }
}
