//! Streaming reader for `ActivitySummary` elements.

use std::collections::HashMap;
use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::model::ActivitySummary;
use crate::temporal::parse_export_date;

use super::{attribute_map, required_attr};

const SUMMARY_TAG: &[u8] = b"ActivitySummary";

/// Pull-based stream of daily activity summaries.
///
/// Elements without a parseable `dateComponents` day are skipped silently.
pub struct SummaryStream<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> SummaryStream<R> {
    pub fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            done: false,
        }
    }
}

/// Parse an optional integer field. Values arrive as numeric strings that may
/// carry a fractional part; the fraction truncates toward zero, it is not
/// rounded. Non-finite values are rejected.
fn optional_int(attrs: &HashMap<String, String>, key: &str) -> Option<i64> {
    let parsed = attrs.get(key)?.trim().parse::<f64>().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    Some(parsed as i64)
}

fn build_summary(attrs: &HashMap<String, String>) -> Option<ActivitySummary> {
    let day = parse_export_date(required_attr(attrs, "dateComponents")?).ok()?;

    Some(ActivitySummary {
        day,
        active_energy_kcal: optional_int(attrs, "activeEnergyBurned"),
        active_energy_goal_kcal: optional_int(attrs, "activeEnergyBurnedGoal"),
        exercise_time_min: optional_int(attrs, "appleExerciseTime"),
        exercise_time_goal_min: optional_int(attrs, "appleExerciseTimeGoal"),
        stand_hours: optional_int(attrs, "appleStandHours"),
        stand_hours_goal: optional_int(attrs, "appleStandHoursGoal"),
    })
}

impl<R: BufRead> Iterator for SummaryStream<R> {
    type Item = ActivitySummary;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if e.name().as_ref() == SUMMARY_TAG =>
                {
                    if let Some(summary) = build_summary(&attribute_map(e)) {
                        return Some(summary);
                    }
                }
                Ok(Event::Eof) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!("summary stream ended on malformed XML: {err}");
                    self.done = true;
                    return None;
                }
            }
        }
    }
}
