//! Streaming reader for `Workout` elements.

use std::collections::HashMap;
use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::identity;
use crate::model::{Workout, WorkoutMetadata};
use crate::temporal::parse_export_datetime;

use super::{attribute_map, optional_float, required_attr};

const WORKOUT_TAG: &[u8] = b"Workout";
const METADATA_TAG: &[u8] = b"MetadataEntry";

/// Pull-based stream of `(Workout, metadata)` pairs.
///
/// Same skip semantics and memory bound as [`super::RecordStream`].
pub struct WorkoutStream<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> WorkoutStream<R> {
    pub fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            done: false,
        }
    }

    fn collect_metadata(&mut self) -> Vec<(String, String)> {
        let mut entries = Vec::new();
        let mut depth = 0usize;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match self.reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) if e.name().as_ref() == METADATA_TAG => {
                    push_entry(&mut entries, &attribute_map(e));
                }
                Ok(Event::Start(ref e)) => {
                    if e.name().as_ref() == METADATA_TAG {
                        push_entry(&mut entries, &attribute_map(e));
                    }
                    depth += 1;
                }
                Ok(Event::End(_)) if depth > 0 => depth -= 1,
                Ok(Event::End(_)) => return entries,
                Ok(Event::Eof) => {
                    self.done = true;
                    return entries;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!("workout stream ended on malformed XML: {err}");
                    self.done = true;
                    return entries;
                }
            }
        }
    }
}

fn push_entry(entries: &mut Vec<(String, String)>, attrs: &HashMap<String, String>) {
    if let (Some(key), Some(value)) = (attrs.get("key"), attrs.get("value")) {
        entries.push((key.clone(), value.clone()));
    }
}

fn build_workout(attrs: &HashMap<String, String>) -> Option<Workout> {
    let activity_type = required_attr(attrs, "workoutActivityType")?;
    let start_at = parse_export_datetime(required_attr(attrs, "startDate")?).ok()?;
    let end_at = parse_export_datetime(required_attr(attrs, "endDate")?).ok()?;
    let creation_at = match required_attr(attrs, "creationDate") {
        Some(raw) => Some(parse_export_datetime(raw).ok()?),
        None => None,
    };

    Some(Workout {
        activity_type: activity_type.clone(),
        start_at,
        end_at,
        creation_at,
        source_name: attrs.get("sourceName").cloned(),
        device: attrs.get("device").cloned(),
        duration_s: optional_float(attrs, "duration"),
        total_energy_kcal: optional_float(attrs, "totalEnergyBurned"),
        total_distance_m: optional_float(attrs, "totalDistance"),
    })
}

impl<R: BufRead> Iterator for WorkoutStream<R> {
    type Item = (Workout, Vec<WorkoutMetadata>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Empty(ref e)) if e.name().as_ref() == WORKOUT_TAG => {
                    if let Some(workout) = build_workout(&attribute_map(e)) {
                        return Some((workout, Vec::new()));
                    }
                }
                Ok(Event::Start(ref e)) if e.name().as_ref() == WORKOUT_TAG => {
                    let attrs = attribute_map(e);
                    let raw_metadata = self.collect_metadata();

                    let Some(workout) = build_workout(&attrs) else {
                        continue;
                    };
                    let hash = identity::workout_hash(&workout);
                    let metadata = raw_metadata
                        .into_iter()
                        .map(|(key, value)| WorkoutMetadata {
                            workout_hash: hash.clone(),
                            key,
                            value,
                        })
                        .collect();
                    return Some((workout, metadata));
                }
                Ok(Event::Eof) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!("workout stream ended on malformed XML: {err}");
                    self.done = true;
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(xml: &str) -> Vec<(Workout, Vec<WorkoutMetadata>)> {
        WorkoutStream::new(xml.as_bytes()).collect()
    }

    #[test]
    fn test_parses_workout_with_metadata() {
        let xml = r#"<HealthData>
  <Workout workoutActivityType="HKWorkoutActivityTypeRunning" sourceName="Watch"
           device="Apple Watch" duration="1800" totalEnergyBurned="250.5" totalDistance="5000"
           startDate="2020-01-01 07:00:00 +0100" endDate="2020-01-01 07:30:00 +0100"
           creationDate="2020-01-01 07:31:00 +0100">
    <MetadataEntry key="HKIndoorWorkout" value="0"/>
  </Workout>
</HealthData>"#;

        let items = stream(xml);
        assert_eq!(items.len(), 1);
        let (workout, meta) = &items[0];
        assert_eq!(workout.activity_type, "HKWorkoutActivityTypeRunning");
        assert_eq!(workout.duration_s, Some(1800.0));
        assert_eq!(workout.total_energy_kcal, Some(250.5));
        assert_eq!(workout.total_distance_m, Some(5000.0));
        assert_eq!(meta.len(), 1);
        assert_eq!(meta[0].workout_hash, identity::workout_hash(workout));
    }

    #[test]
    fn test_skips_workout_missing_activity_type() {
        let xml = r#"<HealthData>
  <Workout startDate="2020-01-01 07:00:00 +0100" endDate="2020-01-01 07:30:00 +0100"/>
</HealthData>"#;

        assert!(stream(xml).is_empty());
    }

    #[test]
    fn test_unparseable_numeric_fields_default_to_unset() {
        let xml = r#"<HealthData>
  <Workout workoutActivityType="HKWorkoutActivityTypeYoga" duration="n/a"
           startDate="2020-01-01 07:00:00 +0100" endDate="2020-01-01 07:30:00 +0100"/>
</HealthData>"#;

        let items = stream(xml);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].0.duration_s, None);
    }
}
