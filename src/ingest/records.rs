//! Streaming reader for `Record` elements.

use std::collections::HashMap;
use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::identity;
use crate::model::{HealthRecord, RecordMetadata};
use crate::temporal::parse_export_datetime;

use super::{attribute_map, required_attr};

const RECORD_TAG: &[u8] = b"Record";
const METADATA_TAG: &[u8] = b"MetadataEntry";

/// Pull-based stream of `(HealthRecord, metadata)` pairs.
///
/// Elements missing a required attribute, or carrying a timestamp that does
/// not match the export format, are skipped silently: not counted, not
/// logged as errors. The event buffer is cleared after every element, so
/// peak memory does not grow with document size.
pub struct RecordStream<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> RecordStream<R> {
    pub fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            done: false,
        }
    }

    /// Consume events until the enclosing `Record` element closes, collecting
    /// `MetadataEntry` children. Unknown nested elements are tolerated via
    /// depth tracking.
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
                    tracing::warn!("record stream ended on malformed XML: {err}");
                    self.done = true;
                    return entries;
                }
            }
        }
    }
}

#[cfg(test)]
impl<R: BufRead> RecordStream<R> {
    /// Capacity of the event buffer. Cleared per event but never shrunk, so
    /// after a full pass it records the largest single event seen.
    fn buffer_capacity(&self) -> usize {
        self.buf.capacity()
    }
}

fn push_entry(entries: &mut Vec<(String, String)>, attrs: &HashMap<String, String>) {
    if let (Some(key), Some(value)) = (attrs.get("key"), attrs.get("value")) {
        entries.push((key.clone(), value.clone()));
    }
}

/// Build a record from an element's attributes, or `None` to skip it.
fn build_record(attrs: &HashMap<String, String>) -> Option<HealthRecord> {
    let record_type = required_attr(attrs, "type")?;
    let start_at = parse_export_datetime(required_attr(attrs, "startDate")?).ok()?;
    let end_at = parse_export_datetime(required_attr(attrs, "endDate")?).ok()?;
    let creation_at = match required_attr(attrs, "creationDate") {
        Some(raw) => Some(parse_export_datetime(raw).ok()?),
        None => None,
    };

    // Numeric first, raw string only when parsing fails. Never both.
    let (value, value_str) = match attrs.get("value") {
        None => (None, None),
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(v) => (Some(v), None),
            Err(_) => (None, Some(raw.clone())),
        },
    };

    Some(HealthRecord {
        record_type: record_type.clone(),
        start_at,
        end_at,
        creation_at,
        source_name: attrs.get("sourceName").cloned(),
        unit: attrs.get("unit").cloned(),
        value,
        value_str,
    })
}

impl<R: BufRead> Iterator for RecordStream<R> {
    type Item = (HealthRecord, Vec<RecordMetadata>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Empty(ref e)) if e.name().as_ref() == RECORD_TAG => {
                    if let Some(record) = build_record(&attribute_map(e)) {
                        return Some((record, Vec::new()));
                    }
                }
                Ok(Event::Start(ref e)) if e.name().as_ref() == RECORD_TAG => {
                    let attrs = attribute_map(e);
                    let raw_metadata = self.collect_metadata();

                    let Some(record) = build_record(&attrs) else {
                        continue;
                    };
                    let hash = identity::record_hash(&record);
                    let metadata = raw_metadata
                        .into_iter()
                        .map(|(key, value)| RecordMetadata {
                            record_hash: hash.clone(),
                            key,
                            value,
                        })
                        .collect();
                    return Some((record, metadata));
                }
                Ok(Event::Eof) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!("record stream ended on malformed XML: {err}");
                    self.done = true;
                    return None;
                }
            }
        }
    }
}
