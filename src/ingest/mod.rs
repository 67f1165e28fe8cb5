//! Streaming ingestion of health-data export documents.
//!
//! The export is a single XML document (or a zip archive containing one)
//! whose root holds repeated `Record`, `Workout` and `ActivitySummary`
//! elements. Each extractor reads the document as a depth-first event stream
//! and yields one normalized entity per completed element, keeping peak
//! memory proportional to a single element's subtree.

pub mod importer;
pub mod records;
pub mod summaries;
pub mod workouts;

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use quick_xml::events::BytesStart;
use thiserror::Error;

use crate::storage::DatabaseError;

pub use importer::{import_export, ImportOptions, ImportStage, ImportSummary, StageFailure};
pub use records::RecordStream;
pub use summaries::SummaryStream;
pub use workouts::WorkoutStream;

/// Errors surfaced by the ingestion pipeline.
///
/// Per-element malformation never appears here: extractors absorb it by
/// skipping the element. Only file-level and store-level failures propagate.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("no export.xml found in archive {0}")]
    NoExportFound(PathBuf),

    #[error("failed to read export file: {0}")]
    Io(#[from] io::Error),

    #[error("failed to read archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("store failure: {0}")]
    Store(#[from] DatabaseError),
}

/// A resolved export document on disk.
///
/// Accepts either a bare XML file or a zip archive containing one. Each
/// extraction pass opens the file fresh, so the three passes of a full import
/// are independent reads of the same document.
#[derive(Debug)]
pub struct ExportSource {
    xml_path: PathBuf,
}

impl ExportSource {
    /// Resolve an input path to a readable export document.
    ///
    /// Zip archives are searched for member paths ending in `export.xml`;
    /// the shortest match wins and is extracted into `tmp_dir`.
    pub fn open(path: &Path, tmp_dir: &Path) -> Result<Self, ImportError> {
        let is_zip = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);

        let xml_path = if is_zip {
            extract_export_xml(path, tmp_dir)?
        } else {
            path.to_path_buf()
        };

        Ok(Self { xml_path })
    }

    /// Path of the resolved XML document.
    pub fn xml_path(&self) -> &Path {
        &self.xml_path
    }

    /// Open a fresh stream of `(HealthRecord, metadata)` pairs.
    pub fn records(&self) -> Result<RecordStream<BufReader<File>>, ImportError> {
        Ok(RecordStream::new(self.open_reader()?))
    }

    /// Open a fresh stream of `(Workout, metadata)` pairs.
    pub fn workouts(&self) -> Result<WorkoutStream<BufReader<File>>, ImportError> {
        Ok(WorkoutStream::new(self.open_reader()?))
    }

    /// Open a fresh stream of activity summaries.
    pub fn activity_summaries(&self) -> Result<SummaryStream<BufReader<File>>, ImportError> {
        Ok(SummaryStream::new(self.open_reader()?))
    }

    fn open_reader(&self) -> Result<BufReader<File>, ImportError> {
        Ok(BufReader::new(File::open(&self.xml_path)?))
    }
}

fn extract_export_xml(zip_path: &Path, tmp_dir: &Path) -> Result<PathBuf, ImportError> {
    let file = File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    // Shortest matching path wins when the archive holds more than one
    // candidate (e.g. `export.xml` next to `workout-routes/export.xml`).
    let member = archive
        .file_names()
        .filter(|name| name.ends_with("export.xml"))
        .min_by_key(|name| name.len())
        .map(str::to_owned)
        .ok_or_else(|| ImportError::NoExportFound(zip_path.to_path_buf()))?;

    std::fs::create_dir_all(tmp_dir)?;
    let out_path = tmp_dir.join("export.xml");

    let mut entry = archive.by_name(&member)?;
    let mut out = File::create(&out_path)?;
    io::copy(&mut entry, &mut out)?;

    tracing::debug!(archive = %zip_path.display(), member, "extracted export document");
    Ok(out_path)
}

/// Collect an element's attributes into an owned map.
pub(crate) fn attribute_map(element: &BytesStart<'_>) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    for attr in element.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if let Ok(value) = attr.unescape_value() {
            attrs.insert(key, value.into_owned());
        }
    }
    attrs
}

/// Look up a required attribute; empty strings count as missing.
pub(crate) fn required_attr<'a>(
    attrs: &'a HashMap<String, String>,
    key: &str,
) -> Option<&'a String> {
    attrs.get(key).filter(|v| !v.is_empty())
}

/// Parse an optional numeric attribute; unparseable values become `None`.
pub(crate) fn optional_float(attrs: &HashMap<String, String>, key: &str) -> Option<f64> {
    attrs.get(key).and_then(|v| v.trim().parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_zip(path: &Path, members: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, content) in members {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_open_bare_xml_is_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let xml = dir.path().join("export.xml");
        std::fs::write(&xml, "<HealthData/>").unwrap();

        let source = ExportSource::open(&xml, dir.path()).unwrap();
        assert_eq!(source.xml_path(), xml.as_path());
    }

    #[test]
    fn test_open_zip_shortest_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("export.zip");
        write_zip(
            &archive,
            &[
                ("apple_health_export/deep/nested/export.xml", "<Deep/>"),
                ("apple_health_export/export.xml", "<HealthData/>"),
            ],
        );

        let tmp = dir.path().join("tmp");
        let source = ExportSource::open(&archive, &tmp).unwrap();
        let content = std::fs::read_to_string(source.xml_path()).unwrap();
        assert_eq!(content, "<HealthData/>");
    }

    #[test]
    fn test_open_zip_without_export_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("export.zip");
        write_zip(&archive, &[("readme.txt", "nothing here")]);

        let err = ExportSource::open(&archive, dir.path()).unwrap_err();
        assert!(matches!(err, ImportError::NoExportFound(_)));
    }
}
