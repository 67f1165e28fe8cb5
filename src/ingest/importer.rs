//! Import orchestrator: drives the extraction passes and batches entities
//! into the store.
//!
//! The three passes (records, activity summaries, workouts) read the source
//! document independently and run in sequence. A failed pass is recorded in
//! the summary and the remaining passes still run. Batches are flushed
//! atomically; an interrupted import keeps already-flushed batches and
//! re-running is safe because duplicates collapse on their content hashes.

use std::fmt;

use crate::ingest::{ExportSource, ImportError};
use crate::model::{ActivitySummary, HealthRecord, RecordMetadata, Workout, WorkoutMetadata};
use crate::storage::{Database, HealthStore};

/// Stages that report progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStage {
    Records,
    Workouts,
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportStage::Records => write!(f, "records"),
            ImportStage::Workouts => write!(f, "workouts"),
        }
    }
}

/// Progress callback, invoked as `(stage, processed_count)` at a fixed
/// cadence plus once when the stage completes.
pub type ProgressFn<'a> = dyn FnMut(ImportStage, u64) + 'a;

/// Tunable batch sizes and progress cadence.
///
/// Workouts are far less numerous than records, hence the smaller defaults.
/// A cadence of zero disables periodic progress; the completion callback
/// still fires.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub record_batch_size: usize,
    pub workout_batch_size: usize,
    pub summary_batch_size: usize,
    pub record_progress_every: u64,
    pub workout_progress_every: u64,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            record_batch_size: 2000,
            workout_batch_size: 300,
            summary_batch_size: 365,
            record_progress_every: 500,
            workout_progress_every: 50,
        }
    }
}

/// A pass that failed after the passes before it already ran.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: &'static str,
    pub error: ImportError,
}

/// Per-kind counters for one import run. "Processed" counts elements seen;
/// "inserted" counts rows that were new after deduplication.
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub records_processed: u64,
    pub records_inserted: u64,
    pub record_metadata_inserted: u64,
    pub workouts_processed: u64,
    pub workouts_inserted: u64,
    pub workout_metadata_inserted: u64,
    pub summaries_processed: u64,
    pub summaries_inserted: u64,
    pub failures: Vec<StageFailure>,
}

impl ImportSummary {
    /// True when every pass ran to completion.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run a full import: records (+metadata), activity summaries, workouts
/// (+metadata), in that order.
pub fn import_export(
    db: &Database,
    source: &ExportSource,
    options: &ImportOptions,
    mut on_progress: Option<&mut ProgressFn<'_>>,
) -> ImportSummary {
    let store = HealthStore::new(db.connection());
    let mut summary = ImportSummary::default();

    if let Err(error) = import_records(&store, source, options, &mut summary, on_progress.as_deref_mut())
    {
        tracing::error!("record pass failed: {error}");
        summary.failures.push(StageFailure {
            stage: "records",
            error,
        });
    }

    if let Err(error) = import_summaries(&store, source, options, &mut summary) {
        tracing::error!("activity summary pass failed: {error}");
        summary.failures.push(StageFailure {
            stage: "activity_summaries",
            error,
        });
    }

    if let Err(error) = import_workouts(&store, source, options, &mut summary, on_progress) {
        tracing::error!("workout pass failed: {error}");
        summary.failures.push(StageFailure {
            stage: "workouts",
            error,
        });
    }

    tracing::info!(
        records = summary.records_inserted,
        workouts = summary.workouts_inserted,
        summaries = summary.summaries_inserted,
        "import finished"
    );
    summary
}

fn import_records(
    store: &HealthStore<'_>,
    source: &ExportSource,
    options: &ImportOptions,
    summary: &mut ImportSummary,
    mut on_progress: Option<&mut ProgressFn<'_>>,
) -> Result<(), ImportError> {
    let mut batch: Vec<HealthRecord> = Vec::new();
    let mut metadata: Vec<RecordMetadata> = Vec::new();

    for (record, meta) in source.records()? {
        batch.push(record);
        metadata.extend(meta);
        summary.records_processed += 1;

        if options.record_progress_every > 0
            && summary.records_processed % options.record_progress_every == 0
        {
            if let Some(cb) = on_progress.as_deref_mut() {
                cb(ImportStage::Records, summary.records_processed);
            }
        }

        if batch.len() >= options.record_batch_size {
            summary.records_inserted += store.upsert_records(&batch)? as u64;
            summary.record_metadata_inserted += store.upsert_record_metadata(&metadata)? as u64;
            batch.clear();
            metadata.clear();
        }
    }

    if !batch.is_empty() || !metadata.is_empty() {
        summary.records_inserted += store.upsert_records(&batch)? as u64;
        summary.record_metadata_inserted += store.upsert_record_metadata(&metadata)? as u64;
    }

    if let Some(cb) = on_progress {
        cb(ImportStage::Records, summary.records_processed);
    }
    Ok(())
}

fn import_summaries(
    store: &HealthStore<'_>,
    source: &ExportSource,
    options: &ImportOptions,
    summary: &mut ImportSummary,
) -> Result<(), ImportError> {
    let mut batch: Vec<ActivitySummary> = Vec::new();

    for row in source.activity_summaries()? {
        batch.push(row);
        summary.summaries_processed += 1;

        if batch.len() >= options.summary_batch_size {
            summary.summaries_inserted += store.upsert_activity_summaries(&batch)? as u64;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        summary.summaries_inserted += store.upsert_activity_summaries(&batch)? as u64;
    }
    Ok(())
}

fn import_workouts(
    store: &HealthStore<'_>,
    source: &ExportSource,
    options: &ImportOptions,
    summary: &mut ImportSummary,
    mut on_progress: Option<&mut ProgressFn<'_>>,
) -> Result<(), ImportError> {
    let mut batch: Vec<Workout> = Vec::new();
    let mut metadata: Vec<WorkoutMetadata> = Vec::new();

    for (workout, meta) in source.workouts()? {
        batch.push(workout);
        metadata.extend(meta);
        summary.workouts_processed += 1;

        if options.workout_progress_every > 0
            && summary.workouts_processed % options.workout_progress_every == 0
        {
            if let Some(cb) = on_progress.as_deref_mut() {
                cb(ImportStage::Workouts, summary.workouts_processed);
            }
        }

        if batch.len() >= options.workout_batch_size {
            let (inserted, meta_inserted) = store.upsert_workouts(&batch, &metadata)?;
            summary.workouts_inserted += inserted as u64;
            summary.workout_metadata_inserted += meta_inserted as u64;
            batch.clear();
            metadata.clear();
        }
    }

    if !batch.is_empty() || !metadata.is_empty() {
        let (inserted, meta_inserted) = store.upsert_workouts(&batch, &metadata)?;
        summary.workouts_inserted += inserted as u64;
        summary.workout_metadata_inserted += meta_inserted as u64;
    }

    if let Some(cb) = on_progress {
        cb(ImportStage::Workouts, summary.workouts_processed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ImportOptions::default();
        assert_eq!(options.record_batch_size, 2000);
        assert_eq!(options.workout_batch_size, 300);
        assert_eq!(options.record_progress_every, 500);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(ImportStage::Records.to_string(), "records");
        assert_eq!(ImportStage::Workouts.to_string(), "workouts");
    }

    #[test]
    fn test_zero_progress_cadence_only_reports_completion() {
        let dir = tempfile::tempdir().unwrap();
        let xml = dir.path().join("export.xml");
        std::fs::write(
            &xml,
            r#"<HealthData>
  <Record type="HKQuantityTypeIdentifierStepCount" value="1"
          startDate="2020-01-01 10:00:00 +0100" endDate="2020-01-01 10:05:00 +0100"/>
  <Record type="HKQuantityTypeIdentifierStepCount" value="2"
          startDate="2020-01-02 10:00:00 +0100" endDate="2020-01-02 10:05:00 +0100"/>
  <Workout workoutActivityType="HKWorkoutActivityTypeRunning"
           startDate="2020-01-01 07:00:00 +0100" endDate="2020-01-01 07:30:00 +0100"/>
</HealthData>"#,
        )
        .unwrap();

        let source = ExportSource::open(&xml, dir.path()).unwrap();
        let db = crate::storage::Database::open_in_memory().unwrap();
        let options = ImportOptions {
            record_progress_every: 0,
            workout_progress_every: 0,
            ..ImportOptions::default()
        };

        let mut events: Vec<(ImportStage, u64)> = Vec::new();
        let mut on_progress = |stage: ImportStage, processed: u64| {
            events.push((stage, processed));
        };
        let summary = import_export(&db, &source, &options, Some(&mut on_progress));

        assert!(summary.is_complete());
        assert_eq!(summary.records_inserted, 2);
        assert_eq!(summary.workouts_inserted, 1);
        assert_eq!(
            events,
            vec![(ImportStage::Records, 2), (ImportStage::Workouts, 1)]
        );
    }
}
