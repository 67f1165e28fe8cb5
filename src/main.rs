//! Vitals command-line interface.
//!
//! Thin consumer of the core's import and query contracts: import an export
//! document, inspect the store, and print rollups.

use std::io::Write as _;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vitals::config::{self, AppConfig};
use vitals::ingest::{import_export, ExportSource, ImportOptions};
use vitals::services::{
    sleep_duration_by_day, summarize_by_day, summarize_workouts_by_week, Aggregate,
    SLEEP_RECORD_TYPE,
};
use vitals::storage::{Database, HealthStore, RecordFilter, RecordOrder};

#[derive(Parser)]
#[command(name = "vitals", version, about = "Import and query personal health-data exports")]
struct Cli {
    /// Path to the SQLite database (defaults to the configured location)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import an export document (export.xml or export.zip) into the store
    Import {
        /// Path to the export file
        path: PathBuf,
        /// Suppress progress output
        #[arg(long)]
        quiet: bool,
    },
    /// Show row counts per table
    Status,
    /// List distinct record types in the store
    Types,
    /// Browse records page by page
    Records {
        /// Only records of this type
        #[arg(long)]
        record_type: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        /// Oldest first instead of newest first
        #[arg(long)]
        asc: bool,
        /// Emit JSON instead of plain text
        #[arg(long)]
        json: bool,
    },
    /// Daily rollup for one record type
    Rollup {
        record_type: String,
        #[arg(long, value_enum, default_value_t = AggArg::Sum)]
        agg: AggArg,
    },
    /// Weekly workout counts and hours
    Workouts,
    /// Hours of sleep per day
    Sleep,
    /// Delete the local database and temporary files
    Reset,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AggArg {
    Sum,
    Mean,
    Last,
}

impl From<AggArg> for Aggregate {
    fn from(arg: AggArg) -> Self {
        match arg {
            AggArg::Sum => Aggregate::Sum,
            AggArg::Mean => Aggregate::Mean,
            AggArg::Last => Aggregate::Last,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut app_config = config::load_config().context("failed to load configuration")?;
    if let Some(db) = cli.db {
        app_config.db_path = db;
    }

    match cli.command {
        Command::Import { path, quiet } => run_import(&app_config, &path, quiet),
        Command::Status => run_status(&app_config),
        Command::Types => run_types(&app_config),
        Command::Records {
            record_type,
            limit,
            offset,
            asc,
            json,
        } => run_records(&app_config, record_type, limit, offset, asc, json),
        Command::Rollup { record_type, agg } => run_rollup(&app_config, &record_type, agg.into()),
        Command::Workouts => run_workouts(&app_config),
        Command::Sleep => run_sleep(&app_config),
        Command::Reset => run_reset(&app_config),
    }
}

fn run_import(app_config: &AppConfig, path: &PathBuf, quiet: bool) -> anyhow::Result<()> {
    let source = ExportSource::open(path, &app_config.tmp_dir)
        .with_context(|| format!("failed to open export {}", path.display()))?;
    let db = Database::open(&app_config.db_path)
        .with_context(|| format!("failed to open store {}", app_config.db_path.display()))?;

    let options: ImportOptions = app_config.import_options();

    let mut render_progress = |stage: vitals::ingest::ImportStage, processed: u64| {
        eprint!("\r{stage}: {processed} processed");
        let _ = std::io::stderr().flush();
    };

    let summary = if quiet {
        import_export(&db, &source, &options, None)
    } else {
        import_export(&db, &source, &options, Some(&mut render_progress))
    };
    if !quiet {
        eprintln!();
    }

    println!(
        "records:    {} processed, {} inserted ({} metadata)",
        summary.records_processed, summary.records_inserted, summary.record_metadata_inserted
    );
    println!(
        "workouts:   {} processed, {} inserted ({} metadata)",
        summary.workouts_processed, summary.workouts_inserted, summary.workout_metadata_inserted
    );
    println!(
        "summaries:  {} processed, {} inserted",
        summary.summaries_processed, summary.summaries_inserted
    );

    if !summary.is_complete() {
        for failure in &summary.failures {
            eprintln!("stage '{}' failed: {}", failure.stage, failure.error);
        }
        bail!("import finished with failed stages");
    }
    Ok(())
}

fn run_status(app_config: &AppConfig) -> anyhow::Result<()> {
    let db = Database::open(&app_config.db_path)?;
    let store = HealthStore::new(db.connection());

    println!("store: {}", app_config.db_path.display());
    println!("records:           {}", store.count_records(&RecordFilter::default())?);
    println!("record metadata:   {}", store.count_record_metadata()?);
    println!("workouts:          {}", store.count_workouts()?);
    println!("workout metadata:  {}", store.count_workout_metadata()?);
    println!("activity summaries:{}", store.count_activity_summaries()?);
    Ok(())
}

fn run_types(app_config: &AppConfig) -> anyhow::Result<()> {
    let db = Database::open(&app_config.db_path)?;
    let store = HealthStore::new(db.connection());

    for record_type in store.list_record_types()? {
        println!("{record_type}");
    }
    Ok(())
}

fn run_records(
    app_config: &AppConfig,
    record_type: Option<String>,
    limit: u32,
    offset: u32,
    asc: bool,
    json: bool,
) -> anyhow::Result<()> {
    let db = Database::open(&app_config.db_path)?;
    let store = HealthStore::new(db.connection());

    let filter = RecordFilter {
        record_type,
        ..RecordFilter::default()
    };
    let order = if asc {
        RecordOrder::StartAtAsc
    } else {
        RecordOrder::StartAtDesc
    };

    let page = store.query_records_page(&filter, order, limit, offset)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    for row in &page {
        let rendered_value = match (&row.record.value, &row.record.value_str) {
            (Some(v), _) => v.to_string(),
            (None, Some(s)) => s.clone(),
            (None, None) => "-".to_string(),
        };
        println!(
            "{}  {}  {} {}",
            row.record.start_at.to_rfc3339(),
            row.record.record_type,
            rendered_value,
            row.record.unit.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn run_rollup(app_config: &AppConfig, record_type: &str, agg: Aggregate) -> anyhow::Result<()> {
    let db = Database::open(&app_config.db_path)?;
    let store = HealthStore::new(db.connection());

    let filter = RecordFilter {
        record_type: Some(record_type.to_string()),
        ..RecordFilter::default()
    };
    let records = store.load_records(&filter)?;

    for day in summarize_by_day(&records, agg) {
        println!("{}  {:.2}  ({} samples)", day.day, day.value, day.count);
    }
    Ok(())
}

fn run_workouts(app_config: &AppConfig) -> anyhow::Result<()> {
    let db = Database::open(&app_config.db_path)?;
    let store = HealthStore::new(db.connection());

    let workouts = store.load_workouts()?;
    for week in summarize_workouts_by_week(&workouts) {
        println!(
            "week of {}  {} sessions  {:.1} h",
            week.week_start, week.count, week.duration_hours
        );
    }
    Ok(())
}

fn run_sleep(app_config: &AppConfig) -> anyhow::Result<()> {
    let db = Database::open(&app_config.db_path)?;
    let store = HealthStore::new(db.connection());

    let filter = RecordFilter {
        record_type: Some(SLEEP_RECORD_TYPE.to_string()),
        ..RecordFilter::default()
    };
    let records = store.load_records(&filter)?;

    for day in sleep_duration_by_day(&records) {
        println!("{}  {:.1} h", day.day, day.hours);
    }
    Ok(())
}

fn run_reset(app_config: &AppConfig) -> anyhow::Result<()> {
    config::delete_local_data(app_config).context("failed to delete local data")?;
    println!("deleted {}", app_config.db_path.display());
    Ok(())
}
