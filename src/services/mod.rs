//! Consumer-facing aggregation services.
//!
//! These operate on in-memory collections loaded through the store's
//! tabular query contract; the rendering layer on top is out of scope.

pub mod rollup;
pub mod sleep;
pub mod workouts;

pub use rollup::{available_record_types, summarize_by_day, Aggregate, DailyValue};
pub use sleep::{sleep_duration_by_day, sleep_value_counts, SleepDay, SLEEP_RECORD_TYPE};
pub use workouts::{summarize_workouts_by_week, WeeklySummary};
