//! Persistent storage for imported health data.

pub mod database;
pub mod health_store;
pub mod schema;

pub use database::{Database, DatabaseError};
pub use health_store::{HealthStore, RecordFilter, RecordOrder, RecordRow};
