//! Vitals - local importer and query engine for personal health-data exports.
//!
//! Streams a multi-gigabyte XML export element-by-element, deduplicates on
//! content hashes across repeated imports, and serves filtered/aggregated
//! views from a local SQLite store.

pub mod config;
pub mod identity;
pub mod ingest;
pub mod model;
pub mod services;
pub mod storage;
pub mod temporal;
