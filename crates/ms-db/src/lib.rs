//! ms-db - Migration engine layer for migshell
//!
//! This crate provides the `MigrationEngine` trait, a DuckDB implementation
//! that tracks a head-version marker plus an applied-version history, and
//! the retroactive repairer that applies gap versions without moving the
//! recorded head.

pub mod duckdb;
pub mod error;
pub mod repair;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

pub use duckdb::DuckDbEngine;
pub use error::{DbError, DbResult};
pub use repair::{RepairOutcome, Repairer};
pub use traits::{HeadVersion, MigrationEngine, UpOutcome};
