//! Migration engine trait definition

use crate::error::DbResult;
use async_trait::async_trait;
use ms_core::MigrationVersion;
use std::fmt;

/// The engine's current version marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadVersion {
    /// Version the engine considers current
    pub version: MigrationVersion,

    /// Whether the last migration at this version failed partway
    pub dirty: bool,
}

impl fmt::Display for HeadVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dirty {
            write!(f, "{} (dirty)", self.version)
        } else {
            write!(f, "{}", self.version)
        }
    }
}

/// Result of applying every pending forward migration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpOutcome {
    /// This many forward scripts ran
    Applied(usize),
    /// Nothing was pending
    NoChange,
}

/// Migration engine abstraction
///
/// Engines own a single head-version marker and a history of applied
/// versions. Implementations must be Send + Sync for async operation.
#[async_trait]
pub trait MigrationEngine: Send + Sync {
    /// Versions recorded as applied, ascending
    async fn list_applied_versions(&self) -> DbResult<Vec<MigrationVersion>>;

    /// Current head marker, or `None` on a fresh database
    async fn version(&self) -> DbResult<Option<HeadVersion>>;

    /// Rewrite the head marker to `version` (clean) without running any script
    async fn force(&self, version: MigrationVersion) -> DbResult<()>;

    /// Run `n` scripts from the marker: forward when positive, backward when negative
    async fn steps(&self, n: i64) -> DbResult<()>;

    /// Apply every forward script above the marker
    async fn up(&self) -> DbResult<UpOutcome>;

    /// Engine type identifier for logging
    fn engine_type(&self) -> &'static str;
}
