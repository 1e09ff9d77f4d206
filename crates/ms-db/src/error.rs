//! Error types for ms-db

use ms_core::{CoreError, MigrationVersion, ScriptDirection};
use thiserror::Error;

/// Migration engine errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Database connection failed: {0}")]
    ConnectionError(String),

    /// Connection string names a driver this build does not ship (D002)
    #[error("[D002] Unsupported connection string scheme '{0}'. Use duckdb://<path> or :memory:")]
    UnsupportedScheme(String),

    /// Migration script failed to execute (D003)
    #[error("[D003] Migration {version} ({direction}) failed: {message}")]
    ScriptFailed {
        version: MigrationVersion,
        direction: ScriptDirection,
        message: String,
    },

    /// Migration script could not be read from disk (D004)
    #[error("[D004] Failed to read migration script '{path}': {source}")]
    ScriptUnreadable {
        path: String,
        source: std::io::Error,
    },

    /// No script exists for the requested version and direction (D005)
    #[error("[D005] No {direction} script found for migration {version}")]
    MissingScript {
        version: MigrationVersion,
        direction: ScriptDirection,
    },

    /// More than one script shares the requested version and direction (D006)
    #[error("[D006] Multiple {direction} scripts found for migration {version}")]
    DuplicateScript {
        version: MigrationVersion,
        direction: ScriptDirection,
    },

    /// The head marker is dirty and must be forced before stepping (D007)
    #[error("[D007] Database is dirty at version {0}. Fix the failed migration and force the version")]
    Dirty(MigrationVersion),

    /// No head marker is recorded (D008)
    #[error("[D008] No migration version is recorded in the database")]
    NoVersion,

    /// Fewer migrations were available than requested (D009)
    #[error("[D009] Requested {requested} step(s) but only {completed} could be taken")]
    StepsExhausted { requested: i64, completed: i64 },

    /// Bookkeeping query failed (D010)
    #[error("[D010] Migration bookkeeping failed: {0}")]
    QueryError(String),

    /// Migration source could not be read (D011)
    #[error("[D011] Migration source error: {0}")]
    Source(#[from] CoreError),

    /// Internal error (D012)
    #[error("[D012] Internal migration engine error: {0}")]
    Internal(String),
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        DbError::QueryError(err.to_string())
    }
}
