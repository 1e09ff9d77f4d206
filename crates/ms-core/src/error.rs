//! Error types for ms-core

use thiserror::Error;

/// Core error type for migshell
#[derive(Error, Debug)]
pub enum CoreError {
    /// C001: No per-user configuration directory could be determined
    #[error("[C001] Could not determine a configuration directory. Pass --config-dir to choose one")]
    ConfigDirUnavailable,

    /// C002: Profile store could not be read
    #[error("[C002] Failed to read profile store '{path}': {source}")]
    ConfigRead {
        path: String,
        source: std::io::Error,
    },

    /// C003: Profile store could not be written
    #[error("[C003] Failed to write profile store '{path}': {source}")]
    ConfigWrite {
        path: String,
        source: std::io::Error,
    },

    /// C004: Profile store contents are not a valid profile list
    #[error("[C004] Failed to parse profile store '{path}': {source}")]
    ConfigParse {
        path: String,
        source: serde_json::Error,
    },

    /// C005: A required profile field was left empty
    #[error("[C005] {field} is required.")]
    EmptyField { field: &'static str },

    /// C006: A profile with the same name already exists
    #[error("[C006] A profile named '{name}' already exists")]
    DuplicateProfile { name: String },

    /// C007: Migrations path string is unusable
    #[error("[C007] Invalid migrations path '{path}': {reason}")]
    InvalidMigrationsPath { path: String, reason: String },

    /// C008: Migration directory could not be listed
    #[error("[C008] Failed to scan migration directory '{path}': {source}")]
    ScanFailed {
        path: String,
        source: std::io::Error,
    },

    /// C009: A forward script filename does not start with a numeric version
    #[error("[C009] Malformed migration filename '{filename}': {reason}")]
    MalformedFilename { filename: String, reason: String },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Whether the operator can recover by answering a prompt again.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::EmptyField { .. } | CoreError::DuplicateProfile { .. }
        )
    }
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
