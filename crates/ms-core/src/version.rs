//! Migration versions and the migration filename grammar.
//!
//! A migration script is named `<version><rest><suffix>` where `<version>` is
//! exactly [`VERSION_WIDTH`] ASCII digits (a `YYYYMMDDhhmmss` timestamp),
//! `<rest>` is an optional `_description`, and `<suffix>` is `.up.sql` for the
//! forward script or `.down.sql` for the backward script.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of leading digits that encode the version.
pub const VERSION_WIDTH: usize = 14;

/// Monotonically increasing migration identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationVersion(u64);

impl MigrationVersion {
    /// Wrap a raw version number.
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    /// Return the raw version number.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MigrationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which way a script moves the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptDirection {
    /// Forward ("up") script
    Up,
    /// Backward ("down") script
    Down,
}

impl ScriptDirection {
    /// Literal filename suffix for scripts of this direction.
    pub const fn suffix(self) -> &'static str {
        match self {
            ScriptDirection::Up => ".up.sql",
            ScriptDirection::Down => ".down.sql",
        }
    }
}

impl fmt::Display for ScriptDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptDirection::Up => write!(f, "up"),
            ScriptDirection::Down => write!(f, "down"),
        }
    }
}

/// A parsed migration script filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// Version encoded in the filename prefix
    pub version: MigrationVersion,

    /// Human-readable description between the version and the suffix
    pub name: String,

    /// Script direction
    pub direction: ScriptDirection,
}

impl MigrationFile {
    /// Parse a bare filename (no directory components).
    ///
    /// Returns `Ok(None)` for files that are not migration scripts at all.
    /// A file carrying a script suffix whose prefix is not [`VERSION_WIDTH`]
    /// digits is rejected with [`CoreError::MalformedFilename`].
    pub fn parse(filename: &str) -> CoreResult<Option<Self>> {
        let (stem, direction) = if let Some(stem) = filename.strip_suffix(ScriptDirection::Up.suffix())
        {
            (stem, ScriptDirection::Up)
        } else if let Some(stem) = filename.strip_suffix(ScriptDirection::Down.suffix()) {
            (stem, ScriptDirection::Down)
        } else {
            return Ok(None);
        };

        let prefix = stem
            .get(..VERSION_WIDTH)
            .ok_or_else(|| malformed(filename, "version prefix is shorter than 14 digits"))?;
        if !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed(filename, "version prefix is not a decimal integer"));
        }
        let version: u64 = prefix
            .parse()
            .map_err(|e| malformed(filename, &format!("{e}")))?;

        let name = stem[VERSION_WIDTH..].trim_start_matches('_').to_string();

        Ok(Some(Self {
            version: MigrationVersion(version),
            name,
            direction,
        }))
    }

    /// Whether this is a forward script.
    pub fn is_up(&self) -> bool {
        self.direction == ScriptDirection::Up
    }
}

fn malformed(filename: &str, reason: &str) -> CoreError {
    CoreError::MalformedFilename {
        filename: filename.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
#[path = "version_test.rs"]
mod tests;
