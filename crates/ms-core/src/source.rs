//! Migration source resolution.
//!
//! Profiles store the migration location as a source URL of the form
//! `file:///abs/path/?x-migrations-path=sub`. Only the local-file form is
//! supported; the `x-migrations-path` query parameter relocates the directory
//! under a subfolder of the base path.

use crate::error::{CoreError, CoreResult};
use std::path::{Component, Path, PathBuf};

const FILE_SCHEME: &str = "file://";
const MIGRATIONS_PATH_PARAM: &str = "x-migrations-path";

/// A resolved migration source directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSource {
    dir: PathBuf,
}

impl MigrationSource {
    /// Resolve a profile's migrations path string to a directory.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidMigrationsPath {
                path: raw.to_string(),
                reason: "path is empty".to_string(),
            });
        }

        let without_scheme = trimmed.strip_prefix(FILE_SCHEME).unwrap_or(trimmed);
        let (base, query) = match without_scheme.split_once('?') {
            Some((base, query)) => (base, Some(query)),
            None => (without_scheme, None),
        };

        if base.is_empty() {
            return Err(CoreError::InvalidMigrationsPath {
                path: raw.to_string(),
                reason: "no directory before the query string".to_string(),
            });
        }

        let mut dir = PathBuf::from(base);
        if let Some(sub) = query.and_then(migrations_path_param) {
            dir.push(subfolder(raw, sub)?);
        }

        Ok(Self { dir })
    }

    /// Directory containing the migration scripts.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// The override is always relative to the base directory, never above it.
fn subfolder<'a>(raw: &str, sub: &'a str) -> CoreResult<&'a Path> {
    let relative = Path::new(sub.trim_start_matches('/'));
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(CoreError::InvalidMigrationsPath {
            path: raw.to_string(),
            reason: format!("{MIGRATIONS_PATH_PARAM} '{sub}' must stay inside the base directory"),
        });
    }
    Ok(relative)
}

/// Extract the `x-migrations-path` value from a query string.
fn migrations_path_param(query: &str) -> Option<&str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == MIGRATIONS_PATH_PARAM)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
#[path = "source_test.rs"]
mod tests;
