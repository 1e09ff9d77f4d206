//! Migration directory scanning

use crate::error::{CoreError, CoreResult};
use crate::version::{MigrationFile, MigrationVersion, ScriptDirection};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// A migration script found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    /// Parsed filename
    pub file: MigrationFile,

    /// Full path to the script
    pub path: PathBuf,
}

/// List every forward-script version present in `dir`.
///
/// Backward scripts and unrelated files are ignored. A forward script with a
/// malformed version prefix fails the whole scan.
pub fn scan_versions(dir: &Path) -> CoreResult<BTreeSet<MigrationVersion>> {
    let versions = scan_scripts(dir)?
        .into_iter()
        .filter(|script| script.file.is_up())
        .map(|script| script.file.version)
        .collect();
    Ok(versions)
}

/// List every migration script in `dir`, sorted by version then direction.
///
/// Only forward scripts are held to the strict filename grammar; a malformed
/// backward script is skipped with a warning since it cannot affect which
/// versions are considered present.
pub fn scan_scripts(dir: &Path) -> CoreResult<Vec<MigrationScript>> {
    let entries = std::fs::read_dir(dir).map_err(|e| CoreError::ScanFailed {
        path: dir.display().to_string(),
        source: e,
    })?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut scripts = Vec::new();

    for entry in entries {
        let entry = entry.map_err(|e| CoreError::ScanFailed {
            path: dir.display().to_string(),
            source: e,
        })?;
        let filename = entry.file_name().to_string_lossy().into_owned();
        if !seen.insert(filename.clone()) {
            continue;
        }

        let file = match MigrationFile::parse(&filename) {
            Ok(Some(file)) => file,
            Ok(None) => continue,
            Err(e) if filename.ends_with(ScriptDirection::Down.suffix()) => {
                log::warn!("Skipping backward script: {e}");
                continue;
            }
            Err(e) => return Err(e),
        };

        scripts.push(MigrationScript {
            file,
            path: entry.path(),
        });
    }

    scripts.sort_by(|a, b| {
        a.file
            .version
            .cmp(&b.file.version)
            .then_with(|| b.file.is_up().cmp(&a.file.is_up()))
            .then_with(|| a.path.cmp(&b.path))
    });
    log::debug!("Found {} migration scripts in {}", scripts.len(), dir.display());
    Ok(scripts)
}

#[cfg(test)]
#[path = "scanner_test.rs"]
mod tests;
