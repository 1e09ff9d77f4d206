//! Connection profiles and the on-disk profile store.
//!
//! Profiles live in `<config dir>/migshell/profiles.json` as a pretty-printed
//! JSON array. The store is read and appended to by a single process; there
//! is no locking against concurrent writers.

use crate::error::{CoreError, CoreResult};
use crate::profile_name::ProfileName;
use crate::source::MigrationSource;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory name under the user's configuration directory
pub const APP_DIR: &str = "migshell";

/// Profile store filename
pub const PROFILES_FILE: &str = "profiles.json";

/// A named database connection and the migrations that belong to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Display name, unique within the store
    pub name: ProfileName,

    /// Connection string handed to the migration engine
    pub connection_string: String,

    /// Migration source path (`file://...?x-migrations-path=...`)
    pub migrations_path: String,
}

impl Profile {
    /// Build a profile from operator input, rejecting blank fields.
    pub fn new(name: &str, connection_string: &str, migrations_path: &str) -> CoreResult<Self> {
        let name = ProfileName::try_new(name).ok_or(CoreError::EmptyField {
            field: ProfileField::Name.label(),
        })?;
        Ok(Self {
            name,
            connection_string: ProfileField::ConnectionString.validate(connection_string)?,
            migrations_path: ProfileField::MigrationsPath.validate(migrations_path)?,
        })
    }

    /// Resolve the profile's migration source directory.
    pub fn source(&self) -> CoreResult<MigrationSource> {
        MigrationSource::parse(&self.migrations_path)
    }
}

/// Fields the operator fills in when creating a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Name,
    ConnectionString,
    MigrationsPath,
}

impl ProfileField {
    /// All fields, in prompt order.
    pub const ALL: [ProfileField; 3] = [
        ProfileField::Name,
        ProfileField::ConnectionString,
        ProfileField::MigrationsPath,
    ];

    /// Prompt label.
    pub const fn label(self) -> &'static str {
        match self {
            ProfileField::Name => "Profile Name",
            ProfileField::ConnectionString => "Connection String",
            ProfileField::MigrationsPath => "Filepath",
        }
    }

    /// Explanation printed before the prompt.
    pub const fn help(self) -> &'static str {
        match self {
            ProfileField::Name => {
                "The name of the profile is displayed in the picker when you run the program. It should be unique.\nExample: Local DuckDB"
            }
            ProfileField::ConnectionString => {
                "Enter the database connection string that will be sent to the migration engine.\nExample: duckdb:///home/me/project/dev.duckdb"
            }
            ProfileField::MigrationsPath => {
                "Enter the filepath where the migrations are stored.\nExample: file:///home/me/project/db/?x-migrations-path=migrations"
            }
        }
    }

    /// Trim `input`, failing with [`CoreError::EmptyField`] when nothing is left.
    pub fn validate(self, input: &str) -> CoreResult<String> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            Err(CoreError::EmptyField {
                field: self.label(),
            })
        } else {
            Ok(trimmed.to_string())
        }
    }
}

/// JSON-backed list of profiles
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    /// The per-user store directory (`<config dir>/migshell`).
    pub fn default_dir() -> CoreResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(CoreError::ConfigDirUnavailable)
    }

    /// Open the store in `dir` without touching the filesystem.
    pub fn open(dir: &Path) -> Self {
        Self {
            path: dir.join(PROFILES_FILE),
        }
    }

    /// Create the store directory and an empty profile list if missing.
    ///
    /// Run once at startup, before any profile is read.
    pub fn init(dir: &Path) -> CoreResult<Self> {
        std::fs::create_dir_all(dir).map_err(|e| CoreError::ConfigWrite {
            path: dir.display().to_string(),
            source: e,
        })?;

        let store = Self::open(dir);
        if !store.path.exists() {
            log::info!("Creating empty profile store at {}", store.path.display());
            store.save(&[])?;
        }
        Ok(store)
    }

    /// Path of the backing JSON file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all profiles, in file order.
    ///
    /// A missing file is an empty store.
    pub fn load(&self) -> CoreResult<Vec<Profile>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| CoreError::ConfigRead {
            path: self.path.display().to_string(),
            source: e,
        })?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| CoreError::ConfigParse {
            path: self.path.display().to_string(),
            source: e,
        })
    }

    /// Whether a profile with this name is already stored.
    pub fn contains(&self, name: &str) -> CoreResult<bool> {
        Ok(self.load()?.iter().any(|p| p.name == name))
    }

    /// Append `profile` and persist the store.
    ///
    /// Returns the full profile list after the append.
    pub fn append(&self, profile: Profile) -> CoreResult<Vec<Profile>> {
        let mut profiles = self.load()?;
        if profiles.iter().any(|p| p.name == profile.name) {
            return Err(CoreError::DuplicateProfile {
                name: profile.name.into_inner(),
            });
        }
        profiles.push(profile);
        self.save(&profiles)?;
        Ok(profiles)
    }

    /// Write the profile list atomically.
    ///
    /// Uses write-to-temp-then-rename so an interrupted write never leaves a
    /// truncated store behind.
    fn save(&self, profiles: &[Profile]) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::ConfigWrite {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let temp_path = self
            .path
            .with_extension(format!("json.{}.tmp", std::process::id()));
        let json = serde_json::to_string_pretty(profiles)?;
        std::fs::write(&temp_path, &json).map_err(|e| CoreError::ConfigWrite {
            path: temp_path.display().to_string(),
            source: e,
        })?;
        std::fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            CoreError::ConfigWrite {
                path: self.path.display().to_string(),
                source: e,
            }
        })?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
