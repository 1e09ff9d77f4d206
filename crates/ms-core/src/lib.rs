//! ms-core - Core library for migshell
//!
//! This crate provides the connection profile model and store, migration
//! source resolution, the migration filename grammar, and the gap detection
//! used by the repair workflow.

pub mod error;
pub mod gaps;
pub mod profile;
pub mod profile_name;
pub mod scanner;
pub mod source;
pub mod version;

pub use error::{CoreError, CoreResult};
pub use gaps::{closest_previous_applied, detect_gaps};
pub use profile::{Profile, ProfileField, ProfileStore};
pub use profile_name::ProfileName;
pub use scanner::{scan_scripts, scan_versions, MigrationScript};
pub use source::MigrationSource;
pub use version::{MigrationFile, MigrationVersion, ScriptDirection};
