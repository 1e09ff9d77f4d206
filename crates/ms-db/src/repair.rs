//! Retroactive repair of gap versions.
//!
//! A gap version is applied by temporarily rewinding the head marker to the
//! closest applied version below it, stepping forward once, then forcing the
//! marker back to the head captured at the start. The history row for the
//! gap stays behind while the head is left where it was.

use crate::error::{DbError, DbResult};
use crate::traits::MigrationEngine;
use futures::FutureExt;
use ms_core::{closest_previous_applied, MigrationVersion};
use std::any::Any;
use std::panic::AssertUnwindSafe;

/// Result of repairing a single gap version
#[derive(Debug)]
pub enum RepairOutcome {
    /// The forward script ran and the version is now recorded as applied
    Applied,
    /// The forward script failed; the head marker was still restored
    Failed(DbError),
}

impl RepairOutcome {
    /// Whether the forward script succeeded.
    pub fn is_applied(&self) -> bool {
        matches!(self, RepairOutcome::Applied)
    }
}

/// Applies gap versions out of order against an engine
pub struct Repairer<'a> {
    engine: &'a dyn MigrationEngine,
}

impl<'a> Repairer<'a> {
    /// Create a repairer driving `engine`
    pub fn new(engine: &'a dyn MigrationEngine) -> Self {
        Self { engine }
    }

    /// Apply `version` in place, leaving the head marker unchanged.
    ///
    /// A failing or panicking forward script is reported as
    /// [`RepairOutcome::Failed`]. An `Err` means a bookkeeping call failed and
    /// the engine state can no longer be trusted.
    pub async fn repair(&self, version: MigrationVersion) -> DbResult<RepairOutcome> {
        let head = self.engine.version().await?.ok_or(DbError::NoVersion)?;
        if head.dirty {
            return Err(DbError::Dirty(head.version));
        }

        let applied = self.engine.list_applied_versions().await?;
        let prev = closest_previous_applied(&applied, version).ok_or_else(|| {
            DbError::Internal(format!(
                "cannot repair {version}: no versions are recorded as applied"
            ))
        })?;
        log::debug!("Repairing {version}: rewinding marker from {head} to {prev}");

        self.engine.force(prev).await?;

        let step = AssertUnwindSafe(self.engine.steps(1)).catch_unwind().await;

        // Restore before inspecting the step so the temporary marker never survives
        let restored = self.engine.force(head.version).await;

        let outcome = match step {
            Ok(Ok(())) => RepairOutcome::Applied,
            Ok(Err(e)) => RepairOutcome::Failed(e),
            Err(panic) => RepairOutcome::Failed(DbError::Internal(format!(
                "migration {version} panicked: {}",
                panic_message(&panic)
            ))),
        };

        if let Err(e) = restored {
            log::error!("Failed to restore migration marker to {head} after repairing {version}");
            return Err(e);
        }
        Ok(outcome)
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    panic
        .downcast_ref::<String>()
        .map(|s| s.as_str())
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("Unknown panic")
        .to_string()
}

#[cfg(test)]
#[path = "repair_test.rs"]
mod tests;
