//! Shared test utilities for ms-db
//!
//! [`RecordingEngine`] is an in-memory [`MigrationEngine`] that logs every
//! call, so tests can assert on the exact sequence of marker writes and
//! steps a workflow performs.

use crate::error::{DbError, DbResult};
use crate::traits::{HeadVersion, MigrationEngine, UpOutcome};
use async_trait::async_trait;
use ms_core::{MigrationVersion, ScriptDirection};
use std::collections::{BTreeSet, HashSet};
use std::sync::Mutex;

/// A call made against a [`RecordingEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCall {
    ListApplied,
    Version,
    Force(u64),
    Steps(i64),
    Up,
}

#[derive(Debug, Default)]
struct EngineState {
    head: Option<HeadVersion>,
    applied: BTreeSet<MigrationVersion>,
    available: BTreeSet<MigrationVersion>,
    failing: HashSet<MigrationVersion>,
    panicking: HashSet<MigrationVersion>,
    fail_force_to: HashSet<MigrationVersion>,
    calls: Vec<EngineCall>,
}

/// In-memory engine that records calls
#[derive(Debug, Default)]
pub struct RecordingEngine {
    state: Mutex<EngineState>,
}

impl RecordingEngine {
    /// Engine whose source holds `available` and whose history holds `applied`.
    ///
    /// The head marker starts at the largest applied version.
    pub fn new(available: &[u64], applied: &[u64]) -> Self {
        let applied: BTreeSet<MigrationVersion> =
            applied.iter().copied().map(MigrationVersion::new).collect();
        let head = applied.iter().next_back().map(|version| HeadVersion {
            version: *version,
            dirty: false,
        });
        Self {
            state: Mutex::new(EngineState {
                head,
                applied,
                available: available.iter().copied().map(MigrationVersion::new).collect(),
                ..Default::default()
            }),
        }
    }

    /// Make the forward script for `version` fail.
    pub fn fail_script(self, version: u64) -> Self {
        self.with_state(|s| {
            s.failing.insert(MigrationVersion::new(version));
        });
        self
    }

    /// Make the forward script for `version` panic.
    pub fn panic_script(self, version: u64) -> Self {
        self.with_state(|s| {
            s.panicking.insert(MigrationVersion::new(version));
        });
        self
    }

    /// Make `force(version)` fail.
    pub fn fail_force_to(self, version: u64) -> Self {
        self.with_state(|s| {
            s.fail_force_to.insert(MigrationVersion::new(version));
        });
        self
    }

    /// Overwrite the head marker.
    pub fn set_head(&self, version: u64, dirty: bool) {
        self.with_state(|s| {
            s.head = Some(HeadVersion {
                version: MigrationVersion::new(version),
                dirty,
            });
        });
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.with_state(|s| s.calls.clone())
    }

    /// Only the marker writes and script runs, without reads.
    pub fn mutations(&self) -> Vec<EngineCall> {
        self.calls()
            .into_iter()
            .filter(|c| {
                matches!(
                    c,
                    EngineCall::Force(_) | EngineCall::Steps(_) | EngineCall::Up
                )
            })
            .collect()
    }

    /// Applied versions as raw numbers.
    pub fn applied(&self) -> Vec<u64> {
        self.with_state(|s| s.applied.iter().map(|v| v.get()).collect())
    }

    /// Current head marker.
    pub fn head(&self) -> Option<HeadVersion> {
        self.with_state(|s| s.head)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut EngineState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }
}

impl EngineState {
    fn clean_head(&self) -> DbResult<Option<MigrationVersion>> {
        match self.head {
            Some(head) if head.dirty => Err(DbError::Dirty(head.version)),
            head => Ok(head.map(|h| h.version)),
        }
    }

    fn next_after(&self, current: Option<MigrationVersion>) -> Option<MigrationVersion> {
        self.available
            .iter()
            .copied()
            .find(|v| current.map_or(true, |current| *v > current))
    }

    /// Returns `true` when the script should panic instead of running.
    fn apply(&mut self, version: MigrationVersion) -> DbResult<bool> {
        if self.panicking.contains(&version) {
            return Ok(true);
        }
        if self.failing.contains(&version) {
            self.head = Some(HeadVersion {
                version,
                dirty: true,
            });
            return Err(DbError::ScriptFailed {
                version,
                direction: ScriptDirection::Up,
                message: "simulated failure".to_string(),
            });
        }
        self.applied.insert(version);
        self.head = Some(HeadVersion {
            version,
            dirty: false,
        });
        Ok(false)
    }
}

#[async_trait]
impl MigrationEngine for RecordingEngine {
    async fn list_applied_versions(&self) -> DbResult<Vec<MigrationVersion>> {
        self.with_state(|s| {
            s.calls.push(EngineCall::ListApplied);
            Ok(s.applied.iter().copied().collect())
        })
    }

    async fn version(&self) -> DbResult<Option<HeadVersion>> {
        self.with_state(|s| {
            s.calls.push(EngineCall::Version);
            Ok(s.head)
        })
    }

    async fn force(&self, version: MigrationVersion) -> DbResult<()> {
        self.with_state(|s| {
            s.calls.push(EngineCall::Force(version.get()));
            if s.fail_force_to.contains(&version) {
                return Err(DbError::QueryError("simulated force failure".to_string()));
            }
            s.head = Some(HeadVersion {
                version,
                dirty: false,
            });
            Ok(())
        })
    }

    async fn steps(&self, n: i64) -> DbResult<()> {
        let should_panic = self.with_state(|s| {
            s.calls.push(EngineCall::Steps(n));
            if n != 1 {
                return Err(DbError::Internal(format!(
                    "RecordingEngine only supports steps(1), got {n}"
                )));
            }
            let current = s.clean_head()?;
            let next = s.next_after(current).ok_or(DbError::StepsExhausted {
                requested: n,
                completed: 0,
            })?;
            s.apply(next)
        })?;
        if should_panic {
            panic!("simulated panic in migration script");
        }
        Ok(())
    }

    async fn up(&self) -> DbResult<UpOutcome> {
        // None means a script asked to panic
        let applied = self.with_state(|s| -> DbResult<Option<usize>> {
            s.calls.push(EngineCall::Up);
            let mut current = s.clean_head()?;
            let mut applied = 0;
            while let Some(next) = s.next_after(current) {
                if s.apply(next)? {
                    return Ok(None);
                }
                current = Some(next);
                applied += 1;
            }
            Ok(Some(applied))
        })?;
        match applied {
            None => panic!("simulated panic in migration script"),
            Some(0) => Ok(UpOutcome::NoChange),
            Some(n) => Ok(UpOutcome::Applied(n)),
        }
    }

    fn engine_type(&self) -> &'static str {
        "recording"
    }
}
