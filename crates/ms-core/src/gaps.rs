//! Gap detection between on-disk migrations and the applied history.
//!
//! A gap is a version whose forward script exists on disk, is not recorded
//! as applied, and sits strictly between the oldest and newest applied
//! versions. Versions above the newest applied one are ordinary pending
//! migrations and are left for the forward run.

use crate::version::MigrationVersion;
use std::collections::{BTreeSet, HashSet};

/// Compute the missing versions, in ascending order.
///
/// Returns an empty list when nothing has been applied yet, since there is
/// no recorded span to compare against.
pub fn detect_gaps(
    applied: &[MigrationVersion],
    available: &BTreeSet<MigrationVersion>,
) -> Vec<MigrationVersion> {
    let (Some(&lo), Some(&hi)) = (applied.iter().min(), applied.iter().max()) else {
        return Vec::new();
    };
    if hi <= lo {
        return Vec::new();
    }

    let applied: HashSet<MigrationVersion> = applied.iter().copied().collect();
    available
        .range(lo..hi)
        .copied()
        .filter(|v| *v > lo && !applied.contains(v))
        .collect()
}

/// Largest applied version strictly below `missing`.
///
/// Falls back to the smallest applied version when none is smaller. Returns
/// `None` only when `applied` is empty.
pub fn closest_previous_applied(
    applied: &[MigrationVersion],
    missing: MigrationVersion,
) -> Option<MigrationVersion> {
    applied
        .iter()
        .copied()
        .filter(|v| *v < missing)
        .max()
        .or_else(|| applied.iter().copied().min())
}

#[cfg(test)]
#[path = "gaps_test.rs"]
mod tests;
