//! DuckDB migration engine implementation
//!
//! State lives in two tables inside the target database:
//!
//! - `schema_migrations` holds at most one row, the head marker
//!   (`version`, `dirty`).
//! - `schema_migrations_history` holds one row per applied version.
//!
//! Forcing only rewrites the marker. Stepping forward runs the next script
//! after the marker, records it in the history and moves the marker; a
//! failed script leaves the marker dirty at the failing version.

use crate::error::{DbError, DbResult};
use crate::traits::{HeadVersion, MigrationEngine, UpOutcome};
use async_trait::async_trait;
use duckdb::Connection;
use ms_core::{scan_scripts, MigrationSource, MigrationVersion, ScriptDirection};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const MEMORY: &str = ":memory:";
const SCHEME: &str = "duckdb://";

const BOOTSTRAP_SQL: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
         version BIGINT NOT NULL,
         dirty   BOOLEAN NOT NULL
     );
     CREATE TABLE IF NOT EXISTS schema_migrations_history (
         version    BIGINT PRIMARY KEY,
         applied_at TIMESTAMP NOT NULL DEFAULT now()
     );";

/// Where a connection string points
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConnectionTarget {
    Memory,
    File(PathBuf),
}

/// Parse `duckdb://<path>`, `:memory:` or a bare path.
///
/// Query parameters after `?` are accepted and ignored.
pub(crate) fn parse_connection_string(raw: &str) -> DbResult<ConnectionTarget> {
    let trimmed = raw.trim();
    let rest = match trimmed.strip_prefix(SCHEME) {
        Some(rest) => rest,
        None => match trimmed.split_once("://") {
            Some((scheme, _)) => return Err(DbError::UnsupportedScheme(scheme.to_string())),
            None => trimmed,
        },
    };
    let path = rest.split_once('?').map(|(path, _)| path).unwrap_or(rest);

    match path {
        "" => Err(DbError::ConnectionError(format!(
            "no database path in connection string '{raw}'"
        ))),
        MEMORY => Ok(ConnectionTarget::Memory),
        _ => Ok(ConnectionTarget::File(PathBuf::from(path))),
    }
}

/// Forward and backward scripts for one version
#[derive(Debug, Default)]
struct ScriptPair {
    up: Vec<PathBuf>,
    down: Vec<PathBuf>,
}

/// Snapshot of the migration source, keyed by version
#[derive(Debug)]
struct ScriptIndex {
    entries: BTreeMap<MigrationVersion, ScriptPair>,
}

impl ScriptIndex {
    fn load(dir: &Path) -> DbResult<Self> {
        let mut entries: BTreeMap<MigrationVersion, ScriptPair> = BTreeMap::new();
        for script in scan_scripts(dir)? {
            let pair = entries.entry(script.file.version).or_default();
            match script.file.direction {
                ScriptDirection::Up => pair.up.push(script.path),
                ScriptDirection::Down => pair.down.push(script.path),
            }
        }
        Ok(Self { entries })
    }

    fn script(&self, version: MigrationVersion, direction: ScriptDirection) -> DbResult<&Path> {
        let paths = self
            .entries
            .get(&version)
            .map(|pair| match direction {
                ScriptDirection::Up => &pair.up,
                ScriptDirection::Down => &pair.down,
            })
            .ok_or(DbError::MissingScript { version, direction })?;
        match paths.as_slice() {
            [] => Err(DbError::MissingScript { version, direction }),
            [path] => Ok(path),
            _ => Err(DbError::DuplicateScript { version, direction }),
        }
    }

    /// First version with a forward script above `current`.
    fn next_after(&self, current: Option<MigrationVersion>) -> Option<MigrationVersion> {
        self.forward_versions()
            .find(|v| current.map_or(true, |current| *v > current))
    }

    /// Last version with a forward script below `version`.
    fn prev_before(&self, version: MigrationVersion) -> Option<MigrationVersion> {
        self.forward_versions().filter(|v| *v < version).last()
    }

    fn forward_versions(&self) -> impl Iterator<Item = MigrationVersion> + '_ {
        self.entries
            .iter()
            .filter(|(_, pair)| !pair.up.is_empty())
            .map(|(version, _)| *version)
    }
}

/// DuckDB migration engine
pub struct DuckDbEngine {
    conn: Mutex<Connection>,
    source: MigrationSource,
}

impl DuckDbEngine {
    /// Open the database named by `connection_string` and prepare the bookkeeping tables
    pub fn open(connection_string: &str, source: MigrationSource) -> DbResult<Self> {
        let conn = match parse_connection_string(connection_string)? {
            ConnectionTarget::Memory => Connection::open_in_memory(),
            ConnectionTarget::File(path) => Connection::open(&path),
        }
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Self::with_connection(conn, source)
    }

    /// Create an engine over a fresh in-memory database
    pub fn in_memory(source: MigrationSource) -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Self::with_connection(conn, source)
    }

    fn with_connection(conn: Connection, source: MigrationSource) -> DbResult<Self> {
        conn.execute_batch(BOOTSTRAP_SQL)
            .map_err(|e| DbError::ConnectionError(format!("failed to create migration tables: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
            source,
        })
    }

    /// Run a read-only query against the target database (used by tests and diagnostics)
    pub fn query_count(&self, sql: &str) -> DbResult<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM ({})", sql), [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }

    /// Lock the connection, recovering it if an earlier operation panicked.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(conn) => conn,
            Err(poisoned) => {
                log::warn!("Recovering DuckDB connection after a panic in an earlier operation");
                let conn = poisoned.into_inner();
                // A panic between BEGIN and COMMIT leaves the transaction open
                let _ = conn.execute_batch("ROLLBACK");
                self.conn.clear_poison();
                conn
            }
        }
    }

    fn index(&self) -> DbResult<ScriptIndex> {
        ScriptIndex::load(self.source.dir())
    }

    fn applied_sync(&self) -> DbResult<Vec<MigrationVersion>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT version FROM schema_migrations_history ORDER BY version")?;
        let versions = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(versions.into_iter().map(from_db).collect())
    }

    fn steps_sync(&self, n: i64) -> DbResult<()> {
        let conn = self.lock();
        let index = self.index()?;
        let mut current = clean_head(&conn)?;

        let mut completed = 0;
        if n > 0 {
            while completed < n {
                let Some(next) = index.next_after(current) else {
                    break;
                };
                apply_up(&conn, &index, next)?;
                current = Some(next);
                completed += 1;
            }
        } else {
            while completed < -n {
                let Some(version) = current else {
                    break;
                };
                current = apply_down(&conn, &index, version)?;
                completed += 1;
            }
        }

        if completed < n.abs() {
            return Err(DbError::StepsExhausted {
                requested: n,
                completed,
            });
        }
        Ok(())
    }

    fn up_sync(&self) -> DbResult<UpOutcome> {
        let conn = self.lock();
        let index = self.index()?;
        let mut current = clean_head(&conn)?;

        let mut applied = 0;
        while let Some(next) = index.next_after(current) {
            apply_up(&conn, &index, next)?;
            current = Some(next);
            applied += 1;
        }

        if applied == 0 {
            Ok(UpOutcome::NoChange)
        } else {
            Ok(UpOutcome::Applied(applied))
        }
    }
}

#[async_trait]
impl MigrationEngine for DuckDbEngine {
    async fn list_applied_versions(&self) -> DbResult<Vec<MigrationVersion>> {
        self.applied_sync()
    }

    async fn version(&self) -> DbResult<Option<HeadVersion>> {
        let conn = self.lock();
        read_head(&conn)
    }

    async fn force(&self, version: MigrationVersion) -> DbResult<()> {
        log::debug!("Forcing migration marker to {version}");
        let conn = self.lock();
        transaction(&conn, |conn| write_marker(conn, version, false))
    }

    async fn steps(&self, n: i64) -> DbResult<()> {
        log::debug!("Stepping {n} migration(s)");
        self.steps_sync(n)
    }

    async fn up(&self) -> DbResult<UpOutcome> {
        self.up_sync()
    }

    fn engine_type(&self) -> &'static str {
        "duckdb"
    }
}

fn to_db(version: MigrationVersion) -> i64 {
    version.get() as i64
}

fn from_db(version: i64) -> MigrationVersion {
    MigrationVersion::new(version as u64)
}

fn read_head(conn: &Connection) -> DbResult<Option<HeadVersion>> {
    let mut stmt = conn.prepare("SELECT version, dirty FROM schema_migrations LIMIT 1")?;
    let heads = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, bool>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(heads.into_iter().next().map(|(version, dirty)| HeadVersion {
        version: from_db(version),
        dirty,
    }))
}

/// Current marker version, refusing to continue from a dirty marker.
fn clean_head(conn: &Connection) -> DbResult<Option<MigrationVersion>> {
    match read_head(conn)? {
        Some(head) if head.dirty => Err(DbError::Dirty(head.version)),
        head => Ok(head.map(|h| h.version)),
    }
}

fn write_marker(conn: &Connection, version: MigrationVersion, dirty: bool) -> DbResult<()> {
    conn.execute("DELETE FROM schema_migrations", [])?;
    conn.execute(
        "INSERT INTO schema_migrations (version, dirty) VALUES (?, ?)",
        duckdb::params![to_db(version), dirty],
    )?;
    Ok(())
}

fn clear_marker(conn: &Connection) -> DbResult<()> {
    conn.execute("DELETE FROM schema_migrations", [])?;
    Ok(())
}

/// Execute `body` within a `BEGIN` / `COMMIT` transaction, rolling back on error.
fn transaction<F, T>(conn: &Connection, body: F) -> DbResult<T>
where
    F: FnOnce(&Connection) -> DbResult<T>,
{
    conn.execute_batch("BEGIN TRANSACTION")
        .map_err(|e| DbError::QueryError(format!("BEGIN failed: {e}")))?;

    let result = body(conn);

    match &result {
        Ok(_) => {
            if let Err(commit_err) = conn.execute_batch("COMMIT") {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(DbError::QueryError(format!("COMMIT failed: {commit_err}")));
            }
        }
        Err(_) => {
            let _ = conn.execute_batch("ROLLBACK");
        }
    }
    result
}

fn read_script(path: &Path) -> DbResult<String> {
    std::fs::read_to_string(path).map_err(|e| DbError::ScriptUnreadable {
        path: path.display().to_string(),
        source: e,
    })
}

/// Run `version`'s forward script, record it, and move the marker to it.
fn apply_up(conn: &Connection, index: &ScriptIndex, version: MigrationVersion) -> DbResult<()> {
    let sql = read_script(index.script(version, ScriptDirection::Up)?)?;
    log::debug!("Applying migration {version} (up)");

    let result = transaction(conn, |conn| {
        conn.execute_batch(&sql)
            .map_err(|e| DbError::ScriptFailed {
                version,
                direction: ScriptDirection::Up,
                message: e.to_string(),
            })?;
        conn.execute(
            "INSERT INTO schema_migrations_history (version) VALUES (?) ON CONFLICT DO NOTHING",
            duckdb::params![to_db(version)],
        )?;
        write_marker(conn, version, false)
    });

    if result.is_err() {
        mark_dirty(conn, version);
    }
    result
}

/// Run `version`'s backward script, drop it from history, and move the marker
/// to the previous version. Returns the new marker.
fn apply_down(
    conn: &Connection,
    index: &ScriptIndex,
    version: MigrationVersion,
) -> DbResult<Option<MigrationVersion>> {
    let sql = read_script(index.script(version, ScriptDirection::Down)?)?;
    let prev = index.prev_before(version);
    log::debug!("Reverting migration {version} (down)");

    let result = transaction(conn, |conn| {
        conn.execute_batch(&sql)
            .map_err(|e| DbError::ScriptFailed {
                version,
                direction: ScriptDirection::Down,
                message: e.to_string(),
            })?;
        conn.execute(
            "DELETE FROM schema_migrations_history WHERE version = ?",
            duckdb::params![to_db(version)],
        )?;
        match prev {
            Some(prev) => write_marker(conn, prev, false),
            None => clear_marker(conn),
        }
    });

    if result.is_err() {
        mark_dirty(conn, version);
    }
    result.map(|_| prev)
}

fn mark_dirty(conn: &Connection, version: MigrationVersion) {
    if let Err(e) = write_marker(conn, version, true) {
        log::warn!("Failed to mark migration {version} dirty: {e}");
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
