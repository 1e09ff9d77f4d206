use super::*;
use crate::progress::ProgressTask;
use crate::test_utils::{RecordingReporter, ScriptedPrompter};
use ms_db::test_utils::{EngineCall, RecordingEngine};
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const BASE: u64 = 20240101000000;

fn v(n: u64) -> u64 {
    BASE + n
}

fn mv(n: u64) -> MigrationVersion {
    MigrationVersion::new(v(n))
}

fn write_up(dir: &Path, n: u64) {
    fs::write(
        dir.join(format!("{}_t{n}.up.sql", v(n))),
        format!("CREATE TABLE t{n} (id INTEGER);"),
    )
    .unwrap();
}

struct Fixture {
    temp: TempDir,
    reporter: RecordingReporter,
    cancel: CancellationToken,
}

impl Fixture {
    fn new(scripts: &[u64]) -> Self {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("migrations")).unwrap();
        for n in scripts {
            write_up(&temp.path().join("migrations"), *n);
        }
        Self {
            temp,
            reporter: RecordingReporter::default(),
            cancel: CancellationToken::new(),
        }
    }

    fn migrations(&self) -> String {
        self.temp.path().join("migrations").display().to_string()
    }

    fn db_url(&self) -> String {
        format!("duckdb://{}", self.temp.path().join("app.duckdb").display())
    }

    fn store(&self) -> ProfileStore {
        ProfileStore::init(&self.temp.path().join("config")).unwrap()
    }

    fn profile(&self) -> Profile {
        Profile::new("Local", &self.db_url(), &self.migrations()).unwrap()
    }

    fn workflow(&self, answers: &[&str]) -> Workflow<ScriptedPrompter> {
        Workflow::new(
            self.store(),
            Arc::new(self.reporter.clone()),
            self.cancel.clone(),
            ScriptedPrompter::new(answers),
        )
    }

    fn labels(&self) -> Vec<(String, Option<bool>)> {
        self.reporter.events()
    }
}

fn engine(available: &[u64], applied: &[u64]) -> RecordingEngine {
    let available: Vec<u64> = available.iter().map(|n| v(*n)).collect();
    let applied: Vec<u64> = applied.iter().map(|n| v(*n)).collect();
    RecordingEngine::new(&available, &applied)
}

async fn migrate_with(
    fixture: &Fixture,
    engine: &RecordingEngine,
    answers: &[&str],
) -> (Result<RunSummary>, ScriptedPrompter) {
    let mut workflow = fixture.workflow(answers);
    let profile = fixture.profile();
    let source = profile.source().unwrap();
    let result = workflow.migrate(&profile, &source, engine).await;
    (result, workflow.prompter)
}

#[tokio::test]
async fn test_repairs_gaps_in_ascending_order_then_applies_forward() {
    let fixture = Fixture::new(&[1, 3, 5, 7, 10]);
    let engine = engine(&[1, 3, 5, 7, 10], &[1, 5, 10]);

    let (result, prompter) = migrate_with(&fixture, &engine, &["1"]).await;
    let summary = result.unwrap();

    assert_eq!(summary.profile, "Local");
    assert_eq!(summary.gaps, vec![mv(3), mv(7)]);
    assert_eq!(summary.repaired, vec![mv(3), mv(7)]);
    assert!(summary.failed.is_empty());
    assert!(summary.skipped.is_empty());
    assert_eq!(summary.forward, UpOutcome::NoChange);

    assert_eq!(
        engine.mutations(),
        vec![
            EngineCall::Force(v(1)),
            EngineCall::Steps(1),
            EngineCall::Force(v(10)),
            EngineCall::Force(v(5)),
            EngineCall::Steps(1),
            EngineCall::Force(v(10)),
            EngineCall::Up,
        ]
    );
    assert_eq!(
        fixture.labels(),
        vec![
            ("checking for missing migrations...".to_string(), Some(true)),
            (format!("applying missing version {}...", v(3)), Some(true)),
            (format!("applying missing version {}...", v(7)), Some(true)),
            ("applying migrations...".to_string(), Some(true)),
        ]
    );
    assert!(prompter.said("Found 2 missing version(s)"));
    assert!(prompter.said("Automatically apply missing migrations now?"));
}

#[tokio::test]
async fn test_declined_repair_lists_missing_versions_after_forward() {
    let fixture = Fixture::new(&[1, 3, 5, 7, 10]);
    let engine = engine(&[1, 3, 5, 7, 10], &[1, 5, 10]);

    let (result, prompter) = migrate_with(&fixture, &engine, &["2"]).await;
    let summary = result.unwrap();

    assert_eq!(summary.skipped, vec![mv(3), mv(7)]);
    assert!(summary.repaired.is_empty());
    assert_eq!(engine.mutations(), vec![EngineCall::Up]);
    assert_eq!(engine.applied(), vec![v(1), v(5), v(10)]);

    let tail = &prompter.output[prompter.output.len() - 2..];
    assert_eq!(
        tail,
        [
            format!("Missing version: {}", v(3)),
            format!("Missing version: {}", v(7)),
        ]
    );
}

#[tokio::test]
async fn test_failed_repair_continues_with_next_gap() {
    let fixture = Fixture::new(&[1, 3, 5, 7, 10]);
    let engine = engine(&[1, 3, 5, 7, 10], &[1, 5, 10]).fail_script(v(3));

    let (result, prompter) = migrate_with(&fixture, &engine, &["1"]).await;
    let summary = result.unwrap();

    assert_eq!(summary.repaired, vec![mv(7)]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, mv(3));
    assert!(summary.failed[0].1.contains("simulated failure"));

    let head = engine.head().unwrap();
    assert_eq!(head.version, mv(10));
    assert!(!head.dirty);
    assert_eq!(
        fixture.labels()[1],
        (format!("applying missing version {}...", v(3)), Some(false))
    );
    assert!(prompter.said(&format!("Failed missing version: {}", v(3))));
}

#[tokio::test]
async fn test_fresh_database_skips_scan() {
    let fixture = Fixture::new(&[]);
    let engine = engine(&[1, 2], &[]);
    let mut workflow = fixture.workflow(&[]);
    let profile = Profile::new("Fresh", ":memory:", "/nonexistent/migrations").unwrap();
    let source = profile.source().unwrap();

    let summary = workflow.migrate(&profile, &source, &engine).await.unwrap();

    assert!(summary.gaps.is_empty());
    assert_eq!(summary.forward, UpOutcome::Applied(2));
    assert_eq!(
        fixture.labels(),
        vec![("applying migrations...".to_string(), Some(true))]
    );
    assert!(workflow.prompter.said("No missing versions found"));
}

#[tokio::test]
async fn test_scan_failure_aborts() {
    let fixture = Fixture::new(&[]);
    let engine = engine(&[1], &[1]);
    let mut workflow = fixture.workflow(&[]);
    let profile = Profile::new("Broken", ":memory:", "/nonexistent/migrations").unwrap();
    let source = profile.source().unwrap();

    let err = workflow
        .migrate(&profile, &source, &engine)
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("Failed to scan migrations"));
    assert!(engine.mutations().is_empty());
    assert_eq!(
        fixture.labels(),
        vec![("checking for missing migrations...".to_string(), Some(false))]
    );
}

#[tokio::test]
async fn test_forward_failure_aborts_run() {
    let fixture = Fixture::new(&[1, 10]);
    let engine = engine(&[1, 10], &[1, 10]);
    engine.set_head(v(10), true);

    let (result, _) = migrate_with(&fixture, &engine, &[]).await;
    let err = result.unwrap_err();

    assert!(format!("{err:#}").contains("Failed to apply migrations"));
    assert_eq!(
        fixture.labels().last(),
        Some(&("applying migrations...".to_string(), Some(false)))
    );
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let fixture = Fixture::new(&[1, 3, 5]);
    let engine = engine(&[1, 3, 5], &[1, 5]);
    fixture.cancel.cancel();

    let (result, _) = migrate_with(&fixture, &engine, &["1"]).await;
    let err = result.unwrap_err();

    assert!(err.is::<Interrupted>());
    assert!(engine.calls().is_empty());
    assert!(fixture.labels().is_empty());
}

/// Cancels the run as soon as the first missing version starts repairing.
struct CancelOnRepair {
    inner: RecordingReporter,
    cancel: CancellationToken,
}

impl ProgressReporter for CancelOnRepair {
    fn start(&self, label: &str) -> Box<dyn ProgressTask> {
        if label.starts_with("applying missing version") {
            self.cancel.cancel();
        }
        self.inner.start(label)
    }
}

#[tokio::test]
async fn test_cancel_during_repair_finishes_current_gap_only() {
    let fixture = Fixture::new(&[1, 3, 5, 7, 10]);
    let engine = engine(&[1, 3, 5, 7, 10], &[1, 5, 10]);
    let reporter = CancelOnRepair {
        inner: fixture.reporter.clone(),
        cancel: fixture.cancel.clone(),
    };
    let mut workflow = Workflow::new(
        fixture.store(),
        Arc::new(reporter),
        fixture.cancel.clone(),
        ScriptedPrompter::new(&["1"]),
    );
    let profile = fixture.profile();
    let source = profile.source().unwrap();

    let err = workflow
        .migrate(&profile, &source, &engine)
        .await
        .unwrap_err();

    assert!(err.is::<Interrupted>());
    assert_eq!(
        engine.mutations(),
        vec![
            EngineCall::Force(v(1)),
            EngineCall::Steps(1),
            EngineCall::Force(v(10)),
        ]
    );
    assert_eq!(engine.head().unwrap().version, mv(10));
    assert_eq!(engine.applied(), vec![v(1), v(3), v(5), v(10)]);
    assert_eq!(
        fixture.labels().last(),
        Some(&(format!("applying missing version {}...", v(3)), Some(true)))
    );
}

#[tokio::test]
async fn test_run_creates_profile_and_applies() {
    let fixture = Fixture::new(&[1, 2]);
    let db_url = fixture.db_url();
    let migrations = fixture.migrations();
    let answers = ["1", "", "Local", db_url.as_str(), "", migrations.as_str()];
    let workflow = fixture.workflow(&answers);

    let summary = workflow.run().await.unwrap().unwrap();

    assert_eq!(summary.profile, "Local");
    assert!(summary.gaps.is_empty());
    assert_eq!(summary.forward, UpOutcome::Applied(2));

    let profiles = fixture.store().load().unwrap();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].connection_string, db_url);
}

#[tokio::test]
async fn test_run_reprompts_for_required_and_duplicate_fields() {
    let fixture = Fixture::new(&[1]);
    fixture.store().append(fixture.profile()).unwrap();
    let db_url = fixture.db_url();
    let migrations = fixture.migrations();

    let answers = ["2", "Local", " ", "Other", db_url.as_str(), migrations.as_str()];
    let mut workflow = fixture.workflow(&answers);
    let profile = workflow.select_profile().await.unwrap().unwrap();

    assert_eq!(profile.name, "Other");
    assert!(workflow.prompter.said("A profile named 'Local' already exists"));
    assert!(workflow.prompter.said("Profile Name is required."));
    assert_eq!(workflow.prompter.remaining(), 0);
    assert_eq!(fixture.store().load().unwrap().len(), 2);
}

#[tokio::test]
async fn test_run_quit_and_closed_input() {
    let fixture = Fixture::new(&[]);
    fixture.store().append(fixture.profile()).unwrap();

    assert!(fixture.workflow(&["3"]).run().await.unwrap().is_none());
    assert!(fixture.workflow(&[]).run().await.unwrap().is_none());
    // Input closing half way through profile creation saves nothing
    assert!(fixture.workflow(&["2", "New"]).run().await.unwrap().is_none());
    assert_eq!(fixture.store().load().unwrap().len(), 1);
}

#[tokio::test]
async fn test_run_repairs_late_migrations_in_duckdb() {
    let fixture = Fixture::new(&[1, 5, 10]);
    let profile = fixture.profile();
    fixture.store().append(profile.clone()).unwrap();
    {
        let engine =
            DuckDbEngine::open(&profile.connection_string, profile.source().unwrap()).unwrap();
        engine.up().await.unwrap();
    }
    let dir = fixture.temp.path().join("migrations");
    write_up(&dir, 3);
    write_up(&dir, 7);

    let summary = fixture.workflow(&["1", "1"]).run().await.unwrap().unwrap();
    assert_eq!(summary.repaired, vec![mv(3), mv(7)]);
    assert_eq!(summary.forward, UpOutcome::NoChange);

    let engine =
        DuckDbEngine::open(&profile.connection_string, profile.source().unwrap()).unwrap();
    assert_eq!(
        engine.list_applied_versions().await.unwrap(),
        vec![mv(1), mv(3), mv(5), mv(7), mv(10)]
    );
    let head = engine.version().await.unwrap().unwrap();
    assert_eq!(head.version, mv(10));
    assert!(!head.dirty);
}
