//! Interactive migration workflow
//!
//! Pick or create a profile, find gap versions, optionally repair them in
//! place, then apply every pending forward migration.

use crate::progress::ProgressReporter;
use crate::prompt::{choose, confirm, Prompter};
use crate::worker::Interrupted;
use anyhow::{Context, Result};
use ms_core::{
    detect_gaps, scan_versions, CoreError, CoreResult, MigrationSource, MigrationVersion, Profile,
    ProfileField, ProfileName, ProfileStore,
};
use ms_db::{DuckDbEngine, MigrationEngine, RepairOutcome, Repairer, UpOutcome};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const CREATE_PROFILE: &str = "[Create New Profile]";
const QUIT: &str = "[Quit]";

/// What a completed run did
#[derive(Debug)]
pub struct RunSummary {
    pub profile: ProfileName,
    /// Gap versions found, ascending
    pub gaps: Vec<MigrationVersion>,
    pub repaired: Vec<MigrationVersion>,
    /// Gap versions whose forward script failed, with the failure
    pub failed: Vec<(MigrationVersion, String)>,
    /// Gap versions the operator chose not to repair
    pub skipped: Vec<MigrationVersion>,
    pub forward: UpOutcome,
}

/// One operator session
pub struct Workflow<P> {
    store: ProfileStore,
    reporter: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
    prompter: P,
}

impl<P: Prompter> Workflow<P> {
    pub fn new(
        store: ProfileStore,
        reporter: Arc<dyn ProgressReporter>,
        cancel: CancellationToken,
        prompter: P,
    ) -> Self {
        Self {
            store,
            reporter,
            cancel,
            prompter,
        }
    }

    /// Run the whole session. `Ok(None)` means the operator quit.
    pub async fn run(mut self) -> Result<Option<RunSummary>> {
        self.checkpoint()?;
        let Some(profile) = self.select_profile().await? else {
            log::info!("No profile selected, exiting");
            return Ok(None);
        };

        self.checkpoint()?;
        let source = profile
            .source()
            .with_context(|| format!("Invalid migrations path for profile '{}'", profile.name))?;
        let engine = DuckDbEngine::open(&profile.connection_string, source.clone())
            .with_context(|| format!("Failed to open database for profile '{}'", profile.name))?;

        self.migrate(&profile, &source, &engine).await.map(Some)
    }

    /// Detect and repair gaps, then apply pending migrations with `engine`.
    pub async fn migrate(
        &mut self,
        profile: &Profile,
        source: &MigrationSource,
        engine: &dyn MigrationEngine,
    ) -> Result<RunSummary> {
        log::info!(
            "Migrating profile '{}' with {} engine",
            profile.name,
            engine.engine_type()
        );

        self.checkpoint()?;
        let gaps = self.find_gaps(source, engine).await?;

        let mut repaired = Vec::new();
        let mut failed = Vec::new();
        let mut skipped = Vec::new();

        if gaps.is_empty() {
            self.prompter.say("✓ No missing versions found");
        } else {
            self.prompter.say(&format!(
                "Found {} missing version(s). These exist on disk but were never applied, usually because they were created on another branch.",
                gaps.len()
            ));
            if confirm(
                &mut self.prompter,
                "Automatically apply missing migrations now?",
            )
            .await?
            {
                (repaired, failed) = self.repair_gaps(engine, &gaps).await?;
            } else {
                self.prompter.say(
                    "Skipping missing migrations. They will be listed after the forward migration.",
                );
                skipped = gaps.clone();
            }
        }

        self.checkpoint()?;
        let task = self.reporter.start("applying migrations...");
        let forward = match engine.up().await {
            Ok(outcome) => {
                task.finish(true);
                outcome
            }
            Err(e) => {
                task.finish(false);
                return Err(e).context("Failed to apply migrations");
            }
        };
        if forward == UpOutcome::NoChange {
            log::info!("No pending migrations");
        }

        for (version, error) in &failed {
            self.prompter
                .say(&format!("Failed missing version: {version} ({error})"));
        }
        for version in &skipped {
            self.prompter.say(&format!("Missing version: {version}"));
        }

        Ok(RunSummary {
            profile: profile.name.clone(),
            gaps,
            repaired,
            failed,
            skipped,
            forward,
        })
    }

    async fn find_gaps(
        &mut self,
        source: &MigrationSource,
        engine: &dyn MigrationEngine,
    ) -> Result<Vec<MigrationVersion>> {
        let applied = engine
            .list_applied_versions()
            .await
            .context("Failed to read applied versions")?;
        if applied.is_empty() {
            return Ok(Vec::new());
        }

        let task = self.reporter.start("checking for missing migrations...");
        match scan_versions(source.dir()) {
            Ok(available) => {
                task.finish(true);
                Ok(detect_gaps(&applied, &available))
            }
            Err(e) => {
                task.finish(false);
                Err(e).context("Failed to scan migrations")
            }
        }
    }

    async fn repair_gaps(
        &mut self,
        engine: &dyn MigrationEngine,
        gaps: &[MigrationVersion],
    ) -> Result<(Vec<MigrationVersion>, Vec<(MigrationVersion, String)>)> {
        let repairer = Repairer::new(engine);
        let mut repaired = Vec::new();
        let mut failed = Vec::new();

        for &version in gaps {
            self.checkpoint()?;
            let task = self
                .reporter
                .start(&format!("applying missing version {version}..."));
            match repairer.repair(version).await {
                Ok(RepairOutcome::Applied) => {
                    task.finish(true);
                    repaired.push(version);
                }
                Ok(RepairOutcome::Failed(e)) => {
                    task.finish(false);
                    log::warn!("Missing version {version} failed: {e}");
                    failed.push((version, e.to_string()));
                }
                Err(e) => {
                    task.finish(false);
                    return Err(e)
                        .with_context(|| format!("Failed to repair missing version {version}"));
                }
            }
        }

        Ok((repaired, failed))
    }

    async fn select_profile(&mut self) -> Result<Option<Profile>> {
        let profiles = self.store.load().context("Failed to load profiles")?;
        if profiles.is_empty() {
            self.prompter.say(
                "No profiles found. A profile stores a connection string and a migrations path; create one to continue.",
            );
        }

        let mut options: Vec<String> = profiles.iter().map(|p| p.name.to_string()).collect();
        options.push(CREATE_PROFILE.to_string());
        options.push(QUIT.to_string());

        let create = profiles.len();
        match choose(&mut self.prompter, "Select a database profile", &options).await? {
            Some(i) if i < create => Ok(profiles.into_iter().nth(i)),
            Some(i) if i == create => self.create_profile().await,
            _ => Ok(None),
        }
    }

    async fn create_profile(&mut self) -> Result<Option<Profile>> {
        let mut answers = Vec::with_capacity(ProfileField::ALL.len());
        for field in ProfileField::ALL {
            let Some(answer) = self.ask_field(field).await? else {
                return Ok(None);
            };
            answers.push(answer);
        }

        let profile = Profile::new(&answers[0], &answers[1], &answers[2])?;
        self.store
            .append(profile.clone())
            .context("Failed to save profile")?;
        self.prompter.say(&format!(
            "✓ Saved profile '{}' to {}",
            profile.name,
            self.store.path().display()
        ));
        Ok(Some(profile))
    }

    /// Prompt until `field` gets a usable answer. `None` on closed input.
    async fn ask_field(&mut self, field: ProfileField) -> Result<Option<String>> {
        self.prompter.say(field.help());
        loop {
            let Some(input) = self.prompter.read_line(field.label()).await? else {
                return Ok(None);
            };
            match self.answer(field, &input) {
                Ok(value) => return Ok(Some(value)),
                Err(e) if e.is_validation() => self.prompter.say(&e.to_string()),
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn answer(&self, field: ProfileField, input: &str) -> CoreResult<String> {
        let value = field.validate(input)?;
        if field == ProfileField::Name && self.store.contains(&value)? {
            return Err(CoreError::DuplicateProfile { name: value });
        }
        Ok(value)
    }

    fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Interrupted.into())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "workflow_test.rs"]
mod tests;
