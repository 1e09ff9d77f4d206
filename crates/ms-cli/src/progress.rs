//! Progress indication for long-running workflow steps

use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

/// Starts a progress indicator for a labelled step
pub trait ProgressReporter: Send + Sync {
    fn start(&self, label: &str) -> Box<dyn ProgressTask>;
}

/// A running indicator. Finishing consumes it, so it can only stop once.
pub trait ProgressTask: Send {
    fn finish(self: Box<Self>, success: bool);
}

/// Animated terminal spinner
#[derive(Debug, Default, Clone, Copy)]
pub struct SpinnerReporter;

impl ProgressReporter for SpinnerReporter {
    fn start(&self, label: &str) -> Box<dyn ProgressTask> {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(label.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Box::new(Spinner {
            pb,
            label: label.to_string(),
        })
    }
}

struct Spinner {
    pb: ProgressBar,
    label: String,
}

impl ProgressTask for Spinner {
    fn finish(self: Box<Self>, success: bool) {
        let mark = if success { "✓" } else { "✗" };
        self.pb.set_style(
            ProgressStyle::default_spinner()
                .template("{msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        self.pb.finish_with_message(format!("{mark} {}", self.label));
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        // Stop the tick thread if the step was abandoned without finishing
        if !self.pb.is_finished() {
            self.pb.abandon();
        }
    }
}

/// Reports progress through the log, for `--quiet` and non-terminal output
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn start(&self, label: &str) -> Box<dyn ProgressTask> {
        log::info!("{label}");
        Box::new(LoggedTask {
            label: label.to_string(),
            started: Instant::now(),
        })
    }
}

struct LoggedTask {
    label: String,
    started: Instant,
}

impl ProgressTask for LoggedTask {
    fn finish(self: Box<Self>, success: bool) {
        let elapsed = self.started.elapsed().as_millis();
        if success {
            log::info!("✓ {} ({elapsed}ms)", self.label);
        } else {
            log::warn!("✗ {} ({elapsed}ms)", self.label);
        }
    }
}

#[cfg(test)]
#[path = "progress_test.rs"]
mod tests;
