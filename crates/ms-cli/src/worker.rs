//! Background execution of the workflow under operator interrupt
//!
//! The supervisor races the workflow task against an interrupt future.
//! Whichever resolves first decides the outcome. On interrupt the shared
//! cancellation token fires so the workflow stops before its next step.

use anyhow::anyhow;
use std::any::Any;
use std::future::Future;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

/// The workflow stopped because cancellation was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("interrupted by operator")]
pub struct Interrupted;

/// How a worker run ended
#[derive(Debug)]
pub enum WorkerOutcome<T> {
    /// The task ran to completion, successfully or not
    Completed(anyhow::Result<T>),
    /// The interrupt fired first, or the task stopped on cancellation
    Cancelled,
}

/// Runs one task to a terminal outcome.
///
/// A worker is idle until [`Worker::run`] consumes it, so a finished or
/// cancelled worker cannot be restarted.
#[derive(Debug, Default)]
pub struct Worker {
    cancel: CancellationToken,
}

impl Worker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token the task should check between steps
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn `task` and wait for it or for `interrupt`.
    ///
    /// After an interrupt the token is cancelled and the task is awaited until
    /// it stops at its next checkpoint, so an in-flight engine call finishes.
    pub async fn run<T, F, I>(self, task: F, interrupt: I) -> WorkerOutcome<T>
    where
        T: Send + 'static,
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        I: Future<Output = ()>,
    {
        let mut handle = tokio::spawn(task);

        tokio::select! {
            joined = &mut handle => return completed(joined),
            _ = interrupt => {}
        }

        log::info!("Interrupt received, stopping after the current step");
        self.cancel.cancel();
        if let WorkerOutcome::Completed(Err(e)) = completed(handle.await) {
            log::warn!("Workflow failed while stopping: {e:#}");
        }
        WorkerOutcome::Cancelled
    }
}

fn completed<T>(joined: Result<anyhow::Result<T>, JoinError>) -> WorkerOutcome<T> {
    match joined {
        Ok(Err(e)) if e.is::<Interrupted>() => WorkerOutcome::Cancelled,
        Ok(result) => WorkerOutcome::Completed(result),
        Err(e) if e.is_panic() => {
            let message = panic_message(e.into_panic());
            log::error!("Workflow task panicked: {message}");
            WorkerOutcome::Completed(Err(anyhow!("worker panicked: {message}")))
        }
        Err(e) => WorkerOutcome::Completed(Err(anyhow!("worker task failed: {e}"))),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(s) => *s,
        Err(panic) => match panic.downcast::<&str>() {
            Ok(s) => s.to_string(),
            Err(_) => "Unknown panic".to_string(),
        },
    }
}

#[cfg(test)]
#[path = "worker_test.rs"]
mod tests;
