//! Installer module
//!
//! Runs a selection snapshot through the platform's package manager, one
//! package at a time, on a background thread. Progress flows back to the
//! presentation as `RunEvent`s over an mpsc channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::catalog::Catalog;
use crate::command_executor::{CommandExecutor, ExecOutcome};
use crate::install_state::{PackageState, RunContext, RunStage, TransitionError};
use crate::types::PlatformTag;

/// Marker prefixed to a successful install log line
pub const SUCCESS_MARKER: &str = "✓";
/// Marker prefixed to a failed install log line
pub const FAILURE_MARKER: &str = "❌";

/// Index refresh run before installing on Linux
pub const DEFAULT_REFRESH_COMMAND: &str = "sudo apt update";

/// How one package's install attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Succeeded,
    Failed(String),
    TimedOut(Duration),
}

/// Result of one package's install attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallResult {
    pub name: String,
    pub outcome: InstallOutcome,
}

impl InstallResult {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, InstallOutcome::Succeeded)
    }

    /// Error text for a failed attempt, None on success
    pub fn error_text(&self) -> Option<String> {
        match &self.outcome {
            InstallOutcome::Succeeded => None,
            InstallOutcome::Failed(text) => Some(text.clone()),
            InstallOutcome::TimedOut(after) => Some(format!("timed out after {}s", after.as_secs())),
        }
    }

    /// The log line shown for this result
    pub fn log_line(&self) -> String {
        match self.error_text() {
            None => format!("{} {} installed successfully", SUCCESS_MARKER, self.name),
            Some(error) => format!("{} Failed to install {}: {}", FAILURE_MARKER, self.name, error),
        }
    }
}

/// Final tally of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    /// Never attempted because the run was cancelled
    pub skipped: Vec<String>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn failed_names(&self) -> &[String] {
        &self.failed
    }

    /// Every requested package installed and nothing was cancelled
    pub fn is_full_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty() && !self.cancelled
    }

    fn from_context(ctx: &RunContext, cancelled: bool) -> Self {
        let mut summary = Self {
            cancelled,
            ..Self::default()
        };
        for (name, state) in ctx.packages() {
            match state {
                PackageState::Succeeded => summary.succeeded.push(name.clone()),
                PackageState::Failed => summary.failed.push(name.clone()),
                PackageState::Skipped => summary.skipped.push(name.clone()),
                PackageState::Pending | PackageState::Running => {}
            }
        }
        summary
    }
}

/// Events streamed from the runner thread
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// A line for the progress log
    Log(String),
    Stage(RunStage),
    PackageStarted(String),
    PackageFinished(InstallResult),
    /// Percent of packages finished, `completed * 100 / total`
    Progress(u8),
    Complete(RunSummary),
}

/// Sequential package installer
pub struct Installer {
    catalog: Arc<Catalog>,
    platform: PlatformTag,
    executor: Box<dyn CommandExecutor>,
    timeout: Option<Duration>,
    refresh_command: Option<String>,
    cancel: Arc<AtomicBool>,
}

impl Installer {
    /// Create an installer. Linux runs refresh the package index first.
    pub fn new(
        catalog: Arc<Catalog>,
        platform: PlatformTag,
        executor: Box<dyn CommandExecutor>,
    ) -> Self {
        let refresh_command = platform
            .refreshes_index()
            .then(|| DEFAULT_REFRESH_COMMAND.to_string());
        Self {
            catalog,
            platform,
            executor,
            timeout: None,
            refresh_command,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Per-command deadline; None waits indefinitely
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the index refresh command, or disable it with None
    pub fn with_refresh_command(mut self, command: Option<String>) -> Self {
        self.refresh_command = command;
        self
    }

    /// Share an existing cancellation flag (e.g. one set by a signal handler)
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Run the installer on a background thread
    pub fn spawn(mut self, snapshot: Vec<String>, events: Sender<RunEvent>) -> JoinHandle<RunSummary> {
        thread::spawn(move || self.run(snapshot, &events))
    }

    /// Install every package in `snapshot`, in order, and return the summary.
    ///
    /// A failing package never stops the run; only the cancel flag does.
    pub fn run(&mut self, snapshot: Vec<String>, events: &Sender<RunEvent>) -> RunSummary {
        let emit = |event: RunEvent| {
            // The receiver may have gone away; the run still completes
            let _ = events.send(event);
        };

        info!(
            "Starting install run: {} package(s) on {}",
            snapshot.len(),
            self.platform
        );
        emit(RunEvent::Log(format!("Installing {} packages...", snapshot.len())));

        let mut ctx = RunContext::new(snapshot.clone(), self.refresh_command.is_some());

        if let Some(command) = self.refresh_command.clone() {
            enter_stage(&mut ctx, RunStage::RefreshingIndex, &emit);
            emit(RunEvent::Log("Updating package lists...".to_string()));
            let outcome = self.executor.execute(&command, self.timeout);
            if !outcome.success() {
                warn!(
                    "Package index refresh failed: {}",
                    outcome.failure_text().unwrap_or_default()
                );
                emit(RunEvent::Log("Warning: Failed to update package lists".to_string()));
            }
        }

        enter_stage(&mut ctx, RunStage::Installing, &emit);

        let mut cancelled = false;
        for (index, name) in snapshot.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                cancelled = true;
                let skipped = check(ctx.skip_pending()).unwrap_or(0);
                warn!("Install run cancelled, {} package(s) skipped", skipped);
                emit(RunEvent::Log(format!(
                    "Installation cancelled: {} package(s) skipped",
                    skipped
                )));
                break;
            }

            check(ctx.start_package(index));
            emit(RunEvent::PackageStarted(name.clone()));
            emit(RunEvent::Log(format!("Installing {}...", name)));

            let result = InstallResult {
                name: name.clone(),
                outcome: self.install_one(name),
            };
            check(ctx.finish_package(index, result.succeeded()));

            match result.error_text() {
                None => info!("Installed {}", name),
                Some(ref e) => warn!("Failed to install {}: {}", name, e),
            }
            emit(RunEvent::Log(result.log_line()));
            emit(RunEvent::PackageFinished(result));
            emit(RunEvent::Progress(ctx.progress_percent()));
        }

        enter_stage(&mut ctx, RunStage::Complete, &emit);

        let summary = RunSummary::from_context(&ctx, cancelled);
        info!(
            "Install run finished: {} succeeded, {} failed, {} skipped",
            summary.succeeded_count(),
            summary.failed_count(),
            summary.skipped.len()
        );
        emit(RunEvent::Log(format!(
            "{} succeeded, {} failed",
            summary.succeeded_count(),
            summary.failed_count()
        )));
        emit(RunEvent::Complete(summary.clone()));
        summary
    }

    fn install_one(&mut self, name: &str) -> InstallOutcome {
        let Some(command) = self.catalog.command_for(name, self.platform) else {
            return InstallOutcome::Failed(format!(
                "no install command for '{}' on {}",
                name, self.platform
            ));
        };
        debug!("Installing {} with: {}", name, command);

        match self.executor.execute(command, self.timeout) {
            outcome if outcome.success() => InstallOutcome::Succeeded,
            ExecOutcome::TimedOut { after } => InstallOutcome::TimedOut(after),
            other => InstallOutcome::Failed(
                other
                    .failure_text()
                    .unwrap_or_else(|| "unknown error".to_string()),
            ),
        }
    }
}

fn enter_stage(ctx: &mut RunContext, stage: RunStage, emit: &impl Fn(RunEvent)) {
    if check(ctx.transition_to(stage)).is_some() {
        emit(RunEvent::Stage(stage));
    }
}

/// The runner drives the state machine in order, so a rejected transition is
/// a bug; it is logged and the run carries on.
fn check<T>(result: Result<T, TransitionError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            error!("INTERNAL ERROR: run state rejected a transition: {}", e);
            None
        }
    }
}
