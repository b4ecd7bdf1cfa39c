//! Install workflow
//!
//! Glue between the presentation and the runner. Starting an install takes
//! the selection snapshot, checks the environment, asks the operator about
//! resource warnings, and only then hands the snapshot to the installer
//! thread. Nothing is executed if any step before the hand-off says no.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread::JoinHandle;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::command_executor::CommandExecutor;
use crate::config_file::Settings;
use crate::error::{Result, ZapError};
use crate::installer::{Installer, RunEvent, RunSummary};
use crate::resources::{ResourceSampler, ResourceWarning, SysinfoSampler, evaluate};
use crate::sanity::{ManagerProbe, VersionProbe, resolve_environment};
use crate::selection::SelectionState;
use crate::types::PlatformTag;

/// One-off messages for the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Install requested with an empty selection
    NothingSelected,
    /// The platform's package manager is missing; carries the message to show
    EnvironmentUnavailable(String),
    /// Operator declined to continue past resource warnings
    Declined,
}

/// The presentation side of the workflow
pub trait Operator {
    /// Ask whether to continue despite the warnings. false aborts the run.
    fn confirm_resource_warnings(&mut self, warnings: &[ResourceWarning]) -> bool;

    fn notify(&mut self, notification: Notification);
}

/// Handle to a running install
pub struct InstallHandle {
    events: Receiver<RunEvent>,
    handle: JoinHandle<RunSummary>,
    cancel: Arc<AtomicBool>,
}

impl InstallHandle {
    /// Event stream; ends once the runner thread exits
    pub fn events(&self) -> &Receiver<RunEvent> {
        &self.events
    }

    /// Ask the runner to stop after the package in progress
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Wait for the runner thread and return its summary
    pub fn join(self) -> Result<RunSummary> {
        self.handle
            .join()
            .map_err(|_| ZapError::state("installer thread panicked"))
    }
}

/// How a start request ended
pub enum StartOutcome {
    NothingSelected,
    EnvironmentUnavailable { manager: String, message: String },
    Declined,
    Started(InstallHandle),
}

impl StartOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }
}

/// Orchestrates checks and the installer for one platform
pub struct Workflow {
    catalog: Arc<Catalog>,
    platform: PlatformTag,
    settings: Settings,
    probe: Box<dyn ManagerProbe>,
    sampler: Box<dyn ResourceSampler>,
    cancel: Arc<AtomicBool>,
}

impl Workflow {
    /// Workflow that probes and samples the real host
    pub fn new(catalog: Arc<Catalog>, platform: PlatformTag, settings: Settings) -> Self {
        Self {
            catalog,
            platform,
            settings,
            probe: Box::new(VersionProbe),
            sampler: Box::new(SysinfoSampler::new()),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_probe(mut self, probe: Box<dyn ManagerProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_sampler(mut self, sampler: Box<dyn ResourceSampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Share a cancellation flag with the runner (signal handlers set it)
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn platform(&self) -> PlatformTag {
        self.platform
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Start installing the current selection.
    ///
    /// The selection is copied here; changing it afterwards does not affect
    /// the run. `executor` is only used if the run actually starts.
    pub fn start(
        &mut self,
        selection: &SelectionState,
        operator: &mut dyn Operator,
        executor: Box<dyn CommandExecutor>,
    ) -> StartOutcome {
        let snapshot = selection.snapshot();
        if snapshot.is_empty() {
            info!("Install requested with nothing selected");
            operator.notify(Notification::NothingSelected);
            return StartOutcome::NothingSelected;
        }

        let report = match resolve_environment(self.platform, self.probe.as_ref()) {
            Ok(report) => report,
            Err(e) => {
                let manager = match &e {
                    ZapError::EnvironmentUnavailable { manager, .. } => manager.clone(),
                    _ => self.platform.manager_name().to_string(),
                };
                let message = e.to_string();
                operator.notify(Notification::EnvironmentUnavailable(message.clone()));
                return StartOutcome::EnvironmentUnavailable { manager, message };
            }
        };

        if self.settings.resource_check {
            let sample = self.sampler.sample();
            let warnings = evaluate(&sample, &self.settings.resource_thresholds);
            if !warnings.is_empty() {
                warn!("Resource precheck raised {} warning(s)", warnings.len());
                if !operator.confirm_resource_warnings(&warnings) {
                    info!("Operator declined to continue past resource warnings");
                    operator.notify(Notification::Declined);
                    return StartOutcome::Declined;
                }
            }
        }

        let (tx, rx) = mpsc::channel();
        for advisory in report.advisories() {
            let _ = tx.send(RunEvent::Log(advisory));
        }

        let refresh = if self.platform.refreshes_index() {
            self.settings.refresh_command()
        } else {
            None
        };
        let installer = Installer::new(Arc::clone(&self.catalog), self.platform, executor)
            .with_timeout(self.settings.command_timeout())
            .with_refresh_command(refresh)
            .with_cancel_flag(Arc::clone(&self.cancel));

        info!("Starting install of {} package(s)", snapshot.len());
        let handle = installer.spawn(snapshot, tx);

        StartOutcome::Started(InstallHandle {
            events: rx,
            handle,
            cancel: Arc::clone(&self.cancel),
        })
    }
}
