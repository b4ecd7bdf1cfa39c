//! Run State Machine
//!
//! Authoritative record of where an install run is. The runner drives it and
//! reports from it; it never lets a stage be skipped or a package be finished
//! twice.
//!
//! # Stage Flow
//!
//! ```text
//! NotStarted
//!     ↓
//! RefreshingIndex   (Linux only, otherwise skipped)
//!     ↓
//! Installing
//!     ↓
//! Complete
//! ```
//!
//! # Package Flow
//!
//! ```text
//! Pending ──→ Running ──→ Succeeded | Failed
//!    └──────→ Skipped     (run cancelled before it started)
//! ```

use std::fmt;
use thiserror::Error;

/// Run stages in sequential order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RunStage {
    NotStarted = 0,
    /// Refreshing the package index (`apt update`)
    RefreshingIndex = 1,
    /// Working through the snapshot one package at a time
    Installing = 2,
    /// Every package has a terminal state (terminal)
    Complete = 3,
}

impl RunStage {
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Next stage; `refresh` decides whether the index refresh is visited
    pub const fn next(self, refresh: bool) -> Option<Self> {
        match self {
            Self::NotStarted if refresh => Some(Self::RefreshingIndex),
            Self::NotStarted => Some(Self::Installing),
            Self::RefreshingIndex => Some(Self::Installing),
            Self::Installing => Some(Self::Complete),
            Self::Complete => None,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::RefreshingIndex => "Updating package lists",
            Self::Installing => "Installing packages",
            Self::Complete => "Installation complete",
        }
    }

    pub const fn all_stages() -> &'static [Self] {
        &[
            Self::NotStarted,
            Self::RefreshingIndex,
            Self::Installing,
            Self::Complete,
        ]
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Lifecycle of one package within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageState {
    Pending,
    Running,
    Succeeded,
    Failed,
    /// Never attempted because the run was cancelled
    Skipped,
}

impl PackageState {
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }

    /// Whether `self -> to` is a legal package transition
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Skipped)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }
}

impl fmt::Display for PackageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

/// Errors that can occur during state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Cannot skip from {from} to {to}")]
    SkippedStage { from: RunStage, to: RunStage },

    #[error("Cannot go backwards from {from} to {to}")]
    BackwardTransition { from: RunStage, to: RunStage },

    #[error("Cannot transition from terminal stage {from}")]
    FromTerminalState { from: RunStage },

    #[error("Already at stage {stage}")]
    AlreadyAtStage { stage: RunStage },

    /// Package work attempted outside the Installing stage
    #[error("Packages can only change state while installing (current stage: {stage})")]
    NotInstalling { stage: RunStage },

    #[error("Package '{package}' cannot go from {from} to {to}")]
    InvalidPackageTransition {
        package: String,
        from: PackageState,
        to: PackageState,
    },

    #[error("No package at position {index} in this run")]
    NoSuchPackage { index: usize },

    /// Attempted to complete the run while packages are unresolved
    #[error("{remaining} package(s) have not finished")]
    PackagesOutstanding { remaining: usize },
}

/// Tracks one install run: its stage and the state of every package.
///
/// Packages are addressed by their position in the run's snapshot, so a name
/// listed twice is still two distinct entries.
///
/// ```
/// use zapinstall::install_state::{RunContext, RunStage};
///
/// let mut ctx = RunContext::new(vec!["Git".to_string()], false);
/// ctx.advance().unwrap();
/// assert_eq!(ctx.current_stage(), RunStage::Installing);
///
/// ctx.start_package(0).unwrap();
/// ctx.finish_package(0, true).unwrap();
/// assert_eq!(ctx.progress_percent(), 100);
/// ```
#[derive(Debug, Clone)]
pub struct RunContext {
    current: RunStage,
    refresh_index: bool,
    packages: Vec<(String, PackageState)>,
    /// Stages entered, with unix timestamps
    stage_history: Vec<(RunStage, u64)>,
}

impl RunContext {
    /// New run over `packages` in the given order
    pub fn new(packages: Vec<String>, refresh_index: bool) -> Self {
        Self {
            current: RunStage::NotStarted,
            refresh_index,
            packages: packages
                .into_iter()
                .map(|name| (name, PackageState::Pending))
                .collect(),
            stage_history: Vec::with_capacity(RunStage::all_stages().len()),
        }
    }

    #[inline]
    pub fn current_stage(&self) -> RunStage {
        self.current
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.current == RunStage::Complete
    }

    #[inline]
    pub fn total(&self) -> usize {
        self.packages.len()
    }

    /// Packages in a terminal state
    pub fn completed_count(&self) -> usize {
        self.packages
            .iter()
            .filter(|(_, state)| state.is_terminal())
            .count()
    }

    pub fn count_in(&self, state: PackageState) -> usize {
        self.packages.iter().filter(|(_, s)| *s == state).count()
    }

    pub fn package_state(&self, index: usize) -> Option<PackageState> {
        self.packages.get(index).map(|(_, state)| *state)
    }

    pub fn packages(&self) -> &[(String, PackageState)] {
        &self.packages
    }

    pub fn stage_history(&self) -> &[(RunStage, u64)] {
        &self.stage_history
    }

    /// `completed * 100 / total`, integer division. An empty run reads 100
    /// once complete.
    pub fn progress_percent(&self) -> u8 {
        let total = self.total();
        if total == 0 {
            return if self.is_complete() { 100 } else { 0 };
        }
        (self.completed_count() * 100 / total) as u8
    }

    /// Advance to the next stage.
    ///
    /// # Errors
    ///
    /// - `FromTerminalState` if the run is already complete
    /// - `PackagesOutstanding` when leaving Installing with unfinished packages
    pub fn advance(&mut self) -> Result<RunStage, TransitionError> {
        let next = self
            .current
            .next(self.refresh_index)
            .ok_or(TransitionError::FromTerminalState { from: self.current })?;
        self.enter(next)
    }

    /// Transition to `target`, which must be the immediate next stage.
    ///
    /// # Errors
    ///
    /// - `FromTerminalState`, `AlreadyAtStage`, `BackwardTransition`, `SkippedStage`
    /// - `PackagesOutstanding` when leaving Installing with unfinished packages
    pub fn transition_to(&mut self, target: RunStage) -> Result<RunStage, TransitionError> {
        if self.current.is_terminal() {
            return Err(TransitionError::FromTerminalState { from: self.current });
        }
        if target == self.current {
            return Err(TransitionError::AlreadyAtStage { stage: target });
        }
        if target.order() < self.current.order() {
            return Err(TransitionError::BackwardTransition {
                from: self.current,
                to: target,
            });
        }
        if self.current.next(self.refresh_index) != Some(target) {
            return Err(TransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }
        self.enter(target)
    }

    fn enter(&mut self, stage: RunStage) -> Result<RunStage, TransitionError> {
        if stage == RunStage::Complete {
            let remaining = self.total() - self.completed_count();
            if remaining > 0 {
                return Err(TransitionError::PackagesOutstanding { remaining });
            }
        }

        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.stage_history.push((stage, timestamp));
        self.current = stage;
        Ok(stage)
    }

    /// Pending -> Running
    pub fn start_package(&mut self, index: usize) -> Result<(), TransitionError> {
        self.set_package(index, PackageState::Running)
    }

    /// Running -> Succeeded or Failed
    pub fn finish_package(&mut self, index: usize, success: bool) -> Result<(), TransitionError> {
        let to = if success {
            PackageState::Succeeded
        } else {
            PackageState::Failed
        };
        self.set_package(index, to)
    }

    /// Mark every still-pending package Skipped, returning how many were.
    pub fn skip_pending(&mut self) -> Result<usize, TransitionError> {
        self.require_installing()?;
        let mut skipped = 0;
        for (_, state) in self.packages.iter_mut() {
            if *state == PackageState::Pending {
                *state = PackageState::Skipped;
                skipped += 1;
            }
        }
        Ok(skipped)
    }

    fn set_package(&mut self, index: usize, to: PackageState) -> Result<(), TransitionError> {
        self.require_installing()?;
        let (name, state) = self
            .packages
            .get_mut(index)
            .ok_or(TransitionError::NoSuchPackage { index })?;
        if !state.can_transition_to(to) {
            return Err(TransitionError::InvalidPackageTransition {
                package: name.clone(),
                from: *state,
                to,
            });
        }
        *state = to;
        Ok(())
    }

    fn require_installing(&self) -> Result<(), TransitionError> {
        if self.current != RunStage::Installing {
            return Err(TransitionError::NotInstalling { stage: self.current });
        }
        Ok(())
    }
}
