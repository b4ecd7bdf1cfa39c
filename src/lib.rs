//! zapinstall library
//!
//! Installs common desktop software through the host's native package
//! manager: a validated catalog, a checklist selection, environment and
//! resource checks, and a sequential runner that reports per-package results.

pub mod catalog;
pub mod cli;
pub mod command_executor;
pub mod config_file;
pub mod console;
pub mod error;
pub mod install_state;
pub mod installer;
#[cfg(unix)]
pub mod process_guard;
pub mod resources;
pub mod sanity;
pub mod selection;
pub mod signals;
pub mod types;
pub mod workflow;

// Re-export main types for convenience
pub use catalog::{Catalog, CatalogError, Category, PackageEntry};
pub use command_executor::{CommandExecutor, DryRunExecutor, ExecOutcome, ShellExecutor};
pub use config_file::Settings;
pub use error::{Result, ZapError};
pub use install_state::{PackageState, RunContext, RunStage, TransitionError};
pub use installer::{InstallOutcome, InstallResult, Installer, RunEvent, RunSummary};
#[cfg(unix)]
pub use process_guard::{ChildRegistry, CommandProcessGroup, GroupPlacement, ProcessGuard};
pub use resources::{ResourceSample, ResourceSampler, ResourceThresholds, ResourceWarning};
pub use sanity::{EnvironmentReport, ManagerProbe, VersionProbe};
pub use selection::SelectionState;
pub use types::PlatformTag;
pub use workflow::{InstallHandle, Notification, Operator, StartOutcome, Workflow};
