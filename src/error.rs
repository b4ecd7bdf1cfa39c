//! Error handling module for zapinstall
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Per-package install failures are NOT errors: they are reported as
//! `InstallOutcome::Failed` by the runner so one package never aborts a run.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::install_state::TransitionError;

/// Main error type for zapinstall
#[derive(Error, Debug)]
pub enum ZapError {
    /// The platform's required package manager could not be invoked.
    /// Fatal to the whole run: no package is attempted.
    #[error("{message}")]
    EnvironmentUnavailable { manager: String, message: String },

    /// Host operating system has no package manager mapping
    #[error("Unsupported operating system: {0}")]
    UnsupportedPlatform(String),

    /// A package name that does not appear in the catalog
    #[error("Unknown package: {0}")]
    UnknownPackage(String),

    /// Catalog failed construction-time validation
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Run or package state machine rejected a transition
    #[error("State transition error: {0}")]
    Transition(#[from] TransitionError),

    /// IO errors (file operations, process spawning, terminal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// State errors (mutex poisoning, background thread panics)
    #[error("State error: {0}")]
    State(String),
}

/// Result type alias for zapinstall operations
pub type Result<T> = std::result::Result<T, ZapError>;

// Convenient error constructors
impl ZapError {
    /// Create an environment error for a missing package manager
    pub fn environment_unavailable(manager: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EnvironmentUnavailable {
            manager: manager.into(),
            message: message.into(),
        }
    }

    /// Create an unknown package error
    pub fn unknown_package(name: impl Into<String>) -> Self {
        Self::UnknownPackage(name.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a state error
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Returns true if this error means the host cannot run installs at all
    pub fn is_environment_error(&self) -> bool {
        matches!(
            self,
            Self::EnvironmentUnavailable { .. } | Self::UnsupportedPlatform(_)
        )
    }
}
