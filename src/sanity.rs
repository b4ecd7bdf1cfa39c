//! Pre-flight environment checks
//!
//! Verifies that the active platform's package manager answers a version
//! query before any install is attempted:
//! - Windows: `winget` (required)
//! - macOS: `brew` (required)
//! - Linux: `apt` (required), `snap` (optional, advisory only)
//!
//! A missing required manager aborts the run before any package is touched.
//! A missing optional manager becomes an advisory log line; packages whose
//! command needs it fail later, one by one.

use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

use crate::error::{Result, ZapError};
#[cfg(unix)]
use crate::process_guard::CommandProcessGroup;
use crate::types::PlatformTag;

/// Checks whether a package manager binary can be invoked
pub trait ManagerProbe {
    fn is_available(&self, binary: &str) -> bool;
}

/// Runs `<binary> --version` and reports whether it exited successfully
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionProbe;

impl ManagerProbe for VersionProbe {
    fn is_available(&self, binary: &str) -> bool {
        let mut cmd = Command::new(binary);
        cmd.arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        cmd.in_new_process_group();

        let available = cmd.status().map(|status| status.success()).unwrap_or(false);
        debug!("Probe {} --version: available={}", binary, available);
        available
    }
}

/// A package manager the platform relies on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerRequirement {
    /// Binary probed with `--version`
    pub binary: &'static str,
    /// Absence aborts the run when true, is advisory when false
    pub required: bool,
    /// Message shown when the manager is missing
    pub missing_message: &'static str,
    /// Where to get it
    pub install_hint: &'static str,
}

const WINDOWS_MANAGERS: &[ManagerRequirement] = &[ManagerRequirement {
    binary: "winget",
    required: true,
    missing_message: "Winget package manager not found. Please install it first.",
    install_hint: "Install \"App Installer\" from the Microsoft Store",
}];

const LINUX_MANAGERS: &[ManagerRequirement] = &[
    ManagerRequirement {
        binary: "apt",
        required: true,
        missing_message: "APT package manager not found.",
        install_hint: "zapinstall supports Debian and Ubuntu based distributions",
    },
    ManagerRequirement {
        binary: "snap",
        required: false,
        missing_message: "Warning: Snap not found. Some packages may fail to install.",
        install_hint: "sudo apt install snapd",
    },
];

const MAC_MANAGERS: &[ManagerRequirement] = &[ManagerRequirement {
    binary: "brew",
    required: true,
    missing_message: "Homebrew package manager not found. Please install it first.",
    install_hint: "See https://brew.sh",
}];

/// Package managers probed for a platform, required ones first
pub fn managers_for(platform: PlatformTag) -> &'static [ManagerRequirement] {
    match platform {
        PlatformTag::Windows => WINDOWS_MANAGERS,
        PlatformTag::Linux => LINUX_MANAGERS,
        PlatformTag::Mac => MAC_MANAGERS,
    }
}

/// Result of probing the platform's package managers
#[derive(Debug, Clone)]
pub struct EnvironmentReport {
    pub platform: PlatformTag,
    /// Required managers that did not respond
    pub missing_required: Vec<ManagerRequirement>,
    /// Optional managers that did not respond
    pub missing_optional: Vec<ManagerRequirement>,
}

impl EnvironmentReport {
    /// Returns true if every required manager is available
    pub fn is_ok(&self) -> bool {
        self.missing_required.is_empty()
    }

    /// Advisory lines for the run log (missing optional managers)
    pub fn advisories(&self) -> Vec<String> {
        self.missing_optional
            .iter()
            .map(|m| m.missing_message.to_string())
            .collect()
    }
}

/// Probe every manager the platform uses
pub fn verify_environment(platform: PlatformTag, probe: &dyn ManagerProbe) -> EnvironmentReport {
    let mut missing_required = Vec::new();
    let mut missing_optional = Vec::new();

    for manager in managers_for(platform) {
        if probe.is_available(manager.binary) {
            continue;
        }
        if manager.required {
            missing_required.push(*manager);
        } else {
            warn!("Optional package manager not found: {}", manager.binary);
            missing_optional.push(*manager);
        }
    }

    EnvironmentReport {
        platform,
        missing_required,
        missing_optional,
    }
}

/// Probe the platform and fail if a required manager is missing.
///
/// # Errors
///
/// `EnvironmentUnavailable` naming the first missing required manager
pub fn resolve_environment(
    platform: PlatformTag,
    probe: &dyn ManagerProbe,
) -> Result<EnvironmentReport> {
    debug!("Running pre-flight checks for {}...", platform);
    let report = verify_environment(platform, probe);

    if let Some(manager) = report.missing_required.first() {
        warn!("Required package manager missing: {}", manager.binary);
        return Err(ZapError::environment_unavailable(
            manager.binary,
            manager.missing_message,
        ));
    }

    info!(
        "Pre-flight checks passed: platform={}, advisories={}",
        platform,
        report.missing_optional.len()
    );
    Ok(report)
}

/// Install hint for a manager binary, if it is one we probe
pub fn install_hint(binary: &str) -> Option<&'static str> {
    [WINDOWS_MANAGERS, LINUX_MANAGERS, MAC_MANAGERS]
        .iter()
        .flat_map(|managers| managers.iter())
        .find(|m| m.binary == binary)
        .map(|m| m.install_hint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;

    struct FakeProbe {
        present: HashSet<&'static str>,
        probed: RefCell<Vec<String>>,
    }

    impl FakeProbe {
        fn with(present: &[&'static str]) -> Self {
            Self {
                present: present.iter().copied().collect(),
                probed: RefCell::new(Vec::new()),
            }
        }
    }

    impl ManagerProbe for FakeProbe {
        fn is_available(&self, binary: &str) -> bool {
            self.probed.borrow_mut().push(binary.to_string());
            self.present.contains(binary)
        }
    }

    #[test]
    fn test_linux_all_present() {
        let probe = FakeProbe::with(&["apt", "snap"]);
        let report = resolve_environment(PlatformTag::Linux, &probe).unwrap();
        assert!(report.is_ok());
        assert!(report.advisories().is_empty());
        assert_eq!(*probe.probed.borrow(), vec!["apt", "snap"]);
    }

    #[test]
    fn test_linux_missing_snap_is_advisory() {
        let probe = FakeProbe::with(&["apt"]);
        let report = resolve_environment(PlatformTag::Linux, &probe).unwrap();
        assert_eq!(
            report.advisories(),
            vec!["Warning: Snap not found. Some packages may fail to install."]
        );
    }

    #[test]
    fn test_linux_missing_apt_is_fatal() {
        let probe = FakeProbe::with(&["snap"]);
        let err = resolve_environment(PlatformTag::Linux, &probe).unwrap_err();
        assert!(matches!(
            err,
            ZapError::EnvironmentUnavailable { ref manager, .. } if manager == "apt"
        ));
        assert_eq!(err.to_string(), "APT package manager not found.");
    }

    #[test]
    fn test_windows_requires_winget() {
        let probe = FakeProbe::with(&[]);
        let err = resolve_environment(PlatformTag::Windows, &probe).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Winget package manager not found. Please install it first."
        );
        assert!(resolve_environment(PlatformTag::Windows, &FakeProbe::with(&["winget"])).is_ok());
    }

    #[test]
    fn test_mac_requires_brew() {
        let probe = FakeProbe::with(&["apt"]);
        let err = resolve_environment(PlatformTag::Mac, &probe).unwrap_err();
        assert!(err.is_environment_error());
        assert_eq!(*probe.probed.borrow(), vec!["brew"]);
    }

    #[test]
    fn test_install_hints() {
        assert_eq!(install_hint("brew"), Some("See https://brew.sh"));
        assert_eq!(install_hint("snap"), Some("sudo apt install snapd"));
        assert_eq!(install_hint("pacman"), None);
    }

    #[test]
    fn test_version_probe_nonexistent_binary() {
        assert!(!VersionProbe.is_available("this_binary_definitely_does_not_exist_12345"));
    }
}
