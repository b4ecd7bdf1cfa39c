//! Platform tag for the host operating system
//!
//! Exactly one tag is active per run. It selects which of a package's three
//! install commands is executed and which package managers must be present.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Host platform family, one per supported native package manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PlatformTag {
    /// Windows, installs through winget
    Windows,
    /// Linux, installs through APT with Snap for some packages
    Linux,
    /// macOS, installs through Homebrew
    Mac,
}

impl PlatformTag {
    /// Resolve the tag for the running host.
    ///
    /// Returns `None` on operating systems with no package manager mapping.
    pub fn detect() -> Option<Self> {
        let tag = Self::from_os(std::env::consts::OS);
        tracing::debug!("Platform detection: os={} tag={:?}", std::env::consts::OS, tag);
        tag
    }

    /// Map a `std::env::consts::OS` value to a tag
    pub fn from_os(os: &str) -> Option<Self> {
        match os {
            "windows" => Some(Self::Windows),
            "linux" => Some(Self::Linux),
            "macos" => Some(Self::Mac),
            _ => None,
        }
    }

    /// Human-readable name of the platform's package manager
    pub const fn manager_name(self) -> &'static str {
        match self {
            Self::Windows => "winget",
            Self::Linux => "APT/Snap",
            Self::Mac => "Homebrew",
        }
    }

    /// Shell program and flag used to run a catalog command string
    pub const fn shell(self) -> (&'static str, &'static str) {
        match self {
            Self::Windows => ("cmd", "/C"),
            Self::Linux | Self::Mac => ("sh", "-c"),
        }
    }

    /// Whether a package index refresh precedes installation
    #[inline]
    pub const fn refreshes_index(self) -> bool {
        matches!(self, Self::Linux)
    }
}
