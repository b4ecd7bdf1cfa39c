//! Package catalog
//!
//! An immutable table mapping (category, package) to one install command per
//! platform. Catalogs are only built through `Catalog::from_categories`, which
//! rejects duplicate package names across categories, so a name always
//! resolves to exactly one command set.
//!
//! The built-in table ships with the binary; a JSON file with the same shape
//! can replace it (`--catalog`), which is also how tests inject fixtures.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::types::PlatformTag;

/// One installable package with its per-platform install commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    /// Display name, unique across the whole catalog
    pub name: String,
    /// winget command
    #[serde(alias = "cmd")]
    pub windows: String,
    /// APT / Snap command
    pub linux: String,
    /// Homebrew command
    pub mac: String,
}

impl PackageEntry {
    pub fn new(
        name: impl Into<String>,
        windows: impl Into<String>,
        linux: impl Into<String>,
        mac: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            windows: windows.into(),
            linux: linux.into(),
            mac: mac.into(),
        }
    }

    /// Command string for the given platform
    pub fn command(&self, platform: PlatformTag) -> &str {
        match platform {
            PlatformTag::Windows => &self.windows,
            PlatformTag::Linux => &self.linux,
            PlatformTag::Mac => &self.mac,
        }
    }
}

/// A named, ordered group of packages. Purely organizational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub packages: Vec<PackageEntry>,
}

impl Category {
    pub fn new(name: impl Into<String>, packages: Vec<PackageEntry>) -> Self {
        Self {
            name: name.into(),
            packages,
        }
    }
}

/// Construction-time catalog validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// A category with an empty or whitespace-only name
    #[error("Category #{index} has an empty name")]
    EmptyCategoryName { index: usize },

    /// Two categories share a name
    #[error("Category '{0}' is defined more than once")]
    DuplicateCategory(String),

    /// A package with an empty or whitespace-only name
    #[error("Category '{category}' contains a package with an empty name")]
    EmptyPackageName { category: String },

    /// The same package name appears in two categories (or twice in one)
    #[error("Package '{name}' appears in both '{first}' and '{second}' (package names must be unique)")]
    DuplicatePackage {
        name: String,
        first: String,
        second: String,
    },

    /// A package lacks a command for one of the platforms
    #[error("Package '{package}' has no {platform} command")]
    EmptyCommand {
        package: String,
        platform: PlatformTag,
    },
}

/// On-disk shape of a catalog; validated into `Catalog` on load
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub categories: Vec<Category>,
}

/// Validated, immutable package catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "CatalogFile", into = "CatalogFile")]
pub struct Catalog {
    categories: Vec<Category>,
    /// package name -> (category index, package index)
    index: HashMap<String, (usize, usize)>,
}

impl TryFrom<CatalogFile> for Catalog {
    type Error = CatalogError;

    fn try_from(file: CatalogFile) -> std::result::Result<Self, Self::Error> {
        Self::from_categories(file.categories)
    }
}

impl From<Catalog> for CatalogFile {
    fn from(catalog: Catalog) -> Self {
        Self {
            categories: catalog.categories,
        }
    }
}

impl Catalog {
    /// Build a catalog, validating names, uniqueness and command completeness.
    ///
    /// # Errors
    ///
    /// - `EmptyCategoryName` / `DuplicateCategory` for bad category names
    /// - `EmptyPackageName` for a blank package name
    /// - `DuplicatePackage` if a name occurs more than once anywhere
    /// - `EmptyCommand` if any platform command is blank
    pub fn from_categories(
        categories: Vec<Category>,
    ) -> std::result::Result<Self, CatalogError> {
        let mut index: HashMap<String, (usize, usize)> = HashMap::new();
        let mut seen_categories: HashSet<String> = HashSet::new();

        for (ci, category) in categories.iter().enumerate() {
            let category_name = category.name.trim();
            if category_name.is_empty() {
                return Err(CatalogError::EmptyCategoryName { index: ci });
            }
            if !seen_categories.insert(category_name.to_string()) {
                return Err(CatalogError::DuplicateCategory(category.name.clone()));
            }

            for (pi, package) in category.packages.iter().enumerate() {
                if package.name.trim().is_empty() {
                    return Err(CatalogError::EmptyPackageName {
                        category: category.name.clone(),
                    });
                }

                for platform in [PlatformTag::Windows, PlatformTag::Linux, PlatformTag::Mac] {
                    if package.command(platform).trim().is_empty() {
                        return Err(CatalogError::EmptyCommand {
                            package: package.name.clone(),
                            platform,
                        });
                    }
                }

                if let Some(&(first_ci, _)) = index.get(&package.name) {
                    return Err(CatalogError::DuplicatePackage {
                        name: package.name.clone(),
                        first: categories[first_ci].name.clone(),
                        second: category.name.clone(),
                    });
                }
                index.insert(package.name.clone(), (ci, pi));
            }
        }

        Ok(Self { categories, index })
    }

    /// The catalog compiled into the binary.
    pub fn builtin() -> Self {
        let categories = BUILTIN
            .iter()
            .map(|(name, packages)| {
                Category::new(
                    *name,
                    packages
                        .iter()
                        .map(|(pkg, windows, linux, mac)| {
                            PackageEntry::new(*pkg, *windows, *linux, *mac)
                        })
                        .collect(),
                )
            })
            .collect();

        Self::from_categories(categories)
            .expect("INTERNAL ERROR: built-in catalog failed validation - this is a bug")
    }

    /// Look up the install command for a package on a platform
    pub fn command_for(&self, name: &str, platform: PlatformTag) -> Option<&str> {
        self.get(name).map(|entry| entry.command(platform))
    }

    /// Look up a package entry by exact name
    pub fn get(&self, name: &str) -> Option<&PackageEntry> {
        self.index
            .get(name)
            .map(|&(ci, pi)| &self.categories[ci].packages[pi])
    }

    /// Returns true if the catalog has a package with this exact name
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Resolve operator input to a catalog name: exact match first, then
    /// a case-insensitive match.
    pub fn find_name(&self, input: &str) -> Option<&str> {
        let input = input.trim();
        if let Some(entry) = self.get(input) {
            return Some(entry.name.as_str());
        }
        self.package_names()
            .find(|name| name.eq_ignore_ascii_case(input))
    }

    /// Name of the category containing a package
    pub fn category_of(&self, name: &str) -> Option<&str> {
        self.index
            .get(name)
            .map(|&(ci, _)| self.categories[ci].name.as_str())
    }

    /// Category lookup, case-insensitive
    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
    }

    /// All categories in insertion order
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// All package names in catalog insertion order
    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.categories
            .iter()
            .flat_map(|c| c.packages.iter().map(|p| p.name.as_str()))
    }

    /// Total number of packages
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Save the catalog to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize catalog to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write catalog to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load and validate a catalog from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read catalog from {:?}", path.as_ref()))?;

        let catalog: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid catalog in {:?}", path.as_ref()))?;

        tracing::info!(
            "Loaded catalog from {:?}: {} categories, {} packages",
            path.as_ref(),
            catalog.categories.len(),
            catalog.len()
        );
        Ok(catalog)
    }
}

type BuiltinPackage = (&'static str, &'static str, &'static str, &'static str);

/// (category, [(name, windows, linux, mac)])
///
/// "OBS Studio" is listed once, at its first position (Utilities); package
/// names must be unique.
const BUILTIN: &[(&str, &[BuiltinPackage])] = &[
    (
        "Development",
        &[
            ("VS Code", "winget install Microsoft.VisualStudioCode", "sudo snap install code --classic", "brew install --cask visual-studio-code"),
            ("PyCharm", "winget install JetBrains.PyCharm.Community", "sudo snap install pycharm-community --classic", "brew install --cask pycharm-ce"),
            ("Git", "winget install Git.Git", "sudo apt install git -y", "brew install git"),
            ("Python", "winget install Python.Python.3", "sudo apt install python3 -y", "brew install python3"),
            ("Node.js", "winget install OpenJS.NodeJS", "sudo apt install nodejs -y", "brew install node"),
            ("Docker", "winget install Docker.DockerDesktop", "sudo apt install docker.io -y", "brew install --cask docker"),
            ("IntelliJ", "winget install JetBrains.IntelliJIDEA.Community", "sudo snap install intellij-idea-community --classic", "brew install --cask intellij-idea-ce"),
            ("Android Studio", "winget install Google.AndroidStudio", "sudo snap install android-studio --classic", "brew install --cask android-studio"),
            ("Sublime Text", "winget install SublimeHQ.SublimeText", "sudo snap install sublime-text --classic", "brew install --cask sublime-text"),
            ("Eclipse", "winget install EclipseFoundation.Eclipse", "sudo snap install eclipse --classic", "brew install --cask eclipse-ide"),
        ],
    ),
    (
        "Browsers",
        &[
            ("Chrome", "winget install Google.Chrome", "wget https://dl.google.com/linux/direct/google-chrome-stable_current_amd64.deb && sudo dpkg -i google-chrome-stable_current_amd64.deb", "brew install --cask google-chrome"),
            ("Firefox", "winget install Mozilla.Firefox", "sudo apt install firefox -y", "brew install --cask firefox"),
            ("Brave", "winget install BraveSoftware.BraveBrowser", "sudo snap install brave", "brew install --cask brave-browser"),
            ("Opera", "winget install Opera.Opera", "sudo snap install opera", "brew install --cask opera"),
            ("Edge", "winget install Microsoft.Edge", "sudo snap install microsoft-edge-stable --classic", "brew install --cask microsoft-edge"),
            ("Vivaldi", "winget install VivaldiTechnologies.Vivaldi", "sudo snap install vivaldi", "brew install --cask vivaldi"),
            ("Tor Browser", "winget install TorProject.TorBrowser", "sudo apt install torbrowser-launcher -y", "brew install --cask tor-browser"),
        ],
    ),
    (
        "Utilities",
        &[
            ("Postman", "winget install Postman.Postman", "sudo snap install postman", "brew install --cask postman"),
            ("7-Zip", "winget install 7zip.7zip", "sudo apt install p7zip-full -y", "brew install p7zip"),
            ("VLC", "winget install VideoLAN.VLC", "sudo apt install vlc -y", "brew install --cask vlc"),
            ("OBS Studio", "winget install OBSProject.OBSStudio", "sudo apt install obs-studio -y", "brew install --cask obs"),
            ("FileZilla", "winget install TimKosse.FileZilla", "sudo apt install filezilla -y", "brew install --cask filezilla"),
            ("WinSCP", "winget install WinSCP.WinSCP", "sudo apt install winscp -y", "brew install --cask winscp"),
            ("Putty", "winget install PuTTY.PuTTY", "sudo apt install putty -y", "brew install --cask putty"),
            ("TeamViewer", "winget install TeamViewer.TeamViewer", "sudo snap install teamviewer", "brew install --cask teamviewer"),
            ("Remmina", "winget install Remmina.Remmina", "sudo apt install remmina -y", "brew install --cask remmina"),
            ("Etcher", "winget install Balena.Etcher", "sudo apt install balena-etcher -y", "brew install --cask balenaetcher"),
        ],
    ),
    (
        "Communication",
        &[
            ("Discord", "winget install Discord.Discord", "sudo snap install discord", "brew install --cask discord"),
            ("Slack", "winget install SlackTechnologies.Slack", "sudo snap install slack", "brew install --cask slack"),
            ("Zoom", "winget install Zoom.Zoom", "sudo snap install zoom-client", "brew install --cask zoom"),
            ("Teams", "winget install Microsoft.Teams", "sudo snap install teams", "brew install --cask microsoft-teams"),
            ("Skype", "winget install Microsoft.Skype", "sudo snap install skype", "brew install --cask skype"),
            ("Telegram", "winget install Telegram.TelegramDesktop", "sudo snap install telegram-desktop", "brew install --cask telegram"),
            ("Signal", "winget install OpenWhisperSystems.Signal", "sudo snap install signal-desktop", "brew install --cask signal"),
            ("Element", "winget install Element.Element", "sudo apt install element-desktop -y", "brew install --cask element"),
        ],
    ),
    (
        "Media",
        &[
            ("Spotify", "winget install Spotify.Spotify", "sudo snap install spotify", "brew install --cask spotify"),
            ("Steam", "winget install Valve.Steam", "sudo apt install steam -y", "brew install --cask steam"),
            ("Audacity", "winget install Audacity.Audacity", "sudo apt install audacity -y", "brew install --cask audacity"),
            ("GIMP", "winget install GIMP.GIMP", "sudo apt install gimp -y", "brew install --cask gimp"),
            ("Blender", "winget install BlenderFoundation.Blender", "sudo snap install blender --classic", "brew install --cask blender"),
            ("Inkscape", "winget install Inkscape.Inkscape", "sudo apt install inkscape -y", "brew install --cask inkscape"),
            ("Krita", "winget install KDE.Krita", "sudo snap install krita", "brew install --cask krita"),
            ("HandBrake", "winget install HandBrake.HandBrake", "sudo snap install handbrake-jz", "brew install --cask handbrake"),
            ("DaVinci Resolve", "winget install Blackmagic.DaVinciResolve", "sudo snap install davinci-resolve", "brew install --cask davinci-resolve"),
        ],
    ),
    (
        "Security",
        &[
            ("Wireshark", "winget install WiresharkFoundation.Wireshark", "sudo apt install wireshark -y", "brew install --cask wireshark"),
            ("Bitwarden", "winget install Bitwarden.Bitwarden", "sudo snap install bitwarden", "brew install --cask bitwarden"),
            ("KeePass", "winget install DominikReichl.KeePass", "sudo apt install keepass2 -y", "brew install --cask keepass"),
            ("VeraCrypt", "winget install IDRIX.VeraCrypt", "sudo apt install veracrypt -y", "brew install --cask veracrypt"),
            ("Nmap", "winget install Insecure.Nmap", "sudo apt install nmap -y", "brew install nmap"),
            ("OpenVPN", "winget install OpenVPNTechnologies.OpenVPN", "sudo apt install openvpn -y", "brew install --cask openvpn-connect"),
        ],
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use strum::IntoEnumIterator;
    use tempfile::NamedTempFile;

    fn fixture() -> Catalog {
        Catalog::from_categories(vec![
            Category::new(
                "Tools",
                vec![
                    PackageEntry::new("Git", "winget install Git.Git", "sudo apt install git -y", "brew install git"),
                    PackageEntry::new("Nmap", "winget install Insecure.Nmap", "sudo apt install nmap -y", "brew install nmap"),
                ],
            ),
            Category::new(
                "Browsers",
                vec![PackageEntry::new(
                    "Firefox",
                    "winget install Mozilla.Firefox",
                    "sudo apt install firefox -y",
                    "brew install --cask firefox",
                )],
            ),
        ])
        .expect("fixture should be valid")
    }

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.len(), 50);
        assert_eq!(catalog.categories().len(), 6);
        assert_eq!(catalog.categories()[0].name, "Development");
        assert_eq!(catalog.categories()[5].name, "Security");
    }

    #[test]
    fn test_builtin_catalog_is_complete_for_every_platform() {
        let catalog = Catalog::builtin();
        for name in catalog.package_names() {
            for platform in PlatformTag::iter() {
                let cmd = catalog
                    .command_for(name, platform)
                    .unwrap_or_else(|| panic!("{} has no command for {}", name, platform));
                assert!(!cmd.trim().is_empty(), "{} has empty {} command", name, platform);
            }
        }
    }

    #[test]
    fn test_builtin_obs_listed_once_under_utilities() {
        let catalog = Catalog::builtin();
        let names: Vec<&str> = catalog.package_names().collect();
        let count = names.iter().filter(|n| **n == "OBS Studio").count();
        assert_eq!(count, 1);
        assert_eq!(catalog.category_of("OBS Studio"), Some("Utilities"));

        // Keeps its place between VLC and FileZilla
        let obs = names.iter().position(|n| *n == "OBS Studio").unwrap();
        assert_eq!(names[obs - 1], "VLC");
        assert_eq!(names[obs + 1], "FileZilla");
        assert!(!catalog.category("Media").unwrap().packages.iter().any(|p| p.name == "OBS Studio"));
    }

    #[test]
    fn test_command_for_picks_platform() {
        let catalog = fixture();
        assert_eq!(catalog.command_for("Git", PlatformTag::Windows), Some("winget install Git.Git"));
        assert_eq!(catalog.command_for("Git", PlatformTag::Linux), Some("sudo apt install git -y"));
        assert_eq!(catalog.command_for("Git", PlatformTag::Mac), Some("brew install git"));
        assert_eq!(catalog.command_for("Notepad++", PlatformTag::Linux), None);
    }

    #[test]
    fn test_package_names_in_insertion_order() {
        let catalog = fixture();
        let names: Vec<&str> = catalog.package_names().collect();
        assert_eq!(names, vec!["Git", "Nmap", "Firefox"]);
    }

    #[test]
    fn test_duplicate_package_across_categories_rejected() {
        let obs = PackageEntry::new("OBS Studio", "w", "l", "m");
        let result = Catalog::from_categories(vec![
            Category::new("Utilities", vec![obs.clone()]),
            Category::new("Media", vec![obs]),
        ]);

        assert_eq!(
            result.unwrap_err(),
            CatalogError::DuplicatePackage {
                name: "OBS Studio".to_string(),
                first: "Utilities".to_string(),
                second: "Media".to_string(),
            }
        );
    }

    #[test]
    fn test_duplicate_package_within_category_rejected() {
        let git = PackageEntry::new("Git", "w", "l", "m");
        let result = Catalog::from_categories(vec![Category::new("Tools", vec![git.clone(), git])]);
        assert!(matches!(result, Err(CatalogError::DuplicatePackage { .. })));
    }

    #[test]
    fn test_duplicate_category_rejected() {
        let result = Catalog::from_categories(vec![
            Category::new("Tools", vec![]),
            Category::new("Tools", vec![]),
        ]);
        assert_eq!(result.unwrap_err(), CatalogError::DuplicateCategory("Tools".to_string()));
    }

    #[test]
    fn test_empty_command_rejected() {
        let result = Catalog::from_categories(vec![Category::new(
            "Tools",
            vec![PackageEntry::new("Git", "winget install Git.Git", "  ", "brew install git")],
        )]);
        assert_eq!(
            result.unwrap_err(),
            CatalogError::EmptyCommand {
                package: "Git".to_string(),
                platform: PlatformTag::Linux,
            }
        );
    }

    #[test]
    fn test_empty_names_rejected() {
        let result = Catalog::from_categories(vec![Category::new(" ", vec![])]);
        assert_eq!(result.unwrap_err(), CatalogError::EmptyCategoryName { index: 0 });

        let result = Catalog::from_categories(vec![Category::new(
            "Tools",
            vec![PackageEntry::new("", "w", "l", "m")],
        )]);
        assert!(matches!(result, Err(CatalogError::EmptyPackageName { .. })));
    }

    #[test]
    fn test_find_name_is_case_insensitive_fallback() {
        let catalog = fixture();
        assert_eq!(catalog.find_name("Git"), Some("Git"));
        assert_eq!(catalog.find_name("firefox"), Some("Firefox"));
        assert_eq!(catalog.find_name("  NMAP "), Some("Nmap"));
        assert_eq!(catalog.find_name("vim"), None);
    }

    #[test]
    fn test_category_lookup() {
        let catalog = fixture();
        assert_eq!(catalog.category("browsers").map(|c| c.packages.len()), Some(1));
        assert!(catalog.category("Games").is_none());
        assert_eq!(catalog.category_of("Nmap"), Some("Tools"));
    }

    #[test]
    fn test_save_and_load_json_catalog() {
        let catalog = fixture();
        let temp_file = NamedTempFile::new().unwrap();

        catalog.save_to_file(temp_file.path()).unwrap();
        let loaded = Catalog::load_from_file(temp_file.path()).unwrap();

        let names: Vec<&str> = loaded.package_names().collect();
        assert_eq!(names, vec!["Git", "Nmap", "Firefox"]);
        assert_eq!(
            loaded.command_for("Firefox", PlatformTag::Mac),
            Some("brew install --cask firefox")
        );
    }

    #[test]
    fn test_load_rejects_duplicate_names_in_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let json = r#"{
            "categories": [
                {"name": "Utilities", "packages": [{"name": "OBS Studio", "windows": "w", "linux": "l", "mac": "m"}]},
                {"name": "Media", "packages": [{"name": "OBS Studio", "windows": "w", "linux": "l", "mac": "m"}]}
            ]
        }"#;
        temp_file.write_all(json.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let err = Catalog::load_from_file(temp_file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("OBS Studio"));
    }

    #[test]
    fn test_load_accepts_cmd_alias_for_windows() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let json = r#"{"categories": [{"name": "Tools", "packages": [
            {"name": "Git", "cmd": "winget install Git.Git", "linux": "sudo apt install git -y", "mac": "brew install git"}
        ]}]}"#;
        temp_file.write_all(json.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let loaded = Catalog::load_from_file(temp_file.path()).unwrap();
        assert_eq!(loaded.command_for("Git", PlatformTag::Windows), Some("winget install Git.Git"));
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = Catalog::load_from_file("/nonexistent/catalog.json");
        assert!(result.is_err());
    }
}
