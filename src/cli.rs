use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// zapinstall - install common software with your OS package manager
#[derive(Parser)]
#[command(name = "zapinstall")]
#[command(about = "Install common desktop software through winget, APT/Snap or Homebrew")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: log the install commands instead of running them.
    ///
    /// Package manager checks and the resource precheck still run, so the
    /// preview matches what a real run would do.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Settings file (JSON)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Catalog file (JSON) to use instead of the built-in package list
    #[arg(long, global = true, value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the available packages
    List {
        /// Only show this category
        #[arg(short, long)]
        category: Option<String>,

        /// Show install commands for this platform (windows, linux, mac)
        #[arg(short, long)]
        platform: Option<String>,
    },
    /// Install packages (interactive checklist when no names are given)
    Install {
        /// Package names, as shown by `list`
        names: Vec<String>,

        /// Install every package in the catalog
        #[arg(long, conflicts_with = "names")]
        all: bool,

        /// Continue past resource warnings without asking
        #[arg(short, long)]
        yes: bool,

        /// Per-package timeout in seconds (0 disables it)
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
    /// Check the package manager and system resources without installing
    Check,
    /// Export or validate catalog files
    Catalog {
        #[command(subcommand)]
        action: CatalogCommands,
    },
}

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// Write the active catalog to a JSON file
    Export {
        /// Output path
        path: PathBuf,
    },
    /// Validate a catalog JSON file
    Validate {
        /// Catalog file to validate
        path: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
