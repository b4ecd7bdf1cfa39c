//! zapinstall - Main entry point

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use zapinstall::catalog::Catalog;
use zapinstall::cli::{CatalogCommands, Cli, Commands};
use zapinstall::command_executor::{CommandExecutor, DryRunExecutor, ShellExecutor};
use zapinstall::config_file::Settings;
use zapinstall::console::{self, ChecklistAction, ConsoleOperator};
use zapinstall::error::ZapError;
use zapinstall::resources::{ResourceSampler, SysinfoSampler, evaluate};
use zapinstall::sanity::{VersionProbe, managers_for, verify_environment};
use zapinstall::selection::SelectionState;
use zapinstall::signals;
use zapinstall::types::PlatformTag;
use zapinstall::workflow::{StartOutcome, Workflow};

const EXIT_FAILURE: u8 = 1;
/// 128 + SIGINT
const EXIT_CANCELLED: u8 = 130;

/// Initialize the tracing subscriber on stderr.
/// RUST_LOG overrides the level chosen by `-v`.
fn init_logger(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_logger(cli.verbose);
    info!("zapinstall starting up");

    // Terminates any install shell still running when main returns
    #[cfg(unix)]
    let _guard = zapinstall::process_guard::ProcessGuard::new();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let settings = Settings::load_or_default(cli.config.as_deref())?;
    debug!("Settings: {:?}", settings);

    let catalog_path = cli.catalog.as_deref().or(settings.catalog_path.as_deref());
    let catalog = Arc::new(load_catalog(catalog_path)?);

    match cli.command {
        Some(Commands::List { category, platform }) => {
            list_packages(&catalog, category.as_deref(), platform.as_deref())
        }
        Some(Commands::Install {
            names,
            all,
            yes,
            timeout,
        }) => {
            let mut settings = settings;
            if let Some(secs) = timeout {
                settings.command_timeout_secs = secs;
            }
            install(catalog, settings, &names, all, yes, cli.dry_run)
        }
        Some(Commands::Check) => check(&catalog, &settings),
        Some(Commands::Catalog { action }) => match action {
            CatalogCommands::Export { path } => {
                catalog.save_to_file(&path)?;
                println!("✓ Catalog written to {}", path.display());
                Ok(ExitCode::SUCCESS)
            }
            CatalogCommands::Validate { path } => validate_catalog(&path),
        },
        None => {
            info!("No command specified, opening the interactive checklist");
            install(catalog, settings, &[], false, false, cli.dry_run)
        }
    }
}

fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    match path {
        Some(path) => Catalog::load_from_file(path),
        None => Ok(Catalog::builtin()),
    }
}

fn detect_platform() -> Result<PlatformTag> {
    PlatformTag::detect()
        .ok_or_else(|| ZapError::UnsupportedPlatform(std::env::consts::OS.to_string()).into())
}

fn list_packages(catalog: &Catalog, category: Option<&str>, platform: Option<&str>) -> Result<ExitCode> {
    let platform = match platform {
        Some(tag) => Some(tag.parse::<PlatformTag>().with_context(|| {
            format!("Unknown platform '{}' (expected windows, linux or mac)", tag)
        })?),
        None => PlatformTag::detect(),
    };

    let categories = match category {
        Some(name) => {
            let found = catalog
                .category(name)
                .with_context(|| format!("Unknown category '{}'", name))?;
            std::slice::from_ref(found)
        }
        None => catalog.categories(),
    };

    let mut out = io::stdout().lock();
    for category in categories {
        writeln!(out, "{}", category.name)?;
        for package in &category.packages {
            match platform {
                Some(platform) => {
                    writeln!(out, "  {:<24} {}", package.name, package.command(platform))?
                }
                None => writeln!(out, "  {}", package.name)?,
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn install(
    catalog: Arc<Catalog>,
    settings: Settings,
    names: &[String],
    all: bool,
    yes: bool,
    dry_run: bool,
) -> Result<ExitCode> {
    let platform = detect_platform()?;
    info!("Platform: {} ({})", platform, platform.manager_name());

    let mut selection = SelectionState::new(&catalog);
    if all {
        selection.select_all();
    } else if names.is_empty() {
        // Lock scope ends before the operator takes stdin
        let action = {
            let mut input = io::stdin().lock();
            let mut out = io::stdout();
            console::interactive_select(&catalog, &mut selection, &mut input, &mut out)?
        };
        if action == ChecklistAction::Quit {
            return Ok(ExitCode::SUCCESS);
        }
    } else {
        for name in names {
            let resolved = catalog
                .find_name(name)
                .ok_or_else(|| ZapError::unknown_package(name.as_str()))?;
            selection.select(resolved)?;
        }
    }

    let cancel = Arc::new(AtomicBool::new(false));
    if let Err(e) = signals::install_handlers(Arc::clone(&cancel)) {
        warn!("Failed to initialize signal handlers: {}", e);
    }

    let dry_run_executor = DryRunExecutor::new();
    let executor: Box<dyn CommandExecutor> = if dry_run {
        Box::new(dry_run_executor.clone())
    } else {
        Box::new(ShellExecutor::new(platform))
    };

    let mut workflow = Workflow::new(Arc::clone(&catalog), platform, settings)
        .with_cancel_flag(Arc::clone(&cancel));
    let mut operator = ConsoleOperator::stdio(yes);

    let handle = match workflow.start(&selection, &mut operator, executor) {
        StartOutcome::Started(handle) => handle,
        StartOutcome::NothingSelected | StartOutcome::Declined => return Ok(ExitCode::SUCCESS),
        StartOutcome::EnvironmentUnavailable { manager, .. } => {
            console::print_environment_error(&manager, &mut io::stdout())?;
            return Ok(ExitCode::from(EXIT_FAILURE));
        }
    };

    let mut out = io::stdout();
    for event in handle.events().iter() {
        console::render_event(&event, &mut out)?;
    }
    let summary = handle.join()?;
    console::print_summary(&summary, &mut out)?;

    if dry_run {
        let commands = dry_run_executor.commands();
        writeln!(out, "\nDry run: {} command(s) would have been executed:", commands.len())?;
        for command in commands {
            writeln!(out, "  {}", command)?;
        }
    }

    let code = if summary.cancelled {
        EXIT_CANCELLED
    } else if summary.failed_count() > 0 {
        EXIT_FAILURE
    } else {
        0
    };
    Ok(ExitCode::from(code))
}

fn check(catalog: &Catalog, settings: &Settings) -> Result<ExitCode> {
    let platform = detect_platform()?;
    let mut out = io::stdout().lock();
    writeln!(out, "Platform: {} ({})", platform, platform.manager_name())?;

    let report = verify_environment(platform, &VersionProbe);
    for manager in managers_for(platform) {
        let missing = report.missing_required.contains(manager)
            || report.missing_optional.contains(manager);
        if missing {
            let kind = if manager.required { "required" } else { "optional" };
            writeln!(out, "  {:<8} not found ({})", manager.binary, kind)?;
            writeln!(out, "           {}", manager.install_hint)?;
        } else {
            writeln!(out, "  {:<8} ok", manager.binary)?;
        }
    }

    if settings.resource_check {
        let sample = SysinfoSampler::new().sample();
        writeln!(
            out,
            "Resources: CPU {:.0}%, memory {:.0}%, disk {:.0}%",
            sample.cpu_percent, sample.memory_percent, sample.disk_percent
        )?;
        for warning in evaluate(&sample, &settings.resource_thresholds) {
            writeln!(out, "  - {}", warning)?;
        }
    }

    writeln!(
        out,
        "Catalog: {} packages in {} categories",
        catalog.len(),
        catalog.categories().len()
    )?;

    Ok(if report.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FAILURE)
    })
}

fn validate_catalog(path: &Path) -> Result<ExitCode> {
    info!("Validating catalog file: {:?}", path);
    match Catalog::load_from_file(path) {
        Ok(catalog) => {
            println!(
                "✓ Catalog file is valid: {} packages in {} categories",
                catalog.len(),
                catalog.categories().len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("Catalog validation failed: {:#}", e);
            eprintln!("✗ Catalog validation failed: {:#}", e);
            Ok(ExitCode::from(EXIT_FAILURE))
        }
    }
}
