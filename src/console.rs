//! Terminal presentation
//!
//! Checklist rendering, the interactive selection loop, prompts, and
//! rendering of runner events. Everything writes to a generic `Write` and
//! reads from a generic `BufRead` so it can be driven from tests.

use std::io::{self, BufRead, Write};
use tracing::warn;

use crate::catalog::Catalog;
use crate::installer::{RunEvent, RunSummary};
use crate::resources::ResourceWarning;
use crate::sanity::install_hint;
use crate::selection::SelectionState;
use crate::workflow::{Notification, Operator};

const PROGRESS_WIDTH: usize = 20;

/// Operator backed by a terminal
pub struct ConsoleOperator<R, W> {
    input: R,
    output: W,
    /// Continue past resource warnings without asking
    auto_yes: bool,
}

impl<R: BufRead, W: Write> ConsoleOperator<R, W> {
    pub fn new(input: R, output: W, auto_yes: bool) -> Self {
        Self {
            input,
            output,
            auto_yes,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn ask_yes_no(&mut self, question: &str) -> io::Result<bool> {
        write!(self.output, "{} [y/N] ", question)?;
        self.output.flush()?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            return Ok(false);
        }
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }
}

impl ConsoleOperator<io::StdinLock<'static>, io::Stdout> {
    /// Operator on the process's stdin and stdout
    pub fn stdio(auto_yes: bool) -> Self {
        Self::new(io::stdin().lock(), io::stdout(), auto_yes)
    }
}

impl<R: BufRead, W: Write> Operator for ConsoleOperator<R, W> {
    fn confirm_resource_warnings(&mut self, warnings: &[ResourceWarning]) -> bool {
        let _ = writeln!(self.output, "The following issues were detected:");
        for warning in warnings {
            let _ = writeln!(self.output, "  - {}", warning);
        }

        if self.auto_yes {
            let _ = writeln!(self.output, "Continuing anyway (--yes)");
            return true;
        }

        match self.ask_yes_no("Do you want to continue anyway?") {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Failed to read confirmation: {}", e);
                false
            }
        }
    }

    fn notify(&mut self, notification: Notification) {
        let message = match notification {
            Notification::NothingSelected => "Please select software to install".to_string(),
            Notification::EnvironmentUnavailable(message) => format!("Error: {}", message),
            Notification::Declined => "Installation cancelled".to_string(),
        };
        let _ = writeln!(self.output, "{}", message);
    }
}

/// Print the catalog as a numbered checklist, grouped by category
pub fn render_checklist<W: Write>(
    catalog: &Catalog,
    selection: &SelectionState,
    out: &mut W,
) -> io::Result<()> {
    let mut number = 0;
    for category in catalog.categories() {
        writeln!(out, "\n{}", category.name)?;
        for package in &category.packages {
            number += 1;
            let mark = if selection.is_selected(&package.name) { 'x' } else { ' ' };
            writeln!(out, "  [{}] {:>2}. {}", mark, number, package.name)?;
        }
    }
    Ok(())
}

/// What the operator chose to do at the end of the checklist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecklistAction {
    Install,
    Quit,
}

/// Apply one line of checklist input to `selection`.
///
/// The line is tried as a whole package name first (names contain spaces),
/// then as comma or space separated numbers and names. Returns the tokens
/// that matched nothing.
pub fn apply_input(catalog: &Catalog, selection: &mut SelectionState, line: &str) -> Vec<String> {
    let line = line.trim();
    match line.to_lowercase().as_str() {
        "all" => {
            selection.select_all();
            return Vec::new();
        }
        "none" => {
            selection.deselect_all();
            return Vec::new();
        }
        _ => {}
    }

    if let Some(name) = catalog.find_name(line) {
        let _ = selection.toggle(name);
        return Vec::new();
    }

    let mut unknown = Vec::new();
    for token in line.split([',', ' ']).filter(|t| !t.is_empty()) {
        let name = match token.parse::<usize>() {
            Ok(n) if n >= 1 => selection.names().get(n - 1).cloned(),
            Ok(_) => None,
            Err(_) => catalog.find_name(token).map(str::to_string),
        };
        match name {
            Some(name) => {
                let _ = selection.toggle(&name);
            }
            None => unknown.push(token.to_string()),
        }
    }
    unknown
}

/// Interactive checklist loop. Ends on an empty line (install) or `q` / EOF.
pub fn interactive_select<R: BufRead, W: Write>(
    catalog: &Catalog,
    selection: &mut SelectionState,
    input: &mut R,
    out: &mut W,
) -> io::Result<ChecklistAction> {
    loop {
        render_checklist(catalog, selection, out)?;
        write!(
            out,
            "\n{} selected. Toggle by number or name, 'all', 'none', Enter to install, 'q' to quit: ",
            selection.selected_count()
        )?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(ChecklistAction::Quit);
        }

        match line.trim() {
            "" => return Ok(ChecklistAction::Install),
            "q" | "quit" => return Ok(ChecklistAction::Quit),
            other => {
                for token in apply_input(catalog, selection, other) {
                    writeln!(out, "Unknown package: {}", token)?;
                }
            }
        }
    }
}

/// Render a progress bar like `[##########----------]  50%`
pub fn progress_bar(percent: u8) -> String {
    let percent = percent.min(100) as usize;
    let filled = percent * PROGRESS_WIDTH / 100;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        "-".repeat(PROGRESS_WIDTH - filled),
        percent
    )
}

/// Print one runner event
pub fn render_event<W: Write>(event: &RunEvent, out: &mut W) -> io::Result<()> {
    match event {
        RunEvent::Log(line) => writeln!(out, "{}", line),
        RunEvent::Progress(percent) => writeln!(out, "{}", progress_bar(*percent)),
        RunEvent::Stage(_)
        | RunEvent::PackageStarted(_)
        | RunEvent::PackageFinished(_)
        | RunEvent::Complete(_) => Ok(()),
    }
}

/// Closing message for a finished run
pub fn print_summary<W: Write>(summary: &RunSummary, out: &mut W) -> io::Result<()> {
    writeln!(out)?;
    if summary.is_full_success() {
        writeln!(out, "Installation complete!")?;
        return Ok(());
    }

    if summary.cancelled {
        writeln!(
            out,
            "Installation cancelled: {} skipped",
            summary.skipped.len()
        )?;
    }
    if !summary.failed.is_empty() {
        writeln!(
            out,
            "Installation finished with errors. Failed: {}",
            summary.failed_names().join(", ")
        )?;
    }
    Ok(())
}

/// Explain a missing package manager and where to get it
pub fn print_environment_error<W: Write>(manager: &str, out: &mut W) -> io::Result<()> {
    if let Some(hint) = install_hint(manager) {
        writeln!(out, "  {}", hint)?;
    }
    writeln!(out, "No packages were installed.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Category, PackageEntry};
    use std::io::Cursor;

    fn catalog() -> Catalog {
        Catalog::from_categories(vec![
            Category::new(
                "Development",
                vec![
                    PackageEntry::new("Git", "w", "l", "m"),
                    PackageEntry::new("Visual Studio Code", "w", "l", "m"),
                ],
            ),
            Category::new("Browsers", vec![PackageEntry::new("Firefox", "w", "l", "m")]),
        ])
        .unwrap()
    }

    #[test]
    fn test_checklist_numbers_across_categories() {
        let catalog = catalog();
        let mut selection = SelectionState::new(&catalog);
        selection.select("Firefox").unwrap();

        let mut out = Vec::new();
        render_checklist(&catalog, &selection, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Development\n  [ ]  1. Git\n  [ ]  2. Visual Studio Code"));
        assert!(text.contains("Browsers\n  [x]  3. Firefox"));
    }

    #[test]
    fn test_apply_input_numbers_and_names() {
        let catalog = catalog();
        let mut selection = SelectionState::new(&catalog);

        assert!(apply_input(&catalog, &mut selection, "1, 3").is_empty());
        assert_eq!(selection.snapshot(), vec!["Git", "Firefox"]);

        assert!(apply_input(&catalog, &mut selection, "visual studio code").is_empty());
        assert!(selection.is_selected("Visual Studio Code"));

        assert!(apply_input(&catalog, &mut selection, "git").is_empty());
        assert!(!selection.is_selected("Git"));
    }

    #[test]
    fn test_apply_input_reports_unknown_tokens() {
        let catalog = catalog();
        let mut selection = SelectionState::new(&catalog);

        let unknown = apply_input(&catalog, &mut selection, "2 vim 9 0");
        assert_eq!(unknown, vec!["vim", "9", "0"]);
        assert_eq!(selection.snapshot(), vec!["Visual Studio Code"]);
    }

    #[test]
    fn test_apply_input_all_and_none() {
        let catalog = catalog();
        let mut selection = SelectionState::new(&catalog);

        apply_input(&catalog, &mut selection, "ALL");
        assert_eq!(selection.selected_count(), 3);
        apply_input(&catalog, &mut selection, "none");
        assert_eq!(selection.selected_count(), 0);
    }

    #[test]
    fn test_interactive_select_until_enter() {
        let catalog = catalog();
        let mut selection = SelectionState::new(&catalog);
        let mut input = Cursor::new("3\nemacs\n\n");
        let mut out = Vec::new();

        let action = interactive_select(&catalog, &mut selection, &mut input, &mut out).unwrap();

        assert_eq!(action, ChecklistAction::Install);
        assert_eq!(selection.snapshot(), vec!["Firefox"]);
        assert!(String::from_utf8(out).unwrap().contains("Unknown package: emacs"));
    }

    #[test]
    fn test_interactive_select_quit_and_eof() {
        let catalog = catalog();
        let mut selection = SelectionState::new(&catalog);
        let mut out = Vec::new();

        let mut input = Cursor::new("q\n");
        assert_eq!(
            interactive_select(&catalog, &mut selection, &mut input, &mut out).unwrap(),
            ChecklistAction::Quit
        );

        let mut input = Cursor::new("1\n");
        assert_eq!(
            interactive_select(&catalog, &mut selection, &mut input, &mut out).unwrap(),
            ChecklistAction::Quit
        );
    }

    #[test]
    fn test_operator_prompt_answers() {
        let warnings = [ResourceWarning::LowDisk(95.0)];

        let mut yes = ConsoleOperator::new(Cursor::new("y\n"), Vec::new(), false);
        assert!(yes.confirm_resource_warnings(&warnings));
        let text = String::from_utf8(yes.into_output()).unwrap();
        assert!(text.contains("Low disk space (95% used)"));

        let mut no = ConsoleOperator::new(Cursor::new("\n"), Vec::new(), false);
        assert!(!no.confirm_resource_warnings(&warnings));

        let mut eof = ConsoleOperator::new(Cursor::new(""), Vec::new(), false);
        assert!(!eof.confirm_resource_warnings(&warnings));
    }

    #[test]
    fn test_operator_auto_yes_does_not_read_input() {
        let mut op = ConsoleOperator::new(Cursor::new("n\n"), Vec::new(), true);
        assert!(op.confirm_resource_warnings(&[ResourceWarning::HighCpu(90.0)]));
    }

    #[test]
    fn test_notifications() {
        let mut op = ConsoleOperator::new(Cursor::new(""), Vec::new(), false);
        op.notify(Notification::NothingSelected);
        op.notify(Notification::EnvironmentUnavailable("APT package manager not found.".into()));
        let text = String::from_utf8(op.into_output()).unwrap();
        assert_eq!(
            text,
            "Please select software to install\nError: APT package manager not found.\n"
        );
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0), "[--------------------]   0%");
        assert_eq!(progress_bar(50), "[##########----------]  50%");
        assert_eq!(progress_bar(100), "[####################] 100%");
    }

    #[test]
    fn test_summary_lists_failures() {
        let summary = RunSummary {
            succeeded: vec!["Git".into()],
            failed: vec!["Firefox".into(), "Zoom".into()],
            ..Default::default()
        };
        let mut out = Vec::new();
        print_summary(&summary, &mut out).unwrap();
        assert!(String::from_utf8(out)
            .unwrap()
            .contains("Failed: Firefox, Zoom"));
    }

    #[test]
    fn test_environment_error_hint() {
        let mut out = Vec::new();
        print_environment_error("brew", &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "  See https://brew.sh\nNo packages were installed.\n"
        );
    }
}
