//! command_executor.rs - Runs install commands through the host shell.
//!
//! Each invocation is a child process whose stdout and stderr are drained on
//! two reader threads while the calling thread waits for exit or for the
//! deadline. The result is always an explicit `ExecOutcome`; a command that
//! hangs becomes `TimedOut` instead of blocking the run forever. Output is
//! collected for at most `OUTPUT_GRACE` after the shell exits, so a forked
//! child that keeps the pipes open cannot hold the call either.
//!
//! The installer only depends on the `CommandExecutor` trait, so tests and
//! `--dry-run` substitute executors that never spawn anything.

use std::io::{ErrorKind, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[cfg(unix)]
use crate::process_guard::{ChildRegistry, CommandProcessGroup, GroupPlacement};
use crate::types::PlatformTag;

/// How often the waiting side polls the child for exit
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long output is still collected once the shell has exited
const OUTPUT_GRACE: Duration = Duration::from_secs(1);

/// Grace period between SIGTERM and SIGKILL for a timed-out command
#[cfg(unix)]
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Result of running one shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    /// The process exited. `code` is None when it was killed by a signal.
    Exited { code: Option<i32>, stderr: String },
    /// The process exceeded its deadline and was terminated
    TimedOut { after: Duration },
    /// The shell itself could not be started
    SpawnFailed(String),
}

impl ExecOutcome {
    /// Exit code zero
    pub fn success(&self) -> bool {
        matches!(self, Self::Exited { code: Some(0), .. })
    }

    /// Convenience constructor for a clean exit
    pub fn ok() -> Self {
        Self::Exited {
            code: Some(0),
            stderr: String::new(),
        }
    }

    /// Convenience constructor for a failed exit with stderr text
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self::Exited {
            code: Some(code),
            stderr: stderr.into(),
        }
    }

    /// One-line description of why the command did not succeed.
    /// Prefers captured stderr, falls back to the exit status.
    pub fn failure_text(&self) -> Option<String> {
        match self {
            Self::Exited { code: Some(0), .. } => None,
            Self::Exited { code, stderr } => {
                let stderr = stderr.trim();
                if !stderr.is_empty() {
                    Some(stderr.to_string())
                } else {
                    match code {
                        Some(code) => Some(format!("exited with code {}", code)),
                        None => Some("terminated by signal".to_string()),
                    }
                }
            }
            Self::TimedOut { after } => Some(format!("timed out after {}s", after.as_secs())),
            Self::SpawnFailed(e) => Some(format!("failed to start shell: {}", e)),
        }
    }
}

/// Executes a command string through the host shell
pub trait CommandExecutor: Send {
    /// Run `command` to completion or until `timeout` elapses
    fn execute(&mut self, command: &str, timeout: Option<Duration>) -> ExecOutcome;
}

/// Production executor: `sh -c` on unix, `cmd /C` on Windows
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    platform: PlatformTag,
    #[cfg(unix)]
    placement: GroupPlacement,
}

impl ShellExecutor {
    /// Executor for `platform`. On unix, shells share the terminal's
    /// foreground group when there is one, so `sudo` can prompt.
    pub fn new(platform: PlatformTag) -> Self {
        Self {
            platform,
            #[cfg(unix)]
            placement: GroupPlacement::detect(),
        }
    }

    #[cfg(unix)]
    pub fn with_placement(mut self, placement: GroupPlacement) -> Self {
        self.placement = placement;
        self
    }

    fn build_command(&self, command: &str) -> Command {
        let (shell, flag) = self.platform.shell();
        let mut cmd = Command::new(shell);
        cmd.arg(flag)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        cmd.placed(self.placement);

        cmd
    }
}

impl CommandExecutor for ShellExecutor {
    fn execute(&mut self, command: &str, timeout: Option<Duration>) -> ExecOutcome {
        info!("Executing: {}", command);

        let mut child = match self.build_command(command).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn shell for '{}': {}", command, e);
                return ExecOutcome::SpawnFailed(e.to_string());
            }
        };
        let pid = child.id();

        #[cfg(unix)]
        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.register(pid);
        }

        let stdout_reader = child.stdout.take().map(PipeReader::spawn);
        let stderr_reader = child.stderr.take().map(PipeReader::spawn);

        let outcome = wait_with_deadline(&mut child, timeout);

        #[cfg(unix)]
        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.unregister(pid);
        }

        let deadline = Instant::now() + OUTPUT_GRACE;
        let _ = PipeReader::collect(stdout_reader, deadline);
        let stderr = PipeReader::collect(stderr_reader, deadline);

        match outcome {
            WaitResult::Exited(code) => {
                debug!("Command exited with {:?} (pid {})", code, pid);
                ExecOutcome::Exited { code, stderr }
            }
            WaitResult::TimedOut(after) => {
                warn!("Command timed out after {:?} (pid {}): {}", after, pid, command);
                ExecOutcome::TimedOut { after }
            }
            WaitResult::WaitFailed(e) => ExecOutcome::Exited {
                code: None,
                stderr: format!("failed waiting for command: {}", e),
            },
        }
    }
}

enum WaitResult {
    Exited(Option<i32>),
    TimedOut(Duration),
    WaitFailed(std::io::Error),
}

fn wait_with_deadline(child: &mut Child, timeout: Option<Duration>) -> WaitResult {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return WaitResult::Exited(status.code()),
            Ok(None) => {}
            Err(e) => return WaitResult::WaitFailed(e),
        }

        if let Some(limit) = timeout {
            if start.elapsed() >= limit {
                kill_tree(child);
                let _ = child.wait();
                return WaitResult::TimedOut(limit);
            }
        }

        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    crate::process_guard::terminate_tree(child.id(), KILL_GRACE);
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!("Failed to kill timed-out command (pid {}): {}", child.id(), e);
    }
}

/// Output read from one pipe by a background thread
struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    /// Signalled when the pipe reaches EOF
    done: Receiver<()>,
}

impl PipeReader {
    fn spawn<R: Read + Send + 'static>(mut pipe: R) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let (tx, done) = mpsc::channel();

        thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Ok(mut buf) = sink.lock() {
                            buf.extend_from_slice(&chunk[..n]);
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => {}
                    Err(_) => break,
                }
            }
            let _ = tx.send(());
        });

        Self { buf, done }
    }

    /// Wait for EOF until `deadline`, then return whatever was read.
    /// A reader still blocked at the deadline is left to finish on its own.
    fn collect(reader: Option<Self>, deadline: Instant) -> String {
        let Some(reader) = reader else {
            return String::new();
        };
        let wait = deadline.saturating_duration_since(Instant::now());
        if reader.done.recv_timeout(wait).is_err() {
            debug!("Output pipe still held open by a background process");
        }
        reader
            .buf
            .lock()
            .map(|buf| String::from_utf8_lossy(&buf).into_owned())
            .unwrap_or_default()
    }
}

/// Logs commands instead of running them; every command "succeeds".
///
/// The list of commands it was asked to run is shared so the caller can
/// print a plan after the run.
#[derive(Debug, Clone, Default)]
pub struct DryRunExecutor {
    commands: Arc<Mutex<Vec<String>>>,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands received so far
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .map(|commands| commands.clone())
            .unwrap_or_default()
    }
}

impl CommandExecutor for DryRunExecutor {
    fn execute(&mut self, command: &str, _timeout: Option<Duration>) -> ExecOutcome {
        info!("[dry-run] would execute: {}", command);
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command.to_string());
        }
        ExecOutcome::ok()
    }
}
