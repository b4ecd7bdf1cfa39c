//! Process lifecycle management for install shells (unix)
//!
//! Install commands are tracked from spawn to exit so that a package manager
//! and everything it forks (dpkg, snapd helpers, curl) can be stopped as one
//! unit, either when a command exceeds its timeout or when zapinstall itself
//! is told to stop.
//!
//! - With a controlling terminal, shells stay in zapinstall's foreground
//!   process group so `sudo` can prompt on `/dev/tty`
//! - Without one, each shell leads its own process group
//! - Live child PIDs are tracked in a global registry
//! - Stopping a child snapshots its process tree, sends SIGTERM, and sends
//!   SIGKILL once the grace period ends

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, info, warn};

/// Global registry of child process IDs
static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Registry tracking all spawned child processes
#[derive(Debug, Default)]
pub struct ChildRegistry {
    /// Set of live install shell PIDs
    pids: HashSet<u32>,
    /// Whether cleanup has already been initiated (prevent double-cleanup)
    cleanup_initiated: bool,
}

impl ChildRegistry {
    /// Get or create the global child registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        debug!("Registered child process PID {}", pid);
    }

    /// Unregister a child process (called when it exits normally)
    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        debug!("Unregistered child process PID {}", pid);
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// Terminate every tracked child together with its descendants.
    /// Sends SIGTERM first, waits up to `grace_period`, then SIGKILL.
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if self.cleanup_initiated {
            debug!("Cleanup already initiated, skipping");
            return;
        }
        self.cleanup_initiated = true;

        if self.pids.is_empty() {
            debug!("No child processes to terminate");
            return;
        }

        info!("Terminating {} child process(es)...", self.pids.len());

        let trees: Vec<ProcessTree> = self.pids.iter().map(|&pid| ProcessTree::snapshot(pid)).collect();
        stop_trees(&trees, grace_period);

        self.pids.clear();
        info!("Child process cleanup complete");
    }
}

/// Stop `root` and every process descended from it.
///
/// The tree is captured before any signal is sent, so orphans that get
/// reparented once the shell dies are still reached. SIGKILL always follows
/// the grace period for anything still running.
///
/// Used by the executor when a command runs past its timeout.
pub fn terminate_tree(root: u32, grace_period: Duration) {
    let tree = ProcessTree::snapshot(root);
    debug!(
        "Terminating process tree of {}: {:?} (own group: {})",
        root, tree.pids, tree.own_group
    );
    stop_trees(std::slice::from_ref(&tree), grace_period);
}

fn stop_trees(trees: &[ProcessTree], grace_period: Duration) {
    for tree in trees {
        tree.signal(Signal::SIGTERM);
    }

    let start = Instant::now();
    while start.elapsed() < grace_period {
        if trees.iter().all(|tree| !tree.any_alive()) {
            debug!("Process tree(s) exited after SIGTERM");
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    // Reaches whatever ignored SIGTERM, and anything the group forked since
    for tree in trees {
        if tree.any_alive() {
            warn!("Process tree of {} did not terminate, sending SIGKILL", tree.root);
        }
        tree.signal(Signal::SIGKILL);
    }
}

/// A process and the descendants it had when the snapshot was taken
#[derive(Debug)]
struct ProcessTree {
    root: u32,
    /// `root` first, then descendants breadth first
    pids: Vec<u32>,
    /// `root` leads its own process group, which can be signalled as a whole
    own_group: bool,
}

impl ProcessTree {
    fn snapshot(root: u32) -> Self {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);

        let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
        for (pid, process) in system.processes() {
            if let Some(parent) = process.parent() {
                children.entry(parent.as_u32()).or_default().push(pid.as_u32());
            }
        }

        let mut pids = vec![root];
        let mut next = 0;
        while next < pids.len() {
            if let Some(kids) = children.get(&pids[next]) {
                pids.extend_from_slice(kids);
            }
            next += 1;
        }

        let own_group = nix::unistd::getpgid(Some(Pid::from_raw(root as i32)))
            .map(|pgid| pgid.as_raw() == root as i32)
            .unwrap_or(false);

        Self {
            root,
            pids,
            own_group,
        }
    }

    fn signal(&self, signal: Signal) {
        if self.own_group {
            if let Err(e) = send_signal_to_group(self.root, signal) {
                debug!("{:?} to process group {} failed: {}", signal, self.root, e);
            }
        }
        for &pid in &self.pids {
            let _ = send_signal(pid, signal);
        }
    }

    fn any_alive(&self) -> bool {
        self.pids.iter().any(|&pid| is_process_alive(pid))
    }
}

fn send_signal(pid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(pid as i32), signal)
}

/// Negative PID addresses the whole process group
fn send_signal_to_group(pgid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(-(pgid as i32)), signal)
}

/// Check if a process is still alive (not dead or zombie)
fn is_process_alive(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }

    // Field 3 of /proc/pid/stat is the state; Z and X are not "alive"
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        let fields: Vec<&str> = stat.split_whitespace().collect();
        if fields.len() > 2 {
            return !matches!(fields[2], "Z" | "X");
        }
    }

    // No /proc (macOS): trust kill(0)
    true
}

/// RAII guard that terminates all registered children on drop.
/// Held by `main` for the lifetime of the program.
pub struct ProcessGuard {
    registry: Arc<Mutex<ChildRegistry>>,
}

impl ProcessGuard {
    pub fn new() -> Self {
        Self {
            registry: ChildRegistry::global(),
        }
    }
}

impl Default for ProcessGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        debug!("ProcessGuard dropped, initiating cleanup");
        if let Ok(mut registry) = self.registry.lock() {
            registry.terminate_all(Duration::from_secs(5));
        }
    }
}

/// Where an install shell sits relative to the terminal's process groups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupPlacement {
    /// Share zapinstall's process group. A shell outside the terminal's
    /// foreground group is stopped by SIGTTOU/SIGTTIN as soon as `sudo`
    /// touches `/dev/tty` for its password prompt.
    Foreground,
    /// Lead a new process group
    Isolated,
}

impl GroupPlacement {
    /// Foreground when zapinstall has a controlling terminal
    pub fn detect() -> Self {
        let has_tty = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open("/dev/tty")
            .is_ok();
        let placement = if has_tty { Self::Foreground } else { Self::Isolated };
        debug!("Install shell placement: {:?}", placement);
        placement
    }
}

/// Extension trait for std::process::Command to set up process groups
pub trait CommandProcessGroup {
    /// Run the command as the leader of a new process group so the whole
    /// tree can be signalled with one `kill(-pgid)`.
    fn in_new_process_group(&mut self) -> &mut Self;

    /// Child gets SIGTERM if the spawning thread dies (Linux only)
    fn with_parent_death_signal(&mut self) -> &mut Self;

    fn placed(&mut self, placement: GroupPlacement) -> &mut Self {
        match placement {
            GroupPlacement::Foreground => self.with_parent_death_signal(),
            GroupPlacement::Isolated => self.in_new_process_group(),
        }
    }
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;

        // SAFETY: setpgid is async-signal-safe
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(std::io::Error::other)?;
                Ok(())
            });
        }
        self.with_parent_death_signal()
    }

    #[cfg(target_os = "linux")]
    fn with_parent_death_signal(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;

        // SAFETY: prctl is async-signal-safe
        unsafe {
            self.pre_exec(|| {
                if nix::libc::prctl(nix::libc::PR_SET_PDEATHSIG, nix::libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        self
    }

    #[cfg(not(target_os = "linux"))]
    fn with_parent_death_signal(&mut self) -> &mut Self {
        self
    }
}
