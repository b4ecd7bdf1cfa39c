//! Signal handling
//!
//! The first Ctrl-C asks the runner to stop after the package in progress.
//! From a terminal the install shell shares the foreground process group, so
//! that Ctrl-C also reaches the running package manager. On unix a second
//! Ctrl-C, or SIGTERM / SIGHUP at any time, tears down every registered child
//! and its descendants and exits with `128 + signal`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Grace period given to child processes on forced shutdown
#[cfg(unix)]
const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(3);

/// What a received signal should do, given whether a cancel is already pending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// Stop after the current package
    Cancel,
    /// Kill children and exit with this code
    Exit(i32),
}

/// Decide how to react to `signal`. Only an interrupt can be soft.
pub fn action_for(signal: i32, interrupt: i32, cancel_pending: bool) -> SignalAction {
    if signal == interrupt && !cancel_pending {
        SignalAction::Cancel
    } else {
        SignalAction::Exit(128 + signal)
    }
}

/// Install handlers that set `cancel` on the first interrupt
#[cfg(unix)]
pub fn install_handlers(cancel: Arc<AtomicBool>) -> Result<(), std::io::Error> {
    use crate::process_guard::ChildRegistry;
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;
    use std::thread;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    thread::spawn(move || {
        for sig in signals.forever() {
            let signal_name = match sig {
                SIGINT => "SIGINT",
                SIGTERM => "SIGTERM",
                SIGHUP => "SIGHUP",
                _ => "UNKNOWN",
            };

            match action_for(sig, SIGINT, cancel.load(Ordering::SeqCst)) {
                SignalAction::Cancel => {
                    warn!(
                        "Received {}, stopping after the current package (press Ctrl-C again to abort)",
                        signal_name
                    );
                    eprintln!("\nCancelling after the current package... press Ctrl-C again to abort");
                    cancel.store(true, Ordering::SeqCst);
                }
                SignalAction::Exit(code) => {
                    info!("Received {} signal, cleaning up...", signal_name);
                    if let Ok(mut registry) = ChildRegistry::global().lock() {
                        registry.terminate_all(SHUTDOWN_GRACE);
                    }
                    std::process::exit(code);
                }
            }
        }
    });

    Ok(())
}

/// Install a Ctrl-C handler that sets `cancel`
#[cfg(not(unix))]
pub fn install_handlers(cancel: Arc<AtomicBool>) -> Result<(), std::io::Error> {
    ctrlc::set_handler(move || {
        if cancel.swap(true, Ordering::SeqCst) {
            warn!("Received second Ctrl-C, exiting");
            std::process::exit(130);
        }
        info!("Received Ctrl-C, stopping after the current package");
    })
    .map_err(std::io::Error::other)
}
