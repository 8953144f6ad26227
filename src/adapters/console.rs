//! Line console: the remote command link.
//!
//! Each line read from the reader is one [`RemoteCommand`].  Receiving any
//! line counts as link activity for the comms fail-safe, even when the
//! line itself does not parse.
//!
//! The reader loop blocks, so in the binary it runs on its own thread with
//! an `Arc<Controller>`.  Tests drive [`serve_lines`] with an in-memory
//! reader.

use std::io::BufRead;

use log::{info, warn};

use crate::app::commands::RemoteCommand;
use crate::app::ports::{Clock, StoragePort};
use crate::app::service::Controller;
use crate::runtime::Shutdown;

/// Outcome counters for one console session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleStats {
    pub accepted: u32,
    pub rejected: u32,
}

/// Handle a single line.  Blank lines and `#` comments are ignored and do
/// not count as activity.
pub fn handle_line<S: StoragePort>(
    ctl: &Controller<S>,
    clock: &impl Clock,
    line: &str,
) -> Option<bool> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let now = clock.now();
    ctl.notify_remote_link_activity(now);

    let result = line
        .parse::<RemoteCommand>()
        .and_then(|cmd| ctl.handle_command(cmd, now));
    match result {
        Ok(()) => {
            info!("Console: '{}' applied", line);
            Some(true)
        }
        Err(e) => {
            warn!("Console: '{}' rejected: {}", line, e);
            Some(false)
        }
    }
}

/// Serve commands from `reader` until EOF, a read error, or shutdown.
pub fn serve_lines<S: StoragePort>(
    ctl: &Controller<S>,
    clock: &impl Clock,
    reader: impl BufRead,
    shutdown: &Shutdown,
) -> ConsoleStats {
    let mut stats = ConsoleStats::default();
    for line in reader.lines() {
        if shutdown.is_triggered() {
            break;
        }
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!("Console: read failed: {}", e);
                break;
            }
        };
        match handle_line(ctl, clock, &line) {
            Some(true) => stats.accepted += 1,
            Some(false) => stats.rejected += 1,
            None => {}
        }
    }
    info!(
        "Console closed ({} applied, {} rejected)",
        stats.accepted, stats.rejected
    );
    stats
}
