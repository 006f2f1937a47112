use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus};

use anyhow::{Context, Result};
#[cfg(unix)]
use nix::sys::signal::{Signal, kill};
#[cfg(unix)]
use nix::unistd::Pid;

#[cfg(unix)]
pub const SIGTERM: i32 = Signal::SIGTERM as i32;
#[cfg(not(unix))]
pub const SIGTERM: i32 = 15;

#[cfg(unix)]
pub const SIGKILL: i32 = Signal::SIGKILL as i32;
#[cfg(not(unix))]
pub const SIGKILL: i32 = 9;

/// Resolve the loader executable on `PATH` (absolute paths pass through).
pub fn ensure_available(program: &str) -> Result<PathBuf> {
    which::which(program).with_context(|| {
        format!("loader `{program}` not found. Is it installed and on PATH?")
    })
}

/// Put the child in its own process group so signals reach the loader
/// and anything it forks.
pub fn isolate(command: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    #[cfg(not(unix))]
    {
        let _ = command;
    }
}

/// Deliver `signal` to the child's process group.
pub fn signal_group(child: &mut Child, signal: i32) {
    #[cfg(unix)]
    signal_pgid(child.id(), signal);

    #[cfg(not(unix))]
    {
        let _ = signal;
        let _ = child.kill();
    }
}

/// Deliver `signal` to the process group `pgid`, which outlives its leader
/// as long as any member is alive. Returns `false` when nothing was signalled.
pub fn signal_pgid(pgid: u32, signal: i32) -> bool {
    #[cfg(unix)]
    {
        let (Ok(pgid), Ok(signal)) = (i32::try_from(pgid), Signal::try_from(signal)) else {
            return false;
        };
        kill(Pid::from_raw(-pgid), signal).is_ok()
    }

    #[cfg(not(unix))]
    {
        let _ = (pgid, signal);
        false
    }
}

/// Forcefully terminate the child's process group.
pub fn kill_group(child: &mut Child) {
    signal_group(child, SIGKILL);
    let _ = child.kill();
}

/// Signal number that ended the process, if it died from one.
pub fn termination_signal(status: &ExitStatus) -> Option<i32> {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    }

    #[cfg(not(unix))]
    {
        let _ = status;
        None
    }
}
