use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use super::engine::SIGTERM;

/// Cooperative cancellation token carrying the signal that caused it.
///
/// Zero means "not cancelled". The first signal recorded wins.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicI32>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel as if `SIGTERM` had been received. Idempotent.
    pub fn cancel(&self) {
        self.cancel_with(SIGTERM);
    }

    pub fn cancel_with(&self, signal: i32) {
        let signal = if signal > 0 { signal } else { SIGTERM };
        let _ = self
            .0
            .compare_exchange(0, signal, Ordering::AcqRel, Ordering::Acquire);
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal().is_some()
    }

    pub fn signal(&self) -> Option<i32> {
        match self.0.load(Ordering::Acquire) {
            0 => None,
            sig => Some(sig),
        }
    }
}

/// Describes one loader invocation. `program` is executed directly with
/// `args`; no shell is involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderCommand {
    pub program: String,
    pub args: Vec<String>,
    pub work_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub grace_period: Duration,
}

impl LoaderCommand {
    /// Shell-quoted rendering of the full command line.
    pub fn command_line(&self) -> String {
        shell_words::join(std::iter::once(&self.program).chain(&self.args))
    }
}

/// Outcome of a supervised process.
#[derive(Debug, Clone, Default)]
pub struct ProcessResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// Signal that terminated the child, if any.
    pub signal: Option<i32>,
    pub log: String,
    pub cancelled: bool,
    pub timed_out: bool,
    pub elapsed: Duration,
}

/// Streamed output from a running loader.
#[derive(Debug)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
    Done(ProcessResult),
}
