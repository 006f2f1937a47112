//! Process exit statuses of the runner.
//!
//! The loader's own exit code is propagated verbatim; the other values
//! follow the conventions of `timeout(1)`, shells and `sysexits.h`.

use crate::invocation::{StepReport, StepStatus};
use crate::loader::SIGTERM;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TIMED_OUT: i32 = 124;
pub const NOT_FOUND: i32 = 127;
/// `EX_CONFIG`
pub const CONFIG_ERROR: i32 = 78;

/// Shell convention for "terminated by signal".
pub fn from_signal(signal: i32) -> i32 {
    128 + signal
}

/// Status for a finished load step. `cancel_signal` is the signal that
/// cancelled the run, if any.
pub fn for_step(report: &StepReport, cancel_signal: Option<i32>) -> i32 {
    match report.status {
        StepStatus::Timeout => TIMED_OUT,
        StepStatus::Cancelled => from_signal(cancel_signal.unwrap_or(SIGTERM)),
        StepStatus::Error => NOT_FOUND,
        StepStatus::Pass | StepStatus::Fail => report
            .exit_code
            .or_else(|| report.signal.map(from_signal))
            .unwrap_or(FAILURE),
    }
}
