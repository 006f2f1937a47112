use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::database_url::DatabaseUrl;
use crate::loader::ProcessResult;

/// Summary of one runner execution, optionally written as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub program: String,
    pub tables: String,
    /// Password replaced by `***`.
    pub database_url: String,
    pub help: Option<StepReport>,
    pub load: Option<StepReport>,
    pub exit_code: i32,
    pub finished_at_unix: u64,
}

impl RunReport {
    pub fn new(settings: &Settings, url: &DatabaseUrl) -> Self {
        Self {
            program: settings.runner.program.clone(),
            tables: settings.tables.clone(),
            database_url: url.redacted().to_string(),
            help: None,
            load: None,
            exit_code: 0,
            finished_at_unix: 0,
        }
    }

    pub fn finish(&mut self, exit_code: i32) {
        self.exit_code = exit_code;
        self.finished_at_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialise run report")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write run report to {}", path.display()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pass,
    Fail,
    Timeout,
    Cancelled,
    /// The process could not be started.
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub status: StepStatus,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub duration_ms: u64,
    pub log: String,
}

impl StepReport {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Error,
            exit_code: None,
            signal: None,
            duration_ms: 0,
            log: message.into(),
        }
    }
}

impl From<ProcessResult> for StepReport {
    fn from(result: ProcessResult) -> Self {
        let status = if result.timed_out {
            StepStatus::Timeout
        } else if result.cancelled {
            StepStatus::Cancelled
        } else if result.success {
            StepStatus::Pass
        } else {
            StepStatus::Fail
        };
        Self {
            status,
            exit_code: result.exit_code,
            signal: result.signal,
            duration_ms: u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
            log: result.log,
        }
    }
}

/// Which loader invocation is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Help,
    Load,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Help => "help",
            Step::Load => "load",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Events emitted by the invocation orchestrator. The last one is always
/// `Completed`.
#[derive(Debug)]
pub enum InvocationEvent {
    StepStarted { step: Step, command_line: String },
    Log { step: Step, stream: Stream, line: String },
    StepFinished { step: Step, report: StepReport },
    Completed(RunReport),
}
