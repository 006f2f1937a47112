use std::sync::mpsc::{self, Receiver, Sender};

use crate::config::Settings;
use crate::database_url;
use crate::exit;
use crate::loader::{self, CancelToken, LoaderCommand, OutputLine};

use super::commands::{display_line, help_command, load_command, program_words};
use super::types::{InvocationEvent, RunReport, Step, StepReport, StepStatus, Stream};

/// Launch the help and load steps on a background thread.
///
/// Returns a receiver that streams `InvocationEvent` values. The final
/// event is always `Completed`, carrying the exit status to use.
pub fn run_invocation(settings: Settings, cancel: CancelToken) -> Receiver<InvocationEvent> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let report = run_inner(&settings, &cancel, &tx);
        let _ = tx.send(InvocationEvent::Completed(report));
    });
    rx
}

fn run_inner(settings: &Settings, cancel: &CancelToken, tx: &Sender<InvocationEvent>) -> RunReport {
    let url = database_url::compose(&settings.target, &settings.runner.search_path);
    let mut report = RunReport::new(settings, &url);

    // ── Pre-flight ───────────────────────────────────────────────────
    let available = program_words(&settings.runner)
        .and_then(|(program, _)| loader::ensure_available(&program));
    if let Err(e) = available {
        tracing::error!(error = %format!("{e:#}"), "loader unavailable");
        report.load = Some(StepReport::error(format!("{e:#}")));
        report.finish(exit::NOT_FOUND);
        return report;
    }

    // ── Help (diagnostic only) ───────────────────────────────────────
    if settings.runner.show_help {
        let help = match help_command(&settings.runner) {
            Ok(cmd) => {
                let line = cmd.command_line();
                run_step(Step::Help, cmd, line, cancel, tx)
            }
            Err(e) => StepReport::error(format!("{e:#}")),
        };
        if help.status != StepStatus::Pass {
            tracing::warn!(status = ?help.status, exit_code = ?help.exit_code, "help step did not succeed, continuing");
        }
        report.help = Some(help);
    }

    if let Some(signal) = cancel.signal() {
        tracing::info!(signal, "cancelled before load step");
        report.finish(exit::from_signal(signal));
        return report;
    }

    // ── Load ─────────────────────────────────────────────────────────
    let load = match load_command(settings, &url) {
        Ok(cmd) => {
            let line = display_line(&cmd, &url);
            run_step(Step::Load, cmd, line, cancel, tx)
        }
        Err(e) => StepReport::error(format!("{e:#}")),
    };

    let exit_code = exit::for_step(&load, cancel.signal());
    tracing::info!(
        status = ?load.status,
        exit_code,
        duration_ms = load.duration_ms,
        tables = %settings.tables,
        "load step finished"
    );
    report.load = Some(load);
    report.finish(exit_code);
    report
}

/// Run one loader process to completion, forwarding its output as
/// `InvocationEvent::Log`.
fn run_step(
    step: Step,
    cmd: LoaderCommand,
    command_line: String,
    cancel: &CancelToken,
    tx: &Sender<InvocationEvent>,
) -> StepReport {
    let _ = tx.send(InvocationEvent::StepStarted { step, command_line });

    let report = match loader::spawn(cmd, cancel.clone()) {
        Ok(rx) => drain(step, rx, tx),
        Err(e) => StepReport::error(format!("{e:#}")),
    };

    let _ = tx.send(InvocationEvent::StepFinished {
        step,
        report: report.clone(),
    });
    report
}

fn drain(step: Step, rx: Receiver<OutputLine>, tx: &Sender<InvocationEvent>) -> StepReport {
    for line in rx {
        match line {
            OutputLine::Stdout(line) => {
                let _ = tx.send(InvocationEvent::Log {
                    step,
                    stream: Stream::Stdout,
                    line,
                });
            }
            OutputLine::Stderr(line) => {
                let _ = tx.send(InvocationEvent::Log {
                    step,
                    stream: Stream::Stderr,
                    line,
                });
            }
            OutputLine::Done(result) => return StepReport::from(result),
        }
    }
    StepReport::error("loader supervisor exited without a result")
}
