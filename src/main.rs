use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use edne_runner::config::{Overrides, Settings};
use edne_runner::invocation::{self, InvocationEvent, Stream, commands};
use edne_runner::loader::CancelToken;
use edne_runner::signals::{self, SignalWatcher};
use edne_runner::{database_url, exit, logging};

/// Run `edne-correios-loader load` against the PostgreSQL database described
/// by `DB_USERNAME`, `DB_PASSWORD`, `DB_URL_CEP` and `DNE_PARAM`.
#[derive(Debug, Parser)]
#[command(name = "edne-runner", version, about)]
struct Cli {
    /// YAML file with runner options (overrides `LOADER_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Do not run `load --help` before loading.
    #[arg(long)]
    skip_help: bool,

    /// Load timeout in seconds, 0 disables it.
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Write a JSON run report to this path.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Print the load command (password masked) and exit.
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init() {
        eprintln!("{e:#}");
    }

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            exit::FAILURE
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let overrides = Overrides {
        config_path: cli.config,
        skip_help: cli.skip_help,
        timeout_secs: cli.timeout_secs,
        report_path: cli.report,
    };

    let settings = match Settings::load(&overrides) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("{:#}", anyhow::Error::from(e));
            return Ok(exit::CONFIG_ERROR);
        }
    };

    if cli.dry_run {
        let url = database_url::compose(&settings.target, &settings.runner.search_path);
        let cmd = commands::load_command(&settings, &url)?;
        println!("{}", commands::display_line(&cmd, &url));
        return Ok(exit::SUCCESS);
    }

    signals::install().context("failed to install signal handlers")?;
    let cancel = CancelToken::new();
    let _watcher = SignalWatcher::spawn(cancel.clone());

    tracing::info!(
        program = %settings.runner.program,
        tables = %settings.tables,
        work_dir = %settings.runner.work_dir.display(),
        timeout_secs = settings.runner.timeout_secs,
        "starting DNE load"
    );

    let report_path = settings.runner.report_path.clone();
    let rx = invocation::run_invocation(settings, cancel);

    let mut exit_code = exit::FAILURE;
    for event in rx {
        match event {
            InvocationEvent::StepStarted { step, command_line } => {
                tracing::info!(step = step.as_str(), command = %command_line, "running loader");
            }
            InvocationEvent::Log { stream, line, .. } => match stream {
                Stream::Stdout => {
                    let _ = writeln!(std::io::stdout().lock(), "{line}");
                }
                Stream::Stderr => {
                    let _ = writeln!(std::io::stderr().lock(), "{line}");
                }
            },
            InvocationEvent::StepFinished { step, report } => {
                tracing::debug!(step = step.as_str(), status = ?report.status, "step finished");
            }
            InvocationEvent::Completed(report) => {
                exit_code = report.exit_code;
                if let Some(path) = &report_path
                    && let Err(e) = report.write_to(path)
                {
                    tracing::warn!("{e:#}");
                }
                break;
            }
        }
    }

    Ok(exit_code)
}
