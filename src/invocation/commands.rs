use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::config::{RunnerConfig, Settings};
use crate::database_url::DatabaseUrl;
use crate::loader::LoaderCommand;

pub const LOAD_SUBCOMMAND: &str = "load";
pub const DATABASE_URL_FLAG: &str = "--database-url";
pub const TABLES_FLAG: &str = "--tables";

const HELP_TIMEOUT: Duration = Duration::from_secs(60);

/// Split the configured loader command line into program and leading args.
pub fn program_words(runner: &RunnerConfig) -> Result<(String, Vec<String>)> {
    let mut words = shell_words::split(&runner.program)
        .with_context(|| format!("cannot parse loader command {:?}", runner.program))?;
    if words.is_empty() {
        bail!("loader command is empty");
    }
    let program = words.remove(0);
    Ok((program, words))
}

/// `<loader> load --help`, bounded by a short timeout.
pub fn help_command(runner: &RunnerConfig) -> Result<LoaderCommand> {
    let (program, mut args) = program_words(runner)?;
    args.extend([LOAD_SUBCOMMAND.to_string(), "--help".to_string()]);

    let timeout = match runner.timeout() {
        Some(t) => t.min(HELP_TIMEOUT),
        None => HELP_TIMEOUT,
    };

    Ok(LoaderCommand {
        program,
        args,
        work_dir: Some(runner.work_dir.clone()),
        timeout: Some(timeout),
        grace_period: runner.grace_period(),
    })
}

/// `<loader> load --database-url <url> --tables <DNE_PARAM>`.
pub fn load_command(settings: &Settings, url: &DatabaseUrl) -> Result<LoaderCommand> {
    let runner = &settings.runner;
    let (program, mut args) = program_words(runner)?;
    args.extend([
        LOAD_SUBCOMMAND.to_string(),
        DATABASE_URL_FLAG.to_string(),
        url.expose().to_string(),
        TABLES_FLAG.to_string(),
        settings.tables.clone(),
    ]);

    Ok(LoaderCommand {
        program,
        args,
        work_dir: Some(runner.work_dir.clone()),
        timeout: runner.timeout(),
        grace_period: runner.grace_period(),
    })
}

/// Shell-quoted command line safe to log: the URL password is masked.
pub fn display_line(cmd: &LoaderCommand, url: &DatabaseUrl) -> String {
    let args = cmd.args.iter().map(|arg| {
        if arg == url.expose() {
            url.redacted()
        } else {
            arg.as_str()
        }
    });
    shell_words::join(std::iter::once(cmd.program.as_str()).chain(args))
}
