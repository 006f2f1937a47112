// Runner configuration: environment variables, optional YAML file and CLI overrides.

mod loader;
mod types;

pub use loader::{
    ConfigError, DB_PASSWORD, DB_URL_CEP, DB_USERNAME, DNE_PARAM, EnvIssue, LOADER_CONFIG,
    LOADER_GRACE_SECS, LOADER_PROGRAM, LOADER_REPORT_PATH, LOADER_SEARCH_PATH, LOADER_SHOW_HELP,
    LOADER_TIMEOUT_SECS, LOADER_WORKDIR, Overrides, load_file,
};
pub use types::{DatabaseTarget, RunnerConfig, Settings};
