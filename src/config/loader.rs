use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::types::{DatabaseTarget, RunnerConfig, Settings};

pub const DB_USERNAME: &str = "DB_USERNAME";
pub const DB_PASSWORD: &str = "DB_PASSWORD";
pub const DB_URL_CEP: &str = "DB_URL_CEP";
pub const DNE_PARAM: &str = "DNE_PARAM";

pub const LOADER_CONFIG: &str = "LOADER_CONFIG";
pub const LOADER_PROGRAM: &str = "LOADER_PROGRAM";
pub const LOADER_WORKDIR: &str = "LOADER_WORKDIR";
pub const LOADER_SEARCH_PATH: &str = "LOADER_SEARCH_PATH";
pub const LOADER_SHOW_HELP: &str = "LOADER_SHOW_HELP";
pub const LOADER_TIMEOUT_SECS: &str = "LOADER_TIMEOUT_SECS";
pub const LOADER_GRACE_SECS: &str = "LOADER_GRACE_SECS";
pub const LOADER_REPORT_PATH: &str = "LOADER_REPORT_PATH";

/// A single problem found while loading the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvIssue {
    Missing(&'static str),
    Blank(&'static str),
    Invalid { key: &'static str, reason: String },
}

impl EnvIssue {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Missing(key) | Self::Blank(key) | Self::Invalid { key, .. } => key,
        }
    }
}

impl fmt::Display for EnvIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(key) => write!(f, "{key} is not set"),
            Self::Blank(key) => write!(f, "{key} is blank"),
            Self::Invalid { key, reason } => write!(f, "{key} {reason}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {}", join_issues(.0))]
    Env(Vec<EnvIssue>),
    #[error("failed to read config file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ConfigError {
    /// Issues reported for the environment, empty for file errors.
    pub fn issues(&self) -> &[EnvIssue] {
        match self {
            Self::Env(issues) => issues,
            _ => &[],
        }
    }
}

fn join_issues(issues: &[EnvIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Command-line values that take precedence over file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub skip_help: bool,
    pub timeout_secs: Option<u64>,
    pub report_path: Option<PathBuf>,
}

/// Read a YAML runner config file. Missing keys fall back to defaults.
pub fn load_file(path: &Path) -> Result<RunnerConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(RunnerConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl Settings {
    /// Load settings from the process environment.
    pub fn load(overrides: &Overrides) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), overrides)
    }

    /// Load settings through `lookup` instead of the process environment.
    ///
    /// Layering is defaults, then the YAML file, then `LOADER_*`
    /// variables, then `overrides`. Every invalid or missing key is
    /// collected before returning, so one error names all of them.
    pub fn from_lookup<F>(lookup: F, overrides: &Overrides) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_path = overrides
            .config_path
            .clone()
            .or_else(|| optional(&lookup, LOADER_CONFIG).map(PathBuf::from));
        let mut issues = Vec::new();
        let mut runner = match config_path.as_deref().map(load_file) {
            Some(Ok(runner)) => runner,
            Some(Err(e)) => {
                issues.push(EnvIssue::Invalid {
                    key: LOADER_CONFIG,
                    reason: describe_file_error(&e),
                });
                RunnerConfig::default()
            }
            None => RunnerConfig::default(),
        };

        apply_env(&mut runner, &lookup, &mut issues);
        apply_overrides(&mut runner, overrides);
        validate_runner(&runner, &mut issues);

        let username = required(&lookup, DB_USERNAME, false, &mut issues);
        let password = required(&lookup, DB_PASSWORD, true, &mut issues);
        let host_path = required(&lookup, DB_URL_CEP, false, &mut issues);
        let tables = required(&lookup, DNE_PARAM, false, &mut issues);

        if let Some(host_path) = &host_path
            && let Some(reason) = host_path_problem(host_path)
        {
            issues.push(EnvIssue::Invalid {
                key: DB_URL_CEP,
                reason: reason.to_string(),
            });
        }

        match (username, password, host_path, tables) {
            (Some(username), Some(password), Some(host_path), Some(tables)) if issues.is_empty() => {
                Ok(Settings {
                    target: DatabaseTarget {
                        username,
                        password,
                        host_path,
                    },
                    tables,
                    runner,
                })
            }
            _ => Err(ConfigError::Env(issues)),
        }
    }
}

/// `"could not be loaded: <error>: <cause>"`, for reporting as an issue.
fn describe_file_error(err: &ConfigError) -> String {
    let mut reason = format!("could not be loaded: {err}");
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        reason.push_str(": ");
        reason.push_str(&cause.to_string());
        source = cause.source();
    }
    reason
}

/// Empty values count as unset for optional keys.
fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn required<F>(
    lookup: &F,
    key: &'static str,
    allow_empty: bool,
    issues: &mut Vec<EnvIssue>,
) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => {
            issues.push(EnvIssue::Missing(key));
            None
        }
        Some(value) if !allow_empty && value.trim().is_empty() => {
            issues.push(EnvIssue::Blank(key));
            None
        }
        Some(value) => Some(value),
    }
}

fn apply_env<F>(runner: &mut RunnerConfig, lookup: &F, issues: &mut Vec<EnvIssue>)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(program) = optional(lookup, LOADER_PROGRAM) {
        runner.program = program;
    }
    if let Some(dir) = optional(lookup, LOADER_WORKDIR) {
        runner.work_dir = PathBuf::from(dir);
    }
    if let Some(search_path) = optional(lookup, LOADER_SEARCH_PATH) {
        runner.search_path = search_path;
    }
    if let Some(raw) = optional(lookup, LOADER_SHOW_HELP) {
        match parse_bool(&raw) {
            Some(flag) => runner.show_help = flag,
            None => issues.push(EnvIssue::Invalid {
                key: LOADER_SHOW_HELP,
                reason: format!("must be a boolean, got {raw:?}"),
            }),
        }
    }
    if let Some(raw) = optional(lookup, LOADER_TIMEOUT_SECS) {
        match raw.trim().parse() {
            Ok(secs) => runner.timeout_secs = secs,
            Err(_) => issues.push(EnvIssue::Invalid {
                key: LOADER_TIMEOUT_SECS,
                reason: format!("must be a whole number of seconds, got {raw:?}"),
            }),
        }
    }
    if let Some(raw) = optional(lookup, LOADER_GRACE_SECS) {
        match raw.trim().parse() {
            Ok(secs) => runner.grace_secs = secs,
            Err(_) => issues.push(EnvIssue::Invalid {
                key: LOADER_GRACE_SECS,
                reason: format!("must be a whole number of seconds, got {raw:?}"),
            }),
        }
    }
    if let Some(path) = optional(lookup, LOADER_REPORT_PATH) {
        runner.report_path = Some(PathBuf::from(path));
    }
}

fn apply_overrides(runner: &mut RunnerConfig, overrides: &Overrides) {
    if overrides.skip_help {
        runner.show_help = false;
    }
    if let Some(secs) = overrides.timeout_secs {
        runner.timeout_secs = secs;
    }
    if let Some(path) = &overrides.report_path {
        runner.report_path = Some(path.clone());
    }
}

fn validate_runner(runner: &RunnerConfig, issues: &mut Vec<EnvIssue>) {
    match shell_words::split(&runner.program) {
        Ok(words) if words.is_empty() => issues.push(EnvIssue::Blank(LOADER_PROGRAM)),
        Ok(_) => {}
        Err(e) => issues.push(EnvIssue::Invalid {
            key: LOADER_PROGRAM,
            reason: format!("cannot be split into words: {e}"),
        }),
    }
    if runner.search_path.trim().is_empty() {
        issues.push(EnvIssue::Blank(LOADER_SEARCH_PATH));
    }
}

fn host_path_problem(value: &str) -> Option<&'static str> {
    if value.contains("://") {
        Some("must not include a scheme")
    } else if value.contains(['?', '#']) {
        Some("must not include a query or fragment")
    } else if value.chars().any(char::is_whitespace) {
        Some("must not contain whitespace")
    } else if value.starts_with('/') {
        Some("must start with a host")
    } else {
        None
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn base_env() -> HashMap<String, String> {
        env(&[
            (DB_USERNAME, "dne_user"),
            (DB_PASSWORD, "secret"),
            (DB_URL_CEP, "db.example.com:5432/dne_db"),
            (DNE_PARAM, "logradouro"),
        ])
    }

    fn load(vars: &HashMap<String, String>, overrides: &Overrides) -> Result<Settings, ConfigError> {
        Settings::from_lookup(|k| vars.get(k).cloned(), overrides)
    }

    #[test]
    fn loads_required_variables() {
        let settings = load(&base_env(), &Overrides::default()).unwrap();
        assert_eq!(settings.target.username, "dne_user");
        assert_eq!(settings.target.password, "secret");
        assert_eq!(settings.target.host_path, "db.example.com:5432/dne_db");
        assert_eq!(settings.tables, "logradouro");
        assert_eq!(settings.runner, RunnerConfig::default());
    }

    #[test]
    fn reports_every_missing_key_at_once() {
        let err = load(&HashMap::new(), &Overrides::default()).unwrap_err();
        let keys: Vec<_> = err.issues().iter().map(EnvIssue::key).collect();
        assert_eq!(keys, vec![DB_USERNAME, DB_PASSWORD, DB_URL_CEP, DNE_PARAM]);
        let message = err.to_string();
        for key in [DB_USERNAME, DB_PASSWORD, DB_URL_CEP, DNE_PARAM] {
            assert!(message.contains(key), "{message}");
        }
    }

    #[test]
    fn blank_username_is_rejected() {
        let mut vars = base_env();
        vars.insert(DB_USERNAME.into(), "  ".into());
        let err = load(&vars, &Overrides::default()).unwrap_err();
        assert_eq!(err.issues(), &[EnvIssue::Blank(DB_USERNAME)]);
    }

    #[test]
    fn empty_password_is_allowed() {
        let mut vars = base_env();
        vars.insert(DB_PASSWORD.into(), String::new());
        let settings = load(&vars, &Overrides::default()).unwrap();
        assert_eq!(settings.target.password, "");
    }

    #[test]
    fn tables_value_is_kept_verbatim() {
        let mut vars = base_env();
        vars.insert(DNE_PARAM.into(), "cep_unificado ".into());
        let settings = load(&vars, &Overrides::default()).unwrap();
        assert_eq!(settings.tables, "cep_unificado ");
    }

    #[test]
    fn host_path_with_scheme_is_invalid() {
        let mut vars = base_env();
        vars.insert(DB_URL_CEP.into(), "postgresql://db/dne".into());
        let err = load(&vars, &Overrides::default()).unwrap_err();
        assert!(matches!(
            err.issues(),
            [EnvIssue::Invalid { key: DB_URL_CEP, .. }]
        ));
    }

    #[test]
    fn host_path_with_query_is_invalid() {
        let mut vars = base_env();
        vars.insert(DB_URL_CEP.into(), "db/dne?sslmode=require".into());
        let err = load(&vars, &Overrides::default()).unwrap_err();
        assert_eq!(err.issues()[0].key(), DB_URL_CEP);
    }

    #[test]
    fn loader_variables_override_defaults() {
        let mut vars = base_env();
        vars.extend(env(&[
            (LOADER_PROGRAM, "python -m edne_correios_loader"),
            (LOADER_WORKDIR, "/srv/loader"),
            (LOADER_SEARCH_PATH, "enderecos"),
            (LOADER_SHOW_HELP, "no"),
            (LOADER_TIMEOUT_SECS, "90"),
            (LOADER_GRACE_SECS, "3"),
            (LOADER_REPORT_PATH, "/tmp/report.json"),
        ]));
        let runner = load(&vars, &Overrides::default()).unwrap().runner;
        assert_eq!(runner.program, "python -m edne_correios_loader");
        assert_eq!(runner.work_dir, PathBuf::from("/srv/loader"));
        assert_eq!(runner.search_path, "enderecos");
        assert!(!runner.show_help);
        assert_eq!(runner.timeout_secs, 90);
        assert_eq!(runner.grace_secs, 3);
        assert_eq!(runner.report_path, Some(PathBuf::from("/tmp/report.json")));
    }

    #[test]
    fn empty_optional_variables_are_ignored() {
        let mut vars = base_env();
        vars.insert(LOADER_TIMEOUT_SECS.into(), String::new());
        vars.insert(LOADER_PROGRAM.into(), String::new());
        let runner = load(&vars, &Overrides::default()).unwrap().runner;
        assert_eq!(runner, RunnerConfig::default());
    }

    #[test]
    fn invalid_optional_values_are_collected_with_missing_ones() {
        let vars = env(&[
            (LOADER_TIMEOUT_SECS, "soon"),
            (LOADER_SHOW_HELP, "maybe"),
            (LOADER_PROGRAM, "loader 'unterminated"),
        ]);
        let err = load(&vars, &Overrides::default()).unwrap_err();
        let keys: Vec<_> = err.issues().iter().map(EnvIssue::key).collect();
        assert!(keys.contains(&LOADER_TIMEOUT_SECS));
        assert!(keys.contains(&LOADER_SHOW_HELP));
        assert!(keys.contains(&LOADER_PROGRAM));
        assert!(keys.contains(&DNE_PARAM));
    }

    #[test]
    fn overrides_win_over_environment() {
        let mut vars = base_env();
        vars.insert(LOADER_TIMEOUT_SECS.into(), "90".into());
        let overrides = Overrides {
            skip_help: true,
            timeout_secs: Some(5),
            report_path: Some(PathBuf::from("/tmp/cli.json")),
            ..Overrides::default()
        };
        let runner = load(&vars, &overrides).unwrap().runner;
        assert!(!runner.show_help);
        assert_eq!(runner.timeout_secs, 5);
        assert_eq!(runner.report_path, Some(PathBuf::from("/tmp/cli.json")));
    }

    #[test]
    fn config_file_sits_between_defaults_and_environment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "search_path: cep\ntimeout_secs: 30\nwork_dir: /data").unwrap();

        let mut vars = base_env();
        vars.insert(LOADER_CONFIG.into(), file.path().display().to_string());
        vars.insert(LOADER_TIMEOUT_SECS.into(), "45".into());

        let runner = load(&vars, &Overrides::default()).unwrap().runner;
        assert_eq!(runner.search_path, "cep");
        assert_eq!(runner.work_dir, PathBuf::from("/data"));
        assert_eq!(runner.timeout_secs, 45);
    }

    #[test]
    fn missing_config_file_is_reported_as_issue() {
        let overrides = Overrides {
            config_path: Some(PathBuf::from("/nonexistent/edne-runner.yaml")),
            ..Overrides::default()
        };
        let err = load(&base_env(), &overrides).unwrap_err();
        assert_eq!(err.issues().len(), 1);
        assert_eq!(err.issues()[0].key(), LOADER_CONFIG);
        assert!(err.to_string().contains("/nonexistent/edne-runner.yaml"));
    }

    #[test]
    fn bad_config_file_is_reported_with_missing_variables() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timeout_secs: [1, 2").unwrap();

        let path = file.path().display().to_string();
        let vars = env(&[
            (LOADER_CONFIG, path.as_str()),
            (LOADER_SHOW_HELP, "maybe"),
        ]);
        let err = load(&vars, &Overrides::default()).unwrap_err();
        let keys: Vec<_> = err.issues().iter().map(EnvIssue::key).collect();
        assert_eq!(
            keys,
            vec![
                LOADER_CONFIG,
                LOADER_SHOW_HELP,
                DB_USERNAME,
                DB_PASSWORD,
                DB_URL_CEP,
                DNE_PARAM
            ]
        );
    }

    #[test]
    fn load_file_distinguishes_read_and_parse_errors() {
        let missing = load_file(Path::new("/nonexistent/edne-runner.yaml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timeout_secs: [1, 2").unwrap();
        let malformed = load_file(file.path()).unwrap_err();
        assert!(matches!(malformed, ConfigError::Parse { .. }));
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("y"), None);
    }
}
