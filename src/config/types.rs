use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PROGRAM: &str = "edne-correios-loader";
pub const DEFAULT_WORK_DIR: &str = "/app";
pub const DEFAULT_SEARCH_PATH: &str = "dne";
pub const DEFAULT_TIMEOUT_SECS: u64 = 6 * 60 * 60;
pub const DEFAULT_GRACE_SECS: u64 = 10;

/// Non-secret runner options. Every field can come from the YAML file,
/// a `LOADER_*` variable or a command-line flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Loader command line, split with shell-words rules.
    pub program: String,
    pub work_dir: PathBuf,
    pub search_path: String,
    pub show_help: bool,
    /// `0` disables the timeout.
    pub timeout_secs: u64,
    pub grace_secs: u64,
    pub report_path: Option<PathBuf>,
}

impl RunnerConfig {
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            search_path: DEFAULT_SEARCH_PATH.to_string(),
            show_help: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            grace_secs: DEFAULT_GRACE_SECS,
            report_path: None,
        }
    }
}

/// Connection target assembled from `DB_USERNAME`, `DB_PASSWORD` and `DB_URL_CEP`.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    pub username: String,
    pub password: String,
    /// `host[:port]/dbname`, used verbatim.
    pub host_path: String,
}

impl fmt::Debug for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseTarget")
            .field("username", &self.username)
            .field("password", &"***")
            .field("host_path", &self.host_path)
            .finish()
    }
}

/// Everything a run needs, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub target: DatabaseTarget,
    /// Value of `DNE_PARAM`, handed to `--tables` untouched.
    pub tables: String,
    pub runner: RunnerConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_container_layout() {
        let cfg = RunnerConfig::default();
        assert_eq!(cfg.program, "edne-correios-loader");
        assert_eq!(cfg.work_dir, PathBuf::from("/app"));
        assert_eq!(cfg.search_path, "dne");
        assert!(cfg.show_help);
        assert_eq!(cfg.timeout(), Some(Duration::from_secs(21_600)));
        assert!(cfg.report_path.is_none());
    }

    #[test]
    fn zero_timeout_disables_it() {
        let cfg = RunnerConfig {
            timeout_secs: 0,
            ..RunnerConfig::default()
        };
        assert_eq!(cfg.timeout(), None);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg: RunnerConfig = serde_yaml::from_str("timeout_secs: 60\nshow_help: false\n").unwrap();
        assert_eq!(cfg.timeout_secs, 60);
        assert!(!cfg.show_help);
        assert_eq!(cfg.program, DEFAULT_PROGRAM);
        assert_eq!(cfg.grace_secs, DEFAULT_GRACE_SECS);
    }

    #[test]
    fn debug_hides_password() {
        let target = DatabaseTarget {
            username: "dne_user".into(),
            password: "hunter2".into(),
            host_path: "db:5432/dne".into(),
        };
        let rendered = format!("{target:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("dne_user"));
    }
}
