//! PostgreSQL connection URL composition.
//!
//! The URL has the shape
//! `postgresql://{user}:{password}@{host_path}?options=-c%20search_path={schema}`.
//! User, password and schema are percent-encoded; `host_path` is used as
//! given, it was validated when the configuration was loaded.

use std::fmt;

use crate::config::DatabaseTarget;

const SCHEME: &str = "postgresql://";
const REDACTED: &str = "***";

/// A composed connection URL. `Display` and `Debug` hide the password.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseUrl {
    full: String,
    redacted: String,
}

impl DatabaseUrl {
    /// The URL with the real password, for the loader's argv only.
    pub fn expose(&self) -> &str {
        &self.full
    }

    pub fn redacted(&self) -> &str {
        &self.redacted
    }
}

impl fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted)
    }
}

impl fmt::Debug for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DatabaseUrl").field(&self.redacted).finish()
    }
}

/// Build the connection URL with `search_path` pinned to `schema`.
pub fn compose(target: &DatabaseTarget, schema: &str) -> DatabaseUrl {
    let user = urlencoding::encode(&target.username);
    let password = urlencoding::encode(&target.password);
    let query = format!("options=-c%20search_path={}", urlencoding::encode(schema));

    DatabaseUrl {
        full: format!("{SCHEME}{user}:{password}@{}?{query}", target.host_path),
        redacted: format!("{SCHEME}{user}:{REDACTED}@{}?{query}", target.host_path),
    }
}
