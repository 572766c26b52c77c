use crate::assignments::{AssignmentMap, AssignmentsError};
use sentry::types::Dsn;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

pub const DEFAULT_ASSIGNMENTS_PATH: &str = "./assignments.json";
pub const DEFAULT_BIND_ADDR: &str = ":18091";
pub const DEFAULT_API_BASE: &str = "https://sentry.io/";

/// Wildcard host used for `:port`. Dual-stack where the OS allows it.
pub const ANY_HOST_V6: &str = "[::]";
/// Fallback for hosts without IPv6.
pub const ANY_HOST_V4: &str = "0.0.0.0";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("must provide a Sentry DSN")]
    MissingDsn,

    #[error("invalid Sentry DSN: {0}")]
    InvalidDsn(#[from] sentry::types::ParseDsnError),

    #[error("must provide a Sentry API token")]
    MissingApiToken,

    #[error("no project -> user mapping at {}: {source}", .path.display())]
    AssignmentsLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse project -> user mapping at {}: {source}", .path.display())]
    AssignmentsParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid bind address {0:?}, expected [host]:port")]
    InvalidBindAddr(String),

    #[error("invalid API base URL {value:?}: {reason}")]
    InvalidApiBase { value: String, reason: String },
}

/// Settings as supplied on the command line, before validation.
#[derive(Clone, Debug)]
pub struct Settings {
    pub sentry_dsn: Option<String>,
    pub api_token: Option<String>,
    pub assignments_path: PathBuf,
    pub bind_addr: String,
    pub api_base: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            sentry_dsn: None,
            api_token: None,
            assignments_path: DEFAULT_ASSIGNMENTS_PATH.into(),
            bind_addr: DEFAULT_BIND_ADDR.into(),
            api_base: DEFAULT_API_BASE.into(),
        }
    }
}

impl Settings {
    /// Validates the settings and loads the assignment mapping.
    ///
    /// Checks run in a fixed order (DSN, API token, mapping file, bind
    /// address, API base) and stop at the first failure, so a misconfigured
    /// deployment always reports the same error first.
    pub fn load(self) -> Result<Config, ConfigError> {
        let sentry_dsn: Dsn = non_empty(self.sentry_dsn)
            .ok_or(ConfigError::MissingDsn)?
            .parse()?;

        let api_token = non_empty(self.api_token).ok_or(ConfigError::MissingApiToken)?;

        let path = self.assignments_path;
        let assignments = match AssignmentMap::from_file(&path) {
            Ok(assignments) => assignments,
            Err(AssignmentsError::Io(source)) => {
                return Err(ConfigError::AssignmentsLoad { path, source });
            }
            Err(AssignmentsError::Parse(source)) => {
                return Err(ConfigError::AssignmentsParse { path, source });
            }
        };

        let listener = self.bind_addr.parse()?;
        let api_base = parse_api_base(&self.api_base)?;

        Ok(Config {
            listener,
            sentry_dsn,
            api_token,
            api_base,
            assignments,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_api_base(value: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidApiBase {
        value: value.to_string(),
        reason,
    };

    let url = Url::parse(value).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("not a base URL".into()));
    }

    Ok(url)
}

/// Validated relay configuration.
#[derive(Clone)]
pub struct Config {
    pub listener: Listener,
    pub sentry_dsn: Dsn,
    pub api_token: String,
    /// Base URL of the Sentry web API, e.g. `https://sentry.io/`
    pub api_base: Url,
    pub assignments: AssignmentMap,
}

/// Network listener configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Listener {
    /// Host address to bind to (e.g., "[::]" or "127.0.0.1")
    pub host: String,
    pub port: u16,
}

impl FromStr for Listener {
    type Err = ConfigError;

    /// Parses `host:port`. An empty host (`:18091`) binds all interfaces,
    /// IPv6 and IPv4.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidBindAddr(s.to_string());

        let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
        let port = port.parse().map_err(|_| invalid())?;
        let host = match host {
            "" => ANY_HOST_V6,
            host => host,
        };

        Ok(Listener {
            host: host.to_string(),
            port,
        })
    }
}

impl Listener {
    pub fn is_any_host(&self) -> bool {
        self.host == ANY_HOST_V6
    }
}

impl fmt::Display for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
