use std::str::FromStr;
use std::time::Duration;

/// Backend connection settings loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST backend (default: `http://localhost:8000/api`).
    pub api_url: String,
    /// Bearer token sent with every request, if set.
    pub api_token: Option<String>,
    /// Per-request HTTP timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
}

/// A configuration variable held a value that could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("{var} must be a valid {expected}, got '{value}'")]
pub struct ConfigError {
    pub var: &'static str,
    pub expected: &'static str,
    pub value: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000/api".into(),
            api_token: None,
            request_timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                     |
    /// |-----------------------------|-----------------------------|
    /// | `SCEI_API_URL`              | `http://localhost:8000/api` |
    /// | `SCEI_API_TOKEN`            | unset                       |
    /// | `SCEI_REQUEST_TIMEOUT_SECS` | `30`                        |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_url = std::env::var("SCEI_API_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.api_url);

        let api_token = std::env::var("SCEI_API_TOKEN")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let request_timeout_secs = parse_or(
            "SCEI_REQUEST_TIMEOUT_SECS",
            std::env::var("SCEI_REQUEST_TIMEOUT_SECS").ok(),
            defaults.request_timeout_secs,
            "number of seconds",
        )?;

        Ok(Self {
            api_url,
            api_token,
            request_timeout_secs,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Parse an optional raw variable value, falling back to `default` when
/// it is unset or blank.
pub(crate) fn parse_or<T: FromStr>(
    var: &'static str,
    raw: Option<String>,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError {
            var,
            expected,
            value: value.to_string(),
        }),
    }
}
