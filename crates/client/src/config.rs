use std::time::Duration;

use fret_core::connection::DEFAULT_OUTBOUND_CAPACITY;
use fret_core::roles::Role;
use fret_core::types::DbId;

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a local development server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST base URL, including the `/api` prefix.
    pub api_url: String,
    /// Socket server base URL (`ws://` or `wss://`).
    pub socket_url: String,
    /// Bearer token; `None` for anonymous tracking lookups.
    pub token: Option<String>,
    /// Role whose dashboard is rendered.
    pub role: Role,
    /// Id of the signed-in user, required for chat.
    pub user_id: Option<DbId>,
    pub request_timeout_secs: u64,
    pub outbound_queue_capacity: usize,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                     |
    /// |--------------------------------|-----------------------------|
    /// | `FRET_API_URL`                 | `http://localhost:5000/api` |
    /// | `FRET_SOCKET_URL`              | `ws://localhost:5000`       |
    /// | `FRET_API_TOKEN`               | --                          |
    /// | `FRET_ROLE`                    | `client`                    |
    /// | `FRET_USER_ID`                 | --                          |
    /// | `FRET_REQUEST_TIMEOUT_SECS`    | `30`                        |
    /// | `FRET_OUTBOUND_QUEUE_CAPACITY` | `256`                       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_url = var("FRET_API_URL")
            .unwrap_or_else(|| "http://localhost:5000/api".into())
            .trim_end_matches('/')
            .to_string();

        let socket_url = var("FRET_SOCKET_URL")
            .unwrap_or_else(|| "ws://localhost:5000".into())
            .trim_end_matches('/')
            .to_string();

        let token = var("FRET_API_TOKEN");

        let role = match var("FRET_ROLE") {
            Some(raw) => raw.parse::<Role>().map_err(|_| ConfigError::Invalid {
                var: "FRET_ROLE",
                value: raw,
                expected: "one of admin, teacher, agent, client, student",
            })?,
            None => Role::Client,
        };

        let user_id = var("FRET_USER_ID")
            .map(|raw| {
                raw.parse::<DbId>().map_err(|_| ConfigError::Invalid {
                    var: "FRET_USER_ID",
                    value: raw,
                    expected: "an integer id",
                })
            })
            .transpose()?;

        let request_timeout_secs = parse_or("FRET_REQUEST_TIMEOUT_SECS", var("FRET_REQUEST_TIMEOUT_SECS"), 30)?;

        let outbound_queue_capacity = parse_or(
            "FRET_OUTBOUND_QUEUE_CAPACITY",
            var("FRET_OUTBOUND_QUEUE_CAPACITY"),
            DEFAULT_OUTBOUND_CAPACITY,
        )?;

        Ok(Self {
            api_url,
            socket_url,
            token,
            role,
            user_id,
            request_timeout_secs,
            outbound_queue_capacity,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            var: name,
            value: raw,
            expected: "a positive integer",
        }),
        None => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}
