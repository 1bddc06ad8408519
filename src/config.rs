use std::{env, time::Duration};

use thiserror::Error;

use crate::guard::RefreshFailurePolicy;

/// AppConfig
///
/// Holds the client's entire configuration state. It is loaded once at startup
/// and then cloned into the transport and the navigation guard, so every
/// component sees the same backend host and policies.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Base URL of the library backend (no trailing slash).
    pub backend_host: String,
    // Runtime environment marker. Controls defaults and log format.
    pub env: Env,
    // Bearer token to start the session with, if one was provisioned.
    pub token: Option<String>,
    // Path of the role refresh endpoint, relative to `backend_host`.
    pub refresh_path: String,
    // Per-request timeout. `None` keeps the HTTP client's default.
    pub request_timeout: Option<Duration>,
    // What the guard does when a role refresh fails on a restricted route.
    pub refresh_failure: RefreshFailurePolicy,
}

/// Env
///
/// Defines the runtime context: local development against a backend on
/// localhost, or production where every endpoint must be configured.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// ConfigError
///
/// Raised by `AppConfig::load` when a variable is missing in production or
/// holds an unparseable value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

pub const DEFAULT_BACKEND_HOST: &str = "http://localhost:3000";
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

impl Default for AppConfig {
    /// default
    ///
    /// Safe values for tests: local env, localhost backend, no token.
    fn default() -> Self {
        Self {
            backend_host: DEFAULT_BACKEND_HOST.to_string(),
            env: Env::Local,
            token: None,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            request_timeout: None,
            refresh_failure: RefreshFailurePolicy::default(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from environment variables and fails fast when a
    /// production deployment is missing its backend host.
    ///
    /// # Errors
    /// `ConfigError::Missing` for a required variable, `ConfigError::Invalid`
    /// when a variable cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let backend_host = match (env, non_empty("LIBRARY_BACKEND_HOST")) {
            (_, Some(host)) => host,
            (Env::Local, None) => DEFAULT_BACKEND_HOST.to_string(),
            (Env::Production, None) => return Err(ConfigError::Missing("LIBRARY_BACKEND_HOST")),
        };

        let request_timeout = match non_empty("LIBRARY_REQUEST_TIMEOUT_SECS") {
            None => None,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "LIBRARY_REQUEST_TIMEOUT_SECS",
                        value: raw,
                    });
                }
            },
        };

        let refresh_failure = match non_empty("LIBRARY_REFRESH_FAILURE").as_deref() {
            None | Some("redirect") => RefreshFailurePolicy::RedirectToSignIn,
            Some("deny") => RefreshFailurePolicy::Deny,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LIBRARY_REFRESH_FAILURE",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            backend_host: backend_host.trim_end_matches('/').to_string(),
            env,
            token: non_empty("LIBRARY_TOKEN"),
            refresh_path: non_empty("LIBRARY_REFRESH_PATH")
                .unwrap_or_else(|| DEFAULT_REFRESH_PATH.to_string()),
            request_timeout,
            refresh_failure,
        })
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
