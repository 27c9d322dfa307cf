use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which implementation of the tutoring service the client talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// The HTTP backend at `base_url`.
    Http,
    /// The in-process offline backend.
    Offline,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub base_url: String,
    pub backend: Backend,
    pub request_timeout: Duration,
    pub log_level: Level,
}

const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Checks that `raw` is an absolute http(s) URL and strips the trailing slash.
fn parse_base_url(var: &str, raw: &str) -> Result<String, ConfigError> {
    let url = reqwest::Url::parse(raw)
        .map_err(|e| ConfigError::InvalidValue(var.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue(
            var.to_string(),
            format!("'{}' is not an http(s) URL", raw),
        ));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let base_url_str =
            std::env::var("TEACHIT_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let base_url = parse_base_url("TEACHIT_BASE_URL", &base_url_str)?;

        let backend_str = std::env::var("TEACHIT_BACKEND").unwrap_or_else(|_| "http".to_string());
        let backend = match backend_str.to_lowercase().as_str() {
            "offline" => Backend::Offline,
            _ => Backend::Http,
        };

        let timeout_str =
            std::env::var("TEACHIT_TIMEOUT_SECS").unwrap_or_else(|_| "30".to_string());
        let timeout_secs = timeout_str
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "TEACHIT_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", timeout_str),
                )
            })?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            base_url,
            backend,
            request_timeout: Duration::from_secs(timeout_secs),
            log_level,
        })
    }

    /// Applies a base URL given on the command line.
    pub fn with_base_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.base_url = parse_base_url("--base-url", raw)?;
        Ok(self)
    }
}
