//! services/client/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::str::FromStr;
use tracing_subscriber::EnvFilter;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://cloud.appwrite.io/v1";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which implementation backs the service ports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Appwrite,
    Memory,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "appwrite" => Ok(BackendKind::Appwrite),
            "memory" => Ok(BackendKind::Memory),
            other => Err(ConfigError::InvalidValue(
                "SORA_BACKEND".to_string(),
                format!("'{}' is not one of appwrite, memory", other),
            )),
        }
    }
}

/// The fixed identifiers of the remote project and its resources.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppwriteConfig {
    pub endpoint: Url,
    pub project_id: String,
    pub platform: String,
    /// Operating system part of the `Origin` header, e.g. `android` or `ios`.
    pub platform_os: String,
    pub database_id: String,
    pub user_collection_id: String,
    pub video_collection_id: String,
    pub storage_id: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub backend: BackendKind,
    pub appwrite: AppwriteConfig,
    /// An `EnvFilter` directive string such as `info,reqwest=warn`.
    pub log_filter: String,
    /// A session secret persisted by a previous run, restored at startup.
    pub session_secret: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let backend = std::env::var("SORA_BACKEND")
            .unwrap_or_else(|_| "appwrite".to_string())
            .parse::<BackendKind>()?;

        let log_filter =
            parse_log_filter(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))?;

        let session_secret = std::env::var("SORA_SESSION_SECRET")
            .ok()
            .filter(|s| !s.is_empty());

        // --- Load Appwrite Settings ---
        let endpoint_str =
            std::env::var("APPWRITE_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let endpoint = parse_endpoint(&endpoint_str)?;

        let appwrite = AppwriteConfig {
            endpoint,
            project_id: required("APPWRITE_PROJECT_ID", backend)?,
            platform: required("APPWRITE_PLATFORM", backend)?,
            platform_os: std::env::var("APPWRITE_PLATFORM_OS")
                .unwrap_or_else(|_| "android".to_string()),
            database_id: required("APPWRITE_DATABASE_ID", backend)?,
            user_collection_id: required("APPWRITE_USER_COLLECTION_ID", backend)?,
            video_collection_id: required("APPWRITE_VIDEO_COLLECTION_ID", backend)?,
            storage_id: required("APPWRITE_STORAGE_ID", backend)?,
        };

        Ok(Self {
            backend,
            appwrite,
            log_filter,
            session_secret,
        })
    }
}

/// Appwrite identifiers are only mandatory when Appwrite backs the ports.
fn required(name: &str, backend: BackendKind) -> Result<String, ConfigError> {
    match (std::env::var(name), backend) {
        (Ok(value), _) => Ok(value),
        (Err(_), BackendKind::Memory) => Ok(String::new()),
        (Err(_), BackendKind::Appwrite) => Err(ConfigError::MissingVar(name.to_string())),
    }
}

/// Checks that `raw` is a valid `EnvFilter` directive list and hands it back unchanged.
pub fn parse_log_filter(raw: &str) -> Result<String, ConfigError> {
    EnvFilter::try_new(raw)
        .map_err(|e| ConfigError::InvalidValue("RUST_LOG".to_string(), e.to_string()))?;
    Ok(raw.to_string())
}

/// Parses the API endpoint, dropping any trailing slash so paths can be appended.
pub fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim_end_matches('/');
    let url = Url::parse(trimmed)
        .map_err(|e| ConfigError::InvalidValue("APPWRITE_ENDPOINT".to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidValue(
            "APPWRITE_ENDPOINT".to_string(),
            format!("'{}' is not a base URL", raw),
        ));
    }
    Ok(url)
}
