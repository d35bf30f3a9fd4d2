//! services/client/src/error.rs
//!
//! Defines the primary error type for the client service.

use crate::config::ConfigError;
use sora_core::domain::UnknownFileKind;
use sora_core::ports::PortError;

/// The primary error type for the `client` service.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// An upload was requested for a kind of file other than image or video.
    #[error("{0}")]
    InvalidFileType(#[from] UnknownFileKind),

    /// A value the workflow depends on was absent.
    #[error("Missing result: {0}")]
    MissingResult(&'static str),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
