//! # Design
//!
//! - Provide structured, constant-message errors for the client.
//! - Capture operation context (endpoint, status, path) so failures are reproducible in tests.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors produced by the Intrix client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration failed validation.
    #[error("invalid client configuration")]
    InvalidConfig {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// The configured base URL cannot be extended with path segments.
    #[error("base url cannot be a base")]
    BaseUrl {
        /// Offending URL.
        url: String,
    },
    /// Building the HTTP client failed.
    #[error("http client construction failed")]
    HttpClient {
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// The request never produced a response.
    #[error("request transport failure")]
    Transport {
        /// Operation that issued the request.
        operation: &'static str,
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// The backend answered with a non-success status.
    #[error("unexpected response status")]
    Status {
        /// Operation that issued the request.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Error message decoded from the response body, when present.
        message: Option<String>,
    },
    /// The response body could not be decoded.
    #[error("response decoding failure")]
    Decode {
        /// Operation that issued the request.
        operation: &'static str,
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// IO failure while reading or writing the cooldown state file.
    #[error("cooldown storage io failure")]
    StorageIo {
        /// Storage operation that failed.
        operation: &'static str,
        /// State file path.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The cooldown state file holds invalid JSON.
    #[error("cooldown storage json failure")]
    StorageJson {
        /// Storage operation that failed.
        operation: &'static str,
        /// State file path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// Writing a downloaded archive failed.
    #[error("archive write failure")]
    ArchiveIo {
        /// Destination path.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The archive file name would escape the download directory.
    #[error("invalid archive file name")]
    ArchiveName {
        /// Offending file name.
        name: String,
    },
}

impl ClientError {
    /// Human-readable message reported by the backend, if any.
    #[must_use]
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}
