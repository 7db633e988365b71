/*!
 * Error types for the subai application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when working with remote APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request did not complete in time
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::RequestFailed(format!("timeout: {}", error))
        } else if error.is_connect() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Errors that can occur during subtitle processing
#[derive(Error, Debug)]
pub enum SubtitleError {
    /// The track has no parseable cue
    #[error("Malformed subtitle track: {0}")]
    MalformedTrack(String),
}

/// Errors raised by the persistent track store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying filesystem failure
    #[error("Track store I/O error for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The requested entry does not exist
    #[error("No cached track for '{0}'")]
    NotFound(String),

    /// The key cannot be used as a file name
    #[error("Invalid track key: '{0}'")]
    InvalidKey(String),
}

/// Errors that can occur during a translation job
#[derive(Error, Debug)]
pub enum TranslationError {
    /// The raw track could not be parsed; fatal to the job
    #[error("Malformed track: {0}")]
    MalformedTrack(#[from] SubtitleError),

    /// The backend failed or timed out for one batch; recoverable
    #[error("Translation backend unavailable: {0}")]
    BackendUnavailable(#[from] ProviderError),

    /// The job was superseded by a request for a different media item
    #[error("Job for '{0}' was cancelled")]
    Cancelled(String),

    /// Partial progress could not be persisted; fatal to the job
    #[error("Track store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from subtitle processing
    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Error from the track store
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid media identifier
    #[error("Invalid media id: {0}")]
    InvalidMediaId(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
