/*!
 * Error types for the mtdock pipeline.
 *
 * Each concern gets its own enum built with thiserror. Handler errors carry
 * the HTTP status they surface as, so the server layer only has to render
 * them.
 */

use thiserror::Error;

/// Errors that can occur when calling a translation provider
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

    /// The text exceeded the provider's per-request size limit
    #[error("Text size limit exceeded: {0}")]
    TextSizeLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// Provider is not configured well enough to be used
    #[error("Provider configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Errors raised by a message queue backend
#[derive(Error, Debug)]
pub enum QueueError {
    /// Message body could not be encoded or decoded
    #[error("Invalid queue message: {0}")]
    InvalidMessage(#[from] serde_json::Error),

    /// Receipt handle does not match an in-flight message
    #[error("Unknown receipt handle: {0}")]
    UnknownReceipt(String),

    /// Underlying storage failure
    #[error("Queue storage error: {0}")]
    Storage(String),
}

impl From<anyhow::Error> for QueueError {
    fn from(error: anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", error))
    }
}

/// Errors raised while checking a submitted checksum
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChecksumError {
    /// The submitted value is not 64 hex characters
    #[error("Malformed checksum: {0}")]
    Malformed(String),

    /// The submitted value does not match the recomputed digest
    #[error("Data corruption. Checksums are not the same.")]
    Mismatch {
        /// Hex digest the client sent
        claimed: String,
        /// Hex digest recomputed from the payload
        computed: String,
    },
}

/// Errors returned by pipeline handlers
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Request fields are missing or invalid
    #[error("{0}")]
    BadRequest(String),

    /// Nothing matched the lookup
    #[error("{0}")]
    NoResult(String),

    /// Payload failed its integrity check
    #[error("{0}")]
    Checksum(#[from] ChecksumError),

    /// Database failure
    #[error("Database error: {0}")]
    Store(String),

    /// Queue failure
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Provider failure
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl HandlerError {
    /// HTTP status code this error is reported with
    ///
    /// Lookups that find nothing answer 400, which the dashboard treats as
    /// "no more articles".
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::NoResult(_) => 400,
            Self::Checksum(ChecksumError::Malformed(_)) => 400,
            Self::Checksum(ChecksumError::Mismatch { .. }) => 500,
            Self::Store(_) | Self::Queue(_) | Self::Provider(_) => 500,
        }
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(error: anyhow::Error) -> Self {
        Self::Store(format!("{:#}", error))
    }
}
