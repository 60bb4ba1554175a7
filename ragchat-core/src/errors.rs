//! Error types for the ragchat core
//!
//! Every fallible operation in the crate returns [`Result`]. Nothing here is
//! retried: collaborator failures are surfaced to the caller as-is so the
//! boundary can abort the current turn and leave earlier state untouched.

use thiserror::Error;

/// Main error type for the conversation core
#[derive(Error, Debug)]
pub enum RagError {
    /// Invalid or incomplete configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// HTTP transport failure talking to a hosted collaborator
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// A hosted collaborator answered with a non-success status
    #[error("{service} returned {status}: {body}")]
    UpstreamError {
        /// Which collaborator failed (e.g. "OpenAI chat", "Astra DB")
        service: &'static str,
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// A collaborator answered successfully but the payload was unusable
    #[error("Unexpected response from {service}: {message}")]
    UnexpectedResponse {
        /// Which collaborator answered
        service: &'static str,
        /// What was wrong with the payload
        message: String,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Filesystem errors (staging uploads, catalog files)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Uploaded text file is not valid UTF-8
    #[error("File {file} is not valid UTF-8: {source}")]
    DecodeError {
        /// Name of the uploaded file
        file: String,
        /// Underlying decode error
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// PDF could not be parsed
    #[error("Failed to read PDF {file}: {source}")]
    PdfError {
        /// Name of the uploaded file
        file: String,
        /// Underlying parser error
        #[source]
        source: lopdf::Error,
    },

    /// Tabular catalog (localization or rails) could not be read
    #[error("Failed to read catalog {path}: {source}")]
    CatalogError {
        /// Path of the csv file
        path: String,
        /// Underlying csv error
        #[source]
        source: csv::Error,
    },

    /// The submitted question was empty
    #[error("Question must not be empty")]
    EmptyQuestion,

    /// A turn is already running for this session
    #[error("A turn is already in progress for session {0}")]
    TurnInProgress(String),

    /// The model stream ended without producing a response
    #[error("Model stream ended unexpectedly")]
    UnexpectedStreamEnd,

    /// A cached resource was requested with a different type than it was built with
    #[error("Cached resource {0} has a different type")]
    ResourceTypeMismatch(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, RagError>;

impl RagError {
    /// Check if the error was caused by the caller's input rather than a collaborator
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RagError::EmptyQuestion
                | RagError::TurnInProgress(_)
                | RagError::DecodeError { .. }
                | RagError::PdfError { .. }
        )
    }
}
