//! Error types for the pod image spec webhook

use axum::http::StatusCode;
use thiserror::Error;

/// Main error type for webhook operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error while reading registry config or image stream tags
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// The shared Kubernetes client could not be constructed
    #[error("failed to create kubernetes client: {0}")]
    ClientInit(String),

    /// The ImageStreamTag backing an internal registry image does not exist
    #[error("image stream tag {namespace}/{name} not found")]
    ImageStreamTagNotFound {
        /// Namespace the tag was looked up in
        namespace: String,
        /// Tag name in `image:tag` form
        name: String,
    },

    /// The admission request could not be decoded or failed validation
    #[error("invalid admission request: {0}")]
    InvalidRequest(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error (TLS material, CLI arguments)
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal/operational error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid request error with the given message
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP-style status code reported in the admission response
    ///
    /// Malformed input is a 400; anything that went wrong talking to the
    /// cluster or inside the webhook is a 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidRequest(_) | Error::Serialization(_) => StatusCode::BAD_REQUEST,
            Error::Kube(_)
            | Error::ClientInit(_)
            | Error::ImageStreamTagNotFound { .. }
            | Error::Config(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
