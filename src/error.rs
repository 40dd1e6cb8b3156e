//! Error types for the rasterization pipeline and the Transition API client.

use thiserror::Error;

/// Result type alias using [`RasterError`].
pub type RasterResult<T> = Result<T, RasterError>;

/// Failures of a rasterize/polygonize run. Every variant aborts the run.
#[derive(Debug, Error)]
pub enum RasterError {
    /// Missing or unreadable input geometry, or an unusable spatial reference.
    #[error("Input error: {0}")]
    Input(String),

    /// The requested grid cannot be built for this extent and resolution.
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Raster, scratch directory or output file could not be created.
    #[error("Resource error: {context}: {source}")]
    Resource {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A geometry or raster codec operation failed.
    #[error("Library error: {context}: {message}")]
    Library { context: String, message: String },
}

impl RasterError {
    pub(crate) fn resource(context: impl Into<String>, source: std::io::Error) -> Self {
        RasterError::Resource {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn library(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        RasterError::Library {
            context: context.into(),
            message: err.to_string(),
        }
    }
}

/// Failures surfaced by the Transition API client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("Username or password empty")]
    MissingCredentials,

    #[error("Token not set")]
    InvalidToken,
}

impl ClientError {
    /// Status code of an [`ClientError::Http`] failure, if that is what this is.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            ClientError::Request(e) => e.status(),
            _ => None,
        }
    }
}
