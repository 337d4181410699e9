use std::path::PathBuf;
use std::time::Duration;

/// Result type for Jimeng node operations
pub type Result<T> = std::result::Result<T, JimengError>;

/// Error types for the Jimeng video pipeline
#[derive(thiserror::Error, Debug)]
pub enum JimengError {
    #[error("Cannot connect to API service: {url}")]
    Connectivity {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Session pool request rejected: {0}")]
    RemoteRejected(String),

    #[error("Session pool is empty, add a session first")]
    EmptyPool,

    #[error("API error {status}: {body}")]
    RemoteGeneration { status: u16, body: String },

    #[error("Video download failed: {0}")]
    Download(#[source] reqwest::Error),

    #[error("Failed to write video file {path}: {source}")]
    DownloadIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Invalid frame image: {0}")]
    InvalidFrame(String),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Video probe failed: {0}")]
    Probe(String),

    #[error("Source video file is missing: {0}")]
    MissingVideo(String),

    #[error("Invalid API URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse failure categories reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Connection,
    Generic,
}

impl JimengError {
    /// Map a transport error from one pipeline step onto the error taxonomy.
    pub(crate) fn from_transport(
        err: reqwest::Error,
        operation: &'static str,
        url: &str,
        after: Duration,
    ) -> Self {
        if err.is_timeout() {
            JimengError::Timeout { operation, after }
        } else if err.is_connect() {
            JimengError::Connectivity {
                url: url.to_string(),
                source: err,
            }
        } else {
            JimengError::Http(err)
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            JimengError::Timeout { .. } => FailureKind::Timeout,
            JimengError::Connectivity { .. } => FailureKind::Connection,
            JimengError::Download(e) | JimengError::Http(e) if e.is_timeout() => FailureKind::Timeout,
            JimengError::Download(e) | JimengError::Http(e) if e.is_connect() => FailureKind::Connection,
            _ => FailureKind::Generic,
        }
    }
}
