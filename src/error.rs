use std::fmt;
use std::io;

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

/// Fatal errors. Everything per-item is logged and skipped instead.
#[derive(Debug, Error, Diagnostic)]
pub enum HarvestError {
    #[error("invalid catalog id: {0}")]
    InvalidCatalogId(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("catalog bound request failed: {0}")]
    CatalogUnavailable(RequestFailure),

    #[error("catalog bound request returned status {status}")]
    CatalogStatus { status: u16 },

    #[error("catalog bound response could not be decoded: {0}")]
    CatalogDecode(DecodeFailure),

    #[error("failed to prepare storage directory {path}: {kind}")]
    StorageRoot { path: Utf8PathBuf, kind: FsFailureKind },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestFailureKind {
    MalformedUrl,
    Connection,
    Timeout,
    Transport,
}

impl fmt::Display for RequestFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestFailureKind::MalformedUrl => write!(f, "MalformedUrl"),
            RequestFailureKind::Connection => write!(f, "ConnectionError"),
            RequestFailureKind::Timeout => write!(f, "Timeout"),
            RequestFailureKind::Transport => write!(f, "TransportError"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} requesting {url}: {message}")]
pub struct RequestFailure {
    pub kind: RequestFailureKind,
    pub url: String,
    pub message: String,
}

impl RequestFailure {
    pub fn new(kind: RequestFailureKind, url: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeFailure {
    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("missing or invalid field: {0}")]
    MissingOrInvalidField(String),
}

impl From<serde_json::Error> for DecodeFailure {
    fn from(err: serde_json::Error) -> Self {
        match err.classify() {
            serde_json::error::Category::Data => {
                DecodeFailure::MissingOrInvalidField(err.to_string())
            }
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Eof
            | serde_json::error::Category::Io => DecodeFailure::MalformedJson(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsFailureKind {
    PermissionDenied,
    NotFound,
    IsADirectory,
    Other(io::ErrorKind),
}

impl FsFailureKind {
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => FsFailureKind::PermissionDenied,
            io::ErrorKind::NotFound => FsFailureKind::NotFound,
            io::ErrorKind::IsADirectory => FsFailureKind::IsADirectory,
            other => FsFailureKind::Other(other),
        }
    }
}

impl fmt::Display for FsFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsFailureKind::PermissionDenied => write!(f, "PermissionError"),
            FsFailureKind::NotFound => write!(f, "FileNotFoundError"),
            FsFailureKind::IsADirectory => write!(f, "IsADirectoryError"),
            FsFailureKind::Other(kind) => write!(f, "IoError({kind})"),
        }
    }
}
