use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::maven::coordinates::Status;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors are shared between every caller awaiting the same memoized operation, and they are
///  recorded on the artifact for reporting - hence the `Arc`.
pub type SharedError = Arc<Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid Maven artifact URI: {0:?} - expected groupId:artifactId:version[:packaging[:classifier[:mainclass]]] or an existing file")]
    MalformedCoordinate(String),

    #[error("repository {repository} unavailable: {reason}")]
    RepositoryUnavailable {
        repository: String,
        reason: String,
    },

    #[error("repository {repository} rejected request for {path}: HTTP {status}")]
    Rejected {
        repository: String,
        path: String,
        status: u16,
    },

    #[error("checksum mismatch for {artifact}: expected {expected}, was {actual}")]
    ChecksumMismatch {
        artifact: String,
        expected: String,
        actual: String,
    },

    #[error("{0} not found in any repository")]
    NotFoundInAnyRepository(String),

    #[error("cannot read manifest of {path}: {reason}")]
    ManifestReadFailure {
        path: PathBuf,
        reason: String,
    },

    #[error("cannot resolve {artifact} (status: {status:?})")]
    Unresolved {
        artifact: String,
        status: Status,
    },

    #[error("resolution failed: {errors} error(s), {warnings} warning(s)")]
    ResolutionFailed {
        errors: usize,
        warnings: usize,
    },

    #[error("configuration error: {message}")]
    Config {
        message: String,
        key: Option<String>,
    },

    #[error("worker pool {0} is shut down")]
    PoolClosed(&'static str),

    #[error("worker task failed: {0}")]
    Task(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("invalid HTTP request: {0}")]
    HttpRequest(#[from] hyper::http::Error),

    #[error("invalid URI: {0}")]
    InvalidUri(#[from] hyper::http::uri::InvalidUri),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid repository metadata: {0}")]
    MetadataXml(#[from] serde_xml_rs::Error),

    #[error(transparent)]
    Shared(#[from] SharedError),
}

impl Error {
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Error {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    pub fn unavailable(repository: &str, reason: impl ToString) -> Error {
        Error::RepositoryUnavailable {
            repository: repository.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that originate in content integrity rather than in the transport
    pub fn is_checksum_mismatch(&self) -> bool {
        match self {
            Error::ChecksumMismatch { .. } => true,
            Error::Shared(e) => e.is_checksum_mismatch(),
            _ => false,
        }
    }
}

/// Transient failures (timeouts, refused or reset connections, overloaded servers) are worth
///  another attempt, everything else is permanent for this run.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::RepositoryUnavailable { .. } => true,
            Error::Hyper(e) => {
                e.is_connect() || e.is_timeout() || e.is_closed() || e.is_incomplete_message() || e.is_canceled()
            }
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::UnexpectedEof
            ),
            Error::Shared(e) => e.is_retryable(),
            _ => false,
        }
    }
}
