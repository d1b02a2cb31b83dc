use std::path::PathBuf;
use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::server::Envelope;

/// Errors raised while loading startup configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid signature properties: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid colour {value:?}: {reason}")]
    InvalidColor { value: String, reason: &'static str },
    #[error("invalid archive spec {0:?}, expected NAME=PATH or PATH")]
    InvalidPfxSpec(String),
}

/// Errors raised by an [`ArchiveDecoder`](crate::identity::ArchiveDecoder).
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("malformed archive: {0}")]
    Parse(String),
    #[error("archive integrity check failed, the password is probably wrong")]
    Mac,
    #[error("unsupported archive: {0}")]
    Unsupported(String),
    #[error("invalid private key: {0}")]
    Key(String),
    #[error("invalid certificate: {0}")]
    Certificate(String),
    #[error("archive contains no {0}")]
    Missing(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("the name '{0}' is already loaded")]
    DuplicateName(String),
    #[error("unknown certificate '{0}'")]
    NotFound(String),
    #[error("failed to read archive {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode archive '{name}': {source}")]
    Decode {
        name: String,
        #[source]
        source: ArchiveError,
    },
}

/// Errors reported by a [`DocumentEngine`](crate::engine::DocumentEngine).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("malformed document: {0}")]
    Malformed(String),
    #[error("document is locked")]
    Locked,
    #[error("encryption failure: {0}")]
    Crypto(String),
    #[error("invalid page number {0}")]
    InvalidPage(u32),
    #[error("signer failure: {0}")]
    Signer(String),
}

/// Stage failures of the [`SigningPipeline`](crate::pipeline::SigningPipeline).
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    #[error("unknown certificate '{0}'")]
    UnknownCertificate(String),
    #[error("error opening document: {0}")]
    Open(#[source] EngineError),
    #[error("document is already password protected")]
    AlreadyProtected,
    #[error("error locking document with password: {0}")]
    Lock(#[source] EngineError),
    #[error("error signing document: {0}")]
    Sign(#[source] EngineError),
}

/// Failure of a single batch job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("error reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Sign(#[from] SignError),
    #[error("error writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("signing task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Error processing document: {0}")]
    Sign(#[from] SignError),
    #[error("request timed out after {0:?}")]
    TimedOut(Duration),
    #[error("{0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Sign(
                SignError::UnknownCertificate(_) | SignError::Open(_) | SignError::AlreadyProtected,
            ) => StatusCode::BAD_REQUEST,
            ServerError::Sign(SignError::Lock(_) | SignError::Sign(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServerError::TimedOut(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Trait implementation to convert this error into an axum http response
impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(Envelope::<()>::error(self.to_string()))).into_response()
    }
}
