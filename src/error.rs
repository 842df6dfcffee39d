//! Error taxonomy for generation, reconciliation, capture and export.
//!
//! Only [`RequestError`] and [`ExportError::EmptyArchive`] are meant to reach a
//! user. [`NotFound`] is an expected race and is swallowed at the reconciliation
//! boundary; [`CaptureError`] is absorbed by the capture pipeline.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::slide::SlideId;

/// Failure category of a backend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestErrorKind {
    /// Missing permission for the requested model (HTTP 401/403).
    Authorization,
    RateLimited,
    InvalidRequest,
    Network,
    Backend,
    MalformedResponse,
    /// No model tiers were configured for the operation.
    Unconfigured,
}

impl fmt::Display for RequestErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RequestErrorKind::Authorization => "authorization",
            RequestErrorKind::RateLimited => "rate limit",
            RequestErrorKind::InvalidRequest => "invalid request",
            RequestErrorKind::Network => "network",
            RequestErrorKind::Backend => "backend",
            RequestErrorKind::MalformedResponse => "malformed response",
            RequestErrorKind::Unconfigured => "configuration",
        };
        f.write_str(label)
    }
}

/// A failed call to the generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error from model '{model}'{}: {message}", status_suffix(.status))]
pub struct RequestError {
    pub kind: RequestErrorKind,
    pub status: Option<u16>,
    pub model: String,
    pub message: String,
}

impl RequestError {
    pub fn new(kind: RequestErrorKind, model: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            model: model.into(),
            message: message.into(),
        }
    }

    /// Classifies an HTTP failure. `backend_status` is the textual status some
    /// backends put in the error body (e.g. `PERMISSION_DENIED`); it wins over
    /// the numeric code when it is more specific.
    pub fn from_status(
        status: u16,
        backend_status: Option<&str>,
        model: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let kind = match backend_status {
            Some("PERMISSION_DENIED") | Some("UNAUTHENTICATED") => RequestErrorKind::Authorization,
            Some("RESOURCE_EXHAUSTED") => RequestErrorKind::RateLimited,
            _ => match status {
                401 | 403 => RequestErrorKind::Authorization,
                429 => RequestErrorKind::RateLimited,
                400..=499 => RequestErrorKind::InvalidRequest,
                _ => RequestErrorKind::Backend,
            },
        };
        Self {
            kind,
            status: Some(status),
            model: model.into(),
            message: message.into(),
        }
    }

    pub fn unconfigured(operation: &str) -> Self {
        Self::new(
            RequestErrorKind::Unconfigured,
            "",
            format!("no model tiers configured for {operation}"),
        )
    }

    pub fn is_authorization(&self) -> bool {
        self.kind == RequestErrorKind::Authorization
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// The reconciliation target vanished from the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("slide {0} is no longer in the store")]
pub struct NotFound(pub SlideId);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("renderer failed to produce a snapshot: {0}")]
    Renderer(String),
    #[error("renderer produced an empty snapshot")]
    EmptySnapshot,
    #[error("no slide is active")]
    NoActiveSlide,
}

/// Errors surfaced by a single-slide generation operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("slide {0} has no generation prompt")]
    MissingPrompt(SlideId),
    #[error("slide {0} has no image to edit")]
    MissingImage(SlideId),
    #[error("project has no style to apply")]
    MissingStyle,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no slide could be captured; nothing to export")]
    EmptyArchive,
    #[error("no slide is active")]
    NoActiveSlide,
    #[error("capture of slide {0} failed")]
    CaptureFailed(SlideId),
    #[error("failed to package archive: {0}")]
    Package(String),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<zip::result::ZipError> for ExportError {
    fn from(err: zip::result::ZipError) -> Self {
        ExportError::Package(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("invalid project snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("slide id {0} appears more than once in the snapshot")]
    DuplicateSlideId(SlideId),
}
