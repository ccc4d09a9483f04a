use thiserror::Error;

/// Result alias for registry and recognition operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by facereg operations.
///
/// `Validation`, `ImageDecode`, `NoFaceDetected` and `EmptyRegistry` are
/// user-facing and map to client-error responses. `DimensionMismatch` is
/// recovered inside the match engine (the offending candidate is skipped).
/// Everything else is internal and surfaced to callers generically.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(&'static str),

    #[error("invalid image data: {0}")]
    ImageDecode(String),

    #[error("no face detected in the image")]
    NoFaceDetected,

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("no known faces in the database")]
    EmptyRegistry,

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("detector request failed: {0}")]
    Detector(#[from] reqwest::Error),

    #[error("internal error: {0}")]
    Internal(String),
}
