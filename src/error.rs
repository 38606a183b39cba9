/// Application-level error type
///
/// Covers storage, files and images. Capture and generation failures are
/// recovered where they happen and keep their own error enums.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeckError {
    #[error("history database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("could not determine a data directory")]
    NoDataDir,
}

pub type Result<T> = std::result::Result<T, DeckError>;
