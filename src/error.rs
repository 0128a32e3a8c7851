// src/error.rs

use thiserror::Error;

/// Rejections the transport reports back to the host.
///
/// Decode and fetch failures are not in here: they stay attached to the
/// track that failed and never abort a transport operation.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("No stems loaded.")]
    NoStemsLoaded,

    #[error("Track index {index} out of range ({len} tracks)")]
    TrackIndexOutOfRange { index: usize, len: usize },

    #[error("Mixdown failed: {0}")]
    ExportFailed(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
