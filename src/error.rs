use std::path::PathBuf;

use thiserror::Error;

/// The playlist URL typed by the user cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("enter the playlist URL")]
    Empty,
    #[error("the playlist URL is not valid: {0}")]
    Malformed(String),
    #[error("the URL does not name a playlist (missing `list` parameter)")]
    MissingListId,
}

/// Errors raised by a platform client.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The item was removed, made private or is blocked in this region.
    #[error("item unavailable: {0}")]
    ItemUnavailable(String),

    #[error("yt-dlp was not found (bundled or on PATH)")]
    ToolMissing,

    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("unexpected output from yt-dlp: {0}")]
    Output(#[from] serde_json::Error),

    #[error("yt-dlp reported success but no file was written")]
    NoOutputFile,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Resolution of a whole playlist failed before any item was listed.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error("could not list the playlist: {0}")]
    Listing(#[source] PlatformError),
}

/// Thumbnails are best-effort; this never reaches the user.
#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// A download run could not start.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("nothing selected")]
    NothingSelected,

    #[error("a download is already running")]
    AlreadyRunning,

    #[error("the download worker stopped unexpectedly")]
    WorkerLost,

    #[error("could not create {}: {source}", .path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
