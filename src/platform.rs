use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::model::{Encoding, MediaItem, PlaylistReference};

/// Entries of a playlist before per-item metadata is fetched.
#[derive(Debug, Clone, Default)]
pub struct PlaylistListing {
    pub title: String,
    /// Item page URLs in platform order
    pub entries: Vec<String>,
}

/// Receives download progress as a fraction in `0.0..=1.0`.
pub type ProgressSink<'a> = &'a (dyn Fn(f32) + Send + Sync);

/// The external media platform. Everything network-facing goes through here.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn resolve_playlist(
        &self,
        reference: &PlaylistReference,
    ) -> Result<PlaylistListing, PlatformError>;

    /// Fetches title, thumbnail and encodings of one entry.
    /// `PlatformError::ItemUnavailable` marks entries that cannot be fetched.
    async fn fetch_item_metadata(&self, url: &str) -> Result<MediaItem, PlatformError>;

    /// Downloads `encoding` of `item` into `destination` using the platform's
    /// title-derived file name, returning the written path.
    async fn download_encoding(
        &self,
        item: &MediaItem,
        encoding: &Encoding,
        destination: &Path,
        progress: ProgressSink<'_>,
    ) -> Result<PathBuf, PlatformError>;
}
