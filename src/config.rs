use std::path::PathBuf;
use std::time::Duration;

use crate::model::QualityPreference;

/// Application settings. Nothing is read from disk; these are the defaults
/// every session starts with.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Pre-filled destination folder
    pub download_folder: PathBuf,
    /// Quality tier selected at startup
    pub quality: QualityPreference,
    /// Courtesy pause between consecutive item downloads
    pub item_pause: Duration,
    /// Thumbnail size in the item list (width, height)
    pub thumbnail_size: [u32; 2],
    /// Lines kept in the log pane before the oldest are dropped
    pub log_capacity: usize,
    /// Filter used when `RUST_LOG` is unset
    pub default_log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            download_folder: PathBuf::from("./downloads"),
            quality: QualityPreference::Highest,
            item_pause: Duration::from_secs(1),
            thumbnail_size: [120, 70],
            log_capacity: 1000,
            default_log_filter: "playlist_downloader=info".to_owned(),
        }
    }
}
