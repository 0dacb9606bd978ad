use std::fmt;
use std::path::PathBuf;

use url::Url;

use crate::error::ReferenceError;

/// A validated playlist URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistReference {
    url: Url,
    list_id: String,
}

impl PlaylistReference {
    /// Validates user input. The URL must be http(s) and carry a non-empty
    /// `list` query parameter made of `[A-Za-z0-9_-]`.
    pub fn parse(input: &str) -> Result<Self, ReferenceError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ReferenceError::Empty);
        }

        let url = Url::parse(input).map_err(|e| ReferenceError::Malformed(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ReferenceError::Malformed(format!(
                "unsupported scheme `{}`",
                url.scheme()
            )));
        }

        let list_id = url
            .query_pairs()
            .find(|(key, _)| key == "list")
            .map(|(_, value)| value.into_owned())
            .ok_or(ReferenceError::MissingListId)?;

        let valid = !list_id.is_empty()
            && list_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ReferenceError::MissingListId);
        }

        Ok(Self { url, list_id })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn list_id(&self) -> &str {
        &self.list_id
    }
}

impl fmt::Display for PlaylistReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// One downloadable stream of an item, as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding {
    /// Platform format identifier (passed back on download)
    pub format_id: String,
    /// Vertical resolution in pixels, if the stream has video
    pub height: Option<u32>,
    /// Audio and video combined in one stream
    pub progressive: bool,
    /// Container extension (mp4, webm, ...)
    pub extension: String,
}

impl Encoding {
    /// Resolution label in the familiar `720p` form.
    pub fn resolution(&self) -> Option<String> {
        self.height.map(|h| format!("{h}p"))
    }
}

/// One playlist entry with its fetched metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    /// Platform identifier, stable across a session
    pub id: String,
    /// Page URL of the item
    pub url: String,
    /// Human-readable title
    pub title: String,
    /// Thumbnail image URL, when the platform reports one
    pub thumbnail_url: Option<String>,
    /// Available encodings, ordered worst to best by the platform's ranking
    pub encodings: Vec<Encoding>,
}

/// A resolved playlist.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    pub title: String,
    pub items: Vec<MediaItem>,
}

/// Which encoding to pick for every item of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityPreference {
    /// Best combined stream available
    #[default]
    Highest,
    /// Combined stream at exactly 720p
    Medium,
    /// Combined stream at exactly 360p
    Low,
}

impl QualityPreference {
    pub const ALL: [QualityPreference; 3] = [Self::Highest, Self::Medium, Self::Low];

    pub fn label(self) -> &'static str {
        match self {
            Self::Highest => "Highest (best)",
            Self::Medium => "Medium (720p)",
            Self::Low => "Low (360p)",
        }
    }

    /// Exact progressive height required by this tier, if any.
    pub fn required_height(self) -> Option<u32> {
        match self {
            Self::Highest => None,
            Self::Medium => Some(720),
            Self::Low => Some(360),
        }
    }
}

/// Maps a free-form label onto a tier. Anything unrecognised means Highest.
impl From<&str> for QualityPreference {
    fn from(label: &str) -> Self {
        let label = label.trim().to_ascii_lowercase();
        if label.starts_with("medium") || label == "720p" {
            Self::Medium
        } else if label.starts_with("low") || label == "360p" {
            Self::Low
        } else {
            Self::Highest
        }
    }
}

impl fmt::Display for QualityPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of processing one selected item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Saved to the given path
    Success(PathBuf),
    /// The requested tier has no matching stream
    NoMatchingEncoding,
    /// Platform or I/O error while downloading
    Failure(String),
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Outcome of one item together with the title it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub title: String,
    pub outcome: DownloadOutcome,
}

/// Everything a finished run produced, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub items: Vec<ItemReport>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|r| r.outcome.is_success()).count()
    }
}

/// An item as shown in the list, with the user's choice.
#[derive(Debug, Clone)]
pub struct ListEntry {
    pub item: MediaItem,
    pub selected: bool,
}

/// The selectable item list owned by the UI thread.
#[derive(Debug, Default)]
pub struct ItemList {
    entries: Vec<ListEntry>,
}

impl ItemList {
    pub fn replace(&mut self, items: Vec<MediaItem>) {
        self.entries = items
            .into_iter()
            .map(|item| ListEntry {
                item,
                selected: false,
            })
            .collect();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[ListEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [ListEntry] {
        &mut self.entries
    }

    pub fn set_all(&mut self, selected: bool) {
        for entry in &mut self.entries {
            entry.selected = selected;
        }
    }

    pub fn selected_count(&self) -> usize {
        self.entries.iter().filter(|e| e.selected).count()
    }

    /// Copies the selected items, in list order, for handing to a worker.
    pub fn snapshot_selected(&self) -> Vec<MediaItem> {
        self.entries
            .iter()
            .filter(|e| e.selected)
            .map(|e| e.item.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> MediaItem {
        MediaItem {
            id: id.to_owned(),
            url: format!("https://www.youtube.com/watch?v={id}"),
            title: format!("Title {id}"),
            thumbnail_url: None,
            encodings: Vec::new(),
        }
    }

    #[test]
    fn accepts_playlist_urls() {
        let r = PlaylistReference::parse(
            "  https://www.youtube.com/playlist?list=PLabc_12-3  ",
        )
        .unwrap();
        assert_eq!(r.list_id(), "PLabc_12-3");

        let r = PlaylistReference::parse("https://youtube.com/watch?v=xyz&list=PL9").unwrap();
        assert_eq!(r.list_id(), "PL9");
    }

    #[test]
    fn rejects_bad_references() {
        assert_eq!(PlaylistReference::parse("   "), Err(ReferenceError::Empty));
        assert!(matches!(
            PlaylistReference::parse("not a url"),
            Err(ReferenceError::Malformed(_))
        ));
        assert!(matches!(
            PlaylistReference::parse("ftp://youtube.com/playlist?list=PL1"),
            Err(ReferenceError::Malformed(_))
        ));
        assert_eq!(
            PlaylistReference::parse("https://www.youtube.com/watch?v=abc"),
            Err(ReferenceError::MissingListId)
        );
        assert_eq!(
            PlaylistReference::parse("https://www.youtube.com/playlist?list="),
            Err(ReferenceError::MissingListId)
        );
        assert_eq!(
            PlaylistReference::parse("https://www.youtube.com/playlist?list=PL%20x"),
            Err(ReferenceError::MissingListId)
        );
    }

    #[test]
    fn quality_labels_fall_back_to_highest() {
        for q in QualityPreference::ALL {
            assert_eq!(QualityPreference::from(q.label()), q);
        }
        assert_eq!(QualityPreference::from("720p"), QualityPreference::Medium);
        assert_eq!(QualityPreference::from("ultra"), QualityPreference::Highest);
        assert_eq!(QualityPreference::from(""), QualityPreference::Highest);
    }

    #[test]
    fn snapshot_keeps_list_order() {
        let mut list = ItemList::default();
        list.replace(vec![item("a"), item("b"), item("c")]);
        list.entries_mut()[2].selected = true;
        list.entries_mut()[0].selected = true;

        let ids: Vec<_> = list.snapshot_selected().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, ["a", "c"]);
        assert_eq!(list.selected_count(), 2);

        list.set_all(false);
        assert!(list.snapshot_selected().is_empty());
    }

    #[test]
    fn replacing_resets_selection() {
        let mut list = ItemList::default();
        list.replace(vec![item("a")]);
        list.set_all(true);
        list.replace(vec![item("b"), item("c")]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.selected_count(), 0);
    }
}
