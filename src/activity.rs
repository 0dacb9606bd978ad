//! Events sent from background tasks to the UI, and the log pane they end up in.

use std::collections::VecDeque;

use crate::model::{DownloadOutcome, ItemReport};

/// Something a background task wants the UI to know.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PlaylistFound { title: String, entries: usize },
    ItemSkipped { url: String, reason: String },
    RunStarted { items: usize },
    ItemStarted { title: String },
    /// Fraction (0.0..=1.0) of the current item downloaded
    ItemProgress(f32),
    ItemFinished(ItemReport),
    RunComplete { succeeded: usize, total: usize },
}

impl Event {
    /// The line shown in the log pane, if this event produces one.
    pub fn log_line(&self) -> Option<String> {
        let line = match self {
            Self::PlaylistFound { title, entries } => {
                format!("🎵 Playlist found: {title} ({entries} entries)")
            }
            Self::ItemSkipped { url, reason } => format!("❌ Unavailable, skipped: {url} ({reason})"),
            Self::RunStarted { items } => format!("⬇️ Downloading {items} item(s)..."),
            Self::ItemStarted { title } => format!("🔸 Downloading: {title}"),
            Self::ItemProgress(_) => return None,
            Self::ItemFinished(ItemReport { title, outcome }) => match outcome {
                DownloadOutcome::Success(path) => {
                    format!("✅ Completed: {title} → {}", path.display())
                }
                DownloadOutcome::NoMatchingEncoding => {
                    format!("⚠️ No matching stream for: {title}")
                }
                DownloadOutcome::Failure(reason) => format!("❌ Error in {title}: {reason}"),
            },
            Self::RunComplete { succeeded, total } => {
                format!("🎉 Download complete! ({succeeded}/{total} succeeded)")
            }
        };
        Some(line)
    }
}

/// Append-only, bounded list of human-readable lines.
#[derive(Debug)]
pub struct LogPane {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LogPane {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }
}
