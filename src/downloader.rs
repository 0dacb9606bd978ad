use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use rust_embed::RustEmbed;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    process::Command,
};
use tracing::{debug, info, warn};

use crate::error::PlatformError;
use crate::model::{Encoding, MediaItem, PlaylistReference};
use crate::platform::{PlatformClient, PlaylistListing, ProgressSink};
use crate::progress::{PROGRESS_PREFIX, SAVED_PREFIX, parse_progress_from_line, parse_saved_path};

/// Optional bundled yt-dlp binary. Drop it into `assets/` to ship it.
#[derive(RustEmbed)]
#[folder = "assets/"]
pub struct Asset;

const BIN: &str = if cfg!(target_os = "windows") { "yt-dlp.exe" } else { "yt-dlp" };

/// stderr fragments yt-dlp prints for entries that exist but cannot be fetched.
const UNAVAILABLE_MARKERS: &[&str] = &[
    "video unavailable",
    "private video",
    "this video is not available",
    "has been removed",
    "not available in your country",
    "blocked it in your country",
    "members-only",
    "sign in to confirm your age",
];

/// Platform client backed by the yt-dlp command-line tool.
#[derive(Debug, Clone)]
pub struct YtDlpClient {
    binary: PathBuf,
}

impl YtDlpClient {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Uses the bundled binary when one was embedded, otherwise yt-dlp on `PATH`.
    pub fn locate() -> Result<Self, PlatformError> {
        if let Some(data) = Asset::get(BIN) {
            let tmp = std::env::temp_dir().join(BIN);
            if extract_bundled(&tmp, &data.data)? {
                debug!(path = %tmp.display(), "extracted bundled yt-dlp");
            }
            info!(path = %tmp.display(), "using bundled yt-dlp");
            return Ok(Self::new(tmp));
        }

        let binary = which::which(BIN).map_err(|_| PlatformError::ToolMissing)?;
        info!(path = %binary.display(), "using yt-dlp from PATH");
        Ok(Self::new(binary))
    }

    async fn run_json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T, PlatformError> {
        debug!(?args, "running yt-dlp");
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(command_error(args, &String::from_utf8_lossy(&output.stderr)));
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

#[async_trait]
impl PlatformClient for YtDlpClient {
    async fn resolve_playlist(
        &self,
        reference: &PlaylistReference,
    ) -> Result<PlaylistListing, PlatformError> {
        let playlist: FlatPlaylist = self
            .run_json(&[
                "--flat-playlist",
                "--yes-playlist",
                "--dump-single-json",
                "--no-warnings",
                reference.as_str(),
            ])
            .await?;
        Ok(playlist.into_listing())
    }

    async fn fetch_item_metadata(&self, url: &str) -> Result<MediaItem, PlatformError> {
        let video: VideoInfo = self
            .run_json(&["--dump-json", "--no-playlist", "--no-warnings", url])
            .await?;
        Ok(video.into_media_item(url))
    }

    async fn download_encoding(
        &self,
        item: &MediaItem,
        encoding: &Encoding,
        destination: &Path,
        progress: ProgressSink<'_>,
    ) -> Result<PathBuf, PlatformError> {
        let progress_template = format!("download:{PROGRESS_PREFIX}%(progress._percent_str)s");
        let print_template = format!("after_move:{SAVED_PREFIX}%(filepath)s");
        let destination = destination.to_string_lossy();
        let args = [
            "-f",
            encoding.format_id.as_str(),
            "--no-playlist",
            "--newline",
            "--color",
            "no_color",
            "--progress",
            "--progress-template",
            progress_template.as_str(),
            "--print",
            print_template.as_str(),
            "-P",
            &*destination,
            "-o",
            "%(title)s.%(ext)s",
            item.url.as_str(),
        ];
        debug!(?args, "running yt-dlp");

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("yt-dlp stdout not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("yt-dlp stderr not captured"))?;

        let read_stdout = async {
            let mut saved = None;
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                if let Some(fraction) = parse_progress_from_line(&line) {
                    progress(fraction);
                } else if let Some(path) = parse_saved_path(&line) {
                    saved = Some(PathBuf::from(path));
                } else {
                    debug!(line = %line, "yt-dlp");
                }
            }
            Ok::<_, std::io::Error>(saved)
        };
        let read_stderr = async {
            let mut text = String::new();
            stderr.read_to_string(&mut text).await.map(|_| text)
        };

        let (saved, stderr_text) = tokio::join!(read_stdout, read_stderr);
        let status = child.wait().await?;
        let stderr_text = stderr_or_empty(stderr_text);

        if !status.success() {
            return Err(command_error(&args, &stderr_text));
        }
        if !stderr_text.trim().is_empty() {
            warn!(stderr = stderr_text.trim(), "yt-dlp reported warnings");
        }
        saved?.ok_or(PlatformError::NoOutputFile)
    }
}

/// Writes `bytes` to `target` unless an identical copy is already there.
/// Returns whether the file was (re)written.
fn extract_bundled(target: &Path, bytes: &[u8]) -> std::io::Result<bool> {
    let current = std::fs::metadata(target).ok().map(|m| m.len());
    if current == Some(bytes.len() as u64) && std::fs::read(target)? == bytes {
        return Ok(false);
    }

    // A partial write must never be picked up as the binary.
    let part = target.with_extension("part");
    let mut f = File::create(&part)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    drop(f);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&part, std::fs::Permissions::from_mode(0o755))?;
    }
    std::fs::rename(&part, target)?;
    Ok(true)
}

fn stderr_or_empty(text: std::io::Result<String>) -> String {
    text.unwrap_or_else(|err| {
        warn!(%err, "could not read yt-dlp stderr");
        String::new()
    })
}

/// Maps a failed invocation onto `ItemUnavailable` when yt-dlp says so.
fn command_error(args: &[&str], stderr: &str) -> PlatformError {
    let message = stderr
        .lines()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| stderr.lines().rev().find(|l| !l.trim().is_empty()))
        .unwrap_or("no error output")
        .trim()
        .to_owned();

    let lower = message.to_lowercase();
    if UNAVAILABLE_MARKERS.iter().any(|m| lower.contains(m)) {
        PlatformError::ItemUnavailable(message)
    } else {
        PlatformError::Command {
            command: format!("yt-dlp {}", args.join(" ")),
            stderr: message,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FlatPlaylist {
    title: Option<String>,
    #[serde(default)]
    entries: Vec<Option<FlatEntry>>,
}

#[derive(Debug, Deserialize)]
struct FlatEntry {
    id: Option<String>,
    url: Option<String>,
}

impl FlatPlaylist {
    fn into_listing(self) -> PlaylistListing {
        let entries = self
            .entries
            .into_iter()
            .flatten()
            .filter_map(|e| match (e.url, e.id) {
                (Some(url), _) => Some(url),
                (None, Some(id)) => Some(format!("https://www.youtube.com/watch?v={id}")),
                (None, None) => {
                    warn!("playlist entry without url or id");
                    None
                }
            })
            .collect();

        PlaylistListing {
            title: self.title.unwrap_or_else(|| "Untitled playlist".to_owned()),
            entries,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    id: String,
    title: String,
    webpage_url: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    formats: Vec<Format>,
}

#[derive(Debug, Deserialize)]
struct Format {
    format_id: String,
    ext: Option<String>,
    height: Option<u32>,
    vcodec: Option<String>,
    acodec: Option<String>,
}

impl Format {
    fn has(codec: &Option<String>) -> bool {
        codec.as_deref().is_some_and(|c| c != "none")
    }

    fn into_encoding(self) -> Encoding {
        Encoding {
            progressive: Self::has(&self.vcodec) && Self::has(&self.acodec),
            format_id: self.format_id,
            height: self.height,
            extension: self.ext.unwrap_or_default(),
        }
    }
}

impl VideoInfo {
    // yt-dlp lists formats worst to best, which is the order `Encoding`s keep.
    fn into_media_item(self, requested_url: &str) -> MediaItem {
        MediaItem {
            url: self.webpage_url.unwrap_or_else(|| requested_url.to_owned()),
            id: self.id,
            title: self.title,
            thumbnail_url: self.thumbnail,
            encodings: self.formats.into_iter().map(Format::into_encoding).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_binary_is_rewritten_when_stale() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("yt-dlp");
        let bundled = b"#!/bin/sh\necho 2024.08.06\n";

        assert!(extract_bundled(&target, bundled).unwrap());
        assert!(!extract_bundled(&target, bundled).unwrap());

        // Half-written leftover from an interrupted start.
        std::fs::write(&target, &bundled[..5]).unwrap();
        assert!(extract_bundled(&target, bundled).unwrap());
        assert_eq!(std::fs::read(&target).unwrap(), bundled);

        // Same size, older release.
        std::fs::write(&target, b"#!/bin/sh\necho 2023.08.06\n").unwrap();
        assert!(extract_bundled(&target, bundled).unwrap());
        assert_eq!(std::fs::read(&target).unwrap(), bundled);
        assert!(!dir.path().join("yt-dlp.part").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&target).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn unreadable_stderr_falls_back_to_empty() {
        assert_eq!(stderr_or_empty(Ok("WARNING: slow\n".to_owned())), "WARNING: slow\n");
        assert_eq!(stderr_or_empty(Err(std::io::Error::other("pipe closed"))), "");
    }

    #[test]
    fn flat_playlist_keeps_order_and_builds_missing_urls() {
        let json = r#"{
            "title": "Mix",
            "entries": [
                {"id": "a1", "url": "https://www.youtube.com/watch?v=a1"},
                null,
                {"id": "b2"},
                {"title": "ghost"}
            ]
        }"#;
        let listing = serde_json::from_str::<FlatPlaylist>(json).unwrap().into_listing();
        assert_eq!(listing.title, "Mix");
        assert_eq!(
            listing.entries,
            [
                "https://www.youtube.com/watch?v=a1",
                "https://www.youtube.com/watch?v=b2"
            ]
        );
    }

    #[test]
    fn video_info_marks_progressive_formats() {
        let json = r#"{
            "id": "a1",
            "title": "Song",
            "thumbnail": "https://i.ytimg.com/vi/a1/hqdefault.jpg",
            "formats": [
                {"format_id": "sb0", "ext": "mhtml", "vcodec": "none", "acodec": "none"},
                {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2"},
                {"format_id": "18", "ext": "mp4", "height": 360, "vcodec": "avc1", "acodec": "mp4a.40.2"},
                {"format_id": "137", "ext": "mp4", "height": 1080, "vcodec": "avc1", "acodec": "none"}
            ]
        }"#;
        let item = serde_json::from_str::<VideoInfo>(json)
            .unwrap()
            .into_media_item("https://youtu.be/a1");

        assert_eq!(item.url, "https://youtu.be/a1");
        assert_eq!(item.thumbnail_url.as_deref(), Some("https://i.ytimg.com/vi/a1/hqdefault.jpg"));
        let progressive: Vec<_> = item
            .encodings
            .iter()
            .filter(|e| e.progressive)
            .map(|e| e.format_id.as_str())
            .collect();
        assert_eq!(progressive, ["18"]);
        assert_eq!(item.encodings[2].resolution().as_deref(), Some("360p"));
    }

    #[test]
    fn classifies_unavailable_items() {
        let err = command_error(&["--dump-json"], "WARNING: x\nERROR: [youtube] abc: Private video\n");
        assert!(matches!(err, PlatformError::ItemUnavailable(m) if m.contains("Private video")));

        let err = command_error(&["--dump-json"], "ERROR: Unable to download webpage: timed out\n");
        assert!(matches!(err, PlatformError::Command { stderr, .. } if stderr.contains("timed out")));

        let err = command_error(&[], "");
        assert!(matches!(err, PlatformError::Command { stderr, .. } if stderr == "no error output"));
    }
}
