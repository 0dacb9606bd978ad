//! Sequential download of the selected items.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::activity::Event;
use crate::error::RunError;
use crate::model::{DownloadOutcome, Encoding, ItemReport, MediaItem, QualityPreference, RunReport};
use crate::platform::PlatformClient;

/// Reason recorded for items skipped after the user pressed Stop.
pub const STOPPED: &str = "stopped by user";

/// Snapshot of everything a run needs, taken on the UI thread at start.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub items: Vec<MediaItem>,
    /// Created if missing; empty means the current directory
    pub destination: PathBuf,
    pub quality: QualityPreference,
    pub pause: Duration,
}

/// Picks the encoding `quality` asks for. Only combined (progressive)
/// encodings are ever considered.
pub fn select_encoding(encodings: &[Encoding], quality: QualityPreference) -> Option<&Encoding> {
    let mut combined = encodings.iter().filter(|e| e.progressive);
    match quality {
        // Tallest wins; among equals the platform's later (better) entry.
        QualityPreference::Highest => combined.max_by_key(|e| e.height.unwrap_or(0)),
        QualityPreference::Medium | QualityPreference::Low => {
            let height = quality.required_height();
            combined.find(|e| e.height == height)
        }
    }
}

/// Downloads every item of `request` one after another.
///
/// Each item yields exactly one [`ItemReport`]; a failing item never stops
/// the ones after it. Once `stop` is set, the remaining items are reported as
/// failures without contacting the platform.
pub async fn run(
    client: &dyn PlatformClient,
    request: RunRequest,
    stop: &AtomicBool,
    events: &UnboundedSender<Event>,
) -> Result<RunReport, RunError> {
    if request.items.is_empty() {
        return Err(RunError::NothingSelected);
    }

    let destination = if request.destination.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        request.destination
    };
    tokio::fs::create_dir_all(&destination)
        .await
        .map_err(|source| RunError::Destination {
            path: destination.clone(),
            source,
        })?;

    let total = request.items.len();
    info!(total, quality = %request.quality, destination = %destination.display(), "download run started");
    let _ = events.send(Event::RunStarted { items: total });

    let report_progress = |fraction: f32| {
        let _ = events.send(Event::ItemProgress(fraction));
    };

    let mut report = RunReport::default();
    for (index, item) in request.items.into_iter().enumerate() {
        if index > 0 && !request.pause.is_zero() && !stop.load(Ordering::Relaxed) {
            tokio::time::sleep(request.pause).await;
        }
        // Stop may arrive during the pause.
        let outcome = if stop.load(Ordering::Relaxed) {
            DownloadOutcome::Failure(STOPPED.to_owned())
        } else {
            let _ = events.send(Event::ItemStarted {
                title: item.title.clone(),
            });
            download_one(client, &item, &destination, request.quality, &report_progress).await
        };

        match &outcome {
            DownloadOutcome::Success(path) => info!(title = %item.title, path = %path.display(), "downloaded"),
            DownloadOutcome::NoMatchingEncoding => warn!(title = %item.title, "no matching encoding"),
            DownloadOutcome::Failure(reason) => error!(title = %item.title, %reason, "download failed"),
        }

        let item_report = ItemReport {
            title: item.title,
            outcome,
        };
        let _ = events.send(Event::ItemFinished(item_report.clone()));
        report.items.push(item_report);
    }

    let succeeded = report.succeeded();
    info!(succeeded, total, "download run complete");
    let _ = events.send(Event::RunComplete { succeeded, total });
    Ok(report)
}

async fn download_one(
    client: &dyn PlatformClient,
    item: &MediaItem,
    destination: &Path,
    quality: QualityPreference,
    progress: &(dyn Fn(f32) + Send + Sync),
) -> DownloadOutcome {
    let Some(encoding) = select_encoding(&item.encodings, quality) else {
        return DownloadOutcome::NoMatchingEncoding;
    };
    debug!(
        title = %item.title,
        format = %encoding.format_id,
        ext = %encoding.extension,
        resolution = encoding.resolution().as_deref().unwrap_or("audio"),
        "selected encoding"
    );

    match client
        .download_encoding(item, encoding, destination, progress)
        .await
    {
        Ok(path) => DownloadOutcome::Success(path),
        Err(err) => DownloadOutcome::Failure(err.to_string()),
    }
}
