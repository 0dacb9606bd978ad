//! Desktop playlist downloader: load a playlist, pick items and a quality,
//! download them into a folder.

// UI state and drawing
mod app;
// Background events and the log pane
mod activity;
// Startup defaults
mod config;
// yt-dlp backed platform client
mod downloader;
mod error;
mod logging;
// Playlist, item and outcome types
mod model;
mod orchestrator;
// Platform client seam
mod platform;
// yt-dlp progress line parsing
mod progress;
mod resolver;
// Thumbnail fetching and decoding
mod thumbnail;

use std::sync::Arc;

use eframe::egui;
use once_cell::sync::OnceCell;
use tokio::runtime::Runtime;
use tracing::error;

use app::{AppState, Notice, NoticeKind};
use config::Settings;
use downloader::YtDlpClient;

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Arc<Runtime>> = OnceCell::new();

/// Program entry point: initializes logging and the runtime, then launches the GUI
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::default();
    logging::init_tracing(&settings.default_log_filter);

    let rt = RUNTIME.get_or_try_init(|| Runtime::new().map(Arc::new))?;

    // Without yt-dlp the window still opens, explaining what is missing.
    let (client, startup_notice) = match YtDlpClient::locate() {
        Ok(client) => (client, None),
        Err(err) => {
            error!(%err, "platform client unavailable");
            (
                YtDlpClient::new("yt-dlp"),
                Some(Notice {
                    kind: NoticeKind::Error,
                    message: format!("{err}. Install yt-dlp and restart."),
                }),
            )
        }
    };

    let mut state = AppState::new(settings, Arc::new(client), rt.handle().clone());
    state.notice = startup_notice;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Playlist Downloader")
            .with_inner_size([850.0, 600.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Playlist Downloader",
        options,
        Box::new(|cc| {
            // Use dark theme visuals; the app can toggle to light
            cc.egui_ctx.set_visuals(egui::Visuals::dark());
            Box::new(state)
        }),
    )?;
    Ok(())
}
