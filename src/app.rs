//! UI-thread application state and the egui front-end drawn from it.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use eframe::{App, Frame, egui};
use egui::{ColorImage, TextureOptions, Visuals};
use rfd::FileDialog;
use tokio::{
    runtime::Handle,
    sync::{
        mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
        oneshot,
    },
};
use tracing::{debug, error, info};

use crate::activity::{Event, LogPane};
use crate::config::Settings;
use crate::error::{ReferenceError, ResolveError, RunError};
use crate::model::{ItemList, Playlist, PlaylistReference, QualityPreference, RunReport};
use crate::orchestrator::{self, RunRequest};
use crate::platform::PlatformClient;
use crate::{resolver, thumbnail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

/// A message the user has to acknowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

fn reference_notice(err: &ReferenceError) -> Notice {
    match err {
        ReferenceError::Empty => Notice::new(NoticeKind::Warning, "Enter the playlist URL."),
        other => Notice::new(NoticeKind::Error, other.to_string()),
    }
}

impl Notice {
    fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn title(&self) -> &'static str {
        match self.kind {
            NoticeKind::Info => "Notice",
            NoticeKind::Warning => "Warning",
            NoticeKind::Error => "Error",
        }
    }
}

/// A download run in flight.
struct ActiveRun {
    stop: Arc<AtomicBool>,
    done: oneshot::Receiver<Result<RunReport, RunError>>,
    destination: PathBuf,
}

/// Thumbnail fetch results: (load generation, item id, image)
type ThumbnailResults = Arc<Mutex<Vec<(u64, String, ColorImage)>>>;

/// Everything the window shows. Owned by the UI thread; workers only get
/// snapshots and talk back through `events`.
pub struct AppState {
    settings: Settings,
    client: Arc<dyn PlatformClient>,
    runtime: Handle,

    /// Playlist URL input
    pub url_input: String,
    /// Destination folder input
    pub download_folder: String,
    /// Tier applied to the next run
    pub quality: QualityPreference,
    /// Resolved items with the user's selection
    pub items: ItemList,
    playlist_title: Option<String>,
    pub log: LogPane,
    pub notice: Option<Notice>,

    events_tx: UnboundedSender<Event>,
    events_rx: UnboundedReceiver<Event>,
    loading: Option<oneshot::Receiver<Result<Playlist, ResolveError>>>,
    active_run: Option<ActiveRun>,
    /// Title and fraction of the item being downloaded
    current: Option<(String, f32)>,
    /// Destination of the last finished run, for "Open folder"
    finished_folder: Option<PathBuf>,

    /// Bumped on every playlist load so stale thumbnails are dropped
    generation: u64,
    thumbnails: HashMap<String, egui::TextureHandle>,
    thumbnail_results: ThumbnailResults,
}

impl AppState {
    pub fn new(settings: Settings, client: Arc<dyn PlatformClient>, runtime: Handle) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        Self {
            url_input: String::new(),
            download_folder: settings.download_folder.display().to_string(),
            quality: settings.quality,
            items: ItemList::default(),
            playlist_title: None,
            log: LogPane::new(settings.log_capacity),
            notice: None,
            events_tx,
            events_rx,
            loading: None,
            active_run: None,
            current: None,
            finished_folder: None,
            generation: 0,
            thumbnails: HashMap::new(),
            thumbnail_results: Arc::new(Mutex::new(Vec::new())),
            settings,
            client,
            runtime,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.active_run.is_some()
    }

    /// Starts resolving `url_input` in the background. A URL that cannot be
    /// used leaves the current list untouched.
    pub fn load_playlist(&mut self) {
        if self.is_running() {
            self.notice = Some(Notice::new(
                NoticeKind::Warning,
                "Wait for the current download to finish before loading another playlist.",
            ));
            return;
        }
        if self.is_loading() {
            return;
        }
        if let Err(err) = PlaylistReference::parse(&self.url_input) {
            self.notice = Some(reference_notice(&err));
            return;
        }

        self.items.clear();
        self.playlist_title = None;
        self.thumbnails.clear();
        self.generation += 1;

        let (tx, rx) = oneshot::channel();
        let client = Arc::clone(&self.client);
        let events = self.events_tx.clone();
        let input = self.url_input.trim().to_owned();
        self.runtime.spawn(async move {
            let result = resolver::resolve(client.as_ref(), &input, &events).await;
            let _ = tx.send(result);
        });
        self.loading = Some(rx);
    }

    /// Snapshots the selection and starts a run on the worker.
    pub fn start_download(&mut self) -> Result<(), RunError> {
        if self.is_running() {
            return Err(RunError::AlreadyRunning);
        }
        let items = self.items.snapshot_selected();
        if items.is_empty() {
            return Err(RunError::NothingSelected);
        }

        let destination = PathBuf::from(self.download_folder.trim());
        let request = RunRequest {
            items,
            destination: destination.clone(),
            quality: self.quality,
            pause: self.settings.item_pause,
        };
        info!(items = request.items.len(), quality = %request.quality, "starting download run");

        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel();
        let client = Arc::clone(&self.client);
        let events = self.events_tx.clone();
        let worker_stop = Arc::clone(&stop);
        self.runtime.spawn(async move {
            let result = orchestrator::run(client.as_ref(), request, &worker_stop, &events).await;
            let _ = tx.send(result);
        });

        self.finished_folder = None;
        self.active_run = Some(ActiveRun {
            stop,
            done: rx,
            destination,
        });
        Ok(())
    }

    /// Download button handler: failures to start become notices.
    fn start_download_clicked(&mut self) {
        match self.start_download() {
            Ok(()) => {}
            Err(RunError::NothingSelected) => {
                self.notice = Some(Notice::new(
                    NoticeKind::Info,
                    "Select at least one item to download.",
                ));
            }
            Err(err) => self.notice = Some(Notice::new(NoticeKind::Warning, err.to_string())),
        }
    }

    /// Asks the active run to skip the items it has not started yet.
    pub fn request_stop(&mut self) {
        if let Some(run) = &self.active_run {
            if !run.stop.swap(true, Ordering::Relaxed) {
                self.log.push("⏹ Stopping after the current item...");
            }
        }
    }

    /// Applies whatever background tasks have produced since the last frame.
    pub fn poll(&mut self) {
        self.poll_loading();
        self.poll_run();

        while let Ok(event) = self.events_rx.try_recv() {
            match &event {
                Event::ItemStarted { title } => self.current = Some((title.clone(), 0.0)),
                Event::ItemProgress(fraction) => {
                    if let Some((_, current)) = &mut self.current {
                        *current = current.max(*fraction);
                    }
                }
                Event::RunComplete { .. } => self.current = None,
                _ => {}
            }
            if let Some(line) = event.log_line() {
                self.log.push(line);
            }
        }
    }

    fn poll_loading(&mut self) {
        let Some(rx) = &mut self.loading else { return };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(oneshot::error::TryRecvError::Empty) => return,
            Err(oneshot::error::TryRecvError::Closed) => {
                error!("playlist resolution task ended without a result");
                self.loading = None;
                return;
            }
        };
        self.loading = None;

        match result {
            Ok(playlist) => self.apply_playlist(playlist),
            Err(ResolveError::Reference(err)) => self.notice = Some(reference_notice(&err)),
            Err(err @ ResolveError::Listing(_)) => {
                self.log.push(format!("❌ {err}"));
                self.notice = Some(Notice::new(NoticeKind::Error, err.to_string()));
            }
        }
    }

    fn poll_run(&mut self) {
        let Some(run) = &mut self.active_run else { return };
        let result = match run.done.try_recv() {
            Ok(result) => result,
            Err(oneshot::error::TryRecvError::Empty) => return,
            Err(oneshot::error::TryRecvError::Closed) => {
                error!("download task ended without a result");
                Err(RunError::WorkerLost)
            }
        };
        let destination = run.destination.clone();
        self.active_run = None;
        self.current = None;

        match result {
            Ok(report) => {
                debug!(succeeded = report.succeeded(), total = report.items.len(), "run finished");
                self.finished_folder = Some(destination);
            }
            Err(err) => {
                self.log.push(format!("❌ {err}"));
                self.notice = Some(Notice::new(NoticeKind::Error, err.to_string()));
            }
        }
    }

    fn apply_playlist(&mut self, playlist: Playlist) {
        info!(title = %playlist.title, items = playlist.items.len(), "playlist loaded");
        self.playlist_title = Some(playlist.title);
        self.items.replace(playlist.items);
        self.fetch_thumbnails();
    }

    fn fetch_thumbnails(&self) {
        for entry in self.items.entries() {
            let Some(url) = entry.item.thumbnail_url.clone() else {
                continue;
            };
            let id = entry.item.id.clone();
            let results = Arc::clone(&self.thumbnail_results);
            let generation = self.generation;
            let size = self.settings.thumbnail_size;
            self.runtime.spawn_blocking(move || {
                match thumbnail::fetch_thumbnail(&url, size) {
                    Ok(img) => {
                        if let Ok(mut pending) = results.lock() {
                            pending.push((generation, id, img));
                        }
                    }
                    Err(err) => debug!(%url, %err, "thumbnail unavailable"),
                }
            });
        }
    }

    /// Uploads finished thumbnails of the current playlist as textures.
    fn load_thumbnails(&mut self, ctx: &egui::Context) {
        let pending = match self.thumbnail_results.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => return,
        };
        for (generation, id, img) in pending {
            if generation != self.generation {
                continue;
            }
            let tex = ctx.load_texture(format!("thumb-{id}"), img, TextureOptions::default());
            self.thumbnails.insert(id, tex);
        }
    }

    fn notice_window(&mut self, ctx: &egui::Context) {
        let Some(notice) = &self.notice else { return };
        let mut close = false;
        egui::Window::new(notice.title())
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(&notice.message);
                if ui.button("OK").clicked() {
                    close = true;
                }
            });
        if close {
            self.notice = None;
        }
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for AppState {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // 1️⃣ Background results first, so this frame shows them
        self.poll();
        self.load_thumbnails(ctx);

        let running = self.is_running();
        let loading = self.is_loading();

        // 2️⃣ Bottom panel: the log
        egui::TopBottomPanel::bottom("log_panel")
            .resizable(true)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.strong("Log");
                    if let Some((title, fraction)) = &self.current {
                        ui.add(
                            egui::ProgressBar::new(*fraction)
                                .show_percentage()
                                .text(title.as_str()),
                        );
                    }
                });
                egui::ScrollArea::vertical()
                    .id_source("log")
                    .auto_shrink([false; 2])
                    .stick_to_bottom(true)
                    .max_height(150.0)
                    .show(ui, |ui| {
                        for line in self.log.lines() {
                            ui.label(line);
                        }
                    });
            });

        // 3️⃣ Main panel: inputs, actions and the item list
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Playlist Downloader");
                let dark = ctx.style().visuals.dark_mode;
                let label = if dark { "☀ Light mode" } else { "🌙 Dark mode" };
                if ui.button(label).clicked() {
                    ctx.set_visuals(if dark { Visuals::light() } else { Visuals::dark() });
                }
            });

            ui.label("Playlist URL:");
            ui.add_enabled(
                !running && !loading,
                egui::TextEdit::singleline(&mut self.url_input).desired_width(f32::INFINITY),
            );

            ui.horizontal(|ui| {
                ui.label("Download folder:");
                ui.add_enabled(!running, egui::TextEdit::singleline(&mut self.download_folder));
                if ui.add_enabled(!running, egui::Button::new("📁 Browse…")).clicked() {
                    if let Some(folder) = FileDialog::new().set_directory(&self.download_folder).pick_folder() {
                        self.download_folder = folder.display().to_string();
                    }
                }
            });

            ui.horizontal(|ui| {
                ui.label("Quality:");
                ui.add_enabled_ui(!running, |ui| {
                    egui::ComboBox::from_id_source("quality")
                        .selected_text(self.quality.label())
                        .show_ui(ui, |ui| {
                            for q in QualityPreference::ALL {
                                ui.selectable_value(&mut self.quality, q, q.label());
                            }
                        });
                });
            });

            ui.horizontal(|ui| {
                if ui
                    .add_enabled(!running && !loading, egui::Button::new("🔍 Load playlist"))
                    .clicked()
                {
                    self.load_playlist();
                }
                if ui
                    .add_enabled(
                        !running && !loading && !self.items.is_empty(),
                        egui::Button::new("⬇️ Download selected"),
                    )
                    .clicked()
                {
                    self.start_download_clicked();
                }
                if ui.add_enabled(running, egui::Button::new("⏹ Stop")).clicked() {
                    self.request_stop();
                }
                if let Some(folder) = self.finished_folder.clone() {
                    if ui.button("📂 Open folder").clicked() {
                        open_folder(folder);
                    }
                }
                if loading {
                    ui.spinner();
                    ui.label("Loading playlist…");
                }
            });

            ui.separator();
            if let Some(title) = &self.playlist_title {
                ui.horizontal(|ui| {
                    ui.strong(title.as_str());
                    ui.label(format!(
                        "{}/{} selected",
                        self.items.selected_count(),
                        self.items.len()
                    ));
                    if ui.add_enabled(!running, egui::Button::new("All")).clicked() {
                        self.items.set_all(true);
                    }
                    if ui.add_enabled(!running, egui::Button::new("None")).clicked() {
                        self.items.set_all(false);
                    }
                });
            }

            let [width, height] = self.settings.thumbnail_size;
            egui::ScrollArea::vertical()
                .id_source("items")
                .auto_shrink([false; 2])
                .show(ui, |ui| {
                    for entry in self.items.entries_mut() {
                        ui.horizontal(|ui| {
                            match self.thumbnails.get(&entry.item.id) {
                                Some(tex) => {
                                    ui.image(tex);
                                }
                                None => {
                                    ui.allocate_exact_size(
                                        egui::vec2(width as f32, height as f32),
                                        egui::Sense::hover(),
                                    );
                                }
                            }
                            ui.add_enabled(
                                !running,
                                egui::Checkbox::new(&mut entry.selected, entry.item.title.as_str()),
                            );
                        });
                    }
                });
        });

        // 4️⃣ Modal-ish notices
        self.notice_window(ctx);

        // Request periodic repaint for progress updates
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}

/// Opens `folder` in the platform file manager.
fn open_folder(folder: PathBuf) {
    std::thread::spawn(move || {
        #[cfg(target_os = "windows")]
        let opener = "explorer";
        #[cfg(target_os = "macos")]
        let opener = "open";
        #[cfg(all(unix, not(target_os = "macos")))]
        let opener = "xdg-open";

        if let Err(err) = std::process::Command::new(opener).arg(&folder).spawn() {
            error!(folder = %folder.display(), %err, "could not open folder");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DownloadOutcome;
    use crate::platform::fake::{FakePlatform, media_item, progressive};

    const URL: &str = "https://www.youtube.com/playlist?list=PLtest";

    fn state(platform: FakePlatform, folder: &std::path::Path) -> AppState {
        let settings = Settings {
            download_folder: folder.to_owned(),
            item_pause: Duration::ZERO,
            ..Settings::default()
        };
        AppState::new(settings, Arc::new(platform), Handle::current())
    }

    async fn settle(state: &mut AppState) {
        for _ in 0..200 {
            state.poll();
            if !state.is_loading() && !state.is_running() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("background work did not finish");
    }

    fn two_item_platform() -> FakePlatform {
        let mut platform = FakePlatform::with_items(vec![
            media_item("one", vec![progressive("18", 360), progressive("22", 720)]),
            media_item("three", vec![progressive("18", 360)]),
        ]);
        platform
            .entries
            .insert(1, "https://www.youtube.com/watch?v=two".to_owned());
        platform
    }

    #[tokio::test]
    async fn load_then_download_selected() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(two_item_platform(), dir.path());
        app.url_input = URL.to_owned();

        app.load_playlist();
        settle(&mut app).await;
        assert_eq!(app.items.len(), 2);
        assert!(app.log.lines().any(|l| l.contains("Unavailable")));

        app.items.set_all(true);
        app.quality = QualityPreference::Medium;
        app.start_download().unwrap();
        settle(&mut app).await;

        let lines: Vec<_> = app.log.lines().collect();
        assert!(lines.iter().any(|l| l.starts_with("✅") && l.contains("Video one")));
        assert!(lines.iter().any(|l| l.starts_with("⚠️") && l.contains("Video three")));
        assert!(lines.last().unwrap().contains("Download complete"));
        assert_eq!(app.finished_folder.as_deref(), Some(dir.path()));
        assert!(app.notice.is_none());
    }

    #[tokio::test]
    async fn second_start_is_refused_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(two_item_platform(), dir.path());
        app.url_input = URL.to_owned();
        app.load_playlist();
        settle(&mut app).await;
        app.items.set_all(true);

        app.start_download().unwrap();
        assert!(matches!(app.start_download(), Err(RunError::AlreadyRunning)));

        app.load_playlist();
        assert!(!app.is_loading());
        assert_eq!(app.items.len(), 2);
        assert_eq!(app.notice.as_ref().map(|n| n.kind), Some(NoticeKind::Warning));

        settle(&mut app).await;
    }

    #[tokio::test]
    async fn nothing_selected_shows_notice() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(two_item_platform(), dir.path());
        app.url_input = URL.to_owned();
        app.load_playlist();
        settle(&mut app).await;

        app.start_download_clicked();
        assert!(!app.is_running());
        assert_eq!(app.notice.as_ref().map(|n| n.kind), Some(NoticeKind::Info));
    }

    #[tokio::test]
    async fn bad_urls_become_notices() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(FakePlatform::default(), dir.path());

        app.load_playlist();
        settle(&mut app).await;
        assert_eq!(
            app.notice.take(),
            Some(Notice::new(NoticeKind::Warning, "Enter the playlist URL."))
        );

        app.url_input = "https://www.youtube.com/watch?v=abc".to_owned();
        app.load_playlist();
        settle(&mut app).await;
        assert_eq!(app.notice.map(|n| n.kind), Some(NoticeKind::Error));
        assert!(app.items.is_empty());
    }

    #[tokio::test]
    async fn invalid_url_keeps_loaded_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(two_item_platform(), dir.path());
        app.url_input = URL.to_owned();
        app.load_playlist();
        settle(&mut app).await;
        app.items.set_all(true);
        let generation = app.generation;

        for input in ["", "   ", "https://www.youtube.com/watch?v=abc"] {
            app.url_input = input.to_owned();
            app.load_playlist();
            assert!(!app.is_loading());
            assert!(app.notice.take().is_some());
            assert_eq!(app.items.len(), 2);
            assert_eq!(app.items.selected_count(), 2);
            assert_eq!(app.generation, generation);
        }
    }

    #[tokio::test]
    async fn unreachable_thumbnail_does_not_affect_item() {
        let mut item = media_item("one", vec![progressive("18", 360)]);
        item.thumbnail_url = Some("http://127.0.0.1:9/x.jpg".to_owned());
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(FakePlatform::with_items(vec![item]), dir.path());
        app.url_input = URL.to_owned();

        app.load_playlist();
        settle(&mut app).await;
        assert_eq!(app.items.len(), 1);
        assert!(app.notice.is_none());

        app.items.set_all(true);
        app.start_download().unwrap();
        settle(&mut app).await;

        assert!(app.log.lines().any(|l| l.starts_with("✅") && l.contains("Video one")));
        assert!(app.notice.is_none());
        assert!(app.thumbnails.is_empty());
        assert!(app.thumbnail_results.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stop_skips_remaining_items() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(two_item_platform(), dir.path());
        app.url_input = URL.to_owned();
        app.load_playlist();
        settle(&mut app).await;
        app.items.set_all(true);

        // The worker has not been polled yet, so no item has started.
        app.start_download().unwrap();
        app.request_stop();
        settle(&mut app).await;

        let stopped = DownloadOutcome::Failure(orchestrator::STOPPED.to_owned());
        let expected = Event::ItemFinished(crate::model::ItemReport {
            title: "Video one".into(),
            outcome: stopped,
        })
        .log_line()
        .unwrap();
        assert!(app.log.lines().any(|l| l == expected));
    }
}
