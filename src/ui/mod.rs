//! Desktop shell: routes between the loading, signed-out and upload views.

mod sign_in;
mod status;
pub mod style;
mod upload_view;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use eframe::egui;
use rfd::FileDialog;

use crate::classifier::{ClassifyError, HttpClassifier, ServiceHealth};
use crate::config::AppConfig;
use crate::image_file::ImageFile;
use crate::session::{GateView, SessionGate, SessionStore, StoredSessionProvider};
use crate::upload::{SelectionId, UploadController, UploadSettings};
use sign_in::{SignInForm, render_loading, render_sign_in};
use status::{StatusBarState, probe_status, render_status_bar, upload_status};
use style::StatusTone;
use upload_view::{UploadAction, render_upload};

/// Minimum window size.
pub const MIN_VIEWPORT_SIZE: egui::Vec2 = egui::vec2(560.0, 480.0);

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "bmp"];

type HealthOutcome = Result<(ServiceHealth, Option<usize>), ClassifyError>;

enum Screen {
    Loading,
    SignedOut,
    SignedIn(String),
}

pub struct PlateApp {
    auth: Arc<StoredSessionProvider>,
    gate: SessionGate,
    upload: UploadController,
    status: StatusBarState,
    sign_in: SignInForm,
    preview_texture: Option<(SelectionId, egui::TextureHandle)>,
    health_rx: Option<Receiver<HealthOutcome>>,
    last_upload_state: &'static str,
    visuals_set: bool,
}

impl PlateApp {
    pub fn new(config: &AppConfig) -> Result<Self, String> {
        let classifier = Arc::new(
            HttpClassifier::from_settings(&config.classifier).map_err(|err| err.to_string())?,
        );
        let store = SessionStore::new().map_err(|err| err.to_string())?;
        let auth = Arc::new(StoredSessionProvider::new(store));
        let gate = SessionGate::start(auth.clone());
        let upload = UploadController::new(classifier.clone(), UploadSettings::from_config(config));
        tracing::info!(endpoint = %classifier.endpoint(), "PlateScan started");
        Ok(Self {
            auth,
            gate,
            upload,
            status: StatusBarState::idle(),
            sign_in: SignInForm::default(),
            preview_texture: None,
            health_rx: Some(spawn_health_probe(classifier)),
            last_upload_state: "idle",
            visuals_set: false,
        })
    }

    fn apply_visuals(&mut self, ctx: &egui::Context) {
        if self.visuals_set {
            return;
        }
        let mut visuals = egui::Visuals::dark();
        style::apply_visuals(&mut visuals);
        ctx.set_visuals(visuals);
        self.visuals_set = true;
    }

    fn poll_background_jobs(&mut self) {
        if self.gate.poll() > 0 && self.gate.session().is_none() && !self.gate.is_loading() {
            self.upload.clear();
        }
        self.upload.poll();
        self.sync_upload_status();
        if let Some(rx) = &self.health_rx {
            match rx.try_recv() {
                Ok(outcome) => {
                    let (text, tone) = probe_status(&outcome);
                    self.status.set(text, tone);
                    self.health_rx = None;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => self.health_rx = None,
            }
        }
    }

    fn sync_upload_status(&mut self) {
        let state = self.upload.state();
        if state.name() == self.last_upload_state {
            return;
        }
        self.last_upload_state = state.name();
        if let Some((text, tone)) = upload_status(state) {
            self.status.set(text, tone);
        }
    }

    fn screen(&self) -> Screen {
        match self.gate.view() {
            GateView::Loading => Screen::Loading,
            GateView::SignedOut => Screen::SignedOut,
            GateView::SignedIn(session) => Screen::SignedIn(session.user_id.clone()),
        }
    }

    fn handle_sign_in(&mut self, ctx: &egui::Context) {
        let Some(session) = render_sign_in(ctx, &mut self.sign_in) else {
            return;
        };
        match self.auth.store_session(session) {
            Ok(_) => self.sign_in.reset(),
            Err(err) => {
                tracing::warn!("Failed to store session: {err}");
                self.status.set(err.to_string(), StatusTone::Error);
                self.sign_in.error = Some(err.to_string());
            }
        }
    }

    fn handle_upload(&mut self, ctx: &egui::Context, user_id: &str) {
        self.take_dropped_file(ctx);
        self.refresh_preview_texture(ctx);
        let texture = self.preview_texture.as_ref().map(|(_, texture)| texture);
        let Some(action) = render_upload(ctx, user_id, &self.upload, texture) else {
            return;
        };
        match action {
            UploadAction::Pick => {
                if let Some(path) = pick_image() {
                    self.select_path(path);
                }
            }
            UploadAction::Submit => {
                if let Err(rejected) = self.upload.submit() {
                    self.status.set(rejected.to_string(), StatusTone::Warning);
                }
            }
            UploadAction::Clear => self.upload.clear(),
            UploadAction::SignOut => {
                self.upload.clear();
                self.auth.sign_out();
            }
        }
        self.sync_upload_status();
    }

    fn select_path(&mut self, path: PathBuf) {
        match ImageFile::read(&path) {
            Ok(file) => {
                self.upload.select(file);
            }
            Err(err) => {
                tracing::warn!("Could not open image: {err}");
                self.status.set(err.to_string(), StatusTone::Error);
            }
        }
    }

    fn take_dropped_file(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.first().cloned());
        let Some(dropped) = dropped else {
            return;
        };
        let file = ImageFile::from_drop(
            &dropped.name,
            &dropped.mime,
            dropped.bytes,
            dropped.path.as_deref(),
        );
        match file {
            Ok(file) => {
                self.upload.select(file);
            }
            Err(err) => {
                tracing::warn!("Could not take dropped file: {err}");
                self.status.set(err.to_string(), StatusTone::Error);
            }
        }
    }

    fn refresh_preview_texture(&mut self, ctx: &egui::Context) {
        let Some(selection) = self.upload.selection() else {
            self.preview_texture = None;
            return;
        };
        if self
            .preview_texture
            .as_ref()
            .is_some_and(|(id, _)| *id == selection.id())
        {
            return;
        }
        let Some(thumbnail) = selection.preview().and_then(|preview| preview.thumbnail()) else {
            self.preview_texture = None;
            return;
        };
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [thumbnail.width as usize, thumbnail.height as usize],
            &thumbnail.rgba,
        );
        let texture = ctx.load_texture("selection_preview", image, egui::TextureOptions::LINEAR);
        self.preview_texture = Some((selection.id(), texture));
    }
}

impl eframe::App for PlateApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.apply_visuals(ctx);
        self.poll_background_jobs();
        render_status_bar(ctx, &self.status);
        match self.screen() {
            Screen::Loading => render_loading(ctx),
            Screen::SignedOut => self.handle_sign_in(ctx),
            Screen::SignedIn(user_id) => self.handle_upload(ctx, &user_id),
        }
        if self.gate.is_loading() || self.upload.is_busy() || self.health_rx.is_some() {
            ctx.request_repaint_after(Duration::from_millis(50));
        }
    }
}

impl Drop for PlateApp {
    fn drop(&mut self) {
        self.upload.shutdown();
        self.gate.shutdown();
        tracing::info!("PlateScan shutting down");
    }
}

fn spawn_health_probe(classifier: Arc<HttpClassifier>) -> Receiver<HealthOutcome> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let outcome = classifier.health().map(|health| {
            let classes = match classifier.classes() {
                Ok(catalogue) => Some(catalogue.total_classes.unwrap_or(catalogue.classes.len())),
                Err(err) => {
                    tracing::debug!("Class catalogue unavailable: {err}");
                    None
                }
            };
            (health, classes)
        });
        let _ = tx.send(outcome);
    });
    rx
}

fn pick_image() -> Option<PathBuf> {
    FileDialog::new()
        .set_title("Choose a photo of your dish")
        .add_filter("Images", IMAGE_EXTENSIONS)
        .pick_file()
}
