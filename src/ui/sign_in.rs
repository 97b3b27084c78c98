use eframe::egui::{self, RichText};

use super::style;
use crate::session::Session;

/// Fields of the signed-out view. The session itself is issued elsewhere;
/// the user pastes the resulting id and token.
#[derive(Default)]
pub struct SignInForm {
    pub user_id: String,
    pub token: String,
    pub error: Option<String>,
}

impl SignInForm {
    /// A session if both fields hold something besides whitespace.
    pub fn session(&self) -> Option<Session> {
        let user_id = self.user_id.trim();
        let token = self.token.trim();
        if user_id.is_empty() || token.is_empty() {
            return None;
        }
        Some(Session::new(user_id, token))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Render the form. Returns a session when the user confirmed a complete one.
pub fn render_sign_in(ctx: &egui::Context, form: &mut SignInForm) -> Option<Session> {
    let palette = style::palette();
    let mut submitted = None;
    egui::CentralPanel::default().show(ctx, |ui| {
        ui.vertical_centered(|ui| {
            ui.add_space(48.0);
            ui.heading("PlateScan");
            ui.label(RichText::new("Sign in to classify your dishes").color(palette.text_muted));
            ui.add_space(24.0);
            ui.set_max_width(360.0);
            ui.label("User id");
            ui.add(egui::TextEdit::singleline(&mut form.user_id).hint_text("user id"));
            ui.add_space(6.0);
            ui.label("Session token");
            let token = ui.add(
                egui::TextEdit::singleline(&mut form.token)
                    .password(true)
                    .hint_text("paste your session token"),
            );
            ui.add_space(12.0);
            let ready = form.session();
            let clicked = ui
                .add_enabled(ready.is_some(), egui::Button::new("Sign in"))
                .clicked();
            let entered = token.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if clicked || entered {
                submitted = ready;
            }
            if let Some(error) = &form.error {
                ui.add_space(8.0);
                ui.label(RichText::new(error).color(palette.warning));
            }
        });
    });
    submitted
}

pub fn render_loading(ctx: &egui::Context) {
    egui::CentralPanel::default().show(ctx, |ui| {
        ui.vertical_centered(|ui| {
            ui.add_space(96.0);
            ui.spinner();
            ui.label(RichText::new("Checking session...").color(style::palette().text_muted));
        });
    });
}
