use eframe::egui::{self, Frame, Margin, RichText, load::SizedTexture};

use super::style;
use crate::classifier::{PredictionResult, humanize_label};
use crate::upload::{RequestState, UploadController};

const PREVIEW_MAX_SIZE: f32 = 360.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadAction {
    Pick,
    Submit,
    Clear,
    SignOut,
}

pub fn render_upload(
    ctx: &egui::Context,
    user_id: &str,
    upload: &UploadController,
    preview: Option<&egui::TextureHandle>,
) -> Option<UploadAction> {
    let palette = style::palette();
    let mut action = None;
    egui::TopBottomPanel::top("header")
        .frame(
            Frame::new()
                .fill(palette.bg_primary)
                .stroke(style::section_stroke())
                .inner_margin(Margin::symmetric(12, 8)),
        )
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("PlateScan");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Sign out").clicked() {
                        action = Some(UploadAction::SignOut);
                    }
                    ui.label(RichText::new(user_id).color(palette.text_muted));
                });
            });
        });
    egui::CentralPanel::default().show(ctx, |ui| {
        let state = upload.state();
        let has_selection = upload.selection().is_some();
        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui.button("Choose image...").clicked() {
                action = Some(UploadAction::Pick);
            }
            let can_submit = has_selection && !state.is_submitting();
            if ui
                .add_enabled(can_submit, egui::Button::new("Classify"))
                .clicked()
            {
                action = Some(UploadAction::Submit);
            }
            let can_clear = has_selection || !matches!(state, RequestState::Idle);
            if ui
                .add_enabled(can_clear, egui::Button::new("Clear"))
                .clicked()
            {
                action = Some(UploadAction::Clear);
            }
            if state.is_submitting() {
                ui.spinner();
            }
        });
        ui.add_space(8.0);
        render_preview(ui, upload, preview);
        ui.add_space(12.0);
        match state {
            RequestState::Succeeded(result) => render_result(ui, result),
            RequestState::Failed(failure) => {
                ui.label(RichText::new(&failure.message).color(palette.warning));
            }
            RequestState::Idle | RequestState::Submitting => {}
        }
    });
    action
}

fn render_preview(ui: &mut egui::Ui, upload: &UploadController, texture: Option<&egui::TextureHandle>) {
    let palette = style::palette();
    let Some(selection) = upload.selection() else {
        ui.label(
            RichText::new("Choose an image or drop one onto the window").color(palette.text_muted),
        );
        return;
    };
    ui.label(RichText::new(selection.file().name()).color(palette.text_muted));
    match (selection.preview(), texture) {
        (None, _) => {
            ui.spinner();
        }
        (Some(_), Some(texture)) => {
            ui.add(
                egui::Image::from_texture(SizedTexture::from_handle(texture))
                    .max_size(egui::vec2(PREVIEW_MAX_SIZE, PREVIEW_MAX_SIZE)),
            );
        }
        (Some(_), None) => {
            ui.label(RichText::new("No preview for this file").color(palette.text_muted));
        }
    }
}

fn render_result(ui: &mut egui::Ui, result: &PredictionResult) {
    let palette = style::palette();
    Frame::new()
        .fill(palette.bg_tertiary)
        .stroke(style::section_stroke())
        .inner_margin(Margin::same(12))
        .show(ui, |ui| {
            ui.label(RichText::new(result.display_label()).heading().color(palette.accent));
            ui.label(format!("Confidence: {}", result.confidence_percent()));
            ui.add_space(6.0);
            if result.recommendations().is_empty() {
                ui.label(RichText::new("No similar dishes").color(palette.text_muted));
                return;
            }
            ui.label("Similar dishes:");
            for recommendation in result.recommendations() {
                ui.label(format!("- {}", humanize_label(recommendation)));
            }
        });
}
