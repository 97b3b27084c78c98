use egui::{Color32, Frame, Margin, RichText, StrokeKind};

use super::style::{self, StatusTone};
use crate::classifier::{ClassifyError, ServiceHealth};
use crate::upload::{FailureKind, RequestState};

const MAX_LOG_ENTRIES: usize = 50;

/// Status badge + text shown in the footer.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusBarState {
    pub text: String,
    pub badge_label: String,
    pub badge_color: Color32,
    /// Rolling log of past messages, newest last.
    pub log: Vec<String>,
}

impl StatusBarState {
    pub fn idle() -> Self {
        let (label, color) = style::status_badge(StatusTone::Idle);
        Self {
            text: "Checking classifier...".into(),
            badge_label: label.into(),
            badge_color: color,
            log: Vec::new(),
        }
    }

    pub fn set(&mut self, text: impl Into<String>, tone: StatusTone) {
        let text = text.into();
        let (label, color) = style::status_badge(tone);
        if self.log.len() == MAX_LOG_ENTRIES {
            self.log.remove(0);
        }
        self.log.push(format!("[{label}] {text}"));
        self.text = text;
        self.badge_label = label.into();
        self.badge_color = color;
    }
}

/// Footer message for a health probe outcome.
pub fn probe_status(
    outcome: &Result<(ServiceHealth, Option<usize>), ClassifyError>,
) -> (String, StatusTone) {
    match outcome {
        Ok((health, classes)) if health.is_healthy() => {
            let text = match classes {
                Some(count) => format!("Classifier ready ({count} classes)"),
                None => "Classifier ready".to_string(),
            };
            (text, StatusTone::Info)
        }
        Ok((health, _)) => (
            format!("Classifier reports status \"{}\"", health.status),
            StatusTone::Warning,
        ),
        Err(err) => (format!("Classifier unreachable: {err}"), StatusTone::Warning),
    }
}

/// Footer message after the upload state changed, if it warrants one.
pub fn upload_status(state: &RequestState) -> Option<(String, StatusTone)> {
    match state {
        RequestState::Idle => None,
        RequestState::Submitting => Some(("Classifying image...".into(), StatusTone::Busy)),
        RequestState::Succeeded(result) => Some((
            format!(
                "{} ({})",
                result.display_label(),
                result.confidence_percent()
            ),
            StatusTone::Info,
        )),
        RequestState::Failed(failure) => {
            let tone = match failure.kind {
                FailureKind::Malformed => StatusTone::Error,
                _ => StatusTone::Warning,
            };
            Some((failure.message.clone(), tone))
        }
    }
}

pub fn render_status_bar(ctx: &egui::Context, status: &StatusBarState) {
    let palette = style::palette();
    egui::TopBottomPanel::bottom("status_bar")
        .frame(
            Frame::new()
                .fill(palette.bg_primary)
                .stroke(style::section_stroke())
                .inner_margin(Margin::symmetric(8, 4)),
        )
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                let (badge_rect, _) =
                    ui.allocate_exact_size(egui::vec2(14.0, 14.0), egui::Sense::hover());
                ui.painter().rect_filled(badge_rect, 0.0, status.badge_color);
                ui.painter().rect_stroke(
                    badge_rect,
                    0.0,
                    style::section_stroke(),
                    StrokeKind::Inside,
                );
                ui.add_space(6.0);
                ui.label(RichText::new(&status.badge_label).color(palette.text_primary));
                ui.separator();
                ui.label(RichText::new(&status.text).color(palette.text_primary))
                    .on_hover_text(status.log.join("\n"));
            });
        });
}
