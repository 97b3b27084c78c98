//! Parsing of classification service response bodies.

use serde::Deserialize;
use serde_json::Value;

use super::types::{ClassifyError, PredictionResult};

#[derive(Debug, Deserialize)]
struct PredictionWire {
    predicted_label: Option<String>,
    confidence: Option<f64>,
    #[serde(default)]
    recommendations: Option<Vec<String>>,
}

/// Parse a success body into a validated prediction.
pub(crate) fn parse_prediction(body: &str) -> Result<PredictionResult, ClassifyError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(ClassifyError::Malformed("empty response body".into()));
    }
    let wire: PredictionWire = serde_json::from_str(trimmed)
        .map_err(|err| ClassifyError::Malformed(format!("{err}: {}", truncate(trimmed))))?;
    let label = wire
        .predicted_label
        .ok_or_else(|| ClassifyError::Malformed("missing predicted_label".into()))?;
    let confidence = wire
        .confidence
        .ok_or_else(|| ClassifyError::Malformed("missing confidence".into()))?;
    PredictionResult::new(label, confidence, wire.recommendations.unwrap_or_default())
}

/// Pick the message to show for a non-success response.
///
/// `detail` wins, then the service's `error` envelope, then a message built
/// from the status code.
pub(crate) fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body.trim())
        .ok()
        .and_then(|value| detail_message(&value).or_else(|| string_field(&value, "error")))
        .unwrap_or_else(|| format!("Classification failed (HTTP {status})"))
}

fn detail_message(value: &Value) -> Option<String> {
    match value.get("detail")? {
        Value::String(text) => non_empty(text),
        // Request validation errors arrive as a list of {loc, msg, type}.
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .filter(|msg| !msg.trim().is_empty())
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).and_then(non_empty)
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn truncate(body: &str) -> &str {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body;
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
