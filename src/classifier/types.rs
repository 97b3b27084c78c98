use serde::{Deserialize, Deserializer};

/// A parsed prediction. Only constructible through validation, so the
/// confidence is always within `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct PredictionResult {
    label: String,
    confidence: f64,
    recommendations: Vec<String>,
}

impl PredictionResult {
    pub fn new(
        label: impl Into<String>,
        confidence: f64,
        recommendations: Vec<String>,
    ) -> Result<Self, ClassifyError> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err(ClassifyError::Malformed("predicted_label is empty".into()));
        }
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(ClassifyError::Malformed(format!(
                "confidence {confidence} is outside [0, 1]"
            )));
        }
        Ok(Self {
            label,
            confidence,
            recommendations,
        })
    }

    /// Raw label as reported by the service, e.g. `margherita_pizza`.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Similar items, most similar first.
    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }

    /// Label formatted for people: `Margherita Pizza`.
    pub fn display_label(&self) -> String {
        humanize_label(&self.label)
    }

    /// Confidence as a percentage with two decimals: `93.20%`.
    pub fn confidence_percent(&self) -> String {
        format!("{:.2}%", self.confidence * 100.0)
    }
}

/// Turn a snake_case class name into title-cased words.
pub fn humanize_label(label: &str) -> String {
    label
        .split(['_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Ways a classify call can fail once it has been attempted.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ClassifyError {
    /// The request could not be sent or no response arrived.
    #[error("Network error: {0}")]
    Network(String),
    /// The service answered with a non-success status.
    #[error("{message}")]
    Service { status: u16, message: String },
    /// The service answered with success but broke the response contract.
    #[error("Unexpected response from classifier: {0}")]
    Malformed(String),
}

/// Body of `GET /health`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ServiceHealth {
    pub status: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub model_loaded: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub encoder_loaded: Option<bool>,
}

impl ServiceHealth {
    pub fn is_healthy(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("healthy")
    }
}

/// Body of `GET /classes`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ClassCatalogue {
    pub classes: Vec<String>,
    #[serde(default)]
    pub total_classes: Option<usize>,
}

// The service stringifies its flags ("True"/"False"), so accept both shapes.
fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Bool(flag)) => Some(flag),
        Some(serde_json::Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    })
}
