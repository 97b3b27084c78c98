//! HTTP client for the food classification service.

use std::io;

use serde::de::DeserializeOwned;
use url::Url;

use super::multipart::MultipartBody;
use super::types::{ClassCatalogue, ClassifyError, PredictionResult, ServiceHealth};
use super::{Classifier, wire};
use crate::config::{ClassifierSettings, ConfigError};
use crate::http_client;
use crate::image_file::ImageFile;

/// Talks to a deployed classifier over HTTP. Never retries; callers decide.
#[derive(Clone)]
pub struct HttpClassifier {
    endpoint: Url,
    field_name: String,
    max_response_bytes: usize,
    agent: ureq::Agent,
}

impl HttpClassifier {
    pub fn from_settings(settings: &ClassifierSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: settings.endpoint_url()?,
            field_name: settings.field_name.clone(),
            max_response_bytes: settings.max_response_bytes,
            agent: http_client::build_agent(settings.connect_timeout()),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Query the service's health probe, a sibling of the predict endpoint.
    pub fn health(&self) -> Result<ServiceHealth, ClassifyError> {
        self.get_json("health")
    }

    /// List the labels the deployed model can produce.
    pub fn classes(&self) -> Result<ClassCatalogue, ClassifyError> {
        self.get_json("classes")
    }

    fn sibling_url(&self, name: &str) -> Result<Url, ClassifyError> {
        self.endpoint
            .join(name)
            .map_err(|err| ClassifyError::Network(format!("cannot build {name} URL: {err}")))
    }

    fn get_json<T: DeserializeOwned>(&self, name: &str) -> Result<T, ClassifyError> {
        let url = self.sibling_url(name)?;
        let request = self.agent.get(url.as_str()).set("Accept", "application/json");
        let body = self.read_success_body(request.call())?;
        serde_json::from_str(body.trim())
            .map_err(|err| ClassifyError::Malformed(format!("{name}: {err}")))
    }

    fn read_success_body(
        &self,
        outcome: Result<ureq::Response, ureq::Error>,
    ) -> Result<String, ClassifyError> {
        let response = match outcome {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                let body = http_client::read_response_text(response, self.max_response_bytes)
                    .unwrap_or_default();
                return Err(ClassifyError::Service {
                    status,
                    message: wire::error_message(status, &body),
                });
            }
            Err(ureq::Error::Transport(err)) => {
                return Err(ClassifyError::Network(err.to_string()));
            }
        };
        let status = response.status();
        let body = http_client::read_response_text(response, self.max_response_bytes)
            .map_err(map_body_error)?;
        if !(200..300).contains(&status) {
            return Err(ClassifyError::Service {
                status,
                message: wire::error_message(status, &body),
            });
        }
        Ok(body)
    }
}

impl std::fmt::Debug for HttpClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClassifier")
            .field("endpoint", &self.endpoint.as_str())
            .field("field_name", &self.field_name)
            .finish_non_exhaustive()
    }
}

impl Classifier for HttpClassifier {
    fn classify(&self, file: &ImageFile) -> Result<PredictionResult, ClassifyError> {
        let form = MultipartBody::single_file(&self.field_name, file);
        tracing::debug!(
            endpoint = %self.endpoint,
            file = file.name(),
            bytes = file.len(),
            "Sending image for classification"
        );
        let request = self
            .agent
            .post(self.endpoint.as_str())
            .set("Accept", "application/json")
            .set("Content-Type", &form.content_type());
        let body = self.read_success_body(request.send_bytes(form.as_bytes()))?;
        wire::parse_prediction(&body)
    }
}

fn map_body_error(err: io::Error) -> ClassifyError {
    match err.kind() {
        io::ErrorKind::InvalidData => ClassifyError::Malformed(err.to_string()),
        _ => ClassifyError::Network(format!("failed reading response: {err}")),
    }
}
