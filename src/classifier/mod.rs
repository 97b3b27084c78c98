//! Client side of the image classification service.

mod api;
mod multipart;
mod types;
mod wire;

pub use api::HttpClassifier;
pub use types::{ClassCatalogue, ClassifyError, PredictionResult, ServiceHealth, humanize_label};

use crate::image_file::ImageFile;

/// Anything that can turn an image into a prediction.
///
/// Implementations block until the service answers; the upload controller
/// runs them off the UI thread.
pub trait Classifier: Send + Sync {
    fn classify(&self, file: &ImageFile) -> Result<PredictionResult, ClassifyError>;
}
