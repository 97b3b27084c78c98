use super::preview::{Preview, decode_preview};
use super::selection::SelectionId;
use super::state::RequestId;
use crate::classifier::{Classifier, ClassifyError, PredictionResult};
use crate::image_file::ImageFile;
use std::{
    sync::{
        Arc,
        mpsc::{Receiver, Sender},
    },
    thread,
    time::{Duration, Instant},
};

type TryRecvError = std::sync::mpsc::TryRecvError;

pub(crate) enum JobMessage {
    PreviewDecoded(PreviewDecodeResult),
    Classified(ClassifyJobResult),
}

#[derive(Debug)]
pub(crate) struct PreviewDecodeResult {
    pub(crate) selection_id: SelectionId,
    pub(crate) preview: Preview,
}

#[derive(Debug)]
pub(crate) struct ClassifyJobResult {
    pub(crate) request_id: RequestId,
    pub(crate) result: Result<PredictionResult, ClassifyError>,
    pub(crate) elapsed: Duration,
}

/// Worker threads for the upload controller. Results come back over one
/// channel drained on the owning thread.
pub(crate) struct UploadJobs {
    message_tx: Sender<JobMessage>,
    message_rx: Receiver<JobMessage>,
}

impl UploadJobs {
    pub(crate) fn new() -> Self {
        let (message_tx, message_rx) = std::sync::mpsc::channel::<JobMessage>();
        Self {
            message_tx,
            message_rx,
        }
    }

    pub(crate) fn try_recv_message(&self) -> Result<JobMessage, TryRecvError> {
        self.message_rx.try_recv()
    }

    pub(crate) fn begin_preview_decode(
        &self,
        selection_id: SelectionId,
        file: ImageFile,
        max_dimension: u32,
    ) {
        let tx = self.message_tx.clone();
        thread::spawn(move || {
            let preview = decode_preview(&file, max_dimension);
            let _ = tx.send(JobMessage::PreviewDecoded(PreviewDecodeResult {
                selection_id,
                preview,
            }));
        });
    }

    pub(crate) fn begin_classify(
        &self,
        request_id: RequestId,
        classifier: Arc<dyn Classifier>,
        file: ImageFile,
    ) {
        let tx = self.message_tx.clone();
        thread::spawn(move || {
            let started = Instant::now();
            let result = classifier.classify(&file);
            let _ = tx.send(JobMessage::Classified(ClassifyJobResult {
                request_id,
                result,
                elapsed: started.elapsed(),
            }));
        });
    }
}
