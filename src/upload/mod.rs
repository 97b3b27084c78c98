//! Upload-and-classify workflow: one selection, one request at a time.

mod jobs;
mod preview;
mod selection;
mod state;
#[cfg(test)]
mod test_support;

pub use preview::{Preview, Thumbnail};
pub use selection::{Selection, SelectionId, SelectionStore};
pub use state::{Failure, FailureKind, RequestId, RequestState};

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::classifier::{Classifier, ClassifyError, PredictionResult};
use crate::config::AppConfig;
use crate::image_file::ImageFile;
use jobs::{ClassifyJobResult, JobMessage, UploadJobs};

/// Why `submit` did nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SubmitRejected {
    #[error("Choose an image before classifying")]
    NoSelection,
    #[error("A classification is already in progress")]
    AlreadySubmitting,
}

/// Knobs for the controller, usually taken from [`AppConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadSettings {
    pub preview_max_dimension: u32,
    /// Give up on a submission after this long. `None` waits forever.
    pub request_timeout: Option<Duration>,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl UploadSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            preview_max_dimension: config.preview.max_dimension,
            request_timeout: config.classifier.request_timeout(),
        }
    }
}

#[derive(Debug)]
struct InFlight {
    id: RequestId,
    started: Instant,
    deadline: Option<Instant>,
}

/// Owns the selection and the request state. All mutation happens through
/// `&mut self` on the owning thread; workers only send messages that
/// [`UploadController::poll`] applies.
pub struct UploadController {
    classifier: Arc<dyn Classifier>,
    settings: UploadSettings,
    selection: SelectionStore,
    state: RequestState,
    in_flight: Option<InFlight>,
    last_request_id: u64,
    jobs: UploadJobs,
}

impl UploadController {
    pub fn new(classifier: Arc<dyn Classifier>, settings: UploadSettings) -> Self {
        Self {
            classifier,
            settings,
            selection: SelectionStore::default(),
            state: RequestState::Idle,
            in_flight: None,
            last_request_id: 0,
            jobs: UploadJobs::new(),
        }
    }

    pub fn state(&self) -> &RequestState {
        &self.state
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.current()
    }

    pub fn result(&self) -> Option<&PredictionResult> {
        self.state.result()
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.state.failure()
    }

    pub fn in_flight_request(&self) -> Option<RequestId> {
        self.in_flight.as_ref().map(|in_flight| in_flight.id)
    }

    /// True while a worker may still post something worth showing.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some() || self.selection.preview_pending()
    }

    /// Store `file` as the selection, start decoding its preview, and reset
    /// the request state. A submission still running is abandoned.
    pub fn select(&mut self, file: ImageFile) -> SelectionId {
        self.abandon_in_flight("selection replaced");
        let name = file.name().to_string();
        let bytes = file.len();
        let id = self.selection.select(file.clone());
        self.set_state(RequestState::Idle);
        self.jobs
            .begin_preview_decode(id, file, self.settings.preview_max_dimension);
        info!(file = %name, bytes, "Image selected");
        id
    }

    /// Drop the selection, preview, result and error. Safe to call in any
    /// state, including mid-submission.
    pub fn clear(&mut self) {
        let abandoned = self.abandon_in_flight("selection cleared");
        let had_selection = self.selection.clear();
        self.set_state(RequestState::Idle);
        if had_selection || abandoned {
            info!("Selection cleared");
        }
    }

    /// Send the current selection to the classifier on a worker thread.
    ///
    /// Allowed from `Idle`, `Succeeded` and `Failed`; the latter two reset
    /// first so the same file can be resubmitted.
    pub fn submit(&mut self) -> Result<RequestId, SubmitRejected> {
        if let Some(in_flight) = &self.in_flight {
            debug!(request = %in_flight.id, "Ignoring submit while a request is in flight");
            return Err(SubmitRejected::AlreadySubmitting);
        }
        let Some(selection) = self.selection.current() else {
            debug!("Ignoring submit without a selection");
            return Err(SubmitRejected::NoSelection);
        };
        let file = selection.file().clone();
        self.last_request_id += 1;
        let id = RequestId(self.last_request_id);
        let started = Instant::now();
        let deadline = self
            .settings
            .request_timeout
            .and_then(|timeout| started.checked_add(timeout));
        if deadline.is_none() && self.settings.request_timeout.is_some() {
            warn!(request = %id, "Request timeout is out of range; waiting without a deadline");
        }
        self.in_flight = Some(InFlight {
            id,
            started,
            deadline,
        });
        self.set_state(RequestState::Submitting);
        info!(request = %id, file = file.name(), "Submitting image for classification");
        self.jobs.begin_classify(id, Arc::clone(&self.classifier), file);
        Ok(id)
    }

    /// Apply finished background work and enforce the request deadline.
    /// Returns how many worker messages were consumed.
    pub fn poll(&mut self) -> usize {
        self.poll_at(Instant::now())
    }

    fn poll_at(&mut self, now: Instant) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.jobs.try_recv_message() {
            handled += 1;
            match message {
                JobMessage::PreviewDecoded(decoded) => {
                    if !self
                        .selection
                        .apply_preview(decoded.selection_id, decoded.preview)
                    {
                        debug!(selection = ?decoded.selection_id, "Discarding stale preview");
                    }
                }
                JobMessage::Classified(outcome) => self.apply_classify_result(outcome),
            }
        }
        self.enforce_deadline(now);
        handled
    }

    /// Abandon any in-flight request and drop the selection. Late worker
    /// results are discarded, and the controller stays usable.
    pub fn shutdown(&mut self) {
        self.abandon_in_flight("shutting down");
        self.selection.clear();
        self.state = RequestState::Idle;
    }

    fn apply_classify_result(&mut self, outcome: ClassifyJobResult) {
        let current = self.in_flight.as_ref().map(|in_flight| in_flight.id);
        if current != Some(outcome.request_id) {
            debug!(
                request = %outcome.request_id,
                "Discarding result of an abandoned request"
            );
            return;
        }
        self.in_flight = None;
        let elapsed_ms = outcome.elapsed.as_millis() as u64;
        match outcome.result {
            Ok(prediction) => {
                info!(
                    request = %outcome.request_id,
                    label = prediction.label(),
                    confidence = prediction.confidence(),
                    elapsed_ms,
                    "Classification succeeded"
                );
                self.set_state(RequestState::Succeeded(prediction));
            }
            Err(err) => {
                log_failure(outcome.request_id, &err, elapsed_ms);
                self.set_state(RequestState::Failed(Failure::from(&err)));
            }
        }
    }

    fn enforce_deadline(&mut self, now: Instant) {
        let Some(in_flight) = &self.in_flight else {
            return;
        };
        let Some(deadline) = in_flight.deadline else {
            return;
        };
        if now < deadline {
            return;
        }
        let waited = deadline.duration_since(in_flight.started);
        warn!(request = %in_flight.id, ?waited, "Classification timed out");
        self.in_flight = None;
        self.set_state(RequestState::Failed(Failure::timed_out(waited)));
    }

    fn abandon_in_flight(&mut self, reason: &str) -> bool {
        match self.in_flight.take() {
            Some(in_flight) => {
                info!(request = %in_flight.id, reason, "Abandoning classification");
                true
            }
            None => false,
        }
    }

    fn set_state(&mut self, next: RequestState) {
        if self.state.name() != next.name() {
            debug!(from = self.state.name(), to = next.name(), "Upload state changed");
        }
        self.state = next;
    }
}

impl Drop for UploadController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn log_failure(request: RequestId, err: &ClassifyError, elapsed_ms: u64) {
    match err {
        ClassifyError::Malformed(_) => {
            error!(request = %request, elapsed_ms, "Classifier broke its response contract: {err}");
        }
        _ => warn!(request = %request, elapsed_ms, "Classification failed: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{FixedClassifier, GatedClassifier, plate, pump_until, wait_for_messages};
    use super::*;

    fn controller(classifier: Arc<dyn Classifier>) -> UploadController {
        UploadController::new(classifier, UploadSettings::default())
    }

    fn margherita() -> PredictionResult {
        PredictionResult::new(
            "margherita_pizza",
            0.932,
            vec!["neapolitan_pizza".into(), "calzone".into()],
        )
        .unwrap()
    }

    #[test]
    fn submit_without_selection_is_rejected() {
        let classifier = Arc::new(FixedClassifier::new(Ok(margherita())));
        let mut controller = controller(classifier.clone());
        assert_eq!(controller.submit(), Err(SubmitRejected::NoSelection));
        assert_eq!(controller.state(), &RequestState::Idle);
        assert_eq!(classifier.calls(), 0);
    }

    #[test]
    fn select_resets_state_and_decodes_preview() {
        let mut controller = controller(Arc::new(FixedClassifier::new(Ok(margherita()))));
        controller.select(plate("a.png"));
        assert!(controller.is_busy());
        pump_until(&mut controller, |c| c.selection().and_then(Selection::preview).is_some());
        let selection = controller.selection().unwrap();
        assert_eq!(selection.file().name(), "a.png");
        assert!(selection.preview_data().unwrap().starts_with("data:image/png;base64,"));
        assert_eq!(controller.state(), &RequestState::Idle);
        assert!(!controller.is_busy());
    }

    #[test]
    fn successful_submission_stores_result() {
        let mut controller = controller(Arc::new(FixedClassifier::new(Ok(margherita()))));
        controller.select(plate("pizza.png"));
        let id = controller.submit().unwrap();
        assert_eq!(controller.state(), &RequestState::Submitting);
        assert_eq!(controller.in_flight_request(), Some(id));
        pump_until(&mut controller, |c| !c.state().is_submitting());
        assert_eq!(controller.result(), Some(&margherita()));
        assert!(controller.failure().is_none());
        assert!(controller.in_flight_request().is_none());
    }

    #[test]
    fn failed_submission_keeps_selection_for_retry() {
        let classifier = Arc::new(FixedClassifier::new(Err(ClassifyError::Service {
            status: 422,
            message: "unsupported file type".into(),
        })));
        let mut controller = controller(classifier.clone());
        controller.select(plate("menu.png"));
        controller.submit().unwrap();
        pump_until(&mut controller, |c| !c.state().is_submitting());
        let failure = controller.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Service);
        assert_eq!(failure.message, "unsupported file type");
        assert!(controller.selection().is_some());

        controller.submit().unwrap();
        pump_until(&mut controller, |c| !c.state().is_submitting());
        assert_eq!(classifier.calls(), 2);
    }

    #[test]
    fn second_submit_while_in_flight_is_a_no_op() {
        let classifier = Arc::new(GatedClassifier::default());
        let mut controller = controller(classifier.clone());
        controller.select(plate("a.png"));
        let first = controller.submit().unwrap();
        assert_eq!(controller.submit(), Err(SubmitRejected::AlreadySubmitting));
        assert_eq!(controller.in_flight_request(), Some(first));

        classifier.next_call().resolve(Ok(margherita()));
        pump_until(&mut controller, |c| !c.state().is_submitting());
        assert_eq!(classifier.calls(), 1);
        assert!(controller.result().is_some());
    }

    #[test]
    fn clear_during_submission_discards_late_result() {
        let classifier = Arc::new(GatedClassifier::default());
        let mut controller = controller(classifier.clone());
        controller.select(plate("a.png"));
        pump_until(&mut controller, |c| !c.is_busy());
        controller.submit().unwrap();
        let call = classifier.next_call();

        controller.clear();
        assert_eq!(controller.state(), &RequestState::Idle);
        assert!(controller.selection().is_none());

        call.resolve(Ok(margherita()));
        wait_for_messages(&mut controller, 1);
        assert_eq!(controller.state(), &RequestState::Idle);
        assert!(controller.result().is_none());
    }

    #[test]
    fn reselecting_abandons_the_old_request() {
        let classifier = Arc::new(GatedClassifier::default());
        let mut controller = controller(classifier.clone());
        controller.select(plate("old.png"));
        controller.submit().unwrap();
        let old_call = classifier.next_call();

        controller.select(plate("new.png"));
        assert_eq!(controller.state(), &RequestState::Idle);
        let new_id = controller.submit().unwrap();
        let new_call = classifier.next_call();
        assert_eq!(new_call.file_name, "new.png");

        old_call.resolve(Ok(margherita()));
        wait_for_messages(&mut controller, 1);
        assert_eq!(controller.in_flight_request(), Some(new_id));
        assert!(controller.state().is_submitting());

        new_call.resolve(Err(ClassifyError::Network("connection reset".into())));
        pump_until(&mut controller, |c| !c.state().is_submitting());
        assert_eq!(controller.failure().map(|f| f.kind), Some(FailureKind::Network));
    }

    #[test]
    fn expired_deadline_fails_with_timeout() {
        let classifier = Arc::new(GatedClassifier::default());
        let mut controller = UploadController::new(
            classifier.clone(),
            UploadSettings {
                request_timeout: Some(Duration::from_secs(30)),
                ..UploadSettings::default()
            },
        );
        controller.select(plate("slow.png"));
        pump_until(&mut controller, |c| !c.is_busy());
        controller.submit().unwrap();
        let call = classifier.next_call();

        controller.poll_at(Instant::now() + Duration::from_secs(31));
        let failure = controller.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::TimedOut);
        assert!(failure.message.contains("30 seconds"), "{}", failure.message);

        call.resolve(Ok(margherita()));
        wait_for_messages(&mut controller, 1);
        assert_eq!(controller.failure().map(|f| f.kind), Some(FailureKind::TimedOut));
    }

    #[test]
    fn out_of_range_timeout_submits_without_deadline() {
        let config: AppConfig =
            toml::from_str("[classifier]\nrequest_timeout_secs = 9223372036854775807\n").unwrap();
        let classifier = Arc::new(GatedClassifier::default());
        let mut controller =
            UploadController::new(classifier.clone(), UploadSettings::from_config(&config));
        controller.select(plate("huge_timeout.png"));
        pump_until(&mut controller, |c| !c.is_busy());
        let id = controller.submit().unwrap();
        let call = classifier.next_call();

        controller.poll_at(Instant::now() + Duration::from_secs(24 * 60 * 60));
        assert_eq!(controller.in_flight_request(), Some(id));

        call.resolve(Ok(margherita()));
        pump_until(&mut controller, |c| !c.state().is_submitting());
        assert_eq!(controller.result(), Some(&margherita()));
    }

    #[test]
    fn shutdown_abandons_in_flight_work() {
        let classifier = Arc::new(GatedClassifier::default());
        let mut controller = controller(classifier.clone());
        controller.select(plate("a.png"));
        controller.submit().unwrap();
        let call = classifier.next_call();
        controller.shutdown();
        assert!(controller.in_flight_request().is_none());
        assert!(controller.selection().is_none());
        call.resolve(Ok(margherita()));
        drop(controller);
    }
}
