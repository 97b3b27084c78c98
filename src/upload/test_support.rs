use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use super::UploadController;
use crate::classifier::{Classifier, ClassifyError, PredictionResult};
use crate::image_file::{ImageFile, test_png};

type Outcome = Result<PredictionResult, ClassifyError>;

const PUMP_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn plate(name: &str) -> ImageFile {
    ImageFile::new(name, test_png(4, 4))
}

/// Poll until `done` holds, panicking after a few seconds.
pub(crate) fn pump_until(
    controller: &mut UploadController,
    done: impl Fn(&UploadController) -> bool,
) {
    let deadline = Instant::now() + PUMP_TIMEOUT;
    loop {
        controller.poll();
        if done(controller) {
            return;
        }
        assert!(Instant::now() < deadline, "controller never settled");
        std::thread::sleep(Duration::from_millis(2));
    }
}

/// Poll until at least `count` worker messages were consumed.
pub(crate) fn wait_for_messages(controller: &mut UploadController, count: usize) {
    let deadline = Instant::now() + PUMP_TIMEOUT;
    let mut handled = 0;
    while handled < count {
        handled += controller.poll();
        assert!(Instant::now() < deadline, "expected {count} messages, got {handled}");
        std::thread::sleep(Duration::from_millis(2));
    }
}

/// Answers every call immediately with the same outcome.
pub(crate) struct FixedClassifier {
    outcome: Outcome,
    calls: AtomicUsize,
}

impl FixedClassifier {
    pub(crate) fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for FixedClassifier {
    fn classify(&self, _file: &ImageFile) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// A classify call parked until the test resolves it.
pub(crate) struct PendingCall {
    pub(crate) file_name: String,
    reply: Sender<Outcome>,
}

impl PendingCall {
    pub(crate) fn resolve(self, outcome: Outcome) {
        let _ = self.reply.send(outcome);
    }
}

/// Blocks each call until the test hands back an outcome.
pub(crate) struct GatedClassifier {
    calls_tx: Mutex<Sender<PendingCall>>,
    calls_rx: Mutex<Receiver<PendingCall>>,
    calls: AtomicUsize,
}

impl Default for GatedClassifier {
    fn default() -> Self {
        let (calls_tx, calls_rx) = mpsc::channel();
        Self {
            calls_tx: Mutex::new(calls_tx),
            calls_rx: Mutex::new(calls_rx),
            calls: AtomicUsize::new(0),
        }
    }
}

impl GatedClassifier {
    pub(crate) fn next_call(&self) -> PendingCall {
        self.calls_rx
            .lock()
            .unwrap()
            .recv_timeout(PUMP_TIMEOUT)
            .expect("classifier was never called")
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for GatedClassifier {
    fn classify(&self, file: &ImageFile) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (reply, outcome) = mpsc::channel();
        let call = PendingCall {
            file_name: file.name().to_string(),
            reply,
        };
        let _ = self.calls_tx.lock().unwrap().send(call);
        outcome
            .recv()
            .unwrap_or_else(|_| Err(ClassifyError::Network("call dropped".into())))
    }
}
