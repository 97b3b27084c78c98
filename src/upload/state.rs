use std::fmt;
use std::time::Duration;

use crate::classifier::{ClassifyError, PredictionResult};

/// Identity of one classify submission. Results carrying any other id are stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub(crate) u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Category of a failed submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Service,
    /// Success status with a body that broke the response contract.
    Malformed,
    /// The configured request deadline expired first.
    TimedOut,
}

/// What the user sees after a failed submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub(crate) fn timed_out(after: Duration) -> Self {
        Self {
            kind: FailureKind::TimedOut,
            message: format!(
                "The classifier did not answer within {} seconds",
                after.as_secs_f32().round()
            ),
        }
    }
}

impl From<&ClassifyError> for Failure {
    fn from(err: &ClassifyError) -> Self {
        let kind = match err {
            ClassifyError::Network(_) => FailureKind::Network,
            ClassifyError::Service { .. } => FailureKind::Service,
            ClassifyError::Malformed(_) => FailureKind::Malformed,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Lifecycle of the classify request. One value at a time, so a result and
/// an error can never coexist.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RequestState {
    #[default]
    Idle,
    Submitting,
    Succeeded(PredictionResult),
    Failed(Failure),
}

impl RequestState {
    pub fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting)
    }

    pub fn result(&self) -> Option<&PredictionResult> {
        match self {
            Self::Succeeded(result) => Some(result),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Short name for logs and status badges.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_kind_follows_error_variant() {
        let cases = [
            (ClassifyError::Network("refused".into()), FailureKind::Network),
            (
                ClassifyError::Service {
                    status: 422,
                    message: "unsupported file type".into(),
                },
                FailureKind::Service,
            ),
            (
                ClassifyError::Malformed("missing confidence".into()),
                FailureKind::Malformed,
            ),
        ];
        for (err, kind) in cases {
            assert_eq!(Failure::from(&err).kind, kind);
        }
    }

    #[test]
    fn service_failure_keeps_detail_verbatim() {
        let failure = Failure::from(&ClassifyError::Service {
            status: 422,
            message: "unsupported file type".into(),
        });
        assert_eq!(failure.message, "unsupported file type");
    }

    #[test]
    fn accessors_only_expose_matching_variant() {
        let failed = RequestState::Failed(Failure::timed_out(Duration::from_secs(30)));
        assert!(failed.result().is_none());
        assert_eq!(failed.failure().map(|f| f.kind), Some(FailureKind::TimedOut));
        assert_eq!(RequestState::default(), RequestState::Idle);
        assert!(RequestState::Submitting.is_submitting());
    }
}
