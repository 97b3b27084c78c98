//! Authentication session and the gate that picks the top-level view.

mod gate;
mod memory;
mod store;

pub use gate::{GateView, SessionGate};
pub use memory::MemorySessionProvider;
pub use store::{SessionStore, SessionStoreError, StoredSessionProvider};

use std::fmt;
use std::sync::mpsc::Receiver;

use serde::{Deserialize, Serialize};

/// Bearer credential. Never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// An authenticated user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub token: SessionToken,
}

impl Session {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: SessionToken::new(token),
        }
    }
}

/// Provider state at one point in time. Revisions grow with every change,
/// so a consumer can tell a newer snapshot from a stale one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub revision: u64,
    pub session: Option<Session>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication provider unavailable: {0}")]
    Unavailable(String),
    #[error("Session store error: {0}")]
    Store(#[from] SessionStoreError),
}

/// Source of truth for the current session.
pub trait AuthProvider: Send + Sync {
    /// May block; the gate calls it off the UI thread.
    fn current_session(&self) -> Result<SessionSnapshot, AuthError>;

    /// Every later sign-in, sign-out or refresh arrives on the returned
    /// channel. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> Receiver<SessionSnapshot>;
}
