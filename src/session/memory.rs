use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

use super::{AuthError, AuthProvider, Session, SessionSnapshot};

#[derive(Default)]
struct Inner {
    revision: u64,
    session: Option<Session>,
    subscribers: Vec<Sender<SessionSnapshot>>,
}

/// Keeps the session in memory and broadcasts every change.
#[derive(Default)]
pub struct MemorySessionProvider {
    inner: Mutex<Inner>,
}

impl MemorySessionProvider {
    pub fn new(session: Option<Session>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                session,
                ..Inner::default()
            }),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        SessionSnapshot {
            revision: inner.revision,
            session: inner.session.clone(),
        }
    }

    /// Replace the session and notify subscribers. Returns the new snapshot.
    pub fn set_session(&self, session: Option<Session>) -> SessionSnapshot {
        let mut inner = self.lock();
        inner.revision += 1;
        inner.session = session;
        let snapshot = SessionSnapshot {
            revision: inner.revision,
            session: inner.session.clone(),
        };
        inner
            .subscribers
            .retain(|subscriber| subscriber.send(snapshot.clone()).is_ok());
        snapshot
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AuthProvider for MemorySessionProvider {
    fn current_session(&self) -> Result<SessionSnapshot, AuthError> {
        Ok(self.snapshot())
    }

    fn subscribe(&self) -> Receiver<SessionSnapshot> {
        let (tx, rx) = mpsc::channel();
        self.lock().subscribers.push(tx);
        rx
    }
}
