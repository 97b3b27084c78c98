use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use tracing::{debug, info, warn};

use super::{AuthError, AuthProvider, Session, SessionSnapshot};

/// Top-level view the shell should render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateView<'a> {
    Loading,
    SignedOut,
    SignedIn(&'a Session),
}

#[derive(Debug)]
enum GateState {
    Loading,
    Resolved(Option<Session>),
}

/// Decides between the sign-in view and the main app.
///
/// Starts `Loading`, asks the provider for the current session on a worker
/// thread, and follows the provider's change stream after that. A snapshot
/// is applied only when its revision is newer than the last one applied, so
/// a slow initial answer never overrides a later change.
pub struct SessionGate {
    state: GateState,
    applied_revision: Option<u64>,
    initial: Option<Receiver<Result<SessionSnapshot, AuthError>>>,
    changes: Option<Receiver<SessionSnapshot>>,
}

impl SessionGate {
    pub fn start(provider: Arc<dyn AuthProvider>) -> Self {
        let changes = provider.subscribe();
        let (tx, initial) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(provider.current_session());
        });
        Self {
            state: GateState::Loading,
            applied_revision: None,
            initial: Some(initial),
            changes: Some(changes),
        }
    }

    pub fn view(&self) -> GateView<'_> {
        match &self.state {
            GateState::Loading => GateView::Loading,
            GateState::Resolved(None) => GateView::SignedOut,
            GateState::Resolved(Some(session)) => GateView::SignedIn(session),
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            GateState::Resolved(session) => session.as_ref(),
            GateState::Loading => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, GateState::Loading)
    }

    /// Apply whatever the provider reported since the last call. Returns the
    /// number of snapshots that changed the gate.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        if let Some(rx) = &self.initial {
            match rx.try_recv() {
                Ok(Ok(snapshot)) => {
                    self.initial = None;
                    applied += usize::from(self.apply(snapshot));
                }
                Ok(Err(err)) => {
                    self.initial = None;
                    warn!("Initial session query failed: {err}");
                    if self.is_loading() {
                        self.state = GateState::Resolved(None);
                        applied += 1;
                    }
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    self.initial = None;
                    warn!("Initial session query ended without an answer");
                    if self.is_loading() {
                        self.state = GateState::Resolved(None);
                        applied += 1;
                    }
                }
            }
        }
        let mut pending = Vec::new();
        if let Some(rx) = &self.changes {
            loop {
                match rx.try_recv() {
                    Ok(snapshot) => pending.push(snapshot),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        debug!("Session change stream closed");
                        self.changes = None;
                        break;
                    }
                }
            }
        }
        for snapshot in pending {
            applied += usize::from(self.apply(snapshot));
        }
        applied
    }

    /// Stop listening and forget the session. Later events are dropped.
    pub fn shutdown(&mut self) {
        self.initial = None;
        self.changes = None;
        self.state = GateState::Loading;
    }

    fn apply(&mut self, snapshot: SessionSnapshot) -> bool {
        if self
            .applied_revision
            .is_some_and(|applied| snapshot.revision <= applied)
        {
            debug!(revision = snapshot.revision, "Ignoring stale session snapshot");
            return false;
        }
        self.applied_revision = Some(snapshot.revision);
        match &snapshot.session {
            Some(session) => info!(user = %session.user_id, revision = snapshot.revision, "Signed in"),
            None => info!(revision = snapshot.revision, "Signed out"),
        }
        self.state = GateState::Resolved(snapshot.session);
        true
    }
}

impl Drop for SessionGate {
    fn drop(&mut self) {
        self.shutdown();
    }
}
