use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use crate::model::event::SessionEvent;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque session identity. A plain counter is sufficient here since the
/// core has no wire-protocol concept of connection identity (that belongs
/// to the adapter); uniqueness for the process lifetime is all we need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn next() -> Self {
        SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sess-{}", self.0)
    }
}

/// Core-visible lifecycle state (spec.md §4.9). Wire-protocol sequencing
/// (SYN/LST/CHG for MSNP) lives entirely in the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Fresh,
    Authenticating,
    Online,
    Closed,
}

/// A connected client. Bound to a `User` (by uuid) once `_login_common`
/// succeeds; `user_uuid` is `None` while `Fresh`/`Authenticating`.
pub struct Session {
    pub id: SessionId,
    state: Mutex<SessionState>,
    user_uuid: Mutex<Option<String>>,
    /// The fresh session token minted at `_login_common` time (spec.md §9
    /// Open Question: not the one-shot `nb/login` token).
    token: Mutex<Option<String>>,
    events: UnboundedSender<SessionEvent>,
}

impl Session {
    pub fn new(events: UnboundedSender<SessionEvent>) -> Self {
        Self {
            id: SessionId::next(),
            state: Mutex::new(SessionState::Fresh),
            user_uuid: Mutex::new(None),
            token: Mutex::new(None),
            events,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn user_uuid(&self) -> Option<String> {
        self.user_uuid.lock().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.token.lock().clone()
    }

    /// Binds this session to a user and a freshly minted session token,
    /// transitioning `Fresh`/`Authenticating` → `Online`.
    pub fn bind(&self, user_uuid: String, token: String) {
        *self.user_uuid.lock() = Some(user_uuid);
        *self.token.lock() = Some(token);
        *self.state.lock() = SessionState::Online;
    }

    pub fn close(&self) {
        *self.state.lock() = SessionState::Closed;
    }

    /// Dispatches an event to the adapter that owns this session's
    /// transport. A closed receiver (adapter gone) is not an error here —
    /// `on_connection_lost` will clean the registry up independently.
    pub fn send_event(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("user_uuid", &self.user_uuid())
            .finish()
    }
}
