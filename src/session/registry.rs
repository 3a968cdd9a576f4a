use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{CoreError, Result};
use crate::session::session::{Session, SessionId};

/// Indexes live sessions by user (many-to-one) and by token (spec.md
/// §4.3). Grounded in the teacher's `session_manager::SessionManager`
/// concurrency shape, swapped from `Arc<RwLock<HashMap>>` to `DashMap`
/// (as the teacher does in `presence_manager.rs`) since registry mutation
/// and fan-out iteration must both proceed without a single global lock.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
    by_user: DashMap<String, HashSet<SessionId>>,
    by_token: DashMap<String, SessionId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `sess` under both indexes. Requires `sess.user_uuid()` to
    /// be bound; insertion on an unknown user auto-creates its session set.
    pub fn add(&self, sess: Arc<Session>) -> Result<()> {
        let user_uuid = sess
            .user_uuid()
            .ok_or_else(|| CoreError::ServerError("session has no bound user".into()))?;

        self.by_user
            .entry(user_uuid)
            .or_insert_with(HashSet::new)
            .insert(sess.id);

        if let Some(token) = sess.token() {
            self.by_token.insert(token, sess.id);
        }

        self.sessions.insert(sess.id, sess);
        Ok(())
    }

    pub fn remove(&self, sess: &Session) {
        self.sessions.remove(&sess.id);

        if let Some(user_uuid) = sess.user_uuid() {
            if let Some(mut set) = self.by_user.get_mut(&user_uuid) {
                set.remove(&sess.id);
                if set.is_empty() {
                    drop(set);
                    self.by_user.remove(&user_uuid);
                }
            }
        }

        if let Some(token) = sess.token() {
            self.by_token.remove(&token);
        }
    }

    /// Empty on miss.
    pub fn get_by_user(&self, user_uuid: &str) -> Vec<Arc<Session>> {
        self.by_user
            .get(user_uuid)
            .map(|set| {
                set.iter()
                    .filter_map(|id| self.sessions.get(id).map(|s| s.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_by_token(&self, token: &str) -> Option<Arc<Session>> {
        let id = *self.by_token.get(token)?;
        self.sessions.get(&id).map(|s| s.clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn online_user_count(&self) -> usize {
        self.by_user.len()
    }

    /// Snapshot-and-iterate: a clone of every live session, safe to hold
    /// across suspension points during fan-out (spec.md §4.3, §5).
    pub fn iter_all(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|e| e.value().clone()).collect()
    }
}
