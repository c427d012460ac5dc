use std::collections::HashMap;
use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::dto::SessionView;
use super::machine::{ScanSession, SessionError};

struct Entry {
    session: ScanSession,
    updated_at: OffsetDateTime,
}

impl Entry {
    fn view(&self, id: Uuid) -> SessionView {
        SessionView {
            id,
            generation: self.session.generation(),
            state: self.session.state().clone(),
            updated_at: self.updated_at,
        }
    }
}

/// In-memory, anonymous display sessions. The lock is only held for state
/// transitions, never across a model call.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, Entry>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub async fn create(&self) -> SessionView {
        let now = OffsetDateTime::now_utc();
        let id = Uuid::new_v4();
        let mut map = self.inner.write().await;
        Self::evict_locked(&mut map, now, self.ttl);
        let entry = Entry {
            session: ScanSession::new(),
            updated_at: now,
        };
        let view = entry.view(id);
        map.insert(id, entry);
        view
    }

    pub async fn get(&self, id: Uuid) -> Result<SessionView, SessionError> {
        let map = self.inner.read().await;
        map.get(&id)
            .map(|e| e.view(id))
            .ok_or(SessionError::NotFound)
    }

    /// Runs one transition and returns its result with the updated view.
    pub async fn update<R>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut ScanSession) -> R,
    ) -> Result<(R, SessionView), SessionError> {
        let mut map = self.inner.write().await;
        let entry = map.get_mut(&id).ok_or(SessionError::NotFound)?;
        let out = f(&mut entry.session);
        entry.updated_at = OffsetDateTime::now_utc();
        Ok((out, entry.view(id)))
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.inner.write().await.remove(&id).is_some()
    }

    pub async fn evict_expired(&self) -> usize {
        let mut map = self.inner.write().await;
        Self::evict_locked(&mut map, OffsetDateTime::now_utc(), self.ttl)
    }

    fn evict_locked(map: &mut HashMap<Uuid, Entry>, now: OffsetDateTime, ttl: Duration) -> usize {
        let before = map.len();
        map.retain(|_, e| now - e.updated_at <= ttl);
        before - map.len()
    }
}
