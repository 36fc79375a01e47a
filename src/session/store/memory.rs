use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::session::{
    EnrollmentSession, SessionError,
    store::{ExpiredDeletion, Result, SessionHandle, SessionStore},
};

#[derive(Debug)]
struct Slot {
    session: SessionHandle,
    ttl: Duration,
    expires_at: DateTime<Utc>,
}

impl Slot {
    fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// An in-memory session store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    sessions: Arc<DashMap<String, Slot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn deadline(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now.checked_add_signed(ttl)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create(
        &self,
        token: &str,
        session: EnrollmentSession,
        ttl: Duration,
    ) -> Result<SessionHandle> {
        let now = Utc::now();
        let handle = Arc::new(Mutex::new(session));
        let slot = Slot {
            session: handle.clone(),
            ttl,
            expires_at: deadline(now, ttl),
        };
        match self.sessions.entry(token.to_string()) {
            Entry::Occupied(mut existing) => {
                if existing.get().is_active(now) {
                    return Err(SessionError::Collision);
                }
                existing.insert(slot);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
            }
        }
        Ok(handle)
    }

    async fn get(&self, token: &str) -> Result<Option<SessionHandle>> {
        let now = Utc::now();
        if let Some(mut slot) = self.sessions.get_mut(token) {
            if slot.is_active(now) {
                let ttl = slot.ttl;
                slot.expires_at = deadline(now, ttl);
                return Ok(Some(slot.session.clone()));
            }
        } else {
            return Ok(None);
        }
        self.sessions.remove_if(token, |_, slot| !slot.is_active(now));
        Ok(None)
    }

    async fn contains(&self, token: &str) -> Result<bool> {
        let now = Utc::now();
        Ok(self
            .sessions
            .get(token)
            .is_some_and(|slot| slot.is_active(now)))
    }

    async fn remove(&self, token: &str) -> Result<()> {
        self.sessions.remove(token);
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.sessions.len())
    }
}

#[async_trait]
impl ExpiredDeletion for MemoryStore {
    async fn delete_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, slot| slot.is_active(now));
        Ok(before.saturating_sub(self.sessions.len()))
    }
}
