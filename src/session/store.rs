use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tokio::sync::Mutex;

use super::{EnrollmentSession, SessionError};

mod memory;

pub use memory::MemoryStore;

type Result<T> = std::result::Result<T, SessionError>;

/// Shared handle to a stored session. Holding the lock serialises requests on that session.
pub type SessionHandle = Arc<Mutex<EnrollmentSession>>;

/// Abstract interface for session storage backends.
#[async_trait]
pub trait SessionStore: Send + Sync + Clone + 'static {
    /// Registers a new session under `token`, idle for at most `ttl`.
    ///
    /// Never overwrites: an existing live session under the same token yields
    /// [`SessionError::Collision`].
    async fn create(
        &self,
        token: &str,
        session: EnrollmentSession,
        ttl: Duration,
    ) -> Result<SessionHandle>;

    /// Looks up a live session and refreshes its idle deadline.
    async fn get(&self, token: &str) -> Result<Option<SessionHandle>>;

    /// Checks if a live session is registered under `token`, without touching its deadline.
    async fn contains(&self, token: &str) -> Result<bool>;

    /// Deletes the session registered under `token`, if any.
    async fn remove(&self, token: &str) -> Result<()>;

    /// Returns the number of registered sessions.
    async fn count(&self) -> Result<usize>;
}

/// Provides a method for deleting expired sessions.
#[async_trait]
pub trait ExpiredDeletion: SessionStore
where
    Self: Sized,
{
    /// Deletes expired sessions, returning how many were dropped.
    async fn delete_expired(&self) -> Result<usize>;

    /// This function will keep running indefinitely, deleting expired sessions
    /// and then waiting for the specified period before deleting again.
    async fn delete_expired_sessions(self, period: tokio::time::Duration) -> Result<()> {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = self.delete_expired().await?;
            if removed > 0 {
                tracing::debug!(removed, "Deleted expired enrollment sessions");
            }
        }
    }
}
