mod data;
mod errors;

pub mod store;

pub use data::{EnrollmentSession, SessionState};
pub use errors::SessionError;
pub use store::{ExpiredDeletion, MemoryStore, SessionHandle, SessionStore};

use std::{result, sync::Arc};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Duration;
use rand::RngCore;
use tracing::{debug, error};

pub(crate) const DEFAULT_DURATION: Duration = Duration::minutes(15);
pub(crate) const DEFAULT_MAX_SESSIONS: usize = 100_000;

/// Random bytes behind a session token, 264 bits of entropy.
pub const TOKEN_BYTES: usize = 33;
/// Length of the freshness nonce handed to the document.
pub const NONCE_BYTES: usize = 8;
const MAX_ATTEMPTS: usize = 5;

type Result<T> = result::Result<T, SessionError>;

/// Creates, looks up and removes enrollment sessions on top of a [`SessionStore`].
#[derive(Debug, Clone)]
pub struct SessionManager<Store: SessionStore> {
    store: Arc<Store>,
    expiry: Duration,
    max_sessions: usize,
}

impl<Store: SessionStore> SessionManager<Store> {
    /// Creates a new session manager with the provided store.
    ///
    /// By default sessions expire after 15 idle minutes with a maximum of 100,000 allowed active sessions.
    /// These values can be overridden using the [with_expiry][we] and [with_max_sessions][wms] chainable methods.
    ///
    /// [we]: Self::with_expiry
    /// [wms]: Self::with_max_sessions
    ///
    /// # Examples
    ///
    /// ```
    /// # use enrollment_server::session::{MemoryStore, SessionManager};
    /// use chrono::Duration;
    ///
    /// let manager = SessionManager::new(MemoryStore::new())
    ///     .with_expiry(Duration::minutes(30))
    ///     .with_max_sessions(50_000);
    /// ```
    pub fn new(store: Store) -> Self {
        Self {
            store: Arc::new(store),
            expiry: DEFAULT_DURATION,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    /// Configures the idle expiry of all sessions.
    pub fn with_expiry(mut self, duration: Duration) -> Self {
        self.expiry = duration;
        self
    }

    /// Configures the maximum allowed number of sessions to handle at the same time.
    ///
    /// When this limit is reached, the session manager will reject new sessions
    /// until some sessions are deleted.
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Starts a new session with a fresh token and nonce.
    ///
    /// Token collisions are retried a bounded number of times.
    pub async fn create(&self) -> Result<(String, SessionHandle)> {
        if self.store.count().await? >= self.max_sessions {
            return Err(SessionError::MaxSessions);
        }

        let nonce = random_bytes(NONCE_BYTES);
        for _ in 0..MAX_ATTEMPTS {
            let token = generate_token();
            let session = EnrollmentSession::new(token.clone(), nonce.clone());
            match self.store.create(&token, session, self.expiry).await {
                Ok(handle) => return Ok((token, handle)),
                Err(SessionError::Collision) => {
                    debug!("Session token collision, generating a new one");
                }
                Err(e) => return Err(e),
            }
        }

        error!(
            "Failed to generate unique session token after {} attempts",
            MAX_ATTEMPTS
        );
        Err(SessionError::TokenExhausted(MAX_ATTEMPTS))
    }

    pub async fn get(&self, token: &str) -> Result<Option<SessionHandle>> {
        self.store.get(token).await
    }

    pub async fn contains(&self, token: &str) -> Result<bool> {
        self.store.contains(token).await
    }

    pub async fn remove(&self, token: &str) -> Result<()> {
        self.store.remove(token).await
    }
}

/// Generates an opaque, URL-safe session token.
pub fn generate_token() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes(TOKEN_BYTES))
}

pub(crate) fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}
