/// Session errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("A session with this token already exists")]
    Collision,

    #[error("Failed to generate a unique session token after {0} attempts")]
    TokenExhausted(usize),

    #[error("Maximum number of sessions reached")]
    MaxSessions,
}
