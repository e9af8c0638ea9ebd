//! Error types for runner setup.

/// Errors produced while constructing or driving a [`crate::ScriptRunner`].
///
/// Script failures are never reported through this type; they become an
/// [`crate::InvocationResult`] with a non-zero code.
#[derive(Debug, thiserror::Error)]
pub enum ScriptboxError {
    #[error("invalid sandbox configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("failed to start script thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Result type for runner setup.
pub type Result<T> = std::result::Result<T, ScriptboxError>;
