// Error taxonomy for the remote session client

use std::path::PathBuf;
use thiserror::Error;

/// Everything the remote boundary can fail with. All of these are values the
/// pollers handle locally; none of them should ever abort a poll loop.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {path} timed out")]
    Timeout { path: String },

    #[error("transport error for {path}: {message}")]
    Transport { path: String, message: String },

    #[error("remote returned status {status} for {path}")]
    Status { status: u16, path: String },

    #[error("no client lockfile found under {dir}")]
    LockfileNotFound { dir: PathBuf },

    #[error("malformed lockfile at {path}: {message}")]
    MalformedLockfile { path: PathBuf, message: String },

    #[error("unexpected response shape from {path}: {message}")]
    UnexpectedShape { path: String, message: String },
}

impl ClientError {
    /// Transient failures: the next poll tick retries naturally, so these
    /// are logged at low severity and otherwise ignored.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Transport { .. } | Self::LockfileNotFound { .. }
        )
    }
}
