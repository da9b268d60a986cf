use thiserror::Error;

/// Failure classes for a sync run.
///
/// Transport failures and rate limiting are transient: idempotent requests
/// may be retried through [`crate::retry`]. Everything else aborts the run;
/// rerunning the whole sync is the recovery path.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Missing or unreadable configuration. Surfaces before any remote call.
    #[error("config error: {0}")]
    Config(String),

    /// Transport-level failure (connect, timeout, TLS).
    #[error("http error: {0}")]
    Http(String),

    /// The remote answered but broke its contract: a client-error status,
    /// a failure code in the envelope, or an unparseable payload.
    #[error("remote protocol error: {0}")]
    Protocol(String),

    /// The remote asked us to slow down.
    #[error("rate limited, retry after {retry_after}s")]
    RateLimit { retry_after: u64 },

    /// A bulk-mutation ticket reached a terminal status other than complete.
    #[error("ticket {ticket} failed with status '{status}'")]
    TicketFailed { ticket: String, status: String },

    /// A ticket stayed pending past the configured poll budget.
    #[error("ticket {ticket} still pending after {attempts} polls")]
    TicketTimeout { ticket: String, attempts: u32 },

    /// The configured playlist no longer exists on the remote account.
    #[error("playlist {key} not found among owned playlists")]
    PlaylistNotFound { key: String },

    /// The run was cancelled cooperatively.
    #[error("sync cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// True for failures that may clear up on their own. Only idempotent
    /// requests are retried on these; mutations never are.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Http(_) | SyncError::RateLimit { .. })
    }

    /// Wait the remote asked for, if it told us one.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            SyncError::RateLimit { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::Http(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
