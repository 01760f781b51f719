use thiserror::Error;

/// Errors raised by the tracker clients and the sync core.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The credential was rejected (HTTP 401). Needs re-authentication outside this process.
    #[error("Unauthorized: {url} rejected the credential")]
    Unauthorized { url: String, body: String },

    #[error("Upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl SyncError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SyncError::Unauthorized { .. })
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
