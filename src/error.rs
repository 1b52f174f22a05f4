use thiserror::Error;

/// Failure of an outbound Discord REST call.
///
/// Cloneable so a single failed request can be handed to every caller that was
/// waiting on the same deduplicated operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Discord answered with a non-success status.
    #[error("Discord API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never produced a response (connect error, timeout, ...).
    #[error("Discord API request failed: {0}")]
    Transport(String),

    /// The response body was not what we expected.
    #[error("Failed to decode Discord API response: {0}")]
    Decode(String),

    /// The queue worker is gone, so the request can never be served.
    #[error("Discord API queue is closed")]
    QueueClosed,

    /// The task driving a shared operation died before producing a result.
    #[error("Discord API operation aborted: {0}")]
    Aborted(String),
}

impl ApiError {
    /// Rate limited (429) or server side (5xx) failures are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}
