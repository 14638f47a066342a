use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend endpoint / API key not configured")]
    NotConfigured,

    // Network-level failure: connect, DNS, timeout.
    #[error("{0}")]
    Unavailable(String),

    #[error("upstream returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("{0}")]
    BadReply(String),
}

pub type BackendResult<T> = Result<T, BackendError>;
