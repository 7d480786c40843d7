use thiserror::Error;

/// Failures reported by the content repository
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Repository unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("Invalid property {property} at {path}: {reason}")]
    InvalidProperty {
        path: String,
        property: String,
        reason: String,
    },

    #[error("Session is closed")]
    SessionClosed,

    #[error("Repository error at {path}: {reason}")]
    Access { path: String, reason: String },
}

/// Failures reported by the search index sink
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sink returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid sink URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Unexpected sink response: {0}")]
    Response(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Dispatch worker stopped")]
    DispatchClosed,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type SinkResult<T> = std::result::Result<T, SinkError>;
