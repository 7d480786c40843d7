use content_indexer_storage::{SinkError, StoreError};
use thiserror::Error;

/// Failure of one phase of an indexing run
#[derive(Error, Debug)]
pub enum IndexingError {
    #[error("Cannot open a repository session: {0}")]
    Session(#[source] StoreError),

    #[error("Sink ping failed: {0}")]
    Ping(#[source] SinkError),

    #[error("Configuration is not valid: {0}")]
    InvalidFilter(String),

    #[error("Failed to delete the current index: {0}")]
    Delete(#[source] SinkError),

    #[error("Failed to submit documents: {0}")]
    Submit(#[source] SinkError),

    #[error("Blocking worker failed: {0}")]
    Traversal(#[from] tokio::task::JoinError),

    #[error("Commit failed: {0}")]
    Commit(#[source] SinkError),

    #[error("Error intercepted while indexing documents")]
    AsyncFailure,
}

impl IndexingError {
    /// Whether the sink may hold uncommitted changes when this error is raised
    pub fn requires_rollback(&self) -> bool {
        !matches!(
            self,
            IndexingError::Session(_) | IndexingError::Ping(_) | IndexingError::InvalidFilter(_)
        )
    }
}
