use crate::error::SinkResult;
use async_trait::async_trait;
use content_indexer_common::Document;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Failure marker raised by a sink's background dispatch and checked after commit
#[derive(Debug, Clone, Default)]
pub struct ErrorFlag(Arc<AtomicBool>);

impl ErrorFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PingStatus {
    pub status: String,
    /// Server-side processing time in milliseconds
    pub qtime: Option<u64>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    pub num_found: u64,
    pub documents: Vec<serde_json::Value>,
}

impl QueryResponse {
    pub fn is_empty(&self) -> bool {
        self.num_found == 0
    }
}

/// Bulk-write search index.
///
/// `add` may hand documents to a background dispatcher and return before they are
/// written; failures of that dispatch only show up through [`IndexSink::error_flag`].
#[async_trait]
pub trait IndexSink: Send + Sync {
    async fn ping(&self) -> SinkResult<PingStatus>;

    /// Match-all query returning at most `limit` documents
    async fn query_all(&self, limit: usize) -> SinkResult<QueryResponse>;

    async fn delete_all(&self) -> SinkResult<()>;

    async fn add(&self, documents: Vec<Document>) -> SinkResult<()>;

    async fn commit(&self) -> SinkResult<()>;

    async fn rollback(&self) -> SinkResult<()>;

    fn error_flag(&self) -> &ErrorFlag;
}
