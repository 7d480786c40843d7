pub mod error;
pub mod repository;
pub mod sink;
pub mod snapshot;
pub mod solr;

pub use error::{SinkError, SinkResult, StoreError, StoreResult};
pub use repository::{ConfigurationQuery, ContentNode, Property, Repository, Session, Value, ValueKind};
pub use sink::{ErrorFlag, IndexSink, PingStatus, QueryResponse};
pub use snapshot::{SnapshotNode, SnapshotRepository, SnapshotSession};
pub use solr::SolrSink;
