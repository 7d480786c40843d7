pub mod classifier;
pub mod configuration;
pub mod error;
pub mod pipeline;
pub mod walker;

pub use classifier::NodeClassifier;
pub use configuration::{sanitize_extra_mappings, sanitize_field_id, Filter};
pub use error::IndexingError;
pub use pipeline::{BatchQueue, Indexer, IndexerOptions, RunOutcome};
pub use walker::DocumentWalker;
