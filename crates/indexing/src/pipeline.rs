use crate::classifier::NodeClassifier;
use crate::configuration::{self, sanitize_extra_mappings, Filter};
use crate::error::IndexingError;
use crate::walker::DocumentWalker;
use content_indexer_common::{Document, IndexingConfig};
use content_indexer_storage::{IndexSink, Repository, Session};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

type Result<T> = std::result::Result<T, IndexingError>;

#[derive(Debug, Clone)]
pub struct IndexerOptions {
    pub batch_size: usize,
    pub documents_root: String,
    pub startup_poll_interval: Duration,
    /// Field mappings applied before the ones read from the repository
    pub extra_fields: BTreeMap<String, String>,
}

impl IndexerOptions {
    pub fn from_config(config: &IndexingConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            documents_root: config.documents_root.clone(),
            startup_poll_interval: config.startup_poll_interval(),
            extra_fields: sanitize_extra_mappings(&config.field_mappings),
        }
    }
}

impl Default for IndexerOptions {
    fn default() -> Self {
        Self::from_config(&IndexingConfig::default())
    }
}

/// Documents waiting to be submitted, released in batches of a fixed size
#[derive(Debug)]
pub struct BatchQueue {
    batch_size: usize,
    documents: Vec<Document>,
}

impl BatchQueue {
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            documents: Vec::with_capacity(batch_size),
        }
    }

    /// Enqueue a document; returns the full batch once the queue reaches the batch size
    pub fn push(&mut self, document: Document) -> Option<Vec<Document>> {
        self.documents.push(document);
        if self.documents.len() >= self.batch_size {
            Some(std::mem::replace(
                &mut self.documents,
                Vec::with_capacity(self.batch_size),
            ))
        } else {
            None
        }
    }

    /// Whatever is left after the traversal, `None` when nothing is queued
    pub fn take_remaining(&mut self) -> Option<Vec<Document>> {
        if self.documents.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.documents))
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

struct RunState {
    indexed: usize,
    started: Instant,
}

impl RunState {
    fn new() -> Self {
        Self {
            indexed: 0,
            started: Instant::now(),
        }
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed { indexed: usize, elapsed: Duration },
    /// Failed before the sink was modified
    Aborted(IndexingError),
    /// Failed after the sink was modified; uncommitted changes were rolled back
    RolledBack { error: IndexingError, submitted: usize },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }
}

/// Rebuilds the search index from the documents tree of a content repository.
///
/// A run pings the sink, loads the filter, deletes the whole index, streams every
/// indexable document to the sink in batches and commits. Runs never overlap.
pub struct Indexer<R, K> {
    repository: Arc<R>,
    sink: Arc<K>,
    classifier: Arc<NodeClassifier>,
    options: IndexerOptions,
    run_lock: Mutex<()>,
}

impl<R, K> Indexer<R, K>
where
    R: Repository,
    K: IndexSink + 'static,
{
    pub fn new(repository: Arc<R>, sink: Arc<K>, mut options: IndexerOptions) -> Self {
        options.batch_size = options.batch_size.max(1);
        Self {
            repository,
            sink,
            classifier: Arc::new(NodeClassifier::new()),
            options,
            run_lock: Mutex::new(()),
        }
    }

    pub fn sink(&self) -> &Arc<K> {
        &self.sink
    }

    pub fn options(&self) -> &IndexerOptions {
        &self.options
    }

    /// One full rebuild, waiting for any run in progress to finish first
    pub async fn run(&self) -> RunOutcome {
        let _guard = self.run_lock.lock().await;
        self.run_locked().await
    }

    async fn run_locked(&self) -> RunOutcome {
        info!("🚀 Start indexing");
        self.sink.error_flag().reset();
        let mut state = RunState::new();

        let session = match self.open_session().await {
            Ok(session) => Arc::new(session),
            Err(e) => {
                error!("Indexing aborted: {}", e);
                return RunOutcome::Aborted(e);
            }
        };

        let result = self.rebuild(Arc::clone(&session), &mut state).await;
        session.logout();

        match result {
            Ok(()) => {
                let elapsed = state.started.elapsed();
                info!(
                    "✅ {} documents successfully indexed in {} minutes",
                    state.indexed,
                    elapsed.as_secs() / 60
                );
                RunOutcome::Completed {
                    indexed: state.indexed,
                    elapsed,
                }
            }
            Err(e) if e.requires_rollback() => {
                error!("Indexing failed, rolling back: {}", e);
                self.rollback().await;
                RunOutcome::RolledBack {
                    error: e,
                    submitted: state.indexed,
                }
            }
            Err(e) => {
                error!("Indexing aborted: {}", e);
                RunOutcome::Aborted(e)
            }
        }
    }

    async fn open_session(&self) -> Result<R::Session> {
        let repository = Arc::clone(&self.repository);
        tokio::task::spawn_blocking(move || repository.login())
            .await?
            .map_err(IndexingError::Session)
    }

    async fn rebuild(&self, session: Arc<R::Session>, state: &mut RunState) -> Result<()> {
        let status = self.sink.ping().await.map_err(IndexingError::Ping)?;
        info!(
            "Solr ping: {} ms, QTime {}, status {}",
            status.elapsed.as_millis(),
            status.qtime.map_or_else(|| "n/a".to_string(), |q| q.to_string()),
            status.status
        );

        let filter = self.configure(session.as_ref())?;

        info!("Deleting the current index");
        self.sink.delete_all().await.map_err(IndexingError::Delete)?;

        self.index_documents(session, filter, state).await?;

        info!("Committing {} documents", state.indexed);
        self.sink.commit().await.map_err(IndexingError::Commit)?;

        if self.sink.error_flag().is_raised() {
            return Err(IndexingError::AsyncFailure);
        }
        Ok(())
    }

    fn configure(&self, session: &R::Session) -> Result<Filter> {
        let filter = configuration::load(session, &self.options.extra_fields);
        info!("Indexing with {}", filter);
        if filter.is_valid(session) {
            Ok(filter)
        } else {
            Err(IndexingError::InvalidFilter(filter.to_string()))
        }
    }

    /// Walk the documents tree on a blocking worker and submit what it yields
    async fn index_documents(
        &self,
        session: Arc<R::Session>,
        filter: Filter,
        state: &mut RunState,
    ) -> Result<()> {
        let (tx, mut rx) = mpsc::channel(self.options.batch_size);
        let classifier = Arc::clone(&self.classifier);
        let root = self.options.documents_root.clone();

        let producer = tokio::task::spawn_blocking(move || {
            let walker = DocumentWalker::from_path(session.as_ref(), &root, &classifier, &filter);
            for document in walker {
                if tx.blocking_send(document).is_err() {
                    debug!("Document consumer gone, stopping traversal");
                    break;
                }
            }
        });

        let mut queue = BatchQueue::new(self.options.batch_size);
        let mut failure = None;
        while let Some(document) = rx.recv().await {
            if let Some(batch) = queue.push(document) {
                if let Err(e) = self.submit(batch, state).await {
                    failure = Some(e);
                    break;
                }
            }
        }

        drop(rx);
        producer.await?;
        if let Some(e) = failure {
            return Err(e);
        }

        if let Some(batch) = queue.take_remaining() {
            self.submit(batch, state).await?;
        }
        Ok(())
    }

    async fn submit(&self, batch: Vec<Document>, state: &mut RunState) -> Result<()> {
        let count = batch.len();
        self.sink.add(batch).await.map_err(IndexingError::Submit)?;
        state.indexed += count;
        info!("{} documents submitted ({} in total)", count, state.indexed);
        Ok(())
    }

    async fn rollback(&self) {
        match self.sink.rollback().await {
            Ok(()) => info!("Rollback done"),
            Err(e) => error!("Rollback failed: {}", e),
        }
    }

    /// Wait for the repository, then rebuild only if the index is empty.
    ///
    /// Returns the outcome of the run, or `None` when no run was needed or the
    /// index could not be queried.
    pub async fn startup_check(&self) -> Option<RunOutcome> {
        self.wait_for_repository().await;

        let _guard = self.run_lock.lock().await;
        match self.sink.query_all(1).await {
            Ok(response) if response.is_empty() => {
                info!("Index is empty, starting the initial indexing");
                Some(self.run_locked().await)
            }
            Ok(response) => {
                info!(
                    "Index already holds {} documents, skipping the initial indexing",
                    response.num_found
                );
                None
            }
            Err(e) => {
                error!("Failed to query the index: {}", e);
                None
            }
        }
    }

    pub fn spawn_startup_check(self: Arc<Self>) -> JoinHandle<Option<RunOutcome>> {
        tokio::spawn(async move { self.startup_check().await })
    }

    async fn wait_for_repository(&self) {
        loop {
            match self.open_session().await {
                Ok(session) => {
                    session.logout();
                    info!("Repository available");
                    return;
                }
                Err(e) => info!(
                    "Repository not ready yet ({}), retrying in {:?}",
                    e, self.options.startup_poll_interval
                ),
            }
            tokio::time::sleep(self.options.startup_poll_interval).await;
        }
    }

    /// Filter the next run would use, without touching the sink
    pub async fn load_filter(&self) -> Result<Filter> {
        let session = self.open_session().await?;
        let filter = configuration::load(&session, &self.options.extra_fields);
        session.logout();
        Ok(filter)
    }
}
