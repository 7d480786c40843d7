#![allow(dead_code)]

use async_trait::async_trait;
use content_indexer_common::Document;
use content_indexer_storage::{
    ConfigurationQuery, ContentNode, ErrorFlag, IndexSink, PingStatus, Property, QueryResponse,
    Repository, Session, SinkError, SinkResult, SnapshotNode, SnapshotRepository, SnapshotSession,
    StoreError, StoreResult,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

pub fn types() -> Value {
    json!({
        "hippostd:folder": [],
        "site:folder": ["hippostd:folder"],
        "hippo:handle": [],
        "hippo:document": [],
        "site:news": ["site:base"],
        "site:base": ["hippo:document"],
        "site:event": ["hippo:document"],
        "solr:configuration": [],
        "nt:unstructured": [],
        "rep:root": []
    })
}

/// Configuration record at `/content/{name}`
pub fn config_record(name: &str, node_types: &[&str], properties: &[&str]) -> Value {
    let mut record_properties = serde_json::Map::new();
    if !node_types.is_empty() {
        record_properties.insert("solr:node".into(), json!(node_types));
    }
    if !properties.is_empty() {
        record_properties.insert("solr:property".into(), json!(properties));
    }
    json!({
        "name": name,
        "primaryType": "solr:configuration",
        "properties": record_properties
    })
}

/// Handle `news-{n}` holding one live `site:news` variant titled `Title {n}`
pub fn news_handle(n: usize) -> Value {
    handle(n, "site:news", json!({
        "site:title": format!("Title {}", n),
        "hippo:availability": ["live", "preview"]
    }))
}

pub fn handle(n: usize, variant_type: &str, properties: Value) -> Value {
    json!({
        "name": format!("news-{}", n),
        "primaryType": "hippo:handle",
        "id": format!("handle-{}", n),
        "children": [{
            "name": format!("news-{}", n),
            "primaryType": variant_type,
            "id": format!("variant-{}", n),
            "properties": properties
        }]
    })
}

pub fn folder(name: &str, children: Vec<Value>) -> Value {
    json!({
        "name": name,
        "primaryType": "site:folder",
        "children": children
    })
}

/// Full repository export with `documents` below `/content/documents`
pub fn site(documents: Vec<Value>, records: Vec<Value>) -> Value {
    let mut content = vec![json!({
        "name": "documents",
        "primaryType": "hippostd:folder",
        "children": documents
    })];
    content.extend(records);

    json!({
        "types": types(),
        "root": {
            "primaryType": "rep:root",
            "children": [{
                "name": "content",
                "primaryType": "nt:unstructured",
                "children": content
            }]
        }
    })
}

/// `count` live news documents split across folders of 100, indexed on `site:title`
pub fn news_site(count: usize) -> Value {
    let handles: Vec<Value> = (0..count).map(news_handle).collect();
    let folders = handles
        .chunks(100)
        .enumerate()
        .map(|(i, chunk)| folder(&format!("folder-{}", i), chunk.to_vec()))
        .collect();
    site(folders, vec![config_record("indexing", &["site:news"], &["site:title"])])
}

pub fn repository(snapshot: Value) -> SnapshotRepository {
    SnapshotRepository::from_value(snapshot).unwrap()
}

// ---------------------------------------------------------------------------
// Repository wrapper with injectable read failures
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Faults {
    /// Paths whose children cannot be listed
    pub children: HashSet<String>,
    /// Paths whose supertypes cannot be read
    pub supertypes: HashSet<String>,
    /// (path, property name) pairs that cannot be read
    pub properties: HashSet<(String, String)>,
    /// Paths whose parent cannot be read
    pub parents: HashSet<String>,
    pub supertype_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
}

fn access_error(path: &str, reason: &str) -> StoreError {
    StoreError::Access {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct FaultyNode {
    inner: SnapshotNode,
    faults: Arc<Faults>,
}

impl FaultyNode {
    fn wrap(&self, inner: SnapshotNode) -> Self {
        Self {
            inner,
            faults: Arc::clone(&self.faults),
        }
    }
}

impl ContentNode for FaultyNode {
    fn path(&self) -> String {
        self.inner.path()
    }

    fn identifier(&self) -> StoreResult<String> {
        self.inner.identifier()
    }

    fn primary_type(&self) -> StoreResult<String> {
        self.inner.primary_type()
    }

    fn supertypes(&self) -> StoreResult<Vec<String>> {
        self.faults.supertype_calls.fetch_add(1, Ordering::SeqCst);
        if self.faults.supertypes.contains(&self.path()) {
            return Err(access_error(&self.path(), "supertypes unreadable"));
        }
        self.inner.supertypes()
    }

    fn children(&self) -> StoreResult<Vec<Self>> {
        if self.faults.children.contains(&self.path()) {
            return Err(access_error(&self.path(), "children unreadable"));
        }
        Ok(self
            .inner
            .children()?
            .into_iter()
            .map(|child| self.wrap(child))
            .collect())
    }

    fn child(&self, name: &str) -> StoreResult<Option<Self>> {
        Ok(self.inner.child(name)?.map(|child| self.wrap(child)))
    }

    fn parent(&self) -> StoreResult<Option<Self>> {
        if self.faults.parents.contains(&self.path()) {
            return Err(access_error(&self.path(), "parent unreadable"));
        }
        Ok(self.inner.parent()?.map(|parent| self.wrap(parent)))
    }

    fn property(&self, name: &str) -> StoreResult<Option<Property>> {
        if self
            .faults
            .properties
            .contains(&(self.path(), name.to_string()))
        {
            return Err(access_error(&self.path(), "property unreadable"));
        }
        self.inner.property(name)
    }
}

pub struct FaultySession {
    inner: SnapshotSession,
    faults: Arc<Faults>,
}

impl FaultySession {
    fn wrap(&self, inner: SnapshotNode) -> FaultyNode {
        FaultyNode {
            inner,
            faults: Arc::clone(&self.faults),
        }
    }
}

impl Session for FaultySession {
    type Node = FaultyNode;

    fn query(&self, query: &ConfigurationQuery) -> StoreResult<Vec<FaultyNode>> {
        Ok(self
            .inner
            .query(query)?
            .into_iter()
            .map(|node| self.wrap(node))
            .collect())
    }

    fn node_at(&self, path: &str) -> StoreResult<Option<FaultyNode>> {
        Ok(self.inner.node_at(path)?.map(|node| self.wrap(node)))
    }

    fn is_live(&self) -> bool {
        self.inner.is_live()
    }

    fn logout(&self) {
        self.inner.logout()
    }
}

pub struct FaultyRepository {
    inner: SnapshotRepository,
    pub faults: Arc<Faults>,
}

impl FaultyRepository {
    pub fn new(snapshot: Value, faults: Faults) -> Self {
        Self {
            inner: repository(snapshot),
            faults: Arc::new(faults),
        }
    }

    pub fn session(&self) -> FaultySession {
        self.login().unwrap()
    }
}

impl Repository for FaultyRepository {
    type Session = FaultySession;

    fn login(&self) -> StoreResult<FaultySession> {
        self.faults.login_calls.fetch_add(1, Ordering::SeqCst);
        Ok(FaultySession {
            inner: self.inner.login()?,
            faults: Arc::clone(&self.faults),
        })
    }
}

// ---------------------------------------------------------------------------
// In-memory sink recording every call
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct SinkState {
    /// Working copy: committed documents plus uncommitted changes
    pub staged: BTreeMap<String, Document>,
    pub committed: BTreeMap<String, Document>,
    /// Size of every `add` call, in order
    pub batches: Vec<usize>,
    pub calls: Vec<&'static str>,
    pub rollbacks: usize,
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    state: Mutex<SinkState>,
    flag: ErrorFlag,
    pub fail_ping: AtomicBool,
    pub fail_add: AtomicBool,
    /// `add` succeeds but the documents never arrive and the error flag is raised
    pub fail_dispatch: AtomicBool,
    pub fail_commit: AtomicBool,
    pub fail_query: AtomicBool,
}

fn document_id(document: &Document) -> String {
    document
        .first("id")
        .map(|value| value.to_string())
        .unwrap_or_else(|| document.to_string())
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose index already holds `documents`
    pub fn with_documents(documents: Vec<Document>) -> Self {
        let sink = Self::default();
        {
            let mut state = sink.state.lock().unwrap();
            for document in documents {
                let id = document_id(&document);
                state.committed.insert(id.clone(), document.clone());
                state.staged.insert(id, document);
            }
        }
        sink
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, SinkState> {
        self.state.lock().unwrap()
    }

    pub fn committed_ids(&self) -> Vec<String> {
        self.state().committed.keys().cloned().collect()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    fn record(&self, call: &'static str) {
        self.state().calls.push(call);
    }
}

fn injected(what: &str) -> SinkError {
    SinkError::Response(format!("injected {} failure", what))
}

#[async_trait]
impl IndexSink for RecordingSink {
    async fn ping(&self) -> SinkResult<PingStatus> {
        self.record("ping");
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(injected("ping"));
        }
        Ok(PingStatus {
            status: "OK".to_string(),
            qtime: Some(1),
            elapsed: Duration::from_millis(2),
        })
    }

    async fn query_all(&self, limit: usize) -> SinkResult<QueryResponse> {
        self.record("query_all");
        if self.fail_query.load(Ordering::SeqCst) {
            return Err(injected("query"));
        }
        let state = self.state();
        Ok(QueryResponse {
            num_found: state.committed.len() as u64,
            documents: state
                .committed
                .keys()
                .take(limit)
                .map(|id| json!({ "id": id }))
                .collect(),
        })
    }

    async fn delete_all(&self) -> SinkResult<()> {
        self.record("delete_all");
        self.state().staged.clear();
        Ok(())
    }

    async fn add(&self, documents: Vec<Document>) -> SinkResult<()> {
        self.record("add");
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(injected("add"));
        }
        let mut state = self.state.lock().unwrap();
        state.batches.push(documents.len());
        if self.fail_dispatch.load(Ordering::SeqCst) {
            self.flag.raise();
            return Ok(());
        }
        for document in documents {
            state.staged.insert(document_id(&document), document);
        }
        Ok(())
    }

    async fn commit(&self) -> SinkResult<()> {
        self.record("commit");
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(injected("commit"));
        }
        let mut state = self.state.lock().unwrap();
        let staged = state.staged.clone();
        state.committed = staged;
        Ok(())
    }

    async fn rollback(&self) -> SinkResult<()> {
        self.record("rollback");
        let mut state = self.state.lock().unwrap();
        let committed = state.committed.clone();
        state.staged = committed;
        state.rollbacks += 1;
        Ok(())
    }

    fn error_flag(&self) -> &ErrorFlag {
        &self.flag
    }
}
