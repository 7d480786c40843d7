//! Solr sink speaking the JSON update API.
//!
//! Added batches are posted by a single background worker, so `add` returns as soon
//! as the batch is queued. Posting failures raise the sink's [`ErrorFlag`]; `commit`,
//! `rollback` and `delete_all` wait for the queue to drain before they are sent.

use crate::error::{SinkError, SinkResult};
use crate::sink::{ErrorFlag, IndexSink, PingStatus, QueryResponse};
use async_trait::async_trait;
use content_indexer_common::{Document, SinkConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument};
use url::Url;

const QUERY_ALL: &str = "*:*";

#[derive(Debug, Deserialize)]
struct ResponseHeader {
    #[serde(default)]
    status: i64,
    #[serde(rename = "QTime")]
    qtime: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PingResponse {
    #[serde(rename = "responseHeader")]
    header: Option<ResponseHeader>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SelectResponse {
    response: SelectResults,
}

#[derive(Debug, Deserialize)]
struct SelectResults {
    #[serde(rename = "numFound")]
    num_found: u64,
    #[serde(default)]
    docs: Vec<serde_json::Value>,
}

enum Dispatch {
    Batch(Vec<Document>),
    Barrier(oneshot::Sender<()>),
}

/// HTTP client for one Solr core
#[derive(Debug, Clone)]
pub struct SolrSink {
    client: Client,
    base_url: String,
    queue: mpsc::Sender<Dispatch>,
    error_flag: ErrorFlag,
}

impl std::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dispatch::Batch(documents) => write!(f, "Batch({})", documents.len()),
            Dispatch::Barrier(_) => write!(f, "Barrier"),
        }
    }
}

impl SolrSink {
    /// Build the client and spawn its dispatch worker; must run inside a tokio runtime
    #[instrument(skip_all, fields(url = %config.url))]
    pub fn new(config: &SinkConfig) -> SinkResult<Self> {
        let url = Url::parse(config.url.trim())?;
        let client = Client::builder()
            .timeout(config.timeout())
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        let base_url = url.as_str().trim_end_matches('/').to_string();
        let error_flag = ErrorFlag::new();
        let (queue, rx) = mpsc::channel(config.dispatch_capacity.max(1));

        tokio::spawn(dispatch_loop(
            client.clone(),
            update_url(&base_url),
            rx,
            error_flag.clone(),
        ));

        info!(
            "Initialized Solr sink: url={}, timeout={}s",
            base_url, config.timeout_secs
        );

        Ok(Self {
            client,
            base_url,
            queue,
            error_flag,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Wait until every batch queued so far has been posted
    async fn drain(&self) -> SinkResult<()> {
        let (done, finished) = oneshot::channel();
        self.queue
            .send(Dispatch::Barrier(done))
            .await
            .map_err(|_| SinkError::DispatchClosed)?;
        finished.await.map_err(|_| SinkError::DispatchClosed)
    }

    async fn update<T: Serialize + ?Sized>(&self, body: &T) -> SinkResult<()> {
        post_json(&self.client, &update_url(&self.base_url), body).await
    }
}

fn update_url(base_url: &str) -> String {
    format!("{}/update?wt=json", base_url)
}

async fn post_json<T: Serialize + ?Sized>(client: &Client, url: &str, body: &T) -> SinkResult<()> {
    let response = client.post(url).json(body).send().await?;
    check_status(response).await.map(|_| ())
}

async fn check_status(response: reqwest::Response) -> SinkResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(SinkError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

async fn dispatch_loop(
    client: Client,
    url: String,
    mut rx: mpsc::Receiver<Dispatch>,
    error_flag: ErrorFlag,
) {
    while let Some(message) = rx.recv().await {
        match message {
            Dispatch::Batch(documents) => {
                debug!("Posting {} documents", documents.len());
                if let Err(e) = post_json(&client, &url, &documents).await {
                    error!("Error intercepted, check Solr logs for more details: {}", e);
                    error_flag.raise();
                }
            }
            Dispatch::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Solr dispatch worker stopped");
}

#[async_trait]
impl IndexSink for SolrSink {
    #[instrument(skip(self), fields(url = %self.base_url))]
    async fn ping(&self) -> SinkResult<PingStatus> {
        let started = Instant::now();
        let response = self
            .client
            .get(format!("{}/admin/ping", self.base_url))
            .query(&[("wt", "json")])
            .send()
            .await?;
        let ping: PingResponse = check_status(response).await?.json().await?;
        let elapsed = started.elapsed();

        let header_status = ping.header.as_ref().map(|h| h.status).unwrap_or_default();
        let status = ping.status.unwrap_or_else(|| "OK".to_string());
        if header_status != 0 || !status.eq_ignore_ascii_case("OK") {
            return Err(SinkError::Response(format!(
                "ping returned status {} ({})",
                status, header_status
            )));
        }

        Ok(PingStatus {
            status,
            qtime: ping.header.and_then(|h| h.qtime),
            elapsed,
        })
    }

    #[instrument(skip(self), fields(url = %self.base_url))]
    async fn query_all(&self, limit: usize) -> SinkResult<QueryResponse> {
        let rows = limit.to_string();
        let response = self
            .client
            .get(format!("{}/select", self.base_url))
            .query(&[("q", QUERY_ALL), ("rows", rows.as_str()), ("wt", "json")])
            .send()
            .await?;
        let select: SelectResponse = check_status(response).await?.json().await?;

        Ok(QueryResponse {
            num_found: select.response.num_found,
            documents: select.response.docs,
        })
    }

    #[instrument(skip(self), fields(url = %self.base_url))]
    async fn delete_all(&self) -> SinkResult<()> {
        self.drain().await?;
        self.update(&json!({ "delete": { "query": QUERY_ALL } })).await
    }

    async fn add(&self, documents: Vec<Document>) -> SinkResult<()> {
        if documents.is_empty() {
            return Ok(());
        }
        self.queue
            .send(Dispatch::Batch(documents))
            .await
            .map_err(|_| SinkError::DispatchClosed)
    }

    #[instrument(skip(self), fields(url = %self.base_url))]
    async fn commit(&self) -> SinkResult<()> {
        self.drain().await?;
        self.update(&json!({ "commit": {} })).await
    }

    #[instrument(skip(self), fields(url = %self.base_url))]
    async fn rollback(&self) -> SinkResult<()> {
        self.drain().await?;
        self.update(&json!({ "rollback": {} })).await
    }

    fn error_flag(&self) -> &ErrorFlag {
        &self.error_flag
    }
}
