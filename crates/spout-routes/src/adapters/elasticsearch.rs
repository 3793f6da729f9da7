//! Bulk indexing into Elasticsearch.
//!
//! Records are turned into documents as they arrive and queued for a
//! background task that sends them with the `_bulk` API. A batch is flushed
//! when it reaches [`BulkConfig::max_docs`] or when its oldest document has
//! waited [`BulkConfig::max_delay`], whichever comes first.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use spout_logs::LogRecord;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{RouteError, RouteResult};
use crate::types::Target;

/// Kubernetes container naming:
/// `k8s_<container>[.<hash>]_<pod>{_|.}<namespace>...`.
static K8S_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^k8s_([^._]+)(?:\.[^_]*)?_([^._]+)[._]([^._]+)").unwrap_or_else(|_| unreachable!())
});

/// Bulk indexing parameters.
#[derive(Debug, Clone)]
pub struct BulkConfig {
    /// Documents per bulk request.
    pub max_docs: usize,
    /// Longest time a document waits before its batch is sent.
    pub max_delay: Duration,
    /// Documents that may wait for the indexer before new ones are dropped.
    pub queue_capacity: usize,
    /// Timeout for one bulk request.
    pub request_timeout: Duration,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_docs: 10,
            max_delay: Duration::from_millis(100),
            queue_capacity: 1024,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl BulkConfig {
    /// Set the batch size. Zero is raised to one.
    #[must_use]
    pub fn with_max_docs(mut self, max_docs: usize) -> Self {
        self.max_docs = max_docs.max(1);
        self
    }

    /// Set the maximum buffering delay.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the queue capacity. Zero is raised to one.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }
}

/// Orchestration metadata recovered from a container name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct K8sContainer {
    /// Container name inside the pod.
    pub container: String,
    /// Pod name.
    pub pod: String,
    /// Namespace.
    pub namespace: String,
}

impl K8sContainer {
    /// Parses a kubelet-style container name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let captures = K8S_NAME.captures(name)?;
        Some(Self {
            container: captures[1].to_string(),
            pod: captures[2].to_string(),
            namespace: captures[3].to_string(),
        })
    }
}

/// One queued document and the index it goes to.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItem {
    /// Target index.
    pub index: String,
    /// Document body.
    pub document: Value,
}

/// Builds the indexed document for a record.
///
/// A payload holding a JSON object is indexed as that object, with
/// `@timestamp` added when missing. Anything else is wrapped as
/// `{"message": <payload>, "@timestamp": ...}`. Every document carries
/// `container` and `image`, plus `k8s_container`, `k8s_pod` and
/// `k8s_namespace` when the container name follows the kubelet convention.
#[must_use]
pub fn build_document(record: &LogRecord, now: DateTime<Utc>) -> BulkItem {
    let timestamp = Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true));

    let mut document = match serde_json::from_str::<Value>(&record.data) {
        Ok(Value::Object(mut map)) => {
            map.entry("@timestamp").or_insert(timestamp);
            map
        }
        _ => {
            let mut map = Map::new();
            map.insert("message".to_string(), Value::String(record.data.clone()));
            map.insert("@timestamp".to_string(), timestamp);
            map
        }
    };

    document.insert("container".to_string(), Value::String(record.name.clone()));
    document.insert("image".to_string(), Value::String(record.image.clone()));
    if let Some(k8s) = K8sContainer::parse(&record.name) {
        document.insert("k8s_container".to_string(), Value::String(k8s.container));
        document.insert("k8s_pod".to_string(), Value::String(k8s.pod));
        document.insert("k8s_namespace".to_string(), Value::String(k8s.namespace));
    }

    BulkItem {
        index: format!("logstash-{}", now.format("%Y.%m.%d")),
        document: Value::Object(document),
    }
}

/// Encodes a batch as a `_bulk` NDJSON body.
#[must_use]
pub fn bulk_body(items: &[BulkItem]) -> String {
    let mut body = String::new();
    for item in items {
        let action = serde_json::json!({ "index": { "_index": item.index } });
        body.push_str(&action.to_string());
        body.push('\n');
        body.push_str(&item.document.to_string());
        body.push('\n');
    }
    body
}

/// Forwards records to a background bulk indexer.
#[derive(Debug)]
pub struct ElasticsearchAdapter {
    queue: mpsc::Sender<BulkItem>,
    task: JoinHandle<()>,
}

impl ElasticsearchAdapter {
    /// Starts the bulk indexer for a target such as `es.internal:9200`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidTarget`] if the address is empty or the
    /// HTTP client cannot be built.
    pub fn start(target: &Target, config: BulkConfig) -> RouteResult<Self> {
        let addr = target.addr.trim();
        if addr.is_empty() {
            return Err(RouteError::InvalidTarget(
                "elasticsearch target needs an address".to_string(),
            ));
        }
        let base = if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.trim_end_matches('/').to_string()
        } else {
            format!("http://{addr}")
        };

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RouteError::InvalidTarget(format!("http client: {e}")))?;

        let (queue, rx) = mpsc::channel(config.queue_capacity.max(1));
        let indexer = BulkIndexer {
            client,
            url: format!("{base}/_bulk"),
            config,
        };
        let task = tokio::spawn(indexer.run(rx));
        Ok(Self { queue, task })
    }

    /// Queues one record. Drops it with a warning when the queue is full.
    pub fn forward(&self, record: &LogRecord) {
        match self.queue.try_send(build_document(record, Utc::now())) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(container = %record.name, "bulk queue full, dropping record");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(container = %record.name, "bulk indexer stopped, dropping record");
            }
        }
    }

    /// Stops accepting records and waits for queued ones to be sent.
    pub async fn close(self) {
        drop(self.queue);
        if let Err(e) = self.task.await {
            warn!(error = %e, "bulk indexer task failed");
        }
    }
}

struct BulkIndexer {
    client: reqwest::Client,
    url: String,
    config: BulkConfig,
}

impl BulkIndexer {
    async fn run(self, mut rx: mpsc::Receiver<BulkItem>) {
        let mut batch: Vec<BulkItem> = Vec::with_capacity(self.config.max_docs);
        let mut deadline: Option<Instant> = None;

        loop {
            let next = match deadline {
                Some(at) => tokio::select! {
                    item = rx.recv() => item,
                    () = tokio::time::sleep_until(at) => {
                        self.flush(&mut batch).await;
                        deadline = None;
                        continue;
                    }
                },
                None => rx.recv().await,
            };

            let Some(item) = next else {
                break;
            };
            if batch.is_empty() {
                deadline = Some(Instant::now() + self.config.max_delay);
            }
            batch.push(item);
            if batch.len() >= self.config.max_docs {
                self.flush(&mut batch).await;
                deadline = None;
            }
        }

        self.flush(&mut batch).await;
        debug!(url = %self.url, "bulk indexer stopped");
    }

    async fn flush(&self, batch: &mut Vec<BulkItem>) {
        if batch.is_empty() {
            return;
        }
        let count = batch.len();
        let body = bulk_body(batch);
        batch.clear();

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<Value>().await {
                    Ok(result) if result["errors"].as_bool() == Some(true) => {
                        let failed = result["items"].as_array().map_or(0, |items| {
                            items
                                .iter()
                                .filter(|item| item["index"]["error"].is_object())
                                .count()
                        });
                        warn!(url = %self.url, docs = count, failed, "bulk request had item errors");
                    }
                    Ok(_) => debug!(url = %self.url, docs = count, "bulk request sent"),
                    Err(e) => debug!(url = %self.url, error = %e, "unreadable bulk response"),
                }
            }
            Ok(resp) => {
                warn!(url = %self.url, docs = count, status = %resp.status(), "bulk request rejected");
            }
            Err(e) => {
                warn!(url = %self.url, docs = count, error = %e, "bulk request failed");
            }
        }
    }
}
