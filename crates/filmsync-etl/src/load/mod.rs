//! Elasticsearch loading
//!
//! One `_bulk` request carries every document of a run. Indices are
//! created on first use. The HTTP client lives only for the duration of
//! one load call, so its connections never outlive the run.

mod indices;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{DocumentBatch, EntityKind};
use crate::retry::{retry_with_backoff, RetryError, RetryPolicy};

/// Upper bound on one HTTP request, bulk payload included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Rejected bulk items logged per run before the rest are elided.
const LOGGED_FAILURES: usize = 10;

pub type Result<T> = std::result::Result<T, LoadError>;

#[derive(Debug, Error)]
pub enum LoadError {
    /// The cluster could not be reached within the retry budget
    #[error("elasticsearch unavailable after {attempts} attempts during {operation}: {message}")]
    Unavailable {
        attempts: u32,
        operation: String,
        message: String,
    },

    /// The request itself failed after reaching the cluster
    #[error("elasticsearch request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("bulk payload could not be encoded: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The cluster accepted the request but rejected documents in it
    #[error("bulk indexing rejected {failed} of {total} documents")]
    BulkRejected { failed: usize, total: usize },

    #[error("unexpected status {status} from elasticsearch while {context}")]
    UnexpectedStatus { status: StatusCode, context: String },
}

/// Sink for the documents of one sync run
#[async_trait]
pub trait Load: Send + Sync {
    async fn load(&self, batch: &DocumentBatch) -> Result<()>;
}

/// [`Load`] implementation backed by an Elasticsearch cluster
pub struct EsLoader {
    base_url: String,
    connect_timeout: Duration,
    retry: RetryPolicy,
}

impl EsLoader {
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            connect_timeout,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn send_with_retry(
        &self,
        operation: &str,
        request: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let sent = retry_with_backoff(
            &self.retry,
            operation,
            || async { request().send().await },
            |error| error.is_connect() || error.is_timeout(),
        )
        .await;

        sent.map_err(|error| match error {
            RetryError::Exhausted { attempts, last } => LoadError::Unavailable {
                attempts,
                operation: operation.to_string(),
                message: last.to_string(),
            },
            RetryError::Fatal(last) => LoadError::Http(last),
        })
    }

    /// Create the index for `kind` unless it already exists
    async fn ensure_index(&self, client: &Client, kind: EntityKind) -> Result<()> {
        let url = format!("{}/{}", self.base_url, kind.index_name());

        let head = self
            .send_with_retry("index check", || client.head(&url))
            .await?;
        match head.status() {
            StatusCode::OK => return Ok(()),
            StatusCode::NOT_FOUND => {},
            status => {
                return Err(LoadError::UnexpectedStatus {
                    status,
                    context: format!("checking index {kind}"),
                })
            },
        }

        let body = indices::index_body(kind);
        let created = self
            .send_with_retry("index create", || client.put(&url).json(&body))
            .await?;
        if !created.status().is_success() {
            return Err(LoadError::UnexpectedStatus {
                status: created.status(),
                context: format!("creating index {kind}"),
            });
        }

        info!(index = %kind, "created missing index");
        Ok(())
    }
}

#[async_trait]
impl Load for EsLoader {
    async fn load(&self, batch: &DocumentBatch) -> Result<()> {
        // A client per call: dropping it at the end of the run closes
        // every connection it opened.
        let client = Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        for kind in EntityKind::ALL {
            self.ensure_index(&client, kind).await?;
        }

        if batch.is_empty() {
            debug!("nothing changed, skipping bulk request");
            return Ok(());
        }

        let body = bulk_body(batch)?;
        let url = format!("{}/_bulk", self.base_url);
        let operation = format!(
            "bulk index of {} movies, {} genres, {} persons",
            batch.movies.len(),
            batch.genres.len(),
            batch.persons.len()
        );
        let response = self
            .send_with_retry(&operation, || {
                client
                    .post(&url)
                    .header(header::CONTENT_TYPE, "application/x-ndjson")
                    .body(body.clone())
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::UnexpectedStatus {
                status,
                context: "bulk indexing".to_string(),
            });
        }

        let summary: BulkResponse = response.json().await?;
        if summary.errors {
            for item in summary.rejected().take(LOGGED_FAILURES) {
                warn!(
                    index = item.get("_index").and_then(serde_json::Value::as_str).unwrap_or("?"),
                    id = item.get("_id").and_then(serde_json::Value::as_str).unwrap_or("?"),
                    reason = item
                        .pointer("/error/reason")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or("unknown"),
                    "bulk item rejected"
                );
            }
            return Err(LoadError::BulkRejected {
                failed: summary.rejected().count(),
                total: batch.len(),
            });
        }

        info!(documents = batch.len(), "bulk load finished");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    errors: bool,
    #[serde(default)]
    items: Vec<Value>,
}

impl BulkResponse {
    fn rejected(&self) -> impl Iterator<Item = &Value> {
        self.items
            .iter()
            .filter_map(|item| item.get("index"))
            .filter(|op| op.get("error").is_some())
    }
}

/// Render the batch as the newline-delimited `_bulk` payload. Persons
/// are addressed by `person_id`, movies and genres by `id`.
fn bulk_body(batch: &DocumentBatch) -> std::result::Result<String, serde_json::Error> {
    let mut body = String::new();
    for doc in &batch.movies {
        append_action(&mut body, EntityKind::Movies, &doc.id, doc)?;
    }
    for doc in &batch.genres {
        append_action(&mut body, EntityKind::Genres, &doc.id, doc)?;
    }
    for doc in &batch.persons {
        append_action(&mut body, EntityKind::Persons, &doc.person_id, doc)?;
    }
    Ok(body)
}

fn append_action<T: Serialize>(
    body: &mut String,
    kind: EntityKind,
    id: &Uuid,
    doc: &T,
) -> std::result::Result<(), serde_json::Error> {
    let action = serde_json::json!({
        "index": {"_index": kind.index_name(), "_id": id}
    });
    body.push_str(&serde_json::to_string(&action)?);
    body.push('\n');
    body.push_str(&serde_json::to_string(doc)?);
    body.push('\n');
    Ok(())
}
