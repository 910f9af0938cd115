//! OpenSearch implementation of [`SearchClient`].

use crate::client::{GetOutcome, IndexOutcome, SearchClient, SearchResponse};
use crate::envelope::{self, Document};
use crate::error::{ClientResult, SearchClientError};
use crate::operation::{GetParams, IndexParams, ScrollParams, SearchParams};
use async_trait::async_trait;
use opensearch::{
    OpenSearch,
    http::StatusCode,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    params::SearchType,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// OpenSearch client configuration.
#[derive(Debug, Clone)]
pub struct OpenSearchConfig {
    /// Node URLs; the client talks to the first one.
    pub urls: Vec<String>,
    /// Basic auth username.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// Request timeout.
    pub request_timeout: Duration,
    /// Cluster the nodes are expected to belong to.
    pub cluster_name: String,
    /// Whether node discovery was requested.
    pub sniff: bool,
}

impl OpenSearchConfig {
    /// Create a new configuration with a single URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            password: None,
            request_timeout: Duration::from_secs(30),
            cluster_name: "elasticsearch".to_string(),
            sniff: true,
        }
    }

    /// Create configuration with multiple URLs for a cluster.
    pub fn cluster(urls: Vec<String>) -> Self {
        Self {
            urls,
            ..Self::new("")
        }
    }

    /// Set basic authentication credentials.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the expected cluster name.
    pub fn with_cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = name.into();
        self
    }

    /// Enable or disable node discovery.
    pub fn with_sniff(mut self, sniff: bool) -> Self {
        self.sniff = sniff;
        self
    }
}

/// [`SearchClient`] backed by the `opensearch` crate.
///
/// OpenSearch has no mapping types: `_type` is accepted on every request
/// and echoed back in replies, but it does not reach the engine.
#[derive(Clone)]
pub struct OpenSearchClient {
    client: Arc<OpenSearch>,
    config: Arc<OpenSearchConfig>,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client.
    pub fn new(config: OpenSearchConfig) -> ClientResult<Self> {
        info!(
            urls = ?config.urls,
            cluster = %config.cluster_name,
            "Initializing OpenSearch client"
        );

        let url = config
            .urls
            .first()
            .ok_or_else(|| SearchClientError::Connection("No URLs provided".to_string()))?;

        let url = opensearch::http::Url::parse(url)
            .map_err(|e| SearchClientError::Connection(format!("Invalid URL {url}: {e}")))?;

        if config.urls.len() > 1 {
            debug!(
                ignored = config.urls.len() - 1,
                "Using the first node only"
            );
        }
        if config.sniff {
            debug!("Node sniffing requested; using a single-node pool");
        }

        let conn_pool = SingleNodeConnectionPool::new(url);
        let mut builder = TransportBuilder::new(conn_pool)
            .timeout(config.request_timeout)
            .disable_proxy();

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.auth(opensearch::auth::Credentials::Basic(
                user.clone(),
                pass.clone(),
            ));
        }

        let transport = builder
            .build()
            .map_err(|e| SearchClientError::Connection(e.to_string()))?;

        debug!("OpenSearch client initialized");

        Ok(Self {
            client: Arc::new(OpenSearch::new(transport)),
            config: Arc::new(config),
        })
    }

    /// Get the underlying OpenSearch client.
    pub fn inner(&self) -> &OpenSearch {
        &self.client
    }

    /// Get the configuration.
    pub fn config(&self) -> &OpenSearchConfig {
        &self.config
    }
}

#[async_trait]
impl SearchClient for OpenSearchClient {
    async fn index(&self, params: IndexParams) -> ClientResult<IndexOutcome> {
        let id = params.id.as_deref().filter(|id| !id.is_empty());
        debug!(index = %params.index, id = ?id, "Indexing document");

        let parts = match id {
            Some(id) => opensearch::IndexParts::IndexId(&params.index, id),
            None => opensearch::IndexParts::Index(&params.index),
        };

        let response = self
            .client
            .index(parts)
            .body(Value::Object(params.source))
            .send()
            .await?;
        let body = read_body(response).await?;
        index_outcome(&body, params.index, params.doc_type)
    }

    async fn get(&self, params: GetParams) -> ClientResult<GetOutcome> {
        debug!(index = %params.index, id = %params.id, "Getting document");

        let response = self
            .client
            .get(opensearch::GetParts::IndexId(&params.index, &params.id))
            .send()
            .await?;

        let status = response.status_code();
        let body: Value = response.json().await?;

        if !status.is_success() && !is_missing_document(status, &body) {
            return Err(engine_error(status, &body));
        }

        get_outcome(&body, params)
    }

    async fn search(&self, params: SearchParams) -> ClientResult<SearchResponse> {
        debug!(indices = ?params.indices, "Searching");

        if !params.types.is_empty() {
            debug!(types = ?params.types, "Ignoring mapping types");
        }

        let search_type = params.search_type.as_deref().map(parse_search_type).transpose()?;
        let body = search_body(&params);

        let index_refs: Vec<&str> = params.indices.iter().map(String::as_str).collect();
        let parts = if index_refs.is_empty() {
            opensearch::SearchParts::None
        } else {
            opensearch::SearchParts::Index(&index_refs)
        };

        let mut request = self.client.search(parts).body(body);
        if let Some(search_type) = search_type {
            request = request.search_type(search_type);
        }
        if let Some(scroll) = params.scroll.as_deref() {
            request = request.scroll(scroll);
        }

        let response = request.send().await?;
        read_text(response).await.map(SearchResponse::new)
    }

    async fn scroll(&self, params: ScrollParams) -> ClientResult<SearchResponse> {
        debug!(scroll = %params.scroll, "Continuing scroll");

        let response = self
            .client
            .scroll(opensearch::ScrollParts::None)
            .body(json!({
                "scroll": params.scroll,
                "scroll_id": params.scroll_id,
            }))
            .send()
            .await?;

        read_text(response).await.map(SearchResponse::new)
    }
}

impl std::fmt::Debug for OpenSearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenSearchClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Read a JSON body, turning non-success statuses into engine errors.
async fn read_body(response: Response) -> ClientResult<Value> {
    let status = response.status_code();
    let body: Value = response.json().await?;

    if !status.is_success() {
        return Err(engine_error(status, &body));
    }
    Ok(body)
}

/// Read a raw body, turning non-success statuses into engine errors.
async fn read_text(response: Response) -> ClientResult<String> {
    let status = response.status_code();
    let text = response.text().await?;

    if !status.is_success() {
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        return Err(engine_error(status, &body));
    }
    Ok(text)
}

fn engine_error(status: StatusCode, body: &Value) -> SearchClientError {
    let reason = error_reason(body);
    warn!(status = status.as_u16(), reason = %reason, "OpenSearch request failed");
    SearchClientError::Engine {
        status: status.as_u16(),
        reason,
    }
}

/// A 404 for an existing index with an absent id, as opposed to a missing index.
fn is_missing_document(status: StatusCode, body: &Value) -> bool {
    status == StatusCode::NOT_FOUND && body.get("found").is_some() && body.get("error").is_none()
}

/// Best human-readable reason in an error body.
fn error_reason(body: &Value) -> String {
    match body.get("error") {
        Some(Value::Object(error)) => error
            .get("reason")
            .and_then(Value::as_str)
            .or_else(|| error.get("type").and_then(Value::as_str))
            .unwrap_or("Unknown error")
            .to_string(),
        Some(Value::String(reason)) => reason.clone(),
        _ => match body {
            Value::String(text) if !text.is_empty() => text.clone(),
            Value::Null => "Unknown error".to_string(),
            other => other.to_string(),
        },
    }
}

fn parse_search_type(value: &str) -> ClientResult<SearchType> {
    match value {
        "query_then_fetch" => Ok(SearchType::QueryThenFetch),
        "dfs_query_then_fetch" => Ok(SearchType::DfsQueryThenFetch),
        other => Err(SearchClientError::Unsupported(format!(
            "search_type {other}"
        ))),
    }
}

/// Request body for a search. `filter` applies to hits only and `facets`
/// become aggregations.
fn search_body(params: &SearchParams) -> Value {
    let mut body = Document::new();
    if let Some(query) = &params.query {
        body.insert("query".to_string(), Value::Object(query.clone()));
    }
    if let Some(filter) = &params.filter {
        body.insert("post_filter".to_string(), Value::Object(filter.clone()));
    }
    if let Some(facets) = &params.facets {
        body.insert("aggs".to_string(), Value::Object(facets.clone()));
    }
    Value::Object(body)
}

/// Read an index response. The engine always reports the id and version it
/// wrote; a body without them is malformed.
fn index_outcome(body: &Value, index: String, doc_type: String) -> ClientResult<IndexOutcome> {
    Ok(IndexOutcome {
        index: string_field(body, envelope::INDEX).unwrap_or(index),
        doc_type: string_field(body, envelope::TYPE).unwrap_or(doc_type),
        id: string_field(body, envelope::ID).ok_or_else(|| malformed("missing _id"))?,
        version: body[envelope::VERSION]
            .as_i64()
            .ok_or_else(|| malformed("missing _version"))?,
    })
}

/// Read a get response. `_source` is reported as-is: absent when the engine
/// did not return it, even for a found document.
fn get_outcome(body: &Value, params: GetParams) -> ClientResult<GetOutcome> {
    if !body["found"].as_bool().unwrap_or(false) {
        return Ok(GetOutcome::missing(params.index, params.doc_type, params.id));
    }

    Ok(GetOutcome {
        index: string_field(body, envelope::INDEX).unwrap_or(params.index),
        doc_type: string_field(body, envelope::TYPE).unwrap_or(params.doc_type),
        id: string_field(body, envelope::ID).unwrap_or(params.id),
        version: body[envelope::VERSION]
            .as_i64()
            .ok_or_else(|| malformed("missing _version"))?,
        source: body
            .get(envelope::SOURCE)
            .and_then(Value::as_object)
            .cloned(),
    })
}

fn malformed(detail: &str) -> SearchClientError {
    SearchClientError::MalformedResponse(detail.to_string())
}

fn string_field(body: &Value, field: &str) -> Option<String> {
    body.get(field).and_then(Value::as_str).map(str::to_string)
}
