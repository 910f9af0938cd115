//! The search engine seam.
//!
//! The gateway only needs four calls from the engine. Anything that can run
//! them (the OpenSearch adapter, the in-memory mock, a custom client)
//! implements [`SearchClient`].

use crate::envelope::Document;
use crate::error::ClientResult;
use crate::operation::{GetParams, IndexParams, ScrollParams, SearchParams};
use async_trait::async_trait;
use serde_json::Value;

/// Result of storing a document.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexOutcome {
    /// Index the document was stored in.
    pub index: String,
    /// Document type.
    pub doc_type: String,
    /// Stored document id (engine-generated when none was given).
    pub id: String,
    /// Version of the stored document.
    pub version: i64,
}

/// Result of fetching a document.
#[derive(Debug, Clone, PartialEq)]
pub struct GetOutcome {
    /// Index that was read.
    pub index: String,
    /// Document type.
    pub doc_type: String,
    /// Requested id.
    pub id: String,
    /// Document version, `-1` when the document does not exist.
    pub version: i64,
    /// Document body, `None` when the document does not exist or the engine
    /// returned no `_source` for it.
    pub source: Option<Document>,
}

impl GetOutcome {
    /// Outcome for a document that does not exist.
    pub fn missing(
        index: impl Into<String>,
        doc_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            index: index.into(),
            doc_type: doc_type.into(),
            id: id.into(),
            version: -1,
            source: None,
        }
    }

    /// Whether the document exists.
    pub fn found(&self) -> bool {
        self.version >= 0
    }
}

/// Raw body of a search or scroll response, exactly as the engine sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    body: String,
}

impl SearchResponse {
    /// Wrap a raw response body.
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// Serialize a JSON value as the response body.
    pub fn from_value(value: &Value) -> Self {
        Self::new(value.to_string())
    }

    /// The raw body.
    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Client for the downstream search engine.
///
/// Each call resolves once the engine has answered. Retries, timeouts and
/// node selection are the implementation's business.
#[async_trait]
pub trait SearchClient: Send + Sync + 'static {
    /// Store a document.
    async fn index(&self, params: IndexParams) -> ClientResult<IndexOutcome>;

    /// Fetch a document by id. A missing document is not an error.
    async fn get(&self, params: GetParams) -> ClientResult<GetOutcome>;

    /// Run a search.
    async fn search(&self, params: SearchParams) -> ClientResult<SearchResponse>;

    /// Fetch the next page of a scrolled search.
    async fn scroll(&self, params: ScrollParams) -> ClientResult<SearchResponse>;
}
