//! In-memory search client for tests.
//!
//! [`MockSearchClient`] stores documents in memory, records every call and
//! can be told to fail or panic on a given operation.

use crate::client::{GetOutcome, IndexOutcome, SearchClient, SearchResponse};
use crate::envelope::Document;
use crate::error::{ClientResult, SearchClientError};
use crate::operation::{GetParams, IndexParams, OperationKind, ScrollParams, SearchParams};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

type DocumentKey = (String, String, String);

#[derive(Default)]
struct MockState {
    documents: BTreeMap<DocumentKey, (i64, Document)>,
    calls: Vec<OperationKind>,
    failures: HashMap<OperationKind, String>,
    panics: Vec<OperationKind>,
    search_body: Option<String>,
    last_search: Option<SearchParams>,
    last_scroll: Option<ScrollParams>,
}

/// Mock search client for testing
#[derive(Clone, Default)]
pub struct MockSearchClient {
    state: Arc<Mutex<MockState>>,
}

impl MockSearchClient {
    /// Create an empty mock
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stored document (version 1).
    pub fn with_document(
        self,
        index: &str,
        doc_type: &str,
        id: &str,
        source: Document,
    ) -> Self {
        self.lock().documents.insert(
            (index.to_string(), doc_type.to_string(), id.to_string()),
            (1, source),
        );
        self
    }

    /// Answer every search and scroll with this JSON document.
    pub fn with_search_response(self, response: Value) -> Self {
        self.lock().search_body = Some(response.to_string());
        self
    }

    /// Answer every search and scroll with this raw body, valid JSON or not.
    pub fn with_raw_search_body(self, body: impl Into<String>) -> Self {
        self.lock().search_body = Some(body.into());
        self
    }

    /// Fail every operation with `reason`.
    pub fn fail_with(self, reason: &str) -> Self {
        {
            let mut state = self.lock();
            for kind in [
                OperationKind::Index,
                OperationKind::Get,
                OperationKind::Search,
                OperationKind::Scroll,
            ] {
                state.failures.insert(kind, reason.to_string());
            }
        }
        self
    }

    /// Fail one operation with `reason`.
    pub fn fail_on(self, kind: OperationKind, reason: &str) -> Self {
        self.lock().failures.insert(kind, reason.to_string());
        self
    }

    /// Panic inside one operation.
    pub fn panic_on(self, kind: OperationKind) -> Self {
        self.lock().panics.push(kind);
        self
    }

    /// Get the number of calls
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Get all recorded calls, in order
    pub fn calls(&self) -> Vec<OperationKind> {
        self.lock().calls.clone()
    }

    /// Check if an operation was called
    pub fn was_called(&self, kind: OperationKind) -> bool {
        self.lock().calls.contains(&kind)
    }

    /// Parameters of the most recent search.
    pub fn last_search_params(&self) -> Option<SearchParams> {
        self.lock().last_search.clone()
    }

    /// Parameters of the most recent scroll.
    pub fn last_scroll_params(&self) -> Option<ScrollParams> {
        self.lock().last_scroll.clone()
    }

    /// Number of stored documents.
    pub fn document_count(&self) -> usize {
        self.lock().documents.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the call and apply any configured failure.
    fn enter(&self, kind: OperationKind) -> ClientResult<MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        state.calls.push(kind);

        if state.panics.contains(&kind) {
            drop(state);
            panic!("mock {kind} panicked");
        }
        if let Some(reason) = state.failures.get(&kind) {
            return Err(SearchClientError::Other(reason.clone()));
        }
        Ok(state)
    }
}

#[async_trait]
impl SearchClient for MockSearchClient {
    async fn index(&self, params: IndexParams) -> ClientResult<IndexOutcome> {
        let mut state = self.enter(OperationKind::Index)?;

        let id = params
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        let key = (params.index.clone(), params.doc_type.clone(), id.clone());

        let version = state.documents.get(&key).map_or(1, |(v, _)| v + 1);
        state.documents.insert(key, (version, params.source));

        Ok(IndexOutcome {
            index: params.index,
            doc_type: params.doc_type,
            id,
            version,
        })
    }

    async fn get(&self, params: GetParams) -> ClientResult<GetOutcome> {
        let state = self.enter(OperationKind::Get)?;

        let key = (
            params.index.clone(),
            params.doc_type.clone(),
            params.id.clone(),
        );
        Ok(match state.documents.get(&key) {
            Some((version, source)) => GetOutcome {
                index: params.index,
                doc_type: params.doc_type,
                id: params.id,
                version: *version,
                source: Some(source.clone()),
            },
            None => GetOutcome::missing(params.index, params.doc_type, params.id),
        })
    }

    async fn search(&self, params: SearchParams) -> ClientResult<SearchResponse> {
        let mut state = self.enter(OperationKind::Search)?;
        state.last_search = Some(params.clone());

        if let Some(body) = &state.search_body {
            return Ok(SearchResponse::new(body.clone()));
        }

        let hits: Vec<Value> = state
            .documents
            .iter()
            .filter(|((index, doc_type, _), _)| {
                (params.indices.is_empty() || params.indices.contains(index))
                    && (params.types.is_empty() || params.types.contains(doc_type))
            })
            .map(|((index, doc_type, id), (version, source))| {
                json!({
                    "_index": index,
                    "_type": doc_type,
                    "_id": id,
                    "_version": version,
                    "_score": 1.0,
                    "_source": source,
                })
            })
            .collect();

        let mut response = json!({
            "took": 1,
            "timed_out": false,
            "_shards": { "total": 1, "successful": 1, "failed": 0 },
            "hits": { "total": hits.len(), "max_score": 1.0, "hits": hits },
        });
        if params.scroll.is_some() {
            response["_scroll_id"] = json!(Uuid::new_v4().simple().to_string());
        }

        Ok(SearchResponse::from_value(&response))
    }

    async fn scroll(&self, params: ScrollParams) -> ClientResult<SearchResponse> {
        let mut state = self.enter(OperationKind::Scroll)?;
        state.last_scroll = Some(params.clone());

        if let Some(body) = &state.search_body {
            return Ok(SearchResponse::new(body.clone()));
        }

        Ok(SearchResponse::from_value(&json!({
            "_scroll_id": params.scroll_id,
            "took": 1,
            "timed_out": false,
            "hits": { "total": 0, "max_score": null, "hits": [] },
        })))
    }
}

impl std::fmt::Debug for MockSearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSearchClient")
            .field("calls", &self.call_count())
            .field("documents", &self.document_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn index_params(id: Option<&str>) -> IndexParams {
        IndexParams {
            index: "a".to_string(),
            doc_type: "b".to_string(),
            id: id.map(str::to_string),
            source: doc(json!({ "title": "hello" })),
        }
    }

    #[tokio::test]
    async fn test_index_generates_id_and_versions() {
        let client = MockSearchClient::new();

        let first = client.index(index_params(None)).await.unwrap();
        assert!(!first.id.is_empty());
        assert_eq!(first.version, 1);

        let again = client.index(index_params(Some(&first.id))).await.unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.version, 2);

        let empty = client.index(index_params(Some(""))).await.unwrap();
        assert_ne!(empty.id, "");
        assert_eq!(client.document_count(), 2);
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_get_missing_and_found() {
        let client = MockSearchClient::new().with_document("a", "b", "1", Document::new());

        let found = client
            .get(GetParams {
                index: "a".to_string(),
                doc_type: "b".to_string(),
                id: "1".to_string(),
            })
            .await
            .unwrap();
        assert!(found.found());

        let missing = client
            .get(GetParams {
                index: "a".to_string(),
                doc_type: "b".to_string(),
                id: "2".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(missing, GetOutcome::missing("a", "b", "2"));
    }

    #[tokio::test]
    async fn test_search_filters_by_index() {
        let client = MockSearchClient::new()
            .with_document("a", "b", "1", Document::new())
            .with_document("c", "b", "2", Document::new());

        let response = client
            .search(SearchParams {
                indices: vec!["a".to_string()],
                scroll: Some("1m".to_string()),
                ..SearchParams::default()
            })
            .await
            .unwrap();

        let body: Value = serde_json::from_str(response.body()).unwrap();
        assert_eq!(body["hits"]["total"], json!(1));
        assert_eq!(body["hits"]["hits"][0]["_id"], json!("1"));
        assert!(body["_scroll_id"].is_string());
    }

    #[tokio::test]
    async fn test_failures_are_per_operation() {
        let client = MockSearchClient::new().fail_on(OperationKind::Scroll, "expired");

        let err = client
            .scroll(ScrollParams {
                scroll_id: "abc".to_string(),
                scroll: "1m".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "expired");
        assert!(client.was_called(OperationKind::Scroll));

        assert!(client.search(SearchParams::default()).await.is_ok());
        assert_eq!(
            client.calls(),
            vec![OperationKind::Scroll, OperationKind::Search]
        );
    }
}
