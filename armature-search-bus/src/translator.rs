//! Request translation: bus envelope in, validated [`Operation`] out.
//!
//! Each action has its own parse function. A parse function either returns a
//! complete operation or the first validation error it meets; nothing is
//! partially built.

use crate::envelope::{self, Document};
use crate::error::GatewayError;
use crate::operation::{
    GetParams, IndexParams, Operation, OperationKind, ScrollParams, SearchParams,
};
use serde_json::Value;

/// Translate a request body into an operation.
pub fn translate(body: &Document) -> Result<Operation, GatewayError> {
    let action = optional_str(body, envelope::ACTION)?.ok_or(GatewayError::MissingAction)?;

    match OperationKind::from_action(action) {
        Some(OperationKind::Index) => parse_index(body).map(Operation::Index),
        Some(OperationKind::Get) => parse_get(body).map(Operation::Get),
        Some(OperationKind::Search) => parse_search(body).map(Operation::Search),
        Some(OperationKind::Scroll) => parse_scroll(body).map(Operation::Scroll),
        None => Err(GatewayError::UnrecognizedAction(action.to_string())),
    }
}

/// Parse an `index` request.
pub fn parse_index(body: &Document) -> Result<IndexParams, GatewayError> {
    let index = required_non_empty(body, envelope::INDEX)?;
    let doc_type = required_non_empty(body, envelope::TYPE)?;
    let source = optional_object(body, envelope::SOURCE)?
        .ok_or(GatewayError::MissingField(envelope::SOURCE))?;
    let id = optional_str(body, envelope::ID)?;

    Ok(IndexParams {
        index: index.to_string(),
        doc_type: doc_type.to_string(),
        id: id.map(str::to_string),
        source: source.clone(),
    })
}

/// Parse a `get` request.
///
/// Unlike `_index` and `_type`, an empty `_id` is accepted.
pub fn parse_get(body: &Document) -> Result<GetParams, GatewayError> {
    let index = required_non_empty(body, envelope::INDEX)?;
    let doc_type = required_non_empty(body, envelope::TYPE)?;
    let id = required_str(body, envelope::ID)?;

    Ok(GetParams {
        index: index.to_string(),
        doc_type: doc_type.to_string(),
        id: id.to_string(),
    })
}

/// Parse a `search` request.
pub fn parse_search(body: &Document) -> Result<SearchParams, GatewayError> {
    let indices = union(
        optional_str(body, envelope::INDEX)?,
        string_list(body, envelope::INDICES)?,
    );
    let types = union(
        optional_str(body, envelope::TYPE)?,
        string_list(body, envelope::TYPES)?,
    );

    Ok(SearchParams {
        indices,
        types,
        query: optional_object(body, envelope::QUERY)?.cloned(),
        filter: optional_object(body, envelope::FILTER)?.cloned(),
        facets: optional_object(body, envelope::FACETS)?.cloned(),
        search_type: optional_str(body, envelope::SEARCH_TYPE)?.map(str::to_string),
        scroll: optional_str(body, envelope::SCROLL)?.map(str::to_string),
    })
}

/// Parse a `scroll` request.
pub fn parse_scroll(body: &Document) -> Result<ScrollParams, GatewayError> {
    let scroll_id = required_str(body, envelope::SCROLL_ID)?;
    let scroll = required_str(body, envelope::SCROLL)?;

    Ok(ScrollParams {
        scroll_id: scroll_id.to_string(),
        scroll: scroll.to_string(),
    })
}

// ============================================================================
// Field extraction
// ============================================================================

/// A string field; absent and `null` both read as `None`.
fn optional_str<'a>(
    body: &'a Document,
    field: &'static str,
) -> Result<Option<&'a str>, GatewayError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.as_str())),
        Some(_) => Err(wrong_type(field, "a string")),
    }
}

fn required_str<'a>(body: &'a Document, field: &'static str) -> Result<&'a str, GatewayError> {
    optional_str(body, field)?.ok_or(GatewayError::MissingField(field))
}

fn required_non_empty<'a>(
    body: &'a Document,
    field: &'static str,
) -> Result<&'a str, GatewayError> {
    match optional_str(body, field)? {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(GatewayError::MissingField(field)),
    }
}

fn optional_object<'a>(
    body: &'a Document,
    field: &'static str,
) -> Result<Option<&'a Document>, GatewayError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(wrong_type(field, "an object")),
    }
}

fn string_list(body: &Document, field: &'static str) -> Result<Vec<String>, GatewayError> {
    let invalid = || wrong_type(field, "an array of strings");

    match body.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(invalid),
        Some(_) => Err(invalid()),
    }
}

/// A field of the wrong JSON type is not a validation failure: the requester
/// gets the generic unexpected-failure reply and the type detail is logged.
fn wrong_type(field: &str, expected: &str) -> GatewayError {
    GatewayError::Unexpected(format!("{field} must be {expected}"))
}

/// Singular value first, then the plural list in order. Duplicates are kept.
fn union(single: Option<&str>, plural: Vec<String>) -> Vec<String> {
    let mut merged = Vec::with_capacity(plural.len() + 1);
    if let Some(single) = single {
        merged.push(single.to_string());
    }
    merged.extend(plural);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn message(value: Value) -> String {
        translate(&doc(value)).unwrap_err().to_string()
    }

    fn wrong_type_detail(value: Value) -> String {
        let err = translate(&doc(value)).unwrap_err();
        assert_eq!(err.to_string(), "Unhandled exception!");
        err.detail().expect("type detail is kept for logging").to_string()
    }

    #[test]
    fn test_missing_action() {
        assert_eq!(message(json!({})), "action must be specified");
        assert_eq!(message(json!({ "action": null })), "action must be specified");
    }

    #[test]
    fn test_unrecognized_action() {
        assert_eq!(message(json!({ "action": "bogus" })), "Unrecognized action bogus");
        assert_eq!(message(json!({ "action": "" })), "Unrecognized action ");
    }

    #[test]
    fn test_action_of_wrong_type_is_unexpected() {
        assert_eq!(
            wrong_type_detail(json!({ "action": 7 })),
            "action must be a string"
        );
    }

    #[test]
    fn test_index_full() {
        let op = translate(&doc(json!({
            "action": "index",
            "_index": "a",
            "_type": "b",
            "_id": "1",
            "_source": { "x": 1 }
        })))
        .unwrap();

        assert_eq!(
            op,
            Operation::Index(IndexParams {
                index: "a".to_string(),
                doc_type: "b".to_string(),
                id: Some("1".to_string()),
                source: doc(json!({ "x": 1 })),
            })
        );
    }

    #[test]
    fn test_index_id_passthrough() {
        let params = parse_index(&doc(json!({
            "_index": "a", "_type": "b", "_source": {}
        })))
        .unwrap();
        assert_eq!(params.id, None);
        assert!(params.source.is_empty());

        let params = parse_index(&doc(json!({
            "_index": "a", "_type": "b", "_id": "", "_source": {}
        })))
        .unwrap();
        assert_eq!(params.id.as_deref(), Some(""));
    }

    #[test]
    fn test_index_required_fields() {
        assert_eq!(
            message(json!({ "action": "index", "_type": "b", "_source": {} })),
            "_index is required"
        );
        assert_eq!(
            message(json!({ "action": "index", "_index": "", "_type": "b", "_source": {} })),
            "_index is required"
        );
        assert_eq!(
            message(json!({ "action": "index", "_index": "a", "_type": "", "_source": {} })),
            "_type is required"
        );
        assert_eq!(
            message(json!({ "action": "index", "_index": "a", "_type": "b" })),
            "_source is required"
        );
        assert_eq!(
            message(json!({ "action": "index", "_index": "a", "_type": "b", "_source": null })),
            "_source is required"
        );
        assert_eq!(
            wrong_type_detail(
                json!({ "action": "index", "_index": "a", "_type": "b", "_source": "x" })
            ),
            "_source must be an object"
        );
    }

    #[test]
    fn test_get_accepts_empty_id() {
        let params = parse_get(&doc(json!({ "_index": "a", "_type": "b", "_id": "" }))).unwrap();
        assert_eq!(params.id, "");
    }

    #[test]
    fn test_get_required_fields() {
        assert_eq!(
            message(json!({ "action": "get", "_type": "b", "_id": "1" })),
            "_index is required"
        );
        assert_eq!(
            message(json!({ "action": "get", "_index": "a", "_id": "1" })),
            "_type is required"
        );
        assert_eq!(
            message(json!({ "action": "get", "_index": "a", "_type": "b" })),
            "_id is required"
        );
        assert_eq!(
            wrong_type_detail(json!({ "action": "get", "_index": "a", "_type": "b", "_id": 1 })),
            "_id must be a string"
        );
        assert_eq!(
            wrong_type_detail(json!({ "action": "get", "_index": 5, "_type": "b", "_id": "1" })),
            "_index must be a string"
        );
    }

    #[test]
    fn test_search_union_order() {
        let params = parse_search(&doc(json!({
            "_index": "a",
            "_indices": ["b", "a", "c"],
            "_type": "t1",
            "_types": ["t2"]
        })))
        .unwrap();

        assert_eq!(params.indices, vec!["a", "b", "a", "c"]);
        assert_eq!(params.types, vec!["t1", "t2"]);
    }

    #[test]
    fn test_search_empty_is_allowed() {
        let params = parse_search(&doc(json!({}))).unwrap();
        assert_eq!(params, SearchParams::default());
    }

    #[test]
    fn test_search_optional_passthrough() {
        let params = parse_search(&doc(json!({
            "_indices": ["logs"],
            "query": { "match_all": {} },
            "filter": { "term": { "level": "warn" } },
            "facets": { "levels": { "terms": { "field": "level" } } },
            "search_type": "dfs_query_then_fetch",
            "scroll": "5m"
        })))
        .unwrap();

        assert_eq!(params.indices, vec!["logs"]);
        assert!(params.types.is_empty());
        assert_eq!(params.query, Some(doc(json!({ "match_all": {} }))));
        assert_eq!(params.filter, Some(doc(json!({ "term": { "level": "warn" } }))));
        assert!(params.facets.is_some());
        assert_eq!(params.search_type.as_deref(), Some("dfs_query_then_fetch"));
        assert_eq!(params.scroll.as_deref(), Some("5m"));
    }

    #[test]
    fn test_search_rejects_mixed_indices() {
        assert_eq!(
            wrong_type_detail(json!({ "action": "search", "_indices": ["a", 1] })),
            "_indices must be an array of strings"
        );
        assert_eq!(
            wrong_type_detail(json!({ "action": "search", "query": "match_all" })),
            "query must be an object"
        );
    }

    #[test]
    fn test_scroll_required_fields() {
        assert_eq!(
            message(json!({ "action": "scroll", "_scroll_id": "abc" })),
            "scroll is required"
        );
        assert_eq!(
            message(json!({ "action": "scroll", "scroll": "1m" })),
            "_scroll_id is required"
        );

        let params = parse_scroll(&doc(json!({ "_scroll_id": "abc", "scroll": "1m" }))).unwrap();
        assert_eq!(params.scroll_id, "abc");
        assert_eq!(params.scroll, "1m");
    }
}
