//! Bus envelope fields and the success/error reply conventions.

use serde_json::{Map, Value};

/// A generic JSON object exchanged over the bus.
pub type Document = Map<String, Value>;

/// Request field carrying the operation name.
pub const ACTION: &str = "action";
/// Document id.
pub const ID: &str = "_id";
/// Single index.
pub const INDEX: &str = "_index";
/// Additional indices for a search.
pub const INDICES: &str = "_indices";
/// Single document type.
pub const TYPE: &str = "_type";
/// Additional types for a search.
pub const TYPES: &str = "_types";
/// Document version.
pub const VERSION: &str = "_version";
/// Document body.
pub const SOURCE: &str = "_source";
/// Query DSL.
pub const QUERY: &str = "query";
/// Hit filter.
pub const FILTER: &str = "filter";
/// Facet definitions.
pub const FACETS: &str = "facets";
/// Search type.
pub const SEARCH_TYPE: &str = "search_type";
/// Scroll keep-alive.
pub const SCROLL: &str = "scroll";
/// Scroll cursor.
pub const SCROLL_ID: &str = "_scroll_id";

/// Reply field carrying the outcome.
pub const STATUS: &str = "status";
/// Reply field carrying the error message.
pub const MESSAGE: &str = "message";
/// `status` value of a successful reply.
pub const STATUS_OK: &str = "ok";
/// `status` value of a failed reply.
pub const STATUS_ERROR: &str = "error";

/// Mark a reply body as successful.
///
/// A `status` already present in the body (e.g. reported by the engine) is
/// left untouched.
pub fn ok(mut body: Document) -> Document {
    body.entry(STATUS)
        .or_insert_with(|| Value::String(STATUS_OK.to_string()));
    body
}

/// Build an error reply.
pub fn error(message: impl Into<String>) -> Document {
    let mut body = Document::new();
    body.insert(STATUS.to_string(), Value::String(STATUS_ERROR.to_string()));
    body.insert(MESSAGE.to_string(), Value::String(message.into()));
    body
}

/// Check whether a reply reports success.
pub fn is_ok(body: &Document) -> bool {
    body.get(STATUS).and_then(Value::as_str) == Some(STATUS_OK)
}

/// Error message of a failed reply, if any.
pub fn error_message(body: &Document) -> Option<&str> {
    if body.get(STATUS).and_then(Value::as_str) != Some(STATUS_ERROR) {
        return None;
    }
    body.get(MESSAGE).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_marks_status() {
        let body = ok(Document::new());
        assert!(is_ok(&body));
        assert_eq!(error_message(&body), None);
    }

    #[test]
    fn test_ok_keeps_existing_status() {
        let mut body = Document::new();
        body.insert("status".to_string(), json!(200));

        let body = ok(body);
        assert_eq!(body["status"], json!(200));
    }

    #[test]
    fn test_error_envelope() {
        let body = error("_id is required");
        assert_eq!(
            Value::Object(body.clone()),
            json!({ "status": "error", "message": "_id is required" })
        );
        assert!(!is_ok(&body));
        assert_eq!(error_message(&body), Some("_id is required"));
    }
}
