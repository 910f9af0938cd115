//! Response shaping: client outcomes in, reply documents out.

use crate::client::{GetOutcome, IndexOutcome, SearchResponse};
use crate::envelope::{self, Document};
use crate::error::GatewayError;
use serde_json::Value;

/// The single reply produced for a request.
#[derive(Debug)]
pub enum Reply {
    /// Success body, without the `status` marker.
    Ok(Document),
    /// Failure; its message is what the requester sees.
    Error(GatewayError),
}

impl Reply {
    /// Whether this is a success reply.
    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Ok(_))
    }

    /// Render the reply as a bus envelope.
    pub fn into_envelope(self) -> Document {
        match self {
            Reply::Ok(body) => envelope::ok(body),
            Reply::Error(err) => envelope::error(err.to_string()),
        }
    }
}

impl From<Result<Document, GatewayError>> for Reply {
    fn from(result: Result<Document, GatewayError>) -> Self {
        match result {
            Ok(body) => Reply::Ok(body),
            Err(err) => Reply::Error(err),
        }
    }
}

/// Reply body for a stored document.
pub fn shape_index(outcome: IndexOutcome) -> Document {
    let mut body = Document::new();
    body.insert(envelope::INDEX.to_string(), Value::String(outcome.index));
    body.insert(envelope::TYPE.to_string(), Value::String(outcome.doc_type));
    body.insert(envelope::ID.to_string(), Value::String(outcome.id));
    body.insert(envelope::VERSION.to_string(), Value::from(outcome.version));
    body
}

/// Reply body for a fetched document; `_source` is null when it does not exist.
pub fn shape_get(outcome: GetOutcome) -> Document {
    let mut body = Document::new();
    body.insert(envelope::INDEX.to_string(), Value::String(outcome.index));
    body.insert(envelope::TYPE.to_string(), Value::String(outcome.doc_type));
    body.insert(envelope::ID.to_string(), Value::String(outcome.id));
    body.insert(envelope::VERSION.to_string(), Value::from(outcome.version));
    body.insert(
        envelope::SOURCE.to_string(),
        outcome.source.map(Value::Object).unwrap_or(Value::Null),
    );
    body
}

/// Reply body for a search or scroll page: the whole engine response.
pub fn shape_search(response: &SearchResponse) -> Result<Document, GatewayError> {
    serde_json::from_str(response.body()).map_err(GatewayError::Shaping)
}
