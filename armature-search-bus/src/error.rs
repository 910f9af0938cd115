//! Error types for the search bus gateway.

use crate::operation::OperationKind;
use thiserror::Error;

/// Errors that end a request with an error reply.
///
/// The `Display` output of each variant is the exact `message` sent back to
/// the requester.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The request has no `action` field.
    #[error("action must be specified")]
    MissingAction,

    /// The `action` field names no known operation.
    #[error("Unrecognized action {0}")]
    UnrecognizedAction(String),

    /// A required field is absent, null, or empty where emptiness is rejected.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// The search client reported a failure for a submitted operation.
    #[error("{kind} error: {source}")]
    Downstream {
        /// Operation that failed.
        kind: OperationKind,
        /// Failure reported by the client.
        source: SearchClientError,
    },

    /// A successful search/scroll response could not be read as a document.
    #[error("Error reading search response: {0}")]
    Shaping(#[source] serde_json::Error),

    /// Anything else: a panic while handling the request or a field of the
    /// wrong JSON type. The detail is logged, never sent.
    #[error("Unhandled exception!")]
    Unexpected(String),
}

impl GatewayError {
    /// Wrap a client failure for the given operation.
    pub fn downstream(kind: OperationKind, source: SearchClientError) -> Self {
        GatewayError::Downstream { kind, source }
    }

    /// Check if this error was raised before anything was dispatched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            GatewayError::MissingAction
                | GatewayError::UnrecognizedAction(_)
                | GatewayError::MissingField(_)
        )
    }

    /// Diagnostic detail that does not appear in the reply message.
    pub fn detail(&self) -> Option<&str> {
        match self {
            GatewayError::Unexpected(detail) => Some(detail),
            _ => None,
        }
    }
}

/// Errors reported by a [`SearchClient`](crate::SearchClient).
#[derive(Error, Debug)]
pub enum SearchClientError {
    /// Could not reach or configure the cluster.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The engine answered with a non-success status.
    #[error("{reason}")]
    Engine {
        /// HTTP status code.
        status: u16,
        /// Reason extracted from the error body.
        reason: String,
    },

    /// A request parameter has no equivalent in this client.
    #[error("Unsupported parameter: {0}")]
    Unsupported(String),

    /// The engine response was not in the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Client error from the opensearch crate.
    #[error("Client error: {0}")]
    Client(#[from] opensearch::Error),

    /// Other errors.
    #[error("{0}")]
    Other(String),
}

/// Result type alias for search client operations.
pub type ClientResult<T> = std::result::Result<T, SearchClientError>;

/// Errors raised by a bus transport.
#[derive(Error, Debug)]
pub enum BusError {
    /// Nothing is registered on the address.
    #[error("No handler registered for address: {0}")]
    NoHandler(String),

    /// A handler is already registered on the address.
    #[error("Handler already registered for address: {0}")]
    AlreadyRegistered(String),

    /// The message carries no reply address.
    #[error("Message {0} has no reply address")]
    NoReplyAddress(String),

    /// The reply target is gone (already answered or the requester left).
    #[error("Reply target no longer available: {0}")]
    ReplyDropped(String),

    /// No reply arrived in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Failed to connect to the transport.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Failed to publish a message.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// Failed to subscribe to an address.
    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    /// Failed to serialize a message body.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Failed to deserialize a message body.
    #[error("Deserialization failed: {0}")]
    Deserialization(String),
}

impl BusError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BusError::Connection(_) | BusError::Timeout(_) | BusError::Publish(_)
        )
    }
}

/// Result type alias for bus operations.
pub type BusResult<T> = std::result::Result<T, BusError>;

#[cfg(feature = "nats")]
impl From<async_nats::ConnectError> for BusError {
    fn from(err: async_nats::ConnectError) -> Self {
        BusError::Connection(err.to_string())
    }
}

#[cfg(feature = "nats")]
impl From<async_nats::PublishError> for BusError {
    fn from(err: async_nats::PublishError) -> Self {
        BusError::Publish(err.to_string())
    }
}

#[cfg(feature = "nats")]
impl From<async_nats::SubscribeError> for BusError {
    fn from(err: async_nats::SubscribeError) -> Self {
        BusError::Subscribe(err.to_string())
    }
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration.
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    /// Failed to parse configuration.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Configuration is well-formed but not usable.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Merged configuration does not fit the config type.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Render an error and all of its sources as `outer: inner: ...`.
///
/// A cause whose text already ends the rendered chain (because the outer
/// error embeds it in its own message) is not repeated.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !rendered.ends_with(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            GatewayError::MissingField("_index").to_string(),
            "_index is required"
        );
        assert_eq!(
            GatewayError::UnrecognizedAction("bogus".to_string()).to_string(),
            "Unrecognized action bogus"
        );
        assert_eq!(
            GatewayError::MissingAction.to_string(),
            "action must be specified"
        );
        assert!(GatewayError::MissingAction.is_validation());
    }

    #[test]
    fn test_downstream_keeps_cause() {
        let err = GatewayError::downstream(
            OperationKind::Get,
            SearchClientError::Other("node unavailable".to_string()),
        );

        assert_eq!(err.to_string(), "Get error: node unavailable");
        assert!(!err.is_validation());

        let cause = err.source().expect("cause should be preserved");
        assert_eq!(cause.to_string(), "node unavailable");
    }

    #[test]
    fn test_unexpected_hides_detail() {
        let err = GatewayError::Unexpected("index out of bounds".to_string());
        assert_eq!(err.to_string(), "Unhandled exception!");
        assert_eq!(err.detail(), Some("index out of bounds"));
    }

    #[test]
    fn test_error_chain() {
        let err = GatewayError::downstream(
            OperationKind::Scroll,
            SearchClientError::Engine {
                status: 404,
                reason: "No search context found".to_string(),
            },
        );
        assert_eq!(error_chain(&err), "Scroll error: No search context found");
    }

    #[test]
    fn test_error_chain_keeps_distinct_causes() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let cause = json_err.to_string();
        let err = ConfigError::DeserializationError("bad config".to_string());
        assert_eq!(error_chain(&err), "Deserialization error: bad config");

        let err = GatewayError::Shaping(json_err);
        assert_eq!(
            error_chain(&err),
            format!("Error reading search response: {cause}")
        );

        let err = GatewayError::downstream(
            OperationKind::Search,
            SearchClientError::Serialization(
                serde_json::from_str::<serde_json::Value>("[").unwrap_err(),
            ),
        );
        let rendered = error_chain(&err);
        assert!(rendered.starts_with("Search error: Serialization error: "), "{rendered}");
        assert_eq!(rendered.matches("Serialization error").count(), 1, "{rendered}");
    }

    #[test]
    fn test_bus_error_retryable() {
        assert!(BusError::Timeout("req-1".to_string()).is_retryable());
        assert!(!BusError::NoHandler("search".to_string()).is_retryable());
    }
}
