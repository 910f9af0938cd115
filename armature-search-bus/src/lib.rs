//! Message bus gateway for OpenSearch/Elasticsearch.
//!
//! The gateway listens on a bus address, turns each request into one of four
//! search operations and answers with a single reply:
//!
//! | `action` | required fields | reply |
//! |----------|-----------------|-------|
//! | `index`  | `_index`, `_type`, `_source` | `_index`, `_type`, `_id`, `_version` |
//! | `get`    | `_index`, `_type`, `_id` | the above plus `_source` |
//! | `search` | none | the engine's search response |
//! | `scroll` | `_scroll_id`, `scroll` | the engine's search response |
//!
//! Successful replies carry `status: "ok"`; failures are
//! `{ "status": "error", "message": ... }`.
//!
//! # Example
//!
//! ```rust,no_run
//! use armature_search_bus::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::load(None)?;
//!     let client = Arc::new(OpenSearchClient::new(config.search_config())?);
//!     let bus = Arc::new(LocalBus::new());
//!
//!     let gateway = Arc::new(SearchGateway::new(client, bus.clone()));
//!     gateway.listen(&config.address).await?;
//!
//!     let request = json!({ "action": "get", "_index": "twitter", "_type": "tweet", "_id": "1" });
//!     if let serde_json::Value::Object(body) = request {
//!         let reply = bus.request(&config.address, body).await?;
//!         println!("{}", serde_json::Value::Object(reply));
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bus;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod opensearch;
pub mod operation;
pub mod reply;
pub mod testing;
pub mod translator;

pub use bus::{BusMessage, EventBus, LocalBus, MessageHandler};
#[cfg(feature = "nats")]
pub use bus::NatsBus;
pub use client::{GetOutcome, IndexOutcome, SearchClient, SearchResponse};
pub use config::{GatewayConfig, TransportAddress};
pub use envelope::Document;
pub use error::{BusError, ConfigError, GatewayError, SearchClientError};
pub use gateway::SearchGateway;
pub use opensearch::{OpenSearchClient, OpenSearchConfig};
pub use operation::{Operation, OperationKind};
pub use reply::Reply;

/// Prelude for common imports.
pub mod prelude {
    #[cfg(feature = "nats")]
    pub use crate::bus::NatsBus;
    pub use crate::bus::{BusMessage, EventBus, LocalBus, MessageHandler};
    pub use crate::client::SearchClient;
    pub use crate::config::GatewayConfig;
    pub use crate::envelope::Document;
    pub use crate::error::{BusError, GatewayError, SearchClientError};
    pub use crate::gateway::SearchGateway;
    pub use crate::opensearch::{OpenSearchClient, OpenSearchConfig};
}
