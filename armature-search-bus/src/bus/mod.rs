//! Bus transport seam.
//!
//! A bus delivers [`BusMessage`]s to the [`MessageHandler`] registered on an
//! address and carries replies back to the requester. Replying consumes the
//! original message, so a message can be answered at most once.
//!
//! Transports:
//! - [`LocalBus`] - in-process, always available
//! - `NatsBus` - NATS request/reply (feature `nats`)

use crate::envelope::{self, Document};
use crate::error::{BusResult, GatewayError, error_chain};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

mod local;
#[cfg(feature = "nats")]
mod nats;

pub use local::LocalBus;
#[cfg(feature = "nats")]
pub use nats::NatsBus;

/// A message received from the bus.
#[derive(Debug)]
pub struct BusMessage {
    /// Unique message identifier
    pub id: String,
    /// Address the message was sent to
    pub address: String,
    /// Message body
    pub body: Document,
    /// Where the reply goes, if the sender expects one
    pub reply_to: Option<String>,
    /// Transport headers
    pub headers: HashMap<String, String>,
    /// Timestamp when the message was created
    pub timestamp: DateTime<Utc>,
    /// In-process reply channel; dropping the message closes it.
    pub(crate) reply_slot: Option<local::ReplySlot>,
}

impl BusMessage {
    /// Create a new message for an address.
    pub fn new(address: impl Into<String>, body: Document) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            address: address.into(),
            body,
            reply_to: None,
            headers: HashMap::new(),
            timestamp: Utc::now(),
            reply_slot: None,
        }
    }

    /// Set the reply-to address
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Add a header to the message
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// The `action` field of the body, if it is a string.
    pub fn action(&self) -> Option<&str> {
        self.body.get(envelope::ACTION).and_then(|v| v.as_str())
    }
}

impl fmt::Display for BusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BusMessage {{ id: {}, address: {}, fields: {} }}",
            self.id,
            self.address,
            self.body.len()
        )
    }
}

/// Trait for handling messages delivered on an address
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle a received message.
    ///
    /// The handler owns the message from here on and is responsible for
    /// replying to it.
    async fn handle(&self, message: BusMessage);
}

/// Core trait for bus transports
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Deliver messages sent to `address` to `handler`.
    async fn register_handler(
        &self,
        address: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> BusResult<()>;

    /// Send `body` back to the sender of `message`, verbatim.
    async fn reply(&self, message: BusMessage, body: Document) -> BusResult<()>;

    /// Reply with a success envelope.
    async fn send_ok(&self, message: BusMessage, body: Document) -> BusResult<()> {
        self.reply(message, envelope::ok(body)).await
    }

    /// Reply with an error envelope. The full cause chain is logged, only
    /// the top-level message is sent.
    async fn send_error(&self, message: BusMessage, err: GatewayError) -> BusResult<()> {
        match err.detail() {
            Some(detail) => error!(
                message_id = %message.id,
                detail = detail,
                "{}",
                error_chain(&err)
            ),
            None => error!(message_id = %message.id, "{}", error_chain(&err)),
        }
        self.reply(message, envelope::error(err.to_string())).await
    }
}
