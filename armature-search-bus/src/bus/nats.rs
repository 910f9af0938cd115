//! NATS bus transport

use std::collections::HashMap;
use std::sync::Arc;

use async_nats::Client;
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{BusMessage, EventBus, MessageHandler};
use crate::envelope::{self, Document};
use crate::error::{BusError, BusResult};

/// Request headers copied onto the [`BusMessage`].
const FORWARDED_HEADERS: [&str; 3] = ["correlation-id", "content-type", "timestamp"];

/// Bus backed by NATS subjects.
///
/// The gateway address is a NATS subject; requesters use NATS
/// request/reply and the reply is published to the request's inbox.
pub struct NatsBus {
    client: Client,
    consumers: Mutex<Vec<JoinHandle<()>>>,
}

impl NatsBus {
    /// Connect to NATS
    pub async fn connect(url: &str) -> BusResult<Self> {
        info!(url = %url, "Connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .name("armature-search-gateway")
            .connect(url)
            .await
            .map_err(BusError::from)?;

        info!("Connected to NATS successfully");

        Ok(Self {
            client,
            consumers: Mutex::new(Vec::new()),
        })
    }

    /// Stop consuming and flush pending publishes.
    pub async fn close(&self) -> BusResult<()> {
        info!("Closing NATS connection");

        for consumer in self.consumers.lock().await.drain(..) {
            consumer.abort();
        }

        self.client
            .flush()
            .await
            .map_err(|e| BusError::Connection(e.to_string()))
    }

    async fn publish(&self, subject: String, body: &Document) -> BusResult<()> {
        let payload =
            serde_json::to_vec(body).map_err(|e| BusError::Serialization(e.to_string()))?;

        self.client
            .publish(subject, payload.into())
            .await
            .map_err(BusError::from)
    }
}

#[async_trait]
impl EventBus for NatsBus {
    async fn register_handler(
        &self,
        address: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> BusResult<()> {
        let subscriber = self
            .client
            .subscribe(address.to_string())
            .await
            .map_err(BusError::from)?;

        let client = self.client.clone();
        let address_owned = address.to_string();
        let consumer = tokio::spawn(async move {
            consume_messages(subscriber, client, handler, &address_owned).await;
        });
        self.consumers.lock().await.push(consumer);

        info!(subject = address, "Subscribed to NATS subject");
        Ok(())
    }

    async fn reply(&self, message: BusMessage, body: Document) -> BusResult<()> {
        let subject = message
            .reply_to
            .ok_or_else(|| BusError::NoReplyAddress(message.id.clone()))?;

        debug!(subject = %subject, message_id = %message.id, "Publishing reply to NATS");
        self.publish(subject, &body).await
    }
}

async fn consume_messages(
    mut subscriber: async_nats::Subscriber,
    client: Client,
    handler: Arc<dyn MessageHandler>,
    address: &str,
) {
    while let Some(nats_msg) = subscriber.next().await {
        match nats_message_to_message(&nats_msg, address) {
            Ok(message) => handler.handle(message).await,
            Err(e) => {
                warn!(subject = address, error = %e, "Dropping unreadable message");
                if let Some(reply) = nats_msg.reply {
                    let body = envelope::error(e.to_string());
                    if let Ok(payload) = serde_json::to_vec(&body) {
                        let _ = client.publish(reply, payload.into()).await;
                    }
                }
            }
        }
    }
    debug!(subject = address, "Subscriber stream ended");
}

fn nats_message_to_message(
    nats_msg: &async_nats::Message,
    address: &str,
) -> BusResult<BusMessage> {
    let body: Document = serde_json::from_slice(&nats_msg.payload)
        .map_err(|e| BusError::Deserialization(e.to_string()))?;

    let mut message = BusMessage::new(address, body);

    if let Some(nats_headers) = nats_msg.headers.as_ref() {
        if let Some(value) = nats_headers.get("Nats-Msg-Id") {
            message.id = AsRef::<str>::as_ref(&value).to_string();
        }
        let mut headers = HashMap::new();
        for name in FORWARDED_HEADERS {
            if let Some(value) = nats_headers.get(name) {
                headers.insert(name.to_string(), AsRef::<str>::as_ref(&value).to_string());
            }
        }
        message.headers = headers;
    }

    message.reply_to = nats_msg.reply.as_ref().map(|subject| subject.to_string());
    Ok(message)
}

impl std::fmt::Debug for NatsBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsBus").finish_non_exhaustive()
    }
}
