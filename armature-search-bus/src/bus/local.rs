//! In-process bus.

use super::{BusMessage, EventBus, MessageHandler};
use crate::envelope::Document;
use crate::error::{BusError, BusResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, oneshot};
use tracing::debug;
use uuid::Uuid;

/// Reply channel carried inside a request message.
///
/// Dropping the message drops the slot, which closes the channel and wakes
/// the requester with [`BusError::ReplyDropped`].
#[derive(Debug)]
pub(crate) struct ReplySlot {
    tx: oneshot::Sender<Document>,
    _open: Arc<()>,
}

/// Bus that delivers messages to handlers in the same process.
///
/// Each [`request`](LocalBus::request) gets a private reply address and a
/// oneshot channel that travels with the message, so a message is answered
/// at most once and an unanswered one never leaves its requester waiting.
#[derive(Default)]
pub struct LocalBus {
    handlers: RwLock<HashMap<String, Arc<dyn MessageHandler>>>,
    open_slots: Arc<()>,
}

impl LocalBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Send a message that expects no reply.
    pub async fn send(&self, address: &str, body: Document) -> BusResult<()> {
        self.deliver(BusMessage::new(address, body)).await
    }

    /// Send a message and wait for its reply.
    ///
    /// Fails with [`BusError::ReplyDropped`] if the handler drops the message
    /// without answering it.
    pub async fn request(&self, address: &str, body: Document) -> BusResult<Document> {
        let (reply_to, rx) = self.submit(address, body).await?;
        rx.await.map_err(|_| BusError::ReplyDropped(reply_to))
    }

    /// Like [`request`](LocalBus::request), giving up after `timeout`.
    pub async fn request_timeout(
        &self,
        address: &str,
        body: Document,
        timeout: Duration,
    ) -> BusResult<Document> {
        let (reply_to, rx) = self.submit(address, body).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(BusError::ReplyDropped(reply_to)),
            Err(_) => Err(BusError::Timeout(reply_to)),
        }
    }

    /// Number of delivered requests whose message is still held unanswered.
    pub fn pending_replies(&self) -> usize {
        Arc::strong_count(&self.open_slots) - 1
    }

    /// Whether a handler is registered on `address`.
    pub async fn has_handler(&self, address: &str) -> bool {
        self.handlers.read().await.contains_key(address)
    }

    async fn submit(
        &self,
        address: &str,
        body: Document,
    ) -> BusResult<(String, oneshot::Receiver<Document>)> {
        let reply_to = format!("__reply.{}", Uuid::new_v4());
        let (tx, rx) = oneshot::channel();

        let mut message = BusMessage::new(address, body).with_reply_to(&reply_to);
        message.reply_slot = Some(ReplySlot {
            tx,
            _open: self.open_slots.clone(),
        });

        self.deliver(message).await?;
        Ok((reply_to, rx))
    }

    async fn deliver(&self, message: BusMessage) -> BusResult<()> {
        let handler = self
            .handlers
            .read()
            .await
            .get(&message.address)
            .cloned()
            .ok_or_else(|| BusError::NoHandler(message.address.clone()))?;

        debug!(address = %message.address, message_id = %message.id, "Delivering message");
        handler.handle(message).await;
        Ok(())
    }
}

#[async_trait]
impl EventBus for LocalBus {
    async fn register_handler(
        &self,
        address: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> BusResult<()> {
        let mut handlers = self.handlers.write().await;
        if handlers.contains_key(address) {
            return Err(BusError::AlreadyRegistered(address.to_string()));
        }
        handlers.insert(address.to_string(), handler);
        debug!(address = address, "Registered handler");
        Ok(())
    }

    async fn reply(&self, mut message: BusMessage, body: Document) -> BusResult<()> {
        let reply_to = message
            .reply_to
            .take()
            .ok_or_else(|| BusError::NoReplyAddress(message.id.clone()))?;

        // Only requests made on this bus carry a slot.
        let slot = message
            .reply_slot
            .take()
            .ok_or_else(|| BusError::ReplyDropped(reply_to.clone()))?;

        slot.tx
            .send(body)
            .map_err(|_| BusError::ReplyDropped(reply_to))
    }
}

impl std::fmt::Debug for LocalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBus")
            .field("pending_replies", &self.pending_replies())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use tokio::sync::mpsc;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    struct Echo {
        bus: Arc<LocalBus>,
    }

    #[async_trait]
    impl MessageHandler for Echo {
        async fn handle(&self, message: BusMessage) {
            let body = message.body.clone();
            let _ = self.bus.send_ok(message, body).await;
        }
    }

    struct Silent;

    #[async_trait]
    impl MessageHandler for Silent {
        async fn handle(&self, _message: BusMessage) {}
    }

    /// Hands every message to the test instead of answering it.
    struct Holding {
        held: mpsc::UnboundedSender<BusMessage>,
    }

    #[async_trait]
    impl MessageHandler for Holding {
        async fn handle(&self, message: BusMessage) {
            let _ = self.held.send(message);
        }
    }

    #[tokio::test]
    async fn test_request_reply() {
        let bus = Arc::new(LocalBus::new());
        bus.register_handler("echo", Arc::new(Echo { bus: bus.clone() }))
            .await
            .unwrap();

        let reply = bus.request("echo", doc(json!({ "n": 1 }))).await.unwrap();
        assert_eq!(Value::Object(reply), json!({ "n": 1, "status": "ok" }));
        assert_eq!(bus.pending_replies(), 0);
    }

    #[tokio::test]
    async fn test_no_handler() {
        let bus = LocalBus::new();
        let err = bus.request("nowhere", Document::new()).await.unwrap_err();
        assert!(matches!(err, BusError::NoHandler(_)));
        assert_eq!(bus.pending_replies(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let bus = LocalBus::new();
        bus.register_handler("a", Arc::new(Silent)).await.unwrap();
        let err = bus.register_handler("a", Arc::new(Silent)).await.unwrap_err();
        assert!(matches!(err, BusError::AlreadyRegistered(_)));
        assert!(bus.has_handler("a").await);
    }

    #[tokio::test]
    async fn test_dropped_message_fails_request() {
        let bus = LocalBus::new();
        bus.register_handler("silent", Arc::new(Silent)).await.unwrap();

        let err = bus.request("silent", Document::new()).await.unwrap_err();

        assert!(matches!(err, BusError::ReplyDropped(_)));
        assert_eq!(bus.pending_replies(), 0);
    }

    #[tokio::test]
    async fn test_reply_after_requester_gave_up() {
        let (held, mut messages) = mpsc::unbounded_channel();
        let bus = LocalBus::new();
        bus.register_handler("hold", Arc::new(Holding { held }))
            .await
            .unwrap();

        let request = bus.request("hold", Document::new());
        assert!(
            tokio::time::timeout(Duration::from_millis(10), request)
                .await
                .is_err()
        );

        let message = messages.recv().await.unwrap();
        assert_eq!(bus.pending_replies(), 1);

        let err = bus.reply(message, Document::new()).await.unwrap_err();
        assert!(matches!(err, BusError::ReplyDropped(_)));
        assert_eq!(bus.pending_replies(), 0);
    }

    #[tokio::test]
    async fn test_reply_to_foreign_address() {
        let bus = LocalBus::new();
        let message = BusMessage::new("a", Document::new()).with_reply_to("_INBOX.other");

        let err = bus.reply(message, Document::new()).await.unwrap_err();
        assert!(matches!(err, BusError::ReplyDropped(_)));
    }

    #[tokio::test]
    async fn test_reply_without_address() {
        let bus = LocalBus::new();
        let err = bus
            .reply(BusMessage::new("a", Document::new()), Document::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::NoReplyAddress(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout() {
        let (held, mut messages) = mpsc::unbounded_channel();
        let bus = LocalBus::new();
        bus.register_handler("hold", Arc::new(Holding { held }))
            .await
            .unwrap();

        let err = bus
            .request_timeout("hold", Document::new(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::Timeout(_)));

        drop(messages.recv().await);
        assert_eq!(bus.pending_replies(), 0);
    }
}
