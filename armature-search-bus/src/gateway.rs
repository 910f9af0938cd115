//! The gateway: bus requests in, search operations out, one reply back.
//!
//! A request moves through `received -> validated -> dispatched -> completed
//! -> replied`. Validation happens inline in the handler; the search call runs
//! on its own task so the handler returns as soon as the call is submitted.
//! The task owns the original message and consumes it when replying, so
//! every request is answered exactly once.

use crate::bus::{BusMessage, EventBus, MessageHandler};
use crate::client::SearchClient;
use crate::error::{BusError, BusResult, GatewayError};
use crate::operation::Operation;
use crate::reply::{Reply, shape_get, shape_index, shape_search};
use crate::translator::translate;
use async_trait::async_trait;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};

/// Serves search requests arriving on a bus address.
pub struct SearchGateway {
    client: Arc<dyn SearchClient>,
    bus: Arc<dyn EventBus>,
}

impl SearchGateway {
    /// Create a gateway that answers through `bus` using `client`.
    pub fn new(client: Arc<dyn SearchClient>, bus: Arc<dyn EventBus>) -> Self {
        Self { client, bus }
    }

    /// Register the gateway on `address`.
    pub async fn listen(self: &Arc<Self>, address: &str) -> BusResult<()> {
        self.bus.register_handler(address, self.clone()).await?;
        info!(address = address, "Search gateway listening");
        Ok(())
    }

    /// Handle one request.
    ///
    /// Invalid requests are answered before this returns and yield `None`.
    /// Valid ones are submitted to the search client on a new task whose
    /// handle is returned; the reply is sent when that task completes.
    pub async fn dispatch(&self, message: BusMessage) -> Option<JoinHandle<()>> {
        let span = info_span!(
            "search_request",
            message_id = %message.id,
            action = message.action().unwrap_or("-"),
        );

        let translated = panic::catch_unwind(AssertUnwindSafe(|| translate(&message.body)))
            .unwrap_or_else(|payload| Err(unexpected(payload.as_ref())));

        let operation = match translated {
            Ok(operation) => operation,
            Err(err) => {
                deliver(self.bus.as_ref(), message, Reply::Error(err))
                    .instrument(span)
                    .await;
                return None;
            }
        };

        span.in_scope(|| debug!(kind = %operation.kind(), "Dispatching"));

        let client = self.client.clone();
        let bus = self.bus.clone();
        let task = async move {
            let reply = AssertUnwindSafe(execute(client.as_ref(), operation))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Reply::Error(unexpected(payload.as_ref())));

            deliver(bus.as_ref(), message, reply).await;
        };

        Some(tokio::spawn(task.instrument(span)))
    }
}

#[async_trait]
impl MessageHandler for SearchGateway {
    async fn handle(&self, message: BusMessage) {
        // Completion is reported through the reply; the task runs detached.
        let _ = self.dispatch(message).await;
    }
}

impl std::fmt::Debug for SearchGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchGateway").finish_non_exhaustive()
    }
}

/// Run an operation against the client and shape its outcome.
pub async fn execute(client: &dyn SearchClient, operation: Operation) -> Reply {
    let kind = operation.kind();
    let downstream = |err| GatewayError::downstream(kind, err);

    let result = match operation {
        Operation::Index(params) => client.index(params).await.map(shape_index).map_err(downstream),
        Operation::Get(params) => client.get(params).await.map(shape_get).map_err(downstream),
        Operation::Search(params) => client
            .search(params)
            .await
            .map_err(downstream)
            .and_then(|response| shape_search(&response)),
        Operation::Scroll(params) => client
            .scroll(params)
            .await
            .map_err(downstream)
            .and_then(|response| shape_search(&response)),
    };

    Reply::from(result)
}

async fn deliver(bus: &dyn EventBus, message: BusMessage, reply: Reply) {
    let message_id = message.id.clone();
    let result = match reply {
        Reply::Ok(body) => bus.send_ok(message, body).await,
        Reply::Error(err) => bus.send_error(message, err).await,
    };

    match result {
        Ok(()) => debug!(message_id = %message_id, "Reply sent"),
        Err(BusError::NoReplyAddress(_)) => {
            debug!(message_id = %message_id, "Sender expects no reply")
        }
        Err(e) => warn!(message_id = %message_id, error = %e, "Failed to deliver reply"),
    }
}

fn unexpected(payload: &(dyn Any + Send)) -> GatewayError {
    GatewayError::Unexpected(panic_message(payload))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
