//! Explicit event emission for the notification sink.
//!
//! Services emit events at defined points (after commit), never from
//! persistence hooks. Delivery is fire-and-forget: a failed send is logged
//! and must not affect the committed state it describes.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events emitted by the order core and the linking workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    LinkRequested(Uuid),
    LinkResponded {
        link_id: Uuid,
        status: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event to the notification sink.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {e}"))
    }

    /// Best-effort emission used after a transaction commits. Failures are
    /// logged and swallowed so they never surface to the caller.
    pub async fn emit(&self, event: Event) {
        if let Err(e) = self.send(event.clone()).await {
            warn!(error = %e, ?event, "Failed to emit event");
        }
    }
}

/// Consumes events and fans them out to interested parties.
///
/// This is the delivery boundary: persistence of notifications, webhooks or
/// push channels hang off this loop, outside every database transaction.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(order_id = %order_id, "Notifying supplier of new order");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(
                    order_id = %order_id,
                    old_status = %old_status,
                    new_status = %new_status,
                    "Notifying consumer of order status change"
                );
            }
            Event::LinkRequested(link_id) => {
                info!(link_id = %link_id, "Notifying supplier of link request");
            }
            Event::LinkResponded { link_id, status } => {
                info!(link_id = %link_id, status = %status, "Notifying consumer of link response");
            }
        }
    }

    error!("Event processing loop terminated: channel closed");
}
