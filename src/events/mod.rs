use crate::services::fulfillment::FulfillmentService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events emitted by the checkout domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Catalog events
    ProductCreated(Uuid),

    // Cart events
    CartCreated(Uuid),
    CartItemAdded { cart_id: Uuid, product_id: Uuid },
    CartItemRemoved { cart_id: Uuid, product_id: Uuid },
    CartCleared(Uuid),

    // Checkout events
    CheckoutIntentCreated(Uuid),
    CheckoutSessionResolved { intent_id: Uuid, session_id: String },
    CheckoutSessionFailed { intent_id: Uuid, error: String },

    // Settlement events
    OrderPaid(Uuid),
    OrderPaymentSucceeded(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropped event: {}", e);
        }
    }
}

/// Processes incoming events.
///
/// This loop is the trigger layer of the checkout flow: a
/// `CheckoutIntentCreated` event dispatches the intent to the fulfillment
/// service, which performs the provider call and the single terminal write on
/// the intent row. Delivery is at-least-once from the fulfiller's point of
/// view; `FulfillmentService::fulfill` tolerates duplicate dispatch.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, fulfillment: Arc<FulfillmentService>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::CheckoutIntentCreated(intent_id) => {
                if let Err(e) = fulfillment.fulfill(intent_id).await {
                    // The failure is already recorded on the intent row for the
                    // polling client; log it for the platform as well.
                    error!(
                        "Checkout intent fulfillment failed: intent_id={}, error={}",
                        intent_id, e
                    );
                }
            }
            Event::CheckoutSessionResolved {
                intent_id,
                ref session_id,
            } => {
                info!(
                    "Checkout session resolved: intent_id={}, session_id={}",
                    intent_id, session_id
                );
            }
            Event::CheckoutSessionFailed {
                intent_id,
                ref error,
            } => {
                warn!(
                    "Checkout session failed: intent_id={}, error={}",
                    intent_id, error
                );
            }
            Event::OrderPaid(order_id) => {
                info!("Order paid: {}", order_id);
            }
            Event::OrderPaymentSucceeded(order_id) => {
                info!("Order payment succeeded: {}", order_id);
            }
            _ => {
                info!("No specific handler for event: {:?}", event);
            }
        }
    }

    warn!("Event processing loop has ended");
}
