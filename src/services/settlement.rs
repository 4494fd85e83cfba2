use crate::{
    entities::{order, Order, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    payments::{StripeCheckoutSession, StripePaymentIntent, StripeWebhookEvent},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Settlement service: turns verified provider events into durable order
/// records. Owns every write to the orders table.
#[derive(Clone)]
pub struct SettlementService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// What the settlement did with a verified event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    Recorded,
    Ignored,
}

impl SettlementService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Dispatches one verified webhook event. Unrecognized event types are
    /// accepted and ignored so the provider does not retry-storm on events
    /// this system does not care about yet.
    #[instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn process_event(
        &self,
        event: &StripeWebhookEvent,
    ) -> Result<SettlementOutcome, ServiceError> {
        match event.event_type.as_str() {
            "checkout.session.completed" => {
                let session: StripeCheckoutSession =
                    serde_json::from_value(event.data.object.clone()).map_err(|e| {
                        ServiceError::BadRequest(format!("invalid checkout session: {}", e))
                    })?;
                self.handle_session_completed(session).await
            }
            "payment_intent.succeeded" => {
                let payment_intent: StripePaymentIntent =
                    serde_json::from_value(event.data.object.clone()).map_err(|e| {
                        ServiceError::BadRequest(format!("invalid payment intent: {}", e))
                    })?;
                self.handle_payment_intent_succeeded(payment_intent).await
            }
            other => {
                info!("Unhandled payment webhook type: {}", other);
                Ok(SettlementOutcome::Ignored)
            }
        }
    }

    /// Upserts the order for a completed checkout session.
    ///
    /// The write is keyed by the intent id from the session metadata, so a
    /// duplicate delivery converges to the same state. A late duplicate never
    /// regresses an order that has already advanced to `payment_succeeded`.
    async fn handle_session_completed(
        &self,
        session: StripeCheckoutSession,
    ) -> Result<SettlementOutcome, ServiceError> {
        let Some(order_id) = parse_order_id(session.order_id()) else {
            warn!(
                "Completed session {} carries no usable orderId metadata; ignoring",
                session.id
            );
            return Ok(SettlementOutcome::Ignored);
        };

        let amount = session.amount_total.unwrap_or(0);
        let customer_email = session.email();
        let existing = Order::find_by_id(order_id).one(&*self.db).await?;

        match existing {
            Some(existing) => {
                // Keep the advanced status and payment-intent linkage on
                // duplicate or out-of-order delivery.
                let keep_advanced = existing.status == OrderStatus::PaymentSucceeded;
                let mut active: order::ActiveModel = existing.into();
                if !keep_advanced {
                    active.status = Set(OrderStatus::Paid);
                }
                active.stripe_session_id = Set(session.id.clone());
                active.amount = Set(amount);
                active.customer_email = Set(customer_email);
                active.updated_at = Set(Utc::now());
                active.update(&*self.db).await?;
            }
            None => {
                let record = order::ActiveModel {
                    id: Set(order_id),
                    status: Set(OrderStatus::Paid),
                    stripe_session_id: Set(session.id.clone()),
                    payment_intent_id: Set(None),
                    amount: Set(amount),
                    customer_email: Set(customer_email),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                };
                record.insert(&*self.db).await?;
            }
        }

        self.event_sender.send_or_log(Event::OrderPaid(order_id)).await;

        info!(
            "Settled checkout session {} into order {}",
            session.id, order_id
        );
        Ok(SettlementOutcome::Recorded)
    }

    /// Attaches the payment intent to an existing order.
    ///
    /// An unknown order fails loudly instead of materializing a partial
    /// record; the provider's retry redelivers once the completed-session
    /// event has landed.
    async fn handle_payment_intent_succeeded(
        &self,
        payment_intent: StripePaymentIntent,
    ) -> Result<SettlementOutcome, ServiceError> {
        let Some(order_id) = parse_order_id(payment_intent.order_id()) else {
            warn!(
                "Payment intent {} carries no usable orderId metadata; ignoring",
                payment_intent.id
            );
            return Ok(SettlementOutcome::Ignored);
        };

        let existing = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Order {} not found for payment intent {}",
                    order_id, payment_intent.id
                ))
            })?;

        let mut active: order::ActiveModel = existing.into();
        active.status = Set(OrderStatus::PaymentSucceeded);
        active.payment_intent_id = Set(Some(payment_intent.id.clone()));
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderPaymentSucceeded(order_id))
            .await;

        info!(
            "Attached payment intent {} to order {}",
            payment_intent.id, order_id
        );
        Ok(SettlementOutcome::Recorded)
    }
}

fn parse_order_id(raw: Option<&str>) -> Option<Uuid> {
    raw.and_then(|s| Uuid::parse_str(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_parsing_handles_missing_and_garbage() {
        assert_eq!(parse_order_id(None), None);
        assert_eq!(parse_order_id(Some("not-a-uuid")), None);

        let id = Uuid::new_v4();
        assert_eq!(parse_order_id(Some(&id.to_string())), Some(id));
    }
}
