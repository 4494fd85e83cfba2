use crate::{
    entities::{checkout_intent, CheckoutIntent, CheckoutIntentModel, CheckoutIntentStatus, IntentLineItem},
    errors::ServiceError,
    events::{Event, EventSender},
    services::carts::CartService,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Message returned when polling exhausts all attempts without a terminal
/// state on the intent.
const TIMEOUT_MESSAGE: &str = "failed to create checkout session";

/// Checkout service: converts a cart into a provider checkout session.
///
/// The service persists a pending checkout intent, hands it to the fulfiller
/// via the event channel, then polls the intent row until the fulfiller's
/// single terminal write appears. The intent may still resolve after the
/// polling window closes; that inconsistency window is accepted and the
/// caller re-attempts manually.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    cart_service: Arc<CartService>,
    success_url: String,
    cancel_url: String,
    poll_interval: Duration,
    poll_attempts: u32,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        cart_service: Arc<CartService>,
        success_url: String,
        cancel_url: String,
        poll_interval: Duration,
        poll_attempts: u32,
    ) -> Self {
        Self {
            db,
            event_sender,
            cart_service,
            success_url,
            cancel_url,
            poll_interval,
            poll_attempts,
        }
    }

    /// Starts a checkout for the given cart and waits for the provider
    /// session.
    ///
    /// Every item's product must carry a provider price identifier; a missing
    /// one rejects the whole checkout before anything is written. On success
    /// the caller receives the session id and hosted checkout URL to redirect
    /// the browser to, exactly once.
    #[instrument(skip(self))]
    pub async fn begin_checkout(&self, cart_id: Uuid) -> Result<CheckoutRedirect, ServiceError> {
        let intent_id = self.create_intent(cart_id).await?;

        match self.wait_for_session(intent_id).await? {
            IntentOutcome::Resolved { session_id, url } => {
                self.cart_service.mark_converted(cart_id).await?;
                info!(
                    "Checkout ready: intent {} resolved to session {}",
                    intent_id, session_id
                );
                Ok(CheckoutRedirect {
                    intent_id,
                    session_id,
                    url,
                })
            }
            IntentOutcome::Failed(reason) => Err(ServiceError::PaymentFailed(reason)),
            IntentOutcome::TimedOut => {
                warn!(
                    "Checkout intent {} did not resolve within {} attempts",
                    intent_id, self.poll_attempts
                );
                Err(ServiceError::ExternalServiceError(
                    TIMEOUT_MESSAGE.to_string(),
                ))
            }
        }
    }

    /// Persists a pending intent for the cart and announces it to the
    /// fulfiller. Fails fast without writing when the cart is empty or an
    /// item lacks a provider price identifier.
    #[instrument(skip(self))]
    pub async fn create_intent(&self, cart_id: Uuid) -> Result<Uuid, ServiceError> {
        let rows = self.cart_service.items_with_products(cart_id).await?;
        if rows.is_empty() {
            return Err(ServiceError::InvalidOperation("Cart is empty".to_string()));
        }

        let mut items = Vec::with_capacity(rows.len());
        for (item, product) in &rows {
            let price_id = product
                .as_ref()
                .and_then(|p| p.stripe_price_id.as_deref())
                .filter(|p| !p.is_empty())
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "Product {} has no provider price id",
                        item.product_id
                    ))
                })?;
            items.push(IntentLineItem {
                price: price_id.to_string(),
                quantity: item.quantity,
            });
        }

        let intent_id = Uuid::new_v4();
        let intent = checkout_intent::ActiveModel {
            id: Set(intent_id),
            cart_id: Set(cart_id),
            items: Set(serde_json::to_value(&items)?),
            success_url: Set(self.success_url.clone()),
            cancel_url: Set(self.cancel_url.clone()),
            status: Set(CheckoutIntentStatus::Pending),
            session_id: Set(None),
            checkout_url: Set(None),
            error: Set(None),
            created_at: Set(Utc::now()),
            resolved_at: Set(None),
        };
        intent.insert(&*self.db).await?;

        // Creation happens-before fulfillment: the event goes out only after
        // the row exists.
        self.event_sender
            .send(Event::CheckoutIntentCreated(intent_id))
            .await
            .map_err(ServiceError::EventError)?;

        info!("Created checkout intent {} for cart {}", intent_id, cart_id);
        Ok(intent_id)
    }

    /// Polls the intent row until it leaves `Pending`, up to the configured
    /// attempt count with a fixed delay between polls.
    pub async fn wait_for_session(&self, intent_id: Uuid) -> Result<IntentOutcome, ServiceError> {
        for _ in 0..self.poll_attempts {
            let intent = self.get_intent(intent_id).await?;

            match intent.status {
                CheckoutIntentStatus::Resolved => {
                    let session_id = intent.session_id.unwrap_or_default();
                    return Ok(IntentOutcome::Resolved {
                        session_id,
                        url: intent.checkout_url,
                    });
                }
                CheckoutIntentStatus::Failed => {
                    return Ok(IntentOutcome::Failed(
                        intent
                            .error
                            .unwrap_or_else(|| "checkout session creation failed".to_string()),
                    ));
                }
                CheckoutIntentStatus::Pending => {
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        Ok(IntentOutcome::TimedOut)
    }

    pub async fn get_intent(&self, intent_id: Uuid) -> Result<CheckoutIntentModel, ServiceError> {
        CheckoutIntent::find_by_id(intent_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Checkout intent {} not found", intent_id))
            })
    }
}

/// Typed result of one polling pass over a checkout intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentOutcome {
    Resolved {
        session_id: String,
        url: Option<String>,
    },
    Failed(String),
    TimedOut,
}

/// Redirect data handed to the storefront on a successful checkout start.
#[derive(Debug, Serialize)]
pub struct CheckoutRedirect {
    pub intent_id: Uuid,
    pub session_id: String,
    pub url: Option<String>,
}
