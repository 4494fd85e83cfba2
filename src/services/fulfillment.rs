use crate::{
    entities::{checkout_intent, CheckoutIntent, CheckoutIntentStatus, IntentLineItem},
    errors::ServiceError,
    events::{Event, EventSender},
    payments::StripeClient,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Fulfillment service: bridges a newly created checkout intent to the
/// payment provider.
///
/// This is the only writer of an intent's terminal state. Dispatch from the
/// event loop is treated as at-least-once: a non-pending intent is skipped,
/// and the provider call is keyed on the intent id so duplicates collapse
/// into a single session.
#[derive(Clone)]
pub struct FulfillmentService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    stripe: StripeClient,
}

impl FulfillmentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        stripe: StripeClient,
    ) -> Self {
        Self {
            db,
            event_sender,
            stripe,
        }
    }

    /// Mints a provider session for the intent and records the outcome on the
    /// intent row.
    ///
    /// On provider failure the error message is written to the row (where the
    /// polling client observes it) and the failure is propagated to the
    /// caller for logging.
    #[instrument(skip(self))]
    pub async fn fulfill(&self, intent_id: Uuid) -> Result<(), ServiceError> {
        let intent = CheckoutIntent::find_by_id(intent_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Checkout intent {} not found", intent_id))
            })?;

        if intent.status != CheckoutIntentStatus::Pending {
            info!(
                "Checkout intent {} already {:?}; skipping duplicate fulfillment",
                intent_id, intent.status
            );
            return Ok(());
        }

        let items: Vec<IntentLineItem> = serde_json::from_value(intent.items.clone())?;

        match self
            .stripe
            .create_checkout_session(intent_id, &items, &intent.success_url, &intent.cancel_url)
            .await
        {
            Ok(session) => {
                let mut active: checkout_intent::ActiveModel = intent.into();
                active.status = Set(CheckoutIntentStatus::Resolved);
                active.session_id = Set(Some(session.id.clone()));
                active.checkout_url = Set(Some(session.url));
                active.resolved_at = Set(Some(Utc::now()));
                active.update(&*self.db).await?;

                self.event_sender
                    .send_or_log(Event::CheckoutSessionResolved {
                        intent_id,
                        session_id: session.id,
                    })
                    .await;

                Ok(())
            }
            Err(err) => {
                warn!(
                    "Provider session creation failed for intent {}: {}",
                    intent_id, err
                );

                let message = err.to_string();
                let mut active: checkout_intent::ActiveModel = intent.into();
                active.status = Set(CheckoutIntentStatus::Failed);
                active.error = Set(Some(message.clone()));
                active.resolved_at = Set(Some(Utc::now()));
                active.update(&*self.db).await?;

                self.event_sender
                    .send_or_log(Event::CheckoutSessionFailed {
                        intent_id,
                        error: message,
                    })
                    .await;

                Err(err)
            }
        }
    }
}
