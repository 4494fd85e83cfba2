pub mod carts;
pub mod checkout;
pub mod common;
pub mod orders;
pub mod payment_webhooks;
pub mod products;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<crate::services::ProductService>,
    pub carts: Arc<crate::services::CartService>,
    pub checkout: Arc<crate::services::CheckoutService>,
    pub orders: Arc<crate::services::OrderService>,
    pub settlement: Arc<crate::services::SettlementService>,
}

impl AppServices {
    /// Build the AppServices container from shared infrastructure.
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        let products = Arc::new(crate::services::ProductService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let carts = Arc::new(crate::services::CartService::new(
            db.clone(),
            event_sender.clone(),
            config.default_currency.clone(),
        ));
        let checkout = Arc::new(crate::services::CheckoutService::new(
            db.clone(),
            event_sender.clone(),
            carts.clone(),
            config.checkout_success_url.clone(),
            config.checkout_cancel_url.clone(),
            config.poll_interval(),
            config.checkout_poll_attempts,
        ));
        let orders = Arc::new(crate::services::OrderService::new(db.clone()));
        let settlement = Arc::new(crate::services::SettlementService::new(
            db,
            event_sender,
        ));

        Self {
            products,
            carts,
            checkout,
            orders,
            settlement,
        }
    }
}
