use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use carewell_api::{
    config::AppConfig,
    db,
    entities::product,
    events::{self, EventSender},
    handlers::AppServices,
    payments::StripeClient,
    services::FulfillmentService,
    AppState,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// Helper harness for spinning up an application backed by an in-memory
/// SQLite database and the real router.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    // Kept alive so intent-created events do not error when the fulfiller is
    // intentionally idle.
    _idle_event_rx: Option<mpsc::Receiver<events::Event>>,
    _event_task: Option<tokio::task::JoinHandle<()>>,
}

impl TestApp {
    /// Construct a test application with the event processor running.
    #[allow(dead_code)]
    pub async fn new() -> Self {
        Self::build(|_| {}, true).await
    }

    /// Construct a test application with a tweaked configuration
    /// (e.g. pointing the Stripe client at a mock server).
    #[allow(dead_code)]
    pub async fn with_config(configure: impl FnOnce(&mut AppConfig)) -> Self {
        Self::build(configure, true).await
    }

    /// Construct a test application whose fulfiller never runs, leaving
    /// checkout intents pending until the test resolves them by hand.
    #[allow(dead_code)]
    pub async fn with_idle_fulfiller(configure: impl FnOnce(&mut AppConfig)) -> Self {
        Self::build(configure, false).await
    }

    async fn build(configure: impl FnOnce(&mut AppConfig), run_event_loop: bool) -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:", "127.0.0.1", 18_080, "test");
        // A single pooled connection keeps every query on the same in-memory
        // database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        configure(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to create test schema");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);

        let stripe = StripeClient::from_config(&cfg);
        let fulfillment = Arc::new(FulfillmentService::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            stripe.clone(),
        ));

        let (idle_event_rx, event_task) = if run_event_loop {
            (
                None,
                Some(tokio::spawn(events::process_events(event_rx, fulfillment))),
            )
        } else {
            (Some(event_rx), None)
        };

        let services = AppServices::new(db_arc.clone(), Arc::new(event_sender.clone()), &cfg);

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            stripe,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", carewell_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            _idle_event_rx: idle_event_rx,
            _event_task: event_task,
        }
    }

    /// Issue a JSON request against the router.
    #[allow(dead_code)]
    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(path);
        let request = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                builder
                    .body(Body::from(json.to_string()))
                    .expect("request body")
            }
            None => builder.body(Body::empty()).expect("request body"),
        };

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    /// Issue a raw request with explicit headers (used by webhook tests).
    #[allow(dead_code)]
    pub async fn raw_request(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
        body: Vec<u8>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::from(body)).expect("request body");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    /// Insert a product directly into the test database.
    #[allow(dead_code)]
    pub async fn seed_product(
        &self,
        price: Decimal,
        stripe_price_id: Option<&str>,
    ) -> product::Model {
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Caregiver Handbook".to_string()),
            description: Set(Some("Printed guide for new caregivers".to_string())),
            category: Set("Product".to_string()),
            price: Set(price),
            stock: Set(25),
            stripe_product_id: Set(stripe_price_id.map(|_| "prod_test".to_string())),
            stripe_price_id: Set(stripe_price_id.map(|s| s.to_string())),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        model
            .insert(&*self.state.db)
            .await
            .expect("failed to seed product")
    }
}

/// Deserialize a response body as JSON.
#[allow(dead_code)]
pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Read a response body as a UTF-8 string.
#[allow(dead_code)]
pub async fn response_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    String::from_utf8(bytes.to_vec()).expect("utf8 response")
}

#[allow(dead_code)]
pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}
