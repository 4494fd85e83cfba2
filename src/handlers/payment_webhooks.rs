use crate::{errors::ServiceError, AppState};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::json;
use tracing::{info, warn};

// POST /api/v1/payments/webhook
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Webhook accepted or ignored"),
        (status = 400, description = "Signature verification failed"),
        (status = 404, description = "Referenced order does not exist yet", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Signature verification failures are one failure class: reject with 400
    // and echo the reason, never process the event.
    let signature = match headers.get("stripe-signature").and_then(|h| h.to_str().ok()) {
        Some(sig) => sig,
        None => {
            warn!("Payment webhook without stripe-signature header");
            return webhook_error("missing stripe signature or webhook secret");
        }
    };

    let event = match state.stripe.construct_event(&body, signature) {
        Ok(event) => event,
        Err(err) => {
            warn!("Payment webhook verification failed: {}", err);
            return webhook_error(&verification_message(&err));
        }
    };

    info!(
        "Verified payment webhook: type={}, id={:?}",
        event.event_type, event.id
    );

    match state.services.settlement.process_event(&event).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "received": true }))).into_response(),
        // Settlement failures (e.g. a payment intent for an order that has
        // not materialized yet) surface as errors so the provider redelivers.
        Err(err) => err.into_response(),
    }
}

fn webhook_error(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        format!("Webhook Error: {}", message),
    )
        .into_response()
}

fn verification_message(err: &ServiceError) -> String {
    match err {
        ServiceError::BadRequest(msg) | ServiceError::InternalError(msg) => msg.clone(),
        other => other.to_string(),
    }
}
