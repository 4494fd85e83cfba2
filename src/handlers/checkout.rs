use crate::handlers::common::{map_service_error, success_response};
use crate::{entities::CheckoutIntentModel, errors::ApiError, AppState};
use axum::{
    extract::{Json, Path, State},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(start_checkout))
        .route("/:intent_id", get(get_checkout_intent))
}

/// Start checkout from a cart and wait for the provider session.
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = StartCheckoutRequest,
    responses(
        (status = 200, description = "Checkout session ready", body = CheckoutResponse),
        (status = 400, description = "Cart invalid or missing provider price id", body = crate::errors::ErrorResponse),
        (status = 402, description = "Provider rejected the session", body = crate::errors::ErrorResponse),
        (status = 502, description = "Session creation timed out", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn start_checkout(
    State(state): State<AppState>,
    Json(payload): Json<StartCheckoutRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let redirect = state
        .services
        .checkout
        .begin_checkout(payload.cart_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(CheckoutResponse {
        intent_id: redirect.intent_id,
        session_id: redirect.session_id,
        url: redirect.url,
    }))
}

/// Inspect a checkout intent (used by the storefront while waiting).
#[utoipa::path(
    get,
    path = "/api/v1/checkout/{intent_id}",
    params(("intent_id" = Uuid, Path, description = "Checkout intent id")),
    responses(
        (status = 200, description = "Intent state", body = CheckoutIntentResponse),
        (status = 404, description = "Unknown intent", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn get_checkout_intent(
    State(state): State<AppState>,
    Path(intent_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let intent = state
        .services
        .checkout
        .get_intent(intent_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(CheckoutIntentResponse::from(intent)))
}

// Request/Response DTOs

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartCheckoutRequest {
    pub cart_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub intent_id: Uuid,
    /// Provider session id used for the hosted-checkout redirect
    pub session_id: String,
    /// Hosted checkout page URL
    pub url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutIntentResponse {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub status: String,
    pub session_id: Option<String>,
    pub url: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl From<CheckoutIntentModel> for CheckoutIntentResponse {
    fn from(intent: CheckoutIntentModel) -> Self {
        Self {
            id: intent.id,
            cart_id: intent.cart_id,
            status: format!("{:?}", intent.status).to_lowercase(),
            session_id: intent.session_id,
            url: intent.checkout_url,
            error: intent.error,
            created_at: intent.created_at,
            resolved_at: intent.resolved_at,
        }
    }
}
