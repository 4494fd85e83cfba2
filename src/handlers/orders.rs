use crate::handlers::common::{map_service_error, success_response};
use crate::{
    entities::{OrderModel, OrderStatus},
    errors::ApiError,
    AppState,
};
use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Creates the router for order endpoints
pub fn orders_routes() -> Router<AppState> {
    Router::new().route("/:id", get(get_order))
}

/// Fetch a settled order (read by the checkout confirmation page).
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id (equals the checkout intent id)")),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not settled yet", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_order(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(OrderResponse::from(order)))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub status: String,
    pub stripe_session_id: String,
    pub payment_intent_id: Option<String>,
    /// Amount in the provider's minor units
    pub amount: i64,
    pub customer_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderModel> for OrderResponse {
    fn from(order: OrderModel) -> Self {
        let status = match order.status {
            OrderStatus::Paid => "paid",
            OrderStatus::PaymentSucceeded => "payment_succeeded",
        };
        Self {
            id: order.id,
            status: status.to_string(),
            stripe_session_id: order.stripe_session_id,
            payment_intent_id: order.payment_intent_id,
            amount: order.amount,
            customer_email: order.customer_email,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}
