use crate::handlers::common::{
    created_response, map_service_error, success_response, validate_input, PaginatedResponse,
};
use crate::{errors::ApiError, services::products::CreateProductInput, AppState};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for product endpoints
pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_product))
        .route("/", get(list_products))
        .route("/:id", get(get_product))
}

/// Create a product
async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let product = state
        .services
        .products
        .create_product(CreateProductInput {
            name: payload.name.trim().to_string(),
            description: payload.description,
            category: payload.category,
            price: payload.price,
            stock: payload.stock,
            stripe_product_id: payload.stripe_product_id,
            stripe_price_id: payload.stripe_price_id,
        })
        .await
        .map_err(map_service_error)?;

    Ok(created_response(product))
}

/// List products, optionally filtered by category
async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (products, total) = state
        .services
        .products
        .list_products(query.category, query.page, query.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        products,
        query.page,
        query.per_page,
        total,
    )))
}

/// Get a single product
async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .get_product(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(product))
}

// Request DTOs

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub category: String,
    pub price: Decimal,
    pub stock: Option<i32>,
    pub stripe_product_id: Option<String>,
    pub stripe_price_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    pub category: Option<String>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}
