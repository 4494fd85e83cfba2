use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "CareWell Checkout API",
        version = "0.1.0",
        description = r#"
# CareWell Checkout API

Backend for the CareWell store checkout flow: carts, checkout-intent creation,
Stripe Checkout session fulfillment, and webhook-driven order settlement.

## Flow

1. Build a cart (`/carts`), then `POST /checkout` with the cart id.
2. The service persists a checkout intent, asks Stripe for a hosted session,
   and returns the session id and URL once the intent resolves.
3. Stripe calls `POST /payments/webhook` after payment; the settlement
   handler materializes the order, readable at `GET /orders/{id}`.

## Error Handling

Errors use a consistent JSON shape with appropriate HTTP status codes:

```json
{
  "error": "Bad Request",
  "message": "Validation failed",
  "timestamp": "2026-01-01T00:00:00Z"
}
```

The payment webhook is the one exception: verification failures answer with a
plain-text `Webhook Error: <reason>` body, mirroring what the provider
expects to log.
"#
    ),
    paths(
        crate::handlers::checkout::start_checkout,
        crate::handlers::checkout::get_checkout_intent,
        crate::handlers::orders::get_order,
        crate::handlers::payment_webhooks::stripe_webhook,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::handlers::checkout::StartCheckoutRequest,
        crate::handlers::checkout::CheckoutResponse,
        crate::handlers::checkout::CheckoutIntentResponse,
        crate::handlers::orders::OrderResponse,
    )),
    tags(
        (name = "Checkout", description = "Cart-to-session checkout flow"),
        (name = "Orders", description = "Settled orders"),
        (name = "Payments", description = "Provider webhook intake")
    )
)]
pub struct ApiDoc;

/// Swagger UI router serving the generated document
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
