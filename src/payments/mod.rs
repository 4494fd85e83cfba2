//! Payment provider integration.

pub mod stripe;

pub use stripe::{
    StripeCheckoutSession, StripeClient, StripePaymentIntent, StripeSessionHandle,
    StripeWebhookEvent,
};
