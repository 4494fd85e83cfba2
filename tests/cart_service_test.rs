//! Integration tests for the cart service: aggregation semantics, derived
//! totals, and idempotent removal.

mod common;

use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use carewell_api::{
    entities::cart,
    errors::ServiceError,
    services::carts::{AddToCartInput, CreateCartInput},
};
use uuid::Uuid;

#[tokio::test]
async fn create_cart_uses_default_currency() {
    let app = TestApp::new().await;

    let cart = app
        .state
        .services
        .carts
        .create_cart(CreateCartInput {
            session_id: Some("session_123".to_string()),
            currency: None,
        })
        .await
        .expect("cart should be created");

    assert_eq!(cart.currency, "USD");
    assert_eq!(cart.session_id.as_deref(), Some("session_123"));
    assert_eq!(cart.status, cart::CartStatus::Active);
}

#[tokio::test]
async fn add_item_snapshots_price_and_derives_total() {
    let app = TestApp::new().await;
    let carts = &app.state.services.carts;

    let product = app.seed_product(dec!(25.50), Some("price_abc")).await;
    let cart = carts
        .create_cart(CreateCartInput {
            session_id: None,
            currency: None,
        })
        .await
        .expect("cart");

    let view = carts
        .add_item(
            cart.id,
            AddToCartInput {
                product_id: product.id,
                quantity: 3,
            },
        )
        .await
        .expect("add should succeed");

    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity, 3);
    assert_eq!(view.items[0].unit_price, dec!(25.50));
    assert_eq!(view.total, dec!(76.50));
}

#[tokio::test]
async fn adding_same_product_increments_existing_line() {
    let app = TestApp::new().await;
    let carts = &app.state.services.carts;

    let product = app.seed_product(dec!(10.00), Some("price_abc")).await;
    let cart = carts
        .create_cart(CreateCartInput {
            session_id: None,
            currency: None,
        })
        .await
        .expect("cart");

    for _ in 0..2 {
        carts
            .add_item(
                cart.id,
                AddToCartInput {
                    product_id: product.id,
                    quantity: 2,
                },
            )
            .await
            .expect("add should succeed");
    }

    let view = carts.get_cart(cart.id).await.expect("cart view");
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity, 4);
    assert_eq!(view.total, dec!(40.00));
}

#[tokio::test]
async fn add_item_rejects_non_positive_quantity() {
    let app = TestApp::new().await;
    let carts = &app.state.services.carts;

    let product = app.seed_product(dec!(10.00), None).await;
    let cart = carts
        .create_cart(CreateCartInput {
            session_id: None,
            currency: None,
        })
        .await
        .expect("cart");

    let err = carts
        .add_item(
            cart.id,
            AddToCartInput {
                product_id: product.id,
                quantity: 0,
            },
        )
        .await
        .expect_err("zero quantity must be rejected");

    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn update_quantity_below_one_is_a_no_op() {
    let app = TestApp::new().await;
    let carts = &app.state.services.carts;

    let product = app.seed_product(dec!(12.00), None).await;
    let cart = carts
        .create_cart(CreateCartInput {
            session_id: None,
            currency: None,
        })
        .await
        .expect("cart");
    carts
        .add_item(
            cart.id,
            AddToCartInput {
                product_id: product.id,
                quantity: 2,
            },
        )
        .await
        .expect("add");

    let view = carts
        .update_quantity(cart.id, product.id, 0)
        .await
        .expect("no-op update should succeed");

    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity, 2);
    assert_eq!(view.total, dec!(24.00));
}

#[tokio::test]
async fn update_quantity_recomputes_total() {
    let app = TestApp::new().await;
    let carts = &app.state.services.carts;

    let product = app.seed_product(dec!(12.00), None).await;
    let cart = carts
        .create_cart(CreateCartInput {
            session_id: None,
            currency: None,
        })
        .await
        .expect("cart");
    carts
        .add_item(
            cart.id,
            AddToCartInput {
                product_id: product.id,
                quantity: 2,
            },
        )
        .await
        .expect("add");

    let view = carts
        .update_quantity(cart.id, product.id, 5)
        .await
        .expect("update");

    assert_eq!(view.items[0].quantity, 5);
    assert_eq!(view.total, dec!(60.00));
}

#[tokio::test]
async fn remove_item_is_idempotent() {
    let app = TestApp::new().await;
    let carts = &app.state.services.carts;

    let product = app.seed_product(dec!(8.00), None).await;
    let cart = carts
        .create_cart(CreateCartInput {
            session_id: None,
            currency: None,
        })
        .await
        .expect("cart");
    carts
        .add_item(
            cart.id,
            AddToCartInput {
                product_id: product.id,
                quantity: 1,
            },
        )
        .await
        .expect("add");

    let view = carts
        .remove_item(cart.id, product.id)
        .await
        .expect("remove");
    assert!(view.items.is_empty());
    assert_eq!(view.total, Decimal::ZERO);

    // Removing again (and removing something never added) is not an error.
    let view = carts
        .remove_item(cart.id, product.id)
        .await
        .expect("second remove");
    assert!(view.items.is_empty());

    let view = carts
        .remove_item(cart.id, Uuid::new_v4())
        .await
        .expect("remove of absent product");
    assert!(view.items.is_empty());
}

#[tokio::test]
async fn total_is_stable_across_repeated_reads() {
    let app = TestApp::new().await;
    let carts = &app.state.services.carts;

    let book = app.seed_product(dec!(19.99), None).await;
    let kit = app.seed_product(dec!(4.25), None).await;
    let cart = carts
        .create_cart(CreateCartInput {
            session_id: None,
            currency: None,
        })
        .await
        .expect("cart");
    carts
        .add_item(
            cart.id,
            AddToCartInput {
                product_id: book.id,
                quantity: 2,
            },
        )
        .await
        .expect("add");
    carts
        .add_item(
            cart.id,
            AddToCartInput {
                product_id: kit.id,
                quantity: 4,
            },
        )
        .await
        .expect("add");

    let first = carts.get_cart(cart.id).await.expect("read").total;
    let second = carts.get_cart(cart.id).await.expect("read").total;

    assert_eq!(first, dec!(56.98));
    assert_eq!(first, second);
}

#[tokio::test]
async fn clear_cart_empties_items() {
    let app = TestApp::new().await;
    let carts = &app.state.services.carts;

    let product = app.seed_product(dec!(5.00), None).await;
    let cart = carts
        .create_cart(CreateCartInput {
            session_id: None,
            currency: None,
        })
        .await
        .expect("cart");
    carts
        .add_item(
            cart.id,
            AddToCartInput {
                product_id: product.id,
                quantity: 2,
            },
        )
        .await
        .expect("add");

    carts.clear_cart(cart.id).await.expect("clear");

    let view = carts.get_cart(cart.id).await.expect("read");
    assert!(view.items.is_empty());
    assert_eq!(view.total, Decimal::ZERO);
}

#[tokio::test]
async fn operations_on_unknown_cart_fail_with_not_found() {
    let app = TestApp::new().await;
    let carts = &app.state.services.carts;

    let err = carts.get_cart(Uuid::new_v4()).await.expect_err("missing cart");
    assert!(matches!(err, ServiceError::NotFound(_)));

    let err = carts
        .add_item(
            Uuid::new_v4(),
            AddToCartInput {
                product_id: Uuid::new_v4(),
                quantity: 1,
            },
        )
        .await
        .expect_err("missing cart");
    assert!(matches!(err, ServiceError::NotFound(_)));
}
