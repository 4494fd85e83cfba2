use crate::{
    entities::{cart, cart_item, product, Cart, CartItem, CartModel, Product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Shopping cart service.
///
/// Carts are the only component of the checkout flow without external I/O:
/// they accumulate line items and derive a running total. The total is
/// recomputed from the items on every read and never cached on the cart row.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    default_currency: String,
}

impl CartService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        default_currency: String,
    ) -> Self {
        Self {
            db,
            event_sender,
            default_currency,
        }
    }

    /// Creates a new active cart.
    #[instrument(skip(self))]
    pub async fn create_cart(&self, input: CreateCartInput) -> Result<CartModel, ServiceError> {
        let cart_id = Uuid::new_v4();

        let cart = cart::ActiveModel {
            id: Set(cart_id),
            session_id: Set(input.session_id),
            currency: Set(input
                .currency
                .unwrap_or_else(|| self.default_currency.clone())),
            status: Set(cart::CartStatus::Active),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        let cart = cart.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CartCreated(cart_id))
            .await;

        info!("Created cart: {}", cart_id);
        Ok(cart)
    }

    /// Adds an item to the cart or increments the existing line for the same
    /// product.
    ///
    /// The product's current price is snapshotted onto the line item. Stock is
    /// advisory only and not checked here.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        cart_id: Uuid,
        input: AddToCartInput,
    ) -> Result<CartWithItems, ServiceError> {
        if input.quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be a positive integer".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let cart = Cart::find_by_id(cart_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        if cart.status != cart::CartStatus::Active {
            return Err(ServiceError::InvalidOperation(
                "Cart is not active".to_string(),
            ));
        }

        let prod = Product::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        let existing_item = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .one(&txn)
            .await?;

        if let Some(item) = existing_item {
            let current_quantity = item.quantity;
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(current_quantity + input.quantity);
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
        } else {
            let cart_item = cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart_id),
                product_id: Set(input.product_id),
                quantity: Set(input.quantity),
                unit_price: Set(prod.price),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
            };
            cart_item.insert(&txn).await?;
        }

        self.touch_cart(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id,
                product_id: input.product_id,
            })
            .await;

        info!(
            "Added item to cart {}: product {} x{}",
            cart_id, input.product_id, input.quantity
        );
        self.get_cart(cart_id).await
    }

    /// Updates the quantity of a cart line.
    ///
    /// A quantity below 1 is a no-op: callers must remove the line explicitly
    /// via [`Self::remove_item`].
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartWithItems, ServiceError> {
        if quantity < 1 {
            return self.get_cart(cart_id).await;
        }

        let txn = self.db.begin().await?;

        let cart = Cart::find_by_id(cart_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        let item = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} is not in the cart", product_id))
            })?;

        let mut item: cart_item::ActiveModel = item.into();
        item.quantity = Set(quantity);
        item.updated_at = Set(Utc::now());
        item.update(&txn).await?;

        self.touch_cart(&txn, cart).await?;
        txn.commit().await?;

        self.get_cart(cart_id).await
    }

    /// Removes a line from the cart. Absent lines are not an error.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        cart_id: Uuid,
        product_id: Uuid,
    ) -> Result<CartWithItems, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = Cart::find_by_id(cart_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;

        self.touch_cart(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id,
                product_id,
            })
            .await;

        self.get_cart(cart_id).await
    }

    /// Retrieves a cart with its items and the derived total.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, cart_id: Uuid) -> Result<CartWithItems, ServiceError> {
        let cart = Cart::find_by_id(cart_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        let items = cart
            .find_related(CartItem)
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let total = items_total(&items);
        Ok(CartWithItems { cart, items, total })
    }

    /// Loads the cart's items joined with their products, in insertion order.
    pub async fn items_with_products(
        &self,
        cart_id: Uuid,
    ) -> Result<Vec<(cart_item::Model, Option<product::Model>)>, ServiceError> {
        Ok(CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .find_also_related(Product)
            .all(&*self.db)
            .await?)
    }

    /// Deletes all items from the cart. Called once checkout is confirmed.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, cart_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let cart = Cart::find_by_id(cart_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .exec(&txn)
            .await?;

        self.touch_cart(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartCleared(cart_id))
            .await;

        info!("Cleared cart: {}", cart_id);
        Ok(())
    }

    /// Marks the cart as converted after its intent resolved to a session.
    pub async fn mark_converted(&self, cart_id: Uuid) -> Result<(), ServiceError> {
        let cart = Cart::find_by_id(cart_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        let mut active: cart::ActiveModel = cart.into();
        active.status = Set(cart::CartStatus::Converted);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;
        Ok(())
    }

    async fn touch_cart(
        &self,
        conn: &impl sea_orm::ConnectionTrait,
        cart: CartModel,
    ) -> Result<(), ServiceError> {
        let mut active: cart::ActiveModel = cart.into();
        active.updated_at = Set(Utc::now());
        active.update(conn).await?;
        Ok(())
    }
}

/// Sum of `unit_price * quantity` over the cart's lines.
pub fn items_total(items: &[cart_item::Model]) -> Decimal {
    items
        .iter()
        .map(|item| item.unit_price * Decimal::from(item.quantity))
        .sum()
}

/// Input for creating a cart
#[derive(Debug, Deserialize)]
pub struct CreateCartInput {
    pub session_id: Option<String>,
    pub currency: Option<String>,
}

/// Input for adding an item to a cart
#[derive(Debug, Deserialize)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Cart with items and the derived total
#[derive(Debug, Serialize)]
pub struct CartWithItems {
    pub cart: CartModel,
    pub items: Vec<cart_item::Model>,
    pub total: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn item(unit_price: Decimal, quantity: i32) -> cart_item::Model {
        cart_item::Model {
            id: Uuid::new_v4(),
            cart_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity,
            unit_price,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn total_of_empty_cart_is_zero() {
        assert_eq!(items_total(&[]), Decimal::ZERO);
    }

    #[test]
    fn total_sums_price_times_quantity() {
        let items = vec![item(dec!(25.50), 3), item(dec!(9.99), 1)];
        assert_eq!(items_total(&items), dec!(86.49));
    }

    proptest! {
        /// The cart total equals the sum of price*quantity and is stable
        /// across repeated reads of the same items.
        #[test]
        fn total_matches_sum_and_is_idempotent(
            lines in prop::collection::vec((1u64..1_000_000, 1i32..100), 0..12)
        ) {
            let items: Vec<_> = lines
                .iter()
                .map(|&(cents, qty)| item(Decimal::new(cents as i64, 2), qty))
                .collect();

            let expected: Decimal = lines
                .iter()
                .map(|&(cents, qty)| Decimal::new(cents as i64, 2) * Decimal::from(qty))
                .sum();

            prop_assert_eq!(items_total(&items), expected);
            prop_assert_eq!(items_total(&items), items_total(&items));
        }
    }
}
