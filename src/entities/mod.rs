//! Persistent entities for the checkout domain.

pub mod cart;
pub mod cart_item;
pub mod checkout_intent;
pub mod order;
pub mod product;

// Re-export entities
pub use cart::{CartStatus, Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use checkout_intent::{
    CheckoutIntentStatus, Entity as CheckoutIntent, IntentLineItem, Model as CheckoutIntentModel,
};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus};
pub use product::{Entity as Product, Model as ProductModel};
