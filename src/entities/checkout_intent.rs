use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal state of a checkout intent.
///
/// An intent leaves `Pending` exactly once: the fulfiller either resolves it
/// with a provider session or fails it with the provider's error message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum CheckoutIntentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "resolved")]
    Resolved,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// Checkout intent entity.
///
/// Created by the checkout service, mutated exactly once by the fulfillment
/// service, and never deleted (retained for audit).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "checkout_intents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub cart_id: Uuid,
    /// Ordered provider line items, fixed at creation:
    /// `[{ "price": "<stripe price id>", "quantity": n }]`.
    #[sea_orm(column_type = "Json")]
    pub items: Json,
    pub success_url: String,
    pub cancel_url: String,
    pub status: CheckoutIntentStatus,
    #[sea_orm(nullable)]
    pub session_id: Option<String>,
    #[sea_orm(nullable)]
    pub checkout_url: Option<String>,
    #[sea_orm(nullable)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::cart::Entity",
        from = "Column::CartId",
        to = "super::cart::Column::Id"
    )]
    Cart,
}

impl Related<super::cart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cart.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        // An intent never carries both a session and an error.
        if is_set_some(&self.session_id) && is_set_some(&self.error) {
            return Err(DbErr::Custom(
                "checkout intent cannot hold both session_id and error".to_string(),
            ));
        }
        Ok(self)
    }
}

fn is_set_some(value: &ActiveValue<Option<String>>) -> bool {
    matches!(
        value,
        ActiveValue::Set(Some(_)) | ActiveValue::Unchanged(Some(_))
    )
}

/// One provider line item as serialized into [`Model::items`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentLineItem {
    /// Provider price identifier (`price_...`), not our product id.
    pub price: String,
    pub quantity: i32,
}
