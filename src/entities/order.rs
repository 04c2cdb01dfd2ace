use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Fulfillment status of an order.
///
/// Stored as the literal strings `pending`, `shipped` and `shipped and due`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
    strum::EnumString,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    #[serde(rename = "pending")]
    #[strum(serialize = "pending")]
    #[default]
    Pending,

    #[sea_orm(string_value = "shipped")]
    #[serde(rename = "shipped")]
    #[strum(serialize = "shipped")]
    Shipped,

    #[sea_orm(string_value = "shipped and due")]
    #[serde(rename = "shipped and due")]
    #[strum(serialize = "shipped and due")]
    ShippedAndDue,
}

impl OrderStatus {
    /// Status as a pure function of the order's ledger state.
    pub fn derive(has_shipments: bool, has_due_entries: bool) -> Self {
        match (has_shipments, has_due_entries) {
            (false, _) => OrderStatus::Pending,
            (true, false) => OrderStatus::Shipped,
            (true, true) => OrderStatus::ShippedAndDue,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub customer_id: i32,
    pub customer_name: String,
    pub order_date: NaiveDate,
    pub shipment_due: NaiveDate,
    pub shipment_address: String,
    pub status: OrderStatus,
    /// Σ price × quantity, fixed at creation
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total_price: Decimal,
    /// Number of line items, fixed at creation
    pub item_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
    #[sea_orm(has_many = "super::due_order::Entity")]
    DueOrders,
    #[sea_orm(has_many = "super::shipment::Entity")]
    Shipments,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl Related<super::due_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DueOrders.def()
    }
}

impl Related<super::shipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shipments.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            active_model.created_at = Set(now);
        } else if !matches!(active_model.updated_at, ActiveValue::Set(_)) {
            active_model.updated_at = Set(Some(now));
        }

        Ok(active_model)
    }
}
