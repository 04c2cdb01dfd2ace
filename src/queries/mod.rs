use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr, SimpleExpr},
    DatabaseConnection,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{
    due_order, order, order::OrderStatus, order_item, shipment, shipment::ShipmentLine,
};
use crate::errors::ServiceError;

pub mod order_queries;
pub mod shipment_queries;

/// Trait representing a generic asynchronous read-only query.
#[async_trait]
pub trait Query: Send + Sync {
    type Result: Send + Sync;

    /// Executes the query using the provided database pool.
    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError>;
}

/// Order header without its line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderSummary {
    pub id: i32,
    pub customer_id: i32,
    pub customer_name: String,
    pub order_date: NaiveDate,
    pub shipment_due: NaiveDate,
    pub shipment_address: String,
    pub status: OrderStatus,
    pub total_price: Decimal,
    pub item_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<order::Model> for OrderSummary {
    fn from(model: order::Model) -> Self {
        Self {
            id: model.id,
            customer_id: model.customer_id,
            customer_name: model.customer_name,
            order_date: model.order_date,
            shipment_due: model.shipment_due,
            shipment_address: model.shipment_address,
            status: model.status,
            total_price: model.total_price,
            item_count: model.item_count,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderItemView {
    pub id: i32,
    pub order_id: i32,
    pub name: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub price: Decimal,
    /// Committed quantity
    pub quantity: i32,
}

impl From<order_item::Model> for OrderItemView {
    fn from(model: order_item::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            name: model.name,
            size: model.size,
            color: model.color,
            price: model.price,
            quantity: model.quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderDetails {
    pub order: OrderSummary,
    pub items: Vec<OrderItemView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShipmentView {
    pub id: i32,
    pub order_id: i32,
    pub shipped_date: NaiveDate,
    pub items: Vec<ShipmentLine>,
    pub is_due_clearance: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<shipment::Model> for ShipmentView {
    fn from(model: shipment::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            shipped_date: model.shipped_date,
            items: model.items.0,
            is_due_clearance: model.is_due_clearance,
            idempotency_key: model.idempotency_key,
            created_at: model.created_at,
        }
    }
}

/// Outstanding quantity of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DueItem {
    pub item_id: i32,
    pub quantity: i32,
}

impl From<due_order::Model> for DueItem {
    fn from(model: due_order::Model) -> Self {
        Self {
            item_id: model.item_id,
            quantity: model.quantity,
        }
    }
}

/// Case-insensitive substring match on `orders.customer_name`.
///
/// `%`, `_` and `\` in `name` match literally.
pub(crate) fn customer_name_matches(name: &str) -> Result<SimpleExpr, ServiceError> {
    let needle = name.trim();
    if needle.is_empty() {
        return Err(ServiceError::ValidationError(
            "customer_name must not be blank".to_string(),
        ));
    }

    let escaped = needle
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Ok(
        Expr::expr(Func::lower(Expr::col((order::Entity, order::Column::CustomerName))))
            .like(LikeExpr::new(format!("%{}%", escaped)).escape('\\')),
    )
}
