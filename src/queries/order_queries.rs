use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::error;

use super::{customer_name_matches, DueItem, OrderDetails, OrderItemView, OrderSummary, Query};
use crate::entities::{due_order, order, order_item};
use crate::errors::ServiceError;

/// Fetches one order together with its committed items.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetOrderQuery {
    pub order_id: i32,
}

#[async_trait]
impl Query for GetOrderQuery {
    type Result = OrderDetails;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let order = order::Entity::find_by_id(self.order_id)
            .one(db_pool)
            .await
            .map_err(|e| {
                error!("Database error in GetOrderQuery: {:?}", e);
                ServiceError::DatabaseError(e)
            })?
            .ok_or(ServiceError::OrderNotFound(self.order_id))?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(self.order_id))
            .order_by_asc(order_item::Column::Id)
            .all(db_pool)
            .await?;

        Ok(OrderDetails {
            order: order.into(),
            items: items.into_iter().map(Into::into).collect(),
        })
    }
}

/// Lists every order, newest order date first.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListOrdersQuery;

#[async_trait]
impl Query for ListOrdersQuery {
    type Result = Vec<OrderSummary>;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let orders = order::Entity::find()
            .order_by_desc(order::Column::OrderDate)
            .order_by_desc(order::Column::Id)
            .all(db_pool)
            .await
            .map_err(|e| {
                error!("Database error in ListOrdersQuery: {:?}", e);
                ServiceError::DatabaseError(e)
            })?;

        Ok(orders.into_iter().map(Into::into).collect())
    }
}

/// Outstanding quantities of an order, ordered by item id.
///
/// Unknown orders simply have nothing due.
#[derive(Debug, Serialize, Deserialize)]
pub struct DueItemsQuery {
    pub order_id: i32,
}

#[async_trait]
impl Query for DueItemsQuery {
    type Result = Vec<DueItem>;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let due = due_order::Entity::find()
            .filter(due_order::Column::OrderId.eq(self.order_id))
            .order_by_asc(due_order::Column::ItemId)
            .all(db_pool)
            .await
            .map_err(|e| {
                error!("Database error in DueItemsQuery: {:?}", e);
                ServiceError::DatabaseError(e)
            })?;

        Ok(due.into_iter().map(Into::into).collect())
    }
}

/// Fetches one committed item by id, whichever order it belongs to.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetItemQuery {
    pub item_id: i32,
}

#[async_trait]
impl Query for GetItemQuery {
    type Result = OrderItemView;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        order_item::Entity::find_by_id(self.item_id)
            .one(db_pool)
            .await
            .map_err(|e| {
                error!("Database error in GetItemQuery: {:?}", e);
                ServiceError::DatabaseError(e)
            })?
            .map(Into::into)
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", self.item_id)))
    }
}

/// Order history of a customer, newest order date first.
///
/// `customer_name` matches case-insensitively anywhere in the stored name;
/// `order_date` narrows the history to a single day.
#[derive(Debug, Serialize, Deserialize)]
pub struct OrdersByCustomerQuery {
    pub customer_name: String,
    pub order_date: Option<NaiveDate>,
}

#[async_trait]
impl Query for OrdersByCustomerQuery {
    type Result = Vec<OrderDetails>;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let mut select = order::Entity::find().filter(customer_name_matches(&self.customer_name)?);
        if let Some(order_date) = self.order_date {
            select = select.filter(order::Column::OrderDate.eq(order_date));
        }

        let orders = select
            .order_by_desc(order::Column::OrderDate)
            .order_by_desc(order::Column::Id)
            .all(db_pool)
            .await
            .map_err(|e| {
                error!("Database error in OrdersByCustomerQuery: {:?}", e);
                ServiceError::DatabaseError(e)
            })?;
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<i32> = orders.iter().map(|order| order.id).collect();
        let mut items_by_order: HashMap<i32, Vec<OrderItemView>> = HashMap::new();
        for item in order_item::Entity::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .order_by_asc(order_item::Column::Id)
            .all(db_pool)
            .await?
        {
            items_by_order
                .entry(item.order_id)
                .or_default()
                .push(item.into());
        }

        Ok(orders
            .into_iter()
            .map(|order| OrderDetails {
                items: items_by_order.remove(&order.id).unwrap_or_default(),
                order: order.into(),
            })
            .collect())
    }
}
