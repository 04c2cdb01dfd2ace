use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use super::{customer_name_matches, Query, ShipmentView};
use crate::entities::{order, order::OrderStatus, shipment};
use crate::errors::ServiceError;

/// Narrows a shipment listing by the current status of the owning order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ShipmentFilter {
    /// Orders that are fully shipped
    Completed,
    /// Orders that are shipped but still have items due
    Due,
}

impl ShipmentFilter {
    fn order_status(self) -> OrderStatus {
        match self {
            ShipmentFilter::Completed => OrderStatus::Shipped,
            ShipmentFilter::Due => OrderStatus::ShippedAndDue,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetShipmentQuery {
    pub shipment_id: i32,
}

#[async_trait]
impl Query for GetShipmentQuery {
    type Result = ShipmentView;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        shipment::Entity::find_by_id(self.shipment_id)
            .one(db_pool)
            .await
            .map_err(|e| {
                error!("Database error in GetShipmentQuery: {:?}", e);
                ServiceError::DatabaseError(e)
            })?
            .map(Into::into)
            .ok_or_else(|| ServiceError::NotFound(format!("Shipment {} not found", self.shipment_id)))
    }
}

/// Lists shipments, newest first, optionally filtered by order status.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListShipmentsQuery {
    pub filter: Option<ShipmentFilter>,
}

#[async_trait]
impl Query for ListShipmentsQuery {
    type Result = Vec<ShipmentView>;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let mut select = shipment::Entity::find();
        if let Some(filter) = self.filter {
            select = select
                .join(JoinType::InnerJoin, shipment::Relation::Order.def())
                .filter(order::Column::Status.eq(filter.order_status()));
        }

        let shipments = select
            .order_by_desc(shipment::Column::ShippedDate)
            .order_by_desc(shipment::Column::Id)
            .all(db_pool)
            .await
            .map_err(|e| {
                error!("Database error in ListShipmentsQuery: {:?}", e);
                ServiceError::DatabaseError(e)
            })?;

        Ok(shipments.into_iter().map(Into::into).collect())
    }
}

/// Shipments recorded against one order, in the order they were made.
#[derive(Debug, Serialize, Deserialize)]
pub struct OrderShipmentsQuery {
    pub order_id: i32,
}

#[async_trait]
impl Query for OrderShipmentsQuery {
    type Result = Vec<ShipmentView>;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let exists = order::Entity::find_by_id(self.order_id)
            .count(db_pool)
            .await?
            > 0;
        if !exists {
            return Err(ServiceError::OrderNotFound(self.order_id));
        }

        let shipments = shipment::Entity::find()
            .filter(shipment::Column::OrderId.eq(self.order_id))
            .order_by_asc(shipment::Column::Id)
            .all(db_pool)
            .await
            .map_err(|e| {
                error!("Database error in OrderShipmentsQuery: {:?}", e);
                ServiceError::DatabaseError(e)
            })?;

        Ok(shipments.into_iter().map(Into::into).collect())
    }
}

/// Shipments of every order whose customer name matches, newest first.
#[derive(Debug, Serialize, Deserialize)]
pub struct ShipmentsByCustomerQuery {
    pub customer_name: String,
}

#[async_trait]
impl Query for ShipmentsByCustomerQuery {
    type Result = Vec<ShipmentView>;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let shipments = shipment::Entity::find()
            .join(JoinType::InnerJoin, shipment::Relation::Order.def())
            .filter(customer_name_matches(&self.customer_name)?)
            .order_by_desc(shipment::Column::ShippedDate)
            .order_by_desc(shipment::Column::Id)
            .all(db_pool)
            .await
            .map_err(|e| {
                error!("Database error in ShipmentsByCustomerQuery: {:?}", e);
                ServiceError::DatabaseError(e)
            })?;

        Ok(shipments.into_iter().map(Into::into).collect())
    }
}
