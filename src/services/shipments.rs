use crate::{
    commands::shipments::{DeleteShipmentCommand, ReconcileOutcome, ReconcileShipmentCommand},
    commands::Command,
    db::DbPool,
    entities::shipment,
    errors::ServiceError,
    events::EventSender,
    middleware_helpers::retry::{with_retry, RetryConfig, TransactionRetryPolicy},
    queries::{
        order_queries::DueItemsQuery,
        shipment_queries::{
            GetShipmentQuery, ListShipmentsQuery, OrderShipmentsQuery, ShipmentFilter,
            ShipmentsByCustomerQuery,
        },
        DueItem, Query, ShipmentView,
    },
    services::order_locks::OrderLocks,
};
use sea_orm::EntityTrait;
use std::sync::Arc;
use tracing::instrument;

/// Service for reconciling and reading shipments
#[derive(Clone)]
pub struct ShipmentService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    locks: OrderLocks,
    retry: RetryConfig,
}

impl ShipmentService {
    /// Creates a new shipment service instance
    ///
    /// `locks` must be shared with every other service that mutates orders.
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        locks: OrderLocks,
        retry: RetryConfig,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            locks,
            retry,
        }
    }

    /// Validates and applies a proposed shipment under the order's lock.
    ///
    /// A `TransactionFailure` is retried once; business rejections are final.
    #[instrument(skip(self, command), fields(order_id = command.order_id))]
    pub async fn reconcile_shipment(
        &self,
        command: ReconcileShipmentCommand,
    ) -> Result<ReconcileOutcome, ServiceError> {
        command.validate_proposal()?;

        let command = &command;
        let db_pool = &self.db_pool;
        let event_sender = &self.event_sender;
        let locks = &self.locks;

        with_retry(&self.retry, TransactionRetryPolicy, move || async move {
            let _guard = locks.acquire(command.order_id).await;
            command
                .execute(db_pool.clone(), event_sender.clone())
                .await
        })
        .await
    }

    /// Deletes a shipment and resets its order to `pending`.
    #[instrument(skip(self))]
    pub async fn delete_shipment(&self, shipment_id: i32) -> Result<(), ServiceError> {
        let order_id = shipment::Entity::find_by_id(shipment_id)
            .one(&*self.db_pool)
            .await?
            .map(|s| s.order_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Shipment {} not found", shipment_id)))?;

        let _guard = self.locks.acquire(order_id).await;
        DeleteShipmentCommand { shipment_id }
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await?;
        Ok(())
    }

    /// Outstanding quantities of an order, ordered by item id.
    #[instrument(skip(self))]
    pub async fn query_due_items(&self, order_id: i32) -> Result<Vec<DueItem>, ServiceError> {
        DueItemsQuery { order_id }.execute(&self.db_pool).await
    }

    #[instrument(skip(self))]
    pub async fn get_shipment(&self, shipment_id: i32) -> Result<ShipmentView, ServiceError> {
        GetShipmentQuery { shipment_id }.execute(&self.db_pool).await
    }

    #[instrument(skip(self))]
    pub async fn list_shipments(
        &self,
        filter: Option<ShipmentFilter>,
    ) -> Result<Vec<ShipmentView>, ServiceError> {
        ListShipmentsQuery { filter }.execute(&self.db_pool).await
    }

    #[instrument(skip(self))]
    pub async fn shipments_for_order(
        &self,
        order_id: i32,
    ) -> Result<Vec<ShipmentView>, ServiceError> {
        OrderShipmentsQuery { order_id }.execute(&self.db_pool).await
    }

    /// Shipment history of every order whose customer name contains `customer_name`.
    #[instrument(skip(self))]
    pub async fn shipments_for_customer(
        &self,
        customer_name: &str,
    ) -> Result<Vec<ShipmentView>, ServiceError> {
        ShipmentsByCustomerQuery {
            customer_name: customer_name.to_string(),
        }
        .execute(&self.db_pool)
        .await
    }
}
