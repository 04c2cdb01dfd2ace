use crate::{
    commands::orders::{
        CreateOrderCommand, DeleteOrderCommand, UpdateOrderStatusCommand, UpdateOrderStatusResult,
    },
    commands::Command,
    db::DbPool,
    entities::order::OrderStatus,
    errors::ServiceError,
    events::EventSender,
    queries::{
        order_queries::{GetItemQuery, GetOrderQuery, ListOrdersQuery, OrdersByCustomerQuery},
        OrderDetails, OrderItemView, OrderSummary, Query,
    },
    services::order_locks::OrderLocks,
};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::instrument;

/// Service for creating, reading and administering orders
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    locks: OrderLocks,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, locks: OrderLocks) -> Self {
        Self {
            db_pool,
            event_sender,
            locks,
        }
    }

    /// Creates an order with its items in one transaction; status starts `pending`.
    #[instrument(skip(self, command), fields(customer_id = command.customer_id))]
    pub async fn create_order(
        &self,
        command: CreateOrderCommand,
    ) -> Result<OrderDetails, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: i32) -> Result<OrderDetails, ServiceError> {
        GetOrderQuery { order_id }.execute(&self.db_pool).await
    }

    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<OrderSummary>, ServiceError> {
        ListOrdersQuery.execute(&self.db_pool).await
    }

    /// Orders whose customer name contains `customer_name`, ignoring case.
    #[instrument(skip(self))]
    pub async fn order_history(
        &self,
        customer_name: &str,
        order_date: Option<NaiveDate>,
    ) -> Result<Vec<OrderDetails>, ServiceError> {
        OrdersByCustomerQuery {
            customer_name: customer_name.to_string(),
            order_date,
        }
        .execute(&self.db_pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn get_item(&self, item_id: i32) -> Result<OrderItemView, ServiceError> {
        GetItemQuery { item_id }.execute(&self.db_pool).await
    }

    /// Manual status override
    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: i32,
        new_status: OrderStatus,
    ) -> Result<UpdateOrderStatusResult, ServiceError> {
        let _guard = self.locks.acquire(order_id).await;
        UpdateOrderStatusCommand {
            order_id,
            new_status,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    /// Cascading delete of the order and everything recorded against it.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: i32) -> Result<(), ServiceError> {
        let _guard = self.locks.acquire(order_id).await;
        DeleteOrderCommand { order_id }
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }
}
