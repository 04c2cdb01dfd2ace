use crate::{
    commands::Command,
    db::DbPool,
    entities::{
        due_order,
        order::{self, OrderStatus},
        shipment,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

/// Explicit status override. The value is limited to [`OrderStatus`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderStatusCommand {
    pub order_id: i32,
    pub new_status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusResult {
    pub id: i32,
    pub old_status: OrderStatus,
    pub status: OrderStatus,
    /// Status the ledger state implies; differs from `status` after a manual override
    pub derived_status: OrderStatus,
    pub updated_at: Option<DateTime<Utc>>,
}

#[async_trait::async_trait]
impl Command for UpdateOrderStatusCommand {
    type Result = UpdateOrderStatusResult;

    #[instrument(skip(self, db_pool, event_sender), fields(order_id = self.order_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let txn = db_pool.begin().await?;

        let order = order::Entity::find_by_id(self.order_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(ServiceError::OrderNotFound(self.order_id))?;

        let shipment_count = shipment::Entity::find()
            .filter(shipment::Column::OrderId.eq(self.order_id))
            .count(&txn)
            .await?;
        let due_count = due_order::Entity::find()
            .filter(due_order::Column::OrderId.eq(self.order_id))
            .count(&txn)
            .await?;
        let derived_status = OrderStatus::derive(shipment_count > 0, due_count > 0);

        if derived_status != self.new_status {
            warn!(
                order_id = self.order_id,
                requested = %self.new_status,
                derived = %derived_status,
                "Status override disagrees with the order's ledger state"
            );
        }

        let old_status = order.status;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(self.new_status);
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!(
            order_id = self.order_id,
            old_status = %old_status,
            new_status = %self.new_status,
            "Order status updated"
        );
        if old_status != self.new_status {
            event_sender.publish(Event::OrderStatusChanged {
                order_id: self.order_id,
                old_status,
                new_status: self.new_status,
            });
        }

        Ok(UpdateOrderStatusResult {
            id: updated.id,
            old_status,
            status: updated.status,
            derived_status,
            updated_at: updated.updated_at,
        })
    }
}
