use crate::{
    commands::Command,
    db::DbPool,
    entities::{
        order::{self, OrderStatus},
        shipment,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use sea_orm::{ActiveModelTrait, EntityTrait, ModelTrait, QuerySelect, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{instrument, warn};

/// Deletes one shipment and resets the owning order to `pending`.
///
/// The due ledger is left as it is; it is not rebuilt from the remaining
/// shipments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteShipmentCommand {
    pub shipment_id: i32,
}

#[async_trait::async_trait]
impl Command for DeleteShipmentCommand {
    /// Id of the order the shipment belonged to
    type Result = i32;

    #[instrument(skip(self, db_pool, event_sender), fields(shipment_id = self.shipment_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let txn = db_pool.begin().await?;

        let shipment = shipment::Entity::find_by_id(self.shipment_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Shipment {} not found", self.shipment_id))
            })?;
        let order_id = shipment.order_id;

        let order = order::Entity::find_by_id(order_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))?;

        shipment.delete(&txn).await?;

        let old_status = order.status;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Pending);
        active.update(&txn).await?;

        txn.commit().await?;

        warn!(
            shipment_id = self.shipment_id,
            order_id,
            %old_status,
            "Shipment deleted; order reset to pending without rebuilding its due ledger"
        );

        event_sender.publish(Event::ShipmentDeleted {
            shipment_id: self.shipment_id,
            order_id,
        });
        if old_status != OrderStatus::Pending {
            event_sender.publish(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status: OrderStatus::Pending,
            });
        }

        Ok(order_id)
    }
}
