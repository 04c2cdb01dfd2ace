use crate::{
    commands::Command,
    db::DbPool,
    entities::{due_order, order, order_item, shipment},
    errors::ServiceError,
    events::{Event, EventSender},
};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, QuerySelect,
    TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Removes an order together with its due entries, shipments and items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteOrderCommand {
    pub order_id: i32,
}

#[async_trait::async_trait]
impl Command for DeleteOrderCommand {
    type Result = ();

    #[instrument(skip(self, db_pool, event_sender), fields(order_id = self.order_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.delete_order(db_pool.as_ref()).await?;

        info!(order_id = self.order_id, "Order deleted");
        event_sender.publish(Event::OrderDeleted(self.order_id));

        Ok(())
    }
}

impl DeleteOrderCommand {
    async fn delete_order(&self, db: &DatabaseConnection) -> Result<(), ServiceError> {
        let order_id = self.order_id;

        db.transaction::<_, (), ServiceError>(move |txn| {
            Box::pin(async move {
                let order = order::Entity::find_by_id(order_id)
                    .lock_exclusive()
                    .one(txn)
                    .await?
                    .ok_or(ServiceError::OrderNotFound(order_id))?;

                // Children first so foreign keys never dangle
                due_order::Entity::delete_many()
                    .filter(due_order::Column::OrderId.eq(order_id))
                    .exec(txn)
                    .await?;
                shipment::Entity::delete_many()
                    .filter(shipment::Column::OrderId.eq(order_id))
                    .exec(txn)
                    .await?;
                order_item::Entity::delete_many()
                    .filter(order_item::Column::OrderId.eq(order_id))
                    .exec(txn)
                    .await?;

                order.delete(txn).await.map_err(|e| {
                    error!("Failed to delete order {}: {}", order_id, e);
                    ServiceError::DatabaseError(e)
                })?;

                Ok(())
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
            TransactionError::Transaction(service_err) => service_err,
        })
    }
}
