use crate::{
    commands::Command,
    db::DbPool,
    entities::{
        due_order,
        order::{self, OrderStatus},
        order_item,
        shipment::{self, ShipmentItems, ShipmentLine},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    reconciliation::{self, LedgerSnapshot, ReconciliationPlan},
};
use chrono::NaiveDate;
use metrics::{counter, histogram};
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

/// A proposed shipment against one order.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReconcileShipmentCommand {
    pub order_id: i32,
    pub shipped_date: NaiveDate,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<ShipmentLine>,
    /// Settles the order's outstanding due entries instead of shipping fresh quantities
    #[serde(default)]
    pub is_due_clearance: bool,
    /// Replaying the same key on the same order returns the recorded shipment
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReconcileOutcome {
    pub shipment_id: i32,
    pub order_id: i32,
    pub status: OrderStatus,
    /// True when an earlier shipment with the same idempotency key was returned
    pub replayed: bool,
}

fn transaction_failure(e: DbErr) -> ServiceError {
    ServiceError::transaction_failure(e)
}

#[async_trait::async_trait]
impl Command for ReconcileShipmentCommand {
    type Result = ReconcileOutcome;

    #[instrument(
        skip(self, db_pool, event_sender),
        fields(order_id = self.order_id, is_due_clearance = self.is_due_clearance)
    )]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate_proposal()?;

        let mode = if self.is_due_clearance {
            "due_clearance"
        } else {
            "fresh"
        };
        let start = Instant::now();
        let result = self.reconcile(db_pool.as_ref()).await;
        histogram!("fulfillment.reconcile.duration", start.elapsed(), "mode" => mode);

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                counter!("fulfillment.reconcile.rejected", 1, "mode" => mode);
                warn!(error = %e, "Shipment reconciliation failed");
                return Err(e);
            }
        };

        if outcome.replayed {
            counter!("fulfillment.reconcile.replayed", 1, "mode" => mode);
            info!(
                shipment_id = outcome.shipment_id,
                "Idempotency key matched an existing shipment"
            );
            return Ok(outcome);
        }

        counter!("fulfillment.reconcile.accepted", 1, "mode" => mode);
        info!(
            shipment_id = outcome.shipment_id,
            new_status = %outcome.status,
            "Shipment reconciled"
        );
        event_sender.publish(Event::ShipmentReconciled {
            shipment_id: outcome.shipment_id,
            order_id: self.order_id,
            is_due_clearance: self.is_due_clearance,
            new_status: outcome.status,
        });

        Ok(outcome)
    }
}

impl ReconcileShipmentCommand {
    /// Checks that need no database access.
    pub fn validate_proposal(&self) -> Result<(), ServiceError> {
        self.validate()?;
        reconciliation::validate_lines(&self.items)?;
        if matches!(&self.idempotency_key, Some(key) if key.trim().is_empty()) {
            return Err(ServiceError::ValidationError(
                "idempotency_key must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    /// Runs the whole proposal in one transaction.
    ///
    /// Returning early drops `txn`, which rolls every write back.
    async fn reconcile(&self, db: &DatabaseConnection) -> Result<ReconcileOutcome, ServiceError> {
        let txn = db.begin().await.map_err(transaction_failure)?;

        // Row lock first: serialises writers across processes sharing the database
        let order = order::Entity::find_by_id(self.order_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(transaction_failure)?
            .ok_or(ServiceError::OrderNotFound(self.order_id))?;

        if let Some(replayed) = self.find_replay(&txn, &order).await? {
            return Ok(replayed);
        }

        let snapshot = load_snapshot(&txn, &order).await?;
        let plan = reconciliation::plan(&snapshot, &self.items, self.is_due_clearance)?;
        debug!(?plan, "Reconciliation plan accepted");

        apply_plan(&txn, self.order_id, &plan).await?;

        let recorded = shipment::ActiveModel {
            order_id: Set(self.order_id),
            shipped_date: Set(self.shipped_date),
            items: Set(ShipmentItems(self.items.clone())),
            is_due_clearance: Set(self.is_due_clearance),
            idempotency_key: Set(self.idempotency_key.clone()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(transaction_failure)?;

        let mut active: order::ActiveModel = order.into();
        active.status = Set(plan.new_status);
        active.update(&txn).await.map_err(transaction_failure)?;

        txn.commit().await.map_err(transaction_failure)?;

        Ok(ReconcileOutcome {
            shipment_id: recorded.id,
            order_id: self.order_id,
            status: plan.new_status,
            replayed: false,
        })
    }

    async fn find_replay(
        &self,
        txn: &DatabaseTransaction,
        order: &order::Model,
    ) -> Result<Option<ReconcileOutcome>, ServiceError> {
        let Some(key) = self.idempotency_key.as_deref() else {
            return Ok(None);
        };

        let existing = shipment::Entity::find()
            .filter(shipment::Column::IdempotencyKey.eq(key))
            .one(txn)
            .await
            .map_err(transaction_failure)?;

        match existing {
            None => Ok(None),
            Some(found) if found.order_id == order.id => Ok(Some(ReconcileOutcome {
                shipment_id: found.id,
                order_id: order.id,
                status: order.status,
                replayed: true,
            })),
            Some(found) => Err(ServiceError::Conflict(format!(
                "idempotency key '{}' already used by shipment {} on order {}",
                key, found.id, found.order_id
            ))),
        }
    }
}

/// Reads committed, due and shipped quantities of `order` inside `txn`.
async fn load_snapshot(
    txn: &DatabaseTransaction,
    order: &order::Model,
) -> Result<LedgerSnapshot, ServiceError> {
    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order.id))
        .all(txn)
        .await
        .map_err(transaction_failure)?;
    let due = due_order::Entity::find()
        .filter(due_order::Column::OrderId.eq(order.id))
        .all(txn)
        .await
        .map_err(transaction_failure)?;
    let shipments = shipment::Entity::find()
        .filter(shipment::Column::OrderId.eq(order.id))
        .all(txn)
        .await
        .map_err(transaction_failure)?;

    let mut snapshot = LedgerSnapshot {
        order_id: order.id,
        status: order.status,
        committed: items.iter().map(|item| (item.id, item.quantity)).collect(),
        due: due.iter().map(|entry| (entry.item_id, entry.quantity)).collect(),
        shipment_count: shipments.len(),
        ..Default::default()
    };
    for line in shipments.iter().flat_map(|s| s.items.iter()) {
        let shipped = snapshot.shipped.entry(line.item_id).or_insert(0);
        *shipped = shipped.saturating_add(line.quantity);
    }

    Ok(snapshot)
}

async fn apply_plan(
    txn: &DatabaseTransaction,
    order_id: i32,
    plan: &ReconciliationPlan,
) -> Result<(), ServiceError> {
    if !plan.removals.is_empty() {
        due_order::Entity::delete_many()
            .filter(due_order::Column::OrderId.eq(order_id))
            .filter(due_order::Column::ItemId.is_in(plan.removals.clone()))
            .exec(txn)
            .await
            .map_err(transaction_failure)?;
    }

    for &(item_id, quantity) in &plan.upserts {
        due_order::Entity::insert(due_order::ActiveModel {
            order_id: Set(order_id),
            item_id: Set(item_id),
            quantity: Set(quantity),
        })
        .on_conflict(
            OnConflict::columns([due_order::Column::OrderId, due_order::Column::ItemId])
                .update_column(due_order::Column::Quantity)
                .to_owned(),
        )
        .exec_without_returning(txn)
        .await
        .map_err(transaction_failure)?;
    }

    Ok(())
}
