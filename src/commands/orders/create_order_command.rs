use crate::{
    commands::{validate_not_blank, Command},
    db::DbPool,
    entities::{
        order::{self, OrderStatus},
        order_item,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    queries::{OrderDetails, OrderItemView},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set, TransactionError, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderCommand {
    pub customer_id: i32,
    #[validate(custom = "validate_not_blank")]
    pub customer_name: String,
    pub order_date: NaiveDate,
    /// Requested ship-by date
    pub shipment_due: NaiveDate,
    #[validate(custom = "validate_not_blank")]
    pub shipment_address: String,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<CreateOrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderItem {
    #[validate(custom = "validate_not_blank")]
    pub name: String,
    pub size: Option<String>,
    pub color: Option<String>,
    #[validate(custom = "validate_price")]
    pub price: Decimal,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        let mut err = ValidationError::new("price");
        err.message = Some("price must not be negative".into());
        return Err(err);
    }
    Ok(())
}

#[async_trait::async_trait]
impl Command for CreateOrderCommand {
    type Result = OrderDetails;

    #[instrument(skip(self, db_pool, event_sender), fields(customer_id = self.customer_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate_all().map_err(|e| {
            metrics::counter!("fulfillment.orders.create_failures", 1);
            error!("Invalid order: {}", e);
            e
        })?;

        let (saved_order, saved_items) = self.create_order(db_pool.as_ref()).await?;

        info!(
            order_id = saved_order.id,
            customer_id = self.customer_id,
            items_count = saved_items.len(),
            "Order created successfully"
        );
        metrics::counter!("fulfillment.orders.created", 1);
        event_sender.publish(Event::OrderCreated(saved_order.id));

        Ok(OrderDetails {
            order: saved_order.into(),
            items: saved_items.into_iter().map(OrderItemView::from).collect(),
        })
    }
}

impl CreateOrderCommand {
    /// Field-level rules plus the ones spanning fields and nested items.
    pub fn validate_all(&self) -> Result<(), ServiceError> {
        self.validate()?;
        for item in &self.items {
            item.validate()?;
        }
        if self.shipment_due < self.order_date {
            return Err(ServiceError::ValidationError(format!(
                "shipment_due {} is before order_date {}",
                self.shipment_due, self.order_date
            )));
        }
        self.total_price()?;
        Ok(())
    }

    /// Σ price × quantity over all items, rejecting totals `Decimal` cannot hold.
    pub fn total_price(&self) -> Result<Decimal, ServiceError> {
        self.items.iter().try_fold(Decimal::ZERO, |total, item| {
            item.price
                .checked_mul(Decimal::from(item.quantity))
                .and_then(|line_total| total.checked_add(line_total))
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "order total overflows at item '{}'",
                        item.name
                    ))
                })
        })
    }

    async fn create_order(
        &self,
        db: &DatabaseConnection,
    ) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
        let command = self.clone();
        let total_price = self.total_price()?;

        db.transaction::<_, (order::Model, Vec<order_item::Model>), ServiceError>(move |txn| {
            Box::pin(async move {
                let new_order = order::ActiveModel {
                    customer_id: Set(command.customer_id),
                    customer_name: Set(command.customer_name.trim().to_string()),
                    order_date: Set(command.order_date),
                    shipment_due: Set(command.shipment_due),
                    shipment_address: Set(command.shipment_address.trim().to_string()),
                    status: Set(OrderStatus::Pending),
                    total_price: Set(total_price),
                    item_count: Set(command.items.len() as i32),
                    updated_at: Set(None),
                    ..Default::default()
                };

                let saved_order = new_order.insert(txn).await.map_err(|e| {
                    error!(
                        "Failed to create order for customer {}: {}",
                        command.customer_id, e
                    );
                    ServiceError::DatabaseError(e)
                })?;

                let mut saved_items = Vec::with_capacity(command.items.len());
                for item in &command.items {
                    let new_item = order_item::ActiveModel {
                        order_id: Set(saved_order.id),
                        name: Set(item.name.trim().to_string()),
                        size: Set(item.size.clone()),
                        color: Set(item.color.clone()),
                        price: Set(item.price),
                        quantity: Set(item.quantity),
                        ..Default::default()
                    };
                    let saved = new_item.insert(txn).await.map_err(|e| {
                        error!(
                            "Failed to create order item for order {}: {}",
                            saved_order.id, e
                        );
                        ServiceError::DatabaseError(e)
                    })?;
                    saved_items.push(saved);
                }

                Ok((saved_order, saved_items))
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
            TransactionError::Transaction(service_err) => service_err,
        })
    }
}
