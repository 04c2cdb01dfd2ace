use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::entities::order::OrderStatus;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Publishes an event for an operation that has already committed.
    ///
    /// Never waits on the consumer: callers may still hold an order lock. A
    /// full or closed channel drops the event and is only logged.
    pub fn publish(&self, event: Event) {
        if let Err(e) = self.sender.try_send(event) {
            metrics::counter!("fulfillment.events.dropped", 1);
            warn!(error = %e, "Failed to publish domain event");
        }
    }
}

/// Domain events emitted after a transaction commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(i32),
    OrderDeleted(i32),
    OrderStatusChanged {
        order_id: i32,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    ShipmentReconciled {
        shipment_id: i32,
        order_id: i32,
        is_due_clearance: bool,
        new_status: OrderStatus,
    },
    ShipmentDeleted {
        shipment_id: i32,
        order_id: i32,
    },
}

/// Consumes events until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        metrics::counter!("fulfillment.events.processed", 1);
        match event {
            Event::OrderCreated(order_id) => {
                info!(order_id, "Order created");
            }
            Event::OrderDeleted(order_id) => {
                info!(order_id, "Order deleted");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(order_id, %old_status, %new_status, "Order status changed");
            }
            Event::ShipmentReconciled {
                shipment_id,
                order_id,
                is_due_clearance,
                new_status,
            } => {
                info!(
                    shipment_id,
                    order_id,
                    is_due_clearance,
                    %new_status,
                    "Shipment reconciled"
                );
            }
            Event::ShipmentDeleted {
                shipment_id,
                order_id,
            } => {
                info!(shipment_id, order_id, "Shipment deleted; order reset to pending");
            }
        }
    }

    info!("Event channel closed; event processing stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_on_closed_channel_does_not_fail() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        // Only logged
        sender.publish(Event::OrderCreated(1));
    }

    #[tokio::test]
    async fn publish_does_not_wait_for_a_full_channel() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = EventSender::new(tx);

        sender.publish(Event::OrderCreated(1));
        // Channel is full; the second event is dropped instead of awaited
        sender.publish(Event::OrderCreated(2));

        assert_eq!(rx.recv().await, Some(Event::OrderCreated(1)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn processor_drains_and_stops_when_senders_drop() {
        let (tx, rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        sender.publish(Event::ShipmentDeleted {
            shipment_id: 3,
            order_id: 1,
        });
        drop(sender);

        tokio::time::timeout(std::time::Duration::from_secs(1), process_events(rx))
            .await
            .expect("processor should stop once the channel closes");
    }
}
