pub mod orders;
pub mod shipments;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::middleware_helpers::retry::RetryConfig;
use crate::services::{order_locks::OrderLocks, orders::OrderService, shipments::ShipmentService};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub shipments: Arc<ShipmentService>,
    pub locks: OrderLocks,
}

impl AppServices {
    /// Builds both services around one shared set of order locks.
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, retry: RetryConfig) -> Self {
        let locks = OrderLocks::default();

        let orders = Arc::new(OrderService::new(
            db_pool.clone(),
            event_sender.clone(),
            locks.clone(),
        ));
        let shipments = Arc::new(ShipmentService::new(
            db_pool,
            event_sender,
            locks.clone(),
            retry,
        ));

        Self {
            orders,
            shipments,
            locks,
        }
    }
}
