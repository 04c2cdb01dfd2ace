#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::NaiveDate;
use fulfillment_tracker::{
    commands::orders::{CreateOrderCommand, CreateOrderItem},
    commands::shipments::{ReconcileOutcome, ReconcileShipmentCommand},
    config::AppConfig,
    db,
    entities::{order::OrderStatus, shipment::ShipmentLine},
    errors::ServiceError,
    events::{Event, EventSender},
    queries::OrderDetails,
    AppState,
};
use rust_decimal_macros::dec;
use sea_orm::ConnectionTrait;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tower::ServiceExt;

/// Helper harness for spinning up an application state backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    events: Mutex<mpsc::Receiver<Event>>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::with_retry_delay_ms(1).await
    }

    /// Like [`TestApp::new`], pausing `delay_ms` before a transaction retry.
    pub async fn with_retry_delay_ms(delay_ms: u64) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // One connection keeps every query on the same in-memory database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.db_idle_timeout_secs = 3_600;
        cfg.cors_allow_any_origin = true;
        cfg.transaction_retry_delay_ms = delay_ms;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(1024);
        let state = AppState::new(
            Arc::new(pool),
            cfg,
            Arc::new(EventSender::new(event_tx)),
        );
        let router = fulfillment_tracker::app(state.clone()).expect("router should build");

        Self {
            router,
            state,
            events: Mutex::new(event_rx),
        }
    }

    /// Creates an order dated 2024-03-01 with the given `(name, quantity)` items.
    pub async fn create_order(&self, items: &[(&str, i32)]) -> OrderDetails {
        self.state
            .order_service()
            .create_order(order_command(items))
            .await
            .expect("order should be created")
    }

    /// Item ids of `order`, in creation order.
    pub fn item_ids(order: &OrderDetails) -> Vec<i32> {
        order.items.iter().map(|item| item.id).collect()
    }

    pub async fn reconcile(
        &self,
        order_id: i32,
        lines: &[(i32, i32)],
        is_due_clearance: bool,
    ) -> Result<ReconcileOutcome, ServiceError> {
        self.state
            .shipment_service()
            .reconcile_shipment(shipment_command(order_id, lines, is_due_clearance))
            .await
    }

    /// Due ledger of `order_id` as `(item_id, quantity)` pairs.
    pub async fn due(&self, order_id: i32) -> Vec<(i32, i32)> {
        self.state
            .shipment_service()
            .query_due_items(order_id)
            .await
            .expect("due items query")
            .into_iter()
            .map(|due| (due.item_id, due.quantity))
            .collect()
    }

    pub async fn status(&self, order_id: i32) -> OrderStatus {
        self.state
            .order_service()
            .get_order(order_id)
            .await
            .expect("order should exist")
            .order
            .status
    }

    /// Runs raw SQL against the test database, outside any service.
    pub async fn execute_sql(&self, sql: &str) {
        self.state
            .db
            .execute_unprepared(sql)
            .await
            .expect("raw sql should run");
    }

    pub async fn shipment_count(&self, order_id: i32) -> usize {
        self.state
            .shipment_service()
            .shipments_for_order(order_id)
            .await
            .expect("order shipments query")
            .len()
    }

    /// Every event published so far.
    pub async fn drain_events(&self) -> Vec<Event> {
        let mut rx = self.events.lock().await;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Send a request against the router.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn order_command(items: &[(&str, i32)]) -> CreateOrderCommand {
    CreateOrderCommand {
        customer_id: 7,
        customer_name: "Ada Lovelace".to_string(),
        order_date: date(2024, 3, 1),
        shipment_due: date(2024, 3, 10),
        shipment_address: "12 Analytical Row, London".to_string(),
        items: items
            .iter()
            .map(|(name, quantity)| CreateOrderItem {
                name: name.to_string(),
                size: None,
                color: None,
                price: dec!(9.50),
                quantity: *quantity,
            })
            .collect(),
    }
}

pub fn shipment_command(
    order_id: i32,
    lines: &[(i32, i32)],
    is_due_clearance: bool,
) -> ReconcileShipmentCommand {
    ReconcileShipmentCommand {
        order_id,
        shipped_date: date(2024, 3, 5),
        items: lines
            .iter()
            .map(|&(item_id, quantity)| ShipmentLine { item_id, quantity })
            .collect(),
        is_due_clearance,
        idempotency_key: None,
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
