use axum::response::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Fulfillment Tracker API",
        version = "0.1.0",
        description = r#"
# Fulfillment Tracker API

Records customer orders and reconciles shipments against them.

## Reconciliation

`POST /api/v1/shipments` validates a proposed shipment against the order's
committed quantities and its due ledger, then records it and derives the
order status in one transaction:

- `pending`: nothing shipped yet
- `shipped`: every committed item fully shipped
- `shipped and due`: shipped with quantities still outstanding

A shipment with `is_due_clearance = true` must settle the outstanding due
entries exactly.

## Error Handling

Errors use one response format and the matching HTTP status code:

```json
{
  "error": "Unprocessable Entity",
  "message": "Over-shipment on order 1: item 2 committed 3, already shipped 2, proposed 2",
  "request_id": "6f1c0e4a-...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Order management endpoints"),
        (name = "Shipments", description = "Shipment reconciliation endpoints"),
    ),
    paths(
        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::delete_order,
        crate::handlers::orders::get_due_items,
        crate::handlers::orders::get_order_shipments,
        crate::handlers::orders::get_order_history,
        crate::handlers::orders::get_item,

        // Shipments
        crate::handlers::shipments::list_shipments,
        crate::handlers::shipments::get_shipment,
        crate::handlers::shipments::reconcile_shipment,
        crate::handlers::shipments::delete_shipment,
        crate::handlers::shipments::get_shipment_history,
    ),
    components(
        schemas(
            crate::entities::order::OrderStatus,
            crate::entities::shipment::ShipmentLine,
            crate::commands::orders::CreateOrderCommand,
            crate::commands::orders::CreateOrderItem,
            crate::commands::orders::UpdateOrderStatusResult,
            crate::commands::shipments::ReconcileShipmentCommand,
            crate::commands::shipments::ReconcileOutcome,
            crate::handlers::orders::UpdateOrderStatusRequest,
            crate::queries::OrderSummary,
            crate::queries::OrderItemView,
            crate::queries::OrderDetails,
            crate::queries::ShipmentView,
            crate::queries::DueItem,
            crate::queries::shipment_queries::ShipmentFilter,
            crate::ResponseMeta,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

/// Serves the generated document as JSON.
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDocV1::openapi())
}
