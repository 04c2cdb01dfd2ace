use crate::{
    commands::orders::{CreateOrderCommand, UpdateOrderStatusResult},
    entities::order::OrderStatus,
    errors::ServiceError,
    queries::{DueItem, OrderDetails, OrderItemView, OrderSummary, ShipmentView},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};

/// Request body for a manual status override
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "status": "shipped" }))]
pub struct UpdateOrderStatusRequest {
    /// One of `pending`, `shipped`, `shipped and due`
    #[schema(example = "shipped")]
    pub status: String,
}

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderHistoryParams {
    /// Only orders placed on this day (`YYYY-MM-DD`)
    pub order_date: Option<NaiveDate>,
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    description = "All orders, newest order date first",
    responses(
        (status = 200, description = "Orders retrieved successfully", body = ApiResponse<Vec<OrderSummary>>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn list_orders(State(state): State<AppState>) -> ApiResult<Vec<OrderSummary>> {
    let orders = state.services.orders.list_orders().await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    description = "Create an order with its items; the order starts out pending",
    request_body = CreateOrderCommand,
    responses(
        (status = 201, description = "Order created successfully", body = ApiResponse<OrderDetails>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(command): Json<CreateOrderCommand>,
) -> Result<(StatusCode, Json<ApiResponse<OrderDetails>>), ServiceError> {
    let created = state.services.orders.create_order(command).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    description = "Get an order and its items",
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order retrieved successfully", body = ApiResponse<OrderDetails>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<OrderDetails> {
    let order = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    summary = "Update order status",
    description = "Manually override the stored status of an order. The due ledger is not touched.",
    params(("id" = i32, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order status updated successfully", body = ApiResponse<UpdateOrderStatusResult>),
        (status = 400, description = "Unknown status value", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> ApiResult<UpdateOrderStatusResult> {
    let status = OrderStatus::from_str(request.status.trim()).map_err(|_| {
        ServiceError::ValidationError(format!(
            "status must be one of 'pending', 'shipped', 'shipped and due'; got '{}'",
            request.status
        ))
    })?;

    let updated = state
        .services
        .orders
        .update_order_status(id, status)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    summary = "Delete order",
    description = "Delete an order together with its items, shipments and due entries",
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 204, description = "Order deleted successfully"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.orders.delete_order(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/due-items",
    summary = "Due items",
    description = "Outstanding quantities for an order, ordered by item id. Empty when nothing is due or the order is unknown.",
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Due items retrieved", body = ApiResponse<Vec<DueItem>>),
    ),
    tag = "Orders"
)]
pub async fn get_due_items(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Vec<DueItem>> {
    let due = state.services.shipments.query_due_items(id).await?;
    Ok(Json(ApiResponse::success(due)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/shipments",
    summary = "Order shipments",
    description = "Shipments recorded against an order, oldest first",
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Shipments retrieved", body = ApiResponse<Vec<ShipmentView>>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn get_order_shipments(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Vec<ShipmentView>> {
    let shipments = state.services.shipments.shipments_for_order(id).await?;
    Ok(Json(ApiResponse::success(shipments)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/history/{customer_name}",
    summary = "Customer order history",
    description = "Orders with their items whose customer name contains the given text, ignoring case. Newest order date first.",
    params(
        ("customer_name" = String, Path, description = "Customer name or part of it"),
        OrderHistoryParams
    ),
    responses(
        (status = 200, description = "Order history retrieved", body = ApiResponse<Vec<OrderDetails>>),
        (status = 400, description = "Blank customer name or malformed date", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn get_order_history(
    State(state): State<AppState>,
    Path(customer_name): Path<String>,
    Query(params): Query<OrderHistoryParams>,
) -> ApiResult<Vec<OrderDetails>> {
    let orders = state
        .services
        .orders
        .order_history(&customer_name, params.order_date)
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    get,
    path = "/api/v1/items/{id}",
    summary = "Get item",
    description = "A committed order item, with the id of the order it belongs to",
    params(("id" = i32, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Item retrieved", body = ApiResponse<OrderItemView>),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<OrderItemView> {
    let item = state.services.orders.get_item(id).await?;
    Ok(Json(ApiResponse::success(item)))
}
