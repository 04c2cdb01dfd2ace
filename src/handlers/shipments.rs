use crate::{
    commands::shipments::{ReconcileOutcome, ReconcileShipmentCommand},
    errors::ServiceError,
    queries::{shipment_queries::ShipmentFilter, ShipmentView},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ShipmentListQuery {
    /// `completed` for fully shipped orders, `due` for orders with items outstanding
    pub status: Option<ShipmentFilter>,
}

#[utoipa::path(
    get,
    path = "/api/v1/shipments",
    params(ShipmentListQuery),
    responses(
        (status = 200, description = "Shipments listed", body = ApiResponse<Vec<ShipmentView>>),
        (status = 400, description = "Unknown status filter", body = crate::errors::ErrorResponse)
    ),
    tag = "Shipments"
)]
pub async fn list_shipments(
    State(state): State<AppState>,
    Query(query): Query<ShipmentListQuery>,
) -> ApiResult<Vec<ShipmentView>> {
    let shipments = state.services.shipments.list_shipments(query.status).await?;
    Ok(Json(ApiResponse::success(shipments)))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipments/{id}",
    params(("id" = i32, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Shipment found", body = ApiResponse<ShipmentView>),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Shipments"
)]
pub async fn get_shipment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<ShipmentView> {
    let shipment = state.services.shipments.get_shipment(id).await?;
    Ok(Json(ApiResponse::success(shipment)))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipments/history/{customer_name}",
    params(("customer_name" = String, Path, description = "Customer name or part of it")),
    responses(
        (status = 200, description = "Shipments of the customer's orders, newest first", body = ApiResponse<Vec<ShipmentView>>),
        (status = 400, description = "Blank customer name", body = crate::errors::ErrorResponse)
    ),
    tag = "Shipments"
)]
pub async fn get_shipment_history(
    State(state): State<AppState>,
    Path(customer_name): Path<String>,
) -> ApiResult<Vec<ShipmentView>> {
    let shipments = state
        .services
        .shipments
        .shipments_for_customer(&customer_name)
        .await?;
    Ok(Json(ApiResponse::success(shipments)))
}

/// Reconcile a proposed shipment against the order's committed and due quantities
#[utoipa::path(
    post,
    path = "/api/v1/shipments",
    request_body = ReconcileShipmentCommand,
    responses(
        (status = 201, description = "Shipment recorded", body = ApiResponse<ReconcileOutcome>),
        (status = 200, description = "Idempotent replay of an earlier shipment", body = ApiResponse<ReconcileOutcome>),
        (status = 400, description = "Malformed proposal", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Idempotency key belongs to another order", body = crate::errors::ErrorResponse),
        (status = 422, description = "Proposal rejected by reconciliation", body = crate::errors::ErrorResponse),
        (status = 503, description = "Transaction failed after retry", body = crate::errors::ErrorResponse)
    ),
    tag = "Shipments"
)]
pub async fn reconcile_shipment(
    State(state): State<AppState>,
    Json(command): Json<ReconcileShipmentCommand>,
) -> Result<(StatusCode, Json<ApiResponse<ReconcileOutcome>>), ServiceError> {
    let outcome = state.services.shipments.reconcile_shipment(command).await?;
    let status = if outcome.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(ApiResponse::success(outcome))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/shipments/{id}",
    params(("id" = i32, Path, description = "Shipment ID")),
    responses(
        (status = 204, description = "Shipment deleted; order reset to pending"),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Shipments"
)]
pub async fn delete_shipment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.shipments.delete_shipment(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
