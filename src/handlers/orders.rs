use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::ActorContext,
    errors::ServiceError,
    services::orders::{
        parse_order_status, CreateOrderRequest, OrderListResponse, OrderResponse,
    },
    ApiResponse, AppState, ListQuery,
};

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/:id", get(get_order))
        .route("/:id/status", put(update_order_status))
}

/// Place a new order. Atomic: deducts stock immediately, fails whole if any
/// line is invalid or stock is low.
async fn create_order(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    let order = state.services.orders.create_order(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

async fn get_order(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.get_order(&actor, id).await?;
    Ok(Json(ApiResponse::success(order)))
}

async fn list_orders(
    State(state): State<AppState>,
    actor: ActorContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<OrderListResponse>>, ServiceError> {
    let orders = state
        .services
        .orders
        .list_orders(&actor, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// Supplier-side status transition; declining or canceling restores stock.
async fn update_order_status(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let status = parse_order_status(&request.status)?;
    let order = state
        .services
        .order_status
        .update_status(&actor, id, status)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}
