use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::ActorContext,
    errors::ServiceError,
    services::products::{CreateProductRequest, ProductResponse, UpdateProductRequest},
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    /// Supplier whose catalog to list; defaults to the actor's own company
    /// for supplier-side callers.
    pub supplier_id: Option<Uuid>,
}

pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", put(update_product))
        .route("/:id/archive", post(archive_product))
}

async fn create_product(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProductResponse>>), ServiceError> {
    let product = state
        .services
        .products
        .create_product(&actor, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(product))))
}

async fn list_products(
    State(state): State<AppState>,
    actor: ActorContext,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<ApiResponse<Vec<ProductResponse>>>, ServiceError> {
    let supplier_id = query
        .supplier_id
        .or(actor.supplier_id)
        .ok_or_else(|| ServiceError::ValidationError("supplier_id is required".to_string()))?;

    let products = state
        .services
        .products
        .list_products(&actor, supplier_id)
        .await?;
    Ok(Json(ApiResponse::success(products)))
}

async fn update_product(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<Json<ApiResponse<ProductResponse>>, ServiceError> {
    let product = state
        .services
        .products
        .update_product(&actor, id, request)
        .await?;
    Ok(Json(ApiResponse::success(product)))
}

async fn archive_product(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProductResponse>>, ServiceError> {
    let product = state.services.products.archive_product(&actor, id).await?;
    Ok(Json(ApiResponse::success(product)))
}
