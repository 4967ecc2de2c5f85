use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::ActorContext,
    errors::ServiceError,
    services::links::{parse_link_status, LinkResponse},
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub struct RequestLinkBody {
    pub supplier_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RespondLinkBody {
    pub status: String,
}

pub fn links_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_links).post(request_link))
        .route("/:id", put(respond_link))
}

async fn request_link(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(body): Json<RequestLinkBody>,
) -> Result<(StatusCode, Json<ApiResponse<LinkResponse>>), ServiceError> {
    let link = state
        .services
        .links
        .request_link(&actor, body.supplier_id)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(link))))
}

async fn respond_link(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
    Json(body): Json<RespondLinkBody>,
) -> Result<Json<ApiResponse<LinkResponse>>, ServiceError> {
    let status = parse_link_status(&body.status)?;
    let link = state
        .services
        .links
        .respond_link(&actor, id, status)
        .await?;
    Ok(Json(ApiResponse::success(link)))
}

async fn list_links(
    State(state): State<AppState>,
    actor: ActorContext,
) -> Result<Json<ApiResponse<Vec<LinkResponse>>>, ServiceError> {
    let links = state.services.links.list_links(&actor).await?;
    Ok(Json(ApiResponse::success(links)))
}
