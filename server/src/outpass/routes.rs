use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::error::ServiceError;
use crate::identity::registration::require_actor;
use crate::state::AppState;

use super::{NewOutpass, OutpassView};

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// POST /api/outpass/create
/// Files a request as the calling user.
pub async fn create_outpass(
    State(state): State<AppState>,
    claims: Claims,
    Json(req): Json<NewOutpass>,
) -> Result<Json<OutpassView>, (StatusCode, String)> {
    require_actor(&state, &claims.sub).await?;

    let engine = state.engine.clone();
    let record = tokio::task::spawn_blocking(move || engine.create(&claims.sub, req))
        .await
        .map_err(ServiceError::from)??;

    Ok(Json(OutpassView::from(record)))
}

/// GET /api/outpass/myrequests
/// The caller's requests, newest first.
pub async fn my_requests(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<OutpassView>>, (StatusCode, String)> {
    require_actor(&state, &claims.sub).await?;

    let engine = state.engine.clone();
    let views = tokio::task::spawn_blocking(move || engine.list_for_owner(&claims.sub))
        .await
        .map_err(ServiceError::from)??;

    Ok(Json(views))
}

/// PUT /api/outpass/approve/{id}
/// Any authenticated caller may approve; there is no staff role.
pub async fn approve_outpass(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, (StatusCode, String)> {
    let engine = state.engine.clone();
    let record = tokio::task::spawn_blocking(move || engine.approve(&id))
        .await
        .map_err(ServiceError::from)??;

    tracing::debug!(outpass_id = %record.id, by = %claims.sub, "Approve handled");
    Ok(Json(OkResponse { ok: true }))
}

/// PUT /api/outpass/reject/{id}
/// Any authenticated caller may reject, including an already approved request.
pub async fn reject_outpass(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, (StatusCode, String)> {
    let engine = state.engine.clone();
    let record = tokio::task::spawn_blocking(move || engine.reject(&id))
        .await
        .map_err(ServiceError::from)??;

    tracing::debug!(outpass_id = %record.id, by = %claims.sub, "Reject handled");
    Ok(Json(OkResponse { ok: true }))
}
