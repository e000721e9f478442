use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;

use crate::engine::assignment::{
    AutoAssignRequest, AutoAssignResponse, ManualAssignRequest, ManualAssignResponse,
};
use crate::error::DispatchError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dispatch/auto", post(auto_assign))
        .route("/dispatch/manual", post(manual_assign))
}

// Body errors (missing or malformed order id) come back in the dispatch error shape.
async fn auto_assign(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AutoAssignRequest>, JsonRejection>,
) -> Result<Json<AutoAssignResponse>, DispatchError> {
    let Json(request) =
        payload.map_err(|rejection| DispatchError::InvalidRequest(rejection.body_text()))?;

    Ok(Json(state.dispatcher.auto_assign(request).await?))
}

async fn manual_assign(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ManualAssignRequest>, JsonRejection>,
) -> Result<Json<ManualAssignResponse>, DispatchError> {
    let Json(request) =
        payload.map_err(|rejection| DispatchError::InvalidRequest(rejection.body_text()))?;

    Ok(Json(state.dispatcher.manual_assign(request).await?))
}
