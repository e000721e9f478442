use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::location::CheckpointOutcome;
use crate::error::AppError;
use crate::models::courier::{ApprovalStatus, Courier, CourierStatus, GeoPoint, VehicleType};
use crate::models::earning::CourierEarning;
use crate::models::notification::Notification;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/couriers", post(create_courier).get(list_couriers))
        .route("/couriers/:id", get(get_courier))
        .route("/couriers/:id/approval", patch(update_courier_approval))
        .route("/couriers/:id/status", patch(update_courier_status))
        .route("/couriers/:id/availability", patch(update_courier_availability))
        .route("/couriers/:id/checkpoint", post(record_checkpoint))
        .route("/couriers/:id/ping", post(broadcast_location))
        .route("/couriers/:id/earnings", get(list_earnings))
        .route("/couriers/:id/notifications", get(list_notifications))
}

#[derive(Deserialize)]
pub struct CreateCourierRequest {
    pub name: String,
    pub vehicle_type: VehicleType,
    pub location: Option<GeoPoint>,
}

#[derive(Deserialize)]
pub struct UpdateApprovalRequest {
    pub approval: ApprovalStatus,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: CourierStatus,
}

#[derive(Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub available: bool,
}

#[derive(Deserialize)]
pub struct LocationRequest {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Serialize)]
pub struct CheckpointResponse {
    pub recorded: bool,
}

#[derive(Serialize)]
pub struct PingResponse {
    pub delivered_to: usize,
}

async fn create_courier(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCourierRequest>,
) -> Result<Json<Courier>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    if let Some(location) = &payload.location
        && !location.is_valid()
    {
        return Err(AppError::BadRequest("location out of range".to_string()));
    }

    let courier = Courier::new(payload.name, payload.vehicle_type, payload.location);
    state.stores.couriers.insert(courier.clone()).await?;

    Ok(Json(courier))
}

async fn list_couriers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Courier>>, AppError> {
    Ok(Json(state.stores.couriers.list().await?))
}

async fn get_courier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Courier>, AppError> {
    let courier = state
        .stores
        .couriers
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("courier {} not found", id)))?;

    Ok(Json(courier))
}

async fn update_courier_approval(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateApprovalRequest>,
) -> Result<Json<Courier>, AppError> {
    Ok(Json(
        state.stores.couriers.set_approval(id, payload.approval).await?,
    ))
}

async fn update_courier_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Courier>, AppError> {
    Ok(Json(state.stores.couriers.set_status(id, payload.status).await?))
}

async fn update_courier_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Courier>, AppError> {
    Ok(Json(
        state.locations.set_availability(id, payload.available).await?,
    ))
}

async fn record_checkpoint(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LocationRequest>,
) -> Result<(StatusCode, Json<CheckpointResponse>), AppError> {
    let location = GeoPoint {
        lat: payload.lat,
        lng: payload.lng,
    };
    let outcome = state.locations.record_checkpoint(id, location).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CheckpointResponse {
            recorded: outcome == CheckpointOutcome::Recorded,
        }),
    ))
}

async fn broadcast_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LocationRequest>,
) -> Result<(StatusCode, Json<PingResponse>), AppError> {
    let location = GeoPoint {
        lat: payload.lat,
        lng: payload.lng,
    };
    let delivered_to = state.locations.broadcast(id, location)?;

    Ok((StatusCode::ACCEPTED, Json(PingResponse { delivered_to })))
}

async fn list_earnings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CourierEarning>>, AppError> {
    Ok(Json(state.stores.earnings.for_courier(id).await?))
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Notification>>, AppError> {
    Ok(Json(state.stores.notifications.for_user(id).await?))
}
