use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::lifecycle::advance_order;
use crate::error::AppError;
use crate::models::assignment::Assignment;
use crate::models::courier::GeoPoint;
use crate::models::order::{DeliveryOrder, OrderStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", patch(update_order_status))
        .route("/assignments", get(list_assignments))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub merchant_id: Uuid,
    pub customer_id: Uuid,
    pub pickup: Option<GeoPoint>,
    pub shipping_cost: u64,
}

#[derive(Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    if let Some(pickup) = &payload.pickup
        && !pickup.is_valid()
    {
        return Err(AppError::BadRequest("pickup out of range".to_string()));
    }

    let order = DeliveryOrder::new(
        payload.merchant_id,
        payload.customer_id,
        payload.pickup,
        payload.shipping_cost,
    );
    state.stores.orders.insert(order.clone()).await?;

    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let order = state
        .stores
        .orders
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {} not found", id)))?;

    Ok(Json(order))
}

async fn update_order_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    Ok(Json(advance_order(&state.stores, id, payload.status).await?))
}

async fn list_assignments(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Assignment>>, AppError> {
    Ok(Json(state.stores.assignments.list().await?))
}
