use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::engine::filter::Ineligibility;
use crate::models::order::OrderStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => AppError::NotFound(err.to_string()),
            StoreError::InvalidTransition { .. } => AppError::Conflict(err.to_string()),
            StoreError::Unavailable(_) => AppError::Internal(err.to_string()),
        }
    }
}

/// Failures raised by the collaborator stores.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("invalid order transition from {from:?} to {to:?}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    NoCandidates,
    Persistence,
}

/// Every way a dispatch attempt can end without a committed claim.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("invalid dispatch request: {0}")]
    InvalidRequest(String),

    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error("courier {0} not found")]
    CourierNotFound(Uuid),

    #[error("order {order_id} is already assigned")]
    AlreadyAssigned {
        order_id: Uuid,
        courier_id: Option<Uuid>,
    },

    #[error("order {order_id} is {status:?} and cannot be dispatched")]
    NotDispatchable { order_id: Uuid, status: OrderStatus },

    #[error("no eligible courier among {candidates_count} in the pool")]
    NoEligibleCourier { candidates_count: usize },

    #[error("courier {courier_id} is not eligible: {reason}")]
    CourierNotEligible {
        courier_id: Uuid,
        reason: Ineligibility,
    },

    #[error("timed out reading the courier snapshot")]
    SnapshotTimeout,

    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl DispatchError {
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::InvalidRequest(_) => "VALIDATION_ERROR",
            DispatchError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            DispatchError::CourierNotFound(_) => "COURIER_NOT_FOUND",
            DispatchError::AlreadyAssigned { .. } => "ALREADY_ASSIGNED",
            DispatchError::NotDispatchable { .. } => "ORDER_NOT_DISPATCHABLE",
            DispatchError::NoEligibleCourier { .. } => "NO_ELIGIBLE_COURIER",
            DispatchError::CourierNotEligible { .. } => "COURIER_NOT_ELIGIBLE",
            DispatchError::SnapshotTimeout => "SNAPSHOT_TIMEOUT",
            DispatchError::Persistence(_) => "PERSISTENCE_FAILURE",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::InvalidRequest(_) | DispatchError::CourierNotEligible { .. } => {
                ErrorKind::Validation
            }
            DispatchError::OrderNotFound(_) | DispatchError::CourierNotFound(_) => {
                ErrorKind::NotFound
            }
            DispatchError::AlreadyAssigned { .. } | DispatchError::NotDispatchable { .. } => {
                ErrorKind::Conflict
            }
            DispatchError::NoEligibleCourier { .. } => ErrorKind::NoCandidates,
            DispatchError::SnapshotTimeout | DispatchError::Persistence(_) => {
                ErrorKind::Persistence
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::CourierNotEligible { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => match self.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                // An empty market is a normal business state, not a failure.
                ErrorKind::NoCandidates => StatusCode::OK,
                ErrorKind::Persistence => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "error": self.code(),
            "kind": self.kind(),
            "message": self.to_string(),
        });

        if let DispatchError::NoEligibleCourier { candidates_count } = &self {
            body["candidates_count"] = json!(candidates_count);
        }

        (self.status_code(), Json(body)).into_response()
    }
}
