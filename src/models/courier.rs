use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        crate::geo::is_valid_coordinate(self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Motorcycle,
    Car,
    Bicycle,
}

/// Operational status, set by operators. Independent of the courier's own availability toggle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CourierStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// A courier's authoritative record. The active-order count is deliberately absent:
/// it is always derived from open orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Courier {
    pub id: Uuid,
    pub name: String,
    pub vehicle_type: VehicleType,
    /// Last checkpointed position; `None` until the first GPS fix lands.
    pub location: Option<GeoPoint>,
    pub location_updated_at: Option<DateTime<Utc>>,
    pub available: bool,
    pub status: CourierStatus,
    pub approval: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Courier {
    pub fn new(name: String, vehicle_type: VehicleType, location: Option<GeoPoint>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            vehicle_type,
            location_updated_at: location.map(|_| now),
            location,
            available: false,
            status: CourierStatus::Active,
            approval: ApprovalStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}
