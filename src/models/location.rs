use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::courier::GeoPoint;

/// A live position reading. Travels on the broadcast channel only and is never
/// read by dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub courier_id: Uuid,
    pub location: GeoPoint,
    pub recorded_at: DateTime<Utc>,
}
