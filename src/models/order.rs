use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::courier::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    Assigned,
    PickedUp,
    OnDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Statuses that hold a courier and count toward its load.
    pub fn is_open(self) -> bool {
        matches!(
            self,
            OrderStatus::Assigned | OrderStatus::PickedUp | OrderStatus::OnDelivery
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Lifecycle moves outside the claim. `Created -> Assigned` is absent on purpose:
    /// only the atomic claim may set a courier.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        matches!(
            (self, next),
            (Assigned, PickedUp)
                | (PickedUp, OnDelivery)
                | (OnDelivery, Delivered)
                | (Created, Cancelled)
                | (Assigned, Cancelled)
                | (PickedUp, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOrder {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub customer_id: Uuid,
    /// The merchant's registered location, when one is on file.
    pub pickup: Option<GeoPoint>,
    /// Minor currency units.
    pub shipping_cost: u64,
    pub courier_id: Option<Uuid>,
    pub status: OrderStatus,
    pub assigned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryOrder {
    pub fn new(
        merchant_id: Uuid,
        customer_id: Uuid,
        pickup: Option<GeoPoint>,
        shipping_cost: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            merchant_id,
            customer_id,
            pickup,
            shipping_cost,
            courier_id: None,
            status: OrderStatus::Created,
            assigned_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_unassigned(&self) -> bool {
        self.status == OrderStatus::Created && self.courier_id.is_none()
    }
}
