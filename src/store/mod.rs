//! Collaborator ports consumed by the dispatch core.
//!
//! Each trait is the seam where a real database, push service, or ledger plugs in.
//! The in-memory implementations back the HTTP service and the tests.

mod memory;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::{
    InMemoryAssignmentLog, InMemoryCourierStore, InMemoryEarningsLedger,
    InMemoryNotificationSink, InMemoryOrderStore,
};

use crate::error::StoreError;
use crate::models::assignment::Assignment;
use crate::models::courier::{ApprovalStatus, Courier, CourierStatus, GeoPoint};
use crate::models::earning::CourierEarning;
use crate::models::notification::Notification;
use crate::models::order::{DeliveryOrder, OrderStatus};

#[async_trait]
pub trait CourierStore: Send + Sync {
    async fn insert(&self, courier: Courier) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Courier>, StoreError>;

    async fn list(&self) -> Result<Vec<Courier>, StoreError>;

    /// Durable position write. Only the checkpoint path calls this.
    async fn update_location(
        &self,
        id: Uuid,
        location: GeoPoint,
        at: DateTime<Utc>,
    ) -> Result<Courier, StoreError>;

    async fn set_availability(&self, id: Uuid, available: bool) -> Result<Courier, StoreError>;

    async fn set_status(&self, id: Uuid, status: CourierStatus) -> Result<Courier, StoreError>;

    async fn set_approval(&self, id: Uuid, approval: ApprovalStatus)
    -> Result<Courier, StoreError>;
}

#[derive(Debug, Clone, Copy)]
pub struct ClaimRequest {
    pub order_id: Uuid,
    pub courier_id: Uuid,
    pub max_active_orders: u32,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    Claimed(DeliveryOrder),
    AlreadyAssigned { courier_id: Option<Uuid> },
    NotDispatchable { status: OrderStatus },
    /// The courier reached the cap between candidate selection and the claim.
    CourierAtCapacity { active_orders: u32 },
    NotFound,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: DeliveryOrder) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<DeliveryOrder>, StoreError>;

    async fn list(&self) -> Result<Vec<DeliveryOrder>, StoreError>;

    async fn count_open_for_courier(&self, courier_id: Uuid) -> Result<u32, StoreError>;

    /// Open-order count per courier. Couriers with none are absent.
    async fn open_counts(&self) -> Result<HashMap<Uuid, u32>, StoreError>;

    /// Atomic compare-and-swap of the order's courier.
    ///
    /// Succeeds only if the order is still `Created` with no courier and the courier holds
    /// fewer than `max_active_orders` open orders at commit time. This is the only write
    /// that may set `courier_id`.
    async fn try_claim(&self, request: ClaimRequest) -> Result<ClaimOutcome, StoreError>;

    /// Non-claim lifecycle moves. Terminal states release the courier.
    async fn transition(&self, id: Uuid, next: OrderStatus) -> Result<DeliveryOrder, StoreError>;
}

#[async_trait]
pub trait AssignmentLog: Send + Sync {
    async fn record(&self, assignment: Assignment) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<Assignment>, StoreError>;

    async fn for_order(&self, order_id: Uuid) -> Result<Option<Assignment>, StoreError>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), StoreError>;

    async fn for_user(&self, user_id: Uuid) -> Result<Vec<Notification>, StoreError>;
}

#[async_trait]
pub trait EarningsLedger: Send + Sync {
    async fn append_pending(&self, earning: CourierEarning) -> Result<(), StoreError>;

    /// Cancels pending earnings for the order. Returns how many were voided.
    async fn void_for_order(&self, order_id: Uuid) -> Result<usize, StoreError>;

    async fn for_courier(&self, courier_id: Uuid) -> Result<Vec<CourierEarning>, StoreError>;
}

/// The full set of collaborators one service instance talks to.
#[derive(Clone)]
pub struct Stores {
    pub couriers: Arc<dyn CourierStore>,
    pub orders: Arc<dyn OrderStore>,
    pub assignments: Arc<dyn AssignmentLog>,
    pub notifications: Arc<dyn NotificationSink>,
    pub earnings: Arc<dyn EarningsLedger>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            couriers: Arc::new(InMemoryCourierStore::new()),
            orders: Arc::new(InMemoryOrderStore::new()),
            assignments: Arc::new(InMemoryAssignmentLog::new()),
            notifications: Arc::new(InMemoryNotificationSink::new()),
            earnings: Arc::new(InMemoryEarningsLedger::new()),
        }
    }
}
