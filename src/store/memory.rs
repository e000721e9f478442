use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::{
    AssignmentLog, ClaimOutcome, ClaimRequest, CourierStore, EarningsLedger, NotificationSink,
    OrderStore,
};
use crate::error::StoreError;
use crate::models::assignment::Assignment;
use crate::models::courier::{ApprovalStatus, Courier, CourierStatus, GeoPoint};
use crate::models::earning::{CourierEarning, EarningStatus};
use crate::models::notification::Notification;
use crate::models::order::{DeliveryOrder, OrderStatus};

#[derive(Default)]
pub struct InMemoryCourierStore {
    couriers: DashMap<Uuid, Courier>,
}

impl InMemoryCourierStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, id: Uuid, apply: F) -> Result<Courier, StoreError>
    where
        F: FnOnce(&mut Courier),
    {
        let mut courier = self.couriers.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "courier",
            id,
        })?;

        apply(courier.value_mut());
        courier.updated_at = Utc::now();

        Ok(courier.clone())
    }
}

#[async_trait]
impl CourierStore for InMemoryCourierStore {
    async fn insert(&self, courier: Courier) -> Result<(), StoreError> {
        self.couriers.insert(courier.id, courier);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Courier>, StoreError> {
        Ok(self.couriers.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list(&self) -> Result<Vec<Courier>, StoreError> {
        Ok(self
            .couriers
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn update_location(
        &self,
        id: Uuid,
        location: GeoPoint,
        at: DateTime<Utc>,
    ) -> Result<Courier, StoreError> {
        self.update(id, |courier| {
            courier.location = Some(location);
            courier.location_updated_at = Some(at);
        })
    }

    async fn set_availability(&self, id: Uuid, available: bool) -> Result<Courier, StoreError> {
        self.update(id, |courier| courier.available = available)
    }

    async fn set_status(&self, id: Uuid, status: CourierStatus) -> Result<Courier, StoreError> {
        self.update(id, |courier| courier.status = status)
    }

    async fn set_approval(
        &self,
        id: Uuid,
        approval: ApprovalStatus,
    ) -> Result<Courier, StoreError> {
        self.update(id, |courier| courier.approval = approval)
    }
}

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: DashMap<Uuid, DeliveryOrder>,
    /// Serializes claims per courier so the cap re-count and the order write commit together.
    courier_guards: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn open_for(&self, courier_id: Uuid) -> u32 {
        self.orders
            .iter()
            .filter(|entry| {
                let order = entry.value();
                order.status.is_open() && order.courier_id == Some(courier_id)
            })
            .count() as u32
    }

    fn courier_guard(&self, courier_id: Uuid) -> Arc<Mutex<()>> {
        self.courier_guards
            .entry(courier_id)
            .or_default()
            .value()
            .clone()
    }
}

fn rejection(order: &DeliveryOrder) -> ClaimOutcome {
    if order.status.is_terminal() {
        ClaimOutcome::NotDispatchable {
            status: order.status,
        }
    } else {
        ClaimOutcome::AlreadyAssigned {
            courier_id: order.courier_id,
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: DeliveryOrder) -> Result<(), StoreError> {
        self.orders.insert(order.id, order);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<DeliveryOrder>, StoreError> {
        Ok(self.orders.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list(&self) -> Result<Vec<DeliveryOrder>, StoreError> {
        Ok(self
            .orders
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn count_open_for_courier(&self, courier_id: Uuid) -> Result<u32, StoreError> {
        Ok(self.open_for(courier_id))
    }

    async fn open_counts(&self) -> Result<HashMap<Uuid, u32>, StoreError> {
        let mut counts = HashMap::new();
        for entry in self.orders.iter() {
            let order = entry.value();
            if let Some(courier_id) = order.courier_id
                && order.status.is_open()
            {
                *counts.entry(courier_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn try_claim(&self, request: ClaimRequest) -> Result<ClaimOutcome, StoreError> {
        match self.orders.get(&request.order_id) {
            None => return Ok(ClaimOutcome::NotFound),
            Some(order) if !order.is_unassigned() => return Ok(rejection(&order)),
            Some(_) => {}
        }

        let guard = self.courier_guard(request.courier_id);
        let _held = guard.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        // Count before taking the order's shard lock; iterating while holding it would deadlock.
        let active_orders = self.open_for(request.courier_id);

        let Some(mut order) = self.orders.get_mut(&request.order_id) else {
            return Ok(ClaimOutcome::NotFound);
        };

        if !order.is_unassigned() {
            return Ok(rejection(&order));
        }

        if active_orders >= request.max_active_orders {
            return Ok(ClaimOutcome::CourierAtCapacity { active_orders });
        }

        order.courier_id = Some(request.courier_id);
        order.status = OrderStatus::Assigned;
        order.assigned_at = Some(request.at);
        order.updated_at = request.at;

        Ok(ClaimOutcome::Claimed(order.clone()))
    }

    async fn transition(&self, id: Uuid, next: OrderStatus) -> Result<DeliveryOrder, StoreError> {
        let mut order = self
            .orders
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "order", id })?;

        if !order.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                from: order.status,
                to: next,
            });
        }

        order.status = next;
        if next.is_terminal() {
            order.courier_id = None;
        }
        order.updated_at = Utc::now();

        Ok(order.clone())
    }
}

#[derive(Default)]
pub struct InMemoryAssignmentLog {
    assignments: DashMap<Uuid, Assignment>,
}

impl InMemoryAssignmentLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssignmentLog for InMemoryAssignmentLog {
    async fn record(&self, assignment: Assignment) -> Result<(), StoreError> {
        self.assignments.insert(assignment.id, assignment);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Assignment>, StoreError> {
        let mut assignments: Vec<Assignment> = self
            .assignments
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        assignments.sort_by_key(|assignment| assignment.assigned_at);
        Ok(assignments)
    }

    async fn for_order(&self, order_id: Uuid) -> Result<Option<Assignment>, StoreError> {
        Ok(self
            .assignments
            .iter()
            .find(|entry| entry.value().order_id == order_id)
            .map(|entry| entry.value().clone()))
    }
}

#[derive(Default)]
pub struct InMemoryNotificationSink {
    inbox: DashMap<Uuid, Vec<Notification>>,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn notify(&self, notification: Notification) -> Result<(), StoreError> {
        self.inbox
            .entry(notification.user_id)
            .or_default()
            .push(notification);
        Ok(())
    }

    async fn for_user(&self, user_id: Uuid) -> Result<Vec<Notification>, StoreError> {
        Ok(self
            .inbox
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryEarningsLedger {
    earnings: DashMap<Uuid, CourierEarning>,
}

impl InMemoryEarningsLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EarningsLedger for InMemoryEarningsLedger {
    async fn append_pending(&self, earning: CourierEarning) -> Result<(), StoreError> {
        self.earnings.insert(earning.id, earning);
        Ok(())
    }

    async fn void_for_order(&self, order_id: Uuid) -> Result<usize, StoreError> {
        let mut voided = 0;
        for mut entry in self.earnings.iter_mut() {
            let earning = entry.value_mut();
            if earning.order_id == order_id && earning.status == EarningStatus::Pending {
                earning.status = EarningStatus::Cancelled;
                voided += 1;
            }
        }
        Ok(voided)
    }

    async fn for_courier(&self, courier_id: Uuid) -> Result<Vec<CourierEarning>, StoreError> {
        let mut earnings: Vec<CourierEarning> = self
            .earnings
            .iter()
            .filter(|entry| entry.value().courier_id == courier_id)
            .map(|entry| entry.value().clone())
            .collect();
        earnings.sort_by_key(|earning| earning.created_at);
        Ok(earnings)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::InMemoryOrderStore;
    use crate::models::order::{DeliveryOrder, OrderStatus};
    use crate::store::{ClaimOutcome, ClaimRequest, OrderStore};

    fn request(order_id: Uuid, courier_id: Uuid) -> ClaimRequest {
        ClaimRequest {
            order_id,
            courier_id,
            max_active_orders: 3,
            at: Utc::now(),
        }
    }

    async fn seeded_order(store: &InMemoryOrderStore) -> Uuid {
        let order = DeliveryOrder::new(Uuid::new_v4(), Uuid::new_v4(), None, 10_000);
        let id = order.id;
        store.insert(order).await.unwrap();
        id
    }

    #[tokio::test]
    async fn second_claim_reports_existing_courier() {
        let store = InMemoryOrderStore::new();
        let order_id = seeded_order(&store).await;
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let outcome = store.try_claim(request(order_id, first)).await.unwrap();
        assert!(matches!(outcome, ClaimOutcome::Claimed(ref order) if order.courier_id == Some(first)));

        let outcome = store.try_claim(request(order_id, second)).await.unwrap();
        assert!(matches!(
            outcome,
            ClaimOutcome::AlreadyAssigned { courier_id } if courier_id == Some(first)
        ));

        let stored = store.get(order_id).await.unwrap().unwrap();
        assert_eq!(stored.courier_id, Some(first));
        assert_eq!(stored.status, OrderStatus::Assigned);
        assert!(stored.assigned_at.is_some());
    }

    #[tokio::test]
    async fn claim_respects_courier_cap() {
        let store = InMemoryOrderStore::new();
        let courier = Uuid::new_v4();

        for _ in 0..3 {
            let order_id = seeded_order(&store).await;
            let outcome = store.try_claim(request(order_id, courier)).await.unwrap();
            assert!(matches!(outcome, ClaimOutcome::Claimed(_)));
        }

        let fourth = seeded_order(&store).await;
        let outcome = store.try_claim(request(fourth, courier)).await.unwrap();
        assert!(matches!(
            outcome,
            ClaimOutcome::CourierAtCapacity { active_orders: 3 }
        ));
        assert!(store.get(fourth).await.unwrap().unwrap().courier_id.is_none());
    }

    #[tokio::test]
    async fn terminal_transition_releases_courier() {
        let store = InMemoryOrderStore::new();
        let courier = Uuid::new_v4();
        let order_id = seeded_order(&store).await;
        store.try_claim(request(order_id, courier)).await.unwrap();
        assert_eq!(store.count_open_for_courier(courier).await.unwrap(), 1);

        store.transition(order_id, OrderStatus::PickedUp).await.unwrap();
        store.transition(order_id, OrderStatus::OnDelivery).await.unwrap();
        let delivered = store.transition(order_id, OrderStatus::Delivered).await.unwrap();

        assert!(delivered.courier_id.is_none());
        assert_eq!(store.count_open_for_courier(courier).await.unwrap(), 0);
        assert!(store.open_counts().await.unwrap().is_empty());

        let outcome = store.try_claim(request(order_id, courier)).await.unwrap();
        assert!(matches!(
            outcome,
            ClaimOutcome::NotDispatchable {
                status: OrderStatus::Delivered
            }
        ));
    }

    #[tokio::test]
    async fn transition_cannot_assign() {
        let store = InMemoryOrderStore::new();
        let order_id = seeded_order(&store).await;
        assert!(store.transition(order_id, OrderStatus::Assigned).await.is_err());
    }

    #[tokio::test]
    async fn missing_order_claim_is_not_found() {
        let store = InMemoryOrderStore::new();
        let outcome = store
            .try_claim(request(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();
        assert!(matches!(outcome, ClaimOutcome::NotFound));
    }
}
