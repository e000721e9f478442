//! Courier positions and availability.
//!
//! Two channels carry positions. Checkpoints are durable writes into the courier store and
//! are the only positions dispatch ever reads. Pings go out on a broadcast channel for live
//! maps and are never persisted.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, StoreError};
use crate::geo::haversine_km;
use crate::models::courier::{Courier, CourierStatus, GeoPoint};
use crate::models::location::LocationUpdate;
use crate::observability::metrics::Metrics;
use crate::store::{CourierStore, OrderStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointOutcome {
    Recorded,
    /// The write failed and was dropped; the next checkpoint supersedes it.
    Dropped,
}

#[derive(Clone)]
pub struct CourierLocationStore {
    couriers: Arc<dyn CourierStore>,
    orders: Arc<dyn OrderStore>,
    live_tx: broadcast::Sender<LocationUpdate>,
    metrics: Metrics,
}

impl CourierLocationStore {
    pub fn new(
        couriers: Arc<dyn CourierStore>,
        orders: Arc<dyn OrderStore>,
        live_buffer_size: usize,
        metrics: Metrics,
    ) -> Self {
        let (live_tx, _unused_rx) = broadcast::channel(live_buffer_size.max(1));
        Self {
            couriers,
            orders,
            live_tx,
            metrics,
        }
    }

    /// Best-effort durable position write. Storage failures are logged and swallowed.
    pub async fn record_checkpoint(
        &self,
        courier_id: Uuid,
        location: GeoPoint,
    ) -> Result<CheckpointOutcome, AppError> {
        if !location.is_valid() {
            return Err(AppError::BadRequest(format!(
                "coordinates out of range: lat={}, lng={}",
                location.lat, location.lng
            )));
        }

        match self
            .couriers
            .update_location(courier_id, location, Utc::now())
            .await
        {
            Ok(_) => {
                self.metrics
                    .checkpoint_writes_total
                    .with_label_values(&["recorded"])
                    .inc();
                debug!(courier_id = %courier_id, lat = location.lat, lng = location.lng, "checkpoint recorded");
                Ok(CheckpointOutcome::Recorded)
            }
            Err(err @ StoreError::NotFound { .. }) => Err(AppError::NotFound(err.to_string())),
            Err(err) => {
                self.metrics
                    .checkpoint_writes_total
                    .with_label_values(&["dropped"])
                    .inc();
                warn!(courier_id = %courier_id, error = %err, "checkpoint write failed; dropping");
                Ok(CheckpointOutcome::Dropped)
            }
        }
    }

    /// Publishes a live position to map subscribers. Returns the number of receivers reached.
    pub fn broadcast(&self, courier_id: Uuid, location: GeoPoint) -> Result<usize, AppError> {
        if !location.is_valid() {
            return Err(AppError::BadRequest(format!(
                "coordinates out of range: lat={}, lng={}",
                location.lat, location.lng
            )));
        }

        self.metrics.location_pings_total.inc();
        let update = LocationUpdate {
            courier_id,
            location,
            recorded_at: Utc::now(),
        };

        // No subscribers is fine; nobody is watching the map.
        Ok(self.live_tx.send(update).unwrap_or(0))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LocationUpdate> {
        self.live_tx.subscribe()
    }

    pub async fn set_availability(
        &self,
        courier_id: Uuid,
        available: bool,
    ) -> Result<Courier, StoreError> {
        let courier = self.couriers.set_availability(courier_id, available).await?;
        info!(courier_id = %courier_id, available, "courier availability changed");
        Ok(courier)
    }

    /// Couriers with a checkpointed position that are available and active, optionally
    /// limited to a radius around the pickup. Read fresh on every call.
    pub async fn snapshot_available(
        &self,
        pickup: &GeoPoint,
        max_distance_km: Option<f64>,
    ) -> Result<Vec<Courier>, StoreError> {
        let couriers = self.couriers.list().await?;

        Ok(couriers
            .into_iter()
            .filter(|courier| courier.available && courier.status == CourierStatus::Active)
            .filter(|courier| match (&courier.location, max_distance_km) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(location), Some(limit)) => haversine_km(location, pickup) <= limit,
            })
            .collect())
    }

    /// Open-order count per courier, derived from the order store.
    pub async fn active_order_counts(&self) -> Result<HashMap<Uuid, u32>, StoreError> {
        self.orders.open_counts().await
    }

    pub async fn active_orders(&self, courier_id: Uuid) -> Result<u32, StoreError> {
        self.orders.count_open_for_courier(courier_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use super::{CheckpointOutcome, CourierLocationStore};
    use crate::error::StoreError;
    use crate::models::courier::{ApprovalStatus, Courier, CourierStatus, GeoPoint, VehicleType};
    use crate::observability::metrics::Metrics;
    use crate::store::{CourierStore, InMemoryCourierStore, InMemoryOrderStore};

    const PICKUP: GeoPoint = GeoPoint {
        lat: -6.2000,
        lng: 106.8166,
    };

    fn location_store() -> (Arc<InMemoryCourierStore>, CourierLocationStore) {
        let couriers = Arc::new(InMemoryCourierStore::new());
        let store = CourierLocationStore::new(
            couriers.clone(),
            Arc::new(InMemoryOrderStore::new()),
            16,
            Metrics::new(),
        );
        (couriers, store)
    }

    async fn available_courier(couriers: &InMemoryCourierStore, location: Option<GeoPoint>) -> Uuid {
        let mut courier = Courier::new("rider".to_string(), VehicleType::Motorcycle, location);
        courier.available = true;
        let id = courier.id;
        couriers.insert(courier).await.unwrap();
        id
    }

    #[tokio::test]
    async fn checkpoint_becomes_the_dispatch_position() {
        let (couriers, store) = location_store();
        let id = available_courier(&couriers, None).await;

        assert!(store.snapshot_available(&PICKUP, None).await.unwrap().is_empty());

        let outcome = store.record_checkpoint(id, PICKUP).await.unwrap();
        assert_eq!(outcome, CheckpointOutcome::Recorded);

        let snapshot = store.snapshot_available(&PICKUP, None).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].location, Some(PICKUP));
        assert!(snapshot[0].location_updated_at.is_some());
    }

    #[tokio::test]
    async fn broadcast_never_moves_the_stored_position() {
        let (couriers, store) = location_store();
        let id = available_courier(&couriers, Some(PICKUP)).await;
        let mut rx = store.subscribe();

        let far_away = GeoPoint {
            lat: -7.2575,
            lng: 112.7521,
        };
        assert_eq!(store.broadcast(id, far_away).unwrap(), 1);

        let update = rx.recv().await.unwrap();
        assert_eq!(update.courier_id, id);
        assert_eq!(update.location, far_away);

        let stored = couriers.get(id).await.unwrap().unwrap();
        assert_eq!(stored.location, Some(PICKUP));
    }

    #[tokio::test]
    async fn out_of_range_coordinates_are_rejected() {
        let (couriers, store) = location_store();
        let id = available_courier(&couriers, None).await;

        let bogus = GeoPoint { lat: 91.0, lng: 0.0 };
        assert!(store.record_checkpoint(id, bogus).await.is_err());
        assert!(store.broadcast(id, bogus).is_err());
    }

    #[tokio::test]
    async fn unavailable_and_suspended_couriers_leave_the_snapshot_immediately() {
        let (couriers, store) = location_store();
        let a = available_courier(&couriers, Some(PICKUP)).await;
        let b = available_courier(&couriers, Some(PICKUP)).await;
        assert_eq!(store.snapshot_available(&PICKUP, None).await.unwrap().len(), 2);

        store.set_availability(a, false).await.unwrap();
        couriers.set_status(b, CourierStatus::Suspended).await.unwrap();

        assert!(store.snapshot_available(&PICKUP, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshot_radius_prefilters_by_distance() {
        let (couriers, store) = location_store();
        available_courier(&couriers, Some(PICKUP)).await;
        available_courier(
            &couriers,
            Some(GeoPoint {
                lat: -6.9175,
                lng: 107.6191,
            }),
        )
        .await;

        assert_eq!(store.snapshot_available(&PICKUP, Some(25.0)).await.unwrap().len(), 1);
        assert_eq!(store.snapshot_available(&PICKUP, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn checkpoint_for_unknown_courier_is_not_found() {
        let (_couriers, store) = location_store();
        assert!(store.record_checkpoint(Uuid::new_v4(), PICKUP).await.is_err());
    }

    /// Position writes fail as if the database were unreachable; everything else works.
    struct UnwritableCourierStore {
        inner: InMemoryCourierStore,
    }

    #[async_trait]
    impl CourierStore for UnwritableCourierStore {
        async fn insert(&self, courier: Courier) -> Result<(), StoreError> {
            self.inner.insert(courier).await
        }

        async fn get(&self, id: Uuid) -> Result<Option<Courier>, StoreError> {
            self.inner.get(id).await
        }

        async fn list(&self) -> Result<Vec<Courier>, StoreError> {
            self.inner.list().await
        }

        async fn update_location(
            &self,
            _id: Uuid,
            _location: GeoPoint,
            _at: DateTime<Utc>,
        ) -> Result<Courier, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn set_availability(
            &self,
            id: Uuid,
            available: bool,
        ) -> Result<Courier, StoreError> {
            self.inner.set_availability(id, available).await
        }

        async fn set_status(&self, id: Uuid, status: CourierStatus) -> Result<Courier, StoreError> {
            self.inner.set_status(id, status).await
        }

        async fn set_approval(
            &self,
            id: Uuid,
            approval: ApprovalStatus,
        ) -> Result<Courier, StoreError> {
            self.inner.set_approval(id, approval).await
        }
    }

    #[tokio::test]
    async fn failed_checkpoint_write_is_dropped_not_raised() {
        let couriers = Arc::new(UnwritableCourierStore {
            inner: InMemoryCourierStore::new(),
        });
        let metrics = Metrics::new();
        let store = CourierLocationStore::new(
            couriers.clone(),
            Arc::new(InMemoryOrderStore::new()),
            16,
            metrics.clone(),
        );
        let id = available_courier(&couriers.inner, Some(PICKUP)).await;

        let moved = GeoPoint {
            lat: -6.3000,
            lng: 106.9000,
        };
        let outcome = store.record_checkpoint(id, moved).await.unwrap();

        assert_eq!(outcome, CheckpointOutcome::Dropped);
        assert_eq!(couriers.get(id).await.unwrap().unwrap().location, Some(PICKUP));
        assert_eq!(
            metrics
                .checkpoint_writes_total
                .with_label_values(&["dropped"])
                .get(),
            1
        );
        assert_eq!(
            metrics
                .checkpoint_writes_total
                .with_label_values(&["recorded"])
                .get(),
            0
        );
    }
}
