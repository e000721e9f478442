use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::DispatchSettings;
use crate::engine::filter::{CandidateFilter, Ineligibility};
use crate::engine::location::CourierLocationStore;
use crate::engine::scoring::{DispatchScorer, ScoredCandidate};
use crate::error::{DispatchError, StoreError};
use crate::geo::haversine_km;
use crate::models::assignment::{Assignment, AssignmentSource, CostBreakdown};
use crate::models::courier::{GeoPoint, VehicleType};
use crate::models::earning::{courier_share, CourierEarning, EarningStatus};
use crate::models::notification::Notification;
use crate::models::order::DeliveryOrder;
use crate::observability::metrics::Metrics;
use crate::store::{ClaimOutcome, ClaimRequest, Stores};

#[derive(Debug, Clone, Deserialize)]
pub struct AutoAssignRequest {
    pub order_id: Uuid,
    pub merchant_lat: Option<f64>,
    pub merchant_lng: Option<f64>,
    pub max_distance_km: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignedCourier {
    pub id: Uuid,
    pub name: String,
    pub distance_km: f64,
    pub vehicle_type: VehicleType,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutoAssignResponse {
    pub success: bool,
    pub order_id: Uuid,
    pub courier: AssignedCourier,
    pub candidates_count: usize,
    pub cost: CostBreakdown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManualAssignRequest {
    pub order_id: Uuid,
    pub courier_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManualAssignResponse {
    pub success: bool,
    pub order_id: Uuid,
    pub courier_id: Uuid,
}

/// Moves orders from unassigned to assigned, exactly once.
///
/// Both paths end in [`Dispatcher::claim`], which delegates to the order store's
/// compare-and-swap. Nothing else in the crate sets an order's courier.
#[derive(Clone)]
pub struct Dispatcher {
    stores: Stores,
    locations: CourierLocationStore,
    assignment_events_tx: broadcast::Sender<Assignment>,
    filter: CandidateFilter,
    scorer: DispatchScorer,
    settings: DispatchSettings,
    metrics: Metrics,
}

impl Dispatcher {
    pub fn new(
        stores: Stores,
        locations: CourierLocationStore,
        assignment_events_tx: broadcast::Sender<Assignment>,
        settings: DispatchSettings,
        metrics: Metrics,
    ) -> Self {
        Self {
            filter: CandidateFilter::new(settings.max_active_orders),
            scorer: DispatchScorer::new(settings.load_penalty_km),
            stores,
            locations,
            assignment_events_tx,
            settings,
            metrics,
        }
    }

    pub async fn auto_assign(
        &self,
        request: AutoAssignRequest,
    ) -> Result<AutoAssignResponse, DispatchError> {
        let start = Instant::now();
        let order_id = request.order_id;
        let result = self.run_auto(request).await;
        self.observe("auto", order_id, &result.as_ref().map(|_| ()), start);
        result
    }

    pub async fn manual_assign(
        &self,
        request: ManualAssignRequest,
    ) -> Result<ManualAssignResponse, DispatchError> {
        let start = Instant::now();
        let order_id = request.order_id;
        let result = self.run_manual(request).await;
        self.observe("manual", order_id, &result.as_ref().map(|_| ()), start);
        result
    }

    async fn run_auto(
        &self,
        request: AutoAssignRequest,
    ) -> Result<AutoAssignResponse, DispatchError> {
        let max_distance_km = request
            .max_distance_km
            .unwrap_or(self.settings.default_max_distance_km);
        if !(max_distance_km.is_finite() && max_distance_km > 0.0) {
            return Err(DispatchError::InvalidRequest(
                "max_distance_km must be a positive number".to_string(),
            ));
        }
        let requested_pickup = requested_pickup(request.merchant_lat, request.merchant_lng)?;

        let order = self.load_order(request.order_id).await?;
        if !order.is_unassigned() {
            return Err(rejection(&order));
        }

        let pickup = self.resolve_pickup(requested_pickup, &order);
        // The pre-filter may only narrow the pool down to the request radius, never below it.
        let snapshot_radius_km = self
            .settings
            .snapshot_radius_km
            .map(|radius| radius.max(max_distance_km));

        let snapshot = async {
            let pool = self
                .locations
                .snapshot_available(&pickup, snapshot_radius_km)
                .await?;
            let loads = self.locations.active_order_counts().await?;
            Ok::<_, StoreError>((pool, loads))
        };
        let (pool, loads) = timeout(self.settings.snapshot_timeout, snapshot)
            .await
            .map_err(|_| DispatchError::SnapshotTimeout)?
            .map_err(|err| DispatchError::Persistence(err.to_string()))?;

        let candidates_count = pool.len();
        self.metrics
            .dispatch_pool_size
            .observe(candidates_count as f64);

        let candidates = self.filter.filter(&pickup, max_distance_km, &pool, &loads);
        let eligible = candidates.len();
        let ranking = self.scorer.rank(candidates);

        for scored in ranking {
            let courier_id = scored.candidate.courier_id;
            match self.claim(order.id, courier_id).await? {
                ClaimOutcome::Claimed(claimed) => {
                    let name = pool
                        .iter()
                        .find(|courier| courier.id == courier_id)
                        .map(|courier| courier.name.clone())
                        .unwrap_or_default();

                    self.commit(&claimed, courier_id, AssignmentSource::Auto, Some(&scored))
                        .await;

                    info!(
                        order_id = %claimed.id,
                        courier_id = %courier_id,
                        distance_km = scored.cost.distance_km,
                        cost = scored.cost.total,
                        eligible,
                        candidates_count,
                        "order auto-assigned"
                    );

                    return Ok(AutoAssignResponse {
                        success: true,
                        order_id: claimed.id,
                        courier: AssignedCourier {
                            id: courier_id,
                            name,
                            distance_km: scored.cost.distance_km,
                            vehicle_type: scored.candidate.vehicle_type,
                        },
                        candidates_count,
                        cost: scored.cost,
                    });
                }
                ClaimOutcome::CourierAtCapacity { active_orders } => {
                    info!(
                        order_id = %order.id,
                        courier_id = %courier_id,
                        active_orders,
                        "courier filled up before the claim; trying the next candidate"
                    );
                }
                other => return Err(self.claim_rejection(order.id, other)),
            }
        }

        Err(DispatchError::NoEligibleCourier { candidates_count })
    }

    async fn run_manual(
        &self,
        request: ManualAssignRequest,
    ) -> Result<ManualAssignResponse, DispatchError> {
        let order = self.load_order(request.order_id).await?;
        if !order.is_unassigned() {
            return Err(rejection(&order));
        }

        let courier = self
            .stores
            .couriers
            .get(request.courier_id)
            .await
            .map_err(|err| DispatchError::Persistence(err.to_string()))?
            .ok_or(DispatchError::CourierNotFound(request.courier_id))?;

        let active_orders = self
            .locations
            .active_orders(courier.id)
            .await
            .map_err(|err| DispatchError::Persistence(err.to_string()))?;

        self.filter
            .check(&courier, active_orders)
            .map_err(|reason| DispatchError::CourierNotEligible {
                courier_id: courier.id,
                reason,
            })?;

        match self.claim(order.id, courier.id).await? {
            ClaimOutcome::Claimed(claimed) => {
                self.commit(&claimed, courier.id, AssignmentSource::Manual, None)
                    .await;

                info!(order_id = %claimed.id, courier_id = %courier.id, "order manually assigned");

                Ok(ManualAssignResponse {
                    success: true,
                    order_id: claimed.id,
                    courier_id: courier.id,
                })
            }
            ClaimOutcome::CourierAtCapacity { active_orders } => {
                Err(DispatchError::CourierNotEligible {
                    courier_id: courier.id,
                    reason: Ineligibility::AtCapacity {
                        active_orders,
                        max_active_orders: self.filter.max_active_orders(),
                    },
                })
            }
            other => Err(self.claim_rejection(order.id, other)),
        }
    }

    /// The atomic claim, retried once if the store write itself fails.
    async fn claim(&self, order_id: Uuid, courier_id: Uuid) -> Result<ClaimOutcome, DispatchError> {
        let request = ClaimRequest {
            order_id,
            courier_id,
            max_active_orders: self.settings.max_active_orders,
            at: Utc::now(),
        };

        let first_err = match self.stores.orders.try_claim(request).await {
            Ok(outcome) => return Ok(outcome),
            Err(err) => err,
        };

        warn!(
            order_id = %order_id,
            courier_id = %courier_id,
            error = %first_err,
            "claim write failed; retrying once"
        );
        sleep(self.settings.claim_retry_backoff).await;

        match self.stores.orders.try_claim(request).await {
            Ok(ClaimOutcome::AlreadyAssigned {
                courier_id: Some(holder),
            }) if holder == courier_id => {
                // The first write may have landed before the error surfaced.
                let order = self.load_order(order_id).await?;
                if order.assigned_at == Some(request.at) {
                    Ok(ClaimOutcome::Claimed(order))
                } else {
                    Ok(ClaimOutcome::AlreadyAssigned {
                        courier_id: Some(holder),
                    })
                }
            }
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                error!(
                    order_id = %order_id,
                    courier_id = %courier_id,
                    error = %err,
                    "claim write failed after retry"
                );
                Err(DispatchError::Persistence(err.to_string()))
            }
        }
    }

    /// Side effects of a committed claim. None of them can undo it, so failures are logged.
    async fn commit(
        &self,
        order: &DeliveryOrder,
        courier_id: Uuid,
        source: AssignmentSource,
        scored: Option<&ScoredCandidate>,
    ) -> Assignment {
        let distance_km = match scored {
            Some(scored) => Some(scored.cost.distance_km),
            None => self.manual_distance(order, courier_id).await,
        };

        let assignment = Assignment {
            id: Uuid::new_v4(),
            order_id: order.id,
            courier_id,
            source,
            distance_km,
            cost: scored.map(|scored| scored.cost),
            assigned_at: order.assigned_at.unwrap_or_else(Utc::now),
        };

        if let Err(err) = self.stores.assignments.record(assignment.clone()).await {
            error!(order_id = %order.id, error = %err, "failed to record assignment");
        }
        let _ = self.assignment_events_tx.send(assignment.clone());

        let notification = Notification::new_assignment(courier_id, order.id);
        if let Err(err) = self.stores.notifications.notify(notification).await {
            warn!(courier_id = %courier_id, error = %err, "failed to notify courier");
        }

        let earning = CourierEarning {
            id: Uuid::new_v4(),
            courier_id,
            order_id: order.id,
            amount: courier_share(order.shipping_cost, self.settings.courier_earning_share),
            status: EarningStatus::Pending,
            created_at: Utc::now(),
        };
        if let Err(err) = self.stores.earnings.append_pending(earning).await {
            error!(order_id = %order.id, courier_id = %courier_id, error = %err, "failed to record pending earning");
        }

        assignment
    }

    async fn manual_distance(&self, order: &DeliveryOrder, courier_id: Uuid) -> Option<f64> {
        let pickup = order.pickup?;
        let courier = self.stores.couriers.get(courier_id).await.ok().flatten()?;
        courier
            .location
            .map(|location| haversine_km(&location, &pickup))
    }

    async fn load_order(&self, order_id: Uuid) -> Result<DeliveryOrder, DispatchError> {
        self.stores
            .orders
            .get(order_id)
            .await
            .map_err(|err| DispatchError::Persistence(err.to_string()))?
            .ok_or(DispatchError::OrderNotFound(order_id))
    }

    fn resolve_pickup(&self, requested: Option<GeoPoint>, order: &DeliveryOrder) -> GeoPoint {
        if let Some(pickup) = requested.or(order.pickup) {
            return pickup;
        }

        let fallback = self.settings.fallback_pickup;
        warn!(
            order_id = %order.id,
            merchant_id = %order.merchant_id,
            lat = fallback.lat,
            lng = fallback.lng,
            "no pickup location on file; using the fallback coordinate"
        );
        fallback
    }

    fn claim_rejection(&self, order_id: Uuid, outcome: ClaimOutcome) -> DispatchError {
        match outcome {
            ClaimOutcome::AlreadyAssigned { courier_id } => {
                info!(order_id = %order_id, "order claimed by a concurrent dispatch");
                DispatchError::AlreadyAssigned {
                    order_id,
                    courier_id,
                }
            }
            ClaimOutcome::NotDispatchable { status } => {
                DispatchError::NotDispatchable { order_id, status }
            }
            ClaimOutcome::NotFound => DispatchError::OrderNotFound(order_id),
            ClaimOutcome::CourierAtCapacity { .. } | ClaimOutcome::Claimed(_) => {
                DispatchError::Persistence("unexpected claim outcome".to_string())
            }
        }
    }

    fn observe(
        &self,
        path: &str,
        order_id: Uuid,
        result: &Result<(), &DispatchError>,
        start: Instant,
    ) {
        let outcome = match result {
            Ok(()) => "success".to_string(),
            Err(err) => err.code().to_ascii_lowercase(),
        };

        if let Err(err) = result {
            match err {
                DispatchError::Persistence(_) | DispatchError::SnapshotTimeout => {
                    error!(order_id = %order_id, path, error = %err, "dispatch failed");
                }
                _ => info!(order_id = %order_id, path, outcome = %outcome, "dispatch not committed"),
            }
        }

        self.metrics
            .observe_dispatch(path, &outcome, start.elapsed());
    }
}

fn requested_pickup(lat: Option<f64>, lng: Option<f64>) -> Result<Option<GeoPoint>, DispatchError> {
    match (lat, lng) {
        (None, None) => Ok(None),
        (Some(lat), Some(lng)) => {
            let point = GeoPoint { lat, lng };
            if point.is_valid() {
                Ok(Some(point))
            } else {
                Err(DispatchError::InvalidRequest(format!(
                    "merchant coordinates out of range: lat={lat}, lng={lng}"
                )))
            }
        }
        _ => Err(DispatchError::InvalidRequest(
            "merchant_lat and merchant_lng must be supplied together".to_string(),
        )),
    }
}

/// Early rejection for an order that is no longer waiting for a courier.
fn rejection(order: &DeliveryOrder) -> DispatchError {
    if order.status.is_terminal() {
        DispatchError::NotDispatchable {
            order_id: order.id,
            status: order.status,
        }
    } else {
        DispatchError::AlreadyAssigned {
            order_id: order.id,
            courier_id: order.courier_id,
        }
    }
}
