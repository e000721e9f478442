use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::geo::haversine_km;
use crate::models::courier::{ApprovalStatus, Courier, CourierStatus, GeoPoint, VehicleType};

/// A courier that passed every eligibility check for one dispatch attempt.
/// Built fresh per attempt and never cached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DispatchCandidate {
    pub courier_id: Uuid,
    pub distance_km: f64,
    pub active_orders: u32,
    pub vehicle_type: VehicleType,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum Ineligibility {
    #[error("courier has no checkpointed position")]
    NoPosition,

    #[error("courier is not available")]
    Unavailable,

    #[error("courier is suspended")]
    Suspended,

    #[error("courier registration is not approved")]
    NotApproved,

    #[error("courier already has {active_orders} active orders (max {max_active_orders})")]
    AtCapacity {
        active_orders: u32,
        max_active_orders: u32,
    },

    #[error("courier is {distance_km:.2} km away (max {max_distance_km} km)")]
    OutOfRange {
        distance_km: f64,
        max_distance_km: f64,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct CandidateFilter {
    max_active_orders: u32,
}

impl CandidateFilter {
    pub fn new(max_active_orders: u32) -> Self {
        Self { max_active_orders }
    }

    pub fn max_active_orders(&self) -> u32 {
        self.max_active_orders
    }

    /// Checks that do not depend on where the pickup is. Shared with manual assignment.
    pub fn check(&self, courier: &Courier, active_orders: u32) -> Result<(), Ineligibility> {
        if courier.approval != ApprovalStatus::Approved {
            return Err(Ineligibility::NotApproved);
        }
        if courier.status != CourierStatus::Active {
            return Err(Ineligibility::Suspended);
        }
        if !courier.available {
            return Err(Ineligibility::Unavailable);
        }
        if active_orders >= self.max_active_orders {
            return Err(Ineligibility::AtCapacity {
                active_orders,
                max_active_orders: self.max_active_orders,
            });
        }
        Ok(())
    }

    /// Full eligibility against a pickup point.
    pub fn evaluate(
        &self,
        courier: &Courier,
        active_orders: u32,
        pickup: &GeoPoint,
        max_distance_km: f64,
    ) -> Result<DispatchCandidate, Ineligibility> {
        let location = courier.location.as_ref().ok_or(Ineligibility::NoPosition)?;
        self.check(courier, active_orders)?;

        let distance_km = haversine_km(location, pickup);
        if distance_km > max_distance_km {
            return Err(Ineligibility::OutOfRange {
                distance_km,
                max_distance_km,
            });
        }

        Ok(DispatchCandidate {
            courier_id: courier.id,
            distance_km,
            active_orders,
            vehicle_type: courier.vehicle_type,
        })
    }

    pub fn filter(
        &self,
        pickup: &GeoPoint,
        max_distance_km: f64,
        pool: &[Courier],
        loads: &HashMap<Uuid, u32>,
    ) -> Vec<DispatchCandidate> {
        pool.iter()
            .filter_map(|courier| {
                let active_orders = loads.get(&courier.id).copied().unwrap_or(0);
                match self.evaluate(courier, active_orders, pickup, max_distance_km) {
                    Ok(candidate) => Some(candidate),
                    Err(reason) => {
                        debug!(courier_id = %courier.id, %reason, "courier filtered out");
                        None
                    }
                }
            })
            .collect()
    }
}
