use serde::Serialize;

use crate::engine::filter::DispatchCandidate;
use crate::models::assignment::CostBreakdown;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScoredCandidate {
    pub candidate: DispatchCandidate,
    pub cost: CostBreakdown,
}

/// Ranks candidates by `distance_km + active_orders * load_penalty_km`, lowest first.
#[derive(Debug, Clone, Copy)]
pub struct DispatchScorer {
    load_penalty_km: f64,
}

impl DispatchScorer {
    pub fn new(load_penalty_km: f64) -> Self {
        Self { load_penalty_km }
    }

    pub fn compute_cost(&self, candidate: &DispatchCandidate) -> CostBreakdown {
        let load_penalty_km = candidate.active_orders as f64 * self.load_penalty_km;

        CostBreakdown {
            distance_km: candidate.distance_km,
            active_orders: candidate.active_orders,
            load_penalty_km,
            total: candidate.distance_km + load_penalty_km,
        }
    }

    /// Best first. Equal costs fall back to courier id so the same input always ranks the same.
    pub fn rank(&self, candidates: Vec<DispatchCandidate>) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|candidate| ScoredCandidate {
                cost: self.compute_cost(&candidate),
                candidate,
            })
            .collect();

        scored.sort_by(|a, b| {
            a.cost
                .total
                .total_cmp(&b.cost.total)
                .then_with(|| a.candidate.courier_id.cmp(&b.candidate.courier_id))
        });

        scored
    }
}
