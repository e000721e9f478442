use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EarningStatus {
    Pending,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierEarning {
    pub id: Uuid,
    pub courier_id: Uuid,
    pub order_id: Uuid,
    pub amount: u64,
    pub status: EarningStatus,
    pub created_at: DateTime<Utc>,
}

/// The courier's cut of a shipping cost, rounded to the nearest minor unit.
pub fn courier_share(shipping_cost: u64, share: f64) -> u64 {
    (shipping_cost as f64 * share.clamp(0.0, 1.0)).round() as u64
}

#[cfg(test)]
mod tests {
    use super::courier_share;

    #[test]
    fn eighty_percent_of_shipping_cost() {
        assert_eq!(courier_share(10_000, 0.8), 8_000);
        assert_eq!(courier_share(12_345, 0.8), 9_876);
        assert_eq!(courier_share(0, 0.8), 0);
    }
}
