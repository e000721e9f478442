use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    pub order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new_assignment(courier_id: Uuid, order_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: courier_id,
            title: "New delivery assigned".to_string(),
            body: format!("Order {order_id} is waiting for pickup."),
            order_id: Some(order_id),
            created_at: Utc::now(),
        }
    }
}
