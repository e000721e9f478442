use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::{DeliveryOrder, OrderStatus};
use crate::store::Stores;

/// Applies a post-claim lifecycle move. `Assigned` is refused here; only a claim may assign.
pub async fn advance_order(
    stores: &Stores,
    order_id: Uuid,
    next: OrderStatus,
) -> Result<DeliveryOrder, AppError> {
    if next == OrderStatus::Assigned {
        return Err(AppError::BadRequest(
            "orders are assigned through dispatch only".to_string(),
        ));
    }

    let previous_courier = stores
        .orders
        .get(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?
        .courier_id;

    let order = stores.orders.transition(order_id, next).await?;

    if next == OrderStatus::Cancelled {
        match stores.earnings.void_for_order(order_id).await {
            Ok(voided) if voided > 0 => {
                info!(order_id = %order_id, voided, "pending earnings voided")
            }
            Ok(_) => {}
            Err(err) => warn!(order_id = %order_id, error = %err, "failed to void pending earnings"),
        }
    }

    info!(
        order_id = %order_id,
        status = ?order.status,
        released_courier = ?previous_courier.filter(|_| next.is_terminal()),
        "order status advanced"
    );

    Ok(order)
}
