//! Static transition table

use crate::domain::{OrderAction, OrderStatus};

/// Actions staff may take on an order in `status`
pub fn legal_actions(status: OrderStatus) -> &'static [OrderAction] {
    match status {
        OrderStatus::Pending => &[OrderAction::Confirm, OrderAction::Cancel],
        OrderStatus::Confirmed => &[OrderAction::StartCooking, OrderAction::Cancel],
        OrderStatus::Cooking => &[OrderAction::FinishCooking],
        OrderStatus::Ready => &[OrderAction::Deliver],
        OrderStatus::Delivered | OrderStatus::Cancelled => &[],
    }
}

/// Status reached by applying `action` from `from`, if legal
pub fn target_status(from: OrderStatus, action: OrderAction) -> Option<OrderStatus> {
    if !legal_actions(from).contains(&action) {
        return None;
    }
    Some(match action {
        OrderAction::Confirm => OrderStatus::Confirmed,
        OrderAction::StartCooking => OrderStatus::Cooking,
        OrderAction::FinishCooking => OrderStatus::Ready,
        OrderAction::Deliver => OrderStatus::Delivered,
        OrderAction::Cancel => OrderStatus::Cancelled,
    })
}
