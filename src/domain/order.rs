//! Order display copies and the staff actions that move them along

use crate::error::CoreError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Cooking,
    Ready,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Cooking,
        OrderStatus::Ready,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Delivered and Cancelled accept no further actions
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Cooking => "cooking",
            OrderStatus::Ready => "ready",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Staff action requesting a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderAction {
    Confirm,
    StartCooking,
    FinishCooking,
    Deliver,
    Cancel,
}

impl OrderAction {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderAction::Confirm => "confirm",
            OrderAction::StartCooking => "startCooking",
            OrderAction::FinishCooking => "finishCooking",
            OrderAction::Deliver => "deliver",
            OrderAction::Cancel => "cancel",
        }
    }

    /// Status this action leads to from `status`, or `None` when illegal there
    pub fn target_from(self, status: OrderStatus) -> Option<OrderStatus> {
        crate::lifecycle::target_status(status, self)
    }
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirm" => Ok(OrderAction::Confirm),
            "startCooking" => Ok(OrderAction::StartCooking),
            "finishCooking" => Ok(OrderAction::FinishCooking),
            "deliver" => Ok(OrderAction::Deliver),
            "cancel" => Ok(OrderAction::Cancel),
            other => Err(CoreError::UnknownAction(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub menu_item_id: String,
    pub quantity: u32,
    pub unit_price_subunits: u64,
}

impl LineItem {
    pub fn subtotal_subunits(&self) -> u128 {
        u128::from(self.quantity) * u128::from(self.unit_price_subunits)
    }
}

/// Client-side copy of a backend order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub customer_reference: String,
    pub line_items: Vec<LineItem>,
    pub total_subunits: u64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
}

impl Order {
    /// Sum of line item subtotals
    pub fn computed_total(&self) -> u128 {
        self.line_items.iter().map(LineItem::subtotal_subunits).sum()
    }

    /// True when the reported total disagrees with the line items
    pub fn has_total_mismatch(&self) -> bool {
        self.computed_total() != u128::from(self.total_subunits)
    }
}

/// Filter passed to `FetchOrders`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilter {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub customer_reference: Option<String>,
}

impl OrderFilter {
    pub fn with_status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            customer_reference: None,
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.status.map_or(true, |s| s == order.status)
            && self
                .customer_reference
                .as_deref()
                .map_or(true, |c| c == order.customer_reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        Order {
            id: "ORDER_1".into(),
            customer_reference: "wallet1".into(),
            line_items: vec![
                LineItem {
                    menu_item_id: "m1".into(),
                    quantity: 2,
                    unit_price_subunits: 1000,
                },
                LineItem {
                    menu_item_id: "m2".into(),
                    quantity: 1,
                    unit_price_subunits: 250,
                },
            ],
            total_subunits: 2250,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            confirmed_at: None,
            cancellation_reason: None,
        }
    }

    #[test]
    fn test_action_names_round_trip_through_from_str() {
        for action in [
            OrderAction::Confirm,
            OrderAction::StartCooking,
            OrderAction::FinishCooking,
            OrderAction::Deliver,
            OrderAction::Cancel,
        ] {
            assert_eq!(action.as_str().parse::<OrderAction>().unwrap(), action);
        }
        assert_eq!(
            "cook".parse::<OrderAction>(),
            Err(CoreError::UnknownAction("cook".into()))
        );
    }

    #[test]
    fn test_action_wire_format_is_camel_case() {
        assert_eq!(
            serde_json::to_string(&OrderAction::StartCooking).unwrap(),
            "\"startCooking\""
        );
        assert_eq!(
            serde_json::to_string(&OrderStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
    }

    #[test]
    fn test_target_from() {
        assert_eq!(
            OrderAction::Confirm.target_from(OrderStatus::Pending),
            Some(OrderStatus::Confirmed)
        );
        assert_eq!(
            OrderAction::Cancel.target_from(OrderStatus::Confirmed),
            Some(OrderStatus::Cancelled)
        );
        assert_eq!(OrderAction::Cancel.target_from(OrderStatus::Cooking), None);
        assert_eq!(OrderAction::Deliver.target_from(OrderStatus::Delivered), None);
    }

    #[test]
    fn test_terminal_statuses() {
        let terminal: Vec<_> = OrderStatus::ALL
            .iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(terminal, vec![&OrderStatus::Delivered, &OrderStatus::Cancelled]);
    }

    #[test]
    fn test_computed_total() {
        let mut order = sample_order();
        assert_eq!(order.computed_total(), 2250);
        assert!(!order.has_total_mismatch());

        order.total_subunits = 2000;
        assert!(order.has_total_mismatch());
    }

    #[test]
    fn test_computed_total_with_max_prices() {
        let mut order = sample_order();
        order.line_items = vec![
            LineItem {
                menu_item_id: "m1".into(),
                quantity: u32::MAX,
                unit_price_subunits: u64::MAX,
            },
            LineItem {
                menu_item_id: "m2".into(),
                quantity: 1,
                unit_price_subunits: u64::MAX,
            },
        ];
        order.total_subunits = u64::MAX;

        let expected = u128::from(u32::MAX) * u128::from(u64::MAX) + u128::from(u64::MAX);
        assert_eq!(order.computed_total(), expected);
        assert!(order.has_total_mismatch());
    }

    #[test]
    fn test_filter_matches() {
        let order = sample_order();
        assert!(OrderFilter::default().matches(&order));
        assert!(OrderFilter::with_status(OrderStatus::Pending).matches(&order));
        assert!(!OrderFilter::with_status(OrderStatus::Ready).matches(&order));

        let by_customer = OrderFilter {
            status: None,
            customer_reference: Some("wallet2".into()),
        };
        assert!(!by_customer.matches(&order));
    }
}
