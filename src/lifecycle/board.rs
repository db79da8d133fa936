//! Client-side cache of orders shown on a franchise dashboard

use super::machine::OrderLifecycle;
use super::transitions::legal_actions;
use crate::backend::{guarded, Backend};
use crate::domain::{Order, OrderAction, OrderFilter, OrderStatus};
use crate::error::{CoreError, CoreResult};

use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Display copies of backend orders plus per-order markers
pub struct OrderBoard {
    backend: Arc<dyn Backend>,
    lifecycle: OrderLifecycle,
    request_timeout: Duration,
    /// Cached orders by id
    orders: DashMap<String, Order>,
    /// Orders with a transition in flight
    pending: DashSet<String>,
    /// Orders whose last transition failed and must be refetched
    stale: DashSet<String>,
}

impl OrderBoard {
    pub fn new(backend: Arc<dyn Backend>, request_timeout: Duration) -> Self {
        Self {
            lifecycle: OrderLifecycle::new(backend.clone(), request_timeout),
            backend,
            request_timeout,
            orders: DashMap::new(),
            pending: DashSet::new(),
            stale: DashSet::new(),
        }
    }

    /// Refetch orders matching `filter`, replacing every cached order the
    /// filter covers
    pub async fn refresh(&self, filter: &OrderFilter) -> CoreResult<usize> {
        let fetched = guarded(
            "fetch_orders",
            self.request_timeout,
            self.backend.fetch_orders(filter),
        )
        .await?;

        self.orders.retain(|_, order| !filter.matches(order));
        let count = fetched.len();
        for order in fetched {
            self.insert(order);
        }

        debug!("Order board refreshed: {} orders ({} cached)", count, self.orders.len());
        Ok(count)
    }

    /// Refetch one order
    pub async fn refresh_order(&self, id: &str) -> CoreResult<Order> {
        let result = guarded(
            "fetch_order",
            self.request_timeout,
            self.backend.fetch_order(id),
        )
        .await;

        match result {
            Ok(order) => {
                self.insert(order.clone());
                Ok(order)
            }
            Err(e @ CoreError::OrderNotFound { .. }) => {
                self.orders.remove(id);
                self.stale.remove(id);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Cache an order fetched elsewhere
    pub fn insert(&self, order: Order) {
        if order.has_total_mismatch() {
            warn!(
                "Order {} total {} disagrees with line items ({})",
                order.id,
                order.total_subunits,
                order.computed_total()
            );
        }
        self.stale.remove(&order.id);
        self.orders.insert(order.id.clone(), order);
    }

    pub fn get(&self, id: &str) -> Option<Order> {
        self.orders.get(id).map(|o| o.value().clone())
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Cached orders, oldest first
    pub fn list(&self, filter: &OrderFilter) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| filter.matches(o.value()))
            .map(|o| o.value().clone())
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        orders
    }

    pub fn by_status(&self, status: OrderStatus) -> Vec<Order> {
        self.list(&OrderFilter::with_status(status))
    }

    /// Orders that still accept actions, oldest first
    pub fn active(&self) -> Vec<Order> {
        self.list(&OrderFilter::default())
            .into_iter()
            .filter(|o| !o.status.is_terminal())
            .collect()
    }

    /// Legal actions for a cached order
    pub fn actions_for(&self, id: &str) -> CoreResult<&'static [OrderAction]> {
        self.orders
            .get(id)
            .map(|o| legal_actions(o.status))
            .ok_or_else(|| CoreError::OrderNotFound {
                order_id: id.to_string(),
            })
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    pub fn is_stale(&self, id: &str) -> bool {
        self.stale.contains(id)
    }

    /// Request a transition on a cached order.
    ///
    /// The cached copy changes only after the backend confirms. A backend
    /// failure marks the order stale until it is refetched.
    pub async fn transition(
        &self,
        id: &str,
        action: OrderAction,
        reason: Option<&str>,
    ) -> CoreResult<OrderStatus> {
        let order = self.get(id).ok_or_else(|| CoreError::OrderNotFound {
            order_id: id.to_string(),
        })?;

        if self.is_stale(id) {
            debug!("Order {} is stale; transition uses last known status", id);
        }

        let result = {
            let _pending = PendingMarker::set(&self.pending, id);
            self.lifecycle.request_transition(&order, action, reason).await
        };

        match &result {
            Ok(status) => self.apply_confirmed(id, *status, reason),
            Err(e) if e.requires_refetch() => {
                info!("Order {} marked stale after failed {}", id, action);
                self.stale.insert(id.to_string());
            }
            Err(_) => {}
        }

        result
    }

    /// Apply a backend-confirmed status. `confirmed_at` is backend-owned and
    /// stays as last fetched.
    fn apply_confirmed(&self, id: &str, status: OrderStatus, reason: Option<&str>) {
        if let Some(mut order) = self.orders.get_mut(id) {
            order.status = status;
            if status == OrderStatus::Cancelled {
                order.cancellation_reason = reason.map(|r| r.trim().to_string());
            }
        }
    }
}

/// In-flight marker cleared on drop, so an abandoned request never leaves
/// its order pending
struct PendingMarker<'a> {
    pending: &'a DashSet<String>,
    id: &'a str,
}

impl<'a> PendingMarker<'a> {
    fn set(pending: &'a DashSet<String>, id: &'a str) -> Self {
        pending.insert(id.to_string());
        Self { pending, id }
    }
}

impl Drop for PendingMarker<'_> {
    fn drop(&mut self) {
        self.pending.remove(self.id);
    }
}
