//! Validated order transitions

use super::transitions::target_status;
use crate::backend::{guarded, Backend, TransitionRequest};
use crate::domain::{Order, OrderAction, OrderStatus};
use crate::error::{CoreError, CoreResult};

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Order state machine bound to a backend
pub struct OrderLifecycle {
    backend: Arc<dyn Backend>,
    request_timeout: Duration,
}

impl OrderLifecycle {
    pub fn new(backend: Arc<dyn Backend>, request_timeout: Duration) -> Self {
        Self {
            backend,
            request_timeout,
        }
    }

    /// Check a request without contacting the backend.
    /// Returns the status the order is expected to reach.
    pub fn validate(
        order: &Order,
        action: OrderAction,
        reason: Option<&str>,
    ) -> CoreResult<OrderStatus> {
        let target = target_status(order.status, action).ok_or(CoreError::IllegalTransition {
            from: order.status,
            action,
        })?;

        if action == OrderAction::Cancel && reason.map_or(true, |r| r.trim().is_empty()) {
            return Err(CoreError::MissingReason);
        }

        Ok(target)
    }

    /// Ask the backend to apply `action` to `order`.
    ///
    /// `order` is never modified: the returned status is the backend's
    /// answer and the caller updates its copy from it. Backend failures are
    /// returned unchanged and mean the caller must refetch the order.
    pub async fn request_transition(
        &self,
        order: &Order,
        action: OrderAction,
        reason: Option<&str>,
    ) -> CoreResult<OrderStatus> {
        let expected = match Self::validate(order, action, reason) {
            Ok(target) => target,
            Err(e) => {
                debug!("Rejected {} on order {}: {}", action, order.id, e);
                crate::metrics::record_validation_rejection(e.code());
                crate::metrics::record_order_transition(action.as_str(), e.code());
                return Err(e);
            }
        };

        let request = TransitionRequest {
            order_id: order.id.clone(),
            action,
            reason: match action {
                OrderAction::Cancel => reason.map(|r| r.trim().to_string()),
                _ => None,
            },
        };

        let result = guarded(
            "transition_order",
            self.request_timeout,
            self.backend.transition_order(request),
        )
        .await;

        match result {
            Ok(status) => {
                if status != expected {
                    warn!(
                        "Backend moved order {} to {} (expected {}) after {}",
                        order.id, status, expected, action
                    );
                }
                info!("Order {} {} -> {} via {}", order.id, order.status, status, action);
                crate::metrics::record_order_transition(action.as_str(), "ok");
                Ok(status)
            }
            Err(e) => {
                warn!("Transition {} on order {} failed: {}", action, order.id, e);
                crate::metrics::record_order_transition(action.as_str(), e.code());
                Err(e)
            }
        }
    }
}
