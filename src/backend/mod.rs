//! Backend collaborator boundary
//!
//! The backend is the sole writer of holder balances and order status. The
//! core talks to it only through the [`Backend`] trait:
//! - Holder and order snapshots (full replace on every fetch)
//! - Batch conversion execution (atomic, all-or-nothing)
//! - Order status transitions

mod http;

pub use http::HttpBackend;

use crate::domain::{
    ConversionRate, ConversionReceipt, Holder, Order, OrderAction, OrderFilter, OrderStatus,
};
use crate::error::{CoreError, CoreResult};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

/// Payload for `ExecuteConversion`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// Idempotency key so the backend can drop duplicate submissions
    pub request_id: Uuid,
    pub addresses: Vec<String>,
    pub rate: ConversionRate,
}

/// Payload for `TransitionOrder`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub order_id: String,
    pub action: OrderAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Remote backend consumed by the conversion engine and the order lifecycle
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    async fn fetch_holders(&self) -> CoreResult<Vec<Holder>>;

    async fn fetch_order(&self, id: &str) -> CoreResult<Order>;

    async fn fetch_orders(&self, filter: &OrderFilter) -> CoreResult<Vec<Order>>;

    async fn execute_conversion(&self, request: ConversionRequest)
        -> CoreResult<ConversionReceipt>;

    async fn transition_order(&self, request: TransitionRequest) -> CoreResult<OrderStatus>;
}

/// Run a backend call under a deadline.
///
/// An elapsed deadline is reported as [`CoreError::Timeout`], never as
/// success or as an unknown outcome.
pub async fn guarded<T, F>(operation: &'static str, limit: Duration, call: F) -> CoreResult<T>
where
    F: Future<Output = CoreResult<T>>,
{
    let started = Instant::now();
    debug!("Backend call {} started", operation);

    let result = match timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Backend call {} timed out after {:?}", operation, limit);
            Err(CoreError::Timeout {
                operation: operation.to_string(),
            })
        }
    };

    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => e.code(),
    };
    crate::metrics::record_backend_call(operation, outcome, started.elapsed().as_secs_f64());

    result
}
