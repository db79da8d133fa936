//! Hot Pot dashboard core
//!
//! Client-side decision logic shared by the owner, franchise, point-of-sale
//! and mobile dashboards:
//! - Utility → security token conversion batches ([`conversion`])
//! - Staff-driven order lifecycle ([`lifecycle`])
//!
//! Every client computing a conversion summary or gating an order action
//! goes through these types, so all of them agree before the backend is
//! called.

pub mod api;
pub mod backend;
pub mod config;
pub mod conversion;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod metrics;

pub use backend::{Backend, HttpBackend};
pub use conversion::{ConversionBatchEngine, ConversionSummary};
pub use domain::{ConversionRate, Holder, Order, OrderAction, OrderStatus};
pub use error::{CoreError, CoreResult};
pub use lifecycle::{OrderBoard, OrderLifecycle};
