//! Error types for the dashboard core

use crate::domain::{OrderAction, OrderStatus};
use thiserror::Error;

/// Main error type for the dashboard core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid conversion rate {rate}: must be between 1 and 1000")]
    InvalidRate { rate: i64 },

    #[error("No holders selected for conversion")]
    EmptySelection,

    #[error("Action {action} is not allowed from status {from}")]
    IllegalTransition {
        from: OrderStatus,
        action: OrderAction,
    },

    #[error("Cancellation requires a reason")]
    MissingReason,

    #[error("Unknown order action: {0}")]
    UnknownAction(String),

    #[error("Order {order_id} not found")]
    OrderNotFound { order_id: String },

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Backend rejected request: {0}")]
    BackendRejected(String),

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CoreError {
    /// Validation failure detected before any backend call
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidRate { .. }
                | CoreError::EmptySelection
                | CoreError::IllegalTransition { .. }
                | CoreError::MissingReason
                | CoreError::UnknownAction(_)
                | CoreError::OrderNotFound { .. }
        )
    }

    /// Check if error is retryable without changing the request
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::BackendUnavailable(_) | CoreError::Timeout { .. }
        )
    }

    /// Collaborator failures leave the cached copy untrustworthy
    pub fn requires_refetch(&self) -> bool {
        matches!(
            self,
            CoreError::BackendUnavailable(_)
                | CoreError::BackendRejected(_)
                | CoreError::Timeout { .. }
        )
    }

    /// Stable machine-readable code for presentation layers
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidRate { .. } => "invalid_rate",
            CoreError::EmptySelection => "empty_selection",
            CoreError::IllegalTransition { .. } => "illegal_transition",
            CoreError::MissingReason => "missing_reason",
            CoreError::UnknownAction(_) => "unknown_action",
            CoreError::OrderNotFound { .. } => "order_not_found",
            CoreError::BackendUnavailable(_) => "backend_unavailable",
            CoreError::BackendRejected(_) => "backend_rejected",
            CoreError::Timeout { .. } => "timeout",
            CoreError::Config(_) => "config",
        }
    }
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
