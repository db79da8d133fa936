//! Token conversion batches
//!
//! The conversion engine:
//! 1. Holds the last holder snapshot fetched from the backend
//! 2. Tracks which holders are selected and at which rate they convert
//! 3. Computes the batch summary from scratch on every change
//! 4. Submits the batch to the backend and clears the selection on success

pub mod engine;
pub mod selection;
pub mod summary;

pub use engine::{ConversionBatchEngine, ConversionPlan};
pub use selection::Selection;
pub use summary::{
    compute_summary, reconcile, ConversionLineResult, ConversionSummary, ReceiptDiscrepancy,
};
