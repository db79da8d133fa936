//! Order lifecycle for franchise staff
//!
//! ```text
//!   Pending ──confirm──▶ Confirmed ──startCooking──▶ Cooking ──finishCooking──▶ Ready ──deliver──▶ Delivered
//!      │                    │
//!      └──────cancel────────┴──────────▶ Cancelled
//! ```
//!
//! Status is written only by the backend. The lifecycle validates requests
//! locally and reports the new status once the backend confirms it.

pub mod board;
pub mod machine;
pub mod transitions;

pub use board::OrderBoard;
pub use machine::OrderLifecycle;
pub use transitions::{legal_actions, target_status};
