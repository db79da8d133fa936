//! Domain value types shared by the conversion engine and the order lifecycle
//!
//! Holders and orders are read-only snapshots of backend state. Nothing in
//! this module performs I/O.

mod order;
mod token;

pub use order::{LineItem, Order, OrderAction, OrderFilter, OrderStatus};
pub use token::{ConversionRate, ConversionReceipt, Holder, IssuedAmount};
