//! Order book error types

use std::fmt;

/// Errors that can occur within the [`super::OrderBook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OrderBookError {
    /// `apply_add` was called with an `order_id` already present in the index.
    DuplicateOrderId(u64),

    /// `apply_modify`/`apply_cancel` was called with an `order_id` not present
    /// in the index.
    UnknownOrderId(u64),
}

impl fmt::Display for OrderBookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderBookError::DuplicateOrderId(id) => write!(f, "duplicate order id: {id}"),
            OrderBookError::UnknownOrderId(id) => write!(f, "unknown order id: {id}"),
        }
    }
}

impl std::error::Error for OrderBookError {}
