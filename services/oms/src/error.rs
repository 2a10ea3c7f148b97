//! Error types for order management

use crate::order::OrderStatus;
use services_common::{OrderId, Qty};
use thiserror::Error;

/// Order-management error types
#[derive(Error, Debug)]
pub enum OmsError {
    /// Order constructed with an invalid quantity/price combination
    #[error("validation failed: {message}")]
    Validation {
        /// What was wrong with the request
        message: String,
    },

    /// A provider was asked to register the same symbol twice
    #[error("duplicate symbol: {symbol}")]
    DuplicateSymbol {
        /// The symbol that was already registered
        symbol: String,
    },

    /// Cancel or execution referenced an id not in the active map
    #[error("order not found: {order_id}")]
    OrderNotFound {
        /// The unknown order id
        order_id: OrderId,
    },

    /// Requested state transition is not allowed
    #[error("order {order_id} cannot transition {from:?} -> {to:?}")]
    InvalidTransition {
        /// The order in question
        order_id: OrderId,
        /// Current status
        from: OrderStatus,
        /// Requested status
        to: OrderStatus,
    },

    /// Operation attempted against a terminal order
    #[error("order {order_id} is terminal ({status:?})")]
    Terminal {
        /// The order in question
        order_id: OrderId,
        /// Its terminal status
        status: OrderStatus,
    },

    /// Execution size exceeds the remaining quantity
    #[error("execution of {size} exceeds remaining {remaining} on order {order_id}")]
    Overfill {
        /// The order in question
        order_id: OrderId,
        /// Reported execution size
        size: Qty,
        /// Quantity still open on the order
        remaining: Qty,
    },

    /// Provider refused the order synchronously
    #[error("provider rejected order {order_id}: {reason}")]
    ProviderRejected {
        /// The rejected order
        order_id: OrderId,
        /// Provider-supplied reason
        reason: String,
    },

    /// Provider does not supply the requested capability
    #[error("provider {provider} does not supply {capability}")]
    Unsupported {
        /// Provider name
        provider: String,
        /// Missing capability
        capability: String,
    },

    /// Persistence layer I/O failure
    #[error("persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    /// Persistence layer encoding failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Type alias for order-management results
pub type OmsResult<T> = Result<T, OmsError>;
