//! Order state transition rules.

use crate::error::{OmsError, OmsResult};
use crate::order::OrderStatus;
use rustc_hash::FxHashMap;
use services_common::OrderId;
use std::sync::LazyLock;
use tracing::trace;

static LIFECYCLE: LazyLock<OrderLifecycle> = LazyLock::new(OrderLifecycle::new);

/// Table of valid order state transitions
#[derive(Debug)]
pub struct OrderLifecycle {
    valid: FxHashMap<OrderStatus, Vec<OrderStatus>>,
}

impl OrderLifecycle {
    /// Build the transition table
    #[must_use]
    pub fn new() -> Self {
        let mut valid = FxHashMap::default();

        valid.insert(
            OrderStatus::Created,
            vec![OrderStatus::Submitted, OrderStatus::Rejected],
        );
        valid.insert(
            OrderStatus::Submitted,
            vec![
                OrderStatus::PartiallyFilled,
                OrderStatus::Filled,
                OrderStatus::Cancelled,
                OrderStatus::Rejected,
            ],
        );
        valid.insert(
            OrderStatus::PartiallyFilled,
            vec![
                OrderStatus::Filled,
                OrderStatus::Cancelled,
                OrderStatus::Rejected,
            ],
        );

        // Terminal states permit nothing further
        valid.insert(OrderStatus::Filled, vec![]);
        valid.insert(OrderStatus::Cancelled, vec![]);
        valid.insert(OrderStatus::Rejected, vec![]);

        Self { valid }
    }

    /// Check whether `from -> to` is a legal transition
    #[must_use]
    pub fn is_valid(&self, from: OrderStatus, to: OrderStatus) -> bool {
        self.valid.get(&from).is_some_and(|next| next.contains(&to))
    }

    /// Statuses reachable from `status`
    #[must_use]
    pub fn valid_transitions(&self, status: OrderStatus) -> &[OrderStatus] {
        self.valid.get(&status).map_or(&[], Vec::as_slice)
    }

    /// Whether an order in `status` can still be cancelled
    #[must_use]
    pub fn can_cancel(&self, status: OrderStatus) -> bool {
        self.is_valid(status, OrderStatus::Cancelled)
    }
}

impl Default for OrderLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a transition against the process-wide table
pub fn validate_transition(
    order_id: OrderId,
    from: OrderStatus,
    to: OrderStatus,
) -> OmsResult<()> {
    if LIFECYCLE.is_valid(from, to) {
        trace!(%order_id, ?from, ?to, "state transition");
        Ok(())
    } else {
        Err(OmsError::InvalidTransition { order_id, from, to })
    }
}

/// Whether an order in `status` can still be cancelled
#[must_use]
pub fn can_cancel(status: OrderStatus) -> bool {
    LIFECYCLE.can_cancel(status)
}
