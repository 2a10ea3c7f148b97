//! Order and execution definitions.
//!
//! An [`Order`] tracks ordered/filled/remaining quantity with strict
//! partial-fill accounting: `filled + remaining == quantity` holds at every
//! instant, and the running price-times-quantity sum keeps the average fill
//! price exact in tick space.

use crate::error::{OmsError, OmsResult};
use crate::lifecycle;
use serde::{Deserialize, Serialize};
use services_common::{Delegate, InstrumentRef, OrderId, Px, Qty, Ts};
use tracing::warn;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    /// Buy order
    Buy,
    /// Sell order
    Sell,
}

impl OrderSide {
    /// Check if this is a buy
    #[must_use]
    pub const fn is_buy(&self) -> bool {
        matches!(self, Self::Buy)
    }

    /// Get the opposite side
    #[must_use]
    pub const fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    /// Market order
    Market,
    /// Limit order (requires a limit price)
    Limit,
    /// Stop order (requires a stop price)
    Stop,
    /// Stop-limit order (requires both prices)
    StopLimit,
    /// Trailing stop order (requires a stop price)
    Trail,
    /// Market-on-close order
    MarketOnClose,
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Constructed, not yet routed
    Created,
    /// Routed to a provider
    Submitted,
    /// Some quantity filled, remainder open
    PartiallyFilled,
    /// Fully filled
    Filled,
    /// Cancelled before completion
    Cancelled,
    /// Refused by validation or the provider
    Rejected,
}

impl OrderStatus {
    /// Whether this status permits no further transitions
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled | Self::Rejected)
    }
}

/// Provider-reported failures that reject an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderErrorKind {
    /// Outright rejection
    Rejected,
    /// Cancel arrived after the order went terminal at the venue
    TooLateToCancel,
    /// Account could not support the order
    InsufficientFunds,
    /// Venue does not know the instrument
    UnknownSymbol,
}

/// Immutable record of a single fill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// Execution id, unique within the issuing venue or simulator
    pub exec_id: String,
    /// Fill price
    pub price: Px,
    /// Fill size
    pub size: Qty,
    /// Fill timestamp
    pub ts: Ts,
    /// Side of the filled order
    pub side: OrderSide,
}

impl Execution {
    /// Create a new execution record
    #[must_use]
    pub fn new(exec_id: impl Into<String>, price: Px, size: Qty, ts: Ts, side: OrderSide) -> Self {
        Self {
            exec_id: exec_id.into(),
            price,
            size,
            ts,
            side,
        }
    }
}

/// Snapshot handed to order delegates when a fill is applied
#[derive(Debug, Clone)]
pub struct OrderFillEvent {
    /// The order the fill applies to
    pub order_id: OrderId,
    /// Status after the fill
    pub status: OrderStatus,
    /// Cumulative filled quantity
    pub filled: Qty,
    /// Quantity still open
    pub remaining: Qty,
    /// Average fill price so far
    pub average_fill_price: Option<Px>,
    /// The execution that triggered the event
    pub execution: Execution,
}

/// Observer lists fired by [`Order::report_execution`].
///
/// The status delegate (`on_partial_fill` or `on_order_filled`) fires first,
/// then `on_execution`. Register before submission; registration is not
/// synchronised with firing, and observers must not re-enter the order.
#[derive(Debug, Default)]
pub struct OrderDelegates {
    /// Fires on every applied execution
    pub on_execution: Delegate<OrderFillEvent>,
    /// Fires on intermediate fills only
    pub on_partial_fill: Delegate<OrderFillEvent>,
    /// Fires on the final fill
    pub on_order_filled: Delegate<OrderFillEvent>,
}

/// A single equity or option order with full fill accounting.
#[derive(Debug)]
pub struct Order {
    id: OrderId,
    instrument: InstrumentRef,
    order_type: OrderType,
    side: OrderSide,
    quantity: Qty,
    price: Option<Px>,
    stop_price: Option<Px>,
    outside_rth: bool,
    signal_price: Option<Px>,
    status: OrderStatus,
    created_at: Ts,
    submitted_at: Option<Ts>,
    filled_at: Option<Ts>,
    cancelled_at: Option<Ts>,
    filled: Qty,
    remaining: Qty,
    // running sum of price*size in raw tick*unit space; average stays exact
    px_qty_sum: i128,
    commission: i64,
    provider: Option<String>,
    next_exec_id: u64,
    executions: Vec<Execution>,
    delegates: OrderDelegates,
}

impl Order {
    /// Create an order, validating the quantity/price combination for the
    /// given type. Status starts at [`OrderStatus::Created`].
    pub fn new(
        id: OrderId,
        instrument: InstrumentRef,
        order_type: OrderType,
        side: OrderSide,
        quantity: Qty,
        price: Option<Px>,
        stop_price: Option<Px>,
        ts: Ts,
    ) -> OmsResult<Self> {
        if !quantity.is_positive() {
            return Err(OmsError::Validation {
                message: format!("order quantity must be positive, got {quantity}"),
            });
        }
        let needs_limit = matches!(order_type, OrderType::Limit | OrderType::StopLimit);
        let needs_stop = matches!(
            order_type,
            OrderType::Stop | OrderType::StopLimit | OrderType::Trail
        );
        if needs_limit && !price.is_some_and(|p| p.is_positive()) {
            return Err(OmsError::Validation {
                message: format!("{order_type:?} order requires a positive limit price"),
            });
        }
        if needs_stop && !stop_price.is_some_and(|p| p.is_positive()) {
            return Err(OmsError::Validation {
                message: format!("{order_type:?} order requires a positive stop price"),
            });
        }
        Ok(Self {
            id,
            instrument,
            order_type,
            side,
            quantity,
            price,
            stop_price,
            outside_rth: false,
            signal_price: None,
            status: OrderStatus::Created,
            created_at: ts,
            submitted_at: None,
            filled_at: None,
            cancelled_at: None,
            filled: Qty::ZERO,
            remaining: quantity,
            px_qty_sum: 0,
            commission: 0,
            provider: None,
            next_exec_id: 1,
            executions: Vec::new(),
            delegates: OrderDelegates::default(),
        })
    }

    /// Create a market order
    pub fn market(
        id: OrderId,
        instrument: InstrumentRef,
        side: OrderSide,
        quantity: Qty,
        ts: Ts,
    ) -> OmsResult<Self> {
        Self::new(id, instrument, OrderType::Market, side, quantity, None, None, ts)
    }

    /// Create a limit order
    pub fn limit(
        id: OrderId,
        instrument: InstrumentRef,
        side: OrderSide,
        quantity: Qty,
        limit: Px,
        ts: Ts,
    ) -> OmsResult<Self> {
        Self::new(
            id,
            instrument,
            OrderType::Limit,
            side,
            quantity,
            Some(limit),
            None,
            ts,
        )
    }

    /// Create a stop order
    pub fn stop(
        id: OrderId,
        instrument: InstrumentRef,
        side: OrderSide,
        quantity: Qty,
        stop: Px,
        ts: Ts,
    ) -> OmsResult<Self> {
        Self::new(
            id,
            instrument,
            OrderType::Stop,
            side,
            quantity,
            None,
            Some(stop),
            ts,
        )
    }

    /// Create a stop-limit order
    pub fn stop_limit(
        id: OrderId,
        instrument: InstrumentRef,
        side: OrderSide,
        quantity: Qty,
        limit: Px,
        stop: Px,
        ts: Ts,
    ) -> OmsResult<Self> {
        Self::new(
            id,
            instrument,
            OrderType::StopLimit,
            side,
            quantity,
            Some(limit),
            Some(stop),
            ts,
        )
    }

    /// Order id
    #[must_use]
    pub const fn id(&self) -> OrderId {
        self.id
    }

    /// Instrument this order trades
    #[must_use]
    pub const fn instrument(&self) -> &InstrumentRef {
        &self.instrument
    }

    /// Order type
    #[must_use]
    pub const fn order_type(&self) -> OrderType {
        self.order_type
    }

    /// Order side
    #[must_use]
    pub const fn side(&self) -> OrderSide {
        self.side
    }

    /// Ordered quantity
    #[must_use]
    pub const fn quantity(&self) -> Qty {
        self.quantity
    }

    /// Limit price, when the type carries one
    #[must_use]
    pub const fn price(&self) -> Option<Px> {
        self.price
    }

    /// Stop price, when the type carries one
    #[must_use]
    pub const fn stop_price(&self) -> Option<Px> {
        self.stop_price
    }

    /// Current status
    #[must_use]
    pub const fn status(&self) -> OrderStatus {
        self.status
    }

    /// Cumulative filled quantity
    #[must_use]
    pub const fn filled(&self) -> Qty {
        self.filled
    }

    /// Quantity still open
    #[must_use]
    pub const fn remaining(&self) -> Qty {
        self.remaining
    }

    /// Average fill price across all executions so far
    #[must_use]
    pub fn average_fill_price(&self) -> Option<Px> {
        if self.filled.is_zero() {
            return None;
        }
        let avg = self.px_qty_sum / i128::from(self.filled.as_i64());
        #[allow(clippy::cast_possible_truncation)]
        let ticks = avg as i64;
        Some(Px::from_i64(ticks))
    }

    /// Commission charged so far, in price ticks
    #[must_use]
    pub const fn commission(&self) -> i64 {
        self.commission
    }

    /// Executions applied so far, in arrival order
    #[must_use]
    pub fn executions(&self) -> &[Execution] {
        &self.executions
    }

    /// Creation timestamp
    #[must_use]
    pub const fn created_at(&self) -> Ts {
        self.created_at
    }

    /// Submission timestamp, once submitted
    #[must_use]
    pub const fn submitted_at(&self) -> Option<Ts> {
        self.submitted_at
    }

    /// Final fill timestamp, once filled
    #[must_use]
    pub const fn filled_at(&self) -> Option<Ts> {
        self.filled_at
    }

    /// Cancellation timestamp, once cancelled
    #[must_use]
    pub const fn cancelled_at(&self) -> Option<Ts> {
        self.cancelled_at
    }

    /// Name of the provider routing this order
    #[must_use]
    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// Record the routing provider (non-owning, by name)
    pub fn set_provider_name(&mut self, name: impl Into<String>) {
        self.provider = Some(name.into());
    }

    /// Whether the order may match outside regular trading hours
    #[must_use]
    pub const fn outside_rth(&self) -> bool {
        self.outside_rth
    }

    /// Permit matching outside regular trading hours
    pub const fn set_outside_rth(&mut self, outside_rth: bool) {
        self.outside_rth = outside_rth;
    }

    /// Mark at which the strategy requested the order
    #[must_use]
    pub const fn signal_price(&self) -> Option<Px> {
        self.signal_price
    }

    /// Record the signal price
    pub const fn set_signal_price(&mut self, price: Px) {
        self.signal_price = Some(price);
    }

    /// Record commission charged by the venue, in price ticks
    pub const fn set_commission(&mut self, amount: i64) {
        self.commission = amount;
    }

    /// Allocate the next per-order execution id
    pub const fn next_exec_id(&mut self) -> u64 {
        let id = self.next_exec_id;
        self.next_exec_id += 1;
        id
    }

    /// Access the delegate lists for observer registration
    pub const fn delegates_mut(&mut self) -> &mut OrderDelegates {
        &mut self.delegates
    }

    /// Created -> Submitted, recording the submit timestamp.
    /// No-op when already submitted or later.
    pub fn mark_submitted(&mut self, ts: Ts) {
        if self.status == OrderStatus::Created {
            self.status = OrderStatus::Submitted;
            self.submitted_at = Some(ts);
        }
    }

    /// Apply a fill atomically and fire delegates.
    ///
    /// Rejects non-positive size or price, executions against terminal
    /// orders, and overfills (size beyond remaining); the order state is
    /// untouched on any rejection.
    pub fn report_execution(&mut self, exec: Execution) -> OmsResult<OrderStatus> {
        if self.status.is_terminal() {
            return Err(OmsError::Terminal {
                order_id: self.id,
                status: self.status,
            });
        }
        if !exec.size.is_positive() || !exec.price.is_positive() {
            return Err(OmsError::Validation {
                message: format!(
                    "execution requires positive size and price, got {} @ {}",
                    exec.size, exec.price
                ),
            });
        }
        if exec.size > self.remaining {
            debug_assert!(
                false,
                "overfill: execution {} exceeds remaining {} on order {}",
                exec.size, self.remaining, self.id
            );
            return Err(OmsError::Overfill {
                order_id: self.id,
                size: exec.size,
                remaining: self.remaining,
            });
        }

        let new_status = if exec.size == self.remaining {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        if self.status != new_status {
            lifecycle::validate_transition(self.id, self.status, new_status)?;
        }

        self.filled = self.filled.add(exec.size);
        self.remaining = self.remaining.sub(exec.size);
        self.px_qty_sum += i128::from(exec.price.as_i64()) * i128::from(exec.size.as_i64());
        self.status = new_status;
        if new_status == OrderStatus::Filled {
            self.filled_at = Some(exec.ts);
        }
        self.executions.push(exec.clone());

        let event = OrderFillEvent {
            order_id: self.id,
            status: new_status,
            filled: self.filled,
            remaining: self.remaining,
            average_fill_price: self.average_fill_price(),
            execution: exec,
        };
        if new_status == OrderStatus::Filled {
            self.delegates.on_order_filled.fire(&event);
        } else {
            self.delegates.on_partial_fill.fire(&event);
        }
        self.delegates.on_execution.fire(&event);
        Ok(new_status)
    }

    /// Submitted|PartiallyFilled -> Cancelled. Fires no fill delegates.
    pub fn cancel(&mut self, ts: Ts) -> OmsResult<()> {
        lifecycle::validate_transition(self.id, self.status, OrderStatus::Cancelled)?;
        self.status = OrderStatus::Cancelled;
        self.cancelled_at = Some(ts);
        Ok(())
    }

    /// Transition a non-terminal order to Rejected on a provider error.
    /// Terminal orders are left untouched.
    pub fn act_on_error(&mut self, kind: OrderErrorKind) {
        if self.status.is_terminal() {
            warn!(order_id = %self.id, ?kind, "provider error for terminal order ignored");
            return;
        }
        warn!(order_id = %self.id, ?kind, "order rejected");
        self.status = OrderStatus::Rejected;
    }
}
