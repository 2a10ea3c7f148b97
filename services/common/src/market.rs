//! Canonical market-data records.
//!
//! The field sets here are contractual: providers normalise vendor feeds into
//! these shapes, and the matching and Greeks engines consume them as-is.

use crate::{Px, Qty, Ts};
use serde::{Deserialize, Serialize};

/// Side of the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy side (bid)
    Bid,
    /// Sell side (ask/offer)
    Ask,
}

impl Side {
    /// Check if this is the bid side
    #[must_use]
    pub const fn is_bid(&self) -> bool {
        matches!(self, Self::Bid)
    }

    /// Get the opposite side
    #[must_use]
    pub const fn opposite(&self) -> Self {
        match self {
            Self::Bid => Self::Ask,
            Self::Ask => Self::Bid,
        }
    }
}

/// Best bid and offer with displayed sizes.
///
/// A zero size on a side means that side is currently not quoted; matching
/// against it is disabled until size returns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Event timestamp
    pub ts: Ts,
    /// Best bid price
    pub bid: Px,
    /// Displayed bid size
    pub bid_size: Qty,
    /// Best ask price
    pub ask: Px,
    /// Displayed ask size
    pub ask_size: Qty,
}

impl Quote {
    /// Create an empty quote at the given timestamp
    #[must_use]
    pub const fn new(ts: Ts) -> Self {
        Self {
            ts,
            bid: Px::ZERO,
            bid_size: Qty::ZERO,
            ask: Px::ZERO,
            ask_size: Qty::ZERO,
        }
    }

    /// Set bid data
    #[must_use]
    pub const fn with_bid(mut self, price: Px, size: Qty) -> Self {
        self.bid = price;
        self.bid_size = size;
        self
    }

    /// Set ask data
    #[must_use]
    pub const fn with_ask(mut self, price: Px, size: Qty) -> Self {
        self.ask = price;
        self.ask_size = size;
        self
    }

    /// Whether the bid side is quoted
    #[must_use]
    pub const fn has_bid(&self) -> bool {
        self.bid_size.is_positive() && self.bid.is_positive()
    }

    /// Whether the ask side is quoted
    #[must_use]
    pub const fn has_ask(&self) -> bool {
        self.ask_size.is_positive() && self.ask.is_positive()
    }

    /// Check if the book is crossed (bid > ask)
    #[must_use]
    pub const fn is_crossed(&self) -> bool {
        self.has_bid() && self.has_ask() && self.bid.as_i64() > self.ask.as_i64()
    }

    /// Check if the book is locked (bid == ask)
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.has_bid() && self.has_ask() && self.bid.as_i64() == self.ask.as_i64()
    }

    /// Mid price, when both sides are quoted
    #[must_use]
    pub const fn mid(&self) -> Option<Px> {
        if self.has_bid() && self.has_ask() {
            Some(Px::from_i64((self.bid.as_i64() + self.ask.as_i64()) / 2))
        } else {
            None
        }
    }
}

/// A single trade print
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Event timestamp
    pub ts: Ts,
    /// Trade price
    pub price: Px,
    /// Trade size
    pub size: Qty,
}

impl Trade {
    /// Create a new trade record
    #[must_use]
    pub const fn new(ts: Ts, price: Px, size: Qty) -> Self {
        Self { ts, price, size }
    }
}

/// L2 depth update (absolute replace at a price level)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Depth {
    /// Event timestamp
    pub ts: Ts,
    /// Side of the book
    pub side: Side,
    /// Price level
    pub price: Px,
    /// Quantity at this level (zero removes the level)
    pub size: Qty,
    /// Level index (0 = best)
    pub level: u8,
}

/// Theoretical value and risk sensitivities of an option
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greek {
    /// Computation timestamp
    pub ts: Ts,
    /// Theoretical option value
    pub theo: f64,
    /// Sensitivity to underlying price
    pub delta: f64,
    /// Rate of change of delta
    pub gamma: f64,
    /// Time decay
    pub theta: f64,
    /// Sensitivity to volatility
    pub vega: f64,
    /// Sensitivity to interest rate
    pub rho: f64,
    /// Implied volatility backed out of the market price
    pub implied_volatility: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(bid: i64, bid_size: i64, ask: i64, ask_size: i64) -> Quote {
        Quote::new(Ts::from_nanos(1))
            .with_bid(Px::from_i64(bid), Qty::from_units(bid_size))
            .with_ask(Px::from_i64(ask), Qty::from_units(ask_size))
    }

    #[test]
    fn test_quote_sides() {
        let q = quote(1_000_000, 100, 1_000_500, 200);
        assert!(q.has_bid());
        assert!(q.has_ask());
        assert!(!q.is_crossed());
        assert!(!q.is_locked());
        assert_eq!(q.mid(), Some(Px::from_i64(1_000_250)));
    }

    #[test]
    fn test_zero_size_disables_side() {
        let q = quote(1_000_000, 0, 1_000_500, 200);
        assert!(!q.has_bid());
        assert!(q.has_ask());
        assert_eq!(q.mid(), None);
    }

    #[test]
    fn test_locked_and_crossed() {
        assert!(quote(1_000_500, 100, 1_000_500, 100).is_locked());
        assert!(quote(1_001_000, 100, 1_000_500, 100).is_crossed());
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Bid.opposite(), Side::Ask);
        assert!(Side::Bid.is_bid());
    }
}
