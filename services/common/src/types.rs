//! Core identity and fixed-point types for the Tradewind trading core.

use crate::constants::fixed_point::SCALE_4;
use crate::constants::time::{NANOS_PER_MICRO, NANOS_PER_MILLI};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbol identifier for trading instruments
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(pub u32);

impl Symbol {
    /// Create a new Symbol with the given token
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SYM_{}", self.0)
    }
}

/// Order identifier, allocated from the persisted monotonic counter.
///
/// Unique process-wide and across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl OrderId {
    /// Create an order id from its raw value
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw 64-bit value
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Price stored as i64 ticks for determinism (1 tick = 0.0001).
///
/// Book keys and all matching comparisons operate on the raw tick value;
/// conversion to f64 happens only at display boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Px(i64);

impl Px {
    /// Zero price
    pub const ZERO: Self = Self(0);

    /// Create from a floating-point price, rounding to the nearest tick.
    /// For external API compatibility only - prefer `from_i64`.
    #[must_use]
    pub fn new(value: f64) -> Self {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let ticks = (value * SCALE_4 as f64).round() as i64;
        Self(ticks)
    }

    /// Create from i64 ticks
    #[must_use]
    pub const fn from_i64(ticks: i64) -> Self {
        Self(ticks)
    }

    /// Create from cents (100 cents = 1 currency unit)
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents * (SCALE_4 / 100))
    }

    /// Price as raw ticks
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Price as f64 for display and external APIs only
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let value = self.0 as f64;
        value / SCALE_4 as f64
    }

    /// Check whether the price is strictly positive
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Add two prices (fixed-point arithmetic)
    #[must_use]
    pub const fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }

    /// Subtract two prices (fixed-point arithmetic)
    #[must_use]
    pub const fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }
}

impl fmt::Display for Px {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCALE_4;
        let frac = (self.0 % SCALE_4).abs();
        write!(f, "{whole}.{frac:04}")
    }
}

/// Quantity stored as i64 units for determinism (1 unit = 0.0001 shares).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Qty(i64);

impl Qty {
    /// Zero quantity
    pub const ZERO: Self = Self(0);

    /// Create from whole shares
    #[must_use]
    pub const fn from_units(units: i64) -> Self {
        Self(units * SCALE_4)
    }

    /// Create from i64 sub-unit quantity
    #[must_use]
    pub const fn from_i64(units: i64) -> Self {
        Self(units)
    }

    /// Quantity as raw sub-units
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Quantity as f64 for display and external APIs only
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let value = self.0 as f64;
        value / SCALE_4 as f64
    }

    /// Check if the quantity is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Check whether the quantity is strictly positive
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Add two quantities (fixed-point arithmetic)
    #[must_use]
    pub const fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }

    /// Subtract two quantities (fixed-point arithmetic)
    #[must_use]
    pub const fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }
}

impl fmt::Display for Qty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCALE_4;
        let frac = (self.0 % SCALE_4).abs();
        write!(f, "{whole}.{frac:04}")
    }
}

/// Timestamp in nanoseconds since the UNIX epoch
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Ts(pub u64);

impl Ts {
    /// Current wall-clock timestamp
    #[must_use]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| std::time::Duration::from_secs(0));
        Self(duration.as_secs() * 1_000_000_000 + u64::from(duration.subsec_nanos()))
    }

    /// Create from nanoseconds
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Create from milliseconds
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * NANOS_PER_MILLI)
    }

    /// Timestamp as nanoseconds
    #[must_use]
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Timestamp as microseconds
    #[must_use]
    pub const fn as_micros(&self) -> u64 {
        self.0 / NANOS_PER_MICRO
    }

    /// Timestamp as milliseconds
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0 / NANOS_PER_MILLI
    }

    /// Timestamp advanced by a duration (saturating)
    #[must_use]
    pub fn saturating_add(&self, duration: std::time::Duration) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let nanos = duration.as_nanos() as u64;
        Self(self.0.saturating_add(nanos))
    }
}

impl fmt::Display for Ts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_px_serde() -> Result<(), Box<dyn std::error::Error>> {
        let px = Px::from_i64(12_345_600); // 1234.56 in ticks
        let encoded = bincode::serialize(&px)?;
        let decoded: Px = bincode::deserialize(&encoded)?;
        assert_eq!(px, decoded);
        Ok(())
    }

    #[test]
    fn test_qty_serde() -> Result<(), Box<dyn std::error::Error>> {
        let qty = Qty::from_units(100);
        let encoded = bincode::serialize(&qty)?;
        let decoded: Qty = bincode::deserialize(&encoded)?;
        assert_eq!(qty, decoded);
        Ok(())
    }

    #[test]
    fn test_order_id_serde() -> Result<(), Box<dyn std::error::Error>> {
        let id = OrderId::new(42);
        let encoded = bincode::serialize(&id)?;
        let decoded: OrderId = bincode::deserialize(&encoded)?;
        assert_eq!(id, decoded);
        Ok(())
    }

    #[test]
    fn test_px_display() {
        assert_eq!(Px::from_i64(1_000_500).to_string(), "100.0500");
        assert_eq!(Px::from_cents(10_005).to_string(), "100.0500");
    }

    #[test]
    fn test_ts_conversions() {
        let ts = Ts::from_nanos(1_234_567_890);
        assert_eq!(ts.as_nanos(), 1_234_567_890);
        assert_eq!(ts.as_micros(), 1_234_567);
        assert_eq!(ts.as_millis(), 1_234);
    }

    #[test]
    fn test_ts_saturating_add() {
        let ts = Ts::from_millis(100);
        let later = ts.saturating_add(std::time::Duration::from_millis(150));
        assert_eq!(later.as_millis(), 250);
    }

    #[test]
    fn test_qty_arithmetic() {
        let a = Qty::from_units(5);
        let b = Qty::from_units(3);
        assert_eq!(a.sub(b), Qty::from_units(2));
        assert_eq!(a.add(b), Qty::from_units(8));
        assert!(a.sub(a).is_zero());
    }
}
