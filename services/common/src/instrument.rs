//! Instrument metadata.
//!
//! The trading core treats instruments as opaque references with accessors;
//! reference data loading and vendor symbol mapping live outside the core.

use crate::{Px, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Instrument type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentType {
    /// Equity/stock instrument
    Equity,
    /// Index instrument
    Index,
    /// Future contract
    Future,
    /// Option contract
    Option,
}

/// Option type for derivatives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    /// Call option
    Call,
    /// Put option
    Put,
}

/// Shared, immutable instrument reference
pub type InstrumentRef = Arc<Instrument>;

/// Instrument definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    symbol: Symbol,
    trading_symbol: String,
    instrument_type: InstrumentType,
    expiry: Option<DateTime<Utc>>,
    strike: Option<Px>,
    option_type: Option<OptionType>,
    tick_size: Px,
    multiplier: u32,
}

impl Instrument {
    /// Create an equity instrument
    #[must_use]
    pub fn equity(symbol: Symbol, trading_symbol: impl Into<String>) -> Self {
        Self {
            symbol,
            trading_symbol: trading_symbol.into(),
            instrument_type: InstrumentType::Equity,
            expiry: None,
            strike: None,
            option_type: None,
            tick_size: Px::from_i64(1),
            multiplier: 1,
        }
    }

    /// Create an index instrument
    #[must_use]
    pub fn index(symbol: Symbol, trading_symbol: impl Into<String>) -> Self {
        Self {
            instrument_type: InstrumentType::Index,
            ..Self::equity(symbol, trading_symbol)
        }
    }

    /// Create an option contract
    #[must_use]
    pub fn option(
        symbol: Symbol,
        trading_symbol: impl Into<String>,
        option_type: OptionType,
        strike: Px,
        expiry: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol,
            trading_symbol: trading_symbol.into(),
            instrument_type: InstrumentType::Option,
            expiry: Some(expiry),
            strike: Some(strike),
            option_type: Some(option_type),
            tick_size: Px::from_i64(1),
            multiplier: 100,
        }
    }

    /// Override the minimum price increment
    #[must_use]
    pub const fn with_tick_size(mut self, tick_size: Px) -> Self {
        self.tick_size = tick_size;
        self
    }

    /// Override the contract multiplier
    #[must_use]
    pub const fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Venue-scoped symbol token
    #[must_use]
    pub const fn symbol(&self) -> Symbol {
        self.symbol
    }

    /// Human-readable trading symbol
    #[must_use]
    pub fn trading_symbol(&self) -> &str {
        &self.trading_symbol
    }

    /// Instrument classification
    #[must_use]
    pub const fn instrument_type(&self) -> InstrumentType {
        self.instrument_type
    }

    /// Expiry, for derivatives
    #[must_use]
    pub const fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    /// Strike price, for options
    #[must_use]
    pub const fn strike(&self) -> Option<Px> {
        self.strike
    }

    /// Call/put classification, for options
    #[must_use]
    pub const fn option_type(&self) -> Option<OptionType> {
        self.option_type
    }

    /// Minimum price increment
    #[must_use]
    pub const fn tick_size(&self) -> Px {
        self.tick_size
    }

    /// Contract multiplier (1 for equities, typically 100 for options)
    #[must_use]
    pub const fn multiplier(&self) -> u32 {
        self.multiplier
    }
}
