//! Shared types and plumbing for the Tradewind trading core
//!
//! Everything here is deliberately small and dependency-light: fixed-point
//! price/quantity types, nanosecond timestamps, market-data records,
//! instrument metadata, and the multicast delegate primitive the engines use
//! to report events back to strategies.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod constants;
pub mod delegate;
pub mod instrument;
pub mod market;
pub mod types;

pub use delegate::{Delegate, DelegateToken};
pub use instrument::{Instrument, InstrumentRef, InstrumentType, OptionType};
pub use market::{Depth, Greek, Quote, Side, Trade};
pub use types::{OrderId, Px, Qty, Symbol, Ts};
