//! Simulated venue-side order matching for backtesting and paper trading.
//!
//! One [`engine::SimulatedMatchingEngine`] per symbol consumes quote and
//! trade events and mimics venue semantics: limit crossing, stop activation,
//! market sweep and delayed cancellation. [`provider::SimulationProvider`]
//! wraps a set of engines behind the standard `Provider` interface so a
//! strategy cannot tell it apart from a live connector.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod engine;
pub mod provider;

pub use engine::{SimulatedMatchingEngine, SimulationConfig};
pub use provider::SimulationProvider;
