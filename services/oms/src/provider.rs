//! Provider interface consumed by the order manager.
//!
//! Connectors (live brokers, data vendors, the simulator) implement this
//! trait outside the core; the manager routes orders through it and market
//! data flows back through the registered handlers. Rejection from
//! `place_order` is contractually synchronous, which is why the trait is not
//! async: a connector with an async transport reports later failures through
//! `OrderManager::report_error`.

use crate::error::{OmsError, OmsResult};
use crate::order::Order;
use services_common::{Depth, Greek, OrderId, Quote, Symbol, Trade};
use std::sync::Arc;

/// What a provider can supply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Supplies NBBO quotes
    pub quotes: bool,
    /// Supplies trade prints
    pub trades: bool,
    /// Supplies L2 depth
    pub depth: bool,
    /// Supplies vendor-computed Greeks
    pub greeks: bool,
    /// Accepts orders
    pub broker: bool,
}

/// Connection lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Connection attempt started
    Connecting,
    /// Connection established
    Connected,
    /// Disconnect requested
    Disconnecting,
    /// Connection closed
    Disconnected,
    /// Transport-level error with a vendor code
    Error(u32),
}

/// Handle returned by handler registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Quote stream callback
pub type QuoteHandler = Arc<dyn Fn(&Quote) + Send + Sync>;
/// Trade stream callback
pub type TradeHandler = Arc<dyn Fn(&Trade) + Send + Sync>;
/// Depth stream callback
pub type DepthHandler = Arc<dyn Fn(&Depth) + Send + Sync>;
/// Vendor Greek stream callback
pub type GreekHandler = Arc<dyn Fn(&Greek) + Send + Sync>;
/// Connection lifecycle callback
pub type ConnectionHandler = Arc<dyn Fn(&ConnectionEvent) + Send + Sync>;

/// Execution venue and/or market-data connector.
///
/// Handlers fire on the provider's dispatch thread; they must not re-enter
/// the provider synchronously.
pub trait Provider: Send + Sync {
    /// Provider name, recorded on orders it routes
    fn name(&self) -> &str;

    /// Capability flags
    fn capabilities(&self) -> ProviderCapabilities;

    /// Establish the connection
    fn connect(&self) -> OmsResult<()>;

    /// Tear the connection down
    fn disconnect(&self) -> OmsResult<()>;

    /// Whether the provider is currently connected
    fn is_connected(&self) -> bool;

    /// Route an order to the venue. An `Err` is a synchronous rejection; the
    /// manager unwinds the order.
    fn place_order(&self, order: &Order) -> OmsResult<()>;

    /// Request cancellation of an in-flight order
    fn cancel_order(&self, order_id: OrderId) -> OmsResult<()>;

    /// Register a quote handler for a symbol
    fn add_quote_handler(&self, symbol: Symbol, handler: QuoteHandler)
        -> OmsResult<SubscriptionId>;

    /// Unregister a quote handler
    fn remove_quote_handler(&self, symbol: Symbol, id: SubscriptionId) -> OmsResult<()>;

    /// Register a trade handler for a symbol
    fn add_trade_handler(&self, symbol: Symbol, handler: TradeHandler)
        -> OmsResult<SubscriptionId>;

    /// Unregister a trade handler
    fn remove_trade_handler(&self, symbol: Symbol, id: SubscriptionId) -> OmsResult<()>;

    /// Register a depth handler for a symbol
    fn add_depth_handler(
        &self,
        _symbol: Symbol,
        _handler: DepthHandler,
    ) -> OmsResult<SubscriptionId> {
        Err(self.unsupported("depth"))
    }

    /// Unregister a depth handler
    fn remove_depth_handler(&self, _symbol: Symbol, _id: SubscriptionId) -> OmsResult<()> {
        Err(self.unsupported("depth"))
    }

    /// Register a vendor Greek handler for a symbol
    fn add_greek_handler(
        &self,
        _symbol: Symbol,
        _handler: GreekHandler,
    ) -> OmsResult<SubscriptionId> {
        Err(self.unsupported("greeks"))
    }

    /// Unregister a vendor Greek handler
    fn remove_greek_handler(&self, _symbol: Symbol, _id: SubscriptionId) -> OmsResult<()> {
        Err(self.unsupported("greeks"))
    }

    /// Register a connection lifecycle handler
    fn add_connection_handler(&self, handler: ConnectionHandler) -> SubscriptionId;

    /// Unregister a connection lifecycle handler
    fn remove_connection_handler(&self, id: SubscriptionId);

    /// Build the error for a capability this provider does not supply
    fn unsupported(&self, capability: &str) -> OmsError {
        OmsError::Unsupported {
            provider: self.name().to_string(),
            capability: capability.to_string(),
        }
    }
}
