//! Shared fixtures for the OMS integration tests.

use oms::error::{OmsError, OmsResult};
use oms::order::{Order, OrderSide};
use oms::provider::{
    ConnectionHandler, Provider, ProviderCapabilities, QuoteHandler, SubscriptionId, TradeHandler,
};
use parking_lot::Mutex;
use services_common::{Instrument, InstrumentRef, OrderId, Px, Qty, Symbol, Ts};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Broker-only provider that records what the manager routes to it.
pub struct RecordingProvider {
    name: String,
    connected: AtomicBool,
    reject_placements: AtomicBool,
    next_subscription: AtomicU64,
    pub placed: Mutex<Vec<OrderId>>,
    pub cancels: Mutex<Vec<OrderId>>,
    connection_handlers: Mutex<Vec<(SubscriptionId, ConnectionHandler)>>,
}

impl RecordingProvider {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            connected: AtomicBool::new(false),
            reject_placements: AtomicBool::new(false),
            next_subscription: AtomicU64::new(1),
            placed: Mutex::new(Vec::new()),
            cancels: Mutex::new(Vec::new()),
            connection_handlers: Mutex::new(Vec::new()),
        })
    }

    pub fn reject_placements(&self) {
        self.reject_placements.store(true, Ordering::SeqCst);
    }
}

impl Provider for RecordingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            broker: true,
            ..ProviderCapabilities::default()
        }
    }

    fn connect(&self) -> OmsResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) -> OmsResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn place_order(&self, order: &Order) -> OmsResult<()> {
        if self.reject_placements.load(Ordering::SeqCst) {
            return Err(OmsError::Validation {
                message: "venue refused the order".to_string(),
            });
        }
        self.placed.lock().push(order.id());
        Ok(())
    }

    fn cancel_order(&self, order_id: OrderId) -> OmsResult<()> {
        self.cancels.lock().push(order_id);
        Ok(())
    }

    fn add_quote_handler(&self, _: Symbol, _: QuoteHandler) -> OmsResult<SubscriptionId> {
        Err(self.unsupported("quotes"))
    }

    fn remove_quote_handler(&self, _: Symbol, _: SubscriptionId) -> OmsResult<()> {
        Err(self.unsupported("quotes"))
    }

    fn add_trade_handler(&self, _: Symbol, _: TradeHandler) -> OmsResult<SubscriptionId> {
        Err(self.unsupported("trades"))
    }

    fn remove_trade_handler(&self, _: Symbol, _: SubscriptionId) -> OmsResult<()> {
        Err(self.unsupported("trades"))
    }

    fn add_connection_handler(&self, handler: ConnectionHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.connection_handlers.lock().push((id, handler));
        id
    }

    fn remove_connection_handler(&self, id: SubscriptionId) {
        self.connection_handlers.lock().retain(|(i, _)| *i != id);
    }
}

pub fn test_instrument() -> InstrumentRef {
    Arc::new(Instrument::equity(Symbol::new(1), "GLD"))
}

pub fn limit_buy(id: u64, qty_units: i64, limit_ticks: i64) -> Order {
    Order::limit(
        OrderId::new(id),
        test_instrument(),
        OrderSide::Buy,
        Qty::from_units(qty_units),
        Px::from_i64(limit_ticks),
        Ts::from_millis(0),
    )
    .unwrap()
}
