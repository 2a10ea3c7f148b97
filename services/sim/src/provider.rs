//! Provider facade over a set of per-symbol matching engines.
//!
//! `SimulationProvider` is what a strategy routes orders through when it
//! runs against replayed or paper-traded data: it implements the standard
//! `Provider` interface, creates one engine per symbol on demand, and feeds
//! engine callbacks straight back into the `OrderManager`.
//!
//! Market data is expected on a single dispatch thread (the engines are
//! single-threaded by contract), and handlers must not re-enter the
//! provider for the symbol currently dispatching.

use crate::engine::{SimulatedMatchingEngine, SimulationConfig};
use oms::error::{OmsError, OmsResult};
use oms::order::Order;
use oms::provider::{
    ConnectionEvent, ConnectionHandler, Provider, ProviderCapabilities, QuoteHandler,
    SubscriptionId, TradeHandler,
};
use oms::OrderManager;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use services_common::{OrderId, Quote, Symbol, Trade, Ts};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-symbol state: the engine plus its market-data subscribers.
#[derive(Default)]
struct SymbolEntry {
    quote_handlers: Vec<(SubscriptionId, QuoteHandler)>,
    trade_handlers: Vec<(SubscriptionId, TradeHandler)>,
}

/// Broker + market-data provider backed by simulated matching engines.
pub struct SimulationProvider {
    name: String,
    config: SimulationConfig,
    manager: Arc<OrderManager>,
    engines: Mutex<FxHashMap<Symbol, Arc<Mutex<SimulatedMatchingEngine>>>>,
    symbols: Mutex<FxHashMap<Symbol, SymbolEntry>>,
    routes: Mutex<FxHashMap<OrderId, Symbol>>,
    connection_handlers: Mutex<Vec<(SubscriptionId, ConnectionHandler)>>,
    connected: AtomicBool,
    next_subscription: AtomicU64,
}

impl SimulationProvider {
    /// Create a provider routing executions into `manager`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        config: SimulationConfig,
        manager: Arc<OrderManager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            config,
            manager,
            engines: Mutex::new(FxHashMap::default()),
            symbols: Mutex::new(FxHashMap::default()),
            routes: Mutex::new(FxHashMap::default()),
            connection_handlers: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            next_subscription: AtomicU64::new(1),
        })
    }

    /// Pre-register a symbol. Fails when the symbol already has an engine.
    pub fn register_symbol(&self, symbol: Symbol) -> OmsResult<()> {
        let mut engines = self.engines.lock();
        if engines.contains_key(&symbol) {
            return Err(OmsError::DuplicateSymbol {
                symbol: symbol.to_string(),
            });
        }
        engines.insert(symbol, self.build_engine());
        Ok(())
    }

    /// Engine for a symbol, created on first use.
    fn engine(&self, symbol: Symbol) -> Arc<Mutex<SimulatedMatchingEngine>> {
        self.engines
            .lock()
            .entry(symbol)
            .or_insert_with(|| self.build_engine())
            .clone()
    }

    fn build_engine(&self) -> Arc<Mutex<SimulatedMatchingEngine>> {
        let mut engine = SimulatedMatchingEngine::new(&self.config);

        let manager = self.manager.clone();
        engine.on_fill(move |(order_id, exec)| {
            if let Err(err) = manager.report_execution(*order_id, exec.clone()) {
                warn!(%order_id, %err, "simulated fill could not be applied");
            }
        });
        let manager = self.manager.clone();
        engine.on_cancelled(move |order_id| {
            if let Err(err) = manager.report_cancel(*order_id, Ts::now()) {
                warn!(%order_id, %err, "simulated cancel could not be applied");
            }
        });
        let manager = self.manager.clone();
        engine.on_commission(move |(order_id, amount)| {
            manager.report_commission(*order_id, *amount);
        });
        engine.on_no_order_found(move |order_id| {
            debug!(%order_id, "cancel raced a terminal order");
        });

        Arc::new(Mutex::new(engine))
    }

    /// Drive a symbol's engine and quote subscribers with a quote event.
    pub fn inject_quote(&self, symbol: Symbol, quote: &Quote) {
        let engine = self.engine(symbol);
        engine.lock().on_quote(quote);

        let handlers: Vec<QuoteHandler> = self
            .symbols
            .lock()
            .get(&symbol)
            .map(|entry| entry.quote_handlers.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();
        for handler in handlers {
            handler(quote);
        }
    }

    /// Drive a symbol's engine and trade subscribers with a trade print.
    pub fn inject_trade(&self, symbol: Symbol, trade: &Trade) {
        let engine = self.engine(symbol);
        engine.lock().on_trade(trade);

        let handlers: Vec<TradeHandler> = self
            .symbols
            .lock()
            .get(&symbol)
            .map(|entry| entry.trade_handlers.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();
        for handler in handlers {
            handler(trade);
        }
    }

    fn next_subscription_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst))
    }

    fn fire_connection_event(&self, event: &ConnectionEvent) {
        let handlers: Vec<ConnectionHandler> = self
            .connection_handlers
            .lock()
            .iter()
            .map(|(_, h)| h.clone())
            .collect();
        for handler in handlers {
            handler(event);
        }
    }
}

impl Provider for SimulationProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            quotes: true,
            trades: true,
            depth: false,
            greeks: false,
            broker: true,
        }
    }

    fn connect(&self) -> OmsResult<()> {
        self.fire_connection_event(&ConnectionEvent::Connecting);
        self.connected.store(true, Ordering::SeqCst);
        self.fire_connection_event(&ConnectionEvent::Connected);
        Ok(())
    }

    fn disconnect(&self) -> OmsResult<()> {
        self.fire_connection_event(&ConnectionEvent::Disconnecting);
        self.connected.store(false, Ordering::SeqCst);
        self.fire_connection_event(&ConnectionEvent::Disconnected);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn place_order(&self, order: &Order) -> OmsResult<()> {
        let symbol = order.instrument().symbol();
        self.routes.lock().insert(order.id(), symbol);
        self.engine(symbol).lock().submit(order);
        Ok(())
    }

    fn cancel_order(&self, order_id: OrderId) -> OmsResult<()> {
        let Some(symbol) = self.routes.lock().get(&order_id).copied() else {
            return Err(OmsError::OrderNotFound { order_id });
        };
        self.engine(symbol).lock().cancel(order_id, Ts::now());
        Ok(())
    }

    fn add_quote_handler(
        &self,
        symbol: Symbol,
        handler: QuoteHandler,
    ) -> OmsResult<SubscriptionId> {
        let id = self.next_subscription_id();
        self.symbols
            .lock()
            .entry(symbol)
            .or_default()
            .quote_handlers
            .push((id, handler));
        Ok(id)
    }

    fn remove_quote_handler(&self, symbol: Symbol, id: SubscriptionId) -> OmsResult<()> {
        let mut symbols = self.symbols.lock();
        let entry = symbols.get_mut(&symbol);
        match entry {
            Some(entry) => {
                entry.quote_handlers.retain(|(i, _)| *i != id);
                Ok(())
            }
            None => Err(OmsError::Validation {
                message: format!("no quote handlers registered for {symbol}"),
            }),
        }
    }

    fn add_trade_handler(
        &self,
        symbol: Symbol,
        handler: TradeHandler,
    ) -> OmsResult<SubscriptionId> {
        let id = self.next_subscription_id();
        self.symbols
            .lock()
            .entry(symbol)
            .or_default()
            .trade_handlers
            .push((id, handler));
        Ok(id)
    }

    fn remove_trade_handler(&self, symbol: Symbol, id: SubscriptionId) -> OmsResult<()> {
        let mut symbols = self.symbols.lock();
        match symbols.get_mut(&symbol) {
            Some(entry) => {
                entry.trade_handlers.retain(|(i, _)| *i != id);
                Ok(())
            }
            None => Err(OmsError::Validation {
                message: format!("no trade handlers registered for {symbol}"),
            }),
        }
    }

    fn add_connection_handler(&self, handler: ConnectionHandler) -> SubscriptionId {
        let id = self.next_subscription_id();
        self.connection_handlers.lock().push((id, handler));
        id
    }

    fn remove_connection_handler(&self, id: SubscriptionId) {
        self.connection_handlers.lock().retain(|(i, _)| *i != id);
    }
}
