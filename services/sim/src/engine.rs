//! Per-symbol matching engine driven by quote and trade events.
//!
//! Event methods take `&mut self`: callers (normally the provider dispatch
//! thread) serialise all access, and the engine holds no locks of its own.
//! Orders pass through a delay queue that simulates network and handling
//! latency, then rest in price-ordered books keyed on raw ticks; within a
//! price level, priority is FIFO by arrival into the book.

use oms::order::{Execution, Order, OrderSide, OrderType};
use services_common::constants::fixed_point::SCALE_4;
use services_common::{Delegate, DelegateToken, OrderId, Px, Qty, Quote, Trade, Ts};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, trace, warn};

// One counter across the universe of symbols keeps execution ids unique
// process-wide.
static EXEC_SEQ: AtomicU64 = AtomicU64::new(1);

fn next_exec_id() -> String {
    EXEC_SEQ.fetch_add(1, Ordering::SeqCst).to_string()
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Simulated network/handling delay applied to submits and cancels
    pub queue_delay: Duration,
    /// Commission per share, in price ticks
    pub commission_per_share: i64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            queue_delay: Duration::from_millis(250),
            commission_per_share: 0,
        }
    }
}

/// Order state as tracked inside the engine books.
#[derive(Debug, Clone)]
struct SimOrder {
    id: OrderId,
    side: OrderSide,
    order_type: OrderType,
    limit_price: Option<Px>,
    stop_price: Option<Px>,
    ordered: Qty,
    remaining: Qty,
    queued_at: Ts,
}

impl SimOrder {
    fn from_order(order: &Order) -> Self {
        Self {
            id: order.id(),
            side: order.side(),
            order_type: order.order_type(),
            limit_price: order.price(),
            stop_price: order.stop_price(),
            ordered: order.remaining(),
            remaining: order.remaining(),
            queued_at: order.submitted_at().unwrap_or_else(|| order.created_at()),
        }
    }
}

#[derive(Debug)]
struct PendingCancel {
    requested_at: Ts,
    order_id: OrderId,
}

type Book = BTreeMap<i64, VecDeque<SimOrder>>;

/// Matching engine for a single symbol.
pub struct SimulatedMatchingEngine {
    queue_delay: Duration,
    commission_per_share: i64,
    last_quote: Option<Quote>,
    delay_queue: VecDeque<SimOrder>,
    cancel_queue: VecDeque<PendingCancel>,
    market_queue: VecDeque<SimOrder>,
    // limit books, keyed on raw ticks; bids iterate from the back for best
    bids: Book,
    asks: Book,
    buy_stops: Book,
    sell_stops: Book,
    on_fill: Delegate<(OrderId, Execution)>,
    on_cancelled: Delegate<OrderId>,
    on_commission: Delegate<(OrderId, i64)>,
    on_no_order_found: Delegate<OrderId>,
}

impl SimulatedMatchingEngine {
    /// Create an engine with the given configuration
    #[must_use]
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            queue_delay: config.queue_delay,
            commission_per_share: config.commission_per_share,
            last_quote: None,
            delay_queue: VecDeque::new(),
            cancel_queue: VecDeque::new(),
            market_queue: VecDeque::new(),
            bids: Book::new(),
            asks: Book::new(),
            buy_stops: Book::new(),
            sell_stops: Book::new(),
            on_fill: Delegate::new(),
            on_cancelled: Delegate::new(),
            on_commission: Delegate::new(),
            on_no_order_found: Delegate::new(),
        }
    }

    /// Change the simulated submit/cancel delay
    pub const fn set_queue_delay(&mut self, delay: Duration) {
        self.queue_delay = delay;
    }

    /// Change the per-share commission, in price ticks
    pub const fn set_commission(&mut self, per_share: i64) {
        self.commission_per_share = per_share;
    }

    /// Register a fill observer
    pub fn on_fill(
        &mut self,
        observer: impl FnMut(&(OrderId, Execution)) + Send + 'static,
    ) -> DelegateToken {
        self.on_fill.add(observer)
    }

    /// Register a cancel-confirmation observer
    pub fn on_cancelled(
        &mut self,
        observer: impl FnMut(&OrderId) + Send + 'static,
    ) -> DelegateToken {
        self.on_cancelled.add(observer)
    }

    /// Register a commission observer; fires once per order, immediately
    /// before the final fill
    pub fn on_commission(
        &mut self,
        observer: impl FnMut(&(OrderId, i64)) + Send + 'static,
    ) -> DelegateToken {
        self.on_commission.add(observer)
    }

    /// Register an observer for cancels that found no live order
    pub fn on_no_order_found(
        &mut self,
        observer: impl FnMut(&OrderId) + Send + 'static,
    ) -> DelegateToken {
        self.on_no_order_found.add(observer)
    }

    /// Accept an order; it activates once the queue delay has elapsed.
    pub fn submit(&mut self, order: &Order) {
        let sim = SimOrder::from_order(order);
        trace!(order_id = %sim.id, order_type = ?sim.order_type, "order queued");
        self.delay_queue.push_back(sim);
    }

    /// Request cancellation; takes effect after the queue delay.
    pub fn cancel(&mut self, order_id: OrderId, ts: Ts) {
        self.cancel_queue.push_back(PendingCancel {
            requested_at: ts,
            order_id,
        });
    }

    /// Last quote the engine observed
    #[must_use]
    pub const fn last_quote(&self) -> Option<Quote> {
        self.last_quote
    }

    /// Number of live orders across every queue and book
    #[must_use]
    pub fn open_order_count(&self) -> usize {
        let books = [&self.bids, &self.asks, &self.buy_stops, &self.sell_stops];
        self.delay_queue.len()
            + self.market_queue.len()
            + books
                .iter()
                .map(|b| b.values().map(VecDeque::len).sum::<usize>())
                .sum::<usize>()
    }

    /// Whether an order is still live inside the engine
    #[must_use]
    pub fn contains_order(&self, order_id: OrderId) -> bool {
        let in_book = |book: &Book| {
            book.values()
                .any(|level| level.iter().any(|o| o.id == order_id))
        };
        self.delay_queue.iter().any(|o| o.id == order_id)
            || self.market_queue.iter().any(|o| o.id == order_id)
            || in_book(&self.bids)
            || in_book(&self.asks)
            || in_book(&self.buy_stops)
            || in_book(&self.sell_stops)
    }

    /// Consume a quote event: run the full pipeline against the new NBBO.
    pub fn on_quote(&mut self, quote: &Quote) {
        let now = quote.ts;
        self.process_cancel_queue(now);
        self.process_delay_queue(now);
        self.process_stop_orders(quote.has_bid().then_some(quote.bid), quote.has_ask().then_some(quote.ask));
        self.process_market_orders(quote);
        self.process_limit_orders_quote(quote);
        self.last_quote = Some(*quote);
    }

    /// Consume a trade event: delayed queues, stop activation against the
    /// trade price, then limit fills funded by the trade size.
    pub fn on_trade(&mut self, trade: &Trade) {
        let now = trade.ts;
        self.process_cancel_queue(now);
        self.process_delay_queue(now);
        self.process_stop_orders(Some(trade.price), Some(trade.price));
        self.process_limit_orders_trade(trade);
    }

    fn delay_nanos(&self) -> u64 {
        #[allow(clippy::cast_possible_truncation)]
        let nanos = self.queue_delay.as_nanos() as u64;
        nanos
    }

    fn process_cancel_queue(&mut self, now: Ts) {
        let delay = self.delay_nanos();
        while let Some(front) = self.cancel_queue.front() {
            if front.requested_at.as_nanos() + delay > now.as_nanos() {
                break;
            }
            let Some(pending) = self.cancel_queue.pop_front() else {
                break;
            };
            if self.remove_order(pending.order_id) {
                debug!(order_id = %pending.order_id, "order cancelled");
                self.on_cancelled.fire(&pending.order_id);
            } else {
                // already filled, already cancelled, or never seen
                self.on_no_order_found.fire(&pending.order_id);
            }
        }
    }

    fn process_delay_queue(&mut self, now: Ts) {
        let delay = self.delay_nanos();
        while let Some(front) = self.delay_queue.front() {
            if front.queued_at.as_nanos() + delay > now.as_nanos() {
                break;
            }
            let Some(order) = self.delay_queue.pop_front() else {
                break;
            };
            match order.order_type {
                OrderType::Market | OrderType::MarketOnClose => {
                    self.market_queue.push_back(order);
                }
                OrderType::Limit => self.insert_limit(order),
                OrderType::Stop | OrderType::StopLimit | OrderType::Trail => {
                    self.insert_stop(order);
                }
            }
        }
    }

    fn insert_limit(&mut self, order: SimOrder) {
        let Some(price) = order.limit_price else {
            warn!(order_id = %order.id, "limit order without a price dropped");
            return;
        };
        let book = match order.side {
            OrderSide::Buy => &mut self.bids,
            OrderSide::Sell => &mut self.asks,
        };
        book.entry(price.as_i64()).or_default().push_back(order);
    }

    fn insert_stop(&mut self, order: SimOrder) {
        let Some(price) = order.stop_price else {
            warn!(order_id = %order.id, "stop order without a stop price dropped");
            return;
        };
        let book = match order.side {
            OrderSide::Buy => &mut self.buy_stops,
            OrderSide::Sell => &mut self.sell_stops,
        };
        book.entry(price.as_i64()).or_default().push_back(order);
    }

    /// Promote stops touched by the market. Buy stops fire at or below the
    /// ask (or last trade); sell stops at or above the bid (or last trade).
    fn process_stop_orders(&mut self, bid: Option<Px>, ask: Option<Px>) {
        if let Some(ask) = ask {
            let triggered: Vec<i64> = self
                .buy_stops
                .range(..=ask.as_i64())
                .map(|(price, _)| *price)
                .collect();
            for price in triggered {
                if let Some(level) = self.buy_stops.remove(&price) {
                    for order in level {
                        self.promote_stop(order);
                    }
                }
            }
        }
        if let Some(bid) = bid {
            let triggered: Vec<i64> = self
                .sell_stops
                .range(bid.as_i64()..)
                .map(|(price, _)| *price)
                .collect();
            for price in triggered {
                if let Some(level) = self.sell_stops.remove(&price) {
                    for order in level {
                        self.promote_stop(order);
                    }
                }
            }
        }
    }

    fn promote_stop(&mut self, mut order: SimOrder) {
        debug!(order_id = %order.id, stop = ?order.stop_price, "stop triggered");
        if order.order_type == OrderType::StopLimit {
            self.insert_limit(order);
        } else {
            order.order_type = OrderType::Market;
            self.market_queue.push_back(order);
        }
    }

    /// Sweep market orders against the displayed top of book. An order the
    /// top cannot satisfy keeps its place at the head and blocks the queue
    /// until the next event.
    fn process_market_orders(&mut self, quote: &Quote) {
        loop {
            let Some(front) = self.market_queue.front() else {
                break;
            };
            let (price, available) = match front.side {
                OrderSide::Buy if quote.has_ask() => (quote.ask, quote.ask_size),
                OrderSide::Sell if quote.has_bid() => (quote.bid, quote.bid_size),
                _ => break,
            };
            let Some(mut order) = self.market_queue.pop_front() else {
                break;
            };
            let take = order.remaining.min(available);
            self.fill(&mut order, price, take, quote.ts);
            if !order.remaining.is_zero() {
                self.market_queue.push_front(order);
                break;
            }
        }
    }

    /// Fill limit orders priced at or through the opposite side of the
    /// quote. Best price first; each order takes at most the displayed size.
    fn process_limit_orders_quote(&mut self, quote: &Quote) {
        if quote.has_ask() {
            let crossing: Vec<i64> = self
                .bids
                .range(quote.ask.as_i64()..)
                .map(|(price, _)| *price)
                .collect();
            for price in crossing.iter().rev() {
                let Some(mut level) = self.bids.remove(price) else {
                    continue;
                };
                let mut survivors = VecDeque::new();
                while let Some(mut order) = level.pop_front() {
                    let take = order.remaining.min(quote.ask_size);
                    self.fill(&mut order, quote.ask, take, quote.ts);
                    if !order.remaining.is_zero() {
                        survivors.push_back(order);
                    }
                }
                if !survivors.is_empty() {
                    self.bids.insert(*price, survivors);
                }
            }
        }
        if quote.has_bid() {
            let crossing: Vec<i64> = self
                .asks
                .range(..=quote.bid.as_i64())
                .map(|(price, _)| *price)
                .collect();
            for price in &crossing {
                let Some(mut level) = self.asks.remove(price) else {
                    continue;
                };
                let mut survivors = VecDeque::new();
                while let Some(mut order) = level.pop_front() {
                    let take = order.remaining.min(quote.bid_size);
                    self.fill(&mut order, quote.bid, take, quote.ts);
                    if !order.remaining.is_zero() {
                        survivors.push_back(order);
                    }
                }
                if !survivors.is_empty() {
                    self.asks.insert(*price, survivors);
                }
            }
        }
    }

    /// Fill limit orders a trade print could have satisfied. The trade size
    /// is a single budget shared across both sides, best price first.
    fn process_limit_orders_trade(&mut self, trade: &Trade) {
        let mut budget = trade.size;
        let trade_ticks = trade.price.as_i64();

        let crossing: Vec<i64> = self
            .bids
            .range(trade_ticks..)
            .map(|(price, _)| *price)
            .collect();
        for price in crossing.iter().rev() {
            if budget.is_zero() {
                break;
            }
            let Some(mut level) = self.bids.remove(price) else {
                continue;
            };
            let mut survivors = VecDeque::new();
            while let Some(mut order) = level.pop_front() {
                if budget.is_zero() {
                    survivors.push_back(order);
                    continue;
                }
                let take = order.remaining.min(budget);
                self.fill(&mut order, trade.price, take, trade.ts);
                budget = budget.sub(take);
                if !order.remaining.is_zero() {
                    survivors.push_back(order);
                }
            }
            if !survivors.is_empty() {
                self.bids.insert(*price, survivors);
            }
        }

        let crossing: Vec<i64> = self
            .asks
            .range(..=trade_ticks)
            .map(|(price, _)| *price)
            .collect();
        for price in &crossing {
            if budget.is_zero() {
                break;
            }
            let Some(mut level) = self.asks.remove(price) else {
                continue;
            };
            let mut survivors = VecDeque::new();
            while let Some(mut order) = level.pop_front() {
                if budget.is_zero() {
                    survivors.push_back(order);
                    continue;
                }
                let take = order.remaining.min(budget);
                self.fill(&mut order, trade.price, take, trade.ts);
                budget = budget.sub(take);
                if !order.remaining.is_zero() {
                    survivors.push_back(order);
                }
            }
            if !survivors.is_empty() {
                self.asks.insert(*price, survivors);
            }
        }
    }

    fn fill(&mut self, order: &mut SimOrder, price: Px, size: Qty, ts: Ts) {
        let exec = Execution::new(next_exec_id(), price, size, ts, order.side);
        order.remaining = order.remaining.sub(size);
        debug!(
            order_id = %order.id,
            %price,
            %size,
            remaining = %order.remaining,
            "fill"
        );
        if order.remaining.is_zero() {
            // commission precedes the final fill so the order manager can
            // attach it before the order is archived
            let amount = self.commission_per_share * order.ordered.as_i64() / SCALE_4;
            self.on_commission.fire(&(order.id, amount));
        }
        self.on_fill.fire(&(order.id, exec));
    }

    fn remove_order(&mut self, order_id: OrderId) -> bool {
        if let Some(pos) = self.delay_queue.iter().position(|o| o.id == order_id) {
            self.delay_queue.remove(pos);
            return true;
        }
        if let Some(pos) = self.market_queue.iter().position(|o| o.id == order_id) {
            self.market_queue.remove(pos);
            return true;
        }
        for book in [
            &mut self.bids,
            &mut self.asks,
            &mut self.buy_stops,
            &mut self.sell_stops,
        ] {
            if Self::remove_from_book(book, order_id) {
                return true;
            }
        }
        false
    }

    fn remove_from_book(book: &mut Book, order_id: OrderId) -> bool {
        let mut emptied_level = None;
        let mut found = false;
        for (price, level) in book.iter_mut() {
            if let Some(pos) = level.iter().position(|o| o.id == order_id) {
                level.remove(pos);
                found = true;
                if level.is_empty() {
                    emptied_level = Some(*price);
                }
                break;
            }
        }
        if let Some(price) = emptied_level {
            book.remove(&price);
        }
        found
    }
}
