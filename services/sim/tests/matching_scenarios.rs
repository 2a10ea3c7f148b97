//! Venue-semantics scenarios for the simulated matching engine:
//! market sweep, partial limit fills, stop activation, delayed cancels and
//! the documented edge cases.

use oms::order::{Execution, Order, OrderSide};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use rstest::rstest;
use services_common::{Instrument, InstrumentRef, OrderId, Px, Qty, Quote, Symbol, Trade, Ts};
use sim::{SimulatedMatchingEngine, SimulationConfig};
use std::sync::Arc;
use std::time::Duration;

fn instrument() -> InstrumentRef {
    Arc::new(Instrument::equity(Symbol::new(1), "GLD"))
}

fn engine_with_delay(delay: Duration) -> SimulatedMatchingEngine {
    SimulatedMatchingEngine::new(&SimulationConfig {
        queue_delay: delay,
        commission_per_share: 0,
    })
}

fn engine() -> SimulatedMatchingEngine {
    engine_with_delay(Duration::ZERO)
}

fn quote(ms: u64, bid: i64, bid_units: i64, ask: i64, ask_units: i64) -> Quote {
    Quote::new(Ts::from_millis(ms))
        .with_bid(Px::from_i64(bid), Qty::from_units(bid_units))
        .with_ask(Px::from_i64(ask), Qty::from_units(ask_units))
}

fn trade(ms: u64, price: i64, units: i64) -> Trade {
    Trade::new(Ts::from_millis(ms), Px::from_i64(price), Qty::from_units(units))
}

fn market(id: u64, side: OrderSide, units: i64, ms: u64) -> Order {
    let mut order = Order::market(
        OrderId::new(id),
        instrument(),
        side,
        Qty::from_units(units),
        Ts::from_millis(ms),
    )
    .unwrap();
    order.mark_submitted(Ts::from_millis(ms));
    order
}

fn limit(id: u64, side: OrderSide, units: i64, limit_ticks: i64, ms: u64) -> Order {
    let mut order = Order::limit(
        OrderId::new(id),
        instrument(),
        side,
        Qty::from_units(units),
        Px::from_i64(limit_ticks),
        Ts::from_millis(ms),
    )
    .unwrap();
    order.mark_submitted(Ts::from_millis(ms));
    order
}

fn stop(id: u64, side: OrderSide, units: i64, stop_ticks: i64, ms: u64) -> Order {
    let mut order = Order::stop(
        OrderId::new(id),
        instrument(),
        side,
        Qty::from_units(units),
        Px::from_i64(stop_ticks),
        Ts::from_millis(ms),
    )
    .unwrap();
    order.mark_submitted(Ts::from_millis(ms));
    order
}

/// Records every engine callback in arrival order.
#[derive(Clone, Default)]
struct Recorder {
    fills: Arc<Mutex<Vec<(OrderId, Execution)>>>,
    cancels: Arc<Mutex<Vec<OrderId>>>,
    commissions: Arc<Mutex<Vec<(OrderId, i64)>>>,
    not_found: Arc<Mutex<Vec<OrderId>>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn attach(engine: &mut SimulatedMatchingEngine) -> Self {
        let recorder = Self::default();
        {
            let fills = recorder.fills.clone();
            let log = recorder.log.clone();
            engine.on_fill(move |(id, exec)| {
                log.lock().push(format!("fill:{id}"));
                fills.lock().push((*id, exec.clone()));
            });
        }
        {
            let cancels = recorder.cancels.clone();
            engine.on_cancelled(move |id| cancels.lock().push(*id));
        }
        {
            let commissions = recorder.commissions.clone();
            let log = recorder.log.clone();
            engine.on_commission(move |(id, amount)| {
                log.lock().push(format!("commission:{id}"));
                commissions.lock().push((*id, *amount));
            });
        }
        {
            let not_found = recorder.not_found.clone();
            engine.on_no_order_found(move |id| not_found.lock().push(*id));
        }
        recorder
    }

    fn fills(&self) -> Vec<(OrderId, Execution)> {
        self.fills.lock().clone()
    }

    fn total_filled(&self, id: OrderId) -> i64 {
        self.fills
            .lock()
            .iter()
            .filter(|(fill_id, _)| *fill_id == id)
            .map(|(_, exec)| exec.size.as_i64())
            .sum()
    }
}

#[test]
fn market_buy_fills_at_ask_immediately() {
    let mut engine = engine();
    let recorder = Recorder::attach(&mut engine);

    engine.submit(&market(1, OrderSide::Buy, 150, 0));
    engine.on_quote(&quote(1, 1_000_000, 100, 1_000_500, 200));

    let fills = recorder.fills();
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].0, OrderId::new(1));
    assert_eq!(fills[0].1.price, Px::from_i64(1_000_500));
    assert_eq!(fills[0].1.size, Qty::from_units(150));
    assert_eq!(engine.open_order_count(), 0);
}

#[test]
fn limit_buy_partial_then_complete() {
    let mut engine = engine();
    let recorder = Recorder::attach(&mut engine);

    engine.submit(&limit(2, OrderSide::Buy, 500, 1_000_500, 0));

    // tick 1: displayed ask size bounds the fill
    engine.on_quote(&quote(1, 1_000_000, 100, 1_000_500, 200));
    assert_eq!(recorder.total_filled(OrderId::new(2)), Qty::from_units(200).as_i64());
    assert!(engine.contains_order(OrderId::new(2)));

    // tick 2: more size arrives and the remainder fills
    engine.on_quote(&quote(2, 1_000_000, 100, 1_000_500, 400));
    assert_eq!(recorder.total_filled(OrderId::new(2)), Qty::from_units(500).as_i64());
    assert!(!engine.contains_order(OrderId::new(2)));

    let fills = recorder.fills();
    assert_eq!(fills.len(), 2);
    assert!(fills.iter().all(|(_, e)| e.price == Px::from_i64(1_000_500)));
}

#[test]
fn sell_stop_activates_when_bid_touches() {
    let mut engine = engine();
    let recorder = Recorder::attach(&mut engine);

    engine.submit(&stop(3, OrderSide::Sell, 100, 499_000, 0));

    // bid above the stop: dormant
    engine.on_quote(&quote(1, 500_000, 500, 500_500, 500));
    assert!(recorder.fills().is_empty());
    assert!(engine.contains_order(OrderId::new(3)));

    // bid at or below the stop: promoted to market and swept the same tick
    engine.on_quote(&quote(2, 498_500, 500, 499_000, 500));
    let fills = recorder.fills();
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].1.price, Px::from_i64(498_500));
    assert_eq!(fills[0].1.size, Qty::from_units(100));
}

#[test]
fn buy_stop_activates_when_ask_rises_to_it() {
    let mut engine = engine();
    let recorder = Recorder::attach(&mut engine);

    engine.submit(&stop(4, OrderSide::Buy, 50, 1_001_000, 0));

    engine.on_quote(&quote(1, 1_000_000, 100, 1_000_500, 100));
    assert!(recorder.fills().is_empty());

    engine.on_quote(&quote(2, 1_001_000, 100, 1_001_500, 100));
    let fills = recorder.fills();
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].1.price, Px::from_i64(1_001_500));
}

#[test]
fn stop_limit_moves_to_limit_book_on_trigger() {
    let mut engine = engine();
    let recorder = Recorder::attach(&mut engine);

    let mut order = Order::stop_limit(
        OrderId::new(5),
        instrument(),
        OrderSide::Sell,
        Qty::from_units(100),
        Px::from_i64(498_000), // limit
        Px::from_i64(499_000), // stop
        Ts::from_millis(0),
    )
    .unwrap();
    order.mark_submitted(Ts::from_millis(0));
    engine.submit(&order);

    // trigger tick: bid 49.85 touches the stop, the limit rests and then
    // matches the bid in the same pipeline pass
    engine.on_quote(&quote(1, 498_500, 500, 499_000, 500));
    let fills = recorder.fills();
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].1.price, Px::from_i64(498_500));
    assert!(fills[0].1.price >= Px::from_i64(498_000));
}

#[test]
fn delayed_cancel_races_fill_and_reports_no_order() {
    let mut engine = engine_with_delay(Duration::from_millis(200));
    let recorder = Recorder::attach(&mut engine);

    // submitted at t=0, active from t=200
    engine.submit(&limit(6, OrderSide::Buy, 100, 1_000_000, 0));
    // cancel requested at t=100, effective from t=300
    engine.cancel(OrderId::new(6), Ts::from_millis(100));

    // before activation nothing happens
    engine.on_quote(&quote(150, 999_500, 100, 1_000_000, 100));
    assert!(recorder.fills().is_empty());

    // activation tick: the crossing quote fills the entire order
    engine.on_quote(&quote(250, 999_500, 100, 1_000_000, 100));
    assert_eq!(recorder.total_filled(OrderId::new(6)), Qty::from_units(100).as_i64());

    // cancel finally processes against a terminal order
    engine.on_quote(&quote(350, 999_500, 100, 1_000_000, 100));
    assert!(recorder.cancels.lock().is_empty());
    assert_eq!(*recorder.not_found.lock(), vec![OrderId::new(6)]);
}

#[test]
fn delayed_cancel_removes_resting_order() {
    let mut engine = engine_with_delay(Duration::from_millis(100));
    let recorder = Recorder::attach(&mut engine);

    engine.submit(&limit(7, OrderSide::Buy, 100, 990_000, 0));
    engine.cancel(OrderId::new(7), Ts::from_millis(50));

    engine.on_quote(&quote(200, 999_500, 100, 1_000_000, 100));
    assert_eq!(*recorder.cancels.lock(), vec![OrderId::new(7)]);
    assert!(recorder.fills().is_empty());
    assert_eq!(engine.open_order_count(), 0);
}

#[test]
fn cancel_unknown_order_reports_no_order_found() {
    let mut engine = engine();
    let recorder = Recorder::attach(&mut engine);

    engine.cancel(OrderId::new(404), Ts::from_millis(0));
    engine.on_quote(&quote(1, 1_000_000, 100, 1_000_500, 100));
    assert_eq!(*recorder.not_found.lock(), vec![OrderId::new(404)]);
}

#[test]
fn same_level_fills_respect_fifo() {
    let mut engine = engine();
    let recorder = Recorder::attach(&mut engine);

    engine.submit(&limit(10, OrderSide::Buy, 100, 1_000_500, 0));
    engine.submit(&limit(11, OrderSide::Buy, 100, 1_000_500, 1));
    engine.on_quote(&quote(2, 1_000_000, 100, 1_000_500, 60));

    let fills = recorder.fills();
    assert_eq!(fills.len(), 2);
    assert_eq!(fills[0].0, OrderId::new(10));
    assert_eq!(fills[1].0, OrderId::new(11));
    // each order is bounded by the displayed size on this tick
    assert!(fills.iter().all(|(_, e)| e.size == Qty::from_units(60)));
}

#[test]
fn better_priced_level_fills_first() {
    let mut engine = engine();
    let recorder = Recorder::attach(&mut engine);

    engine.submit(&limit(12, OrderSide::Buy, 100, 1_000_500, 0));
    engine.submit(&limit(13, OrderSide::Buy, 100, 1_000_600, 1));
    engine.on_quote(&quote(2, 1_000_000, 100, 1_000_500, 500));

    let fills = recorder.fills();
    assert_eq!(fills.len(), 2);
    // the 100.06 bid has price priority over the 100.05 bid
    assert_eq!(fills[0].0, OrderId::new(13));
    assert_eq!(fills[1].0, OrderId::new(12));
    // both fill at the ask, never above their limits
    assert!(fills.iter().all(|(_, e)| e.price == Px::from_i64(1_000_500)));
}

#[test]
fn trade_prints_fill_resting_limits_until_exhausted() {
    let mut engine = engine();
    let recorder = Recorder::attach(&mut engine);

    engine.submit(&limit(14, OrderSide::Buy, 50, 1_000_000, 0));
    engine.submit(&limit(15, OrderSide::Buy, 50, 1_000_000, 1));
    // resting orders activate on the first event
    engine.on_trade(&trade(2, 999_000, 80));

    let fills = recorder.fills();
    assert_eq!(fills.len(), 2);
    assert_eq!(fills[0].0, OrderId::new(14));
    assert_eq!(fills[0].1.size, Qty::from_units(50));
    assert_eq!(fills[1].0, OrderId::new(15));
    assert_eq!(fills[1].1.size, Qty::from_units(30));
    // fills at the trade price, which is at or better than the limit
    assert!(fills.iter().all(|(_, e)| e.price == Px::from_i64(999_000)));
    assert!(engine.contains_order(OrderId::new(15)));
}

#[test]
fn crossed_quote_still_matches_with_price_priority() {
    let mut engine = engine();
    let recorder = Recorder::attach(&mut engine);

    engine.submit(&limit(16, OrderSide::Sell, 100, 1_000_500, 0));
    // crossed: bid above ask
    engine.on_quote(&quote(1, 1_001_000, 100, 1_000_000, 100));

    let fills = recorder.fills();
    assert_eq!(fills.len(), 1);
    // sell fills at the bid, above its limit
    assert_eq!(fills[0].1.price, Px::from_i64(1_001_000));
    assert!(fills[0].1.price >= Px::from_i64(1_000_500));
}

#[test]
fn zero_size_side_disables_matching_until_size_returns() {
    let mut engine = engine();
    let recorder = Recorder::attach(&mut engine);

    engine.submit(&limit(17, OrderSide::Buy, 100, 1_000_500, 0));
    engine.on_quote(&quote(1, 1_000_000, 100, 1_000_500, 0));
    assert!(recorder.fills().is_empty());

    engine.on_quote(&quote(2, 1_000_000, 100, 1_000_500, 300));
    assert_eq!(recorder.total_filled(OrderId::new(17)), Qty::from_units(100).as_i64());
}

#[test]
fn partially_satisfied_market_order_blocks_the_queue() {
    let mut engine = engine();
    let recorder = Recorder::attach(&mut engine);

    engine.submit(&market(18, OrderSide::Buy, 300, 0));
    engine.submit(&market(19, OrderSide::Buy, 100, 0));

    engine.on_quote(&quote(1, 1_000_000, 100, 1_000_500, 200));
    // head order takes the displayed size and keeps its place
    assert_eq!(recorder.total_filled(OrderId::new(18)), Qty::from_units(200).as_i64());
    assert_eq!(recorder.total_filled(OrderId::new(19)), 0);

    engine.on_quote(&quote(2, 1_000_000, 100, 1_000_500, 200));
    assert_eq!(recorder.total_filled(OrderId::new(18)), Qty::from_units(300).as_i64());
    assert_eq!(recorder.total_filled(OrderId::new(19)), Qty::from_units(100).as_i64());
}

#[test]
fn commission_fires_once_before_the_final_fill() {
    let mut engine = SimulatedMatchingEngine::new(&SimulationConfig {
        queue_delay: Duration::ZERO,
        commission_per_share: 10,
    });
    let recorder = Recorder::attach(&mut engine);

    engine.submit(&limit(20, OrderSide::Buy, 300, 1_000_500, 0));
    engine.on_quote(&quote(1, 1_000_000, 100, 1_000_500, 200));
    engine.on_quote(&quote(2, 1_000_000, 100, 1_000_500, 200));

    assert_eq!(*recorder.commissions.lock(), vec![(OrderId::new(20), 3_000)]);
    // ordering: partial fill, then commission immediately before the final fill
    assert_eq!(
        *recorder.log.lock(),
        vec!["fill:20", "commission:20", "fill:20"]
    );
}

#[rstest]
#[case::dormant_above_bid(499_000, 500_000, false)]
#[case::triggers_at_bid(500_000, 500_000, true)]
#[case::triggers_above_bid(500_500, 500_000, true)]
fn sell_stop_trigger_boundary(#[case] stop_ticks: i64, #[case] bid_ticks: i64, #[case] fires: bool) {
    let mut engine = engine();
    let recorder = Recorder::attach(&mut engine);

    engine.submit(&stop(21, OrderSide::Sell, 10, stop_ticks, 0));
    engine.on_quote(&quote(1, bid_ticks, 100, bid_ticks + 500, 100));

    assert_eq!(!recorder.fills().is_empty(), fires);
}
