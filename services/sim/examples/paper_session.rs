//! Minimal paper-trading session: one symbol, a couple of orders, a handful
//! of quotes. Run with `cargo run --example paper_session`.

use oms::order::{Order, OrderSide};
use oms::persistence::{MemoryOrderArchive, MemoryOrderIdSequence, OrderArchive};
use oms::{OrderEvent, OrderManager};
use services_common::{Instrument, Px, Qty, Quote, Symbol, Ts};
use sim::{SimulationConfig, SimulationProvider};
use std::sync::Arc;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sim=debug,oms=debug".into()),
        )
        .init();

    let archive = Arc::new(MemoryOrderArchive::new());
    let manager = Arc::new(OrderManager::new(
        Arc::new(MemoryOrderIdSequence::default()),
        archive.clone(),
    ));
    let provider = SimulationProvider::new(
        "sim",
        SimulationConfig {
            queue_delay: Duration::ZERO,
            commission_per_share: 10,
        },
        manager.clone(),
    );

    let mut events = manager.subscribe();

    let symbol = Symbol::new(1);
    let gld = Arc::new(Instrument::equity(symbol, "GLD"));

    let market_id = manager.next_order_id()?;
    manager.place_order(
        provider.clone(),
        Order::market(market_id, gld.clone(), OrderSide::Buy, Qty::from_units(150), Ts::now())?,
    )?;

    let limit_id = manager.next_order_id()?;
    manager.place_order(
        provider.clone(),
        Order::limit(
            limit_id,
            gld,
            OrderSide::Buy,
            Qty::from_units(500),
            Px::new(100.05),
            Ts::now(),
        )?,
    )?;

    for (ms, ask_units) in [(1_u64, 200_i64), (2, 400), (3, 400)] {
        let quote = Quote::new(Ts::from_millis(Ts::now().as_millis() + ms))
            .with_bid(Px::new(100.00), Qty::from_units(100))
            .with_ask(Px::new(100.05), Qty::from_units(ask_units));
        provider.inject_quote(symbol, &quote);
    }

    while let Ok(event) = events.try_recv() {
        match event {
            OrderEvent::Placed { order_id, .. } => println!("placed    {order_id}"),
            OrderEvent::Execution { order_id, execution } => println!(
                "execution {order_id}: {} @ {}",
                execution.size, execution.price
            ),
            OrderEvent::StatusChanged { order_id, new_status, .. } => {
                println!("status    {order_id}: {new_status:?}");
            }
            OrderEvent::Cancelled { order_id, .. } => println!("cancelled {order_id}"),
            OrderEvent::Archived { order_id } => println!("archived  {order_id}"),
        }
    }

    for id in [market_id, limit_id] {
        if let Some(record) = archive.load(id)? {
            println!(
                "archived order {id}: {:?} filled {} avg {:?} commission {}",
                record.status, record.filled, record.average_fill_price, record.commission
            );
        }
    }
    Ok(())
}
