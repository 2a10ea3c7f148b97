//! Continuous option valuation for the Tradewind trading core.
//!
//! The [`OptionGreeksEngine`] keeps a reference-counted registry of
//! (option, underlying) pairs and, on a periodic cadence, computes each
//! option's theoretical value and Greeks from the latest underlying quote
//! through a pricing plug-in.
//!
//! Market-data callbacks fire on provider threads at high rate; computing
//! Greeks inline would stall ingestion. Structural mutations therefore go
//! through a pending-operation queue and are applied only between scans, on
//! the scan task: quote callbacks touch nothing but a per-watch atomic cell,
//! and the compute pass iterates a map no other thread mutates.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod watch;

pub use watch::{OptionWatch, Watch};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use services_common::{Greek, InstrumentRef, Quote, Symbol, Ts};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Builds the watch for an underlying instrument (plug-in, memoised).
pub type WatchBuilder = Arc<dyn Fn(&InstrumentRef) -> Arc<Watch> + Send + Sync>;

/// Builds the handle for an option contract (plug-in, memoised).
pub type OptionBuilder = Arc<dyn Fn(&InstrumentRef) -> Arc<OptionWatch> + Send + Sync>;

/// Interest-rate supply: risk-free rate at a given time. Term-structure
/// construction lives outside the core.
pub type RateFn = Arc<dyn Fn(Ts) -> f64 + Send + Sync>;

/// Pricing plug-in. Receives the option, the latest underlying quote and the
/// risk-free rate, and routes each computed record into the sink. The core
/// ships no pricing model of its own.
pub type CalcFn = Arc<dyn Fn(&OptionWatch, &Quote, f64, &mut dyn FnMut(Greek)) + Send + Sync>;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct GreeksConfig {
    /// Cadence of the scan cycle
    pub scan_interval: Duration,
}

impl Default for GreeksConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_millis(250),
        }
    }
}

enum PendingOp {
    Add {
        option: Arc<OptionWatch>,
        underlying: Arc<Watch>,
    },
    Remove {
        option: Arc<OptionWatch>,
    },
}

struct OptionEntry {
    option: Arc<OptionWatch>,
    underlying: Arc<Watch>,
    ref_count: u32,
}

/// Reference-counted registry of options priced against their underlyings.
pub struct OptionGreeksEngine {
    config: GreeksConfig,
    calc: CalcFn,
    rate: RateFn,
    watch_builder: WatchBuilder,
    option_builder: OptionBuilder,
    known_watches: Mutex<FxHashMap<Symbol, Arc<Watch>>>,
    known_options: Mutex<FxHashMap<Symbol, Arc<OptionWatch>>>,
    // the only lock producer threads touch on the hot path
    pending: Mutex<VecDeque<PendingOp>>,
    // structural mutations and iteration happen on the scan task only
    entries: Mutex<FxHashMap<Symbol, OptionEntry>>,
    stopping: AtomicBool,
}

impl OptionGreeksEngine {
    /// Create an engine with the given pricing plug-in, rate supply and
    /// watch/option builders.
    #[must_use]
    pub fn new(
        config: GreeksConfig,
        calc: CalcFn,
        rate: RateFn,
        watch_builder: WatchBuilder,
        option_builder: OptionBuilder,
    ) -> Self {
        Self {
            config,
            calc,
            rate,
            watch_builder,
            option_builder,
            known_watches: Mutex::new(FxHashMap::default()),
            known_options: Mutex::new(FxHashMap::default()),
            pending: Mutex::new(VecDeque::new()),
            entries: Mutex::new(FxHashMap::default()),
            stopping: AtomicBool::new(false),
        }
    }

    /// Watch for an underlying, built lazily and memoised by symbol.
    pub fn find_or_build_watch(&self, instrument: &InstrumentRef) -> Arc<Watch> {
        self.known_watches
            .lock()
            .entry(instrument.symbol())
            .or_insert_with(|| (self.watch_builder)(instrument))
            .clone()
    }

    /// Handle for an option, built lazily and memoised by symbol.
    pub fn find_or_build_option(&self, instrument: &InstrumentRef) -> Arc<OptionWatch> {
        self.known_options
            .lock()
            .entry(instrument.symbol())
            .or_insert_with(|| (self.option_builder)(instrument))
            .clone()
    }

    /// Register interest in an (option, underlying) pair. Applied on the
    /// next scan; repeated adds for the same option increment its ref-count.
    pub fn add(&self, option: Arc<OptionWatch>, underlying: Arc<Watch>) {
        self.pending
            .lock()
            .push_back(PendingOp::Add { option, underlying });
    }

    /// Drop one reference to an option. Applied on the next scan, strictly
    /// after any earlier add for the same option; the entry is erased when
    /// its ref-count reaches zero.
    pub fn remove(&self, option: Arc<OptionWatch>) {
        self.pending.lock().push_back(PendingOp::Remove { option });
    }

    /// Operations waiting for the next scan
    #[must_use]
    pub fn pending_ops(&self) -> usize {
        self.pending.lock().len()
    }

    /// Number of live entries
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Ref-count for an option symbol (zero when absent)
    #[must_use]
    pub fn ref_count(&self, symbol: Symbol) -> u32 {
        self.entries
            .lock()
            .get(&symbol)
            .map_or(0, |entry| entry.ref_count)
    }

    /// One scan cycle: drain the operation queue, apply it in FIFO order,
    /// then price every entry that has seen an underlying quote.
    ///
    /// Public so tests and embedders can drive scans deterministically; the
    /// timer task calls this on its cadence. Must not be called from two
    /// threads at once.
    pub fn scan_once(&self) {
        let ops = {
            let mut pending = self.pending.lock();
            std::mem::take(&mut *pending)
        };

        let mut entries = self.entries.lock();
        if !ops.is_empty() {
            debug!(ops = ops.len(), "applying registry operations");
        }
        for op in ops {
            match op {
                PendingOp::Add { option, underlying } => {
                    let symbol = option.instrument().symbol();
                    let entry = entries.entry(symbol).or_insert_with(|| {
                        if underlying.start_watch() {
                            debug!(%symbol, underlying = %underlying.instrument().symbol(), "underlying watch started");
                        }
                        OptionEntry {
                            option,
                            underlying,
                            ref_count: 0,
                        }
                    });
                    entry.ref_count += 1;
                }
                PendingOp::Remove { option } => {
                    let symbol = option.instrument().symbol();
                    match entries.get_mut(&symbol) {
                        Some(entry) => {
                            entry.ref_count -= 1;
                            if entry.ref_count == 0 {
                                if entry.underlying.stop_watch() {
                                    debug!(%symbol, "underlying watch stopped");
                                }
                                entries.remove(&symbol);
                            }
                        }
                        None => warn!(%symbol, "remove for unwatched option dropped"),
                    }
                }
            }
        }

        for entry in entries.values() {
            let Some(quote) = entry.underlying.last_quote() else {
                continue;
            };
            let rate = (self.rate)(quote.ts);
            let option = entry.option.clone();
            (self.calc)(&entry.option, &quote, rate, &mut |greek| {
                option.emit_greek(greek);
            });
        }
    }

    /// Spawn the periodic scan task. Each cycle runs a scan, then sleeps for
    /// the configured interval; [`stop`](Self::stop) lets the in-flight scan
    /// complete. Call as `engine.clone().run()` to keep a handle for
    /// `add`/`remove`/`stop`.
    pub fn run(self: Arc<Self>) -> JoinHandle<()> {
        let engine = self;
        engine.stopping.store(false, Ordering::Release);
        info!(interval = ?engine.config.scan_interval, "greeks scan task started");
        tokio::spawn(async move {
            loop {
                if engine.stopping.load(Ordering::Acquire) {
                    info!("greeks scan task stopped");
                    break;
                }
                engine.scan_once();
                tokio::time::sleep(engine.config.scan_interval).await;
            }
        })
    }

    /// Ask the scan task to stop after the current cycle.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Release);
    }
}
