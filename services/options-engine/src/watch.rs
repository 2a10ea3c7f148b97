//! Watch handles shared between provider threads and the scan task.
//!
//! Quote callbacks arrive on provider threads at market-data rates; the scan
//! task reads the latest value once per cycle. The quote lives in an
//! `AtomicCell`, so a reader can never observe a torn value and neither path
//! ever blocks the other.

use crossbeam::atomic::AtomicCell;
use parking_lot::Mutex;
use services_common::{Delegate, DelegateToken, Greek, InstrumentRef, Quote};
use std::sync::atomic::{AtomicU32, Ordering};

/// Underlying-instrument watch: holds the most recent quote.
#[derive(Debug)]
pub struct Watch {
    instrument: InstrumentRef,
    last_quote: AtomicCell<Option<Quote>>,
    watchers: AtomicU32,
}

impl Watch {
    /// Create a watch for an instrument
    #[must_use]
    pub fn new(instrument: InstrumentRef) -> Self {
        Self {
            instrument,
            last_quote: AtomicCell::new(None),
            watchers: AtomicU32::new(0),
        }
    }

    /// The watched instrument
    #[must_use]
    pub const fn instrument(&self) -> &InstrumentRef {
        &self.instrument
    }

    /// Record a new quote. Called from provider threads.
    pub fn update_quote(&self, quote: Quote) {
        self.last_quote.store(Some(quote));
    }

    /// Latest observed quote, if any has arrived yet.
    #[must_use]
    pub fn last_quote(&self) -> Option<Quote> {
        self.last_quote.load()
    }

    /// Register interest. Returns true when this is the first watcher, i.e.
    /// the caller should start the upstream quote subscription.
    pub fn start_watch(&self) -> bool {
        self.watchers.fetch_add(1, Ordering::SeqCst) == 0
    }

    /// Drop interest. Returns true when this was the last watcher, i.e. the
    /// caller should stop the upstream quote subscription.
    pub fn stop_watch(&self) -> bool {
        self.watchers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|previous| previous == 1)
            .unwrap_or(false)
    }

    /// Current watcher count
    #[must_use]
    pub fn watcher_count(&self) -> u32 {
        self.watchers.load(Ordering::SeqCst)
    }
}

/// Option handle: receives computed Greeks and fans them out.
#[derive(Debug)]
pub struct OptionWatch {
    instrument: InstrumentRef,
    greeks: Mutex<Delegate<Greek>>,
    last_greek: AtomicCell<Option<Greek>>,
}

impl OptionWatch {
    /// Create a handle for an option contract
    #[must_use]
    pub fn new(instrument: InstrumentRef) -> Self {
        Self {
            instrument,
            greeks: Mutex::new(Delegate::new()),
            last_greek: AtomicCell::new(None),
        }
    }

    /// The option contract
    #[must_use]
    pub const fn instrument(&self) -> &InstrumentRef {
        &self.instrument
    }

    /// Register a Greek observer
    pub fn on_greek(&self, observer: impl FnMut(&Greek) + Send + 'static) -> DelegateToken {
        self.greeks.lock().add(observer)
    }

    /// Unregister a Greek observer
    pub fn remove_greek_handler(&self, token: DelegateToken) -> bool {
        self.greeks.lock().remove(token)
    }

    /// Publish a computed Greek record. Called by the pricing sink on the
    /// scan task.
    pub fn emit_greek(&self, greek: Greek) {
        self.last_greek.store(Some(greek));
        self.greeks.lock().fire(&greek);
    }

    /// Most recently computed Greek record
    #[must_use]
    pub fn last_greek(&self) -> Option<Greek> {
        self.last_greek.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use services_common::{Instrument, Px, Qty, Symbol, Ts};
    use std::sync::Arc;

    fn watch() -> Watch {
        Watch::new(Arc::new(Instrument::equity(Symbol::new(1), "GLD")))
    }

    #[test]
    fn test_quote_cell_round_trip() {
        let watch = watch();
        assert!(watch.last_quote().is_none());

        let quote = Quote::new(Ts::from_millis(5))
            .with_bid(Px::from_i64(1_000_000), Qty::from_units(100))
            .with_ask(Px::from_i64(1_000_500), Qty::from_units(200));
        watch.update_quote(quote);
        assert_eq!(watch.last_quote(), Some(quote));
    }

    #[test]
    fn test_watcher_counting() {
        let watch = watch();
        assert!(watch.start_watch());
        assert!(!watch.start_watch());
        assert_eq!(watch.watcher_count(), 2);
        assert!(!watch.stop_watch());
        assert!(watch.stop_watch());
        // extra stop does not underflow
        assert!(!watch.stop_watch());
        assert_eq!(watch.watcher_count(), 0);
    }

    #[test]
    fn test_option_watch_emits_to_observers() {
        let option = OptionWatch::new(Arc::new(Instrument::equity(Symbol::new(2), "OPT")));
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let token = {
            let seen = seen.clone();
            option.on_greek(move |greek| seen.lock().push(greek.delta))
        };

        option.emit_greek(Greek {
            ts: Ts::from_millis(1),
            delta: 0.5,
            ..Greek::default()
        });
        assert_eq!(*seen.lock(), vec![0.5]);
        assert_eq!(option.last_greek().map(|g| g.delta), Some(0.5));

        assert!(option.remove_greek_handler(token));
        option.emit_greek(Greek::default());
        assert_eq!(seen.lock().len(), 1);
    }
}
