//! Order management for the Tradewind trading core.
//!
//! The [`OrderManager`] is the process-wide registry of in-flight orders:
//! it routes placements to a [`provider::Provider`], accepts executions and
//! cancels coming back, and archives orders as they go terminal. Strategies
//! observe per-order delegates and/or the manager's broadcast event bus.
//!
//! Locking discipline: the active map is guarded by one `RwLock`, each order
//! by its own mutex. Delegates and provider calls never run under the map
//! lock, so observers may query the manager, but must not re-enter it for
//! the order currently firing.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod lifecycle;
pub mod order;
pub mod persistence;
pub mod provider;

pub use error::{OmsError, OmsResult};

use order::{Execution, Order, OrderErrorKind, OrderStatus};
use parking_lot::{Mutex, RwLock};
use persistence::{OrderArchive, OrderIdSequence, TerminalOrderRecord};
use provider::Provider;
use rustc_hash::FxHashMap;
use services_common::{Delegate, DelegateToken, OrderId, Ts};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// An in-flight order together with its routing provider.
struct ActiveOrder {
    order: Arc<Mutex<Order>>,
    provider: Arc<dyn Provider>,
}

/// Events broadcast by the manager as orders move through their lifecycle.
#[derive(Debug, Clone)]
pub enum OrderEvent {
    /// Order accepted and routed
    Placed {
        /// The order
        order_id: OrderId,
        /// Submission timestamp
        ts: Ts,
    },
    /// An execution was applied
    Execution {
        /// The order
        order_id: OrderId,
        /// The fill
        execution: Execution,
    },
    /// Order status changed
    StatusChanged {
        /// The order
        order_id: OrderId,
        /// Status before
        old_status: OrderStatus,
        /// Status after
        new_status: OrderStatus,
    },
    /// Order was cancelled
    Cancelled {
        /// The order
        order_id: OrderId,
        /// Cancellation timestamp
        ts: Ts,
    },
    /// Terminal order left the active map
    Archived {
        /// The order
        order_id: OrderId,
    },
}

/// Process-wide order registry.
pub struct OrderManager {
    active: RwLock<FxHashMap<OrderId, ActiveOrder>>,
    ids: Arc<dyn OrderIdSequence>,
    archive: Arc<dyn OrderArchive>,
    events: broadcast::Sender<OrderEvent>,
    no_order_found: Mutex<Delegate<OrderId>>,
}

impl OrderManager {
    /// Create a manager backed by the given id sequence and archive.
    #[must_use]
    pub fn new(ids: Arc<dyn OrderIdSequence>, archive: Arc<dyn OrderArchive>) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            active: RwLock::new(FxHashMap::default()),
            ids,
            archive,
            events,
            no_order_found: Mutex::new(Delegate::new()),
        }
    }

    /// Allocate the next order id from the persisted counter.
    pub fn next_order_id(&self) -> OmsResult<OrderId> {
        self.ids.next_order_id()
    }

    /// Subscribe to lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.events.subscribe()
    }

    /// Register an observer for cancels/executions referencing unknown ids.
    pub fn on_no_order_found(
        &self,
        observer: impl FnMut(&OrderId) + Send + 'static,
    ) -> DelegateToken {
        self.no_order_found.lock().add(observer)
    }

    /// Number of in-flight orders.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.read().len()
    }

    /// Look up an in-flight order.
    #[must_use]
    pub fn get(&self, order_id: OrderId) -> Option<Arc<Mutex<Order>>> {
        self.active.read().get(&order_id).map(|e| e.order.clone())
    }

    /// Submit an order through a provider.
    ///
    /// The order must be freshly created; it is marked submitted, tracked in
    /// the active map and forwarded. A synchronous rejection unwinds the
    /// insert, flags the order Rejected and archives it.
    pub fn place_order(&self, provider: Arc<dyn Provider>, mut order: Order) -> OmsResult<OrderId> {
        let order_id = order.id();
        if order.status() != OrderStatus::Created {
            return Err(OmsError::InvalidTransition {
                order_id,
                from: order.status(),
                to: OrderStatus::Submitted,
            });
        }
        let now = Ts::now();
        order.mark_submitted(now);
        order.set_provider_name(provider.name());

        let order_arc = Arc::new(Mutex::new(order));
        self.active.write().insert(
            order_id,
            ActiveOrder {
                order: order_arc.clone(),
                provider: provider.clone(),
            },
        );

        let routed = {
            let guard = order_arc.lock();
            provider.place_order(&guard)
        };
        if let Err(err) = routed {
            warn!(%order_id, provider = provider.name(), %err, "order rejected at placement");
            self.active.write().remove(&order_id);
            order_arc.lock().act_on_error(OrderErrorKind::Rejected);
            self.archive_order(&order_arc);
            return Err(OmsError::ProviderRejected {
                order_id,
                reason: err.to_string(),
            });
        }

        debug!(%order_id, provider = provider.name(), "order placed");
        let _ = self.events.send(OrderEvent::Placed { order_id, ts: now });
        Ok(order_id)
    }

    /// Forward a cancel request to the order's provider.
    ///
    /// Fails locally only on an unknown id, which also fires the
    /// no-order-found delegate.
    pub fn cancel_order(&self, order_id: OrderId) -> OmsResult<()> {
        let provider = self
            .active
            .read()
            .get(&order_id)
            .map(|entry| entry.provider.clone());
        match provider {
            Some(provider) => provider.cancel_order(order_id),
            None => {
                self.no_order_found.lock().fire(&order_id);
                Err(OmsError::OrderNotFound { order_id })
            }
        }
    }

    /// Apply an execution reported by a provider.
    ///
    /// On the final fill the order is removed from the active map and
    /// archived. An overfill attempt rejects the execution, flags the order
    /// Rejected and archives it, keeping the active map consistent.
    pub fn report_execution(&self, order_id: OrderId, exec: Execution) -> OmsResult<OrderStatus> {
        let Some(order_arc) = self.get(order_id) else {
            self.no_order_found.lock().fire(&order_id);
            return Err(OmsError::OrderNotFound { order_id });
        };

        let (old_status, outcome) = {
            let mut guard = order_arc.lock();
            let old = guard.status();
            (old, guard.report_execution(exec.clone()))
        };

        match outcome {
            Ok(new_status) => {
                let _ = self.events.send(OrderEvent::Execution {
                    order_id,
                    execution: exec,
                });
                if old_status != new_status {
                    let _ = self.events.send(OrderEvent::StatusChanged {
                        order_id,
                        old_status,
                        new_status,
                    });
                }
                if new_status == OrderStatus::Filled {
                    self.remove_and_archive(order_id);
                }
                Ok(new_status)
            }
            Err(err @ OmsError::Overfill { .. }) => {
                error!(%order_id, %err, "overfill attempt; rejecting order");
                order_arc.lock().act_on_error(OrderErrorKind::Rejected);
                self.remove_and_archive(order_id);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Apply a cancel confirmed by a provider.
    pub fn report_cancel(&self, order_id: OrderId, ts: Ts) -> OmsResult<()> {
        let Some(order_arc) = self.get(order_id) else {
            self.no_order_found.lock().fire(&order_id);
            return Err(OmsError::OrderNotFound { order_id });
        };
        order_arc.lock().cancel(ts)?;
        let _ = self.events.send(OrderEvent::Cancelled { order_id, ts });
        self.remove_and_archive(order_id);
        Ok(())
    }

    /// Attach commission to an in-flight order.
    ///
    /// Commission for an already-archived order is dropped with a log line;
    /// the simulator emits commission before the final fill precisely so
    /// this does not happen in the normal path.
    pub fn report_commission(&self, order_id: OrderId, amount: i64) {
        match self.get(order_id) {
            Some(order_arc) => order_arc.lock().set_commission(amount),
            None => debug!(%order_id, amount, "commission for unknown order dropped"),
        }
    }

    /// Apply a provider error, rejecting and archiving the order.
    pub fn report_error(&self, order_id: OrderId, kind: OrderErrorKind) -> OmsResult<()> {
        let Some(order_arc) = self.get(order_id) else {
            self.no_order_found.lock().fire(&order_id);
            return Err(OmsError::OrderNotFound { order_id });
        };
        order_arc.lock().act_on_error(kind);
        self.remove_and_archive(order_id);
        Ok(())
    }

    fn remove_and_archive(&self, order_id: OrderId) {
        let Some(entry) = self.active.write().remove(&order_id) else {
            return;
        };
        self.archive_order(&entry.order);
        let _ = self.events.send(OrderEvent::Archived { order_id });
    }

    fn archive_order(&self, order_arc: &Arc<Mutex<Order>>) {
        let record = TerminalOrderRecord::from(&*order_arc.lock());
        let order_id = record.order_id;
        if let Err(err) = self.archive.archive(&record) {
            error!(%order_id, %err, "failed to archive terminal order");
        } else {
            info!(%order_id, status = ?record.status, filled = %record.filled, "order archived");
        }
    }
}
