//! Persisted order-id counter and terminal-order archive.
//!
//! Persistence backends are external collaborators; the core defines the two
//! traits it needs plus file- and memory-backed implementations. The id
//! counter is durable before an id is released, which is what makes order
//! ids unique across restarts.

use crate::error::OmsResult;
use crate::order::{Execution, Order, OrderSide, OrderStatus, OrderType};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use services_common::{OrderId, Px, Qty, Symbol, Ts};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Source of process-wide unique order ids with acquire-next semantics.
pub trait OrderIdSequence: Send + Sync {
    /// Allocate the next id. The new counter value is durable before the id
    /// is released to the caller.
    fn next_order_id(&self) -> OmsResult<OrderId>;
}

/// In-memory id sequence for tests and throwaway sessions.
#[derive(Debug)]
pub struct MemoryOrderIdSequence {
    next: AtomicU64,
}

impl MemoryOrderIdSequence {
    /// Start issuing ids from `first`
    #[must_use]
    pub const fn new(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for MemoryOrderIdSequence {
    fn default() -> Self {
        Self::new(1)
    }
}

impl OrderIdSequence for MemoryOrderIdSequence {
    fn next_order_id(&self) -> OmsResult<OrderId> {
        Ok(OrderId::new(self.next.fetch_add(1, Ordering::SeqCst)))
    }
}

/// File-backed id sequence. The counter file holds a single JSON integer and
/// is replaced atomically (write-temp-then-rename) on every allocation.
#[derive(Debug)]
pub struct FileOrderIdSequence {
    path: PathBuf,
    last: Mutex<u64>,
}

impl FileOrderIdSequence {
    /// Open or create the counter file
    pub fn open(path: impl Into<PathBuf>) -> OmsResult<Self> {
        let path = path.into();
        let last = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str::<u64>(contents.trim())?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => 0,
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), last, "order id counter opened");
        Ok(Self {
            path,
            last: Mutex::new(last),
        })
    }

    fn persist(path: &Path, value: u64) -> OmsResult<()> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_string(&value)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl OrderIdSequence for FileOrderIdSequence {
    fn next_order_id(&self) -> OmsResult<OrderId> {
        let mut last = self.last.lock();
        let next = *last + 1;
        Self::persist(&self.path, next)?;
        *last = next;
        Ok(OrderId::new(next))
    }
}

/// Immutable snapshot of a terminal order, as archived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalOrderRecord {
    /// Order id
    pub order_id: OrderId,
    /// Instrument token
    pub symbol: Symbol,
    /// Human-readable trading symbol
    pub trading_symbol: String,
    /// Order side
    pub side: OrderSide,
    /// Order type
    pub order_type: OrderType,
    /// Ordered quantity
    pub quantity: Qty,
    /// Quantity filled before the order went terminal
    pub filled: Qty,
    /// Average fill price, when any quantity filled
    pub average_fill_price: Option<Px>,
    /// Commission charged, in price ticks
    pub commission: i64,
    /// Terminal status
    pub status: OrderStatus,
    /// Creation timestamp
    pub created_at: Ts,
    /// Submission timestamp
    pub submitted_at: Option<Ts>,
    /// Final-fill timestamp
    pub filled_at: Option<Ts>,
    /// Cancellation timestamp
    pub cancelled_at: Option<Ts>,
    /// Routing provider name
    pub provider: Option<String>,
    /// Fill history
    pub executions: Vec<Execution>,
}

impl From<&Order> for TerminalOrderRecord {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id(),
            symbol: order.instrument().symbol(),
            trading_symbol: order.instrument().trading_symbol().to_string(),
            side: order.side(),
            order_type: order.order_type(),
            quantity: order.quantity(),
            filled: order.filled(),
            average_fill_price: order.average_fill_price(),
            commission: order.commission(),
            status: order.status(),
            created_at: order.created_at(),
            submitted_at: order.submitted_at(),
            filled_at: order.filled_at(),
            cancelled_at: order.cancelled_at(),
            provider: order.provider_name().map(str::to_string),
            executions: order.executions().to_vec(),
        }
    }
}

/// Archive of terminal orders, keyed by order id.
pub trait OrderArchive: Send + Sync {
    /// Store a terminal record
    fn archive(&self, record: &TerminalOrderRecord) -> OmsResult<()>;

    /// Look up an archived record
    fn load(&self, order_id: OrderId) -> OmsResult<Option<TerminalOrderRecord>>;
}

/// In-memory archive for tests.
#[derive(Debug, Default)]
pub struct MemoryOrderArchive {
    records: RwLock<FxHashMap<OrderId, TerminalOrderRecord>>,
}

impl MemoryOrderArchive {
    /// Create an empty archive
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of archived orders
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the archive is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl OrderArchive for MemoryOrderArchive {
    fn archive(&self, record: &TerminalOrderRecord) -> OmsResult<()> {
        self.records.write().insert(record.order_id, record.clone());
        Ok(())
    }

    fn load(&self, order_id: OrderId) -> OmsResult<Option<TerminalOrderRecord>> {
        Ok(self.records.read().get(&order_id).cloned())
    }
}

/// Append-only archive, one JSON record per line.
#[derive(Debug)]
pub struct JsonlOrderArchive {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlOrderArchive {
    /// Open or create the archive file
    pub fn open(path: impl Into<PathBuf>) -> OmsResult<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), "order archive opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }
}

impl OrderArchive for JsonlOrderArchive {
    fn archive(&self, record: &TerminalOrderRecord) -> OmsResult<()> {
        let line = serde_json::to_string(record)?;
        let mut file = self.file.lock();
        writeln!(file, "{line}")?;
        file.flush()?;
        debug!(order_id = %record.order_id, status = ?record.status, "order archived");
        Ok(())
    }

    fn load(&self, order_id: OrderId) -> OmsResult<Option<TerminalOrderRecord>> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut found = None;
        for line in reader.lines() {
            let record: TerminalOrderRecord = serde_json::from_str(&line?)?;
            if record.order_id == order_id {
                // last write wins
                found = Some(record);
            }
        }
        Ok(found)
    }
}
