use std::sync::Arc;
use std::time::{Duration, Instant};

use dmo_core::BitBuffer;

pub mod file;
pub mod loopback;

pub use file::{FileRx, FileTx};
pub use loopback::{LoopbackPeer, LoopbackRx, LoopbackTx, loopback};

/// One received burst with its arrival time on the transport's clock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioBurst {
    pub bits: BitBuffer,
    pub ts_ns: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxFlags {
    /// Transmit at `ts_ns` rather than as soon as possible
    pub use_timestamp: bool,
    /// Discard the burst if `ts_ns` has already passed
    pub drop_if_late: bool,
}

/// One slot-aligned burst for transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxBurst {
    pub bits: BitBuffer,
    pub ts_ns: u64,
    pub flags: TxFlags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Io(String),
    Parse { line: usize, reason: String },
    /// The other side is gone and nothing more will arrive
    Disconnected,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Io(e) => write!(f, "I/O error: {}", e),
            TransportError::Parse { line, reason } => write!(f, "line {}: {}", line, reason),
            TransportError::Disconnected => write!(f, "disconnected"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Io(e.to_string())
    }
}

/// Receive side of the radio. Owned by the ingestion thread.
pub trait RxTransport: Send {
    /// Waits at most `timeout` for the next burst. `Ok(None)` means nothing arrived in time.
    fn recv(&mut self, timeout: Duration) -> Result<Option<RadioBurst>, TransportError>;
}

/// Transmit side of the radio. Must not block for longer than a fraction of a slot.
pub trait TxTransport: Send {
    fn send(&mut self, burst: TxBurst) -> Result<(), TransportError>;
}

/// Source of the nanosecond timeline shared by RX timestamps and TX scheduling
pub trait Clock: Send {
    fn now_ns(&self) -> u64;
}

/// Nanoseconds since construction. Clones share the same origin.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Arc<Instant>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Arc::new(Instant::now()) }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ns(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}
