use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use super::{RadioBurst, RxTransport, TransportError, TxBurst, TxTransport};

/// In-process radio. The peer injects received bursts and observes transmitted ones.
pub fn loopback() -> (LoopbackRx, LoopbackTx, LoopbackPeer) {
    let (rx_tx, rx_rx) = unbounded();
    let (tx_tx, tx_rx) = unbounded();
    (LoopbackRx { chan: rx_rx }, LoopbackTx { chan: tx_tx }, LoopbackPeer { inject: rx_tx, observed: tx_rx })
}

pub struct LoopbackRx {
    chan: Receiver<RadioBurst>,
}

pub struct LoopbackTx {
    chan: Sender<TxBurst>,
}

/// Far end of a loopback radio
pub struct LoopbackPeer {
    pub inject: Sender<RadioBurst>,
    pub observed: Receiver<TxBurst>,
}

impl RxTransport for LoopbackRx {
    fn recv(&mut self, timeout: Duration) -> Result<Option<RadioBurst>, TransportError> {
        match self.chan.recv_timeout(timeout) {
            Ok(b) => Ok(Some(b)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Disconnected),
        }
    }
}

impl TxTransport for LoopbackTx {
    fn send(&mut self, burst: TxBurst) -> Result<(), TransportError> {
        self.chan.send(burst).map_err(|_| TransportError::Disconnected)
    }
}
