use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError, TrySendError, bounded};
use dmo_core::TIMING_SLOTS;

use crate::repeater::Repeater;
use crate::transport::{Clock, RadioBurst, RxTransport, TransportError, TxTransport};

/// Received bursts waiting for the tick loop. Beyond this the ingestion thread drops.
pub const RX_QUEUE_DEPTH: usize = 64;

/// How long the ingestion thread blocks on the transport before rechecking `running`
const RX_POLL: Duration = Duration::from_millis(20);

/// Starts the thread that reads bursts from the radio and queues them for the tick loop.
/// The returned receiver disconnects when the transport ends or `running` is cleared.
pub fn spawn_ingestion(
    mut rx: Box<dyn RxTransport>,
    running: Arc<AtomicBool>,
) -> std::io::Result<(Receiver<RadioBurst>, thread::JoinHandle<()>)> {
    let (sender, receiver) = bounded::<RadioBurst>(RX_QUEUE_DEPTH);
    let handle = thread::Builder::new().name("rx-ingestion".to_string()).spawn(move || {
        let mut dropped: u64 = 0;
        while running.load(Ordering::SeqCst) {
            match rx.recv(RX_POLL) {
                Ok(Some(burst)) => match sender.try_send(burst) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        dropped += 1;
                        tracing::warn!("rx queue full, dropped burst ({} total)", dropped);
                    }
                    Err(TrySendError::Disconnected(_)) => break,
                },
                Ok(None) => {}
                Err(TransportError::Disconnected) => {
                    tracing::info!("rx transport closed");
                    break;
                }
                Err(e) => tracing::warn!("rx transport error: {}", e),
            }
        }
        tracing::debug!("ingestion thread exiting");
    })?;
    Ok((receiver, handle))
}

/// Drives a [`Repeater`] in real time: bursts from the ingestion queue go in, due
/// slots come out to the TX transport.
pub struct Runner {
    repeater: Repeater,
    clock: Box<dyn Clock>,
    tx: Box<dyn TxTransport>,
    rx_queue: Receiver<RadioBurst>,
    ingestion: Option<thread::JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl Runner {
    pub fn new(
        repeater: Repeater,
        rx: Box<dyn RxTransport>,
        tx: Box<dyn TxTransport>,
        clock: Box<dyn Clock>,
        running: Arc<AtomicBool>,
    ) -> std::io::Result<Self> {
        let (rx_queue, handle) = spawn_ingestion(rx, running.clone())?;
        Ok(Self { repeater, clock, tx, rx_queue, ingestion: Some(handle), running })
    }

    pub fn repeater(&self) -> &Repeater {
        &self.repeater
    }

    /// Runs until `running` is cleared, the RX transport ends, or the TX transport disconnects.
    pub fn run(&mut self) -> Result<(), TransportError> {
        let poll = Duration::from_nanos(self.repeater.timing().slot_time_ns() / 8);
        let mut slots: u64 = 0;

        let result = loop {
            if !self.running.load(Ordering::SeqCst) {
                break Ok(());
            }

            let (_, slot_before) = self.repeater.timing().next_tx();
            if let Err(e) = self.flush_tx() {
                break Err(e);
            }
            let (_, slot_after) = self.repeater.timing().next_tx();
            let advanced = (slot_after + TIMING_SLOTS - slot_before) % TIMING_SLOTS;
            if advanced > 0 {
                let before = slots;
                slots += advanced as u64;
                if before / TIMING_SLOTS as u64 != slots / TIMING_SLOTS as u64 {
                    self.log_status();
                }
            }

            loop {
                match self.rx_queue.try_recv() {
                    Ok(burst) => self.repeater.rx_burst(&burst),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => break,
                }
            }

            match self.rx_queue.recv_timeout(poll) {
                Ok(burst) => self.repeater.rx_burst(&burst),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::info!("rx input ended, stopping");
                    break Ok(());
                }
            }
        };

        self.running.store(false, Ordering::SeqCst);
        self.log_status();
        result
    }

    fn flush_tx(&mut self) -> Result<(), TransportError> {
        for burst in self.repeater.tick(self.clock.now_ns()) {
            match self.tx.send(burst) {
                Ok(()) => {}
                Err(TransportError::Disconnected) => return Err(TransportError::Disconnected),
                Err(e) => tracing::warn!("tx error: {}", e),
            }
        }
        Ok(())
    }

    fn log_status(&self) {
        let s = self.repeater.config().state_read().clone();
        tracing::info!(
            "state {} | rx {} tx {} echo {} fail {} | relayed sync {} traffic {} | beacons {} | resync {} ({} degraded) | frag {} ok {} err",
            self.repeater.channel_state(),
            s.rx_bursts,
            s.tx_bursts,
            s.echoes,
            s.decode_failures,
            s.relayed_sync,
            s.relayed_traffic,
            s.beacons,
            s.resyncs,
            s.degraded_resyncs,
            s.fragments_completed,
            s.fragment_errors
        );
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.ingestion.take() {
            if handle.join().is_err() {
                tracing::error!("ingestion thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::TetraCodec;
    use crate::transport::{MonotonicClock, loopback};
    use dmo_config::{SharedConfig, StackMode};
    use dmo_core::BitBuffer;

    #[test]
    fn test_ingestion_forwards_and_stops() {
        let (rx, _tx, peer) = loopback();
        let running = Arc::new(AtomicBool::new(true));
        let (queue, handle) = spawn_ingestion(Box::new(rx), running.clone()).unwrap();

        peer.inject.send(RadioBurst { bits: BitBuffer::new(470), ts_ns: 42 }).unwrap();
        let b = queue.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(b.ts_ns, 42);

        running.store(false, Ordering::SeqCst);
        handle.join().unwrap();
        assert!(queue.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_runner_beacons_then_stops_on_rx_end() {
        let mut cfg = dmo_config::RepeaterConfig::new(StackMode::Repeater, 204, 1337);
        cfg.repeater.dt254 = 1;
        cfg.repeater.dn253 = 1;
        cfg.repeater.idle_timeout_slots = 4;
        let shared = SharedConfig::from_config(cfg).unwrap();
        let repeater = Repeater::new(shared.clone(), Box::new(TetraCodec));

        let (rx, tx, peer) = loopback();
        let running = Arc::new(AtomicBool::new(true));
        let mut runner = Runner::new(repeater, Box::new(rx), Box::new(tx), Box::new(MonotonicClock::new()), running).unwrap();

        // First presence run is due about 150 slots in. Closing the inject side ends the run.
        let inject = peer.inject;
        let closer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(2600));
            drop(inject);
        });
        runner.run().unwrap();
        closer.join().unwrap();

        let sent: Vec<_> = peer.observed.try_iter().collect();
        assert!(!sent.is_empty());
        assert!(sent.iter().all(|b| b.bits.get_len() == 510));
        assert!(shared.state_read().beacons > 0);
    }
}
