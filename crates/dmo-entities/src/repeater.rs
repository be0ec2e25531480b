use dmo_config::{RepeaterState, SharedConfig, StackMode};
use dmo_core::burst_class::FULL_SLOT_BITS;
use dmo_core::{BurstClass, LogicalChannel};
use dmo_pdus::dmac::fields::colour_code::SYNC_SCRAMBLING_CODE;
use dmo_pdus::dmac::pdus::sync_pdu::SyncPdu;

use crate::callctl::CallControl;
use crate::codec::ChannelCodec;
use crate::phy::{BurstFactory, DmBurst, apply_framing, frame_burst, presence_signal, split_dm_burst};
use crate::sched::{RepeaterChannelState, SlotContent, SlotScheduler};
use crate::timing::{RxTiming, TimingEngine};
use crate::transport::{RadioBurst, TxBurst, TxFlags};

/// The repeater core: timing engine, slot scheduler and call control wired together.
///
/// Owned by a single thread. Received bursts go in through [`rx_burst`](Self::rx_burst),
/// and [`tick`](Self::tick) hands out whatever is due for transmission.
pub struct Repeater {
    config: SharedConfig,
    timing: TimingEngine,
    sched: SlotScheduler,
    callctl: CallControl,
    /// Class of the burst sent in the previous slot, None if it was empty
    prev_class: Option<BurstClass>,
}

impl Repeater {
    pub fn new(config: SharedConfig, codec: Box<dyn ChannelCodec>) -> Self {
        let cfg = config.config();
        Self {
            timing: TimingEngine::new(&cfg.timing),
            sched: SlotScheduler::new(&cfg.repeater),
            callctl: CallControl::new(config.clone(), BurstFactory::new(codec)),
            prev_class: None,
            config,
        }
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn channel_state(&self) -> RepeaterChannelState {
        self.sched.channel_state()
    }

    pub fn scheduler(&self) -> &SlotScheduler {
        &self.sched
    }

    pub fn scheduler_mut(&mut self) -> &mut SlotScheduler {
        &mut self.sched
    }

    pub fn timing(&self) -> &TimingEngine {
        &self.timing
    }

    pub fn callctl(&self) -> &CallControl {
        &self.callctl
    }

    fn count(&self, f: impl FnOnce(&mut RepeaterState)) {
        if let Some(mut s) = self.config.try_state_write() {
            f(&mut s);
        }
    }

    /// Handles one burst from the radio
    pub fn rx_burst(&mut self, burst: &RadioBurst) {
        self.count(|s| s.rx_bursts += 1);

        let rx = match self.timing.rx_burst(burst.ts_ns) {
            RxTiming::Echo { .. } => {
                self.count(|s| s.echoes += 1);
                return;
            }
            RxTiming::Burst(rx) => rx,
        };
        tracing::trace!(ts=%rx.time, "rx {} bits, diff {} ns", burst.bits.get_len(), rx.diff_ns);

        let Some(dm) = split_dm_burst(&burst.bits) else {
            tracing::debug!(ts=%rx.time, "no DM burst recognised in {} bits", burst.bits.get_len());
            self.count(|s| s.decode_failures += 1);
            return;
        };

        match dm {
            DmBurst::Sync { sch_s, sch_h } => {
                let Some(pdu) = self.decode_sync(&sch_s, &sch_h) else {
                    tracing::debug!(ts=%rx.time, "sync burst failed to decode");
                    self.count(|s| s.decode_failures += 1);
                    return;
                };
                let outcome = self.callctl.rx_sync(rx.time, pdu, &mut self.sched);
                if let Some(target) = outcome.resync {
                    let r = self.timing.resync(target, burst.ts_ns);
                    self.count(|s| {
                        s.resyncs += 1;
                        s.degraded_resyncs += r.degraded as u64;
                    });
                }
                self.count(|s| s.relayed_sync += outcome.relayed as u64);
            }
            DmBurst::Normal { train, blk1, blk2 } => {
                let outcome = self.callctl.rx_normal(rx.time, train, &blk1, &blk2, &mut self.sched);
                self.count(|s| {
                    s.relayed_traffic += outcome.relayed as u64;
                    s.decode_failures += outcome.decode_failed as u64;
                });
            }
        }
    }

    fn decode_sync(&self, sch_s: &dmo_core::BitBuffer, sch_h: &dmo_core::BitBuffer) -> Option<SyncPdu> {
        let codec = self.callctl.factory().codec();
        let (mut s, ok_s) = codec.decode(LogicalChannel::SchS, sch_s, SYNC_SCRAMBLING_CODE).ok()?;
        let (mut h, ok_h) = codec.decode(LogicalChannel::SchH, sch_h, SYNC_SCRAMBLING_CODE).ok()?;
        if !(ok_s && ok_h) {
            return None;
        }
        match SyncPdu::from_blocks(&mut s, &mut h) {
            Ok(pdu) => Some(pdu),
            Err(e) => {
                tracing::warn!("sync pdu parse error: {:?}", e);
                None
            }
        }
    }

    /// Runs every TX slot that is due at `now_ns`, returning the bursts to transmit.
    pub fn tick(&mut self, now_ns: u64) -> Vec<TxBurst> {
        let mut out = Vec::new();
        while let Some(tx) = self.timing.tx_tick(now_ns) {
            self.callctl.tick();
            let content = self.sched.take(tx.time);

            let cfg = self.config.config();
            if cfg.stack_mode == StackMode::Monitor {
                continue;
            }

            let burst = match content {
                SlotContent::Burst(b) => b,
                SlotContent::Beacon { countdown } => {
                    let pdu = presence_signal(&cfg, self.sched.channel_state().presence_code(), tx.time, countdown);
                    match self.callctl.factory().sync_burst(&pdu) {
                        Ok(b) => {
                            tracing::debug!(ts=%tx.time, "presence signal, fc {}", countdown);
                            self.count(|s| s.beacons += 1);
                            b
                        }
                        Err(e) => {
                            tracing::warn!(ts=%tx.time, "could not build presence signal: {}", e);
                            self.prev_class = None;
                            continue;
                        }
                    }
                }
                SlotContent::Empty => {
                    self.prev_class = None;
                    continue;
                }
            };

            let class = if burst.get_len() == FULL_SLOT_BITS { BurstClass::FullSlot } else { BurstClass::DmNormal };
            let Some(bits) = apply_framing(frame_burst(class, self.prev_class), &burst) else {
                tracing::warn!(ts=%tx.time, "dropping burst of {} bits", burst.get_len());
                self.prev_class = None;
                continue;
            };
            self.prev_class = Some(class);
            self.timing.record_tx(&tx);
            self.count(|s| s.tx_bursts += 1);
            tracing::trace!(ts=%tx.time, "tx at {}", tx.tx_time_ns);
            out.push(TxBurst {
                bits,
                ts_ns: tx.tx_time_ns,
                flags: TxFlags { use_timestamp: true, drop_if_late: true },
            });
        }
        out
    }
}
