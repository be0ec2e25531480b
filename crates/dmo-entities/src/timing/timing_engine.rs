use std::collections::VecDeque;

use dmo_config::CfgTiming;
use dmo_core::{DmoTime, SLOT_TIME_NS, TIMING_SLOTS};

/// Number of recent transmissions remembered for echo detection
const SENT_HISTORY: usize = 8;
/// Resync gives up after this many slot advances
const RESYNC_MAX_STEPS: u32 = 100;
/// Weight of a new echo residual in the calibration average, as 1/N
const CALIBRATION_SMOOTHING: i64 = 8;

/// A TX slot that is due now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxSlot {
    pub time: DmoTime,
    /// Slot counter, 0..4319
    pub slot: u32,
    /// Nominal start of the slot
    pub tx_time_ns: u64,
}

/// A received burst placed on the slot grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxSlot {
    pub time: DmoTime,
    pub slot: u32,
    pub ts_ns: u64,
    /// Offset from the nominal slot start. Only used for diagnostics.
    pub diff_ns: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxTiming {
    /// One of our own transmissions, heard back. Must not be processed further.
    Echo { residual_ns: i64 },
    Burst(RxSlot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResyncOutcome {
    /// Slots advanced from the target before tx_time was reached
    pub skipped: u32,
    /// Did not converge, schedule was forced to one slot from now
    pub degraded: bool,
}

#[derive(Debug, Clone, Copy)]
struct SentBurst {
    ts_ns: u64,
    slot: u32,
}

/// Free-running TX slot clock, with RX bursts mapped onto it by their timestamps.
///
/// `tx_time`/`tx_slot` always describe the next slot to be transmitted. Nothing
/// here moves `tx_time` backwards, so a slot is never handed out twice.
pub struct TimingEngine {
    slot_time_ns: u64,
    lookahead_ns: u64,
    echo_window_ns: u64,
    resync_on_silence_ns: u64,

    initialized: bool,
    tx_time: u64,
    tx_slot: u32,
    /// Latest time seen from either path, used to recover from a failed resync
    last_now: u64,
    prev_rx_time: Option<u64>,

    calibration_ns: i64,
    sent: VecDeque<SentBurst>,
}

impl TimingEngine {
    pub fn new(cfg: &CfgTiming) -> Self {
        Self {
            slot_time_ns: SLOT_TIME_NS,
            lookahead_ns: cfg.tx_lookahead_ns,
            echo_window_ns: cfg.echo_window_ns,
            resync_on_silence_ns: cfg.resync_on_silence_ns,
            initialized: false,
            tx_time: 0,
            tx_slot: 0,
            last_now: 0,
            prev_rx_time: None,
            calibration_ns: 0,
            sent: VecDeque::with_capacity(SENT_HISTORY),
        }
    }

    pub fn slot_time_ns(&self) -> u64 {
        self.slot_time_ns
    }

    /// Start time and counter of the next slot to be transmitted
    pub fn next_tx(&self) -> (u64, u32) {
        (self.tx_time, self.tx_slot)
    }

    pub fn calibration_ns(&self) -> i64 {
        self.calibration_ns
    }

    /// Returns the due slot if `now` has reached it (minus the lookahead), and
    /// advances to the next one. At most one slot is returned per call.
    pub fn tx_tick(&mut self, now: u64) -> Option<TxSlot> {
        self.last_now = self.last_now.max(now);
        if !self.initialized {
            self.initialized = true;
            self.tx_time = now + 2 * self.slot_time_ns;
            self.tx_slot = 0;
        }

        let tdiff = now as i64 - self.tx_time as i64;
        if tdiff < -(self.lookahead_ns as i64) {
            return None;
        }

        let due = TxSlot {
            time: DmoTime::from_timing_slot(self.tx_slot),
            slot: self.tx_slot,
            tx_time_ns: self.tx_time,
        };
        self.tx_time += self.slot_time_ns;
        self.tx_slot = (self.tx_slot + 1) % TIMING_SLOTS;
        Some(due)
    }

    /// Remembers a burst that was actually handed to the transport.
    pub fn record_tx(&mut self, tx: &TxSlot) {
        if self.sent.len() == SENT_HISTORY {
            self.sent.pop_front();
        }
        self.sent.push_back(SentBurst { ts_ns: tx.tx_time_ns, slot: tx.slot });
    }

    /// Places a burst received at `ts` on the slot grid.
    fn locate(&self, ts: u64) -> RxSlot {
        let td = ts as i64 - self.tx_time as i64;
        let slot = self.slot_time_ns as i64;
        // Round to nearest, ties away from zero
        let intdiff = if td >= 0 { (td + slot / 2) / slot } else { -((-td + slot / 2) / slot) };
        let rx_slot = (intdiff + self.tx_slot as i64).rem_euclid(TIMING_SLOTS as i64) as u32;
        RxSlot {
            time: DmoTime::from_timing_slot(rx_slot),
            slot: rx_slot,
            ts_ns: ts,
            diff_ns: td - intdiff * slot,
        }
    }

    /// Matches `rx` against recent transmissions, refining the calibration on a hit.
    fn check_echo(&mut self, rx: &RxSlot) -> Option<i64> {
        let cal = self.calibration_ns;
        let window = self.echo_window_ns as i64;
        let hit = self
            .sent
            .iter()
            .find(|s| s.slot == rx.slot && (rx.ts_ns as i64 - (s.ts_ns as i64 + cal)).abs() <= window)?;
        let residual = rx.ts_ns as i64 - hit.ts_ns as i64;
        self.calibration_ns += (residual - self.calibration_ns) / CALIBRATION_SMOOTHING;
        Some(residual)
    }

    /// Maps a received burst timestamp to its slot. Echoes of our own transmissions are
    /// recognised and reported separately. After a silence, the first burst defines 1/1/1.
    pub fn rx_burst(&mut self, ts: u64) -> RxTiming {
        self.last_now = self.last_now.max(ts);
        if !self.initialized {
            self.initialized = true;
            self.tx_time = ts + self.slot_time_ns;
            self.tx_slot = 1;
        }

        let rx = self.locate(ts);
        if let Some(residual_ns) = self.check_echo(&rx) {
            tracing::trace!(ts=%rx.time, "echo, residual {} ns, calibration {} ns", residual_ns, self.calibration_ns);
            return RxTiming::Echo { residual_ns };
        }

        let silent = match self.prev_rx_time {
            None => true,
            Some(prev) => self.resync_on_silence_ns > 0 && ts.saturating_sub(prev) > self.resync_on_silence_ns,
        };
        self.prev_rx_time = Some(ts);
        if !silent {
            return RxTiming::Burst(rx);
        }

        tracing::info!(ts=%rx.time, "first burst after silence, aligning to 01/01/1");
        self.resync(DmoTime::new(1, 1, 1), ts);
        RxTiming::Burst(self.locate(ts))
    }

    /// Declares that the slot `target` started at `ts`. The schedule moves to the first slot after
    /// `target` that does not lie before the current `tx_time`.
    pub fn resync(&mut self, target: DmoTime, ts: u64) -> ResyncOutcome {
        self.last_now = self.last_now.max(ts);
        let old_tx_time = self.tx_time;
        let old_tx_slot = self.tx_slot;
        let mut next_slot = target.timing_slot();
        let mut next_time = ts;
        let mut skipped = 0;
        let mut degraded = false;

        loop {
            next_time += self.slot_time_ns;
            next_slot = (next_slot + 1) % TIMING_SLOTS;
            skipped += 1;
            if skipped >= RESYNC_MAX_STEPS {
                degraded = true;
                break;
            }
            if next_time >= old_tx_time {
                break;
            }
        }

        if degraded {
            // Target is unreachable, keep counting on the old schedule
            next_time = (self.last_now + self.slot_time_ns).max(old_tx_time);
            let advanced = ((next_time - old_tx_time) / self.slot_time_ns) as u32;
            next_slot = (old_tx_slot + advanced) % TIMING_SLOTS;
            tracing::error!(
                ts=%target,
                "resync did not converge after {} slots, forcing next slot {} to {}",
                skipped,
                DmoTime::from_timing_slot(next_slot),
                next_time
            );
        } else {
            tracing::debug!(ts=%target, "resync, skipped {} slots", skipped);
        }

        self.initialized = true;
        self.tx_time = next_time;
        self.tx_slot = next_slot;
        ResyncOutcome { skipped, degraded }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmo_core::debug;

    const SLOT: u64 = SLOT_TIME_NS;

    fn engine() -> TimingEngine {
        TimingEngine::new(&CfgTiming::default())
    }

    #[test]
    fn test_tick_advances_one_slot_at_a_time() {
        let mut t = engine();
        let start = 1_000_000_000;
        assert!(t.tx_tick(start).is_none());
        assert!(t.tx_tick(start + SLOT).is_none());

        let first = t.tx_tick(start + 2 * SLOT).unwrap();
        assert_eq!(first.slot, 0);
        assert_eq!(first.tx_time_ns, start + 2 * SLOT);
        assert_eq!(first.time, DmoTime::new(1, 1, 1));

        // Late ticks still hand out slots in order
        let second = t.tx_tick(start + 10 * SLOT).unwrap();
        assert_eq!(second.slot, 1);
        assert_eq!(t.tx_tick(start + 10 * SLOT).unwrap().slot, 2);
    }

    #[test]
    fn test_lookahead() {
        let mut cfg = CfgTiming::default();
        cfg.tx_lookahead_ns = 1_000_000;
        let mut t = TimingEngine::new(&cfg);
        t.tx_tick(0);
        assert!(t.tx_tick(2 * SLOT - 1_000_001).is_none());
        assert_eq!(t.tx_tick(2 * SLOT - 1_000_000).unwrap().tx_time_ns, 2 * SLOT);
    }

    #[test]
    fn test_rx_slot_roundtrip() {
        let mut t = engine();
        let start = 5 * SLOT;
        t.tx_tick(start);
        let mut slots = vec![];
        while slots.len() < 72 {
            if let Some(tx) = t.tx_tick(start + 100 * SLOT) {
                slots.push(tx);
            }
        }
        for tx in slots {
            let rx = t.locate(tx.tx_time_ns + 1234);
            assert_eq!(rx.slot, tx.slot);
            assert_eq!(rx.time.slot_index(), (tx.slot % 72) as usize);
            assert_eq!(rx.diff_ns, 1234);
        }
    }

    #[test]
    fn test_rx_rounding_and_negative_diff() {
        let mut t = engine();
        t.tx_tick(10 * SLOT);
        let (tx_time, tx_slot) = t.next_tx();
        let rx = t.locate(tx_time - SLOT / 2 + 10);
        assert_eq!(rx.slot, tx_slot);
        assert!(rx.diff_ns < 0);

        // Far in the past wraps around the hyperframe
        let rx = t.locate(tx_time - 3 * SLOT);
        assert_eq!(rx.slot, (tx_slot + TIMING_SLOTS - 3) % TIMING_SLOTS);
    }

    #[test]
    fn test_resync_never_moves_backwards() {
        debug::setup_logging_verbose();
        let mut t = engine();
        let base = 100 * SLOT;
        t.tx_tick(base);
        for i in 0..200u64 {
            let (before, _) = t.next_tx();
            let ts = base + (i * 7919 * 1000) % (6 * SLOT);
            let target = DmoTime::from_timing_slot((i * 37) as u32 % TIMING_SLOTS);
            t.resync(target, ts);
            let (after, _) = t.next_tx();
            assert!(after >= before, "tx_time moved back at iteration {}", i);
        }
    }

    #[test]
    fn test_resync_lands_on_target_grid() {
        let mut t = engine();
        t.tx_tick(0);
        let (tx_time, _) = t.next_tx();
        // Target slot 01/05/2 started half a slot ago
        let ts = tx_time - SLOT / 2;
        let out = t.resync(DmoTime::new(1, 5, 2), ts);
        assert!(!out.degraded);
        assert_eq!(out.skipped, 1);
        let (new_time, new_slot) = t.next_tx();
        assert_eq!(new_time, ts + SLOT);
        assert_eq!(DmoTime::from_timing_slot(new_slot), DmoTime::new(1, 5, 3));
    }

    #[test]
    fn test_resync_degraded() {
        let mut t = engine();
        t.tx_tick(1000 * SLOT);
        let (before, _) = t.next_tx();
        let out = t.resync(DmoTime::new(1, 1, 1), 0);
        assert!(out.degraded);
        let (after, _) = t.next_tx();
        assert!(after >= before);
        assert_eq!(after, (1000 * SLOT + SLOT).max(before));
    }

    #[test]
    fn test_resync_degraded_keeps_slot_numbering() {
        let mut t = engine();
        t.tx_tick(1000 * SLOT);
        // Clock runs well ahead of the schedule
        t.tx_tick(1100 * SLOT);
        let (before, slot_before) = t.next_tx();
        assert_eq!((before, slot_before), (1003 * SLOT, 1));

        let out = t.resync(DmoTime::new(1, 9, 1), 0);
        assert!(out.degraded);
        let (after, slot_after) = t.next_tx();
        assert_eq!(after, 1101 * SLOT);
        assert_eq!(slot_after, slot_before + 98);
    }

    #[test]
    fn test_echo_detection_and_calibration() {
        let mut t = engine();
        t.tx_tick(0);
        let tx = t.tx_tick(2 * SLOT).unwrap();
        t.record_tx(&tx);

        match t.rx_burst(tx.tx_time_ns + 80_000) {
            RxTiming::Echo { residual_ns } => assert_eq!(residual_ns, 80_000),
            other => panic!("expected echo, got {:?}", other),
        }
        assert_eq!(t.calibration_ns(), 10_000);

        // Same slot but outside the window is a real burst
        assert!(matches!(t.rx_burst(tx.tx_time_ns + 2_000_000), RxTiming::Burst(_)));
        // A slot we did not transmit in is never an echo
        assert!(matches!(t.rx_burst(tx.tx_time_ns + SLOT), RxTiming::Burst(_)));
    }

    #[test]
    fn test_silence_resync() {
        let mut t = engine();
        t.tx_tick(0);
        for _ in 0..5 {
            t.tx_tick(10 * SLOT);
        }

        // The first burst ever defines 01/01/1
        let ts = 3 * SLOT + 1000;
        let RxTiming::Burst(rx) = t.rx_burst(ts) else { panic!("echo") };
        assert_eq!(rx.time, DmoTime::new(1, 1, 1));

        // Close bursts follow the grid
        let RxTiming::Burst(rx) = t.rx_burst(ts + 2 * SLOT) else { panic!("echo") };
        assert_eq!(rx.time, DmoTime::new(1, 1, 3));

        // After more than a second of silence, alignment restarts
        let late = ts + 2 * SLOT + 1_500_000_000;
        let RxTiming::Burst(rx) = t.rx_burst(late) else { panic!("echo") };
        assert_eq!(rx.time, DmoTime::new(1, 1, 1));
    }
}
