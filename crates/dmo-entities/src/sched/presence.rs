use dmo_core::{DmoTime, SLOTS_PER_FRAME, SLOTS_PER_MULTIFRAME};
use dmo_pdus::dmac::pdus::dpres_sync::PRESENCE_INTERVAL_MULTIFRAMES;

/// Presence signal timer. Counts TX slots while the channel is free and, once the
/// configured interval has passed, asks for a run of beacons on every slot of
/// `dn253` consecutive frames.
#[derive(Debug, Clone)]
pub struct PresenceTimer {
    interval_slots: u32,
    run_len: u32,
    counter: u32,
    run_remaining: u32,
}

impl PresenceTimer {
    /// `dt254` is the coded interval (index into the 0/2/5/10/15/20/30/60 multiframe table).
    /// An interval of 0 disables the timer.
    pub fn new(dt254: u8, dn253: u8) -> Self {
        let interval_slots = PRESENCE_INTERVAL_MULTIFRAMES[(dt254 & 7) as usize] * SLOTS_PER_MULTIFRAME;
        Self {
            interval_slots,
            run_len: dn253 as u32 * SLOTS_PER_FRAME,
            counter: interval_slots,
            run_remaining: 0,
        }
    }

    pub fn reset(&mut self) {
        self.counter = self.interval_slots;
        self.run_remaining = 0;
    }

    pub fn is_running(&self) -> bool {
        self.run_remaining > 0
    }

    /// Advances by one TX slot. Returns the frame countdown if a beacon is due in this slot.
    pub fn tick(&mut self, time: DmoTime) -> Option<u8> {
        if self.interval_slots == 0 || self.run_len == 0 {
            return None;
        }
        self.counter = self.counter.saturating_sub(1);
        if self.run_remaining == 0 {
            // Runs start on a frame boundary so the countdown counts whole frames
            if self.counter > 0 || time.t != 1 {
                return None;
            }
            self.run_remaining = self.run_len;
            self.counter = self.interval_slots;
        }
        self.run_remaining -= 1;
        Some((self.run_remaining / SLOTS_PER_FRAME) as u8)
    }
}
