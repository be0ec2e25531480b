use core::fmt;

use dmo_config::CfgRepeater;
use dmo_core::{BitBuffer, DmoTime, SLOTS_PER_FRAME, SLOTS_PER_MULTIFRAME};

use super::presence::PresenceTimer;

/// Channel state as seen by the repeater
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeaterChannelState {
    #[default]
    IdleUnknown,
    IdleFree,
    ActiveOccupied,
    ActiveReserved,
}

impl RepeaterChannelState {
    pub fn is_active(self) -> bool {
        matches!(self, RepeaterChannelState::ActiveOccupied | RepeaterChannelState::ActiveReserved)
    }

    /// Channel state field of the presence signal
    pub fn presence_code(self) -> u8 {
        match self {
            RepeaterChannelState::IdleUnknown | RepeaterChannelState::IdleFree => 0,
            RepeaterChannelState::ActiveOccupied => 1,
            RepeaterChannelState::ActiveReserved => 2,
        }
    }
}

impl fmt::Display for RepeaterChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepeaterChannelState::IdleUnknown => "IDLE_UNKNOWN",
            RepeaterChannelState::IdleFree => "IDLE_FREE",
            RepeaterChannelState::ActiveOccupied => "ACTIVE_OCCUPIED",
            RepeaterChannelState::ActiveReserved => "ACTIVE_RESERVED",
        };
        write!(f, "{}", s)
    }
}

/// One position of the multiframe ring
#[derive(Debug, Clone)]
struct SlotEntry {
    // 1..18
    fn_: u8,
    // 1..4
    tn: u8,
    burst: Option<BitBuffer>,
    /// Multiframe passes to skip before the burst is due
    delay: u32,
}

/// What to put on air in a TX slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotContent {
    Burst(BitBuffer),
    /// A presence signal is due; the caller builds it with the current channel state
    Beacon { countdown: u8 },
    Empty,
}

/// Frame buffer of one multiframe (72 slots) plus the channel state it serves.
///
/// Every TX slot calls [`take`](Self::take) exactly once. That call also drives the
/// channel state timeouts and the presence signal timer, so all time here is counted
/// in TX slots.
pub struct SlotScheduler {
    ring: Vec<SlotEntry>,

    state: RepeaterChannelState,
    slots_elapsed: u64,
    last_change: u64,
    idle_timeout_slots: u32,
    active_timeout_slots: u32,

    presence: PresenceTimer,
}

impl SlotScheduler {
    pub fn new(cfg: &CfgRepeater) -> Self {
        let ring = (0..SLOTS_PER_MULTIFRAME)
            .map(|i| SlotEntry {
                fn_: (i / SLOTS_PER_FRAME + 1) as u8,
                tn: (i % SLOTS_PER_FRAME + 1) as u8,
                burst: None,
                delay: 0,
            })
            .collect();
        Self {
            ring,
            state: RepeaterChannelState::IdleUnknown,
            slots_elapsed: 0,
            last_change: 0,
            idle_timeout_slots: cfg.idle_timeout_slots,
            active_timeout_slots: cfg.active_timeout_slots,
            presence: PresenceTimer::new(cfg.dt254, cfg.dn253),
        }
    }

    /// Arms the ring position of `time` (honouring its link) with `burst`. With `delay > 0`
    /// the entry is passed over that many times before it is sent. Overwrites whatever
    /// was pending there.
    pub fn schedule(&mut self, time: DmoTime, burst: BitBuffer, delay: u32) {
        let idx = time.slot_index();
        let entry = &mut self.ring[idx];
        if entry.burst.is_some() {
            tracing::debug!(ts=%time, "overwriting pending burst in {:02}/{}", entry.fn_, entry.tn);
        }
        tracing::trace!(ts=%time, "scheduled {} bits in {:02}/{} delay {}", burst.get_len(), entry.fn_, entry.tn, delay);
        entry.burst = Some(burst);
        entry.delay = delay;
    }

    /// True if something is pending at the ring position of `time`
    pub fn is_armed(&self, time: DmoTime) -> bool {
        self.ring[time.slot_index()].burst.is_some()
    }

    /// Number of pending bursts in the whole ring
    pub fn num_armed(&self) -> usize {
        self.ring.iter().filter(|e| e.burst.is_some()).count()
    }

    /// Content for the TX slot `time`. Buffered bursts win over presence signals.
    pub fn take(&mut self, time: DmoTime) -> SlotContent {
        self.slots_elapsed += 1;
        self.age_channel_state(time);

        let entry = &mut self.ring[time.slot_index()];
        let burst = if entry.delay > 0 {
            entry.delay -= 1;
            None
        } else {
            entry.burst.take()
        };

        let beacon = match self.state {
            RepeaterChannelState::IdleFree => self.presence.tick(time),
            _ => None,
        };

        match (burst, beacon) {
            (Some(b), _) => SlotContent::Burst(b),
            (None, Some(countdown)) => SlotContent::Beacon { countdown },
            (None, None) => SlotContent::Empty,
        }
    }

    fn age_channel_state(&mut self, time: DmoTime) {
        let elapsed = self.slots_elapsed - self.last_change;
        match self.state {
            RepeaterChannelState::IdleUnknown if elapsed >= self.idle_timeout_slots as u64 => {
                tracing::debug!(ts=%time, "no activity for {} slots", elapsed);
                self.set_channel_state(RepeaterChannelState::IdleFree);
            }
            RepeaterChannelState::ActiveOccupied | RepeaterChannelState::ActiveReserved
                if elapsed >= self.active_timeout_slots as u64 =>
            {
                tracing::info!(ts=%time, "{} timed out after {} slots", self.state, elapsed);
                self.set_channel_state(RepeaterChannelState::IdleFree);
            }
            _ => {}
        }
    }

    pub fn channel_state(&self) -> RepeaterChannelState {
        self.state
    }

    /// Changes the channel state and re-arms its timeout. Entering IDLE_FREE restarts the presence timer.
    pub fn set_channel_state(&mut self, new: RepeaterChannelState) {
        if new != self.state {
            tracing::info!("channel state {} -> {}", self.state, new);
            if new == RepeaterChannelState::IdleFree {
                self.presence.reset();
            }
        }
        self.state = new;
        self.last_change = self.slots_elapsed;
    }

    /// Re-arms the channel state timeout without changing state
    pub fn touch(&mut self) {
        self.last_change = self.slots_elapsed;
    }

    pub fn presence_running(&self) -> bool {
        self.presence.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmo_core::{DmLink, debug};

    fn sched() -> SlotScheduler {
        SlotScheduler::new(&CfgRepeater::default())
    }

    fn burst(tag: u64) -> BitBuffer {
        let mut b = BitBuffer::new(8);
        b.write_bits(tag, 8);
        b.seek(0);
        b
    }

    #[test]
    fn test_take_clears_entry() {
        let mut s = sched();
        let t = DmoTime::new(1, 3, 2);
        s.schedule(t, burst(1), 0);
        assert!(s.is_armed(t));
        assert_eq!(s.take(t), SlotContent::Burst(burst(1)));
        assert!(!s.is_armed(t));
        assert_eq!(s.take(t), SlotContent::Empty);
    }

    #[test]
    fn test_last_write_wins() {
        let mut s = sched();
        let t = DmoTime::new(1, 7, 4);
        s.schedule(t, burst(1), 0);
        s.schedule(t, burst(2), 0);
        assert_eq!(s.num_armed(), 1);
        assert_eq!(s.take(t), SlotContent::Burst(burst(2)));
    }

    #[test]
    fn test_slave_link_offset() {
        let mut s = sched();
        // Slave 18/2 lands on master 01/1
        s.schedule(DmoTime::new(1, 18, 2).with_link(DmLink::Slave), burst(3), 0);
        assert!(s.is_armed(DmoTime::new(1, 1, 1)));
        assert_eq!(s.take(DmoTime::new(2, 1, 1)), SlotContent::Burst(burst(3)));
    }

    #[test]
    fn test_delay_skips_passes() {
        let mut s = sched();
        let t = DmoTime::new(1, 2, 1);
        s.schedule(t, burst(4), 2);
        assert_eq!(s.take(t), SlotContent::Empty);
        assert_eq!(s.take(t.add_timeslots(72)), SlotContent::Empty);
        assert_eq!(s.take(t.add_timeslots(144)), SlotContent::Burst(burst(4)));
    }

    #[test]
    fn test_idle_unknown_becomes_free() {
        debug::setup_logging_verbose();
        let mut s = sched();
        let mut t = DmoTime::default();
        for _ in 0..143 {
            s.take(t);
            t = t.add_timeslots(1);
        }
        assert_eq!(s.channel_state(), RepeaterChannelState::IdleUnknown);
        s.take(t);
        assert_eq!(s.channel_state(), RepeaterChannelState::IdleFree);
    }

    #[test]
    fn test_active_timeout_and_touch() {
        let mut s = sched();
        s.set_channel_state(RepeaterChannelState::ActiveOccupied);
        let mut t = DmoTime::default();
        for i in 0..400 {
            if i == 200 {
                s.touch();
            }
            s.take(t);
            t = t.add_timeslots(1);
            assert!(s.channel_state().is_active(), "released early at {}", i);
        }
        assert_eq!(s.channel_state(), RepeaterChannelState::ActiveOccupied);
        for _ in 0..100 {
            s.take(t);
            t = t.add_timeslots(1);
        }
        assert_eq!(s.channel_state(), RepeaterChannelState::IdleFree);
    }

    #[test]
    fn test_beacons_only_when_free_and_not_over_bursts() {
        let mut cfg = CfgRepeater::default();
        cfg.dt254 = 1;
        cfg.dn253 = 1;
        let mut s = SlotScheduler::new(&cfg);
        s.set_channel_state(RepeaterChannelState::IdleFree);

        let mut t = DmoTime::default();
        // Something relayed into the first beacon slot, two ring passes ahead
        s.schedule(DmoTime::from_timing_slot(144), burst(9), 2);
        let mut beacons = vec![];
        let mut bursts = 0;
        for _ in 0..300 {
            match s.take(t) {
                SlotContent::Beacon { countdown } => beacons.push((t.timing_slot(), countdown)),
                SlotContent::Burst(_) => bursts += 1,
                SlotContent::Empty => {}
            }
            t = t.add_timeslots(1);
        }
        assert_eq!(bursts, 1);
        assert_eq!(beacons, vec![(145, 0), (146, 0), (147, 0), (288, 0), (289, 0), (290, 0), (291, 0)]);

        // No beacons while active
        s.set_channel_state(RepeaterChannelState::ActiveOccupied);
        for _ in 0..288 {
            assert!(!matches!(s.take(t), SlotContent::Beacon { .. }));
            t = t.add_timeslots(1);
        }
    }
}
