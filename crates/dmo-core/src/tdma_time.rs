use core::fmt;

use crate::{FRAMES_PER_MULTIFRAME, MULTIFRAMES_PER_HYPERFRAME, SLAVE_LINK_OFFSET, SLOTS_PER_FRAME, SLOTS_PER_MULTIFRAME, TIMING_SLOTS};

/// DM link direction. The slave link is offset by one timeslot from the master link
/// within the multiframe ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DmLink {
    #[default]
    Master,
    Slave,
}

impl fmt::Display for DmLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DmLink::Master => write!(f, "M"),
            DmLink::Slave => write!(f, "S"),
        }
    }
}

/// Logical DM TDMA time
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DmoTime {
    /// Timeslot, from 1 to 4
    pub t: u8,
    /// Frame number, from 1 to 18
    pub f: u8,
    /// Multiframe number, from 1 to 60
    pub m: u8,
    /// Hyperframe number
    pub h: u16,
    pub link: DmLink,
}

impl Default for DmoTime {
    /// Returns 0/1/1/1 on the master link
    fn default() -> DmoTime {
        DmoTime { h: 0, m: 1, f: 1, t: 1, link: DmLink::Master }
    }
}

impl DmoTime {
    pub fn new(m: u8, f: u8, t: u8) -> DmoTime {
        DmoTime { h: 0, m, f, t, link: DmLink::Master }
    }

    pub fn with_link(self, link: DmLink) -> DmoTime {
        DmoTime { link, ..self }
    }

    pub fn is_valid(self) -> bool {
        (1..=SLOTS_PER_FRAME as u8).contains(&self.t)
            && (1..=FRAMES_PER_MULTIFRAME as u8).contains(&self.f)
            && (1..=MULTIFRAMES_PER_HYPERFRAME as u8).contains(&self.m)
    }

    /// Position within one multiframe, 0..71, honouring the link offset.
    pub fn slot_index(self) -> usize {
        let idx = 4 * (self.f as u32 - 1) + (self.t as u32 - 1);
        let idx = match self.link {
            DmLink::Master => idx,
            DmLink::Slave => (idx + SLAVE_LINK_OFFSET) % SLOTS_PER_MULTIFRAME,
        };
        idx as usize
    }

    /// Position within the timing engine's slot space, 0..4319. Ignores the link.
    pub fn timing_slot(self) -> u32 {
        SLOTS_PER_MULTIFRAME * (self.m as u32 - 1) + SLOTS_PER_FRAME * (self.f as u32 - 1) + (self.t as u32 - 1)
    }

    /// Inverse of [`timing_slot`](Self::timing_slot). Values are taken modulo the slot space.
    pub fn from_timing_slot(slot: u32) -> DmoTime {
        let s = slot % TIMING_SLOTS;
        DmoTime {
            h: 0,
            t: (s % SLOTS_PER_FRAME + 1) as u8,
            f: ((s / SLOTS_PER_FRAME) % FRAMES_PER_MULTIFRAME + 1) as u8,
            m: (s / SLOTS_PER_MULTIFRAME + 1) as u8,
            link: DmLink::Master,
        }
    }

    /// Add (or subtract) timeslots, wrapping within one hyperframe.
    pub fn add_timeslots(self, num_slots: i32) -> DmoTime {
        let s = (self.timing_slot() as i64 + num_slots as i64).rem_euclid(TIMING_SLOTS as i64);
        DmoTime { h: self.h, link: self.link, ..DmoTime::from_timing_slot(s as u32) }
    }
}

impl fmt::Display for DmoTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}/{}{}", self.m, self.f, self.t, self.link)
    }
}

impl fmt::Debug for DmoTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:5}/{:02}/{:02}/{}{}", self.h, self.m, self.f, self.t, self.link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_index_master_and_slave() {
        assert_eq!(DmoTime::new(1, 1, 1).slot_index(), 0);
        assert_eq!(DmoTime::new(1, 18, 4).slot_index(), 71);
        assert_eq!(DmoTime::new(1, 3, 2).slot_index(), 9);

        assert_eq!(DmoTime::new(1, 1, 1).with_link(DmLink::Slave).slot_index(), 3);
        assert_eq!(DmoTime::new(1, 18, 2).with_link(DmLink::Slave).slot_index(), 0);
        assert_eq!(DmoTime::new(1, 18, 4).with_link(DmLink::Slave).slot_index(), 2);
    }

    #[test]
    fn test_timing_slot_roundtrip() {
        for s in 0..TIMING_SLOTS {
            let t = DmoTime::from_timing_slot(s);
            assert!(t.is_valid());
            assert_eq!(t.timing_slot(), s);
        }
    }

    #[test]
    fn test_add_timeslots_wraps() {
        let t = DmoTime::new(60, 18, 4);
        assert_eq!(t.add_timeslots(1), DmoTime::new(1, 1, 1));
        assert_eq!(DmoTime::new(1, 1, 1).add_timeslots(-1), t);
        assert_eq!(DmoTime::new(1, 1, 1).add_timeslots(72), DmoTime::new(2, 1, 1));
    }

    #[test]
    fn test_validity() {
        assert!(!DmoTime::new(1, 19, 1).is_valid());
        assert!(!DmoTime::new(1, 1, 0).is_valid());
        assert!(!DmoTime::new(61, 1, 1).is_valid());
        assert!(DmoTime::default().is_valid());
    }
}
