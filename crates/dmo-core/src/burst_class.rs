//! Logical channel and burst class descriptors shared by the codec, framing and scheduler.

use core::fmt;

/// Logical channels carried by DM bursts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalChannel {
    /// Short synchronisation channel, first block of a DM sync burst
    SchS,
    /// Half-slot signalling channel, second block of a DM sync burst
    SchH,
    /// Full-slot signalling channel
    SchF,
    /// Stealing channel, half of a normal burst
    Stch,
    /// Traffic channel, relayed without decoding
    Tch,
}

impl LogicalChannel {
    /// Number of type-1 (payload) bits
    pub const fn type1_bits(self) -> usize {
        match self {
            LogicalChannel::SchS => 60,
            LogicalChannel::SchH => 124,
            LogicalChannel::SchF => 268,
            LogicalChannel::Stch => 124,
            LogicalChannel::Tch => 432,
        }
    }

    /// Number of type-5 (on-air) bits
    pub const fn type5_bits(self) -> usize {
        match self {
            LogicalChannel::SchS => 120,
            LogicalChannel::SchH => 216,
            LogicalChannel::SchF => 432,
            LogicalChannel::Stch => 216,
            LogicalChannel::Tch => 432,
        }
    }
}

impl fmt::Display for LogicalChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogicalChannel::SchS => "SCH/S",
            LogicalChannel::SchH => "SCH/H",
            LogicalChannel::SchF => "SCH/F",
            LogicalChannel::Stch => "STCH",
            LogicalChannel::Tch => "TCH",
        };
        write!(f, "{}", s)
    }
}

/// Burst classes as handed to and from the radio transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstClass {
    /// Occupies the whole slot, including guard periods
    FullSlot,
    /// DM synchronisation burst
    DmSync,
    /// DM normal burst
    DmNormal,
}

/// Bits in one full timeslot
pub const FULL_SLOT_BITS: usize = 510;
/// Bits in one DM burst, without guard periods
pub const DM_BURST_BITS: usize = 470;

impl BurstClass {
    pub const fn bits(self) -> usize {
        match self {
            BurstClass::FullSlot => FULL_SLOT_BITS,
            BurstClass::DmSync | BurstClass::DmNormal => DM_BURST_BITS,
        }
    }

    /// True for bursts that are shorter than a slot and need positioning inside it
    pub const fn is_short(self) -> bool {
        matches!(self, BurstClass::DmSync | BurstClass::DmNormal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_lengths() {
        assert_eq!(LogicalChannel::SchS.type1_bits() + 20, 80);
        assert_eq!(LogicalChannel::SchS.type5_bits(), 120);
        assert_eq!(LogicalChannel::SchH.type5_bits() + LogicalChannel::Stch.type5_bits(), LogicalChannel::SchF.type5_bits());
        assert_eq!(BurstClass::FullSlot.bits() - BurstClass::DmNormal.bits(), 40);
        assert!(!BurstClass::FullSlot.is_short());
    }
}
