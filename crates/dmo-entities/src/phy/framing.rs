//! Positioning of bursts inside a 510-bit slot.
//!
//! A DM burst does not fill its slot: it starts [`DM_BURST_OFFSET_BITS`] after the slot
//! boundary and leaves a trailing guard. The transmitter ramps up just before the burst,
//! unless the previous slot also carried a DM burst, in which case the guard between the
//! two is filled with a linking pattern and the carrier stays up.

use dmo_core::burst_class::{DM_BURST_BITS, FULL_SLOT_BITS};
use dmo_core::{BitBuffer, BurstClass};

use super::dm_burst::DM_LEADING_GUARD_BITS;

pub const DM_BURST_OFFSET_BITS: usize = DM_LEADING_GUARD_BITS;
pub const RAMP_BITS: usize = 6;

/// Leading guard of a slot that follows another DM burst. The previous slot's
/// trailing guard is already on air by then and is left as transmitted.
const LINK_PATTERN: [u8; DM_LEADING_GUARD_BITS] = [0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1];
const RAMP_PATTERN: [u8; RAMP_BITS] = [1, 1, 0, 0, 1, 1];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framing {
    /// Bits between the slot boundary and the first burst bit
    pub offset_bits: usize,
    /// Ramp-up bits placed directly in front of the burst
    pub ramp_bits: usize,
    /// Guard is filled with the linking pattern instead of ramping
    pub linked: bool,
}

pub fn frame_burst(current: BurstClass, previous: Option<BurstClass>) -> Framing {
    if !current.is_short() {
        return Framing { offset_bits: 0, ramp_bits: 0, linked: false };
    }
    let linked = previous.is_some_and(|p| p.is_short());
    Framing {
        offset_bits: DM_BURST_OFFSET_BITS,
        ramp_bits: if linked { 0 } else { RAMP_BITS },
        linked,
    }
}

/// Places `burst` into a full slot according to `framing`.
/// Returns None if the burst length does not match the framing.
pub fn apply_framing(framing: Framing, burst: &BitBuffer) -> Option<BitBuffer> {
    let bits = burst.to_bitvec();
    if framing.offset_bits == 0 {
        if bits.len() != FULL_SLOT_BITS {
            return None;
        }
        return Some(BitBuffer::from_bitarr(&bits));
    }
    if bits.len() != DM_BURST_BITS || framing.offset_bits + bits.len() > FULL_SLOT_BITS {
        return None;
    }

    let mut slot = vec![0u8; FULL_SLOT_BITS];
    if framing.linked {
        slot[framing.offset_bits - LINK_PATTERN.len()..framing.offset_bits].copy_from_slice(&LINK_PATTERN);
    } else if framing.ramp_bits > 0 {
        let ramp = &RAMP_PATTERN[RAMP_BITS - framing.ramp_bits.min(RAMP_BITS)..];
        slot[framing.offset_bits - ramp.len()..framing.offset_bits].copy_from_slice(ramp);
    }
    slot[framing.offset_bits..framing.offset_bits + bits.len()].copy_from_slice(&bits);
    Some(BitBuffer::from_bitarr(&slot))
}
