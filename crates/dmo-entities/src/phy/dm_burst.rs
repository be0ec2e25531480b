use dmo_core::burst_class::{DM_BURST_BITS, FULL_SLOT_BITS};
use dmo_core::{BitBuffer, BurstClass};

/// Guard bits ahead of a DM burst inside a full slot
pub const DM_LEADING_GUARD_BITS: usize = 14;
/// Guard bits after a DM burst inside a full slot
pub const DM_TRAILING_GUARD_BITS: usize = 26;

pub const DM_PREAMBLE_BITS: usize = 12;
pub const DM_PHASE_ADJ_BITS: usize = 2;
pub const DM_FREQ_CORR_BITS: usize = 80;
pub const DM_SCH_S_BITS: usize = 120;
pub const DM_BLK_BITS: usize = 216;
pub const DM_SYNC_TRAIN_BITS: usize = 38;
pub const DM_NORM_TRAIN_BITS: usize = 22;
pub const DM_TAIL_BITS: usize = 2;

// DM synchronisation burst layout
const SB_FREQ_CORR_OFFSET: usize = DM_PREAMBLE_BITS + DM_PHASE_ADJ_BITS;
const SB_SCH_S_OFFSET: usize = SB_FREQ_CORR_OFFSET + DM_FREQ_CORR_BITS;
const SB_TRAIN_OFFSET: usize = SB_SCH_S_OFFSET + DM_SCH_S_BITS;
const SB_SCH_H_OFFSET: usize = SB_TRAIN_OFFSET + DM_SYNC_TRAIN_BITS;
const SB_TAIL_OFFSET: usize = SB_SCH_H_OFFSET + DM_BLK_BITS;

// DM normal burst layout
const NB_BLK1_OFFSET: usize = DM_PREAMBLE_BITS + DM_PHASE_ADJ_BITS;
const NB_TRAIN_OFFSET: usize = NB_BLK1_OFFSET + DM_BLK_BITS;
const NB_BLK2_OFFSET: usize = NB_TRAIN_OFFSET + DM_NORM_TRAIN_BITS;
const NB_TAIL_OFFSET: usize = NB_BLK2_OFFSET + DM_BLK_BITS;

const _: () = assert!(SB_TAIL_OFFSET + DM_TAIL_BITS == DM_BURST_BITS);
const _: () = assert!(NB_TAIL_OFFSET + DM_TAIL_BITS == DM_BURST_BITS);
const _: () = assert!(DM_LEADING_GUARD_BITS + DM_BURST_BITS + DM_TRAILING_GUARD_BITS == FULL_SLOT_BITS);

/// Max bit errors tolerated when matching a training sequence
const TRAIN_MAX_ERRORS: usize = 2;

#[allow(non_upper_case_globals)]
pub mod bitseq {
    /// Normal training sequence 1, 22 n-bits
    pub const n: [u8; 22] = [1,1,0,1,0,0,0,0,1,1,1,0,1,0,0,1,1,1,0,1,0,0];
    /// Normal training sequence 2, 22 p-bits
    pub const p: [u8; 22] = [0,1,1,1,1,0,1,0,0,1,0,0,0,0,1,1,0,1,1,1,1,0];
    /// Synchronisation training sequence, 38 y-bits
    pub const y: [u8; 38] = [1,1,0,0,0,0,0,1,1,0,0,1,1,1,0,0,1,1,1,0,1,0,0,1,1,1,0,0,0,0,0,1,1,0,0,1,1,1];
    /// Frequency correction field, 80 bits
    pub const f: [u8; 80] = [
        1,1,1,1,1,1,1,1,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,
        0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,1,1,1,1,1,1,1,1];
    /// DM preamble P1, precedes training sequence 1
    pub const P1: [u8; 12] = [0,0,1,1,0,0,1,0,0,0,1,1];
    /// DM preamble P2, precedes training sequence 2
    pub const P2: [u8; 12] = [1,0,0,1,1,0,1,0,1,0,0,1];
    /// DM preamble P3, precedes the synchronisation training sequence
    pub const P3: [u8; 12] = [0,0,0,1,0,1,0,0,0,1,1,1];
    /// Tail bits
    pub const t: [u8; 2] = [1,1];
}

/// Training sequence carried in the middle of a DM burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmTrainingSequence {
    /// Preamble P1 + training sequence 1: one full-slot block (TCH or SCH/F)
    Normal1,
    /// Preamble P2 + training sequence 2: two half-slot blocks (STCH+TCH or STCH+STCH)
    Normal2,
    /// Preamble P3 + synchronisation training sequence: SCH/S + SCH/H
    Sync,
}

/// Blocks recovered from a received DM burst. Blocks are still scrambled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DmBurst {
    Sync { sch_s: BitBuffer, sch_h: BitBuffer },
    Normal { train: DmTrainingSequence, blk1: BitBuffer, blk2: BitBuffer },
}

impl DmBurst {
    pub fn class(&self) -> BurstClass {
        match self {
            DmBurst::Sync { .. } => BurstClass::DmSync,
            DmBurst::Normal { .. } => BurstClass::DmNormal,
        }
    }
}

/// Phase windows (1-based symbols, inclusive) for the phase adjustment bits.
/// Both cover everything from the end of the phase bits up to the end of the training sequence.
const SYNC_PHASE_WINDOW: (usize, usize) = (8, 126);
const NORMAL_PHASE_WINDOW: (usize, usize) = (8, 126);

/// 2-bit symbol to phase change, in pi/4 units
const BITS2PHASE: [i32; 4] = [1, -1, 3, -3];

fn sum_up_phase(bits: &[u8], first_symbol: usize, last_symbol: usize) -> i32 {
    (first_symbol..=last_symbol)
        .map(|s| {
            let idx = 2 * (s - 1);
            BITS2PHASE[(bits[idx] | (bits[idx + 1] << 1)) as usize]
        })
        .sum()
}

/// Phase adjustment bits that bring the accumulated phase over `window` back to a multiple of 2pi.
fn phase_adj_bits(bits: &[u8], window: (usize, usize)) -> [u8; 2] {
    let mut adj = -(sum_up_phase(bits, window.0, window.1) % 8);
    if adj > 3 {
        adj -= 8;
    } else if adj < -3 {
        adj += 8;
    }
    match adj {
        -3 => [1, 1],
        -1 => [1, 0],
        3 => [0, 1],
        // Odd-length windows never yield an even adjustment
        _ => [0, 0],
    }
}

/// DM synchronisation burst from type-5 SCH/S and SCH/H blocks
pub fn build_dm_sync_burst(sch_s: &[u8; DM_SCH_S_BITS], sch_h: &[u8; DM_BLK_BITS]) -> [u8; DM_BURST_BITS] {
    let mut burst = [0u8; DM_BURST_BITS];
    burst[..DM_PREAMBLE_BITS].copy_from_slice(&bitseq::P3);
    burst[SB_FREQ_CORR_OFFSET..SB_SCH_S_OFFSET].copy_from_slice(&bitseq::f);
    burst[SB_SCH_S_OFFSET..SB_TRAIN_OFFSET].copy_from_slice(sch_s);
    burst[SB_TRAIN_OFFSET..SB_SCH_H_OFFSET].copy_from_slice(&bitseq::y);
    burst[SB_SCH_H_OFFSET..SB_TAIL_OFFSET].copy_from_slice(sch_h);
    burst[SB_TAIL_OFFSET..].copy_from_slice(&bitseq::t);

    let adj = phase_adj_bits(&burst, SYNC_PHASE_WINDOW);
    burst[DM_PREAMBLE_BITS..SB_FREQ_CORR_OFFSET].copy_from_slice(&adj);
    burst
}

/// DM normal burst. `train` must be one of the normal training sequences.
pub fn build_dm_normal_burst(train: DmTrainingSequence, blk1: &[u8; DM_BLK_BITS], blk2: &[u8; DM_BLK_BITS]) -> Option<[u8; DM_BURST_BITS]> {
    let (preamble, train_bits) = match train {
        DmTrainingSequence::Normal1 => (&bitseq::P1, &bitseq::n),
        DmTrainingSequence::Normal2 => (&bitseq::P2, &bitseq::p),
        DmTrainingSequence::Sync => return None,
    };

    let mut burst = [0u8; DM_BURST_BITS];
    burst[..DM_PREAMBLE_BITS].copy_from_slice(preamble);
    burst[NB_BLK1_OFFSET..NB_TRAIN_OFFSET].copy_from_slice(blk1);
    burst[NB_TRAIN_OFFSET..NB_BLK2_OFFSET].copy_from_slice(train_bits);
    burst[NB_BLK2_OFFSET..NB_TAIL_OFFSET].copy_from_slice(blk2);
    burst[NB_TAIL_OFFSET..].copy_from_slice(&bitseq::t);

    let adj = phase_adj_bits(&burst, NORMAL_PHASE_WINDOW);
    burst[DM_PREAMBLE_BITS..NB_BLK1_OFFSET].copy_from_slice(&adj);
    Some(burst)
}

fn hamming(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).filter(|(x, y)| (**x & 1) != (**y & 1)).count()
}

/// Recognises a DM burst by its training sequence and returns its blocks.
/// Accepts a bare 470-bit burst or a 510-bit slot with guard periods.
pub fn split_dm_burst(bits: &BitBuffer) -> Option<DmBurst> {
    let offset = match bits.get_len() {
        DM_BURST_BITS => 0,
        FULL_SLOT_BITS => DM_LEADING_GUARD_BITS,
        _ => return None,
    };
    let all = bits.to_bitvec();
    let burst = &all[offset..offset + DM_BURST_BITS];
    let block = |from: usize, len: usize| BitBuffer::from_bitarr(&burst[from..from + len]);

    if hamming(&burst[SB_TRAIN_OFFSET..SB_SCH_H_OFFSET], &bitseq::y) <= TRAIN_MAX_ERRORS {
        return Some(DmBurst::Sync {
            sch_s: block(SB_SCH_S_OFFSET, DM_SCH_S_BITS),
            sch_h: block(SB_SCH_H_OFFSET, DM_BLK_BITS),
        });
    }

    let train_field = &burst[NB_TRAIN_OFFSET..NB_BLK2_OFFSET];
    let train = if hamming(train_field, &bitseq::n) <= TRAIN_MAX_ERRORS {
        DmTrainingSequence::Normal1
    } else if hamming(train_field, &bitseq::p) <= TRAIN_MAX_ERRORS {
        DmTrainingSequence::Normal2
    } else {
        return None;
    };
    Some(DmBurst::Normal {
        train,
        blk1: block(NB_BLK1_OFFSET, DM_BLK_BITS),
        blk2: block(NB_BLK2_OFFSET, DM_BLK_BITS),
    })
}
