use core::fmt;

use dmo_core::BitBuffer;

/// Longest logical message that can be reassembled, in bits
pub const MAX_REASSEMBLY_BITS: usize = 4095;
const REASSEMBLY_BUF_INITIAL_LEN: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragError {
    /// DMAC-END received with no fragmented message in progress
    EndWithoutStart,
    /// DMAC-FRAG received with no fragmented message in progress
    FragWithoutStart,
    /// Appending would grow the message beyond [`MAX_REASSEMBLY_BITS`]
    LengthExceeded { len: usize },
}

impl fmt::Display for FragError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FragError::EndWithoutStart => write!(f, "end fragment without start"),
            FragError::FragWithoutStart => write!(f, "continuation fragment without start"),
            FragError::LengthExceeded { len } => {
                write!(f, "reassembled length {} exceeds {} bits", len, MAX_REASSEMBLY_BITS)
            }
        }
    }
}

impl std::error::Error for FragError {}

/// Single-slot fragment reassembler. Only one fragmented message can be in progress,
/// matching the one-call-at-a-time model of the repeater.
///
/// `bit_count` is the length of the logical message so far. When a fragment carries fill
/// bits, its trailing zeroes are removed from `bit_count` but stay in the buffer until the
/// next fragment overwrites them.
pub struct FragReassembler {
    active: bool,
    buffer: BitBuffer,
    bit_count: usize,
    num_frags: usize,
    slots_idle: u32,
    timeout_slots: u32,
}

impl FragReassembler {
    pub fn new(timeout_slots: u32) -> Self {
        Self {
            active: false,
            buffer: BitBuffer::new_autoexpand(REASSEMBLY_BUF_INITIAL_LEN),
            bit_count: 0,
            num_frags: 0,
            slots_idle: 0,
            timeout_slots,
        }
    }

    pub fn reset(&mut self) {
        self.active = false;
        self.buffer = BitBuffer::new_autoexpand(REASSEMBLY_BUF_INITIAL_LEN);
        self.bit_count = 0;
        self.num_frags = 0;
        self.slots_idle = 0;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Length of the logical message accumulated so far
    pub fn bit_count(&self) -> usize {
        self.bit_count
    }

    /// Bits held in the buffer, including fill not yet overwritten
    pub fn raw_len(&self) -> usize {
        self.buffer.get_len()
    }

    pub fn num_frags(&self) -> usize {
        self.num_frags
    }

    /// Begins a new message with the bits from the cursor of `bits` to its end.
    /// A message already in progress is discarded.
    pub fn start(&mut self, bits: &mut BitBuffer) -> Result<(), FragError> {
        if self.active {
            tracing::warn!("reassembly restarted, dropping {} bits in {} fragments", self.bit_count, self.num_frags);
        }
        self.reset();
        let n = bits.get_len_remaining();
        if n > MAX_REASSEMBLY_BITS {
            return Err(FragError::LengthExceeded { len: n });
        }
        let _ = self.buffer.copy_bits(bits, n);
        self.active = true;
        self.bit_count = n;
        self.num_frags = 1;
        tracing::debug!("reassembly start: {} bits: {}", n, self.buffer.dump_bin());
        Ok(())
    }

    /// Appends the bits from the cursor of `bits` to its end. With `fill` set, the
    /// fragment's trailing zeroes are not counted as message bits.
    pub fn append(&mut self, bits: &mut BitBuffer, fill: bool) -> Result<(), FragError> {
        if !self.active {
            return Err(FragError::FragWithoutStart);
        }
        let n = bits.get_len_remaining();
        if self.bit_count + n > MAX_REASSEMBLY_BITS {
            let len = self.bit_count + n;
            self.reset();
            return Err(FragError::LengthExceeded { len });
        }
        let padding = if fill { bits.trailing_zeroes().min(n) } else { 0 };

        // Overwrite fill left over from the previous fragment
        self.buffer.seek(self.bit_count);
        let _ = self.buffer.copy_bits(bits, n);
        self.bit_count += n - padding;
        self.num_frags += 1;
        self.slots_idle = 0;

        tracing::debug!(
            "reassembly frag {}: +{} bits ({} fill), total {}",
            self.num_frags,
            n - padding,
            padding,
            self.bit_count
        );
        Ok(())
    }

    /// Completes the message. The returned buffer holds exactly `bit_count` bits, cursor at 0.
    pub fn finish(&mut self) -> Result<BitBuffer, FragError> {
        if !self.active {
            return Err(FragError::EndWithoutStart);
        }
        let out = BitBuffer::from_range(&self.buffer, 0, self.bit_count).ok_or(FragError::LengthExceeded { len: self.bit_count });
        tracing::debug!("reassembly done: {} bits in {} fragments", self.bit_count, self.num_frags);
        self.reset();
        out
    }

    /// Advances the inactivity timer by one slot. Returns true if an unfinished message
    /// was dropped.
    pub fn tick(&mut self) -> bool {
        if !self.active || self.timeout_slots == 0 {
            return false;
        }
        self.slots_idle += 1;
        if self.slots_idle >= self.timeout_slots {
            tracing::warn!("reassembly timed out after {} fragments ({} bits)", self.num_frags, self.bit_count);
            self.reset();
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmo_core::debug;

    fn bits(pattern: &str, n: usize) -> BitBuffer {
        let s: String = pattern.chars().cycle().take(n).collect();
        BitBuffer::from_bitstr(&s).unwrap()
    }

    #[test]
    fn test_two_fragments() {
        debug::setup_logging_verbose();
        let mut r = FragReassembler::new(144);
        r.start(&mut bits("10", 64)).unwrap();
        r.append(&mut bits("0111", 64), false).unwrap();
        let msg = r.finish().unwrap();
        assert_eq!(msg.get_len(), 128);
        assert_eq!(msg.get_pos(), 0);
        assert_eq!(&msg.to_bitstr()[..64], bits("10", 64).to_bitstr());
        assert_eq!(&msg.to_bitstr()[64..], bits("0111", 64).to_bitstr());
        assert!(!r.is_active());
    }

    #[test]
    fn test_fill_trims_count_not_buffer() {
        let mut r = FragReassembler::new(144);
        r.start(&mut bits("1", 16)).unwrap();
        let mut frag = BitBuffer::from_bitstr("1011010000000").unwrap();
        r.append(&mut frag, true).unwrap();
        assert_eq!(r.bit_count(), 16 + 6);
        assert_eq!(r.raw_len(), 16 + 13);

        // The next fragment lands right after the last message bit
        r.append(&mut BitBuffer::from_bitstr("0110").unwrap(), false).unwrap();
        let msg = r.finish().unwrap();
        assert_eq!(msg.to_bitstr(), format!("{}{}{}", "1".repeat(16), "101101", "0110"));
    }

    #[test]
    fn test_partial_buffer_cursor() {
        let mut r = FragReassembler::new(144);
        let mut first = BitBuffer::from_bitstr("0000111").unwrap();
        // Header already consumed by the PDU layer
        first.seek(4);
        r.start(&mut first).unwrap();
        assert_eq!(r.bit_count(), 3);
        assert_eq!(r.finish().unwrap().to_bitstr(), "111");
    }

    #[test]
    fn test_sequencing_errors() {
        let mut r = FragReassembler::new(144);
        assert_eq!(r.append(&mut bits("1", 8), false), Err(FragError::FragWithoutStart));
        assert_eq!(r.finish(), Err(FragError::EndWithoutStart));
    }

    #[test]
    fn test_length_exceeded_resets() {
        let mut r = FragReassembler::new(144);
        r.start(&mut bits("1", 4000)).unwrap();
        let err = r.append(&mut bits("1", 100), false).unwrap_err();
        assert_eq!(err, FragError::LengthExceeded { len: 4100 });
        assert!(!r.is_active());

        // Exactly at the limit is fine
        r.start(&mut bits("1", 4000)).unwrap();
        r.append(&mut bits("1", 95), false).unwrap();
        assert_eq!(r.finish().unwrap().get_len(), MAX_REASSEMBLY_BITS);
    }

    #[test]
    fn test_timeout() {
        let mut r = FragReassembler::new(3);
        assert!(!r.tick());
        r.start(&mut bits("1", 8)).unwrap();
        assert!(!r.tick());
        assert!(!r.tick());
        r.append(&mut bits("1", 8), false).unwrap();
        assert!(!r.tick());
        assert!(!r.tick());
        assert!(r.tick());
        assert!(!r.is_active());
    }
}
