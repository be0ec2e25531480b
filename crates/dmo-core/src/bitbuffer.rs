use std::fmt;

use crate::pdu_parse_error::PduParseErr;

/// Packed, MSB-first bit vector with a read/write cursor.
///
/// `len` is the number of valid bits. Reads never go past `len`. Writes past `len`
/// grow the buffer when it was created with [`BitBuffer::new_autoexpand`], and panic
/// otherwise (a fixed-size block overflowing is a programming error, not an input error).
#[derive(Clone, PartialEq, Eq)]
pub struct BitBuffer {
    buffer: Vec<u8>,
    len: usize,
    pos: usize,
    autoexpand: bool,
}

impl BitBuffer {
    /// Zeroed buffer of exactly `len_bits` bits.
    pub fn new(len_bits: usize) -> Self {
        BitBuffer {
            buffer: vec![0; len_bits.div_ceil(8)],
            len: len_bits,
            pos: 0,
            autoexpand: false,
        }
    }

    /// Empty buffer that grows on write. `capacity_bits` is only a hint.
    pub fn new_autoexpand(capacity_bits: usize) -> Self {
        BitBuffer {
            buffer: Vec::with_capacity(capacity_bits.div_ceil(8)),
            len: 0,
            pos: 0,
            autoexpand: true,
        }
    }

    /// Parse a string of '0'/'1' characters. Any other character is rejected.
    pub fn from_bitstr(bitstr: &str) -> Option<Self> {
        let mut buf = BitBuffer::new(bitstr.len());
        for c in bitstr.chars() {
            match c {
                '0' => buf.write_bit(0),
                '1' => buf.write_bit(1),
                _ => return None,
            }
        }
        buf.pos = 0;
        Some(buf)
    }

    /// One bit per byte input (only the lowest bit of each byte is used).
    pub fn from_bitarr(data: &[u8]) -> Self {
        let mut buf = BitBuffer::new(data.len());
        for &b in data {
            buf.write_bit(b & 1);
        }
        buf.pos = 0;
        buf
    }

    /// Copy of bits `[from, from+num_bits)` of `src` into a new fixed-size buffer.
    pub fn from_range(src: &BitBuffer, from: usize, num_bits: usize) -> Option<Self> {
        if from + num_bits > src.len {
            return None;
        }
        let mut buf = BitBuffer::new(num_bits);
        for i in 0..num_bits {
            buf.write_bit(src.bit_at_unchecked(from + i));
        }
        buf.pos = 0;
        Some(buf)
    }

    /// Expand the whole buffer into one bit per byte.
    pub fn to_bitvec(&self) -> Vec<u8> {
        (0..self.len).map(|i| self.bit_at_unchecked(i)).collect()
    }

    /// Fill `out` with bits read from the cursor, advancing it.
    pub fn to_bitarr(&mut self, out: &mut [u8]) -> Option<()> {
        if self.pos + out.len() > self.len {
            return None;
        }
        for o in out.iter_mut() {
            *o = self.bit_at_unchecked(self.pos);
            self.pos += 1;
        }
        Some(())
    }

    pub fn to_bitstr(&self) -> String {
        (0..self.len)
            .map(|i| if self.bit_at_unchecked(i) == 1 { '1' } else { '0' })
            .collect()
    }

    #[inline]
    fn bit_at_unchecked(&self, index: usize) -> u8 {
        (self.buffer[index / 8] >> (7 - (index % 8))) & 1
    }

    #[inline]
    fn set_bit_unchecked(&mut self, index: usize, value: u8) {
        let mask = 1u8 << (7 - (index % 8));
        if value & 1 == 1 {
            self.buffer[index / 8] |= mask;
        } else {
            self.buffer[index / 8] &= !mask;
        }
    }

    /// Bounds-checked single bit access.
    pub fn get_bit(&self, index: usize) -> Option<u8> {
        (index < self.len).then(|| self.bit_at_unchecked(index))
    }

    /// Bounds-checked single bit update. Returns false if `index` is out of range.
    pub fn set_bit(&mut self, index: usize, value: u8) -> bool {
        if index >= self.len {
            return false;
        }
        self.set_bit_unchecked(index, value);
        true
    }

    /// Peek up to 64 bits at absolute `offset` without moving the cursor.
    pub fn peek_bits_at(&self, offset: usize, num_bits: usize) -> Option<u64> {
        if num_bits > 64 || offset + num_bits > self.len {
            return None;
        }
        let mut v = 0u64;
        for i in 0..num_bits {
            v = (v << 1) | self.bit_at_unchecked(offset + i) as u64;
        }
        Some(v)
    }

    /// Peek up to 64 bits at the cursor.
    pub fn peek_bits(&self, num_bits: usize) -> Option<u64> {
        self.peek_bits_at(self.pos, num_bits)
    }

    /// Read up to 64 bits at the cursor, advancing on success.
    pub fn read_bits(&mut self, num_bits: usize) -> Option<u64> {
        let v = self.peek_bits(num_bits)?;
        self.pos += num_bits;
        Some(v)
    }

    /// Like [`read_bits`](Self::read_bits), naming the field in the error.
    pub fn read_field(&mut self, num_bits: usize, field: &'static str) -> Result<u64, PduParseErr> {
        self.read_bits(num_bits).ok_or(PduParseErr::BufferEnded { field: Some(field) })
    }

    pub fn read_bit(&mut self) -> Option<u8> {
        self.read_bits(1).map(|v| v as u8)
    }

    fn reserve_for_write(&mut self, num_bits: usize) {
        let needed = self.pos + num_bits;
        if needed > self.len {
            assert!(self.autoexpand, "write of {} bits at {} exceeds buffer end {}", num_bits, self.pos, self.len);
            let needed_bytes = needed.div_ceil(8);
            if needed_bytes > self.buffer.len() {
                self.buffer.resize(needed_bytes, 0);
            }
            self.len = needed;
        }
    }

    pub fn write_bit(&mut self, value: u8) {
        self.reserve_for_write(1);
        self.set_bit_unchecked(self.pos, value);
        self.pos += 1;
    }

    /// Write the lowest `num_bits` of `value`, MSB first.
    pub fn write_bits(&mut self, value: u64, num_bits: usize) {
        assert!(num_bits <= 64, "can only write up to 64 bits");
        assert!(num_bits == 64 || value >> num_bits == 0, "value {} exceeds {} bits", value, num_bits);
        self.reserve_for_write(num_bits);
        for i in (0..num_bits).rev() {
            self.set_bit_unchecked(self.pos, ((value >> i) & 1) as u8);
            self.pos += 1;
        }
    }

    pub fn write_zeroes(&mut self, num_bits: usize) {
        self.reserve_for_write(num_bits);
        for _ in 0..num_bits {
            self.set_bit_unchecked(self.pos, 0);
            self.pos += 1;
        }
    }

    /// Write a one-bit-per-byte slice.
    pub fn write_bitarr(&mut self, bits: &[u8]) {
        self.reserve_for_write(bits.len());
        for &b in bits {
            self.set_bit_unchecked(self.pos, b & 1);
            self.pos += 1;
        }
    }

    /// Copy `num_bits` from the cursor of `src` to the cursor of `self`, advancing both.
    pub fn copy_bits(&mut self, src: &mut BitBuffer, num_bits: usize) -> Option<()> {
        if src.pos + num_bits > src.len {
            return None;
        }
        self.reserve_for_write(num_bits);
        for _ in 0..num_bits {
            let b = src.bit_at_unchecked(src.pos);
            src.pos += 1;
            self.set_bit_unchecked(self.pos, b);
            self.pos += 1;
        }
        Some(())
    }

    /// XOR the bit at the cursor with `value` and advance.
    pub fn xor_bit(&mut self, value: u8) {
        let cur = self.bit_at_unchecked(self.pos);
        self.set_bit_unchecked(self.pos, cur ^ (value & 1));
        self.pos += 1;
    }

    /// Number of zero bits at the end of the valid range.
    pub fn trailing_zeroes(&self) -> usize {
        (0..self.len).rev().take_while(|&i| self.bit_at_unchecked(i) == 0).count()
    }

    pub fn get_len(&self) -> usize {
        self.len
    }

    pub fn get_pos(&self) -> usize {
        self.pos
    }

    pub fn get_len_remaining(&self) -> usize {
        self.len - self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        assert!(pos <= self.len, "seek to {} beyond end {}", pos, self.len);
        self.pos = pos;
    }

    pub fn seek_rel(&mut self, offset: isize) {
        let target = self.pos as isize + offset;
        assert!(target >= 0, "seek_rel before start");
        self.seek(target as usize);
    }

    pub fn is_autoexpand(&self) -> bool {
        self.autoexpand
    }

    pub fn dump_bin(&self) -> String {
        self.to_bitstr()
    }
}

impl fmt::Debug for BitBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitBuffer {{ len: {}, pos: {}, bits: {} }}", self.len, self.pos, self.to_bitstr())
    }
}

impl Default for BitBuffer {
    fn default() -> Self {
        BitBuffer::new_autoexpand(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_fields() {
        let mut buf = BitBuffer::new(20);
        buf.write_bits(0b1011, 4);
        buf.write_bits(0x3ff, 10);
        buf.write_bits(0b010101, 6);
        assert_eq!(buf.get_pos(), 20);
        buf.seek(0);
        assert_eq!(buf.read_bits(4), Some(0b1011));
        assert_eq!(buf.read_bits(10), Some(0x3ff));
        assert_eq!(buf.read_bits(6), Some(0b010101));
        assert_eq!(buf.read_bits(1), None);
        assert!(matches!(buf.read_field(1, "past_end"), Err(PduParseErr::BufferEnded { field: Some("past_end") })));
    }

    #[test]
    fn test_bitstr_conversion() {
        let s = "1100101000111";
        let buf = BitBuffer::from_bitstr(s).unwrap();
        assert_eq!(buf.get_len(), 13);
        assert_eq!(buf.to_bitstr(), s);
        assert!(BitBuffer::from_bitstr("10x1").is_none());
    }

    #[test]
    fn test_autoexpand_and_overwrite() {
        let mut buf = BitBuffer::new_autoexpand(8);
        buf.write_bits(0xabcd, 16);
        buf.write_bits(0x1, 3);
        assert_eq!(buf.get_len(), 19);

        // Overwriting inside the valid range does not grow the buffer
        buf.seek(4);
        buf.write_bits(0, 4);
        assert_eq!(buf.get_len(), 19);
        assert_eq!(buf.peek_bits_at(0, 16), Some(0xa0cd));
    }

    #[test]
    fn test_bounds_checked_access() {
        let mut buf = BitBuffer::new(3);
        assert!(buf.set_bit(2, 1));
        assert!(!buf.set_bit(3, 1));
        assert_eq!(buf.get_bit(2), Some(1));
        assert_eq!(buf.get_bit(3), None);
    }

    #[test]
    #[should_panic]
    fn test_fixed_buffer_overflow_panics() {
        let mut buf = BitBuffer::new(4);
        buf.write_bits(0, 5);
    }

    #[test]
    fn test_copy_and_range() {
        let mut src = BitBuffer::from_bitstr("0001111000").unwrap();
        let mut dst = BitBuffer::new_autoexpand(0);
        src.seek(3);
        dst.copy_bits(&mut src, 4).unwrap();
        assert_eq!(dst.to_bitstr(), "1111");
        assert_eq!(src.get_pos(), 7);

        let r = BitBuffer::from_range(&src, 2, 3).unwrap();
        assert_eq!(r.to_bitstr(), "011");
        assert!(BitBuffer::from_range(&src, 8, 3).is_none());
    }

    #[test]
    fn test_trailing_zeroes() {
        assert_eq!(BitBuffer::from_bitstr("1011000").unwrap().trailing_zeroes(), 3);
        assert_eq!(BitBuffer::from_bitstr("0000").unwrap().trailing_zeroes(), 4);
        assert_eq!(BitBuffer::from_bitstr("1").unwrap().trailing_zeroes(), 0);
    }
}
