use dmo_core::BitBuffer;

/// Next bit of the 32-bit Fibonacci LFSR, taps 32,26,23,22,16,12,11,10,8,7,5,4,2,1
#[inline]
fn next_lfsr_bit(lfsr: &mut u32) -> u8 {
    const TAPS: [u32; 13] = [26, 23, 22, 16, 12, 11, 10, 8, 7, 5, 4, 2, 1];
    let x = *lfsr;
    let mut bit = x;
    for t in TAPS {
        bit ^= x >> (32 - t);
    }
    let bit = bit & 1;
    *lfsr = (x >> 1) | (bit << 31);
    bit as u8
}

/// XORs the scrambling sequence for `init` onto all bits from the cursor to the end.
/// The cursor is restored afterwards. Scrambling and descrambling are the same operation.
pub fn scramble_bits(init: u32, buf: &mut BitBuffer) {
    let mut lfsr = init;
    let n = buf.get_len_remaining();
    for _ in 0..n {
        buf.xor_bit(next_lfsr_bit(&mut lfsr));
    }
    buf.seek_rel(-(n as isize));
}
