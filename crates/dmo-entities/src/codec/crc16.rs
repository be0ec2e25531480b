/// CRC-16-CCITT over one-bit-per-byte input, MSB first.
pub const GEN_POLY: u16 = 0x1021;

/// Residue left by a block followed by its inverted CRC
pub const CRC_RESIDUE_OK: u16 = 0x1d0f;

/// Feed `bits` (each `b & 1` is one bit) into `crc`.
pub fn crc16_update_bits(mut crc: u16, bits: &[u8]) -> u16 {
    for &b in bits {
        crc ^= ((b & 1) as u16) << 15;
        crc = if crc & 0x8000 != 0 { (crc << 1) ^ GEN_POLY } else { crc << 1 };
    }
    crc
}

/// CRC with initial value 0xffff, as used on the air interface
pub fn crc16_ccitt_bits(bits: &[u8]) -> u16 {
    crc16_update_bits(0xffff, bits)
}

/// Appends the inverted CRC of `type1` as 16 bits, MSB first.
pub fn append_crc(type1: &[u8], out: &mut [u8]) {
    let crc = !crc16_ccitt_bits(type1);
    for (i, o) in out.iter_mut().take(16).enumerate() {
        *o = ((crc >> (15 - i)) & 1) as u8;
    }
}

/// True if `block` (payload followed by its 16 CRC bits) checks out.
pub fn check_crc(block: &[u8]) -> bool {
    crc16_ccitt_bits(block) == CRC_RESIDUE_OK
}
