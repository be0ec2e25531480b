/// DM colour code: the 24-bit source address with the low 6 bits of the MNI on top.
pub fn dm_colour_code(src_ssi: u32, mni: u32) -> u32 {
    (src_ssi & 0xffffff) | ((mni & 0x3f) << 24)
}

/// Scrambler initialisation for SCH/F, STCH and TCH blocks following a DMAC-SYNC.
/// The two lowest bits of the LFSR state are always set.
pub fn dm_scrambling_code(colour_code: u32) -> u32 {
    (colour_code << 2) | 3
}

/// Scrambler initialisation for SCH/S and SCH/H
pub const SYNC_SCRAMBLING_CODE: u32 = 3;
