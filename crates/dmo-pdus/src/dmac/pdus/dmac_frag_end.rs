use core::fmt;

use dmo_core::{BitBuffer, PduParseErr, expect_pdu_type};

use crate::dmac::enums::dmac_pdu_type::DmacPduType;

/// DMAC-FRAG (subtype 0) or DMAC-END (subtype 1) header
/// Bits: 4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmacFragEnd {
    // 1
    pub is_end: bool,
    // 1
    pub fill_bit: bool,
}

impl DmacFragEnd {
    pub const HEADER_BITS: usize = 4;

    pub fn from_bitbuf(buf: &mut BitBuffer) -> Result<Self, PduParseErr> {
        let pdu_type = buf.read_field(2, "pdu_type")?;
        expect_pdu_type!(pdu_type, DmacPduType::DmacFragEnd)?;
        let is_end = buf.read_field(1, "subtype")? == 1;
        let fill_bit = buf.read_field(1, "fill_bit")? == 1;
        Ok(DmacFragEnd { is_end, fill_bit })
    }

    pub fn to_bitbuf(&self, buf: &mut BitBuffer) {
        buf.write_bits(DmacPduType::DmacFragEnd.into_raw(), 2);
        buf.write_bits(self.is_end as u64, 1);
        buf.write_bits(self.fill_bit as u64, 1);
    }
}

impl fmt::Display for DmacFragEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.is_end { "DmacEnd" } else { "DmacFrag" };
        write!(f, "{} {{ fill: {} }}", name, self.fill_bit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frag_end_header() {
        let mut buf = BitBuffer::from_bitstr("0110").unwrap();
        let hdr = DmacFragEnd::from_bitbuf(&mut buf).unwrap();
        assert!(hdr.is_end);
        assert!(!hdr.fill_bit);

        let mut buf = BitBuffer::from_bitstr("0001").unwrap();
        assert!(DmacFragEnd::from_bitbuf(&mut buf).is_err());
    }
}
