use core::fmt;

use dmo_core::{BitBuffer, PduParseErr, expect_pdu_type};

use crate::dmac::enums::address_type::DmAddress;
use crate::dmac::enums::dmac_pdu_type::DmacPduType;

/// Addressing part of a non-null DMAC-DATA
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmacDataAddressing {
    // 2
    pub frame_countdown: u8,
    // 2
    pub encryption_state: u8,
    // 2 + 24 opt
    pub dst: DmAddress,
    // 2 + 24 opt
    pub src: DmAddress,
    // 24
    pub mni: u32,
    // 5
    pub message_type: u8,
}

/// DMAC-DATA header, carried in SCH/F or STCH.
/// The remainder of the block (message-dependent elements and DM-SDU) is left in the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmacData {
    // 2, fixed
    // 1
    pub fill_bit: bool,
    // 1
    pub second_half_stolen: bool,
    // 1
    pub fragmented: bool,
    // 1
    pub null_pdu: bool,
    /// Absent for a null PDU
    pub addressing: Option<DmacDataAddressing>,
}

impl DmacData {
    pub fn from_bitbuf(buf: &mut BitBuffer) -> Result<Self, PduParseErr> {
        let pdu_type = buf.read_field(2, "pdu_type")?;
        expect_pdu_type!(pdu_type, DmacPduType::DmacData)?;
        let fill_bit = buf.read_field(1, "fill_bit")? == 1;
        let second_half_stolen = buf.read_field(1, "second_half_stolen")? == 1;
        let fragmented = buf.read_field(1, "fragmented")? == 1;
        let null_pdu = buf.read_field(1, "null_pdu")? == 1;
        let addressing = if null_pdu {
            None
        } else {
            let frame_countdown = buf.read_field(2, "frame_countdown")? as u8;
            let encryption_state = buf.read_field(2, "encryption_state")? as u8;
            let dst = DmAddress::from_bitbuf(buf, "dst_address")?;
            let src = DmAddress::from_bitbuf(buf, "src_address")?;
            let mni = buf.read_field(24, "mni")? as u32;
            let message_type = buf.read_field(5, "message_type")? as u8;
            Some(DmacDataAddressing { frame_countdown, encryption_state, dst, src, mni, message_type })
        };
        Ok(DmacData { fill_bit, second_half_stolen, fragmented, null_pdu, addressing })
    }

    pub fn to_bitbuf(&self, buf: &mut BitBuffer) {
        buf.write_bits(DmacPduType::DmacData.into_raw(), 2);
        buf.write_bits(self.fill_bit as u64, 1);
        buf.write_bits(self.second_half_stolen as u64, 1);
        buf.write_bits(self.fragmented as u64, 1);
        buf.write_bits(self.addressing.is_none() as u64, 1);
        if let Some(a) = &self.addressing {
            buf.write_bits(a.frame_countdown as u64, 2);
            buf.write_bits(a.encryption_state as u64, 2);
            a.dst.to_bitbuf(buf);
            a.src.to_bitbuf(buf);
            buf.write_bits(a.mni as u64, 24);
            buf.write_bits(a.message_type as u64, 5);
        }
    }
}

impl fmt::Display for DmacData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DmacData {{ fill: {} stolen: {} frag: {}", self.fill_bit, self.second_half_stolen, self.fragmented)?;
        match &self.addressing {
            Some(a) => write!(
                f,
                " fc: {} enc: {} dst: {} src: {} mni: {} msg: {} }}",
                a.frame_countdown, a.encryption_state, a.dst, a.src, a.mni, a.message_type
            ),
            None => write!(f, " null }}"),
        }
    }
}
