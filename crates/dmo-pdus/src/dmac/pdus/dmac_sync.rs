use core::fmt;

use dmo_core::{BitBuffer, DmLink, LogicalChannel, PduParseErr, assert_warn, expect_pdu_type};

use crate::dmac::enums::address_type::DmAddress;
use crate::dmac::enums::communication_type::CommunicationType;
use crate::dmac::enums::dmo_message_type::DmoMessageType;
use crate::dmac::enums::sync_pdu_type::SyncPduType;

/// Air interface encryption parameters, present when the encryption state is non-zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AieParams {
    // 29
    pub time_variant_parameter: u32,
    // 4
    pub ksg_number: u8,
    // 5
    pub encryption_key_number: u8,
}

/// DMAC-SYNC, SCH/S part
/// Bits: 60
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmacSyncSchS {
    // 4
    pub system_code: u8,
    // 2, fixed to DMAC-SYNC
    // 2
    pub communication_type: CommunicationType,
    // 1, meaningful when a repeater is involved
    pub ms_link: DmLink,
    // 1, meaningful when a gateway is involved
    pub gateway_generated: bool,
    // 2
    pub ab_channel_usage: u8,
    // 2, carried as tn-1
    pub slot_number: u8,
    // 5
    pub frame_number: u8,
    // 2
    pub encryption_state: u8,
    /// Present if encryption_state > 0. Parsed, never acted on.
    pub aie: Option<AieParams>,
}

impl DmacSyncSchS {
    pub fn from_bitbuf(buf: &mut BitBuffer) -> Result<Self, PduParseErr> {
        let system_code = buf.read_field(4, "system_code")? as u8;
        let sync_pdu_type = buf.read_field(2, "sync_pdu_type")?;
        expect_pdu_type!(sync_pdu_type, SyncPduType::DmacSync)?;
        let comm_raw = buf.read_field(2, "communication_type")?;
        let communication_type = CommunicationType::try_from(comm_raw).unwrap_or_default();

        let ms_bit = buf.read_field(1, "ms_link_flag")?;
        let gw_bit = buf.read_field(1, "gateway_generated")?;
        let ms_link = if communication_type.has_ms_link_flag() && ms_bit == 1 { DmLink::Slave } else { DmLink::Master };
        let gateway_generated = communication_type.has_gateway_flag() && gw_bit == 1;

        let ab_channel_usage = buf.read_field(2, "ab_channel_usage")? as u8;
        let slot_number = buf.read_field(2, "slot_number")? as u8 + 1;
        let frame_number = buf.read_field(5, "frame_number")? as u8;
        let encryption_state = buf.read_field(2, "encryption_state")? as u8;
        let aie = if encryption_state > 0 {
            let time_variant_parameter = buf.read_field(29, "time_variant_parameter")? as u32;
            assert_warn!(buf.read_field(1, "reserved")? == 0, "reserved bit not zero");
            let ksg_number = buf.read_field(4, "ksg_number")? as u8;
            let encryption_key_number = buf.read_field(5, "encryption_key_number")? as u8;
            Some(AieParams { time_variant_parameter, ksg_number, encryption_key_number })
        } else {
            buf.read_field(39, "reserved")?;
            None
        };

        Ok(DmacSyncSchS {
            system_code,
            communication_type,
            ms_link,
            gateway_generated,
            ab_channel_usage,
            slot_number,
            frame_number,
            encryption_state,
            aie,
        })
    }

    pub fn to_bitbuf(&self, buf: &mut BitBuffer) {
        buf.write_bits(self.system_code as u64, 4);
        buf.write_bits(SyncPduType::DmacSync.into_raw(), 2);
        buf.write_bits(self.communication_type.into_raw(), 2);
        buf.write_bits((self.ms_link == DmLink::Slave) as u64, 1);
        buf.write_bits(self.gateway_generated as u64, 1);
        buf.write_bits(self.ab_channel_usage as u64, 2);
        buf.write_bits(self.slot_number as u64 - 1, 2);
        buf.write_bits(self.frame_number as u64, 5);
        buf.write_bits(self.encryption_state as u64, 2);
        match self.aie {
            Some(aie) if self.encryption_state > 0 => {
                buf.write_bits(aie.time_variant_parameter as u64, 29);
                buf.write_bits(0, 1);
                buf.write_bits(aie.ksg_number as u64, 4);
                buf.write_bits(aie.encryption_key_number as u64, 5);
            }
            _ => buf.write_zeroes(39),
        }
    }
}

impl fmt::Display for DmacSyncSchS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DmacSyncSchS {{ sc: {}", self.system_code)?;
        write!(f, " comm: {}", self.communication_type)?;
        write!(f, " link: {}", self.ms_link)?;
        write!(f, " gw: {}", self.gateway_generated)?;
        write!(f, " ab: {}", self.ab_channel_usage)?;
        write!(f, " tn: {} fn: {}", self.slot_number, self.frame_number)?;
        write!(f, " enc: {} }}", self.encryption_state)
    }
}

/// DMAC-SYNC, SCH/H part
/// Bits: 124
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmacSyncSchH {
    // 10, always present on air, meaningful when communication type > 0
    pub repgw_address: u16,
    // 1
    pub fill_bit: bool,
    // 1
    pub fragmented: bool,
    // 4, present if fragmented
    pub num_sch_f_slots: Option<u8>,
    // 2
    pub frame_countdown: u8,
    // 2 + 24 opt
    pub dst: DmAddress,
    // 2 + 24 opt
    pub src: DmAddress,
    // 24, present for direct and repeater communication
    pub mni: Option<u32>,
    // 5, raw so reserved and proprietary values survive relaying
    pub message_type: u8,
    /// Message-dependent elements followed by the DM-SDU, fill bits removed
    pub payload: BitBuffer,
}

impl DmacSyncSchH {
    /// Parses SCH/H given the communication type learned from the preceding SCH/S.
    pub fn from_bitbuf(buf: &mut BitBuffer, communication_type: CommunicationType) -> Result<Self, PduParseErr> {
        let repgw_address = buf.read_field(10, "repgw_address")? as u16;
        let fill_bit = buf.read_field(1, "fill_bit")? == 1;
        let fragmented = buf.read_field(1, "fragmented")? == 1;
        let num_sch_f_slots = if fragmented { Some(buf.read_field(4, "num_sch_f_slots")? as u8) } else { None };
        let frame_countdown = buf.read_field(2, "frame_countdown")? as u8;
        let dst = DmAddress::from_bitbuf(buf, "dst_address")?;
        let src = DmAddress::from_bitbuf(buf, "src_address")?;
        let mni = if communication_type.has_mni() { Some(buf.read_field(24, "mni")? as u32) } else { None };
        let message_type = buf.read_field(5, "message_type")? as u8;

        let payload_start = buf.get_pos();
        let mut payload_len = buf.get_len_remaining();
        if fill_bit {
            let zeroes = buf.trailing_zeroes().min(payload_len);
            payload_len -= zeroes;
            if payload_len == 0 {
                return Err(PduParseErr::Inconsistency { field: "fill_bit", reason: "no fill bit terminator present" });
            }
            // The last '1' terminates the fill
            payload_len -= 1;
        }
        let payload = BitBuffer::from_range(buf, payload_start, payload_len)
            .ok_or(PduParseErr::BufferEnded { field: Some("payload") })?;
        buf.seek(buf.get_len());

        Ok(DmacSyncSchH {
            repgw_address,
            fill_bit,
            fragmented,
            num_sch_f_slots,
            frame_countdown,
            dst,
            src,
            mni,
            message_type,
            payload,
        })
    }

    /// Writes exactly 124 bits. Fill bits are added as needed.
    pub fn to_bitbuf(&self, buf: &mut BitBuffer) {
        let start = buf.get_pos();
        buf.write_bits(self.repgw_address as u64 & 0x3ff, 10);
        let header_bits = self.header_len();
        let total = LogicalChannel::SchH.type1_bits();
        let fits_exactly = header_bits + self.payload.get_len() == total;
        let fill = !fits_exactly;
        buf.write_bits(fill as u64, 1);
        buf.write_bits(self.fragmented as u64, 1);
        if self.fragmented {
            buf.write_bits(self.num_sch_f_slots.unwrap_or(0) as u64, 4);
        }
        buf.write_bits(self.frame_countdown as u64, 2);
        self.dst.to_bitbuf(buf);
        self.src.to_bitbuf(buf);
        if let Some(mni) = self.mni {
            buf.write_bits(mni as u64 & 0xffffff, 24);
        }
        buf.write_bits(self.message_type as u64, 5);
        let mut payload = self.payload.clone();
        payload.seek(0);
        let room = total.saturating_sub(buf.get_pos() - start);
        let n = payload.get_len().min(room);
        // Silently truncated payloads would corrupt the relay, so flag them in the log
        assert_warn!(n == payload.get_len(), "SCH/H payload of {} bits truncated to {}", payload.get_len(), n);
        let _ = buf.copy_bits(&mut payload, n);
        if fill && buf.get_pos() - start < total {
            buf.write_bit(1);
            let written = buf.get_pos() - start;
            buf.write_zeroes(total - written);
        }
    }

    /// Bits from the start of SCH/H up to and including the message type
    pub fn header_len(&self) -> usize {
        let mut n = 10 + 1 + 1 + 2 + 5;
        if self.fragmented {
            n += 4;
        }
        n += 2 + if self.dst.addr_type.has_address() { 24 } else { 0 };
        n += 2 + if self.src.addr_type.has_address() { 24 } else { 0 };
        if self.mni.is_some() {
            n += 24;
        }
        n
    }

    pub fn message_type(&self) -> Result<DmoMessageType, u8> {
        DmoMessageType::try_from(self.message_type as u64).map_err(|_| self.message_type)
    }
}

impl fmt::Display for DmacSyncSchH {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DmacSyncSchH {{ repgw: {}", self.repgw_address)?;
        write!(f, " fill: {} frag: {}", self.fill_bit, self.fragmented)?;
        write!(f, " fc: {}", self.frame_countdown)?;
        write!(f, " dst: {} src: {}", self.dst, self.src)?;
        if let Some(mni) = self.mni {
            write!(f, " mni: {}", mni)?;
        }
        match self.message_type() {
            Ok(t) => write!(f, " msg: {}", t)?,
            Err(raw) => write!(f, " msg: unknown({})", raw)?,
        }
        write!(f, " payload: {} bits }}", self.payload.get_len())
    }
}

/// A complete DMAC-SYNC PDU as received in one sync burst
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmacSync {
    pub schs: DmacSyncSchS,
    pub schh: DmacSyncSchH,
}

impl DmacSync {
    /// DM colour code, used to seed the scrambler for the following SCH/F and STCH blocks
    pub fn colour_code(&self) -> u32 {
        crate::dmac::fields::colour_code::dm_colour_code(self.schh.src.ssi, self.schh.mni.unwrap_or(0))
    }
}

impl fmt::Display for DmacSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.schs, self.schh)
    }
}
