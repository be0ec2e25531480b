use core::fmt;

use dmo_core::{BitBuffer, PduParseErr};

/// User data of a short data message, selected by the short data type identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdsUserData {
    /// 16 bits
    Data1(u16),
    /// 32 bits
    Data2(u32),
    /// 64 bits
    Data3(u64),
    /// 11-bit length followed by that many bits
    Data4(BitBuffer),
    /// 16 bits
    PrecodedStatus(u16),
}

/// Message-dependent elements of DM-SDS UDATA and DM-SDS DATA, plus the leading DM-SDU elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmSdsFields {
    // 4
    pub time_remaining: u8,
    // 1
    pub transaction_type: u8,
    // 2
    pub priority: u8,
    // 1
    pub fcs_flag: bool,
    /// 4-bit address type and 48-bit calling party TSI, if additional addressing is present
    pub additional_address: Option<(u8, Option<u64>)>,
    // 4
    pub short_data_type: u8,
    /// None if the type is unknown or the data does not fit in this block
    pub user_data: Option<SdsUserData>,
}

impl DmSdsFields {
    pub const HEADER_BITS: usize = 8;

    pub fn from_bitbuf(buf: &mut BitBuffer) -> Result<Self, PduParseErr> {
        let time_remaining = buf.read_field(4, "time_remaining")? as u8;
        let transaction_type = buf.read_field(1, "transaction_type")? as u8;
        let priority = buf.read_field(2, "priority")? as u8;
        let fcs_flag = buf.read_field(1, "fcs_flag")? == 1;

        let additional_address = if buf.read_field(1, "additional_addressing_flag")? == 1 {
            let addr_type = buf.read_field(4, "additional_address_type")? as u8;
            let tsi = if addr_type == 1 { Some(buf.read_field(48, "calling_party_tsi")?) } else { None };
            Some((addr_type, tsi))
        } else {
            None
        };

        let short_data_type = buf.read_field(4, "short_data_type")? as u8;
        let user_data = match short_data_type {
            0 => Some(SdsUserData::Data1(buf.read_field(16, "user_data")? as u16)),
            1 => Some(SdsUserData::Data2(buf.read_field(32, "user_data")? as u32)),
            2 => Some(SdsUserData::Data3(buf.read_field(64, "user_data")?)),
            3 => {
                let len = buf.read_field(11, "length_indicator")? as usize;
                if len <= buf.get_len_remaining() {
                    let data = BitBuffer::from_range(buf, buf.get_pos(), len);
                    buf.seek_rel(len as isize);
                    data.map(SdsUserData::Data4)
                } else {
                    // Continues in a following fragment
                    None
                }
            }
            4 => Some(SdsUserData::PrecodedStatus(buf.read_field(16, "precoded_status")? as u16)),
            _ => {
                tracing::warn!("short data type {} not implemented", short_data_type);
                None
            }
        };

        Ok(DmSdsFields {
            time_remaining,
            transaction_type,
            priority,
            fcs_flag,
            additional_address,
            short_data_type,
            user_data,
        })
    }
}

impl fmt::Display for DmSdsFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DmSdsFields {{ remaining: {}", self.time_remaining)?;
        write!(f, " tt: {} prio: {} fcs: {}", self.transaction_type, self.priority, self.fcs_flag)?;
        write!(f, " addr: {:?}", self.additional_address)?;
        write!(f, " sdti: {}", self.short_data_type)?;
        match &self.user_data {
            Some(SdsUserData::Data4(b)) => write!(f, " data4: {} bits }}", b.get_len()),
            Some(d) => write!(f, " data: {:?} }}", d),
            None => write!(f, " data: - }}"),
        }
    }
}
