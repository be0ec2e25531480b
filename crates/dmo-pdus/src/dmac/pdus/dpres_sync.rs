use core::fmt;

use dmo_core::{BitBuffer, DmLink, PduParseErr, assert_warn, expect_pdu_type};

use crate::dmac::enums::communication_type::CommunicationType;
use crate::dmac::enums::sync_pdu_type::SyncPduType;

/// Multiframes between presence signals, indexed by the coded DT254 value
pub const PRESENCE_INTERVAL_MULTIFRAMES: [u32; 8] = [0, 2, 5, 10, 15, 20, 30, 60];

/// DPRES-SYNC, SCH/S part, DM-REP layout
/// Bits: 60
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpresSyncSchS {
    // 4
    pub system_code: u8,
    // 2, fixed to DPRES-SYNC
    // 2
    pub communication_type: CommunicationType,
    // 1
    pub m_dmo: bool,
    // 2 reserved
    // 1
    pub two_frequency: bool,
    // 2
    pub repeater_operating_modes: u8,
    // 6
    pub uplink_spacing: u8,
    // 1
    pub ms_link: DmLink,
    // 2
    pub channel_usage: u8,
    // 2
    pub channel_state: u8,
    // 2, carried as tn-1
    pub slot_number: u8,
    // 5
    pub frame_number: u8,
    // 3
    pub power_class: u8,
    // 1
    pub power_control: bool,
    // 1 reserved
    // 2
    pub frame_countdown: u8,
    // 2
    pub priority: u8,
    // 6 reserved
    // 2
    pub dn232: u8,
    // 2
    pub dn233: u8,
    // 3
    pub dt254: u8,
    // 1
    pub dual_watch_sync: bool,
    // 5 reserved
}

impl DpresSyncSchS {
    pub fn from_bitbuf(buf: &mut BitBuffer) -> Result<Self, PduParseErr> {
        let system_code = buf.read_field(4, "system_code")? as u8;
        let sync_pdu_type = buf.read_field(2, "sync_pdu_type")?;
        expect_pdu_type!(sync_pdu_type, SyncPduType::DpresSync)?;
        let communication_type = CommunicationType::try_from(buf.read_field(2, "communication_type")?).unwrap_or_default();
        if communication_type.has_gateway_flag() {
            // Gateway presence signals use a different layout from here on
            return Err(PduParseErr::NotImplemented { field: Some("gateway presence signal") });
        }
        let m_dmo = buf.read_field(1, "m_dmo")? == 1;
        assert_warn!(buf.read_field(2, "reserved")? == 0, "reserved bits not zero");
        let two_frequency = buf.read_field(1, "two_frequency")? == 1;
        let repeater_operating_modes = buf.read_field(2, "repeater_operating_modes")? as u8;
        let uplink_spacing = buf.read_field(6, "uplink_spacing")? as u8;
        let ms_link = if buf.read_field(1, "ms_link_flag")? == 1 { DmLink::Slave } else { DmLink::Master };
        let channel_usage = buf.read_field(2, "channel_usage")? as u8;
        let channel_state = buf.read_field(2, "channel_state")? as u8;
        let slot_number = buf.read_field(2, "slot_number")? as u8 + 1;
        let frame_number = buf.read_field(5, "frame_number")? as u8;
        let power_class = buf.read_field(3, "power_class")? as u8;
        let power_control = buf.read_field(1, "power_control")? == 1;
        buf.read_field(1, "reserved")?;
        let frame_countdown = buf.read_field(2, "frame_countdown")? as u8;
        let priority = buf.read_field(2, "priority")? as u8;
        buf.read_field(6, "reserved")?;
        let dn = buf.read_field(4, "dn232_dn233")? as u8;
        let dt254 = buf.read_field(3, "dt254")? as u8;
        let dual_watch_sync = buf.read_field(1, "dual_watch_sync")? == 1;
        buf.read_field(5, "reserved")?;

        Ok(DpresSyncSchS {
            system_code,
            communication_type,
            m_dmo,
            two_frequency,
            repeater_operating_modes,
            uplink_spacing,
            ms_link,
            channel_usage,
            channel_state,
            slot_number,
            frame_number,
            power_class,
            power_control,
            frame_countdown,
            priority,
            dn232: dn >> 2,
            dn233: dn & 3,
            dt254,
            dual_watch_sync,
        })
    }

    pub fn to_bitbuf(&self, buf: &mut BitBuffer) {
        buf.write_bits(self.system_code as u64, 4);
        buf.write_bits(SyncPduType::DpresSync.into_raw(), 2);
        buf.write_bits(self.communication_type.into_raw(), 2);
        buf.write_bits(self.m_dmo as u64, 1);
        buf.write_zeroes(2);
        buf.write_bits(self.two_frequency as u64, 1);
        buf.write_bits(self.repeater_operating_modes as u64, 2);
        buf.write_bits(self.uplink_spacing as u64, 6);
        buf.write_bits((self.ms_link == DmLink::Slave) as u64, 1);
        buf.write_bits(self.channel_usage as u64, 2);
        buf.write_bits(self.channel_state as u64, 2);
        buf.write_bits(self.slot_number as u64 - 1, 2);
        buf.write_bits(self.frame_number as u64, 5);
        buf.write_bits(self.power_class as u64, 3);
        buf.write_bits(self.power_control as u64, 1);
        buf.write_zeroes(1);
        buf.write_bits(self.frame_countdown as u64, 2);
        buf.write_bits(self.priority as u64, 2);
        buf.write_zeroes(6);
        buf.write_bits((self.dn233 | (self.dn232 << 2)) as u64, 4);
        buf.write_bits(self.dt254 as u64, 3);
        buf.write_bits(self.dual_watch_sync as u64, 1);
        buf.write_zeroes(5);
    }

    /// Presence signal interval in multiframes
    pub fn presence_interval_multiframes(&self) -> u32 {
        PRESENCE_INTERVAL_MULTIFRAMES[(self.dt254 & 7) as usize]
    }
}

impl fmt::Display for DpresSyncSchS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DpresSyncSchS {{ sc: {}", self.system_code)?;
        write!(f, " comm: {}", self.communication_type)?;
        write!(f, " link: {}", self.ms_link)?;
        write!(f, " usage: {} state: {}", self.channel_usage, self.channel_state)?;
        write!(f, " tn: {} fn: {}", self.slot_number, self.frame_number)?;
        write!(f, " fc: {}", self.frame_countdown)?;
        write!(f, " dn232: {} dn233: {} dt254: {} }}", self.dn232, self.dn233, self.dt254)
    }
}

/// DPRES-SYNC, SCH/H part
/// Bits: 124
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpresSyncSchH {
    // 10
    pub repeater_address: u16,
    // 10
    pub mcc: u16,
    // 14
    pub mnc: u16,
    // 2, 3 means not restricted
    pub validity_time_unit: u8,
    // 6
    pub validity_time_count: u8,
    // 3
    pub max_dm_ms_power_class: u8,
    // 1 reserved
    // 4
    pub usage_restriction_type: u8,
    // 72
    pub urt_addressing: u128,
    // 2 reserved
}

impl DpresSyncSchH {
    pub fn from_bitbuf(buf: &mut BitBuffer) -> Result<Self, PduParseErr> {
        let repeater_address = buf.read_field(10, "repeater_address")? as u16;
        let mcc = buf.read_field(10, "mcc")? as u16;
        let mnc = buf.read_field(14, "mnc")? as u16;
        let validity_time_unit = buf.read_field(2, "validity_time_unit")? as u8;
        let validity_time_count = buf.read_field(6, "validity_time_count")? as u8;
        let max_dm_ms_power_class = buf.read_field(3, "max_dm_ms_power_class")? as u8;
        buf.read_field(1, "reserved")?;
        let usage_restriction_type = buf.read_field(4, "usage_restriction_type")? as u8;
        let urt_hi = buf.read_field(8, "urt_addressing")? as u128;
        let urt_lo = buf.read_field(64, "urt_addressing")? as u128;
        buf.read_field(2, "reserved")?;

        Ok(DpresSyncSchH {
            repeater_address,
            mcc,
            mnc,
            validity_time_unit,
            validity_time_count,
            max_dm_ms_power_class,
            usage_restriction_type,
            urt_addressing: (urt_hi << 64) | urt_lo,
        })
    }

    pub fn to_bitbuf(&self, buf: &mut BitBuffer) {
        buf.write_bits(self.repeater_address as u64, 10);
        buf.write_bits(self.mcc as u64, 10);
        buf.write_bits(self.mnc as u64, 14);
        buf.write_bits(self.validity_time_unit as u64, 2);
        buf.write_bits(self.validity_time_count as u64, 6);
        buf.write_bits(self.max_dm_ms_power_class as u64, 3);
        buf.write_zeroes(1);
        buf.write_bits(self.usage_restriction_type as u64, 4);
        buf.write_bits(((self.urt_addressing >> 64) & 0xff) as u64, 8);
        buf.write_bits(self.urt_addressing as u64, 64);
        buf.write_zeroes(2);
    }
}

impl fmt::Display for DpresSyncSchH {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DpresSyncSchH {{ rep: {}", self.repeater_address)?;
        write!(f, " mcc: {} mnc: {}", self.mcc, self.mnc)?;
        write!(f, " validity: {}/{}", self.validity_time_unit, self.validity_time_count)?;
        write!(f, " max_pc: {}", self.max_dm_ms_power_class)?;
        write!(f, " urt: {} }}", self.usage_restriction_type)
    }
}

/// A complete presence signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpresSync {
    pub schs: DpresSyncSchS,
    pub schh: DpresSyncSchH,
}

impl fmt::Display for DpresSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.schs, self.schh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dpres_schs_layout() {
        let schs = DpresSyncSchS {
            system_code: 13,
            communication_type: CommunicationType::ViaRepeater,
            m_dmo: false,
            two_frequency: false,
            repeater_operating_modes: 0,
            uplink_spacing: 0,
            ms_link: DmLink::Master,
            channel_usage: 0,
            channel_state: 0,
            slot_number: 3,
            frame_number: 9,
            power_class: 1,
            power_control: true,
            frame_countdown: 2,
            priority: 0,
            dn232: 1,
            dn233: 2,
            dt254: 2,
            dual_watch_sync: false,
        };
        let mut buf = BitBuffer::new(60);
        schs.to_bitbuf(&mut buf);
        assert_eq!(buf.get_pos(), 60);

        // Slot and frame sit right after the channel state
        assert_eq!(buf.peek_bits_at(25, 2), Some(2));
        assert_eq!(buf.peek_bits_at(27, 5), Some(9));
        // dn233 | dn232 << 2
        assert_eq!(buf.peek_bits_at(47, 4), Some(0b0110));

        buf.seek(0);
        let parsed = DpresSyncSchS::from_bitbuf(&mut buf).unwrap();
        assert_eq!(parsed, schs);
        assert_eq!(parsed.presence_interval_multiframes(), 5);
    }

    #[test]
    fn test_dpres_schh_urt_addressing() {
        let schh = DpresSyncSchH {
            repeater_address: 75,
            mcc: 204,
            mnc: 1337,
            validity_time_unit: 3,
            validity_time_count: 0,
            max_dm_ms_power_class: 1,
            usage_restriction_type: 0,
            urt_addressing: (0xa5u128 << 64) | 0x0123_4567_89ab_cdef,
        };
        let mut buf = BitBuffer::new(124);
        schh.to_bitbuf(&mut buf);
        assert_eq!(buf.get_pos(), 124);
        buf.seek(0);
        assert_eq!(DpresSyncSchH::from_bitbuf(&mut buf).unwrap(), schh);
    }

    #[test]
    fn test_gateway_presence_not_supported() {
        let mut buf = BitBuffer::new(60);
        buf.write_bits(13, 4);
        buf.write_bits(1, 2);
        buf.write_bits(3, 2);
        buf.seek(0);
        assert!(matches!(DpresSyncSchS::from_bitbuf(&mut buf), Err(PduParseErr::NotImplemented { .. })));
    }
}
