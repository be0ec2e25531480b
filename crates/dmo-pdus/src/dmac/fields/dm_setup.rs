use core::fmt;

use dmo_core::{BitBuffer, PduParseErr};

/// Message-dependent elements shared by DM-SETUP, DM-CONNECT ACK and DM-OCCUPIED,
/// followed by the first DM-SDU elements.
/// Bits: 24
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DmSetupFields {
    // 1
    pub timing_flag: bool,
    // 1
    pub lch_in_frame_3: bool,
    // 1
    pub pre_emption: bool,
    // 3
    pub power_class: u8,
    // 1
    pub power_control: bool,
    // 2 reserved
    // 1
    pub dual_watch_sync: bool,
    // 1
    pub two_frequency_call: bool,
    // 4
    pub circuit_mode_type: u8,
    // 4 reserved
    // 2
    pub priority: u8,
    // 1, DM-SDU
    pub end_to_end_encryption: bool,
    // 1, DM-SDU
    pub call_type: u8,
    // 1, DM-SDU
    pub external_source: bool,
}

impl DmSetupFields {
    pub const BITS: usize = 24;

    pub fn from_bitbuf(buf: &mut BitBuffer) -> Result<Self, PduParseErr> {
        let timing_flag = buf.read_field(1, "timing_flag")? == 1;
        let lch_in_frame_3 = buf.read_field(1, "lch_in_frame_3")? == 1;
        let pre_emption = buf.read_field(1, "pre_emption")? == 1;
        let power_class = buf.read_field(3, "power_class")? as u8;
        let power_control = buf.read_field(1, "power_control")? == 1;
        buf.read_field(2, "reserved")?;
        let dual_watch_sync = buf.read_field(1, "dual_watch_sync")? == 1;
        let two_frequency_call = buf.read_field(1, "two_frequency_call")? == 1;
        let circuit_mode_type = buf.read_field(4, "circuit_mode_type")? as u8;
        buf.read_field(4, "reserved")?;
        let priority = buf.read_field(2, "priority")? as u8;
        let end_to_end_encryption = buf.read_field(1, "end_to_end_encryption")? == 1;
        let call_type = buf.read_field(1, "call_type")? as u8;
        let external_source = buf.read_field(1, "external_source")? == 1;
        Ok(DmSetupFields {
            timing_flag,
            lch_in_frame_3,
            pre_emption,
            power_class,
            power_control,
            dual_watch_sync,
            two_frequency_call,
            circuit_mode_type,
            priority,
            end_to_end_encryption,
            call_type,
            external_source,
        })
    }

    pub fn to_bitbuf(&self, buf: &mut BitBuffer) {
        buf.write_bits(self.timing_flag as u64, 1);
        buf.write_bits(self.lch_in_frame_3 as u64, 1);
        buf.write_bits(self.pre_emption as u64, 1);
        buf.write_bits(self.power_class as u64, 3);
        buf.write_bits(self.power_control as u64, 1);
        buf.write_zeroes(2);
        buf.write_bits(self.dual_watch_sync as u64, 1);
        buf.write_bits(self.two_frequency_call as u64, 1);
        buf.write_bits(self.circuit_mode_type as u64, 4);
        buf.write_zeroes(4);
        buf.write_bits(self.priority as u64, 2);
        buf.write_bits(self.end_to_end_encryption as u64, 1);
        buf.write_bits(self.call_type as u64, 1);
        buf.write_bits(self.external_source as u64, 1);
    }
}

impl fmt::Display for DmSetupFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DmSetupFields {{ timing: {}", self.timing_flag)?;
        write!(f, " lch_fn3: {}", self.lch_in_frame_3)?;
        write!(f, " preempt: {}", self.pre_emption)?;
        write!(f, " pc: {} pctl: {}", self.power_class, self.power_control)?;
        write!(f, " dw: {} 2f: {}", self.dual_watch_sync, self.two_frequency_call)?;
        write!(f, " cmt: {}", self.circuit_mode_type)?;
        write!(f, " prio: {}", self.priority)?;
        write!(f, " e2e: {} call_type: {} ext: {} }}", self.end_to_end_encryption, self.call_type, self.external_source)
    }
}
