use core::fmt;

use dmo_core::{BitBuffer, PduParseErr};

/// Message-dependent elements of DM-TX CEASED, plus the cease cause from the DM-SDU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DmTxCeasedFields {
    // 6
    pub time_remaining: u8,
    // 1
    pub timing_flag: bool,
    // 1
    pub requests_flag: bool,
    // 1
    pub changeover_requests_flag: bool,
    // 8, present if requests_flag
    pub requests_bitmap: Option<u8>,
    // 1
    pub recent_user_priority: bool,
    // 1
    pub timing_change_announced: bool,
    // 12, present if timing_change_announced
    pub timing_adjustment: Option<u16>,
    // 2
    pub priority: u8,
    // 4
    pub cease_cause: u8,
}

impl DmTxCeasedFields {
    pub fn from_bitbuf(buf: &mut BitBuffer) -> Result<Self, PduParseErr> {
        let time_remaining = buf.read_field(6, "time_remaining")? as u8;
        let timing_flag = buf.read_field(1, "timing_flag")? == 1;
        let requests_flag = buf.read_field(1, "requests_flag")? == 1;
        let changeover_requests_flag = buf.read_field(1, "changeover_requests_flag")? == 1;
        let requests_bitmap = if requests_flag { Some(buf.read_field(8, "requests_bitmap")? as u8) } else { None };
        let recent_user_priority = buf.read_field(1, "recent_user_priority")? == 1;
        let timing_change_announced = buf.read_field(1, "timing_change_announced")? == 1;
        let timing_adjustment = if timing_change_announced { Some(buf.read_field(12, "timing_adjustment")? as u16) } else { None };
        let priority = buf.read_field(2, "priority")? as u8;
        let cease_cause = buf.read_field(4, "cease_cause")? as u8;
        Ok(DmTxCeasedFields {
            time_remaining,
            timing_flag,
            requests_flag,
            changeover_requests_flag,
            requests_bitmap,
            recent_user_priority,
            timing_change_announced,
            timing_adjustment,
            priority,
            cease_cause,
        })
    }
}

impl fmt::Display for DmTxCeasedFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DmTxCeasedFields {{ remaining: {}", self.time_remaining)?;
        write!(f, " timing: {}", self.timing_flag)?;
        write!(f, " req: {:?}", self.requests_bitmap)?;
        write!(f, " adj: {:?}", self.timing_adjustment)?;
        write!(f, " prio: {} cause: {} }}", self.priority, self.cease_cause)
    }
}
