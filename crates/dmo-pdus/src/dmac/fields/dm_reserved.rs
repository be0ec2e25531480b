use core::fmt;

use dmo_core::{BitBuffer, PduParseErr};

/// Message-dependent elements of DM-RESERVED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DmReservedFields {
    // 1
    pub reservation_type: u8,
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
    // 3
    pub power_class: u8,
    // 1
    pub power_control: bool,
    // 2
    pub priority: u8,
    // 1
    pub dual_watch_sync: bool,
    // 1
    pub two_frequency_call: bool,
}

impl DmReservedFields {
    pub fn from_bitbuf(buf: &mut BitBuffer) -> Result<Self, PduParseErr> {
        let reservation_type = buf.read_field(1, "reservation_type")? as u8;
        let time_remaining = buf.read_field(6, "time_remaining")? as u8;
        let timing_flag = buf.read_field(1, "timing_flag")? == 1;
        let requests_flag = buf.read_field(1, "requests_flag")? == 1;
        let changeover_requests_flag = buf.read_field(1, "changeover_requests_flag")? == 1;
        let requests_bitmap = if requests_flag { Some(buf.read_field(8, "requests_bitmap")? as u8) } else { None };
        let power_class = buf.read_field(3, "power_class")? as u8;
        let power_control = buf.read_field(1, "power_control")? == 1;
        let priority = buf.read_field(2, "priority")? as u8;
        let dual_watch_sync = buf.read_field(1, "dual_watch_sync")? == 1;
        let two_frequency_call = buf.read_field(1, "two_frequency_call")? == 1;
        Ok(DmReservedFields {
            reservation_type,
            time_remaining,
            timing_flag,
            requests_flag,
            changeover_requests_flag,
            requests_bitmap,
            power_class,
            power_control,
            priority,
            dual_watch_sync,
            two_frequency_call,
        })
    }
}

impl fmt::Display for DmReservedFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DmReservedFields {{ type: {} remaining: {} timing: {} req: {:?} changeover: {} pc: {} prio: {} }}",
            self.reservation_type,
            self.time_remaining,
            self.timing_flag,
            self.requests_bitmap,
            self.changeover_requests_flag,
            self.power_class,
            self.priority
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_bitmap_optional() {
        // type 1, remaining 42, timing 0, requests 1, changeover 0, bitmap 0xa5, pc 2, pctl 1, prio 1, dw 0, 2f 1
        let bits = "11010100101010010101010101";
        let mut buf = BitBuffer::from_bitstr(bits).unwrap();
        let f = DmReservedFields::from_bitbuf(&mut buf).unwrap();
        assert_eq!(f.time_remaining, 42);
        assert_eq!(f.requests_bitmap, Some(0xa5));
        assert_eq!(f.power_class, 2);
        assert!(f.power_control);
        assert_eq!(f.priority, 1);
        assert!(f.two_frequency_call);
        assert_eq!(buf.get_len_remaining(), 0);
    }
}
