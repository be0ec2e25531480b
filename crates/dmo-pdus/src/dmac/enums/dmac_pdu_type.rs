/// DM-MAC PDU type, first field of SCH/F and STCH blocks
/// Bits: 2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DmacPduType {
    DmacData = 0,
    /// DMAC-FRAG or DMAC-END, selected by the following subtype bit
    DmacFragEnd = 1,
    Reserved = 2,
    DmacUSignal = 3,
}

impl std::convert::TryFrom<u64> for DmacPduType {
    type Error = ();
    fn try_from(x: u64) -> Result<Self, Self::Error> {
        match x {
            0 => Ok(DmacPduType::DmacData),
            1 => Ok(DmacPduType::DmacFragEnd),
            2 => Ok(DmacPduType::Reserved),
            3 => Ok(DmacPduType::DmacUSignal),
            _ => Err(()),
        }
    }
}

impl DmacPduType {
    /// Convert this enum back into the raw integer value
    pub fn into_raw(self) -> u64 {
        self as u8 as u64
    }
}

impl From<DmacPduType> for u64 {
    fn from(e: DmacPduType) -> Self {
        e.into_raw()
    }
}

impl core::fmt::Display for DmacPduType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DmacPduType::DmacData => write!(f, "DMAC-DATA"),
            DmacPduType::DmacFragEnd => write!(f, "DMAC-FRAG/END"),
            DmacPduType::Reserved => write!(f, "Reserved"),
            DmacPduType::DmacUSignal => write!(f, "DMAC-U-SIGNAL"),
        }
    }
}
