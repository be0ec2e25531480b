/// Selects how SCH/H is interpreted
/// Bits: 2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SyncPduType {
    DmacSync = 0,
    DpresSync = 1,
}

impl std::convert::TryFrom<u64> for SyncPduType {
    type Error = ();
    fn try_from(x: u64) -> Result<Self, Self::Error> {
        match x {
            0 => Ok(SyncPduType::DmacSync),
            1 => Ok(SyncPduType::DpresSync),
            _ => Err(()),
        }
    }
}

impl SyncPduType {
    pub fn into_raw(self) -> u64 {
        self as u8 as u64
    }
}

impl From<SyncPduType> for u64 {
    fn from(e: SyncPduType) -> Self {
        e.into_raw()
    }
}

impl core::fmt::Display for SyncPduType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SyncPduType::DmacSync => write!(f, "DMAC-SYNC"),
            SyncPduType::DpresSync => write!(f, "DPRES-SYNC"),
        }
    }
}
