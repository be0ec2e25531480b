/// Address type preceding each DM address
/// Bits: 2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DmAddressType {
    #[default]
    TrueAddress = 0,
    PseudoAddress = 1,
    /// No 24-bit address follows
    NotPresent = 2,
    Ussi = 3,
}

impl std::convert::TryFrom<u64> for DmAddressType {
    type Error = ();
    fn try_from(x: u64) -> Result<Self, Self::Error> {
        match x {
            0 => Ok(DmAddressType::TrueAddress),
            1 => Ok(DmAddressType::PseudoAddress),
            2 => Ok(DmAddressType::NotPresent),
            3 => Ok(DmAddressType::Ussi),
            _ => Err(()),
        }
    }
}

impl DmAddressType {
    pub fn into_raw(self) -> u64 {
        self as u8 as u64
    }

    pub fn has_address(self) -> bool {
        self != DmAddressType::NotPresent
    }
}

impl From<DmAddressType> for u64 {
    fn from(e: DmAddressType) -> Self {
        e.into_raw()
    }
}

impl core::fmt::Display for DmAddressType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DmAddressType::TrueAddress => write!(f, "True"),
            DmAddressType::PseudoAddress => write!(f, "Pseudo"),
            DmAddressType::NotPresent => write!(f, "None"),
            DmAddressType::Ussi => write!(f, "USSI"),
        }
    }
}

/// A 2-bit type followed by an optional 24-bit address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DmAddress {
    pub addr_type: DmAddressType,
    /// 24 bits, 0 if not present
    pub ssi: u32,
}

impl DmAddress {
    pub fn new(addr_type: DmAddressType, ssi: u32) -> Self {
        DmAddress { addr_type, ssi }
    }

    pub fn from_bitbuf(buf: &mut dmo_core::BitBuffer, field: &'static str) -> Result<Self, dmo_core::PduParseErr> {
        let raw_type = buf.read_field(2, field)?;
        // All four values are defined, this cannot fail
        let addr_type = DmAddressType::try_from(raw_type).unwrap_or(DmAddressType::NotPresent);
        let ssi = if addr_type.has_address() { buf.read_field(24, field)? as u32 } else { 0 };
        Ok(DmAddress { addr_type, ssi })
    }

    pub fn to_bitbuf(&self, buf: &mut dmo_core::BitBuffer) {
        buf.write_bits(self.addr_type.into_raw(), 2);
        if self.addr_type.has_address() {
            buf.write_bits(self.ssi as u64 & 0xffffff, 24);
        }
    }
}

impl core::fmt::Display for DmAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.addr_type.has_address() {
            write!(f, "{}:{}", self.addr_type, self.ssi)
        } else {
            write!(f, "-")
        }
    }
}
