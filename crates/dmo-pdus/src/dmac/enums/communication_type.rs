/// Bits: 2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CommunicationType {
    /// Direct MS-MS
    #[default]
    Direct = 0,
    ViaRepeater = 1,
    ViaGateway = 2,
    ViaRepeaterGateway = 3,
}

impl std::convert::TryFrom<u64> for CommunicationType {
    type Error = ();
    fn try_from(x: u64) -> Result<Self, Self::Error> {
        match x {
            0 => Ok(CommunicationType::Direct),
            1 => Ok(CommunicationType::ViaRepeater),
            2 => Ok(CommunicationType::ViaGateway),
            3 => Ok(CommunicationType::ViaRepeaterGateway),
            _ => Err(()),
        }
    }
}

impl CommunicationType {
    pub fn into_raw(self) -> u64 {
        self as u8 as u64
    }

    /// The master/slave link flag is only present when a repeater is involved
    pub fn has_ms_link_flag(self) -> bool {
        matches!(self, CommunicationType::ViaRepeater | CommunicationType::ViaRepeaterGateway)
    }

    pub fn has_gateway_flag(self) -> bool {
        matches!(self, CommunicationType::ViaGateway | CommunicationType::ViaRepeaterGateway)
    }

    /// MNI is only carried for direct and repeater communication
    pub fn has_mni(self) -> bool {
        matches!(self, CommunicationType::Direct | CommunicationType::ViaRepeater)
    }
}

impl From<CommunicationType> for u64 {
    fn from(e: CommunicationType) -> Self {
        e.into_raw()
    }
}

impl core::fmt::Display for CommunicationType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CommunicationType::Direct => write!(f, "Direct"),
            CommunicationType::ViaRepeater => write!(f, "ViaRepeater"),
            CommunicationType::ViaGateway => write!(f, "ViaGateway"),
            CommunicationType::ViaRepeaterGateway => write!(f, "ViaRepeaterGateway"),
        }
    }
}
