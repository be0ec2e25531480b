/// DM-SDU message types carried in DMAC-SYNC and DMAC-DATA
/// Bits: 5
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DmoMessageType {
    DmReserved = 0,
    DmSdsOccupied = 1,
    DmTimingRequest = 2,
    DmTimingAck = 3,
    DmSetup = 8,
    DmSetupPres = 9,
    DmConnect = 10,
    DmDisconnect = 11,
    DmConnectAck = 12,
    DmOccupied = 13,
    DmRelease = 14,
    DmTxCeased = 15,
    DmTxRequest = 16,
    DmTxAccept = 17,
    DmPreempt = 18,
    DmPreAccept = 19,
    DmReject = 20,
    DmInfo = 21,
    DmSdsUdata = 22,
    DmSdsData = 23,
    DmSdsAck = 24,
    GwSpecific = 25,
}

impl std::convert::TryFrom<u64> for DmoMessageType {
    type Error = ();
    fn try_from(x: u64) -> Result<Self, Self::Error> {
        match x {
            0 => Ok(DmoMessageType::DmReserved),
            1 => Ok(DmoMessageType::DmSdsOccupied),
            2 => Ok(DmoMessageType::DmTimingRequest),
            3 => Ok(DmoMessageType::DmTimingAck),
            8 => Ok(DmoMessageType::DmSetup),
            9 => Ok(DmoMessageType::DmSetupPres),
            10 => Ok(DmoMessageType::DmConnect),
            11 => Ok(DmoMessageType::DmDisconnect),
            12 => Ok(DmoMessageType::DmConnectAck),
            13 => Ok(DmoMessageType::DmOccupied),
            14 => Ok(DmoMessageType::DmRelease),
            15 => Ok(DmoMessageType::DmTxCeased),
            16 => Ok(DmoMessageType::DmTxRequest),
            17 => Ok(DmoMessageType::DmTxAccept),
            18 => Ok(DmoMessageType::DmPreempt),
            19 => Ok(DmoMessageType::DmPreAccept),
            20 => Ok(DmoMessageType::DmReject),
            21 => Ok(DmoMessageType::DmInfo),
            22 => Ok(DmoMessageType::DmSdsUdata),
            23 => Ok(DmoMessageType::DmSdsData),
            24 => Ok(DmoMessageType::DmSdsAck),
            25 => Ok(DmoMessageType::GwSpecific),
            _ => Err(()),
        }
    }
}

impl DmoMessageType {
    /// Convert this enum back into the raw integer value
    pub fn into_raw(self) -> u64 {
        self as u8 as u64
    }

    /// 30 and 31 are reserved for proprietary use, everything else not listed is reserved
    pub fn is_proprietary(raw: u64) -> bool {
        raw == 30 || raw == 31
    }
}

impl From<DmoMessageType> for u64 {
    fn from(e: DmoMessageType) -> Self {
        e.into_raw()
    }
}

impl core::fmt::Display for DmoMessageType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            DmoMessageType::DmReserved => "DM-RESERVED",
            DmoMessageType::DmSdsOccupied => "DM-SDS OCCUPIED",
            DmoMessageType::DmTimingRequest => "DM-TIMING REQUEST",
            DmoMessageType::DmTimingAck => "DM-TIMING ACK",
            DmoMessageType::DmSetup => "DM-SETUP",
            DmoMessageType::DmSetupPres => "DM-SETUP PRES",
            DmoMessageType::DmConnect => "DM-CONNECT",
            DmoMessageType::DmDisconnect => "DM-DISCONNECT",
            DmoMessageType::DmConnectAck => "DM-CONNECT ACK",
            DmoMessageType::DmOccupied => "DM-OCCUPIED",
            DmoMessageType::DmRelease => "DM-RELEASE",
            DmoMessageType::DmTxCeased => "DM-TX CEASED",
            DmoMessageType::DmTxRequest => "DM-TX REQUEST",
            DmoMessageType::DmTxAccept => "DM-TX ACCEPT",
            DmoMessageType::DmPreempt => "DM-PREEMPT",
            DmoMessageType::DmPreAccept => "DM-PRE ACCEPT",
            DmoMessageType::DmReject => "DM-REJECT",
            DmoMessageType::DmInfo => "DM-INFO",
            DmoMessageType::DmSdsUdata => "DM-SDS UDATA",
            DmoMessageType::DmSdsData => "DM-SDS DATA",
            DmoMessageType::DmSdsAck => "DM-SDS ACK",
            DmoMessageType::GwSpecific => "GW-SPECIFIC",
        };
        write!(f, "{}", s)
    }
}
