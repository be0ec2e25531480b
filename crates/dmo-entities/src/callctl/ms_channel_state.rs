use core::fmt;

use dmo_pdus::dmac::enums::dmo_message_type::DmoMessageType;

/// Channel state as seen by a listening mobile, tracked in monitor mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MsChannelState {
    #[default]
    IdleUnknown,
    IdleFree,
    IdleOccupied,
    IdleReserved,
}

impl MsChannelState {
    /// State implied by a received DMAC-SYNC message, if it implies one
    pub fn after_message(self, mt: DmoMessageType) -> MsChannelState {
        match mt {
            DmoMessageType::DmSetup
            | DmoMessageType::DmSetupPres
            | DmoMessageType::DmConnect
            | DmoMessageType::DmConnectAck
            | DmoMessageType::DmOccupied
            | DmoMessageType::DmSdsOccupied => MsChannelState::IdleOccupied,
            DmoMessageType::DmReserved | DmoMessageType::DmTxCeased => MsChannelState::IdleReserved,
            DmoMessageType::DmRelease => MsChannelState::IdleFree,
            _ => self,
        }
    }

    /// State announced by the channel state field of a presence signal
    pub fn from_presence_code(code: u8) -> MsChannelState {
        match code {
            1 => MsChannelState::IdleOccupied,
            2 => MsChannelState::IdleReserved,
            _ => MsChannelState::IdleFree,
        }
    }
}

impl fmt::Display for MsChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MsChannelState::IdleUnknown => "IDLE_UNKNOWN",
            MsChannelState::IdleFree => "IDLE_FREE",
            MsChannelState::IdleOccupied => "IDLE_OCCUPIED",
            MsChannelState::IdleReserved => "IDLE_RESERVED",
        };
        write!(f, "{}", s)
    }
}
