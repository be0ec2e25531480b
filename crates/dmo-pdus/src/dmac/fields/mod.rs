pub mod colour_code;
pub mod dm_reserved;
pub mod dm_sds;
pub mod dm_setup;
pub mod dm_tx_ceased;

use core::fmt;

use dmo_core::{BitBuffer, PduParseErr};

use crate::dmac::enums::dmo_message_type::DmoMessageType;
use dm_reserved::DmReservedFields;
use dm_sds::DmSdsFields;
use dm_setup::DmSetupFields;
use dm_tx_ceased::DmTxCeasedFields;

/// Message-dependent elements of a completed DM message, by message type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DmMessageFields {
    Setup(DmSetupFields),
    Reserved(DmReservedFields),
    TxCeased(DmTxCeasedFields),
    Sds(DmSdsFields),
    /// Layout not interpreted by the repeater
    Opaque,
}

impl DmMessageFields {
    /// Parses the elements following the message type field.
    pub fn parse(message_type: DmoMessageType, buf: &mut BitBuffer) -> Result<Self, PduParseErr> {
        match message_type {
            DmoMessageType::DmSetup | DmoMessageType::DmConnectAck | DmoMessageType::DmOccupied => {
                Ok(DmMessageFields::Setup(DmSetupFields::from_bitbuf(buf)?))
            }
            DmoMessageType::DmReserved => Ok(DmMessageFields::Reserved(DmReservedFields::from_bitbuf(buf)?)),
            DmoMessageType::DmTxCeased => Ok(DmMessageFields::TxCeased(DmTxCeasedFields::from_bitbuf(buf)?)),
            DmoMessageType::DmSdsUdata | DmoMessageType::DmSdsData => Ok(DmMessageFields::Sds(DmSdsFields::from_bitbuf(buf)?)),
            _ => Ok(DmMessageFields::Opaque),
        }
    }
}

impl fmt::Display for DmMessageFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DmMessageFields::Setup(x) => write!(f, "{}", x),
            DmMessageFields::Reserved(x) => write!(f, "{}", x),
            DmMessageFields::TxCeased(x) => write!(f, "{}", x),
            DmMessageFields::Sds(x) => write!(f, "{}", x),
            DmMessageFields::Opaque => write!(f, "-"),
        }
    }
}
