use core::fmt;

use dmo_core::{BitBuffer, PduParseErr};

use crate::dmac::enums::sync_pdu_type::SyncPduType;
use crate::dmac::pdus::dmac_sync::{DmacSync, DmacSyncSchH, DmacSyncSchS};
use crate::dmac::pdus::dpres_sync::{DpresSync, DpresSyncSchH, DpresSyncSchS};

/// One decoded SCH/S + SCH/H pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPdu {
    Dmac(DmacSync),
    Dpres(DpresSync),
}

/// Reads the sync PDU type from an SCH/S block without consuming it.
pub fn peek_sync_pdu_type(schs: &BitBuffer) -> Result<SyncPduType, PduParseErr> {
    let raw = schs.peek_bits_at(4, 2).ok_or(PduParseErr::BufferEnded { field: Some("sync_pdu_type") })?;
    SyncPduType::try_from(raw).map_err(|_| PduParseErr::InvalidValue { field: "sync_pdu_type", value: raw })
}

impl SyncPdu {
    /// SCH/S decides how SCH/H is interpreted, so it is always parsed first.
    pub fn from_blocks(schs: &mut BitBuffer, schh: &mut BitBuffer) -> Result<Self, PduParseErr> {
        match peek_sync_pdu_type(schs)? {
            SyncPduType::DmacSync => {
                let s = DmacSyncSchS::from_bitbuf(schs)?;
                let h = DmacSyncSchH::from_bitbuf(schh, s.communication_type)?;
                Ok(SyncPdu::Dmac(DmacSync { schs: s, schh: h }))
            }
            SyncPduType::DpresSync => {
                let s = DpresSyncSchS::from_bitbuf(schs)?;
                let h = DpresSyncSchH::from_bitbuf(schh)?;
                Ok(SyncPdu::Dpres(DpresSync { schs: s, schh: h }))
            }
        }
    }

    /// Returns the (SCH/S, SCH/H) type-1 blocks, 60 and 124 bits.
    pub fn to_blocks(&self) -> (BitBuffer, BitBuffer) {
        let mut schs = BitBuffer::new(60);
        let mut schh = BitBuffer::new(124);
        match self {
            SyncPdu::Dmac(p) => {
                p.schs.to_bitbuf(&mut schs);
                p.schh.to_bitbuf(&mut schh);
            }
            SyncPdu::Dpres(p) => {
                p.schs.to_bitbuf(&mut schs);
                p.schh.to_bitbuf(&mut schh);
            }
        }
        schs.seek(0);
        schh.seek(0);
        (schs, schh)
    }

    /// Slot (1..4) and frame (1..18) announced by the sender
    pub fn slot_and_frame(&self) -> (u8, u8) {
        match self {
            SyncPdu::Dmac(p) => (p.schs.slot_number, p.schs.frame_number),
            SyncPdu::Dpres(p) => (p.schs.slot_number, p.schs.frame_number),
        }
    }
}

impl fmt::Display for SyncPdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPdu::Dmac(p) => write!(f, "{}", p),
            SyncPdu::Dpres(p) => write!(f, "{}", p),
        }
    }
}
