use dmo_config::RepeaterConfig;
use dmo_core::{BitBuffer, DmLink, DmoTime, LogicalChannel};
use dmo_pdus::dmac::enums::communication_type::CommunicationType;
use dmo_pdus::dmac::fields::colour_code::SYNC_SCRAMBLING_CODE;
use dmo_pdus::dmac::pdus::dpres_sync::{DpresSync, DpresSyncSchH, DpresSyncSchS};
use dmo_pdus::dmac::pdus::sync_pdu::SyncPdu;

use crate::codec::{ChannelCodec, CodecError};

use super::dm_burst::{DM_BLK_BITS, DM_SCH_S_BITS, DmTrainingSequence, build_dm_normal_burst, build_dm_sync_burst};

/// Turns PDUs into DM bursts ready for framing.
pub struct BurstFactory {
    codec: Box<dyn ChannelCodec>,
}

fn to_array<const N: usize>(lchan: LogicalChannel, buf: &BitBuffer) -> Result<[u8; N], CodecError> {
    let v = buf.to_bitvec();
    let found = v.len();
    v.try_into().map_err(|_| CodecError::WrongLength { lchan, expected: N, found })
}

impl BurstFactory {
    pub fn new(codec: Box<dyn ChannelCodec>) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &dyn ChannelCodec {
        self.codec.as_ref()
    }

    /// Encodes a sync PDU into a 470-bit DM synchronisation burst.
    pub fn sync_burst(&self, pdu: &SyncPdu) -> Result<BitBuffer, CodecError> {
        let (schs, schh) = pdu.to_blocks();
        let sch_s = self.codec.encode(LogicalChannel::SchS, &schs, SYNC_SCRAMBLING_CODE)?;
        let sch_h = self.codec.encode(LogicalChannel::SchH, &schh, SYNC_SCRAMBLING_CODE)?;
        let burst = build_dm_sync_burst(
            &to_array::<DM_SCH_S_BITS>(LogicalChannel::SchS, &sch_s)?,
            &to_array::<DM_BLK_BITS>(LogicalChannel::SchH, &sch_h)?,
        );
        Ok(BitBuffer::from_bitarr(&burst))
    }

    /// Rebuilds a normal burst around two already coded and scrambled half-slot blocks.
    /// Returns None for the synchronisation training sequence or blocks of the wrong size.
    pub fn normal_burst(&self, train: DmTrainingSequence, blk1: &BitBuffer, blk2: &BitBuffer) -> Option<BitBuffer> {
        let b1 = to_array::<DM_BLK_BITS>(LogicalChannel::Stch, blk1).ok()?;
        let b2 = to_array::<DM_BLK_BITS>(LogicalChannel::Stch, blk2).ok()?;
        let burst = build_dm_normal_burst(train, &b1, &b2)?;
        Some(BitBuffer::from_bitarr(&burst))
    }
}

/// Presence signal announcing this repeater, for transmission at `target`.
pub fn presence_signal(cfg: &RepeaterConfig, channel_state: u8, target: DmoTime, frame_countdown: u8) -> SyncPdu {
    let r = &cfg.repeater;
    SyncPdu::Dpres(DpresSync {
        schs: DpresSyncSchS {
            system_code: r.system_code,
            communication_type: CommunicationType::ViaRepeater,
            m_dmo: false,
            two_frequency: false,
            repeater_operating_modes: 0,
            uplink_spacing: 0,
            ms_link: DmLink::Master,
            channel_usage: 0,
            channel_state,
            slot_number: target.t,
            frame_number: target.f,
            power_class: 1,
            power_control: true,
            frame_countdown,
            priority: 0,
            dn232: r.dn232,
            dn233: r.dn233,
            dt254: r.dt254,
            dual_watch_sync: false,
        },
        schh: DpresSyncSchH {
            repeater_address: r.address,
            mcc: cfg.net.mcc,
            mnc: cfg.net.mnc,
            validity_time_unit: 3,
            validity_time_count: 0,
            max_dm_ms_power_class: r.max_dm_ms_power_class,
            usage_restriction_type: 0,
            urt_addressing: 0,
        },
    })
}
