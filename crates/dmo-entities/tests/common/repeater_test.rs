use dmo_config::{RepeaterConfig, SharedConfig, StackMode, TransportBackend};
use dmo_core::{BitBuffer, DmLink, DmoTime, LogicalChannel, SLOT_TIME_NS};
use dmo_entities::Repeater;
use dmo_entities::codec::TetraCodec;
use dmo_entities::phy::{BurstFactory, DmBurst, DmTrainingSequence, split_dm_burst};
use dmo_entities::transport::{RadioBurst, TxBurst};
use dmo_pdus::dmac::enums::address_type::{DmAddress, DmAddressType};
use dmo_pdus::dmac::enums::communication_type::CommunicationType;
use dmo_pdus::dmac::enums::dmo_message_type::DmoMessageType;
use dmo_pdus::dmac::fields::colour_code::SYNC_SCRAMBLING_CODE;
use dmo_pdus::dmac::pdus::dmac_sync::{DmacSync, DmacSyncSchH, DmacSyncSchS};
use dmo_pdus::dmac::pdus::sync_pdu::SyncPdu;

/// Creates a default config for testing. It can still be modified as needed
/// before passing it to the RepeaterTest constructor
pub fn default_test_config(stack_mode: StackMode) -> RepeaterConfig {
    let mut cfg = RepeaterConfig::new(stack_mode, 204, 1337);
    cfg.transport.backend = TransportBackend::None;
    cfg
}

/// A DM-MAC-SYNC as an MS on the master link would send it, stamped with `time`
pub fn dmac_sync(cfg: &RepeaterConfig, mt: DmoMessageType, frame_countdown: u8, time: DmoTime) -> SyncPdu {
    SyncPdu::Dmac(DmacSync {
        schs: DmacSyncSchS {
            system_code: cfg.repeater.system_code,
            communication_type: CommunicationType::ViaRepeater,
            ms_link: DmLink::Master,
            gateway_generated: false,
            ab_channel_usage: 0,
            slot_number: time.t,
            frame_number: time.f,
            encryption_state: 0,
            aie: None,
        },
        schh: DmacSyncSchH {
            repgw_address: cfg.repeater.address,
            fill_bit: false,
            fragmented: false,
            num_sch_f_slots: None,
            frame_countdown,
            dst: DmAddress::new(DmAddressType::TrueAddress, 1001),
            src: DmAddress::new(DmAddressType::TrueAddress, 2002),
            mni: Some(cfg.net.mni()),
            message_type: mt.into_raw() as u8,
            payload: BitBuffer::new(0),
        },
    })
}

/// Drives a Repeater on a synthetic clock, one slot at a time.
/// Everything it transmits is collected in `sent` for later inspection.
pub struct RepeaterTest {
    pub config: SharedConfig,
    pub repeater: Repeater,
    pub sent: Vec<TxBurst>,
    factory: BurstFactory,
    now_ns: u64,
}

impl RepeaterTest {
    pub fn new(config: RepeaterConfig) -> Self {
        let shared = SharedConfig::from_config(config).unwrap();
        Self {
            repeater: Repeater::new(shared.clone(), Box::new(TetraCodec)),
            config: shared,
            sent: vec![],
            factory: BurstFactory::new(Box::new(TetraCodec)),
            now_ns: 1_000_000_000,
        }
    }

    pub fn now_ns(&self) -> u64 {
        self.now_ns
    }

    /// Advances the clock by `n` slots, ticking the repeater at every slot boundary
    pub fn run_slots(&mut self, n: u32) {
        for _ in 0..n {
            self.now_ns += SLOT_TIME_NS;
            let out = self.repeater.tick(self.now_ns);
            self.sent.extend(out);
        }
    }

    /// Hands a sync PDU to the repeater as if received now
    pub fn rx_sync(&mut self, pdu: &SyncPdu) {
        let bits = self.factory.sync_burst(pdu).unwrap();
        self.rx_bits(bits, self.now_ns);
    }

    /// Hands a full slot traffic burst to the repeater as if received now
    pub fn rx_traffic(&mut self) {
        let blk1 = BitBuffer::from_bitarr(&[1u8; 216]);
        let blk2 = BitBuffer::from_bitarr(&[0u8; 216]);
        let bits = self.factory.normal_burst(DmTrainingSequence::Normal1, &blk1, &blk2).unwrap();
        self.rx_bits(bits, self.now_ns);
    }

    pub fn rx_bits(&mut self, bits: BitBuffer, ts_ns: u64) {
        self.repeater.rx_burst(&RadioBurst { bits, ts_ns });
    }

    pub fn take_sent(&mut self) -> Vec<TxBurst> {
        std::mem::take(&mut self.sent)
    }

    /// Decodes a transmitted slot back into its sync PDU
    pub fn decode_sync(&self, burst: &TxBurst) -> Option<SyncPdu> {
        let Some(DmBurst::Sync { sch_s, sch_h }) = split_dm_burst(&burst.bits) else {
            return None;
        };
        let codec = self.factory.codec();
        let (mut s, ok_s) = codec.decode(LogicalChannel::SchS, &sch_s, SYNC_SCRAMBLING_CODE).ok()?;
        let (mut h, ok_h) = codec.decode(LogicalChannel::SchH, &sch_h, SYNC_SCRAMBLING_CODE).ok()?;
        if !(ok_s && ok_h) {
            return None;
        }
        SyncPdu::from_blocks(&mut s, &mut h).ok()
    }
}
