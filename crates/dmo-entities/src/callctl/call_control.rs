use std::collections::HashSet;

use dmo_config::{SharedConfig, StackMode};
use dmo_core::{BitBuffer, DmLink, DmoTime, FRAMES_PER_MULTIFRAME, LogicalChannel, SLOTS_PER_FRAME};
use dmo_pdus::dmac::enums::communication_type::CommunicationType;
use dmo_pdus::dmac::enums::dmac_pdu_type::DmacPduType;
use dmo_pdus::dmac::enums::dmo_message_type::DmoMessageType;
use dmo_pdus::dmac::fields::DmMessageFields;
use dmo_pdus::dmac::fields::colour_code::dm_scrambling_code;
use dmo_pdus::dmac::pdus::dmac_data::DmacData;
use dmo_pdus::dmac::pdus::dmac_frag_end::DmacFragEnd;
use dmo_pdus::dmac::pdus::dmac_sync::DmacSync;
use dmo_pdus::dmac::pdus::dpres_sync::DpresSync;
use dmo_pdus::dmac::pdus::sync_pdu::SyncPdu;

use crate::defrag::{FragError, FragReassembler};
use crate::phy::{BurstFactory, DmTrainingSequence};
use crate::sched::{RepeaterChannelState, SlotScheduler};

use super::ms_channel_state::MsChannelState;

/// How a message type is repeated on the slave link
#[derive(Debug, Clone, Copy)]
enum RelayPattern {
    /// One burst per remaining countdown step, on each of these slots
    Countdown(&'static [u8]),
    /// A single burst with countdown 0
    Once,
}

fn relay_pattern(mt: DmoMessageType) -> Option<RelayPattern> {
    match mt {
        DmoMessageType::DmSetup | DmoMessageType::DmSetupPres => Some(RelayPattern::Countdown(&[1])),
        DmoMessageType::DmConnect => Some(RelayPattern::Countdown(&[1, 3])),
        DmoMessageType::DmOccupied | DmoMessageType::DmRelease | DmoMessageType::DmReserved => Some(RelayPattern::Once),
        _ => None,
    }
}

/// Frame (1..18) of the `i`-th relay of a message received in `frame` with `countdown`.
/// The first relay goes out in the frame after the sender's own repetitions end.
pub fn relay_frame(frame: u8, countdown: u8, i: u8) -> u8 {
    ((frame as u32 - 1 + countdown as u32 + 1 + i as u32) % FRAMES_PER_MULTIFRAME + 1) as u8
}

/// Result of handling one sync burst
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Number of relay bursts put into the scheduler
    pub relayed: usize,
    /// Set when the sender's slot numbering differs from ours
    pub resync: Option<DmoTime>,
}

/// Result of handling one normal burst
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalOutcome {
    pub relayed: bool,
    /// Signalling block with a bad CRC while no call was active
    pub decode_failed: bool,
}

/// DMO call control. Consumes decoded sync PDUs and normal bursts, keeps the
/// channel state in the scheduler up to date and schedules the relayed bursts.
pub struct CallControl {
    config: SharedConfig,
    factory: BurstFactory,

    /// Message types already relayed and still being repeated by their sender
    processed: HashSet<DmoMessageType>,
    /// Last DMAC-SYNC received
    current: Option<DmacSync>,
    /// Scrambling for SCH/F and STCH, derived from the last DMAC-SYNC
    scrambling_code: u32,

    reassembler: FragReassembler,
    ms_state: MsChannelState,
}

impl CallControl {
    pub fn new(config: SharedConfig, factory: BurstFactory) -> Self {
        let frag_timeout = config.config().repeater.frag_timeout_slots;
        Self {
            config,
            factory,
            processed: HashSet::new(),
            current: None,
            scrambling_code: dm_scrambling_code(0),
            reassembler: FragReassembler::new(frag_timeout),
            ms_state: MsChannelState::IdleUnknown,
        }
    }

    pub fn factory(&self) -> &BurstFactory {
        &self.factory
    }

    pub fn ms_channel_state(&self) -> MsChannelState {
        self.ms_state
    }

    pub fn current_sync(&self) -> Option<&DmacSync> {
        self.current.as_ref()
    }

    pub fn is_processed(&self, mt: DmoMessageType) -> bool {
        self.processed.contains(&mt)
    }

    pub fn reassembler(&self) -> &FragReassembler {
        &self.reassembler
    }

    /// Called once per TX slot
    pub fn tick(&mut self) {
        if self.reassembler.tick() {
            self.count_fragment_error();
        }
    }

    /// Handles a decoded SCH/S + SCH/H pair received in slot `time`.
    pub fn rx_sync(&mut self, time: DmoTime, pdu: SyncPdu, sched: &mut SlotScheduler) -> SyncOutcome {
        match pdu {
            SyncPdu::Dmac(p) => self.rx_dmac_sync(time, p, sched),
            SyncPdu::Dpres(p) => {
                self.rx_dpres_sync(time, &p);
                SyncOutcome::default()
            }
        }
    }

    fn rx_dpres_sync(&mut self, time: DmoTime, pdu: &DpresSync) {
        let cfg = self.config.config();
        if pdu.schh.repeater_address == cfg.repeater.address {
            tracing::debug!(ts=%time, "presence signal with our own address");
            return;
        }
        tracing::debug!(ts=%time, "presence signal from repeater {}, channel state {}", pdu.schh.repeater_address, pdu.schs.channel_state);
        if cfg.stack_mode == StackMode::Monitor {
            self.set_ms_state(time, MsChannelState::from_presence_code(pdu.schs.channel_state));
        }
    }

    fn rx_dmac_sync(&mut self, time: DmoTime, pdu: DmacSync, sched: &mut SlotScheduler) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();
        let (t, f) = (pdu.schs.slot_number, pdu.schs.frame_number);
        if !(1..=FRAMES_PER_MULTIFRAME as u8).contains(&f) {
            tracing::warn!(ts=%time, "invalid frame number {} in {}", f, pdu);
            return outcome;
        }
        if !(1..=SLOTS_PER_FRAME as u8).contains(&t) {
            tracing::warn!(ts=%time, "invalid slot number {} in {}", t, pdu);
            return outcome;
        }
        let claimed = DmoTime { f, t, link: pdu.schs.ms_link, ..time };
        let claimed_idx = claimed.slot_index();
        if claimed_idx != time.with_link(DmLink::Master).slot_index() {
            // Resync works on master link slots
            let target = DmoTime { f: 1, t: 1, link: DmLink::Master, ..time }.add_timeslots(claimed_idx as i32);
            tracing::info!(ts=%time, "time warp: sender is at {}, master {}", claimed, target);
            outcome.resync = Some(target);
        }
        tracing::debug!(ts=%time, "rx {}", pdu);

        self.scrambling_code = dm_scrambling_code(pdu.colour_code());

        let mt = match pdu.schh.message_type() {
            Ok(mt) => mt,
            Err(raw) => {
                if DmoMessageType::is_proprietary(raw as u64) {
                    tracing::warn!(ts=%time, "proprietary message type {}, ignoring", raw);
                } else {
                    tracing::warn!(ts=%time, "reserved message type {}, ignoring", raw);
                }
                self.current = Some(pdu);
                return outcome;
            }
        };

        let first_sight = !self.processed.contains(&mt);
        if first_sight {
            let mut payload = pdu.schh.payload.clone();
            payload.seek(0);
            if pdu.schh.fragmented {
                if self.reassembler.start(&mut payload).is_err() {
                    self.count_fragment_error();
                }
            } else if payload.get_len() > 0 {
                match DmMessageFields::parse(mt, &mut payload) {
                    Ok(fields) => tracing::debug!(ts=%time, "{}: {}", mt, fields),
                    Err(e) => tracing::debug!(ts=%time, "{}: could not parse fields: {:?}", mt, e),
                }
            }
        }

        match self.config.config().stack_mode {
            StackMode::Monitor => {
                self.mark_processed(mt, pdu.schh.frame_countdown);
                let next = self.ms_state.after_message(mt);
                self.set_ms_state(time, next);
            }
            StackMode::Repeater if pdu.schs.ms_link == DmLink::Slave => {
                tracing::debug!(ts=%time, "{} on slave link from repeater {}, not relaying", mt, pdu.schh.repgw_address);
            }
            StackMode::Repeater => {
                outcome.relayed = self.repeater_transition(time, &pdu, mt, first_sight, sched);
            }
        }
        self.current = Some(pdu);
        outcome
    }

    /// Remembers `mt` while its sender is still counting down, forgets it on countdown 0
    fn mark_processed(&mut self, mt: DmoMessageType, countdown: u8) {
        if countdown == 0 {
            self.processed.remove(&mt);
        } else {
            self.processed.insert(mt);
        }
    }

    /// Repeater side channel state machine. Returns the number of relay bursts scheduled.
    /// Only messages that pass the address and state checks touch the processed set.
    fn repeater_transition(&mut self, time: DmoTime, pdu: &DmacSync, mt: DmoMessageType, first_sight: bool, sched: &mut SlotScheduler) -> usize {
        let state = sched.channel_state();
        let countdown = pdu.schh.frame_countdown;
        let mut relayed = 0;

        match mt {
            DmoMessageType::DmSetup | DmoMessageType::DmSetupPres => {
                let address = self.config.config().repeater.address;
                if pdu.schh.repgw_address != address {
                    tracing::debug!(ts=%time, "{} for repeater {}, not us", mt, pdu.schh.repgw_address);
                    return 0;
                }
                if first_sight {
                    relayed = self.relay(time, pdu, mt, sched);
                    // A new transmission also ends a reservation
                    if countdown > 0 && state != RepeaterChannelState::ActiveOccupied {
                        sched.set_channel_state(RepeaterChannelState::ActiveOccupied);
                    }
                }
                if state.is_active() {
                    sched.touch();
                }
            }
            DmoMessageType::DmConnect => {
                if first_sight {
                    relayed = self.relay(time, pdu, mt, sched);
                }
                if state.is_active() {
                    sched.touch();
                } else {
                    sched.set_channel_state(RepeaterChannelState::ActiveOccupied);
                }
            }
            DmoMessageType::DmOccupied => {
                if !state.is_active() {
                    tracing::debug!(ts=%time, "{} while {}, ignoring", mt, state);
                    return 0;
                }
                sched.touch();
                if first_sight {
                    relayed = self.relay(time, pdu, mt, sched);
                }
            }
            DmoMessageType::DmRelease => {
                if !state.is_active() {
                    tracing::debug!(ts=%time, "{} while {}, ignoring", mt, state);
                    return 0;
                }
                if first_sight {
                    relayed = self.relay(time, pdu, mt, sched);
                }
                sched.set_channel_state(RepeaterChannelState::IdleFree);
            }
            DmoMessageType::DmReserved => {
                if !state.is_active() {
                    tracing::debug!(ts=%time, "{} while {}, ignoring", mt, state);
                    return 0;
                }
                if first_sight {
                    relayed = self.relay(time, pdu, mt, sched);
                }
                sched.set_channel_state(RepeaterChannelState::ActiveReserved);
            }
            _ => {
                tracing::debug!(ts=%time, "{} not handled in {}", mt, state);
            }
        }
        self.mark_processed(mt, countdown);
        relayed
    }

    /// Schedules the slave link copies of `pdu`. Returns the number of bursts scheduled.
    fn relay(&self, time: DmoTime, pdu: &DmacSync, mt: DmoMessageType, sched: &mut SlotScheduler) -> usize {
        let Some(pattern) = relay_pattern(mt) else {
            return 0;
        };
        let cfg = self.config.config();
        let k = pdu.schh.frame_countdown;
        let (runs, slots): (u8, &[u8]) = match pattern {
            RelayPattern::Countdown(slots) => (k + 1, slots),
            RelayPattern::Once => (1, &[1]),
        };

        let mut scheduled = 0;
        for i in 0..runs {
            let dest_f = relay_frame(pdu.schs.frame_number, k, i);
            let countdown = match pattern {
                RelayPattern::Countdown(_) => k - i,
                RelayPattern::Once => 0,
            };
            for &t in slots {
                let dest = DmoTime { f: dest_f, t, link: DmLink::Slave, ..time };

                let mut out = pdu.clone();
                out.schs.communication_type = CommunicationType::ViaRepeater;
                out.schs.ms_link = DmLink::Slave;
                out.schs.gateway_generated = false;
                out.schs.slot_number = t;
                out.schs.frame_number = dest_f;
                out.schh.repgw_address = cfg.repeater.address;
                out.schh.frame_countdown = countdown;
                if out.schh.mni.is_none() {
                    out.schh.mni = Some(cfg.net.mni());
                }

                match self.factory.sync_burst(&SyncPdu::Dmac(out)) {
                    Ok(burst) => {
                        sched.schedule(dest, burst, 0);
                        scheduled += 1;
                    }
                    Err(e) => tracing::warn!(ts=%time, "could not build relay burst for {}: {}", dest, e),
                }
            }
        }
        tracing::info!(ts=%time, "relaying {} fc {} as {} bursts from frame {}", mt, k, scheduled, relay_frame(pdu.schs.frame_number, k, 0));
        scheduled
    }

    /// Handles the two blocks of a received normal burst.
    pub fn rx_normal(&mut self, time: DmoTime, train: DmTrainingSequence, blk1: &BitBuffer, blk2: &BitBuffer, sched: &mut SlotScheduler) -> NormalOutcome {
        let mut outcome = NormalOutcome::default();
        let repeater = self.config.config().stack_mode == StackMode::Repeater;
        let in_call = if repeater {
            sched.channel_state().is_active()
        } else {
            self.ms_state == MsChannelState::IdleOccupied
        };

        if repeater && sched.channel_state() == RepeaterChannelState::ActiveOccupied {
            if let Some(burst) = self.factory.normal_burst(train, blk1, blk2) {
                tracing::trace!(ts=%time, "relaying {:?} burst", train);
                sched.schedule(time.with_link(DmLink::Slave), burst, 0);
                sched.touch();
                outcome.relayed = true;
            }
        }

        match train {
            DmTrainingSequence::Normal1 => {
                let mut bits = blk1.to_bitvec();
                bits.extend(blk2.to_bitvec());
                let full = BitBuffer::from_bitarr(&bits);
                match self.decode_signalling(LogicalChannel::SchF, &full) {
                    Some(block) => self.rx_dmac_block(time, block),
                    // Full slot traffic carries no CRC
                    None if !in_call => outcome.decode_failed = true,
                    None => {}
                }
            }
            DmTrainingSequence::Normal2 => {
                match self.decode_signalling(LogicalChannel::Stch, blk1) {
                    Some(block) => self.rx_dmac_block(time, block),
                    None => outcome.decode_failed = !in_call,
                }
                // Second half is either STCH or half a slot of traffic
                if let Some(block) = self.decode_signalling(LogicalChannel::Stch, blk2) {
                    self.rx_dmac_block(time, block);
                }
            }
            DmTrainingSequence::Sync => {}
        }
        outcome
    }

    fn decode_signalling(&self, lchan: LogicalChannel, block: &BitBuffer) -> Option<BitBuffer> {
        match self.factory.codec().decode(lchan, block, self.scrambling_code) {
            Ok((type1, true)) => Some(type1),
            Ok((_, false)) => None,
            Err(e) => {
                tracing::debug!("{} decode error: {}", lchan, e);
                None
            }
        }
    }

    /// Handles one CRC-valid SCH/F or STCH block
    fn rx_dmac_block(&mut self, time: DmoTime, mut block: BitBuffer) {
        let Some(raw) = block.peek_bits(2) else {
            return;
        };
        let Ok(pdu_type) = DmacPduType::try_from(raw) else {
            return;
        };
        match pdu_type {
            DmacPduType::DmacData => match DmacData::from_bitbuf(&mut block) {
                Ok(pdu) if pdu.null_pdu => tracing::trace!(ts=%time, "null pdu"),
                Ok(pdu) => {
                    tracing::debug!(ts=%time, "rx {}", pdu);
                    if pdu.fragmented && self.reassembler.start(&mut block).is_err() {
                        self.count_fragment_error();
                    }
                }
                Err(e) => tracing::warn!(ts=%time, "DMAC-DATA parse error: {:?}", e),
            },
            DmacPduType::DmacFragEnd => match DmacFragEnd::from_bitbuf(&mut block) {
                Ok(hdr) => self.rx_frag_end(time, hdr, &mut block),
                Err(e) => tracing::warn!(ts=%time, "DMAC-FRAG parse error: {:?}", e),
            },
            DmacPduType::DmacUSignal | DmacPduType::Reserved => {
                tracing::debug!(ts=%time, "{:?} not handled", pdu_type);
            }
        }
    }

    fn rx_frag_end(&mut self, time: DmoTime, hdr: DmacFragEnd, block: &mut BitBuffer) {
        tracing::debug!(ts=%time, "rx {}", hdr);
        let result = self.reassembler.append(block, hdr.fill_bit).and_then(|_| {
            if hdr.is_end { self.reassembler.finish().map(Some) } else { Ok(None) }
        });
        match result {
            Ok(Some(msg)) => {
                tracing::info!(ts=%time, "reassembled message of {} bits", msg.get_len());
                if let Some(mut s) = self.config.try_state_write() {
                    s.fragments_completed += 1;
                }
            }
            Ok(None) => {}
            Err(e) => {
                // An END without START is still an END
                let e = match (e, hdr.is_end) {
                    (FragError::FragWithoutStart, true) => FragError::EndWithoutStart,
                    (e, _) => e,
                };
                tracing::warn!(ts=%time, "reassembly error: {}", e);
                self.count_fragment_error();
            }
        }
    }

    fn count_fragment_error(&self) {
        if let Some(mut s) = self.config.try_state_write() {
            s.fragment_errors += 1;
        }
    }

    fn set_ms_state(&mut self, time: DmoTime, new: MsChannelState) {
        if new != self.ms_state {
            tracing::info!(ts=%time, "channel state {} -> {}", self.ms_state, new);
            self.ms_state = new;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::TetraCodec;
    use crate::phy::{DmBurst, split_dm_burst};
    use dmo_config::{CfgRepeater, RepeaterConfig};
    use dmo_core::debug;
    use dmo_pdus::dmac::enums::address_type::{DmAddress, DmAddressType};
    use dmo_pdus::dmac::fields::colour_code::SYNC_SCRAMBLING_CODE;
    use dmo_pdus::dmac::pdus::dmac_sync::{DmacSyncSchH, DmacSyncSchS};

    fn setup(mode: StackMode) -> (CallControl, SlotScheduler) {
        let cfg = RepeaterConfig::new(mode, 204, 1337);
        let sched = SlotScheduler::new(&cfg.repeater);
        let shared = SharedConfig::from_config(cfg).unwrap();
        (CallControl::new(shared, BurstFactory::new(Box::new(TetraCodec))), sched)
    }

    fn dmac_sync(mt: DmoMessageType, fc: u8, time: DmoTime) -> SyncPdu {
        SyncPdu::Dmac(DmacSync {
            schs: DmacSyncSchS {
                system_code: 13,
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
                repgw_address: CfgRepeater::default().address,
                fill_bit: false,
                fragmented: false,
                num_sch_f_slots: None,
                frame_countdown: fc,
                dst: DmAddress::new(DmAddressType::TrueAddress, 1001),
                src: DmAddress::new(DmAddressType::TrueAddress, 2002),
                mni: Some((204 << 14) | 1337),
                message_type: mt.into_raw() as u8,
                payload: BitBuffer::new(0),
            },
        })
    }

    /// Pulls every scheduled burst out of the ring and decodes it
    fn drain(sched: &mut SlotScheduler, cc: &CallControl) -> Vec<(usize, DmacSync)> {
        let mut out = vec![];
        let mut t = DmoTime::default();
        for _ in 0..72 {
            if let crate::sched::SlotContent::Burst(b) = sched.take(t) {
                let Some(DmBurst::Sync { sch_s, sch_h }) = split_dm_burst(&b) else { panic!("not a sync burst") };
                let (mut s, _) = cc.factory().codec().decode(LogicalChannel::SchS, &sch_s, SYNC_SCRAMBLING_CODE).unwrap();
                let (mut h, _) = cc.factory().codec().decode(LogicalChannel::SchH, &sch_h, SYNC_SCRAMBLING_CODE).unwrap();
                let SyncPdu::Dmac(p) = SyncPdu::from_blocks(&mut s, &mut h).unwrap() else { panic!() };
                out.push((t.slot_index(), p));
            }
            t = t.add_timeslots(1);
        }
        out
    }

    #[test]
    fn test_relay_frame() {
        assert_eq!(relay_frame(1, 0, 0), 2);
        assert_eq!(relay_frame(5, 3, 0), 9);
        assert_eq!(relay_frame(5, 3, 3), 12);
        assert_eq!(relay_frame(17, 2, 0), 2);
        assert_eq!(relay_frame(18, 0, 0), 1);
    }

    #[test]
    fn test_setup_relay_countdowns() {
        debug::setup_logging_verbose();
        let (mut cc, mut sched) = setup(StackMode::Repeater);
        sched.set_channel_state(RepeaterChannelState::IdleFree);
        let time = DmoTime::new(1, 3, 1);

        let outcome = cc.rx_sync(time, dmac_sync(DmoMessageType::DmSetup, 3, time), &mut sched);
        assert_eq!(outcome, SyncOutcome { relayed: 4, resync: None });
        assert_eq!(sched.channel_state(), RepeaterChannelState::ActiveOccupied);

        let relays = drain(&mut sched, &cc);
        let countdowns: Vec<u8> = relays.iter().map(|(_, p)| p.schh.frame_countdown).collect();
        assert_eq!(countdowns, vec![3, 2, 1, 0]);
        for (i, (idx, p)) in relays.iter().enumerate() {
            let f = 7 + i as u8;
            assert_eq!(p.schs.frame_number, f);
            assert_eq!(p.schs.slot_number, 1);
            assert_eq!(p.schs.ms_link, DmLink::Slave);
            assert_eq!(p.schs.communication_type, CommunicationType::ViaRepeater);
            assert_eq!(p.schh.repgw_address, CfgRepeater::default().address);
            // Slave slot 1 goes out in master slot 4
            assert_eq!(*idx, 4 * (f as usize - 1) + 3);
        }
    }

    #[test]
    fn test_processed_suppresses_repeats() {
        let (mut cc, mut sched) = setup(StackMode::Repeater);
        sched.set_channel_state(RepeaterChannelState::IdleFree);
        let t0 = DmoTime::new(1, 3, 1);
        assert_eq!(cc.rx_sync(t0, dmac_sync(DmoMessageType::DmSetup, 2, t0), &mut sched).relayed, 3);
        assert!(cc.is_processed(DmoMessageType::DmSetup));

        let t1 = DmoTime::new(1, 4, 1);
        assert_eq!(cc.rx_sync(t1, dmac_sync(DmoMessageType::DmSetup, 1, t1), &mut sched).relayed, 0);
        let t2 = DmoTime::new(1, 5, 1);
        assert_eq!(cc.rx_sync(t2, dmac_sync(DmoMessageType::DmSetup, 0, t2), &mut sched).relayed, 0);
        assert!(!cc.is_processed(DmoMessageType::DmSetup));

        // A new setup is relayed again
        let t3 = DmoTime::new(2, 3, 1);
        assert_eq!(cc.rx_sync(t3, dmac_sync(DmoMessageType::DmSetup, 1, t3), &mut sched).relayed, 2);
    }

    #[test]
    fn test_setup_for_other_repeater_ignored() {
        let (mut cc, mut sched) = setup(StackMode::Repeater);
        sched.set_channel_state(RepeaterChannelState::IdleFree);
        let time = DmoTime::new(1, 1, 1);
        let SyncPdu::Dmac(mut p) = dmac_sync(DmoMessageType::DmSetup, 1, time) else { unreachable!() };
        p.schh.repgw_address = 1;
        assert_eq!(cc.rx_sync(time, SyncPdu::Dmac(p), &mut sched).relayed, 0);
        assert_eq!(sched.channel_state(), RepeaterChannelState::IdleFree);
        assert_eq!(sched.num_armed(), 0);
        assert!(!cc.is_processed(DmoMessageType::DmSetup));

        // Our own setup right after is still relayed
        let t1 = DmoTime::new(1, 2, 1);
        assert_eq!(cc.rx_sync(t1, dmac_sync(DmoMessageType::DmSetup, 1, t1), &mut sched).relayed, 2);
        assert_eq!(sched.channel_state(), RepeaterChannelState::ActiveOccupied);
    }

    #[test]
    fn test_slave_link_sync_is_not_a_time_warp() {
        let (mut cc, mut sched) = setup(StackMode::Repeater);
        sched.set_channel_state(RepeaterChannelState::ActiveOccupied);

        // Slave slot 1 of frame 5 is carried in master slot 4
        let time = DmoTime::new(1, 5, 4);
        let SyncPdu::Dmac(mut p) = dmac_sync(DmoMessageType::DmOccupied, 0, DmoTime::new(1, 5, 1)) else { unreachable!() };
        p.schs.ms_link = DmLink::Slave;
        let outcome = cc.rx_sync(time, SyncPdu::Dmac(p.clone()), &mut sched);
        assert_eq!(outcome, SyncOutcome::default());
        assert_eq!(sched.num_armed(), 0);

        // Same PDU one slot late does warp, reported on the master link
        let late = DmoTime::new(1, 6, 1);
        let outcome = cc.rx_sync(late, SyncPdu::Dmac(p), &mut sched);
        assert_eq!(outcome.resync, Some(DmoTime::new(1, 5, 4)));
    }

    #[test]
    fn test_setup_after_reserved_occupies_channel() {
        let (mut cc, mut sched) = setup(StackMode::Repeater);
        sched.set_channel_state(RepeaterChannelState::ActiveReserved);
        let time = DmoTime::new(1, 6, 1);
        assert_eq!(cc.rx_sync(time, dmac_sync(DmoMessageType::DmSetup, 1, time), &mut sched).relayed, 2);
        assert_eq!(sched.channel_state(), RepeaterChannelState::ActiveOccupied);

        let blk = BitBuffer::from_bitarr(&[1u8; 216]);
        let traffic = DmoTime::new(1, 10, 2);
        assert!(cc.rx_normal(traffic, DmTrainingSequence::Normal1, &blk, &blk, &mut sched).relayed);
    }

    #[test]
    fn test_connect_relays_on_two_slots() {
        let (mut cc, mut sched) = setup(StackMode::Repeater);
        let time = DmoTime::new(1, 10, 1);
        let outcome = cc.rx_sync(time, dmac_sync(DmoMessageType::DmConnect, 1, time), &mut sched);
        assert_eq!(outcome.relayed, 4);
        assert_eq!(sched.channel_state(), RepeaterChannelState::ActiveOccupied);
        let slots: Vec<(u8, u8, u8)> = drain(&mut sched, &cc)
            .iter()
            .map(|(_, p)| (p.schs.frame_number, p.schs.slot_number, p.schh.frame_countdown))
            .collect();
        assert_eq!(slots, vec![(12, 1, 1), (12, 3, 1), (13, 1, 0), (13, 3, 0)]);
    }

    #[test]
    fn test_occupied_release_reserved() {
        let (mut cc, mut sched) = setup(StackMode::Repeater);
        sched.set_channel_state(RepeaterChannelState::IdleFree);

        // Not active: nothing happens
        let t = DmoTime::new(1, 2, 1);
        assert_eq!(cc.rx_sync(t, dmac_sync(DmoMessageType::DmOccupied, 0, t), &mut sched).relayed, 0);
        assert_eq!(sched.channel_state(), RepeaterChannelState::IdleFree);

        sched.set_channel_state(RepeaterChannelState::ActiveOccupied);
        let t = DmoTime::new(1, 4, 1);
        assert_eq!(cc.rx_sync(t, dmac_sync(DmoMessageType::DmOccupied, 2, t), &mut sched).relayed, 1);
        let relays = drain(&mut sched, &cc);
        assert_eq!(relays.len(), 1);
        assert_eq!(relays[0].1.schh.frame_countdown, 0);
        assert_eq!(relays[0].1.schs.frame_number, 7);

        let t = DmoTime::new(1, 8, 1);
        assert_eq!(cc.rx_sync(t, dmac_sync(DmoMessageType::DmReserved, 0, t), &mut sched).relayed, 1);
        assert_eq!(sched.channel_state(), RepeaterChannelState::ActiveReserved);

        let t = DmoTime::new(1, 9, 1);
        assert_eq!(cc.rx_sync(t, dmac_sync(DmoMessageType::DmRelease, 0, t), &mut sched).relayed, 1);
        assert_eq!(sched.channel_state(), RepeaterChannelState::IdleFree);
    }

    #[test]
    fn test_time_warp_requests_resync() {
        let (mut cc, mut sched) = setup(StackMode::Repeater);
        let time = DmoTime::new(3, 5, 2);
        let pdu = dmac_sync(DmoMessageType::DmInfo, 0, DmoTime::new(1, 9, 4));
        let outcome = cc.rx_sync(time, pdu, &mut sched);
        assert_eq!(outcome.resync, Some(DmoTime::new(3, 9, 4)));
        assert_eq!(outcome.relayed, 0);
        assert_eq!(sched.channel_state(), RepeaterChannelState::IdleUnknown);
    }

    #[test]
    fn test_unknown_message_type_ignored() {
        let (mut cc, mut sched) = setup(StackMode::Repeater);
        sched.set_channel_state(RepeaterChannelState::ActiveOccupied);
        let time = DmoTime::new(1, 1, 1);
        let SyncPdu::Dmac(mut p) = dmac_sync(DmoMessageType::DmSetup, 1, time) else { unreachable!() };
        p.schh.message_type = 30;
        assert_eq!(cc.rx_sync(time, SyncPdu::Dmac(p), &mut sched), SyncOutcome::default());
        assert_eq!(sched.channel_state(), RepeaterChannelState::ActiveOccupied);
    }

    #[test]
    fn test_monitor_mode_tracks_ms_state() {
        let (mut cc, mut sched) = setup(StackMode::Monitor);
        let time = DmoTime::new(1, 1, 1);
        assert_eq!(cc.rx_sync(time, dmac_sync(DmoMessageType::DmSetup, 1, time), &mut sched).relayed, 0);
        assert_eq!(cc.ms_channel_state(), MsChannelState::IdleOccupied);
        assert_eq!(sched.num_armed(), 0);
        assert_eq!(sched.channel_state(), RepeaterChannelState::IdleUnknown);
        cc.rx_sync(time, dmac_sync(DmoMessageType::DmRelease, 0, time), &mut sched);
        assert_eq!(cc.ms_channel_state(), MsChannelState::IdleFree);
    }

    #[test]
    fn test_traffic_relayed_only_when_occupied() {
        let (mut cc, mut sched) = setup(StackMode::Repeater);
        let blk1 = BitBuffer::from_bitarr(&[1u8; 216]);
        let blk2 = BitBuffer::from_bitarr(&[0u8; 216]);
        let time = DmoTime::new(1, 2, 3);

        let outcome = cc.rx_normal(time, DmTrainingSequence::Normal1, &blk1, &blk2, &mut sched);
        assert!(!outcome.relayed);
        assert!(outcome.decode_failed);

        sched.set_channel_state(RepeaterChannelState::ActiveOccupied);
        let outcome = cc.rx_normal(time, DmTrainingSequence::Normal1, &blk1, &blk2, &mut sched);
        assert!(outcome.relayed);
        assert!(!outcome.decode_failed);
        assert!(sched.is_armed(time.with_link(DmLink::Slave)));
    }

    #[test]
    fn test_schf_fragments_reassembled() {
        let (mut cc, mut sched) = setup(StackMode::Repeater);
        let scramb = cc.scrambling_code;
        let time = DmoTime::new(1, 2, 1);

        let send = |cc: &mut CallControl, sched: &mut SlotScheduler, header: &dyn Fn(&mut BitBuffer)| {
            let mut type1 = BitBuffer::new(LogicalChannel::SchF.type1_bits());
            header(&mut type1);
            type1.seek(0);
            let onair = cc.factory().codec().encode(LogicalChannel::SchF, &type1, scramb).unwrap();
            let blk1 = BitBuffer::from_range(&onair, 0, 216).unwrap();
            let blk2 = BitBuffer::from_range(&onair, 216, 216).unwrap();
            cc.rx_normal(time, DmTrainingSequence::Normal1, &blk1, &blk2, sched)
        };

        let first = DmacData {
            fill_bit: false,
            second_half_stolen: false,
            fragmented: true,
            null_pdu: false,
            addressing: Some(dmo_pdus::dmac::pdus::dmac_data::DmacDataAddressing {
                frame_countdown: 0,
                encryption_state: 0,
                dst: DmAddress::new(DmAddressType::TrueAddress, 1),
                src: DmAddress::new(DmAddressType::TrueAddress, 2),
                mni: 0,
                message_type: DmoMessageType::DmSdsData.into_raw() as u8,
            }),
        };
        let outcome = send(&mut cc, &mut sched, &|b| first.to_bitbuf(b));
        assert!(!outcome.decode_failed);
        assert!(cc.reassembler().is_active());

        send(&mut cc, &mut sched, &|b| DmacFragEnd { is_end: false, fill_bit: false }.to_bitbuf(b));
        assert_eq!(cc.reassembler().num_frags(), 2);
        send(&mut cc, &mut sched, &|b| DmacFragEnd { is_end: true, fill_bit: true }.to_bitbuf(b));
        assert!(!cc.reassembler().is_active());
        assert_eq!(cc.config.state_read().fragments_completed, 1);

        // END without START
        send(&mut cc, &mut sched, &|b| DmacFragEnd { is_end: true, fill_bit: false }.to_bitbuf(b));
        assert_eq!(cc.config.state_read().fragment_errors, 1);
    }
}
