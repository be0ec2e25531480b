use dmo_core::SLOTS_PER_MULTIFRAME;
use serde::Deserialize;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum StackMode {
    /// Relay call setup, traffic and presence signals
    Repeater,
    /// Decode and log only, never transmit
    Monitor,
}

/// Radio transport backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TransportBackend {
    /// In-process loopback, nothing reaches the air
    None,
    /// Bursts read from and written to text files
    File,
    /// In-process loopback with an observer channel, mainly for tests
    Loopback,
}

#[derive(Debug, Clone)]
pub struct CfgTransport {
    pub backend: TransportBackend,
    pub rx_file: Option<String>,
    pub tx_file: Option<String>,
}

impl Default for CfgTransport {
    fn default() -> Self {
        Self { backend: TransportBackend::None, rx_file: None, tx_file: None }
    }
}

#[derive(Debug, Clone)]
pub struct CfgNetInfo {
    /// 10 bits
    pub mcc: u16,
    /// 14 bits
    pub mnc: u16,
}

impl CfgNetInfo {
    /// 24-bit mobile network identity, MCC in the upper 10 bits
    pub fn mni(&self) -> u32 {
        ((self.mcc as u32) << 14) | self.mnc as u32
    }
}

/// Repeater identity and DM-REP timer parameters
#[derive(Debug, Clone)]
pub struct CfgRepeater {
    /// 10 bits, repeater/gateway address carried in SCH/H
    pub address: u16,
    /// 4 bits
    pub system_code: u8,
    /// Presence signal dual-watch parameters, 2 bits each
    pub dn232: u8,
    pub dn233: u8,
    /// Number of frames a presence signal run lasts, 1..=4
    pub dn253: u8,
    /// Coded presence signal interval, index into the multiframe table, 3 bits
    pub dt254: u8,
    /// Slots without activity before IDLE_UNKNOWN becomes IDLE_FREE
    pub idle_timeout_slots: u32,
    /// Slots without an OCCUPIED refresh before an active channel falls back to IDLE_FREE
    pub active_timeout_slots: u32,
    /// Slots after which an incomplete fragmented message is abandoned
    pub frag_timeout_slots: u32,
    /// 3 bits
    pub max_dm_ms_power_class: u8,
}

impl Default for CfgRepeater {
    fn default() -> Self {
        Self {
            address: 1099 & 0x3ff,
            system_code: 13,
            dn232: 1,
            dn233: 1,
            dn253: 2,
            dt254: 2,
            idle_timeout_slots: 2 * SLOTS_PER_MULTIFRAME,
            active_timeout_slots: 4 * SLOTS_PER_MULTIFRAME,
            frag_timeout_slots: 2 * SLOTS_PER_MULTIFRAME,
            max_dm_ms_power_class: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CfgTiming {
    /// How far ahead of the slot boundary a burst is handed to the transport
    pub tx_lookahead_ns: u64,
    /// Max distance between an RX timestamp and an own TX timestamp to count as echo
    pub echo_window_ns: u64,
    /// RX silence after which the next burst redefines frame alignment. 0 disables.
    pub resync_on_silence_ns: u64,
}

impl Default for CfgTiming {
    fn default() -> Self {
        Self { tx_lookahead_ns: 0, echo_window_ns: 500_000, resync_on_silence_ns: 1_000_000_000 }
    }
}

#[derive(Debug, Clone)]
pub struct RepeaterConfig {
    pub stack_mode: StackMode,
    pub debug_log: Option<String>,
    pub net: CfgNetInfo,
    pub repeater: CfgRepeater,
    pub timing: CfgTiming,
    pub transport: CfgTransport,
}

impl RepeaterConfig {
    pub fn new(mode: StackMode, mcc: u16, mnc: u16) -> Self {
        RepeaterConfig {
            stack_mode: mode,
            debug_log: None,
            net: CfgNetInfo { mcc, mnc },
            repeater: CfgRepeater::default(),
            timing: CfgTiming::default(),
            transport: CfgTransport::default(),
        }
    }

    /// Validate field widths and backend requirements.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.net.mcc > 0x3ff {
            return Err("net_info.mcc exceeds 10 bits");
        }
        if self.net.mnc > 0x3fff {
            return Err("net_info.mnc exceeds 14 bits");
        }

        let r = &self.repeater;
        if r.address > 0x3ff {
            return Err("repeater.address exceeds 10 bits");
        }
        if r.system_code > 0xf {
            return Err("repeater.system_code exceeds 4 bits");
        }
        if r.dn232 > 3 || r.dn233 > 3 {
            return Err("repeater.dn232 and repeater.dn233 must fit in 2 bits");
        }
        if !(1..=4).contains(&r.dn253) {
            return Err("repeater.dn253 must be in 1..=4");
        }
        if r.dt254 > 7 {
            return Err("repeater.dt254 must be at most 7");
        }
        if r.max_dm_ms_power_class > 7 {
            return Err("repeater.max_dm_ms_power_class exceeds 3 bits");
        }
        if r.idle_timeout_slots == 0 || r.active_timeout_slots == 0 {
            return Err("repeater timeouts must be non-zero");
        }

        match self.transport.backend {
            TransportBackend::File => {
                if self.transport.rx_file.is_none() || self.transport.tx_file.is_none() {
                    return Err("File transport requires both rx_file and tx_file");
                }
            }
            TransportBackend::None | TransportBackend::Loopback => {}
        }
        Ok(())
    }
}

/// Runtime counters, written by the repeater loop and read by status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepeaterState {
    pub rx_bursts: u64,
    pub tx_bursts: u64,
    pub decode_failures: u64,
    pub echoes: u64,
    pub relayed_sync: u64,
    pub relayed_traffic: u64,
    pub beacons: u64,
    pub resyncs: u64,
    pub degraded_resyncs: u64,
    pub fragments_completed: u64,
    pub fragment_errors: u64,
}

/// Global shared configuration: immutable config + mutable state.
#[derive(Clone)]
pub struct SharedConfig {
    cfg: Arc<RepeaterConfig>,
    state: Arc<RwLock<RepeaterState>>,
}

impl SharedConfig {
    pub fn new(mode: StackMode, mcc: u16, mnc: u16) -> Result<Self, String> {
        Self::from_config(RepeaterConfig::new(mode, mcc, mnc))
    }

    pub fn from_config(cfg: RepeaterConfig) -> Result<Self, String> {
        Self::from_parts(cfg, RepeaterState::default())
    }

    /// Validates the config before wrapping it.
    pub fn from_parts(cfg: RepeaterConfig, state: RepeaterState) -> Result<Self, String> {
        cfg.validate().map_err(|e| format!("Invalid repeater configuration: {}", e))?;
        Ok(Self { cfg: Arc::new(cfg), state: Arc::new(RwLock::new(state)) })
    }

    /// Access immutable config.
    pub fn config(&self) -> Arc<RepeaterConfig> {
        Arc::clone(&self.cfg)
    }

    /// Read guard for mutable state. A poisoned lock still yields the last counters.
    pub fn state_read(&self) -> RwLockReadGuard<'_, RepeaterState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Write guard for mutable state.
    pub fn state_write(&self) -> RwLockWriteGuard<'_, RepeaterState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Non-blocking write guard, for use from the transmit tick.
    pub fn try_state_write(&self) -> Option<RwLockWriteGuard<'_, RepeaterState>> {
        match self.state.try_write() {
            Ok(g) => Some(g),
            Err(TryLockError::Poisoned(e)) => Some(e.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}
