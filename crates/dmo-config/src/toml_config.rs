use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use toml::Value;

use super::stack_config::{CfgNetInfo, CfgRepeater, CfgTiming, CfgTransport, RepeaterConfig, RepeaterState, SharedConfig, StackMode, TransportBackend};

pub const EXPECTED_CONFIG_VERSION: &str = "0.1";

/// Build `SharedConfig` from a TOML configuration string
pub fn from_toml_str(toml_str: &str) -> Result<SharedConfig, Box<dyn std::error::Error>> {
    let root: TomlConfigRoot = toml::from_str(toml_str)?;

    if root.config_version != EXPECTED_CONFIG_VERSION {
        return Err(format!(
            "Unrecognized config_version: {}, expect {}",
            root.config_version, EXPECTED_CONFIG_VERSION
        )
        .into());
    }
    if !root.extra.is_empty() {
        return Err(format!("Unrecognized top-level fields: {:?}", sorted_keys(&root.extra)).into());
    }
    if !root.net_info.extra.is_empty() {
        return Err(format!("Unrecognized fields in net_info: {:?}", sorted_keys(&root.net_info.extra)).into());
    }
    if let Some(ref r) = root.repeater {
        if !r.extra.is_empty() {
            return Err(format!("Unrecognized fields in repeater: {:?}", sorted_keys(&r.extra)).into());
        }
    }
    if let Some(ref t) = root.timing {
        if !t.extra.is_empty() {
            return Err(format!("Unrecognized fields in timing: {:?}", sorted_keys(&t.extra)).into());
        }
    }
    if let Some(ref t) = root.transport {
        if !t.extra.is_empty() {
            return Err(format!("Unrecognized fields in transport: {:?}", sorted_keys(&t.extra)).into());
        }
    }

    let mut cfg = RepeaterConfig {
        stack_mode: root.stack_mode,
        debug_log: root.debug_log,
        net: CfgNetInfo {
            mcc: root.net_info.mcc,
            mnc: root.net_info.mnc,
        },
        repeater: CfgRepeater::default(),
        timing: CfgTiming::default(),
        transport: CfgTransport::default(),
    };

    if let Some(r) = root.repeater {
        apply_repeater_patch(&mut cfg.repeater, r);
    }
    if let Some(t) = root.timing {
        apply_timing_patch(&mut cfg.timing, t);
    }
    if let Some(t) = root.transport {
        cfg.transport = CfgTransport {
            backend: t.backend,
            rx_file: t.rx_file,
            tx_file: t.tx_file,
        };
    }

    Ok(SharedConfig::from_parts(cfg, RepeaterState::default())?)
}

/// Build `SharedConfig` from any reader.
pub fn from_reader<R: Read>(reader: R) -> Result<SharedConfig, Box<dyn std::error::Error>> {
    let mut contents = String::new();
    let mut reader = BufReader::new(reader);
    reader.read_to_string(&mut contents)?;
    from_toml_str(&contents)
}

/// Build `SharedConfig` from a file path.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<SharedConfig, Box<dyn std::error::Error>> {
    let f = File::open(path)?;
    from_reader(BufReader::new(f))
}

fn apply_repeater_patch(dst: &mut CfgRepeater, src: RepeaterDto) {
    if let Some(v) = src.address {
        dst.address = v;
    }
    if let Some(v) = src.system_code {
        dst.system_code = v;
    }
    if let Some(v) = src.dn232 {
        dst.dn232 = v;
    }
    if let Some(v) = src.dn233 {
        dst.dn233 = v;
    }
    if let Some(v) = src.dn253 {
        dst.dn253 = v;
    }
    if let Some(v) = src.dt254 {
        dst.dt254 = v;
    }
    if let Some(v) = src.idle_timeout_slots {
        dst.idle_timeout_slots = v;
    }
    if let Some(v) = src.active_timeout_slots {
        dst.active_timeout_slots = v;
    }
    if let Some(v) = src.frag_timeout_slots {
        dst.frag_timeout_slots = v;
    }
    if let Some(v) = src.max_dm_ms_power_class {
        dst.max_dm_ms_power_class = v;
    }
}

fn apply_timing_patch(dst: &mut CfgTiming, src: TimingDto) {
    if let Some(v) = src.tx_lookahead_ns {
        dst.tx_lookahead_ns = v;
    }
    if let Some(v) = src.echo_window_ns {
        dst.echo_window_ns = v;
    }
    if let Some(v) = src.resync_on_silence_ns {
        dst.resync_on_silence_ns = v;
    }
}

fn sorted_keys(map: &HashMap<String, Value>) -> Vec<&str> {
    let mut v: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
    v.sort_unstable();
    v
}

/// ----------------------- DTOs for input shape -----------------------

#[derive(Deserialize)]
struct TomlConfigRoot {
    config_version: String,
    stack_mode: StackMode,
    debug_log: Option<String>,

    #[serde(default)]
    net_info: NetInfoDto,

    #[serde(default)]
    repeater: Option<RepeaterDto>,

    #[serde(default)]
    timing: Option<TimingDto>,

    #[serde(default)]
    transport: Option<TransportDto>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct NetInfoDto {
    pub mcc: u16,
    pub mnc: u16,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct RepeaterDto {
    pub address: Option<u16>,
    pub system_code: Option<u8>,
    pub dn232: Option<u8>,
    pub dn233: Option<u8>,
    pub dn253: Option<u8>,
    pub dt254: Option<u8>,
    pub idle_timeout_slots: Option<u32>,
    pub active_timeout_slots: Option<u32>,
    pub frag_timeout_slots: Option<u32>,
    pub max_dm_ms_power_class: Option<u8>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct TimingDto {
    pub tx_lookahead_ns: Option<u64>,
    pub echo_window_ns: Option<u64>,
    pub resync_on_silence_ns: Option<u64>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct TransportDto {
    pub backend: TransportBackend,
    pub rx_file: Option<String>,
    pub tx_file: Option<String>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
config_version = "0.1"
stack_mode = "Repeater"

[net_info]
mcc = 204
mnc = 1337

[repeater]
address = 42
dt254 = 1
dn253 = 3

[timing]
echo_window_ns = 250000

[transport]
backend = "File"
rx_file = "rx.txt"
tx_file = "tx.txt"
"#;

    #[test]
    fn test_parse_full_config() {
        let shared = from_toml_str(FULL_CONFIG).unwrap();
        let cfg = shared.config();
        assert_eq!(cfg.stack_mode, StackMode::Repeater);
        assert_eq!(cfg.net.mcc, 204);
        assert_eq!(cfg.repeater.address, 42);
        assert_eq!(cfg.repeater.dt254, 1);
        assert_eq!(cfg.repeater.dn253, 3);
        // Untouched fields keep their defaults
        assert_eq!(cfg.repeater.system_code, 13);
        assert_eq!(cfg.timing.echo_window_ns, 250_000);
        assert_eq!(cfg.timing.resync_on_silence_ns, 1_000_000_000);
        assert_eq!(cfg.transport.backend, TransportBackend::File);
    }

    #[test]
    fn test_minimal_config() {
        let shared = from_toml_str("config_version = \"0.1\"\nstack_mode = \"Monitor\"\n[net_info]\nmcc = 1\nmnc = 2\n").unwrap();
        assert_eq!(shared.config().stack_mode, StackMode::Monitor);
        assert_eq!(shared.config().transport.backend, TransportBackend::None);
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let bad = FULL_CONFIG.replace("dn253 = 3", "dn253 = 3\nbogus = 1");
        let err = from_toml_str(&bad).err().unwrap().to_string();
        assert!(err.contains("bogus"), "{}", err);

        let bad = format!("{}\nextra_root = true\n", "config_version = \"0.1\"\nstack_mode = \"Monitor\"");
        assert!(from_toml_str(&bad).is_err());
    }

    #[test]
    fn test_rejects_wrong_version_and_invalid_values() {
        assert!(from_toml_str(&FULL_CONFIG.replace("\"0.1\"", "\"9.9\"")).is_err());
        assert!(from_toml_str(&FULL_CONFIG.replace("dt254 = 1", "dt254 = 9")).is_err());
        assert!(from_toml_str(&FULL_CONFIG.replace("tx_file = \"tx.txt\"", "")).is_err());
    }
}
