use clap::{Parser, ValueEnum};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use dmo_config::{RepeaterConfig, SharedConfig, StackMode, TransportBackend, toml_config};
use dmo_core::debug;
use dmo_entities::codec::TetraCodec;
use dmo_entities::transport::{
    Clock, FileRx, FileTx, LoopbackPeer, MonotonicClock, RadioBurst, RxTransport, TxTransport, loopback,
};
use dmo_entities::{Repeater, Runner};

/// Load configuration file
fn load_config_from_toml(cfg_path: &str) -> SharedConfig {
    match toml_config::from_file(cfg_path) {
        Ok(c) => c,
        Err(e) => {
            println!("Failed to load configuration from {}: {}", cfg_path, e);
            std::process::exit(1);
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Repeater,
    Monitor,
}

impl From<ModeArg> for StackMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Repeater => StackMode::Repeater,
            ModeArg::Monitor => StackMode::Monitor,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "TETRA DMO Repeater",
    long_about = "Runs a TETRA Direct Mode type 1A repeater using the provided TOML configuration file"
)]
struct Args {
    /// Config file (required)
    #[arg(help = "TOML config with network/repeater parameters")]
    config: String,

    /// Overrides stack_mode from the config file
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
}

/// What keeps the radio side alive for as long as the runner needs it
enum RadioSide {
    Peer(LoopbackPeer),
    Forwarder(thread::JoinHandle<()>),
    None,
}

/// Feeds every transmitted burst straight back into the receiver, as an SDR would hear itself.
fn spawn_forwarder(peer: LoopbackPeer) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new().name("loopback".to_string()).spawn(move || {
        while let Ok(tx) = peer.observed.recv() {
            if peer.inject.send(RadioBurst { bits: tx.bits, ts_ns: tx.ts_ns }).is_err() {
                break;
            }
        }
    })
}

fn build_transport(
    cfg: &RepeaterConfig,
    clock: &MonotonicClock,
) -> Result<(Box<dyn RxTransport>, Box<dyn TxTransport>, RadioSide), Box<dyn std::error::Error>> {
    match cfg.transport.backend {
        TransportBackend::None => {
            let (rx, tx, peer) = loopback();
            Ok((Box::new(rx), Box::new(tx), RadioSide::Peer(peer)))
        }
        TransportBackend::Loopback => {
            let (rx, tx, peer) = loopback();
            Ok((Box::new(rx), Box::new(tx), RadioSide::Forwarder(spawn_forwarder(peer)?)))
        }
        TransportBackend::File => {
            let rx_path = cfg.transport.rx_file.as_deref().ok_or("transport.rx_file missing")?;
            let tx_path = cfg.transport.tx_file.as_deref().ok_or("transport.tx_file missing")?;
            let rx = FileRx::open(rx_path, clock.clone())?;
            let tx = FileTx::create(tx_path)?;
            Ok((Box::new(rx), Box::new(tx), RadioSide::None))
        }
    }
}

fn main() {
    eprintln!("    TETRA DMO Repeater");
    eprintln!("    Wouter Bokslag / Midnight Blue\n");

    let args = Args::parse();
    let mut cfg = load_config_from_toml(&args.config);
    if let Some(mode) = args.mode {
        let mut c: RepeaterConfig = (*cfg.config()).clone();
        c.stack_mode = mode.into();
        cfg = match SharedConfig::from_config(c) {
            Ok(c) => c,
            Err(e) => {
                println!("{}", e);
                std::process::exit(1);
            }
        };
    }
    let _log_guard = match debug::setup_logging_default(cfg.config().debug_log.clone()) {
        Ok(g) => g,
        Err(e) => {
            println!("Failed to set up logging: {}", e);
            std::process::exit(1);
        }
    };

    let config = cfg.config();
    tracing::info!(
        "starting in {:?} mode, repeater address {}, MNI {}-{}, transport {:?}",
        config.stack_mode,
        config.repeater.address,
        config.net.mcc,
        config.net.mnc,
        config.transport.backend
    );

    let clock = MonotonicClock::new();
    let (rx, tx, radio_side) = match build_transport(&config, &clock) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("failed to open transport: {}", e);
            std::process::exit(1);
        }
    };
    tracing::debug!("clock at {} ns", clock.now_ns());

    // Set up Ctrl+C handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("failed to set Ctrl+C handler");

    let repeater = Repeater::new(cfg.clone(), Box::new(TetraCodec));
    let mut runner = match Runner::new(repeater, rx, tx, Box::new(clock), running) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("failed to start: {}", e);
            std::process::exit(1);
        }
    };

    let result = runner.run();
    // Runner drops here, joining the ingestion thread and closing the TX side
    drop(runner);

    match radio_side {
        RadioSide::Forwarder(handle) => {
            if handle.join().is_err() {
                tracing::error!("loopback thread panicked");
            }
        }
        RadioSide::Peer(peer) => drop(peer),
        RadioSide::None => {}
    }

    if let Err(e) = result {
        tracing::error!("stopped: {}", e);
        std::process::exit(1);
    }
}
