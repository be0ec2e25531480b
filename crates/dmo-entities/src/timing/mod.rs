pub mod timing_engine;

pub use timing_engine::{ResyncOutcome, RxSlot, RxTiming, TimingEngine, TxSlot};
