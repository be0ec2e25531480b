//! Repeater entities for TETRA Direct Mode
//!
//! - `codec`: DM logical channel coding (scrambling, interleaving, convolutional code, CRC)
//! - `phy`: DM burst assembly and slot framing
//! - `timing`: TX slot clock and RX timestamp placement
//! - `sched`: TX frame buffer, channel state and presence signal timer
//! - `defrag`: DMAC fragment reassembly
//! - `callctl`: call relay state machine
//! - `transport`: radio I/O seams
//! - `repeater`, `runner`: everything wired together

pub mod callctl;
pub mod codec;
pub mod defrag;
pub mod phy;
pub mod repeater;
pub mod runner;
pub mod sched;
pub mod timing;
pub mod transport;

pub use repeater::Repeater;
pub use runner::Runner;
