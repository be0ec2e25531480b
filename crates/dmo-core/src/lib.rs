//! Core utilities for the TETRA DMO repeater
//!
//! - BitBuffer for bit-level PDU manipulation
//! - DmoTime for DM slot/frame/multiframe numbering
//! - Logical channel and burst class descriptors
//! - PDU parse errors and logging setup

pub mod bitbuffer;
pub mod burst_class;
pub mod debug;
pub mod pdu_parse_error;
pub mod tdma_time;

pub use bitbuffer::BitBuffer;
pub use burst_class::{BurstClass, LogicalChannel};
pub use pdu_parse_error::PduParseErr;
pub use tdma_time::{DmLink, DmoTime};

/// Nominal duration of one TDMA slot: 255/18000 s, rounded to the nearest nanosecond.
pub const SLOT_TIME_NS: u64 = (1_000_000_000u64 * 255 + 9_000) / 18_000;

/// Slots per frame
pub const SLOTS_PER_FRAME: u32 = 4;
/// Frames per multiframe
pub const FRAMES_PER_MULTIFRAME: u32 = 18;
/// Slots per multiframe (72). Also the size of the TX frame buffer.
pub const SLOTS_PER_MULTIFRAME: u32 = SLOTS_PER_FRAME * FRAMES_PER_MULTIFRAME;
/// Multiframes per hyperframe
pub const MULTIFRAMES_PER_HYPERFRAME: u32 = 60;
/// Slot counter period used by the timing engine (one hyperframe, 4320 slots)
pub const TIMING_SLOTS: u32 = SLOTS_PER_MULTIFRAME * MULTIFRAMES_PER_HYPERFRAME;

/// Offset, in slots, between a master-link slot and its slave-link counterpart
pub const SLAVE_LINK_OFFSET: u32 = 3;
