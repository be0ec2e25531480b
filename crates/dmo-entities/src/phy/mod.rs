pub mod burst_factory;
pub mod dm_burst;
pub mod framing;

pub use burst_factory::{BurstFactory, presence_signal};
pub use dm_burst::{DmBurst, DmTrainingSequence, split_dm_burst};
pub use framing::{Framing, apply_framing, frame_burst};
