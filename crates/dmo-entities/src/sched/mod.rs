pub mod presence;
pub mod slot_scheduler;

pub use presence::PresenceTimer;
pub use slot_scheduler::{RepeaterChannelState, SlotContent, SlotScheduler};
