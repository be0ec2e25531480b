pub mod call_control;
pub mod ms_channel_state;

pub use call_control::{CallControl, NormalOutcome, SyncOutcome, relay_frame};
pub use ms_channel_state::MsChannelState;
