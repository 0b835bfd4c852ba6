//! Live playback: dual-channel scheduling and repeating background players

pub mod channel;
pub mod repeating;
pub mod scheduler;

pub use channel::{channel_pair, AssignError, ChannelHandle, PlaybackChannel};
pub use repeating::RepeatingPlayer;
pub use scheduler::Scheduler;
