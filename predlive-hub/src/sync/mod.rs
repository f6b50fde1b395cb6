// Module: sync

pub mod channel;
pub mod message;
pub mod stream_hub;

pub use channel::{ChannelId, MpscChannel, OutputChannel};
pub use message::{encode_frame, BroadcastMessage, ControlMessage};
pub use stream_hub::{HubStats, PublishReport, StreamHub, StreamStats};
