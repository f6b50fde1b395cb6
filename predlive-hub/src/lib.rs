pub mod error;
pub mod sync;

pub use error::{ChannelError, Error, Result};
pub use sync::{
    BroadcastMessage, ChannelId, ControlMessage, HubStats, MpscChannel, OutputChannel,
    PublishReport, StreamHub,
};
