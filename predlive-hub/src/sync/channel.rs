//! Subscriber output channels
//!
//! The hub never owns a subscriber's connection. It keeps a handle that can
//! only attempt a non-blocking write; the transport owns the other end and
//! dropping it makes every later write fail.

use bytes::Bytes;
use predlive_core::models::generate_id;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

use crate::error::ChannelError;

/// Identity of one subscriber channel, unique per subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelId(String);

impl ChannelId {
    #[must_use]
    pub fn new() -> Self {
        Self(generate_id())
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Write-only handle to one subscriber's open connection
pub trait OutputChannel: Send + Sync {
    fn id(&self) -> &ChannelId;

    /// Attempt to hand one encoded frame to the subscriber without waiting
    fn try_write(&self, frame: Bytes) -> Result<(), ChannelError>;
}

/// Channel backed by a bounded mpsc queue drained by the response body
///
/// A full queue is reported as a failed write so a slow subscriber never
/// stalls a publish. The first failed write is final: every later write is
/// rejected as `Closed`, even if the queue has since drained, so a publish
/// racing with the one that pruned this channel cannot reach it.
#[derive(Debug)]
pub struct MpscChannel {
    id: ChannelId,
    sender: mpsc::Sender<Bytes>,
    failed: AtomicBool,
}

impl MpscChannel {
    /// Create a channel and the receiver the transport drains
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let channel = Self {
            id: ChannelId::new(),
            sender,
            failed: AtomicBool::new(false),
        };
        (channel, receiver)
    }
}

impl OutputChannel for MpscChannel {
    fn id(&self) -> &ChannelId {
        &self.id
    }

    fn try_write(&self, frame: Bytes) -> Result<(), ChannelError> {
        if self.failed.load(Ordering::Acquire) {
            return Err(ChannelError::Closed);
        }

        self.sender.try_send(frame).map_err(|e| {
            self.failed.store(true, Ordering::Release);
            match e {
                mpsc::error::TrySendError::Full(_) => ChannelError::Full,
                mpsc::error::TrySendError::Closed(_) => ChannelError::Closed,
            }
        })
    }
}
