use dashmap::DashMap;
use predlive_core::models::StreamId;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::channel::{ChannelId, OutputChannel};
use super::message::BroadcastMessage;
use crate::error::Result;

/// Channels currently listening on one stream, unique by channel id
type SubscriberSet = HashMap<ChannelId, Arc<dyn OutputChannel>>;

/// Outcome of one publish call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Channels that accepted the frame
    pub sent_count: usize,
    /// Channels that rejected the frame and were pruned
    pub failed_count: usize,
}

/// Subscriber count for one stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStats {
    pub stream_id: StreamId,
    pub subscriber_count: usize,
}

/// Point-in-time view of the whole hub
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    pub stream_count: usize,
    pub connection_count: usize,
    pub streams: Vec<StreamStats>,
}

/// In-memory hub routing broadcast frames to the subscribers of a stream
///
/// This is process-local: subscribers connected to another server instance
/// never see frames published here.
#[derive(Clone, Default)]
pub struct StreamHub {
    /// Map of `stream_id` -> subscriber set
    streams: Arc<DashMap<StreamId, SubscriberSet>>,
}

impl StreamHub {
    /// Create an empty hub
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `channel` to the subscriber set of `stream_id`, creating the set if absent
    ///
    /// Returns `false` if the channel was already registered under this stream;
    /// the set is left unchanged in that case.
    pub fn register(&self, stream_id: &StreamId, channel: Arc<dyn OutputChannel>) -> bool {
        let channel_id = channel.id().clone();

        let mut subscribers = self.streams.entry(stream_id.clone()).or_default();
        let inserted = match subscribers.entry(channel_id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(channel);
                true
            }
            Entry::Occupied(_) => false,
        };
        let subscriber_count = subscribers.len();
        drop(subscribers);

        if inserted {
            info!(
                stream_id = %stream_id,
                channel_id = %channel_id,
                subscribers = subscriber_count,
                "Channel registered"
            );
        } else {
            warn!(
                stream_id = %stream_id,
                channel_id = %channel_id,
                "Channel already registered, ignoring duplicate"
            );
        }

        inserted
    }

    /// Remove a channel from the subscriber set of `stream_id`
    ///
    /// Unknown streams and channels are ignored. The set itself stays in the
    /// map even when it becomes empty; `sweep_empty` reclaims it.
    pub fn unregister(&self, stream_id: &StreamId, channel_id: &ChannelId) -> bool {
        let Some(mut subscribers) = self.streams.get_mut(stream_id) else {
            return false;
        };
        let removed = subscribers.remove(channel_id).is_some();
        let remaining = subscribers.len();
        drop(subscribers);

        if removed {
            info!(
                stream_id = %stream_id,
                channel_id = %channel_id,
                subscribers = remaining,
                "Channel unregistered"
            );
        }

        removed
    }

    /// Snapshot of the channels currently registered under `stream_id`
    ///
    /// The copy is taken under the shard lock and released before returning,
    /// so callers can write to channels while others register or unregister.
    #[must_use]
    pub fn subscribers_of(&self, stream_id: &StreamId) -> Vec<Arc<dyn OutputChannel>> {
        self.streams
            .get(stream_id)
            .map(|subscribers| subscribers.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Deliver `message` to every subscriber of `stream_id`
    ///
    /// Each channel gets exactly one write attempt. A rejected write is
    /// counted, never retried, and never stops delivery to the remaining
    /// channels; every rejecting channel is unregistered before this returns.
    pub fn publish(&self, stream_id: &StreamId, message: &BroadcastMessage) -> Result<PublishReport> {
        let subscribers = self.subscribers_of(stream_id);
        if subscribers.is_empty() {
            debug!(
                stream_id = %stream_id,
                event_type = %message.event_type,
                "No active connections for stream"
            );
            return Ok(PublishReport::default());
        }

        let frame = message.to_frame()?;

        let mut report = PublishReport::default();
        let mut failed_channels = Vec::new();

        for channel in &subscribers {
            match channel.try_write(frame.clone()) {
                Ok(()) => {
                    report.sent_count += 1;
                }
                Err(err) => {
                    warn!(
                        stream_id = %stream_id,
                        channel_id = %channel.id(),
                        error = %err,
                        "Failed to write to channel, marking for cleanup"
                    );
                    report.failed_count += 1;
                    failed_channels.push(channel.id().clone());
                }
            }
        }

        for channel_id in &failed_channels {
            self.unregister(stream_id, channel_id);
        }

        info!(
            stream_id = %stream_id,
            event_type = %message.event_type,
            sent_count = report.sent_count,
            failed_count = report.failed_count,
            "Broadcast complete"
        );

        Ok(report)
    }

    /// Get the number of subscribers of a stream
    #[must_use]
    pub fn subscriber_count(&self, stream_id: &StreamId) -> usize {
        self.streams
            .get(stream_id)
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }

    /// Get the number of known streams, including ones with no subscribers left
    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Get total number of registered channels across all streams
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.streams.iter().map(|entry| entry.value().len()).sum()
    }

    /// Per-stream subscriber counts, ordered by stream id
    #[must_use]
    pub fn stats(&self) -> HubStats {
        let mut streams: Vec<StreamStats> = self
            .streams
            .iter()
            .map(|entry| StreamStats {
                stream_id: entry.key().clone(),
                subscriber_count: entry.value().len(),
            })
            .collect();
        streams.sort_by(|a, b| a.stream_id.cmp(&b.stream_id));

        HubStats {
            stream_count: streams.len(),
            connection_count: streams.iter().map(|s| s.subscriber_count).sum(),
            streams,
        }
    }

    /// Drop subscriber sets that have become empty
    ///
    /// Returns the number of streams removed.
    pub fn sweep_empty(&self) -> usize {
        let before = self.streams.len();
        self.streams.retain(|_, subscribers| !subscribers.is_empty());
        let removed = before.saturating_sub(self.streams.len());

        if removed > 0 {
            debug!(removed = removed, "Swept empty subscriber sets");
        }

        removed
    }

    /// Spawn background sweep task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_sweep_task(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let hub = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                hub.sweep_empty();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelError;
    use bytes::Bytes;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Channel that records frames and can be told to reject writes
    struct RecordingChannel {
        id: ChannelId,
        frames: Mutex<Vec<Bytes>>,
        broken: AtomicBool,
    }

    impl RecordingChannel {
        fn healthy() -> Arc<Self> {
            Arc::new(Self {
                id: ChannelId::new(),
                frames: Mutex::new(Vec::new()),
                broken: AtomicBool::new(false),
            })
        }

        fn broken() -> Arc<Self> {
            let channel = Self::healthy();
            channel.broken.store(true, Ordering::SeqCst);
            channel
        }

        fn frames(&self) -> Vec<serde_json::Value> {
            self.frames
                .lock()
                .unwrap()
                .iter()
                .map(|frame| {
                    let text = std::str::from_utf8(frame).unwrap();
                    let body = text.strip_prefix("data: ").unwrap().trim_end();
                    serde_json::from_str(body).unwrap()
                })
                .collect()
        }
    }

    impl OutputChannel for RecordingChannel {
        fn id(&self) -> &ChannelId {
            &self.id
        }

        fn try_write(&self, frame: Bytes) -> std::result::Result<(), ChannelError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(ChannelError::Closed);
            }
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }
    }

    fn stream(id: &str) -> StreamId {
        StreamId::parse(id).unwrap()
    }

    fn ids(channels: &[Arc<dyn OutputChannel>]) -> Vec<ChannelId> {
        channels.iter().map(|c| c.id().clone()).collect()
    }

    #[test]
    fn test_unknown_stream_is_empty() {
        let hub = StreamHub::new();
        let never = stream("never-subscribed");

        assert!(hub.subscribers_of(&never).is_empty());

        let report = hub
            .publish(&never, &BroadcastMessage::new("x", json!({})))
            .unwrap();
        assert_eq!(report, PublishReport { sent_count: 0, failed_count: 0 });
    }

    #[test]
    fn test_register_and_unregister() {
        let hub = StreamHub::new();
        let s = stream("s");
        let channel = RecordingChannel::healthy();

        assert!(hub.register(&s, channel.clone()));
        assert!(ids(&hub.subscribers_of(&s)).contains(&channel.id));

        assert!(hub.unregister(&s, &channel.id));
        assert!(!ids(&hub.subscribers_of(&s)).contains(&channel.id));
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let hub = StreamHub::new();
        let channel = RecordingChannel::healthy();

        assert!(!hub.unregister(&stream("missing"), &channel.id));

        hub.register(&stream("s"), channel.clone());
        assert!(!hub.unregister(&stream("s"), &ChannelId::new()));
        assert_eq!(hub.subscriber_count(&stream("s")), 1);
    }

    #[test]
    fn test_duplicate_registration_delivers_once() {
        let hub = StreamHub::new();
        let s = stream("s");
        let channel = RecordingChannel::healthy();

        assert!(hub.register(&s, channel.clone()));
        assert!(!hub.register(&s, channel.clone()));
        assert_eq!(hub.subscriber_count(&s), 1);

        let report = hub.publish(&s, &BroadcastMessage::new("e", json!(1))).unwrap();
        assert_eq!(report.sent_count, 1);
        assert_eq!(channel.frames().len(), 1);
    }

    #[test]
    fn test_publish_reaches_every_healthy_channel_once() {
        let hub = StreamHub::new();
        let s = stream("s");
        let channels: Vec<_> = (0..5).map(|_| RecordingChannel::healthy()).collect();
        for channel in &channels {
            hub.register(&s, channel.clone());
        }

        let payload = json!({ "id": "x", "options": [1, 2] });
        let report = hub
            .publish(&s, &BroadcastMessage::new("challenge:new", payload.clone()))
            .unwrap();

        assert_eq!(report, PublishReport { sent_count: 5, failed_count: 0 });
        for channel in &channels {
            let frames = channel.frames();
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0]["type"], "challenge:new");
            assert_eq!(frames[0]["data"], payload);
        }
    }

    #[test]
    fn test_failed_channels_are_pruned_and_isolated() {
        let hub = StreamHub::new();
        let s = stream("s");
        let healthy: Vec<_> = (0..3).map(|_| RecordingChannel::healthy()).collect();
        let broken: Vec<_> = (0..2).map(|_| RecordingChannel::broken()).collect();
        for channel in healthy.iter().chain(broken.iter()) {
            hub.register(&s, channel.clone());
        }

        let report = hub.publish(&s, &BroadcastMessage::new("e", json!(null))).unwrap();

        assert_eq!(report, PublishReport { sent_count: 3, failed_count: 2 });
        assert_eq!(hub.subscriber_count(&s), 3);
        let remaining = ids(&hub.subscribers_of(&s));
        for channel in &broken {
            assert!(!remaining.contains(&channel.id));
        }
        for channel in &healthy {
            assert_eq!(channel.frames().len(), 1);
        }
    }

    #[test]
    fn test_pruned_channel_is_never_written_again() {
        let hub = StreamHub::new();
        let s = stream("s");
        let channel = RecordingChannel::broken();
        hub.register(&s, channel.clone());

        let first = hub.publish(&s, &BroadcastMessage::new("e", json!(1))).unwrap();
        assert_eq!(first.failed_count, 1);

        // Recovering the transport does not resubscribe the channel
        channel.broken.store(false, Ordering::SeqCst);
        let second = hub.publish(&s, &BroadcastMessage::new("e", json!(2))).unwrap();
        assert_eq!(second, PublishReport::default());
        assert!(channel.frames().is_empty());
    }

    #[test]
    fn test_streams_are_isolated() {
        let hub = StreamHub::new();
        let on_s1 = RecordingChannel::healthy();
        let on_s2 = RecordingChannel::healthy();
        hub.register(&stream("s1"), on_s1.clone());
        hub.register(&stream("s2"), on_s2.clone());

        hub.publish(&stream("s1"), &BroadcastMessage::new("e", json!({})))
            .unwrap();

        assert_eq!(on_s1.frames().len(), 1);
        assert!(on_s2.frames().is_empty());
    }

    #[test]
    fn test_same_channel_on_two_streams() {
        let hub = StreamHub::new();
        let channel = RecordingChannel::healthy();
        hub.register(&stream("s1"), channel.clone());
        hub.register(&stream("s2"), channel.clone());

        hub.publish(&stream("s1"), &BroadcastMessage::new("a", json!(1)))
            .unwrap();
        hub.publish(&stream("s2"), &BroadcastMessage::new("b", json!(2)))
            .unwrap();

        let types: Vec<_> = channel.frames().iter().map(|f| f["type"].clone()).collect();
        assert_eq!(types, vec![json!("a"), json!("b")]);
    }

    #[test]
    fn test_publish_is_not_deduplicated() {
        let hub = StreamHub::new();
        let s = stream("s");
        let channel = RecordingChannel::healthy();
        hub.register(&s, channel.clone());

        let message = BroadcastMessage::new("e", json!({ "same": true }));
        hub.publish(&s, &message).unwrap();
        hub.publish(&s, &message).unwrap();

        assert_eq!(channel.frames().len(), 2);
    }

    #[test]
    fn test_empty_sets_survive_until_swept() {
        let hub = StreamHub::new();
        let s = stream("s");
        let channel = RecordingChannel::healthy();
        hub.register(&s, channel.clone());
        hub.register(&stream("busy"), RecordingChannel::healthy());

        hub.unregister(&s, &channel.id);
        assert_eq!(hub.stream_count(), 2);
        assert_eq!(hub.subscriber_count(&s), 0);

        assert_eq!(hub.sweep_empty(), 1);
        assert_eq!(hub.stream_count(), 1);
        assert_eq!(hub.subscriber_count(&stream("busy")), 1);
    }

    #[test]
    fn test_stats() {
        let hub = StreamHub::new();
        hub.register(&stream("b"), RecordingChannel::healthy());
        hub.register(&stream("a"), RecordingChannel::healthy());
        hub.register(&stream("a"), RecordingChannel::healthy());

        let stats = hub.stats();
        assert_eq!(stats.stream_count, 2);
        assert_eq!(stats.connection_count, 3);
        assert_eq!(hub.connection_count(), 3);
        assert_eq!(stats.streams[0].stream_id, stream("a"));
        assert_eq!(stats.streams[0].subscriber_count, 2);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["connectionCount"], 3);
        assert_eq!(json["streams"][1]["streamId"], "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_task_reclaims_empty_sets() {
        let hub = StreamHub::new();
        let s = stream("s");
        let channel = RecordingChannel::healthy();
        hub.register(&s, channel.clone());
        hub.unregister(&s, &channel.id);

        let handle = hub.spawn_sweep_task(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(hub.stream_count(), 0);
        handle.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_and_publish() {
        let hub = StreamHub::new();
        let s = stream("s");

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let hub = hub.clone();
            let s = s.clone();
            tasks.push(tokio::spawn(async move {
                let channel = RecordingChannel::healthy();
                hub.register(&s, channel.clone());
                hub.publish(&s, &BroadcastMessage::new("e", json!({}))).unwrap();
                channel
            }));
        }

        let mut channels = Vec::new();
        for task in tasks {
            channels.push(task.await.unwrap());
        }

        assert_eq!(hub.subscriber_count(&s), 32);
        // Each channel sees at least the publish issued after its own registration
        assert!(channels.iter().all(|c| !c.frames().is_empty()));
    }
}
