//! Server-push subscription endpoints
//!
//! A subscriber opens a long-lived `text/event-stream` response scoped to one
//! stream id. The response body drains the subscriber's hub channel and
//! interleaves keep-alive pings; dropping the body removes exactly that
//! channel from the hub.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use futures::Stream;
use predlive_core::models::StreamId;
use predlive_hub::{ChannelId, ControlMessage, MpscChannel, OutputChannel, StreamHub};
use serde::Deserialize;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, warn};

use crate::http::{AppError, AppResult, AppState};

/// Query parameters for a subscription
#[derive(Debug, Default, Deserialize)]
pub struct SubscribeQuery {
    #[serde(rename = "streamId")]
    pub stream_id: Option<String>,
}

/// Subscription aliases; `GET /api/broadcast` is mounted with the publish route
pub fn create_events_router() -> Router<AppState> {
    Router::new()
        .route("/api/ws", get(subscribe_by_query))
        .route("/api/streams/{stream_id}/events", get(subscribe_by_path))
}

/// Subscribe with `?streamId=`
pub async fn subscribe_by_query(
    State(state): State<AppState>,
    Query(query): Query<SubscribeQuery>,
) -> AppResult<Response> {
    let stream_id = StreamId::parse(query.stream_id.unwrap_or_default())?;
    open_subscription(&state, stream_id)
}

/// Subscribe with the stream id as a path segment
pub async fn subscribe_by_path(
    State(state): State<AppState>,
    Path(stream_id): Path<String>,
) -> AppResult<Response> {
    let stream_id = StreamId::parse(stream_id)?;
    open_subscription(&state, stream_id)
}

fn open_subscription(state: &AppState, stream_id: StreamId) -> AppResult<Response> {
    let greeting = ControlMessage::connected(stream_id.clone()).to_frame()?;

    let (channel, receiver) = MpscChannel::new(state.broadcast.channel_capacity);
    let channel_id = channel.id().clone();

    // Queued before registration so no broadcast can overtake the greeting
    channel.try_write(greeting).map_err(|e| {
        error!(stream_id = %stream_id, error = %e, "Failed to queue greeting frame");
        AppError::internal_server_error("Internal server error")
    })?;

    state.hub.register(&stream_id, Arc::new(channel));

    let guard = SubscriptionGuard {
        hub: state.hub.clone(),
        stream_id,
        channel_id,
    };
    let stream = SubscriptionStream::new(receiver, state.broadcast.keepalive_interval(), guard);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache, no-transform"),
            (header::CONNECTION, "keep-alive"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// Unregisters the subscriber's channel when the response body is dropped
struct SubscriptionGuard {
    hub: Arc<StreamHub>,
    stream_id: StreamId,
    channel_id: ChannelId,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        debug!(
            stream_id = %self.stream_id,
            channel_id = %self.channel_id,
            "Subscriber disconnected"
        );
        self.hub.unregister(&self.stream_id, &self.channel_id);
    }
}

/// Response body of one subscription
///
/// Ends when the hub drops the channel (a pruned subscriber), so a client
/// that fell behind reconnects instead of idling on pings alone.
struct SubscriptionStream {
    frames: mpsc::Receiver<Bytes>,
    keepalive: Option<Interval>,
    _guard: SubscriptionGuard,
}

impl SubscriptionStream {
    fn new(
        frames: mpsc::Receiver<Bytes>,
        keepalive: Option<Duration>,
        guard: SubscriptionGuard,
    ) -> Self {
        let keepalive = keepalive.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        Self {
            frames,
            keepalive,
            _guard: guard,
        }
    }
}

impl Stream for SubscriptionStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        match this.frames.poll_recv(cx) {
            Poll::Ready(Some(frame)) => return Poll::Ready(Some(Ok(frame))),
            Poll::Ready(None) => return Poll::Ready(None),
            Poll::Pending => {}
        }

        if let Some(keepalive) = this.keepalive.as_mut() {
            while keepalive.poll_tick(cx).is_ready() {
                match ControlMessage::ping().to_frame() {
                    Ok(frame) => return Poll::Ready(Some(Ok(frame))),
                    Err(e) => warn!(error = %e, "Failed to encode ping frame"),
                }
            }
        }

        Poll::Pending
    }
}
