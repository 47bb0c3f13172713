//! Multipart (MJPEG) push stream.
//!
//! Each push viewer gets a stream that re-reads the [`FrameStore`] on every
//! tick and emits one `multipart/x-mixed-replace` part per tick. The stream
//! owns the viewer's ticker; hyper drops the body when the client goes away,
//! which releases the ticker and the viewer slot in one place
//! (the subscriber's `Drop`). Server shutdown cancels the per-viewer token and
//! ends the stream the same way.
//!
//! Part layout:
//! ```text
//! --frame\r\n
//! Content-Type: image/jpeg\r\n
//! Content-Length: <n>\r\n
//! \r\n
//! <jpeg bytes>\r\n
//! ```

use std::convert::Infallible;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::Stream;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::stats::AtomicRelayStats;
use crate::{Frame, FrameStore};

/// Multipart boundary token
pub const BOUNDARY: &str = "frame";

/// Response content type for push mode
pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Shortest interval accepted by [`push_stream`]
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Encode one multipart part carrying `frame`
pub fn encode_part(frame: &Frame) -> Bytes {
    let header = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY,
        frame.len()
    );
    let mut buf = BytesMut::with_capacity(header.len() + frame.len() + 2);
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(&frame.bytes);
    buf.extend_from_slice(b"\r\n");
    buf.freeze()
}

/// Lifecycle of a push viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// Accepted, nothing written yet
    Connected,
    /// At least one part written
    Streaming,
    /// Client went away (body dropped)
    Disconnected,
    /// Server shutdown ended the stream
    ServerClosed,
}

/// Bookkeeping for one push viewer. Holds the viewer's slot in
/// `viewers_active` until dropped.
struct Subscriber {
    id: u64,
    state: SubscriberState,
    parts: u64,
    stats: Arc<AtomicRelayStats>,
}

impl Subscriber {
    fn register(stats: Arc<AtomicRelayStats>) -> Self {
        let id = stats.viewers_total.fetch_add(1, Ordering::Relaxed) + 1;
        let active = stats.viewers_active.fetch_add(1, Ordering::Relaxed) + 1;
        info!(viewer = id, active, "Push viewer connected");
        Self {
            id,
            state: SubscriberState::Connected,
            parts: 0,
            stats,
        }
    }

    fn record_part(&mut self) {
        self.state = SubscriberState::Streaming;
        self.parts += 1;
        AtomicRelayStats::incr(&self.stats.parts_pushed);
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        if self.state != SubscriberState::ServerClosed {
            self.state = SubscriberState::Disconnected;
        }
        let active = self.stats.viewers_active.fetch_sub(1, Ordering::Relaxed) - 1;
        debug!(
            viewer = self.id,
            parts = self.parts,
            state = ?self.state,
            active,
            "Push viewer ended"
        );
    }
}

struct PushState {
    store: FrameStore,
    ticker: Interval,
    cancel: CancellationToken,
    subscriber: Subscriber,
}

/// Build the body stream for one push viewer.
///
/// The first part is emitted immediately, then one per `interval`. Ticks that
/// find the store empty write nothing. `shutdown` is the server-wide token;
/// the stream listens on a child of it.
pub fn push_stream(
    store: FrameStore,
    interval: Duration,
    shutdown: &CancellationToken,
    stats: Arc<AtomicRelayStats>,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    let mut ticker = tokio::time::interval(interval.max(MIN_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let state = PushState {
        store,
        ticker,
        cancel: shutdown.child_token(),
        subscriber: Subscriber::register(stats),
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            tokio::select! {
                biased;
                _ = state.cancel.cancelled() => {
                    state.subscriber.state = SubscriberState::ServerClosed;
                    return None;
                }
                _ = state.ticker.tick() => {
                    match state.store.get() {
                        Some(frame) => {
                            state.subscriber.record_part();
                            debug!(
                                viewer = state.subscriber.id,
                                sequence = frame.sequence,
                                "Pushing frame"
                            );
                            return Some((Ok(encode_part(&frame)), state));
                        }
                        None => continue,
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn part_layout() {
        let frame = Frame::new(Bytes::from_static(b"JPEG"), 1);
        let part = encode_part(&frame);
        assert_eq!(
            &part[..],
            b"--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 4\r\n\r\nJPEG\r\n"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn first_part_is_immediate_and_ticks_reread_the_store() {
        let store = FrameStore::new();
        store.set(b"frame-one".to_vec());
        let stats = Arc::new(AtomicRelayStats::new());
        let shutdown = CancellationToken::new();

        let mut stream = Box::pin(push_stream(
            store.clone(),
            Duration::from_millis(2000),
            &shutdown,
            Arc::clone(&stats),
        ));
        assert_eq!(stats.viewers_active(), 1);

        let start = tokio::time::Instant::now();
        let first = stream.next().await.unwrap().unwrap();
        assert!(contains(&first, b"frame-one"));
        assert!(start.elapsed() < Duration::from_millis(1));

        store.set(b"frame-two".to_vec());
        let second = stream.next().await.unwrap().unwrap();
        assert!(contains(&second, b"frame-two"));
        assert!(!contains(&second, b"frame-one"));
        assert!(start.elapsed() >= Duration::from_millis(2000));

        assert_eq!(stats.snapshot().parts_pushed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_stream_releases_the_viewer() {
        let store = FrameStore::new();
        store.set(b"jpeg".to_vec());
        let stats = Arc::new(AtomicRelayStats::new());
        let shutdown = CancellationToken::new();

        let interval = Duration::from_millis(50);
        let mut a = Box::pin(push_stream(store.clone(), interval, &shutdown, Arc::clone(&stats)));
        let b = Box::pin(push_stream(store.clone(), interval, &shutdown, Arc::clone(&stats)));
        assert_eq!(stats.viewers_active(), 2);

        a.next().await.unwrap().unwrap();
        drop(a);
        assert_eq!(stats.viewers_active(), 1);
        drop(b);
        assert_eq!(stats.viewers_active(), 0);
        assert_eq!(stats.snapshot().viewers_total, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_ends_the_stream() {
        let store = FrameStore::new();
        store.set(b"jpeg".to_vec());
        let stats = Arc::new(AtomicRelayStats::new());
        let shutdown = CancellationToken::new();

        let mut stream = Box::pin(push_stream(
            store,
            Duration::from_millis(50),
            &shutdown,
            Arc::clone(&stats),
        ));
        stream.next().await.unwrap().unwrap();

        shutdown.cancel();
        assert!(stream.next().await.is_none());
        // Ended streams have dropped their state
        assert_eq!(stats.viewers_active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_ticks_write_nothing() {
        let store = FrameStore::new();
        let stats = Arc::new(AtomicRelayStats::new());
        let shutdown = CancellationToken::new();

        let mut stream = Box::pin(push_stream(
            store.clone(),
            Duration::from_millis(100),
            &shutdown,
            Arc::clone(&stats),
        ));
        let pending = tokio::time::timeout(Duration::from_millis(350), stream.next()).await;
        assert!(pending.is_err());
        assert_eq!(stats.snapshot().parts_pushed, 0);

        store.set(b"late".to_vec());
        let part = stream.next().await.unwrap().unwrap();
        assert!(contains(&part, b"late"));
    }
}
