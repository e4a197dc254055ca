//! Relay session state machine.
//!
//! # Lifecycle
//! ```text
//! Dialing ──first client frame──▶ Buffering
//!    │                               │
//!    └────────upstream open──────────┴──▶ Active ──either leg ends──▶ Draining ──▶ Closed
//! ```
//!
//! One task drives a session from start to finish. That task is the only
//! writer of the pending queue and also performs the flush, so a client frame
//! racing the upstream open is either queued before the flush or read by the
//! forwarding loop after it, never both and never neither.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{stream, SinkExt, StreamExt};

use crate::config::{ApiKey, RelayConfig, TimeoutConfig};
use crate::error::RelayError;
use crate::observability::metrics;
use crate::relay::connector::{Leg, LegSink, LegStream, UpstreamConnector};
use crate::relay::frame::{CloseReason, RelayFrame};
use crate::relay::pending::PendingQueue;
use crate::relay::target::UpstreamTarget;
use crate::relay::tracker::{SessionGuard, SessionId};
use crate::resilience::timeouts::Deadlines;

/// Lifecycle state of a relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Upstream dial in flight, nothing queued yet.
    Dialing,
    /// Upstream dial in flight, client frames queued.
    Buffering,
    /// Both legs open, frames forwarded in both directions.
    Active,
    /// One leg ended; the other is being closed.
    Draining,
    /// Both legs released.
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    MissingCredential,
    DialFailed,
    DialTimedOut,
    BufferExhausted,
    ClientLeftDuringDial,
    ClientClosed,
    UpstreamClosed,
    ClientFailed,
    UpstreamFailed,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::MissingCredential => "missing_credential",
            Termination::DialFailed => "dial_failed",
            Termination::DialTimedOut => "dial_timed_out",
            Termination::BufferExhausted => "buffer_exhausted",
            Termination::ClientLeftDuringDial => "client_left_during_dial",
            Termination::ClientClosed => "client_closed",
            Termination::UpstreamClosed => "upstream_closed",
            Termination::ClientFailed => "client_failed",
            Termination::UpstreamFailed => "upstream_failed",
        }
    }
}

/// Per-session limits, derived from config once at startup.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub dial_timeout: Duration,
    pub close_timeout: Duration,
    pub max_pending_frames: usize,
    pub max_pending_bytes: usize,
}

impl RelaySettings {
    pub fn from_config(timeouts: &TimeoutConfig, relay: &RelayConfig) -> Self {
        Self {
            dial_timeout: Deadlines::from(timeouts).dial,
            close_timeout: Duration::from_millis(relay.close_timeout_ms),
            max_pending_frames: relay.max_pending_frames,
            max_pending_bytes: relay.max_pending_bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Client,
    Upstream,
}

impl Side {
    fn direction(self) -> &'static str {
        match self {
            Side::Client => "client_to_upstream",
            Side::Upstream => "upstream_to_client",
        }
    }
}

/// How the forwarding phase ended.
enum Ending {
    Closed(Side, Option<CloseReason>),
    Failed(Side, RelayError),
}

/// One client connection paired with one upstream connection.
pub struct RelaySession<C> {
    guard: SessionGuard,
    target: UpstreamTarget,
    key: Option<ApiKey>,
    connector: Arc<C>,
    settings: RelaySettings,
    state: SessionState,
}

impl<C: UpstreamConnector> RelaySession<C> {
    pub fn new(
        guard: SessionGuard,
        target: UpstreamTarget,
        key: Option<ApiKey>,
        connector: Arc<C>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            guard,
            target,
            key,
            connector,
            settings,
            state: SessionState::Dialing,
        }
    }

    pub fn id(&self) -> SessionId {
        self.guard.id()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session until both legs are released.
    pub async fn run(mut self, client: Leg) -> Termination {
        let termination = self.drive(client).await;
        self.transition(SessionState::Closed);
        self.guard.set_termination(termination.as_str());
        tracing::info!(
            session_id = %self.id(),
            termination = termination.as_str(),
            "Relay session finished"
        );
        termination
    }

    async fn drive(&mut self, client: Leg) -> Termination {
        let Leg {
            sink: mut client_tx,
            stream: mut client_rx,
        } = client;

        let Some(key) = self.key.clone() else {
            tracing::warn!(
                session_id = %self.id(),
                credential = %self.target.credential,
                "Upstream credential not configured; refusing relay"
            );
            close_leg(
                &mut client_tx,
                Some(CloseReason::policy("Upstream credential not configured")),
                self.settings.close_timeout,
            )
            .await;
            return Termination::MissingCredential;
        };

        let (upstream, pending) = match self.dial(&key, &mut client_tx, &mut client_rx).await {
            Ok(opened) => opened,
            Err(termination) => return termination,
        };

        self.transition(SessionState::Active);
        let Leg {
            sink: mut upstream_tx,
            stream: mut upstream_rx,
        } = upstream;

        let queued = pending.len();
        let mut backlog = stream::iter(pending.into_frames().map(Ok::<RelayFrame, RelayError>));
        if let Err(err) = upstream_tx.send_all(&mut backlog).await {
            tracing::error!(session_id = %self.id(), error = %err, "Failed to flush pending frames upstream");
            self.transition(SessionState::Draining);
            close_leg(&mut client_tx, Some(CloseReason::internal("Upstream error")), self.settings.close_timeout).await;
            return Termination::UpstreamFailed;
        }
        if queued > 0 {
            tracing::debug!(session_id = %self.id(), frames = queued, "Flushed pending frames upstream");
        }

        let ending = tokio::select! {
            end = pump(Side::Client, &mut client_rx, &mut upstream_tx) => end,
            end = pump(Side::Upstream, &mut upstream_rx, &mut client_tx) => end,
        };
        self.transition(SessionState::Draining);

        let limit = self.settings.close_timeout;
        match ending {
            Ending::Closed(Side::Client, reason) => {
                tracing::debug!(session_id = %self.id(), close = ?reason, "Client closed");
                close_leg(&mut upstream_tx, reason.map(CloseReason::sanitized), limit).await;
                drain(&mut upstream_rx, limit).await;
                finish(&mut client_tx, limit).await;
                Termination::ClientClosed
            }
            Ending::Closed(Side::Upstream, reason) => {
                tracing::debug!(session_id = %self.id(), close = ?reason, "Upstream closed");
                close_leg(&mut client_tx, reason.map(CloseReason::sanitized), limit).await;
                drain(&mut client_rx, limit).await;
                finish(&mut upstream_tx, limit).await;
                Termination::UpstreamClosed
            }
            Ending::Failed(Side::Client, err) => {
                tracing::error!(session_id = %self.id(), error = %err, "Client leg error");
                close_leg(&mut upstream_tx, Some(CloseReason::internal("Client error")), limit).await;
                Termination::ClientFailed
            }
            Ending::Failed(Side::Upstream, err) => {
                tracing::error!(session_id = %self.id(), error = %err, "Upstream leg error");
                close_leg(&mut client_tx, Some(CloseReason::internal("Upstream error")), limit).await;
                Termination::UpstreamFailed
            }
        }
    }

    /// Dial the upstream while queueing client frames.
    ///
    /// Returning early drops the dial future, which cancels the connect and
    /// releases any half-open upstream socket.
    async fn dial(
        &mut self,
        key: &ApiKey,
        client_tx: &mut LegSink,
        client_rx: &mut LegStream,
    ) -> Result<(Leg, PendingQueue), Termination> {
        let connector = Arc::clone(&self.connector);
        let target = self.target.clone();
        let limit = self.settings.close_timeout;
        let started = Instant::now();
        let mut pending = PendingQueue::new(self.settings.max_pending_frames, self.settings.max_pending_bytes);

        tracing::debug!(session_id = %self.id(), upstream = %target.url, "Dialing upstream");
        let dial = tokio::time::timeout(self.settings.dial_timeout, connector.connect(&target, key));
        tokio::pin!(dial);

        loop {
            tokio::select! {
                biased;

                dialed = &mut dial => {
                    metrics::record_dial(started);
                    return match dialed {
                        Ok(Ok(leg)) => {
                            tracing::debug!(
                                session_id = %self.id(),
                                pending = pending.len(),
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                "Upstream open"
                            );
                            Ok((leg, pending))
                        }
                        Ok(Err(err)) => {
                            tracing::warn!(session_id = %self.id(), upstream = %target.url, error = %err, "Upstream dial failed");
                            close_leg(client_tx, Some(CloseReason::internal("Upstream error")), limit).await;
                            Err(Termination::DialFailed)
                        }
                        Err(_) => {
                            let err = RelayError::DialTimeout(self.settings.dial_timeout);
                            tracing::warn!(session_id = %self.id(), upstream = %target.url, error = %err, "Upstream dial cancelled");
                            close_leg(client_tx, Some(CloseReason::internal("Upstream timeout")), limit).await;
                            Err(Termination::DialTimedOut)
                        }
                    };
                }

                incoming = client_rx.next() => match incoming {
                    Some(Ok(frame)) if frame.is_data() => {
                        if let Err(err) = pending.push(frame) {
                            tracing::warn!(session_id = %self.id(), error = %err, "Client outran upstream dial");
                            close_leg(client_tx, Some(CloseReason::internal("Relay buffer exhausted")), limit).await;
                            return Err(Termination::BufferExhausted);
                        }
                        if self.state == SessionState::Dialing {
                            self.transition(SessionState::Buffering);
                        }
                    }
                    Some(Ok(RelayFrame::Close(reason))) => {
                        tracing::debug!(session_id = %self.id(), close = ?reason, "Client left before upstream opened");
                        finish(client_tx, limit).await;
                        return Err(Termination::ClientLeftDuringDial);
                    }
                    Some(Ok(_)) => {}
                    None => {
                        tracing::debug!(session_id = %self.id(), "Client vanished before upstream opened");
                        return Err(Termination::ClientLeftDuringDial);
                    }
                    Some(Err(err)) => {
                        tracing::warn!(session_id = %self.id(), error = %err, "Client leg error during dial");
                        finish(client_tx, limit).await;
                        return Err(Termination::ClientFailed);
                    }
                },
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            tracing::trace!(session_id = %self.id(), from = ?self.state, to = ?next, "Session transition");
            self.state = next;
        }
    }
}

/// Forward data frames from `source` into `sink` until `source` ends.
///
/// Control frames are answered by each transport and are not forwarded.
async fn pump(side: Side, source: &mut LegStream, sink: &mut LegSink) -> Ending {
    let other = match side {
        Side::Client => Side::Upstream,
        Side::Upstream => Side::Client,
    };
    loop {
        match source.next().await {
            Some(Ok(frame)) if frame.is_data() => {
                if let Err(err) = sink.send(frame).await {
                    return Ending::Failed(other, err);
                }
                metrics::record_frame(side.direction());
            }
            Some(Ok(RelayFrame::Close(reason))) => return Ending::Closed(side, reason),
            Some(Ok(_)) => {}
            Some(Err(err)) => return Ending::Failed(side, err),
            None => return Ending::Closed(side, None),
        }
    }
}

/// Send a close frame and shut the sink, bounded by `limit`. Errors mean the
/// peer is already gone and are ignored.
async fn close_leg(sink: &mut LegSink, reason: Option<CloseReason>, limit: Duration) {
    let closing = async {
        sink.send(RelayFrame::Close(reason)).await?;
        sink.close().await
    };
    match tokio::time::timeout(limit, closing).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::trace!(error = %err, "Close frame not delivered"),
        Err(_) => tracing::debug!("Timed out delivering close frame"),
    }
}

/// Flush and shut a sink whose peer already started the close handshake.
async fn finish(sink: &mut LegSink, limit: Duration) {
    let _ = tokio::time::timeout(limit, sink.close()).await;
}

/// Read until the peer acknowledges the close, bounded by `limit`.
async fn drain(source: &mut LegStream, limit: Duration) {
    let draining = async {
        while let Some(item) = source.next().await {
            if matches!(item, Ok(RelayFrame::Close(_)) | Err(_)) {
                break;
            }
        }
    };
    let _ = tokio::time::timeout(limit, draining).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::frame::{CLOSE_INTERNAL, CLOSE_POLICY};
    use crate::relay::tracker::SessionTracker;
    use bytes::Bytes;
    use futures_util::sink;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::{mpsc, Notify};

    /// The far end of an in-memory leg.
    struct Peer {
        to_session: mpsc::UnboundedSender<Result<RelayFrame, RelayError>>,
        from_session: mpsc::UnboundedReceiver<RelayFrame>,
    }

    impl Peer {
        fn send(&self, frame: RelayFrame) {
            self.to_session.send(Ok(frame)).unwrap();
        }

        async fn recv(&mut self) -> RelayFrame {
            tokio::time::timeout(Duration::from_secs(2), self.from_session.recv())
                .await
                .expect("timed out waiting for frame")
                .expect("session dropped leg")
        }
    }

    fn leg_pair() -> (Leg, Peer) {
        let (to_session, session_rx) = mpsc::unbounded_channel();
        let (session_tx, from_session) = mpsc::unbounded_channel();
        let sink = sink::unfold(session_tx, |tx: mpsc::UnboundedSender<RelayFrame>, frame: RelayFrame| async move {
            tx.send(frame)
                .map_err(|_| RelayError::ClientProtocol("peer gone".into()))?;
            Ok::<_, RelayError>(tx)
        });
        let stream = stream::unfold(session_rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) });
        (Leg::new(Box::pin(sink), stream.boxed()), Peer { to_session, from_session })
    }

    enum Behavior {
        OpenWhenReleased,
        Fail,
        Hang,
    }

    struct MockConnector {
        behavior: Behavior,
        release: Notify,
        upstream: Mutex<Option<Leg>>,
        dials: AtomicUsize,
    }

    impl MockConnector {
        fn new(behavior: Behavior) -> (Arc<Self>, Peer) {
            let (leg, peer) = leg_pair();
            let connector = Arc::new(Self {
                behavior,
                release: Notify::new(),
                upstream: Mutex::new(Some(leg)),
                dials: AtomicUsize::new(0),
            });
            (connector, peer)
        }
    }

    impl UpstreamConnector for MockConnector {
        async fn connect(&self, _target: &UpstreamTarget, _key: &ApiKey) -> Result<Leg, RelayError> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::OpenWhenReleased => {
                    self.release.notified().await;
                    Ok(self.upstream.lock().unwrap().take().expect("dialed twice"))
                }
                Behavior::Fail => Err(RelayError::UpstreamTransport("connection refused".into())),
                Behavior::Hang => std::future::pending().await,
            }
        }
    }

    fn settings() -> RelaySettings {
        RelaySettings {
            dial_timeout: Duration::from_secs(5),
            close_timeout: Duration::from_millis(100),
            max_pending_frames: 16,
            max_pending_bytes: 1024,
        }
    }

    fn target() -> UpstreamTarget {
        UpstreamTarget {
            url: "wss://upstream.test/v1/stream".into(),
            key_header: "xi-api-key".into(),
            origin: None,
            credential: "elevenlabs".into(),
        }
    }

    fn spawn_session(
        connector: Arc<MockConnector>,
        key: Option<ApiKey>,
        settings: RelaySettings,
    ) -> (tokio::task::JoinHandle<Termination>, Peer) {
        let (client_leg, client) = leg_pair();
        let tracker = SessionTracker::new();
        let session = RelaySession::new(tracker.track(), target(), key, connector, settings);
        (tokio::spawn(session.run(client_leg)), client)
    }

    fn key() -> Option<ApiKey> {
        Some(ApiKey::new("xi-test"))
    }

    fn close_code(frame: &RelayFrame) -> Option<u16> {
        match frame {
            RelayFrame::Close(Some(reason)) => Some(reason.code),
            _ => None,
        }
    }

    #[tokio::test]
    async fn frames_sent_while_dialing_arrive_in_order_before_later_frames() {
        let (connector, mut upstream) = MockConnector::new(Behavior::OpenWhenReleased);
        let (handle, client) = spawn_session(connector.clone(), key(), settings());

        client.send(RelayFrame::Text("one".into()));
        client.send(RelayFrame::Binary(Bytes::from_static(b"\x00\x01two")));
        client.send(RelayFrame::Text("three".into()));
        tokio::time::sleep(Duration::from_millis(50)).await;

        connector.release.notify_one();
        client.send(RelayFrame::Text("four".into()));

        assert_eq!(upstream.recv().await, RelayFrame::Text("one".into()));
        assert_eq!(upstream.recv().await, RelayFrame::Binary(Bytes::from_static(b"\x00\x01two")));
        assert_eq!(upstream.recv().await, RelayFrame::Text("three".into()));
        assert_eq!(upstream.recv().await, RelayFrame::Text("four".into()));

        client.send(RelayFrame::Close(None));
        assert_eq!(handle.await.unwrap(), Termination::ClientClosed);
        assert_eq!(connector.dials.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_credential_never_dials_and_closes_with_policy() {
        let (connector, _upstream) = MockConnector::new(Behavior::OpenWhenReleased);
        let (handle, mut client) = spawn_session(connector.clone(), None, settings());

        assert_eq!(close_code(&client.recv().await), Some(CLOSE_POLICY));
        assert_eq!(handle.await.unwrap(), Termination::MissingCredential);
        assert_eq!(connector.dials.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dial_timeout_closes_client_and_drops_queue() {
        let (connector, _upstream) = MockConnector::new(Behavior::Hang);
        let mut short = settings();
        short.dial_timeout = Duration::from_secs(1);
        let (handle, mut client) = spawn_session(connector, key(), short);

        client.send(RelayFrame::Text("never delivered".into()));
        assert_eq!(close_code(&client.recv().await), Some(CLOSE_INTERNAL));
        assert_eq!(handle.await.unwrap(), Termination::DialTimedOut);
    }

    #[tokio::test]
    async fn dial_failure_closes_client_with_internal_error() {
        let (connector, _upstream) = MockConnector::new(Behavior::Fail);
        let (handle, mut client) = spawn_session(connector, key(), settings());

        assert_eq!(close_code(&client.recv().await), Some(CLOSE_INTERNAL));
        assert_eq!(handle.await.unwrap(), Termination::DialFailed);
    }

    #[tokio::test]
    async fn client_leaving_during_dial_cancels_it() {
        let (connector, mut upstream) = MockConnector::new(Behavior::OpenWhenReleased);
        let (handle, client) = spawn_session(connector.clone(), key(), settings());

        client.send(RelayFrame::Text("queued".into()));
        client.send(RelayFrame::Close(Some(CloseReason::new(1000, "bye"))));
        assert_eq!(handle.await.unwrap(), Termination::ClientLeftDuringDial);

        // The upstream leg was never handed out, so nothing reached it.
        assert!(connector.upstream.lock().unwrap().is_some());
        assert!(upstream.from_session.try_recv().is_err());
    }

    #[tokio::test]
    async fn overflowing_the_pending_queue_closes_client() {
        let (connector, _upstream) = MockConnector::new(Behavior::OpenWhenReleased);
        let mut tight = settings();
        tight.max_pending_frames = 2;
        let (handle, mut client) = spawn_session(connector, key(), tight);

        for i in 0..3 {
            client.send(RelayFrame::Text(format!("frame-{i}")));
        }
        assert_eq!(close_code(&client.recv().await), Some(CLOSE_INTERNAL));
        assert_eq!(handle.await.unwrap(), Termination::BufferExhausted);
    }

    #[tokio::test]
    async fn client_close_is_propagated_upstream() {
        let (connector, mut upstream) = MockConnector::new(Behavior::OpenWhenReleased);
        connector.release.notify_one();
        let (handle, client) = spawn_session(connector, key(), settings());

        client.send(RelayFrame::Close(Some(CloseReason::new(4000, "user hung up"))));
        assert_eq!(
            upstream.recv().await,
            RelayFrame::Close(Some(CloseReason::new(4000, "user hung up")))
        );
        assert_eq!(handle.await.unwrap(), Termination::ClientClosed);
    }

    #[tokio::test]
    async fn upstream_close_is_propagated_to_client() {
        let (connector, upstream) = MockConnector::new(Behavior::OpenWhenReleased);
        connector.release.notify_one();
        let (handle, mut client) = spawn_session(connector, key(), settings());

        upstream.send(RelayFrame::Close(Some(CloseReason::new(1000, "input timeout"))));
        assert_eq!(
            client.recv().await,
            RelayFrame::Close(Some(CloseReason::new(1000, "input timeout")))
        );
        assert_eq!(handle.await.unwrap(), Termination::UpstreamClosed);
    }

    #[tokio::test]
    async fn unsendable_upstream_close_code_becomes_internal_error() {
        let (connector, upstream) = MockConnector::new(Behavior::OpenWhenReleased);
        connector.release.notify_one();
        let (handle, mut client) = spawn_session(connector, key(), settings());

        upstream.send(RelayFrame::Close(Some(CloseReason::new(1006, "abnormal"))));
        assert_eq!(close_code(&client.recv().await), Some(CLOSE_INTERNAL));
        assert_eq!(handle.await.unwrap(), Termination::UpstreamClosed);
    }

    #[tokio::test]
    async fn upstream_error_closes_client_with_internal_error() {
        let (connector, upstream) = MockConnector::new(Behavior::OpenWhenReleased);
        connector.release.notify_one();
        let (handle, mut client) = spawn_session(connector, key(), settings());

        upstream
            .to_session
            .send(Err(RelayError::UpstreamTransport("reset by peer".into())))
            .unwrap();
        assert_eq!(close_code(&client.recv().await), Some(CLOSE_INTERNAL));
        assert_eq!(handle.await.unwrap(), Termination::UpstreamFailed);
    }

    #[tokio::test]
    async fn client_error_closes_upstream_with_internal_error() {
        let (connector, mut upstream) = MockConnector::new(Behavior::OpenWhenReleased);
        connector.release.notify_one();
        let (handle, client) = spawn_session(connector, key(), settings());

        client
            .to_session
            .send(Err(RelayError::ClientProtocol("bad frame".into())))
            .unwrap();
        assert_eq!(close_code(&upstream.recv().await), Some(CLOSE_INTERNAL));
        assert_eq!(handle.await.unwrap(), Termination::ClientFailed);
    }

    #[tokio::test]
    async fn binary_frames_keep_their_tag_in_both_directions() {
        let (connector, mut upstream) = MockConnector::new(Behavior::OpenWhenReleased);
        connector.release.notify_one();
        let (handle, mut client) = spawn_session(connector, key(), settings());

        let audio = Bytes::from((0u8..=255).collect::<Vec<_>>());
        client.send(RelayFrame::Binary(audio.clone()));
        assert_eq!(upstream.recv().await, RelayFrame::Binary(audio.clone()));

        upstream.send(RelayFrame::Binary(audio.clone()));
        upstream.send(RelayFrame::Text("{\"isFinal\":true}".into()));
        assert_eq!(client.recv().await, RelayFrame::Binary(audio));
        assert_eq!(client.recv().await, RelayFrame::Text("{\"isFinal\":true}".into()));

        client.send(RelayFrame::Close(None));
        assert_eq!(handle.await.unwrap(), Termination::ClientClosed);
    }
}
