//! WebSocket broadcaster: pushes every detected code to connected subscribers.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting connections and upgrading them to WebSocket sessions on the
//!    configured path (anything else gets an HTTP 404).
//! 3. Registering each session in the [`SubscriberRegistry`] under a fresh
//!    connection id.
//! 4. Running one task per session that forwards queued frames, sends a
//!    keepalive ping every `ping_interval`, and notices when the peer leaves.
//! 5. Serialising each detected code once and queuing it for every subscriber.
//!
//! # Wire format
//!
//! Subscribers only ever receive text frames of this shape:
//!
//! ```json
//! {"code":"mfa_code","payload":{"mfa_code":{"code":"481243"}}}
//! ```
//!
//! plus WebSocket pings carrying `keepalive`.  Nothing sent by a subscriber is
//! interpreted; a Close frame or EOF ends its session.
//!
//! # Shutdown
//!
//! The accept loop uses a 200 ms `accept()` timeout so it can observe the
//! shared `running` flag.  Session tasks check the flag on every keepalive
//! tick.

use std::io;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use postmaster_core::{DetectionEvent, WireMessage};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
        Message as WsMessage,
    },
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{BroadcasterSettings, DetectionHandler};
use crate::infrastructure::registry::{
    ChannelSubscriber, OutboundFrame, Subscriber, SubscriberRegistry,
};

/// Payload of the keepalive ping sent to every subscriber.
pub const KEEPALIVE_PAYLOAD: &[u8] = b"keepalive";

const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors produced by the broadcaster.
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// The listener could not be bound.
    #[error("failed to bind subscriber listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The subscriber's connection task has gone away.
    #[error("subscriber {0} is disconnected")]
    Disconnected(Uuid),

    /// The outbound message could not be serialised.
    #[error("failed to serialise broadcast: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Outcome of one [`Broadcaster::broadcast_code`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Subscribers the message was queued for.
    pub delivered: usize,
    /// Subscribers that had disconnected and were removed.
    pub failed: usize,
}

/// Handle to a running accept loop.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// The address the listener actually bound (useful with port `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the accept loop to exit.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!("accept loop task failed: {e}");
        }
    }
}

/// Fans detected codes out to every connected WebSocket subscriber.
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
    settings: Arc<BroadcasterSettings>,
}

impl Broadcaster {
    pub fn new(settings: BroadcasterSettings) -> Self {
        Self {
            registry: Arc::new(SubscriberRegistry::new()),
            settings: Arc::new(settings),
        }
    }

    /// The live subscriber registry.
    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Queues `code` for every subscriber.
    ///
    /// The message is serialised once.  A subscriber that fails is logged and
    /// skipped; after the walk every failed subscriber is removed from the
    /// registry.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::Serialize`] if the message cannot be encoded,
    /// in which case nothing is sent.
    pub fn broadcast_code(&self, code: &str) -> Result<DeliveryReport, BroadcastError> {
        let json = WireMessage::mfa_code(code).to_json()?;

        let mut report = DeliveryReport::default();
        let mut failed = Vec::new();
        self.registry.for_each(|id, subscriber| {
            match subscriber.send(OutboundFrame::Text(json.clone())) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(connection_id = %id, "broadcast failed: {e}");
                    failed.push(*id);
                }
            }
        });

        for id in &failed {
            self.registry.remove(id);
        }
        report.failed = failed.len();

        debug!(
            delivered = report.delivered,
            failed = report.failed,
            "broadcast complete"
        );
        Ok(report)
    }

    /// Binds the listener and spawns the accept loop.
    ///
    /// Returns once the listener is bound; the loop keeps running in the
    /// background until `running` is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::Bind`] if the address is in use or the
    /// process lacks permission to bind it.
    pub async fn listen_and_serve(
        self: &Arc<Self>,
        running: Arc<AtomicBool>,
    ) -> Result<ServerHandle, BroadcastError> {
        let addr = self.settings.bind_addr;
        let bind_error = |source| BroadcastError::Bind { addr, source };

        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        info!(
            "subscriber listener on ws://{local_addr}{}",
            self.settings.path
        );

        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            this.accept_loop(listener, running).await;
        });

        Ok(ServerHandle { local_addr, task })
    }

    async fn accept_loop(&self, listener: TcpListener, running: Arc<AtomicBool>) {
        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping accept loop");
                break;
            }

            match timeout(ACCEPT_POLL, listener.accept()).await {
                Ok(Ok((stream, peer_addr))) => {
                    debug!("new connection from {peer_addr}");
                    let registry = Arc::clone(&self.registry);
                    let settings = Arc::clone(&self.settings);
                    let running = Arc::clone(&running);
                    tokio::spawn(async move {
                        handle_session(stream, peer_addr, registry, settings, running).await;
                    });
                }
                Ok(Err(e)) => {
                    error!("accept error: {e}");
                }
                Err(_) => {
                    // No connection in the last poll window; re-check the flag.
                }
            }
        }
    }
}

impl DetectionHandler for Broadcaster {
    fn on_detection(&self, event: &DetectionEvent) {
        if let Err(e) = self.broadcast_code(&event.code) {
            error!("failed to broadcast code: {e}");
        }
    }
}

// ── Per-session handler ───────────────────────────────────────────────────────

async fn handle_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<SubscriberRegistry>,
    settings: Arc<BroadcasterSettings>,
    running: Arc<AtomicBool>,
) {
    let expected_path = settings.path.clone();
    let check_path = move |request: &Request, response: Response| {
        if request.uri().path() == expected_path {
            Ok(response)
        } else {
            let mut rejection = ErrorResponse::new(Some("not found".to_string()));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            Err(rejection)
        }
    };

    let ws_stream = match accept_hdr_async(raw_stream, check_path).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("handshake with {peer_addr} rejected: {e}");
            return;
        }
    };

    let id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel();
    registry.add(id, Box::new(ChannelSubscriber::new(id, tx)));
    info!(connection_id = %id, "subscriber {peer_addr} connected");

    let (mut sink, mut stream) = ws_stream.split();

    // A zero period would make `interval` panic.
    let mut keepalive = interval(settings.ping_interval.max(Duration::from_millis(1)));
    // The first tick completes immediately; the first ping is due one period in.
    keepalive.tick().await;

    loop {
        tokio::select! {
            _ = keepalive.tick() => {
                if !running.load(Ordering::Relaxed) {
                    debug!(connection_id = %id, "shutdown flag set; closing session");
                    break;
                }
                if let Err(e) = sink.send(WsMessage::Ping(KEEPALIVE_PAYLOAD.to_vec())).await {
                    debug!(connection_id = %id, "keepalive failed: {e}");
                    break;
                }
            }

            frame = rx.recv() => {
                let Some(frame) = frame else {
                    debug!(connection_id = %id, "removed from registry");
                    break;
                };
                let message = match frame {
                    OutboundFrame::Text(text) => WsMessage::Text(text),
                    OutboundFrame::Ping(payload) => WsMessage::Ping(payload),
                };
                if let Err(e) = sink.send(message).await {
                    warn!(connection_id = %id, "send failed: {e}");
                    break;
                }
            }

            incoming = stream.next() => match incoming {
                Some(Ok(WsMessage::Close(_))) | None => {
                    debug!(connection_id = %id, "peer closed the connection");
                    break;
                }
                Some(Ok(_)) => {
                    // Client messages carry no meaning; pongs land here too.
                }
                Some(Err(e)) => {
                    debug!(connection_id = %id, "read failed: {e}");
                    break;
                }
            },
        }
    }

    registry.remove(&id);
    let _ = sink.close().await;
    info!(connection_id = %id, "subscriber {peer_addr} disconnected");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every frame it is handed.
    #[derive(Clone, Default)]
    struct RecordingSubscriber {
        frames: Arc<Mutex<Vec<OutboundFrame>>>,
    }

    impl Subscriber for RecordingSubscriber {
        fn send(&self, frame: OutboundFrame) -> Result<(), BroadcastError> {
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }
    }

    /// Always reports a dead connection.
    struct DeadSubscriber(Uuid);

    impl Subscriber for DeadSubscriber {
        fn send(&self, _frame: OutboundFrame) -> Result<(), BroadcastError> {
            Err(BroadcastError::Disconnected(self.0))
        }
    }

    fn broadcaster() -> Broadcaster {
        Broadcaster::new(BroadcasterSettings::default())
    }

    #[test]
    fn test_broadcast_with_no_subscribers_is_a_no_op() {
        let report = broadcaster().broadcast_code("123456").unwrap();
        assert_eq!(report, DeliveryReport::default());
    }

    #[test]
    fn test_broadcast_sends_wire_json_to_every_subscriber() {
        // Arrange
        let broadcaster = broadcaster();
        let recorders: Vec<RecordingSubscriber> =
            (0..3).map(|_| RecordingSubscriber::default()).collect();
        for recorder in &recorders {
            broadcaster
                .registry()
                .add(Uuid::new_v4(), Box::new(recorder.clone()));
        }

        // Act
        let report = broadcaster.broadcast_code("481243").unwrap();

        // Assert
        assert_eq!(report.delivered, 3);
        let expected = r#"{"code":"mfa_code","payload":{"mfa_code":{"code":"481243"}}}"#;
        for recorder in &recorders {
            assert_eq!(
                *recorder.frames.lock().unwrap(),
                vec![OutboundFrame::Text(expected.to_string())]
            );
        }
    }

    #[test]
    fn test_failing_subscriber_is_removed_and_others_still_receive() {
        // Arrange
        let broadcaster = broadcaster();
        let healthy = RecordingSubscriber::default();
        let dead_id = Uuid::new_v4();
        broadcaster
            .registry()
            .add(Uuid::new_v4(), Box::new(healthy.clone()));
        broadcaster
            .registry()
            .add(Uuid::new_v4(), Box::new(healthy.clone()));
        broadcaster
            .registry()
            .add(dead_id, Box::new(DeadSubscriber(dead_id)));

        // Act
        let report = broadcaster.broadcast_code("111111").unwrap();

        // Assert
        assert_eq!(report, DeliveryReport { delivered: 2, failed: 1 });
        assert_eq!(broadcaster.registry().len(), 2);
        assert!(!broadcaster.registry().remove(&dead_id));
        assert_eq!(healthy.frames.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_detection_handler_broadcasts_event_code() {
        let broadcaster = broadcaster();
        let recorder = RecordingSubscriber::default();
        broadcaster
            .registry()
            .add(Uuid::new_v4(), Box::new(recorder.clone()));

        broadcaster.on_detection(&DetectionEvent::synthetic("654321"));

        let frames = recorder.frames.lock().unwrap();
        assert!(matches!(&frames[0], OutboundFrame::Text(t) if t.contains("654321")));
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        // Arrange: occupy a port first.
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = occupied.local_addr().unwrap();
        let broadcaster = Arc::new(Broadcaster::new(BroadcasterSettings {
            bind_addr: addr,
            ..BroadcasterSettings::default()
        }));

        // Act
        let result = broadcaster
            .listen_and_serve(Arc::new(AtomicBool::new(true)))
            .await;

        // Assert
        assert!(matches!(result, Err(BroadcastError::Bind { .. })));
    }
}
