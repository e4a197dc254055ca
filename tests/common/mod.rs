//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderMap;
use tokio_tungstenite::tungstenite::protocol::{frame::coding::CloseCode, CloseFrame};
use tokio_tungstenite::tungstenite::Message;

use relay_gateway::config::{Credentials, GatewayConfig, RelayRouteConfig};
use relay_gateway::{HttpServer, Shutdown};

/// Start the gateway on an ephemeral port.
pub async fn spawn_gateway(mut config: GatewayConfig, credentials: Credentials) -> (SocketAddr, Shutdown) {
    config.listener.bind_address = "127.0.0.1:0".into();
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, credentials).unwrap();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

/// Gateway config with a single relay route pointing at `upstream`.
pub fn relay_config(upstream: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.timeouts.dial_ms = 2_000;
    config.relay.routes = vec![RelayRouteConfig {
        name: "voice".into(),
        prefix: "/elevenlabs/".into(),
        upstream_url: format!("ws://{upstream}"),
        credential: "voice".into(),
        origin: Some("https://voice.example.com".into()),
        ..RelayRouteConfig::default()
    }];
    config
}

/// What the mock upstream observed.
#[derive(Debug)]
pub enum UpstreamEvent {
    Handshake { uri: String, headers: HeaderMap },
    Received(Message),
}

/// How the mock upstream behaves after the handshake.
#[derive(Debug, Clone, Copy)]
pub enum UpstreamBehavior {
    /// Echo every data frame back.
    Echo,
    /// Close with the given code after the first data frame.
    CloseAfterFirst(u16, &'static str),
}

pub struct MockUpstream {
    pub addr: SocketAddr,
    pub events: mpsc::UnboundedReceiver<UpstreamEvent>,
}

impl MockUpstream {
    pub async fn next_event(&mut self) -> UpstreamEvent {
        tokio::time::timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("upstream event timed out")
            .expect("upstream event channel closed")
    }

    /// Next data or close frame, skipping control frames.
    pub async fn next_message(&mut self) -> Message {
        loop {
            match self.next_event().await {
                UpstreamEvent::Received(Message::Ping(_) | Message::Pong(_)) => continue,
                UpstreamEvent::Received(msg) => return msg,
                UpstreamEvent::Handshake { .. } => panic!("unexpected second handshake"),
            }
        }
    }
}

/// Start a WebSocket upstream that waits `handshake_delay` before answering
/// the upgrade.
pub async fn start_ws_upstream(handshake_delay: Duration, behavior: UpstreamBehavior) -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, events) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(handshake_delay).await;

                let handshake_tx = tx.clone();
                let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    let _ = handshake_tx.send(UpstreamEvent::Handshake {
                        uri: req.uri().to_string(),
                        headers: req.headers().clone(),
                    });
                    Ok(resp)
                };
                let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                    return;
                };

                while let Some(Ok(msg)) = ws.next().await {
                    let _ = tx.send(UpstreamEvent::Received(msg.clone()));
                    if !(msg.is_text() || msg.is_binary()) {
                        continue;
                    }
                    match behavior {
                        UpstreamBehavior::Echo => {
                            if ws.send(msg).await.is_err() {
                                break;
                            }
                        }
                        UpstreamBehavior::CloseAfterFirst(code, reason) => {
                            let _ = ws
                                .close(Some(CloseFrame {
                                    code: CloseCode::from(code),
                                    reason: reason.into(),
                                }))
                                .await;
                        }
                    }
                }
            });
        }
    });

    MockUpstream { addr, events }
}

/// An address nothing listens on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
