//! Session legs and the upstream dialer.

use std::future::Future;
use std::pin::Pin;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::BoxStream;
use futures_util::{future, Sink, SinkExt, StreamExt, TryStreamExt};
use tokio_tungstenite::tungstenite::{self, client::IntoClientRequest};
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};

use crate::config::ApiKey;
use crate::error::RelayError;
use crate::relay::frame::RelayFrame;
use crate::relay::target::UpstreamTarget;

pub type LegSink = Pin<Box<dyn Sink<RelayFrame, Error = RelayError> + Send>>;
pub type LegStream = BoxStream<'static, Result<RelayFrame, RelayError>>;

/// One side of a relay session, split into its write and read halves.
pub struct Leg {
    pub sink: LegSink,
    pub stream: LegStream,
}

impl Leg {
    pub fn new(sink: LegSink, stream: LegStream) -> Self {
        Self { sink, stream }
    }

    /// Wrap an accepted client socket.
    pub fn from_client(socket: WebSocket) -> Self {
        let (tx, rx) = socket.split();
        let sink = tx
            .sink_map_err(RelayError::from_client)
            .with(|frame: RelayFrame| future::ready(Ok::<Message, RelayError>(frame.into())));
        let stream = rx.map_ok(RelayFrame::from).map_err(RelayError::from_client);
        Self::new(Box::pin(sink), stream.boxed())
    }
}

/// Opens the upstream leg of a session.
pub trait UpstreamConnector: Send + Sync + 'static {
    fn connect(
        &self,
        target: &UpstreamTarget,
        key: &ApiKey,
    ) -> impl Future<Output = Result<Leg, RelayError>> + Send;
}

/// Dials real upstreams with tokio-tungstenite.
#[derive(Debug, Clone, Default)]
pub struct TungsteniteConnector;

impl UpstreamConnector for TungsteniteConnector {
    async fn connect(&self, target: &UpstreamTarget, key: &ApiKey) -> Result<Leg, RelayError> {
        let mut request = target
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| RelayError::InvalidTarget(e.to_string()))?;

        let headers = request.headers_mut();
        let key_header = HeaderName::from_bytes(target.key_header.as_bytes())
            .map_err(|e| RelayError::InvalidTarget(e.to_string()))?;
        let key_value = HeaderValue::from_str(key.expose())
            .map_err(|_| RelayError::InvalidTarget("credential is not a valid header value".to_string()))?;
        headers.insert(key_header, key_value);
        if let Some(origin) = &target.origin {
            let origin = HeaderValue::from_str(origin).map_err(|e| RelayError::InvalidTarget(e.to_string()))?;
            headers.insert("origin", origin);
        }

        let (socket, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(RelayError::from_upstream)?;

        let (tx, rx) = socket.split();
        let sink = tx
            .sink_map_err(RelayError::from_upstream)
            .with(|frame: RelayFrame| future::ready(Ok::<tungstenite::Message, RelayError>(frame.into())));
        let stream = rx.map_ok(RelayFrame::from).map_err(RelayError::from_upstream);
        Ok(Leg::new(Box::pin(sink), stream.boxed()))
    }
}
