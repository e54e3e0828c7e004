//! Transport seam between the connection manager and the wire.
//!
//! A [`Connector`] opens a [`Session`], which is split into a write half
//! ([`FrameSink`]) shared with the sender loop through a [`SessionLink`], and a
//! read half ([`FrameSource`]) driven by the connection manager.

use crate::connection::stopped;
use crate::error::{RelayError, RelayResult};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Write half of an open session.
#[async_trait]
pub trait FrameSink: Send {
    /// Write one text frame. `Ok` means the transport accepted the write.
    async fn send_text(&mut self, text: String) -> RelayResult<()>;

    /// Close the session from our side.
    async fn close(&mut self) -> RelayResult<()>;
}

/// Read half of an open session.
#[async_trait]
pub trait FrameSource: Send {
    /// Next inbound text frame. `None` once the peer has closed the session.
    async fn next_text(&mut self) -> Option<RelayResult<String>>;
}

/// An open session.
pub struct Session {
    pub sink: Box<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
}

/// Opens sessions to the remote endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> RelayResult<Session>;
}

struct Attached {
    sink: Box<dyn FrameSink>,
    ended: watch::Receiver<bool>,
}

/// The write half of the current session, if any.
///
/// The connection manager attaches and detaches it; the sender loop writes
/// through it. Detaching ends any in-flight write on the old session first,
/// so teardown never waits on a stalled transport.
#[derive(Clone, Default)]
pub struct SessionLink {
    sink: Arc<Mutex<Option<Attached>>>,
    ended: Arc<parking_lot::Mutex<Option<watch::Sender<bool>>>>,
}

impl SessionLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn attach(&self, sink: Box<dyn FrameSink>) {
        let (ended_tx, ended) = watch::channel(false);
        *self.ended.lock() = Some(ended_tx);
        *self.sink.lock().await = Some(Attached { sink, ended });
    }

    pub(crate) async fn detach(&self) -> Option<Box<dyn FrameSink>> {
        if let Some(ended) = self.ended.lock().take() {
            ended.send_replace(true);
        }
        self.sink.lock().await.take().map(|attached| attached.sink)
    }

    /// Write one frame on the current session.
    ///
    /// Fails with a transport error if the session is detached mid-write.
    pub async fn transmit(&self, text: String) -> RelayResult<()> {
        let mut guard = self.sink.lock().await;
        let attached = guard.as_mut().ok_or(RelayError::NotConnected)?;
        let mut ended = attached.ended.clone();
        tokio::select! {
            _ = stopped(&mut ended) => Err(RelayError::Transport(
                "session ended during write".to_string(),
            )),
            result = attached.sink.send_text(text) => result,
        }
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects over WebSocket, optionally with a bearer token.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    api_key: Option<String>,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            url: url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> RelayResult<Session> {
        let mut request = self.url.as_str().into_client_request()?;
        if let Some(api_key) = &self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| RelayError::InvalidConfig(format!("invalid api key: {}", e)))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        info!(url = %self.url, authenticated = self.api_key.is_some(), "Connecting");
        let (ws_stream, response) = connect_async(request).await?;
        debug!(status = %response.status(), "WebSocket handshake complete");

        let (write, read) = ws_stream.split();
        Ok(Session {
            sink: Box::new(WsSink { write }),
            source: Box::new(WsSource { read }),
        })
    }
}

struct WsSink {
    write: SplitSink<WsStream, WsMessage>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> RelayResult<()> {
        self.write.send(WsMessage::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> RelayResult<()> {
        self.write.close().await?;
        Ok(())
    }
}

struct WsSource {
    read: SplitStream<WsStream>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next_text(&mut self) -> Option<RelayResult<String>> {
        loop {
            match self.read.next().await? {
                Ok(WsMessage::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(WsMessage::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => {
                        warn!(len = data.len(), "Discarding non-UTF-8 binary frame");
                    }
                },
                Ok(WsMessage::Close(frame)) => {
                    info!(frame = ?frame, "Connection closed by remote");
                    return None;
                }
                // Pings are answered by tungstenite on the next read or write.
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}
