//! WebSocket transport: a single duplex connection.
//!
//! The socket transport dials the server's `ws` endpoint and keeps one
//! connection open for the life of the page. Downstream frames are JSON
//! server messages; upstream frames are JSON client messages.
//!
//! # Event Loop
//!
//! `connect` spawns a tokio task that pumps the connection:
//!
//! - Incoming text frames are decoded and fanned out to message handlers
//! - Outgoing messages arrive over an mpsc channel and are written out
//! - On connection loss the task re-dials with exponential backoff
//!
//! Messages submitted while disconnected are dropped with a warning,
//! never queued; any backlog left in the channel at disconnect time is
//! discarded before the next connection comes up.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::Result;
use crate::protocol::{ClientMessage, Endpoints, ServerMessage};
use crate::transport::backoff::{BackoffPolicy, ReconnectState};
use crate::transport::{HandlerSet, MessageHandler, StatusHandler, TransportStatus};

// ============================================================================
// Types
// ============================================================================

/// The dialed socket type: plain TCP or TLS depending on the origin.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// SocketInner
// ============================================================================

/// Shared state behind the [`SocketTransport`] facade.
pub(crate) struct SocketInner {
    /// Endpoint catalogue for the origin.
    endpoints: Endpoints,
    /// Whether to re-dial after a lost connection.
    reconnect: bool,
    /// Registered message and status callbacks.
    handlers: HandlerSet,
    /// True while traffic can flow.
    connected: AtomicBool,
    /// Handoff channel to the active pump task.
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    /// Cancels the pump task and any backoff wait.
    cancel: CancellationToken,
}

// ============================================================================
// SocketTransport
// ============================================================================

/// WebSocket wire strategy.
///
/// Cheap to clone; clones share the same connection and handlers.
#[derive(Clone)]
pub struct SocketTransport {
    inner: Arc<SocketInner>,
}

impl fmt::Debug for SocketTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketTransport")
            .field("connected", &self.is_connected())
            .field("reconnect", &self.inner.reconnect)
            .finish_non_exhaustive()
    }
}

impl SocketTransport {
    /// Creates a disconnected socket transport for the given origin.
    #[must_use]
    pub fn new(endpoints: Endpoints, reconnect: bool) -> Self {
        Self {
            inner: Arc::new(SocketInner {
                endpoints,
                reconnect,
                handlers: HandlerSet::default(),
                connected: AtomicBool::new(false),
                outbound: Mutex::new(None),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Registers a callback for decoded downstream messages.
    pub fn on_message(&self, handler: MessageHandler) {
        self.inner.handlers.add_message(handler);
    }

    /// Registers a callback for lifecycle changes.
    pub fn on_status(&self, handler: StatusHandler) {
        self.inner.handlers.add_status(handler);
    }

    /// Returns `true` while the connection can pass traffic.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Dials the server and starts the pump task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WebSocket`](crate::Error::WebSocket) if the
    /// handshake fails. A failed `connect` leaves the transport inert;
    /// reconnection only follows a connection that was once up.
    pub async fn connect(&self) -> Result<()> {
        let url = self.inner.endpoints.ws_url()?;
        self.inner.handlers.notify_status(TransportStatus::Connecting);

        debug!(url = %url, "Dialing WebSocket");
        let (ws, _response) = connect_async(url.as_str()).await?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        *self.inner.outbound.lock() = Some(outbound_tx);
        self.inner.connected.store(true, Ordering::SeqCst);
        self.inner.handlers.notify_status(TransportStatus::Connected);

        tokio::spawn(Self::run_loop(
            Arc::clone(&self.inner),
            url,
            ws,
            outbound_rx,
        ));

        Ok(())
    }

    /// Submits one upstream message.
    ///
    /// Messages submitted while disconnected are dropped with a warning.
    pub async fn send(&self, message: &ClientMessage) -> Result<()> {
        if !self.is_connected() {
            warn!(
                kind = message.kind(),
                "Socket disconnected. Dropping outbound message"
            );
            return Ok(());
        }

        let json = message.encode()?;
        let delivered = match self.inner.outbound.lock().as_ref() {
            Some(tx) => tx.send(json).is_ok(),
            None => false,
        };

        if !delivered {
            warn!(
                kind = message.kind(),
                "Socket pump gone. Dropping outbound message"
            );
        }
        Ok(())
    }

    /// Closes the connection and stops the reconnect loop.
    ///
    /// Terminal: a closed transport stays closed.
    pub async fn close(&self) {
        self.inner.cancel.cancel();
        self.inner.connected.store(false, Ordering::SeqCst);
    }

    // ========================================================================
    // Pump task
    // ========================================================================

    /// Pumps connections until cancelled, re-dialing on loss.
    async fn run_loop(
        inner: Arc<SocketInner>,
        url: Url,
        mut ws: WsStream,
        mut outbound_rx: mpsc::UnboundedReceiver<String>,
    ) {
        let mut reconnect = ReconnectState::new(BackoffPolicy::default());
        reconnect.connected();

        loop {
            let lost = Self::pump(&inner, ws, &mut outbound_rx).await;

            inner.connected.store(false, Ordering::SeqCst);
            if !lost {
                inner.handlers.notify_status(TransportStatus::Closed);
                return;
            }

            inner.handlers.notify_status(TransportStatus::Disconnected);
            Self::drain_outbound(&mut outbound_rx);

            if !inner.reconnect {
                debug!("Reconnection disabled. Socket transport stopping");
                return;
            }

            ws = match Self::redial(&inner, &url, &mut reconnect).await {
                Some(ws) => ws,
                None => return,
            };
        }
    }

    /// Pumps one live connection.
    ///
    /// Returns `true` if the connection was lost and `false` if the
    /// transport was cancelled or abandoned.
    async fn pump(
        inner: &Arc<SocketInner>,
        ws: WsStream,
        outbound_rx: &mut mpsc::UnboundedReceiver<String>,
    ) -> bool {
        let (mut ws_write, mut ws_read) = ws.split();

        loop {
            tokio::select! {
                () = inner.cancel.cancelled() => {
                    let _ = ws_write.close().await;
                    return false;
                }

                frame = ws_read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            Self::dispatch_text(inner, &text);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by server");
                            return true;
                        }

                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket receive error");
                            return true;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            return true;
                        }

                        // Ignore Binary, Ping, Pong, Frame
                        _ => {}
                    }
                }

                outgoing = outbound_rx.recv() => {
                    match outgoing {
                        Some(json) => {
                            if let Err(e) = ws_write.send(Message::Text(json.into())).await {
                                warn!(error = %e, "WebSocket send failed");
                                return true;
                            }
                        }

                        // All senders dropped, nothing left to pump for.
                        None => return false,
                    }
                }
            }
        }
    }

    /// Re-dials with exponential backoff until connected or cancelled.
    async fn redial(
        inner: &Arc<SocketInner>,
        url: &Url,
        reconnect: &mut ReconnectState,
    ) -> Option<WsStream> {
        loop {
            let delay = reconnect.begin_backoff();
            inner.handlers.notify_status(TransportStatus::Reconnecting {
                attempt: reconnect.attempt(),
                next_retry_ms: delay.as_millis() as u64,
            });

            tokio::select! {
                () = inner.cancel.cancelled() => {
                    inner.handlers.notify_status(TransportStatus::Closed);
                    return None;
                }
                () = tokio::time::sleep(delay) => {}
            }

            reconnect.begin_connecting();
            debug!(url = %url, attempt = reconnect.attempt(), "Re-dialing WebSocket");

            match connect_async(url.as_str()).await {
                Ok((ws, _response)) => {
                    reconnect.connected();
                    inner.connected.store(true, Ordering::SeqCst);
                    inner.handlers.notify_status(TransportStatus::Connected);
                    return Some(ws);
                }
                Err(e) => {
                    debug!(error = %e, "Reconnect attempt failed");
                }
            }
        }
    }

    /// Decodes one downstream frame and fans it out.
    fn dispatch_text(inner: &Arc<SocketInner>, text: &str) {
        match ServerMessage::parse(text) {
            Ok(message) => {
                trace!(kind = message.kind(), "Server message received");
                inner.handlers.notify_message(&message);
            }
            Err(e) => {
                warn!(error = %e, "Failed to decode server message");
            }
        }
    }

    /// Discards any backlog left from the lost connection.
    fn drain_outbound(outbound_rx: &mut mpsc::UnboundedReceiver<String>) {
        let mut dropped = 0_usize;
        while outbound_rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!(dropped, "Discarded outbound messages from lost connection");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio::time::timeout;

    use super::*;
    use crate::protocol::{EventData, Flavor};

    fn endpoints_for(addr: SocketAddr) -> Endpoints {
        Endpoints::new(
            Url::parse(&format!("http://{addr}")).unwrap(),
            Flavor::PyWire,
        )
    }

    /// One-connection-at-a-time WebSocket server.
    ///
    /// Every accepted connection first receives `greeting`, then has its
    /// incoming text frames forwarded to the returned channel.
    async fn spawn_ws_server(
        greeting: &'static str,
    ) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (seen_tx, seen_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                ws.send(Message::Text(greeting.into())).await.unwrap();

                while let Some(Ok(frame)) = ws.next().await {
                    if let Message::Text(text) = frame {
                        let _ = seen_tx.send(text.to_string());
                    }
                }
            }
        });

        (addr, seen_rx)
    }

    #[tokio::test]
    async fn test_send_while_disconnected_drops_silently() {
        let transport = SocketTransport::new(
            endpoints_for("127.0.0.1:9".parse().unwrap()),
            false,
        );

        let message = ClientMessage::Event {
            handler: "inc".to_string(),
            path: "/".to_string(),
            data: EventData::new("click"),
        };

        assert!(!transport.is_connected());
        transport.send(&message).await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = SocketTransport::new(endpoints_for(addr), false);
        let err = transport.connect().await.unwrap_err();

        assert!(err.is_connection_error());
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_round_trip_update_and_event() {
        let (addr, mut seen_rx) =
            spawn_ws_server(r#"{"type":"update","html":"<p>hi</p>"}"#).await;

        let transport = SocketTransport::new(endpoints_for(addr), false);
        let (update_tx, mut update_rx) = mpsc::unbounded_channel();
        transport.on_message(Arc::new(move |message| {
            if let ServerMessage::Update { html } = message {
                let _ = update_tx.send(html.clone());
            }
        }));

        transport.connect().await.unwrap();
        assert!(transport.is_connected());

        let html = timeout(Duration::from_secs(5), update_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(html, "<p>hi</p>");

        let mut data = EventData::new("input");
        data.value = Some("7".to_string());
        transport
            .send(&ClientMessage::Event {
                handler: "set_count".to_string(),
                path: "/counter".to_string(),
                data,
            })
            .await
            .unwrap();

        let frame = timeout(Duration::from_secs(5), seen_rx.recv())
            .await
            .unwrap()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "event");
        assert_eq!(value["handler"], "set_count");
        assert_eq!(value["data"]["value"], "7");

        transport.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_with_backoff_after_loss() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // First connection is dropped immediately; the second stays up.
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            drop(ws);

            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while ws.next().await.is_some() {}
        });

        let transport = SocketTransport::new(endpoints_for(addr), true);
        let statuses = Arc::new(Mutex::new(Vec::new()));
        {
            let statuses = Arc::clone(&statuses);
            transport.on_status(Arc::new(move |status| {
                statuses.lock().push(status);
            }));
        }

        transport.connect().await.unwrap();

        timeout(Duration::from_secs(120), async {
            loop {
                let seen = statuses.lock().clone();
                let reconnected = seen
                    .iter()
                    .skip_while(|s| **s != TransportStatus::Disconnected)
                    .any(|s| s.is_connected());
                if reconnected {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let seen = statuses.lock().clone();
        assert!(seen.contains(&TransportStatus::Disconnected));
        assert!(seen.contains(&TransportStatus::Reconnecting {
            attempt: 1,
            next_retry_ms: 1000
        }));

        transport.close().await;
    }
}
