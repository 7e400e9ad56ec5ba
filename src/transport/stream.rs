//! WebTransport transport: QUIC streams plus datagrams.
//!
//! The richest strategy. After the CONNECT handshake the client opens a
//! bidirectional stream per outgoing message and listens for
//! server-initiated streams and datagrams carrying downstream messages.
//! Replies the server writes onto an outgoing message's own stream are
//! dispatched like any other downstream traffic.
//!
//! # Handshake
//!
//! WebTransport sessions carry no page context of their own, so the
//! first message after connecting (and after every reconnect) is an
//! `init` naming the page path. Dev servers with self-signed
//! certificates are supported by pinning the SHA-256 certificate hash
//! published on the page; otherwise system roots are used.
//!
//! Requires a secure origin. The manager rules this strategy out for
//! plain-http pages before ever dialing.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;
use wtransport::endpoint::endpoint_side;
use wtransport::tls::Sha256Digest;
use wtransport::{ClientConfig, Connection, Endpoint, RecvStream, VarInt};

use crate::error::{Error, Result};
use crate::protocol::{ClientMessage, Endpoints, ServerMessage};
use crate::transport::backoff::{BackoffPolicy, ReconnectState};
use crate::transport::{HandlerSet, MessageHandler, StatusHandler, TransportStatus};

// ============================================================================
// Constants
// ============================================================================

/// Ceiling on a single downstream message.
///
/// Page snapshots dominate the payload mix; anything past this is a
/// runaway stream, not a page.
const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// Read buffer granularity for incoming streams.
const READ_CHUNK_BYTES: usize = 8 * 1024;

// ============================================================================
// Helpers
// ============================================================================

/// Parses a SHA-256 certificate fingerprint from its page form.
///
/// Accepts plain hex as well as colon- or space-separated octets.
///
/// # Errors
///
/// Returns [`Error::Config`] unless exactly 32 bytes of hex remain
/// after separators are dropped.
pub fn parse_cert_hash(raw: &str) -> Result<[u8; 32]> {
    let hex: String = raw.chars().filter(char::is_ascii_hexdigit).collect();
    if hex.len() != 64 {
        return Err(Error::config(format!(
            "certificate hash must be 32 bytes (64 hex digits), got {} digits in '{raw}'",
            hex.len()
        )));
    }

    let mut out = [0_u8; 32];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        // Chunks are ASCII hex digits by construction.
        let pair = std::str::from_utf8(chunk)
            .map_err(|_| Error::config("certificate hash is not ASCII"))?;
        out[i] = u8::from_str_radix(pair, 16)
            .map_err(|_| Error::config(format!("invalid hex pair '{pair}' in certificate hash")))?;
    }
    Ok(out)
}

// ============================================================================
// StreamInner
// ============================================================================

/// Shared state behind the [`StreamTransport`] facade.
pub(crate) struct StreamInner {
    /// Endpoint catalogue for the origin.
    endpoints: Endpoints,
    /// Page path sent in the init handshake.
    ///
    /// Mutable so a reconnect handshake names the page actually being
    /// viewed after navigation.
    path: Mutex<String>,
    /// Pinned certificate hash for self-signed dev servers.
    cert_hash: Option<[u8; 32]>,
    /// Whether to re-dial after a lost connection.
    reconnect: bool,
    /// Registered message and status callbacks.
    handlers: HandlerSet,
    /// True while traffic can flow.
    connected: AtomicBool,
    /// Active QUIC connection, replaced on reconnect.
    connection: Mutex<Option<Arc<Connection>>>,
    /// Cancels the pump task and any backoff wait.
    cancel: CancellationToken,
}

// ============================================================================
// StreamTransport
// ============================================================================

/// WebTransport wire strategy.
///
/// Cheap to clone; clones share the same connection and handlers.
#[derive(Clone)]
pub struct StreamTransport {
    inner: Arc<StreamInner>,
}

impl fmt::Debug for StreamTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamTransport")
            .field("connected", &self.is_connected())
            .field("pinned_cert", &self.inner.cert_hash.is_some())
            .finish_non_exhaustive()
    }
}

impl StreamTransport {
    /// Creates a disconnected stream transport for the given origin.
    #[must_use]
    pub fn new(
        endpoints: Endpoints,
        path: impl Into<String>,
        cert_hash: Option<[u8; 32]>,
        reconnect: bool,
    ) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                endpoints,
                path: Mutex::new(path.into()),
                cert_hash,
                reconnect,
                handlers: HandlerSet::default(),
                connected: AtomicBool::new(false),
                connection: Mutex::new(None),
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

    /// Records a navigation so reconnect handshakes name the page
    /// actually being viewed.
    pub fn set_path(&self, path: impl Into<String>) {
        *self.inner.path.lock() = path.into();
    }

    /// Dials the server, sends the init handshake and starts the pump.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the origin is not secure, the
    /// CONNECT handshake fails or the init message cannot be written.
    pub async fn connect(&self) -> Result<()> {
        if !self.inner.endpoints.is_secure_origin() {
            return Err(Error::connection(
                "WebTransport requires a secure (https) origin",
            ));
        }

        let url = self.inner.endpoints.wt_url()?;
        self.inner.handlers.notify_status(TransportStatus::Connecting);

        let endpoint = Endpoint::client(Self::client_config(self.inner.cert_hash))
            .map_err(|e| Error::connection(e.to_string()))?;
        debug!(url = %url, pinned_cert = self.inner.cert_hash.is_some(), "Dialing WebTransport");

        let connection = endpoint
            .connect(url.as_str())
            .await
            .map_err(|e| Error::connection(e.to_string()))?;
        let connection = Arc::new(connection);

        Self::send_init(&self.inner, &connection).await?;

        *self.inner.connection.lock() = Some(Arc::clone(&connection));
        self.inner.connected.store(true, Ordering::SeqCst);
        self.inner.handlers.notify_status(TransportStatus::Connected);

        tokio::spawn(Self::run_loop(
            Arc::clone(&self.inner),
            endpoint,
            url,
            connection,
        ));

        Ok(())
    }

    /// Sends one upstream message on a fresh bidirectional stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] while disconnected and
    /// [`Error::Connection`] if the stream cannot be written.
    pub async fn send(&self, message: &ClientMessage) -> Result<()> {
        let connection = self
            .inner
            .connection
            .lock()
            .clone()
            .ok_or_else(|| Error::not_connected("send message"))?;

        Self::write_message(&self.inner, &connection, message).await
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

    /// Builds a client config, pinning the certificate hash if present.
    fn client_config(cert_hash: Option<[u8; 32]>) -> ClientConfig {
        match cert_hash {
            Some(hash) => ClientConfig::builder()
                .with_bind_default()
                .with_server_certificate_hashes(vec![Sha256Digest::new(hash)])
                .build(),
            None => ClientConfig::default(),
        }
    }

    /// Pumps connections until cancelled, re-dialing on loss.
    async fn run_loop(
        inner: Arc<StreamInner>,
        endpoint: Endpoint<endpoint_side::Client>,
        url: Url,
        mut connection: Arc<Connection>,
    ) {
        let mut reconnect = ReconnectState::new(BackoffPolicy::default());
        reconnect.connected();

        loop {
            let lost = Self::pump(&inner, &connection).await;

            inner.connected.store(false, Ordering::SeqCst);
            *inner.connection.lock() = None;

            if !lost {
                connection.close(VarInt::from_u32(0), b"");
                inner.handlers.notify_status(TransportStatus::Closed);
                return;
            }

            inner.handlers.notify_status(TransportStatus::Disconnected);
            if !inner.reconnect {
                debug!("Reconnection disabled. Stream transport stopping");
                return;
            }

            connection = match Self::redial(&inner, &endpoint, &url, &mut reconnect).await {
                Some(connection) => connection,
                None => return,
            };
        }
    }

    /// Pumps one live connection.
    ///
    /// Returns `true` if the connection was lost and `false` if the
    /// transport was cancelled.
    async fn pump(inner: &Arc<StreamInner>, connection: &Arc<Connection>) -> bool {
        loop {
            tokio::select! {
                () = inner.cancel.cancelled() => return false,

                stream = connection.accept_bi() => match stream {
                    Ok((_send, recv)) => Self::read_and_dispatch(inner, recv).await,
                    Err(e) => {
                        debug!(error = %e, "Stream connection lost");
                        return true;
                    }
                },

                stream = connection.accept_uni() => match stream {
                    Ok(recv) => Self::read_and_dispatch(inner, recv).await,
                    Err(e) => {
                        debug!(error = %e, "Stream connection lost");
                        return true;
                    }
                },

                datagram = connection.receive_datagram() => match datagram {
                    Ok(datagram) => Self::dispatch_bytes(inner, &datagram),
                    Err(e) => {
                        debug!(error = %e, "Stream connection lost");
                        return true;
                    }
                },
            }
        }
    }

    /// Re-dials with exponential backoff until connected or cancelled.
    ///
    /// Each fresh connection repeats the init handshake so the server
    /// re-associates it with the page.
    async fn redial(
        inner: &Arc<StreamInner>,
        endpoint: &Endpoint<endpoint_side::Client>,
        url: &Url,
        reconnect: &mut ReconnectState,
    ) -> Option<Arc<Connection>> {
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
            debug!(url = %url, attempt = reconnect.attempt(), "Re-dialing WebTransport");

            let connection = match endpoint.connect(url.as_str()).await {
                Ok(connection) => Arc::new(connection),
                Err(e) => {
                    debug!(error = %e, "Reconnect attempt failed");
                    continue;
                }
            };

            if let Err(e) = Self::send_init(inner, &connection).await {
                debug!(error = %e, "Init handshake failed after reconnect");
                continue;
            }

            reconnect.connected();
            *inner.connection.lock() = Some(Arc::clone(&connection));
            inner.connected.store(true, Ordering::SeqCst);
            inner.handlers.notify_status(TransportStatus::Connected);
            return Some(connection);
        }
    }

    /// Sends the init handshake naming this transport's page path.
    async fn send_init(inner: &Arc<StreamInner>, connection: &Arc<Connection>) -> Result<()> {
        let init = ClientMessage::Init {
            path: inner.path.lock().clone(),
        };
        Self::write_message(inner, connection, &init).await
    }

    /// Writes one message on a fresh stream and watches for a reply.
    ///
    /// The reply read runs in a background task since the server may
    /// answer on this stream, push on one of its own, or stay silent.
    async fn write_message(
        inner: &Arc<StreamInner>,
        connection: &Arc<Connection>,
        message: &ClientMessage,
    ) -> Result<()> {
        let json = message.encode()?;

        let opening = connection
            .open_bi()
            .await
            .map_err(|e| Error::connection(e.to_string()))?;
        let (mut send, recv) = opening.await.map_err(|e| Error::connection(e.to_string()))?;

        send.write_all(json.as_bytes())
            .await
            .map_err(|e| Error::connection(e.to_string()))?;
        send.finish()
            .await
            .map_err(|e| Error::connection(e.to_string()))?;
        trace!(kind = message.kind(), "Message written to stream");

        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            match Self::read_to_end(recv).await {
                Ok(text) if !text.trim().is_empty() => Self::dispatch_text(&inner, &text),
                Ok(_) => {}
                Err(e) => debug!(error = %e, "Reply stream ended without payload"),
            }
        });

        Ok(())
    }

    /// Reads an incoming stream to completion and dispatches it.
    async fn read_and_dispatch(inner: &Arc<StreamInner>, recv: RecvStream) {
        match Self::read_to_end(recv).await {
            Ok(text) => Self::dispatch_text(inner, &text),
            Err(e) => warn!(error = %e, "Failed to read incoming stream"),
        }
    }

    /// Reads a stream until FIN, bounded by [`MAX_MESSAGE_BYTES`].
    async fn read_to_end(mut recv: RecvStream) -> Result<String> {
        let mut payload = Vec::new();
        let mut chunk = [0_u8; READ_CHUNK_BYTES];

        while let Some(n) = recv
            .read(&mut chunk)
            .await
            .map_err(|e| Error::connection(e.to_string()))?
        {
            payload.extend_from_slice(&chunk[..n]);
            if payload.len() > MAX_MESSAGE_BYTES {
                return Err(Error::decode("incoming stream exceeds message size limit"));
            }
        }

        String::from_utf8(payload).map_err(|_| Error::decode("incoming stream is not valid UTF-8"))
    }

    /// Decodes one downstream payload and fans it out.
    fn dispatch_text(inner: &Arc<StreamInner>, text: &str) {
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

    /// Dispatches a datagram payload.
    fn dispatch_bytes(inner: &Arc<StreamInner>, bytes: &[u8]) {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::dispatch_text(inner, text),
            Err(_) => warn!(len = bytes.len(), "Discarding non-UTF-8 datagram"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Flavor;

    fn secure_endpoints() -> Endpoints {
        Endpoints::new(Url::parse("https://127.0.0.1:4433").unwrap(), Flavor::PyWire)
    }

    #[test]
    fn test_parse_cert_hash_plain_hex() {
        let raw = "ab".repeat(32);
        let hash = parse_cert_hash(&raw).unwrap();
        assert_eq!(hash, [0xab_u8; 32]);
    }

    #[test]
    fn test_parse_cert_hash_colon_separated() {
        let raw = vec!["2F"; 32].join(":");
        let hash = parse_cert_hash(&raw).unwrap();
        assert_eq!(hash, [0x2f_u8; 32]);
    }

    #[test]
    fn test_parse_cert_hash_rejects_wrong_length() {
        let err = parse_cert_hash("abcdef").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("64 hex digits"));
    }

    #[test]
    fn test_new_is_disconnected() {
        let transport = StreamTransport::new(secure_endpoints(), "/", None, false);
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_send_before_connect_is_not_connected() {
        let transport = StreamTransport::new(secure_endpoints(), "/", None, false);

        let err = transport
            .send(&ClientMessage::Relocate {
                path: "/about".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected { .. }));
    }

    #[tokio::test]
    async fn test_connect_rejects_insecure_origin() {
        let endpoints = Endpoints::new(
            Url::parse("http://127.0.0.1:8000").unwrap(),
            Flavor::PyWire,
        );
        let transport = StreamTransport::new(endpoints, "/", None, false);

        let err = transport.connect().await.unwrap_err();
        assert!(err.is_connection_error());
        assert!(err.to_string().contains("secure"));
    }
}
