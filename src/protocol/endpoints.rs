//! Endpoint derivation and server capabilities.
//!
//! The protocol is served under a flavor-specific well-known prefix. Both
//! framework flavors expose the same endpoints and differ only in prefix,
//! header names, and page-metadata markers.
//!
//! | Endpoint | Purpose |
//! |----------|---------|
//! | `<prefix>/capabilities` | transport negotiation hints |
//! | `<prefix>/session` | polling session init |
//! | `<prefix>/poll` | polling long-poll |
//! | `<prefix>/event` | polling event POST |
//! | `<prefix>/upload` | multipart file upload |
//! | `<prefix>/ws` | socket transport |
//! | `<prefix>/wt` | stream transport |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::SessionId;

// ============================================================================
// Flavor
// ============================================================================

/// Which framework flavor the server speaks.
///
/// The wire protocol is identical; only prefixes and marker names differ.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Flavor {
    /// The `/_pywire` flavor (default).
    #[default]
    PyWire,
    /// The `/_pyhtml` flavor.
    PyHtml,
}

impl Flavor {
    /// Returns the well-known route prefix.
    #[inline]
    #[must_use]
    pub fn route_prefix(self) -> &'static str {
        match self {
            Self::PyWire => "/_pywire",
            Self::PyHtml => "/_pyhtml",
        }
    }

    /// Returns the session header name used by the polling transport.
    #[inline]
    #[must_use]
    pub fn session_header(self) -> &'static str {
        match self {
            Self::PyWire => "X-PyWire-Session",
            Self::PyHtml => "X-PyHTML-Session",
        }
    }

    /// Returns the id of the navigation-metadata script element.
    #[inline]
    #[must_use]
    pub fn meta_script_id(self) -> &'static str {
        match self {
            Self::PyWire => "_pywire_spa_meta",
            Self::PyHtml => "_pyhtml_spa_meta",
        }
    }

    /// Returns the name of the upload-token meta element.
    #[inline]
    #[must_use]
    pub fn upload_token_meta(self) -> &'static str {
        match self {
            Self::PyWire => "pywire-upload-token",
            Self::PyHtml => "pyhtml-upload-token",
        }
    }

    /// Returns the script global carrying the pinned certificate hash.
    #[inline]
    #[must_use]
    pub fn cert_hash_global(self) -> &'static str {
        match self {
            Self::PyWire => "PYWIRE_CERT_HASH",
            Self::PyHtml => "PYHTML_CERT_HASH",
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PyWire => f.write_str("pywire"),
            Self::PyHtml => f.write_str("pyhtml"),
        }
    }
}

// ============================================================================
// Endpoints
// ============================================================================

/// Resolved endpoint URLs for one server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Server base URL (origin + optional base path).
    base: Url,
    /// Flavor served at that origin.
    flavor: Flavor,
}

impl Endpoints {
    /// Creates endpoint derivation for a base URL and flavor.
    #[inline]
    #[must_use]
    pub fn new(base: Url, flavor: Flavor) -> Self {
        Self { base, flavor }
    }

    /// Returns the flavor.
    #[inline]
    #[must_use]
    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// Returns the base URL.
    #[inline]
    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Returns `true` when the origin is secure.
    ///
    /// The stream transport is only feasible on secure origins.
    #[inline]
    #[must_use]
    pub fn is_secure_origin(&self) -> bool {
        self.base.scheme() == "https"
    }

    /// Resolves a prefixed protocol endpoint.
    fn protocol_url(&self, suffix: &str) -> Result<Url> {
        let path = format!("{}{}", self.flavor.route_prefix(), suffix);
        Ok(self.base.join(&path)?)
    }

    /// Resolves an application page URL from an origin-relative path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if `path` does not resolve against the base.
    pub fn page_url(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    /// The capabilities endpoint.
    pub fn capabilities_url(&self) -> Result<Url> {
        self.protocol_url("/capabilities")
    }

    /// The polling session-init endpoint.
    pub fn session_url(&self) -> Result<Url> {
        self.protocol_url("/session")
    }

    /// The long-poll endpoint, scoped to a session.
    pub fn poll_url(&self, session: &SessionId) -> Result<Url> {
        let mut url = self.protocol_url("/poll")?;
        url.query_pairs_mut()
            .append_pair("session", session.as_str());
        Ok(url)
    }

    /// The polling event endpoint.
    pub fn event_url(&self) -> Result<Url> {
        self.protocol_url("/event")
    }

    /// The multipart upload endpoint.
    pub fn upload_url(&self) -> Result<Url> {
        self.protocol_url("/upload")
    }

    /// The socket transport endpoint (`ws`/`wss` scheme).
    pub fn ws_url(&self) -> Result<Url> {
        let mut url = self.protocol_url("/ws")?;
        let scheme = if self.is_secure_origin() { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| Error::config(format!("cannot derive {scheme} url from {}", self.base)))?;
        Ok(url)
    }

    /// The stream transport endpoint (WebTransport CONNECT target).
    pub fn wt_url(&self) -> Result<Url> {
        self.protocol_url("/wt")
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// Transport capabilities advertised by the server.
///
/// Fetched best-effort during init; when the fetch fails the client falls
/// back to [`Capabilities::conservative`], matching the server's own
/// default (WebSocket and HTTP available, WebTransport off).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Capabilities {
    /// Advertised transport names (`"websocket"`, `"http"`).
    #[serde(default)]
    pub transports: Vec<String>,

    /// Whether the server accepts WebTransport sessions.
    #[serde(default)]
    pub webtransport: bool,

    /// Server version string.
    #[serde(default)]
    pub version: String,
}

impl Capabilities {
    /// The assumption used when the capabilities endpoint is unreachable.
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            transports: vec!["websocket".to_string(), "http".to_string()],
            webtransport: false,
            version: String::new(),
        }
    }

    /// Returns `true` when the socket transport is advertised.
    #[inline]
    #[must_use]
    pub fn supports_socket(&self) -> bool {
        self.transports.iter().any(|t| t == "websocket")
    }
}

// ============================================================================
// Tests
// ============================================================================
