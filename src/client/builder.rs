//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`Client`] instances.
//!
//! # Example
//!
//! ```no_run
//! use pywire_client::Client;
//!
//! # fn example() -> pywire_client::Result<()> {
//! let client = Client::builder()
//!     .base_url("http://localhost:8000")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::error::{Error, Result};
use crate::protocol::Flavor;
use crate::transport::TransportKind;

use super::core::Client;
use super::options::ClientOptions;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`Client`] instance.
///
/// Use [`Client::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct ClientBuilder {
    /// Server base URL.
    base_url: Option<String>,
    /// Connection options.
    options: ClientOptions,
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a new client builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server base URL.
    ///
    /// # Arguments
    ///
    /// * `url` - Origin of the live-page server (e.g., "http://localhost:8000")
    #[inline]
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Replaces the whole options block.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the framework flavor.
    #[inline]
    #[must_use]
    pub fn flavor(mut self, flavor: Flavor) -> Self {
        self.options.flavor = flavor;
        self
    }

    /// Replaces the transport preference order.
    #[inline]
    #[must_use]
    pub fn transports(mut self, kinds: impl IntoIterator<Item = TransportKind>) -> Self {
        self.options.transports = kinds.into_iter().collect();
        self
    }

    /// Disables re-dialing after a lost connection.
    #[inline]
    #[must_use]
    pub fn without_reconnect(mut self) -> Self {
        self.options.reconnect = false;
        self
    }

    /// Builds the client with validation.
    ///
    /// No network traffic happens here; call
    /// [`open`](Client::open) to load a page and connect.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the base URL is not set or not an absolute
    ///   `http`/`https` URL
    /// - [`Error::Config`] if the options fail validation
    pub fn build(self) -> Result<Client> {
        let base = self.validate_base_url()?;
        let options = self.validate_options()?;

        Ok(Client::new(base, options))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientBuilder {
    /// Validates the base URL configuration.
    fn validate_base_url(&self) -> Result<Url> {
        let raw = self.base_url.clone().ok_or_else(|| {
            Error::config(
                "Base URL is required. Use .base_url() to set it.\n\
                 Example: Client::builder().base_url(\"http://localhost:8000\")",
            )
        })?;

        let url = Url::parse(&raw)
            .map_err(|e| Error::config(format!("Invalid base URL '{raw}': {e}")))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::config(format!(
                    "Unsupported base URL scheme '{other}'. Expected http or https."
                )));
            }
        }
        if url.cannot_be_a_base() {
            return Err(Error::config(format!("Base URL '{raw}' cannot be a base")));
        }

        Ok(url)
    }

    /// Validates the options configuration.
    fn validate_options(&self) -> Result<ClientOptions> {
        self.options.validate().map_err(Error::config)?;
        Ok(self.options.clone())
    }
}

// ============================================================================
// Tests
// ============================================================================
