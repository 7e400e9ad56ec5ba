//! Live-page wire protocol.
//!
//! This module defines the message format spoken between the client and a
//! PyWire/PyHTML server, plus the endpoint layout the transports dial.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `ServerMessage` | Server → Client | DOM updates, reloads, diagnostics |
//! | `ClientMessage` | Client → Server | User events, navigation, bootstrap |
//!
//! Every transport carries the same JSON messages; the transports differ
//! only in framing (one message per stream, per socket frame, or per HTTP
//! body).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `message` | Closed message unions and the event payload |
//! | `endpoints` | Flavor prefixes, endpoint URLs, capabilities |

// ============================================================================
// Submodules
// ============================================================================

/// Endpoint derivation and server capabilities.
pub mod endpoints;

/// Wire message types.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use endpoints::{Capabilities, Endpoints, Flavor};
pub use message::{ClientMessage, ConsoleLevel, EventData, ServerMessage, StackFrame};
