//! Live document and reconciliation.
//!
//! The client keeps a server-rendered page as an arena [`Document`] and
//! morphs it in place whenever the server pushes a new render:
//!
//! ```text
//!             server html
//!                  │
//!            ┌─────▼──────┐   updating flag   ┌───────────────┐
//!            │ DomUpdater │ ─────────────────▶ │  event layer  │
//!            └─────┬──────┘    (read view)     └───────────────┘
//!         capture  │  restore
//!        ┌─────────▼──────────┐
//!        │ snapshot ── patch  │   keyed reconcile, user-state rules
//!        └─────────┬──────────┘
//!            ┌─────▼──────┐
//!            │  Document  │   arena nodes, live form state
//!            └────────────┘
//! ```
//!
//! | Module | Description |
//! |--------|-------------|
//! | `node` | Arena document, element data, queries, serialization |
//! | `identity` | Stable node-identity keys for matching |
//! | `snapshot` | Focus and form-state capture around a patch |
//! | `patch` | Keyed tree reconciliation |
//! | `updater` | Update orchestration and the updating flag |

// ============================================================================
// Submodules
// ============================================================================

/// Stable node identity.
pub mod identity;

/// Arena document.
pub mod node;

/// Keyed reconciliation.
pub(crate) mod patch;

/// Focus and form-state snapshots.
pub(crate) mod snapshot;

/// Update orchestration.
pub mod updater;

// ============================================================================
// Re-exports
// ============================================================================

pub use identity::{AUTO_ID_PREFIX, StableKey, node_key};
pub use node::{AttachedFile, Document, ElementData, NodeId, NodeKind};
pub use updater::{DomUpdater, UpdateOutcome, UpdatingView};
