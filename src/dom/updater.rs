//! Applies server renders to the live document.
//!
//! [`DomUpdater`] owns the update sequence:
//!
//! 1. raise the shared updating flag;
//! 2. capture focus and keyed form state;
//! 3. reconcile against the parsed incoming HTML;
//! 4. restore focus onto the same logical element;
//! 5. clear the flag on a deferred tick.
//!
//! The event layer holds a read-only [`UpdatingView`] and drops
//! focus/blur/enter/leave noise while the flag is up. Clearing is always
//! deferred through a spawned task so events raised in the same synchronous
//! window as the patch still see the flag set.
//!
//! A failed patch never leaves a half-patched tree: the incoming document
//! replaces the live one wholesale and the outcome reports [`Replaced`].
//!
//! [`Replaced`]: UpdateOutcome::Replaced

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::dom::node::Document;
use crate::dom::{patch, snapshot};

// ============================================================================
// UpdatingFlag
// ============================================================================

/// Writable side of the "patch in progress" flag. Owned by the updater.
#[derive(Debug, Clone, Default)]
pub(crate) struct UpdatingFlag {
    flag: Arc<AtomicBool>,
}

impl UpdatingFlag {
    pub(crate) fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clears the flag on the next scheduler tick, never synchronously.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn clear_deferred(&self) {
        let flag = Arc::clone(&self.flag);
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            flag.store(false, Ordering::SeqCst);
        });
    }

    pub(crate) fn view(&self) -> UpdatingView {
        UpdatingView {
            flag: Arc::clone(&self.flag),
        }
    }
}

/// Read-only view of the updating flag, handed to the event layer.
#[derive(Debug, Clone)]
pub struct UpdatingView {
    flag: Arc<AtomicBool>,
}

impl UpdatingView {
    /// True while a patch is being applied (or was applied this tick).
    #[must_use]
    pub fn is_updating(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ============================================================================
// UpdateOutcome
// ============================================================================

/// How an update was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The live tree was patched in place.
    Patched,
    /// The patch failed and the incoming document replaced the live one.
    Replaced,
}

// ============================================================================
// DomUpdater
// ============================================================================

/// Applies incoming HTML renders to the shared live document.
#[derive(Debug)]
pub struct DomUpdater {
    document: Arc<RwLock<Document>>,
    updating: UpdatingFlag,
}

impl DomUpdater {
    #[must_use]
    pub fn new(document: Arc<RwLock<Document>>) -> Self {
        Self {
            document,
            updating: UpdatingFlag::default(),
        }
    }

    /// Read-only view of the updating flag for the event layer.
    #[must_use]
    pub fn updating_view(&self) -> UpdatingView {
        self.updating.view()
    }

    /// The shared document this updater writes to.
    #[must_use]
    pub fn document(&self) -> Arc<RwLock<Document>> {
        Arc::clone(&self.document)
    }

    /// Morphs the live document into the incoming render.
    ///
    /// Holds the document write lock for the whole patch so readers never
    /// observe a half-patched tree. Must be called from within a Tokio
    /// runtime; the updating flag is cleared on a deferred tick.
    pub fn update(&self, html: &str) -> UpdateOutcome {
        let incoming = Document::parse(html);
        self.updating.set();

        let mut doc = self.document.write();
        let focus = snapshot::capture_focus(&doc);
        let state = snapshot::capture_form_state(&doc);
        let outcome = match patch::reconcile(&mut doc, &incoming, focus.as_ref(), &state) {
            Ok(()) => UpdateOutcome::Patched,
            Err(error) => {
                warn!(error = %error, "Patch failed. Replacing the whole document");
                *doc = incoming;
                UpdateOutcome::Replaced
            }
        };
        if outcome == UpdateOutcome::Patched {
            if let Some(focus) = &focus {
                snapshot::restore_focus(&mut doc, focus);
            }
        }
        drop(doc);

        debug!(outcome = ?outcome, bytes = html.len(), "Applied document update");
        self.updating.clear_deferred();
        outcome
    }

    /// Replaces the live document without patching, as a full page load does.
    pub fn replace(&self, html: &str) {
        let incoming = Document::parse(html);
        *self.document.write() = incoming;
    }
}

// ============================================================================
// Tests
// ============================================================================
