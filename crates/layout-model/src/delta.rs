//! Delta patch port
//!
//! Layout values stored on derived layers are usually patches against an
//! inherited base rather than complete documents. This module defines the
//! capability the resolver needs from a patch engine, [`DeltaPatchPort`],
//! and ships [`WholeValuePatch`], a port whose patches carry the complete
//! derived document.
//!
//! # Laws
//! For every port: `apply(base, diff(base, derived)) == derived`
//! (structurally).

use crate::error::DocumentError;
use crate::xml::XmlDocument;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::sync::Arc;

/// Namespace declaration marking a patch fragment
pub const PATCH_NAMESPACE: &str = "xmlns:p";

/// Secondary namespace declaration marking a patch fragment
pub const SET_NAMESPACE: &str = "xmlns:s";

/// Marker attribute written on patch roots
pub const PATCH_MARKER: &str = "p:p";

/// Errors raised by a patch port
#[derive(Debug, thiserror::Error)]
pub enum DeltaError {
    /// Patch text cannot be applied
    #[error("malformed patch: {0}")]
    MalformedPatch(String),

    /// Base or derived document cannot be read
    #[error("invalid document: {0}")]
    InvalidDocument(#[from] DocumentError),
}

impl DeltaError {
    /// Create malformed patch error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPatch(reason.into())
    }

    /// Check if error is a malformed patch
    #[inline]
    #[must_use]
    pub fn is_malformed_patch(&self) -> bool {
        matches!(self, Self::MalformedPatch(_))
    }
}

/// Patch engine capability
///
/// Patches and derived values are opaque text to callers.
pub trait DeltaPatchPort: Send + Sync {
    /// Patch turning `base` into `derived`
    ///
    /// # Errors
    /// Returns error if either side cannot be read
    fn diff(&self, base: &str, derived: &str) -> Result<String, DeltaError>;

    /// Apply `patch` on top of `base`
    ///
    /// # Errors
    /// Returns `DeltaError::MalformedPatch` if `patch` cannot be applied
    fn apply(&self, base: &str, patch: &str) -> Result<String, DeltaError>;

    /// Check if `text` is a patch fragment rather than a complete document
    fn is_patch_fragment(&self, text: &str) -> bool {
        is_patch_fragment(text)
    }
}

impl<P: DeltaPatchPort + ?Sized> DeltaPatchPort for Arc<P> {
    fn diff(&self, base: &str, derived: &str) -> Result<String, DeltaError> {
        (**self).diff(base, derived)
    }

    fn apply(&self, base: &str, patch: &str) -> Result<String, DeltaError> {
        (**self).apply(base, patch)
    }

    fn is_patch_fragment(&self, text: &str) -> bool {
        (**self).is_patch_fragment(text)
    }
}

/// Check if the root element of `text` declares the patch namespaces
///
/// Reads only up to the first element.
#[must_use]
pub fn is_patch_fragment(text: &str) -> bool {
    let mut reader = Reader::from_str(text);
    loop {
        match reader.read_event() {
            Ok(Event::Start(start) | Event::Empty(start)) => {
                return start.attributes().flatten().any(|attr| {
                    let key = attr.key.as_ref();
                    key == PATCH_NAMESPACE.as_bytes() || key == SET_NAMESPACE.as_bytes()
                });
            }
            Ok(Event::Eof) | Err(_) => return false,
            Ok(_) => {}
        }
    }
}

/// Whole-value replacement patches
///
/// A patch is the derived document itself with the patch namespace
/// declared on its root; applying it ignores the base.
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeValuePatch;

impl WholeValuePatch {
    /// Create port
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl DeltaPatchPort for WholeValuePatch {
    fn diff(&self, _base: &str, derived: &str) -> Result<String, DeltaError> {
        let mut doc = XmlDocument::parse(derived)?;
        doc.root.attributes.set(PATCH_NAMESPACE, "p");
        doc.root.attributes.set(PATCH_MARKER, "1");
        Ok(doc.to_xml()?)
    }

    fn apply(&self, _base: &str, patch: &str) -> Result<String, DeltaError> {
        if !is_patch_fragment(patch) {
            return Err(DeltaError::malformed("missing patch namespace on root"));
        }
        let mut doc =
            XmlDocument::parse(patch).map_err(|e| DeltaError::malformed(e.to_string()))?;
        for marker in [PATCH_NAMESPACE, SET_NAMESPACE, PATCH_MARKER] {
            doc.root.attributes.remove(marker);
        }
        Ok(doc.to_xml()?)
    }
}
