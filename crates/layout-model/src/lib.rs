//! Layout Model
//!
//! Parsed layout documents, entity identifiers and the delta patch port.
//!
//! # Core Concepts
//!
//! - [`LayoutDocument`]: devices → renderings / placeholders, parsed from and
//!   serialized back to the persisted XML without losing unknown content
//! - [`EntityId`], [`Entity`], [`ItemLink`]: references by identifier or path
//! - [`DeltaPatchPort`]: diff/apply capability used to layer layout values
//!
//! # Example
//!
//! ```rust
//! use layout_model::{LayoutDocument, EMPTY_LAYOUT};
//!
//! let doc = LayoutDocument::parse("").unwrap();
//! assert_eq!(doc.device_count(), 0);
//! assert_eq!(doc.to_xml().unwrap(), EMPTY_LAYOUT);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
mod delta;
mod document;
mod error;
mod id;

/// Generic lossless XML tree
pub mod xml;

// Re-exports
pub use delta::{
    is_patch_fragment, DeltaError, DeltaPatchPort, WholeValuePatch, PATCH_MARKER,
    PATCH_NAMESPACE, SET_NAMESPACE,
};
pub use document::{
    layouts_equal, Device, LayoutDocument, Placeholder, RenderingReference, EMPTY_LAYOUT,
};
pub use error::{DocumentError, IdError};
pub use id::{Entity, EntityId, FieldId, ItemLink};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
