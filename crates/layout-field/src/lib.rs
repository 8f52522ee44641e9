//! Layout Field
//!
//! Layered resolution of layout fields. A layout seen on an item is built
//! from the item's own value, the values of the prototypes it was cloned
//! from, and the defaults of its template; derived layers usually store
//! patches rather than complete documents.
//!
//! # Core Concepts
//!
//! - [`LayeredValueResolver`]: effective value read/write over a
//!   [`FieldStore`]
//! - [`ValueSourcePipeline`]: ordered value candidates for a field
//! - [`LayoutField`]: store-backed field handle with document accessors and
//!   link maintenance ([`LinkedField`](layout_links::LinkedField))
//! - [`ResolverConfig`]: settings, loadable from TOML
//!
//! # Example
//!
//! ```rust,ignore
//! use layout_field::{FieldRef, LayeredValueResolver};
//! use layout_model::{FieldId, WholeValuePatch};
//!
//! let resolver = LayeredValueResolver::new(WholeValuePatch::new());
//! let field = FieldRef::new(page_id, FieldId::FINAL_LAYOUT);
//! let layout = resolver.get_effective_value(&store, &field)?;
//! resolver.set_effective_value(&mut store, &field, &edited)?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
mod config;
mod error;
mod field;
mod resolver;
mod sources;
mod store;

// Re-exports
pub use config::{ResolverConfig, STANDARD_VALUES_NAME};
pub use error::ResolveError;
pub use field::LayoutField;
pub use resolver::{LayeredValueResolver, WriteOutcome};
pub use sources::{
    InheritanceChainPipeline, SourceRequest, UnavailablePipeline, ValueCandidate,
    ValueSourcePipeline,
};
pub use store::{FieldRef, FieldRole, FieldStore, ItemRecord};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
