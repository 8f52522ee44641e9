//! Layout Links
//!
//! Keeps the references inside a layout consistent when the entities they
//! point at move or disappear, and reports references that no longer
//! resolve.
//!
//! # Core Concepts
//!
//! - [`LinkedField`]: relink / remove / validate contract shared by the
//!   layout field, parameter sub-fields and rule sets
//! - [`ReferenceGraphMaintainer`]: walks a [`LayoutDocument`] visiting every
//!   reference site
//! - [`LinkContext`]: entity store, datasource resolver, parameter codec and
//!   rule factory consulted during a walk
//! - [`LinkSink`]: receiver of validation reports
//!
//! # Example
//!
//! ```rust
//! use layout_links::{EntityStore, LinkContext, LinkValidationResult, ReferenceGraphMaintainer};
//! use layout_model::{Entity, EntityId, LayoutDocument};
//!
//! struct Empty;
//! impl EntityStore for Empty {
//!     fn resolve(&self, _: &str) -> Option<Entity> { None }
//! }
//!
//! let owner = Entity::new(EntityId::new_random(), "/sitecore/content/Home");
//! let cx = LinkContext::new(&Empty, &owner);
//! let doc = LayoutDocument::parse(r#"<r><d id="{FE5D7FDF-89C0-4D99-9AA3-B5FBD009C9F3}"/></r>"#).unwrap();
//!
//! let mut result = LinkValidationResult::new();
//! ReferenceGraphMaintainer::new().validate_links(&cx, &doc, &mut result);
//! assert!(result.has_broken());
//! ```
//!
//! [`LayoutDocument`]: layout_model::LayoutDocument

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
mod context;
mod error;
mod field;
mod maintainer;
mod report;

// Collaborators
mod datasource;
mod parameters;
mod rules;

// Re-exports
pub use context::{
    DatasourceResolver, EntityStore, LinkConfig, LinkContext, ParameterCodec, ParameterFields,
    RuleFieldFactory,
};
pub use datasource::ContextDatasourceResolver;
pub use error::LinkError;
pub use field::{LayoutValue, LinkedField, SubField};
pub use maintainer::ReferenceGraphMaintainer;
pub use parameters::{ReferenceListField, TextField, UrlParameterCodec, ValueLookupField};
pub use report::{LinkReport, LinkSink, LinkSite, LinkStatus, LinkValidationResult};
pub use rules::{RuleXmlField, XmlRuleFactory};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
