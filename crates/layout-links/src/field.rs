//! Link maintenance contract
//!
//! Every field-like value that may hold references implements
//! [`LinkedField`]: the top-level layout field, parameter sub-fields and
//! rule sub-documents alike.

use crate::context::LinkContext;
use crate::error::LinkError;
use crate::maintainer::ReferenceGraphMaintainer;
use crate::report::LinkSink;
use layout_model::{Entity, ItemLink, LayoutDocument};
use std::fmt::Debug;

/// Relink / remove / validate contract
pub trait LinkedField {
    /// Error raised by the field's own storage
    type Error;

    /// Rewrite references to `link` so they point at `new_target`
    ///
    /// # Errors
    /// Returns error if the field value cannot be read or stored
    fn relink(
        &mut self,
        cx: &LinkContext<'_>,
        link: &ItemLink,
        new_target: &Entity,
    ) -> Result<(), Self::Error>;

    /// Drop references to `link`
    ///
    /// # Errors
    /// Returns error if the field value cannot be read or stored
    fn remove_link(&mut self, cx: &LinkContext<'_>, link: &ItemLink) -> Result<(), Self::Error>;

    /// Report every reference to `sink`
    ///
    /// # Errors
    /// Returns error if the field value cannot be read
    fn validate_links(&self, cx: &LinkContext<'_>, sink: &mut dyn LinkSink)
        -> Result<(), Self::Error>;
}

/// Nested value inside a rendering (parameter or rule set)
pub trait SubField: LinkedField<Error = LinkError> + Debug {
    /// Current text
    fn value(&self) -> &str;
}

/// Layout value held in memory rather than in a field store
///
/// Used for values computed at runtime, e.g. a layout assembled by a
/// pipeline before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutValue {
    value: String,
}

impl LayoutValue {
    /// Wrap layout text
    ///
    /// # Errors
    /// Returns `LinkError::InvalidArgument` if `value` is blank
    pub fn new(value: impl Into<String>) -> Result<Self, LinkError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(LinkError::invalid_argument("runtime layout value is blank"));
        }
        Ok(Self { value })
    }

    /// Parsed document
    ///
    /// # Errors
    /// Returns error if the value is not well-formed
    pub fn document(&self) -> Result<LayoutDocument, LinkError> {
        Ok(LayoutDocument::parse(&self.value)?)
    }

    fn update(
        &mut self,
        op: impl FnOnce(&mut LayoutDocument),
    ) -> Result<(), LinkError> {
        let mut doc = self.document()?;
        op(&mut doc);
        self.value = doc.to_xml()?;
        Ok(())
    }
}

impl LinkedField for LayoutValue {
    type Error = LinkError;

    fn relink(
        &mut self,
        cx: &LinkContext<'_>,
        link: &ItemLink,
        new_target: &Entity,
    ) -> Result<(), LinkError> {
        self.update(|doc| ReferenceGraphMaintainer::new().relink(cx, doc, link, new_target))
    }

    fn remove_link(&mut self, cx: &LinkContext<'_>, link: &ItemLink) -> Result<(), LinkError> {
        self.update(|doc| ReferenceGraphMaintainer::new().remove_link(cx, doc, link))
    }

    fn validate_links(
        &self,
        cx: &LinkContext<'_>,
        sink: &mut dyn LinkSink,
    ) -> Result<(), LinkError> {
        let doc = self.document()?;
        ReferenceGraphMaintainer::new().validate_links(cx, &doc, sink);
        Ok(())
    }
}

impl SubField for LayoutValue {
    fn value(&self) -> &str {
        &self.value
    }
}
