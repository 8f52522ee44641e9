//! Store-backed layout field

use crate::error::ResolveError;
use crate::resolver::{LayeredValueResolver, WriteOutcome};
use crate::store::{FieldRef, FieldRole, FieldStore};
use layout_links::{LinkContext, LinkSink, LinkedField, ReferenceGraphMaintainer};
use layout_model::{Device, Entity, EntityId, ItemLink, LayoutDocument, RenderingReference};
use tracing::{debug, trace};

/// Layout field of one item, read and written through the resolver
///
/// Reads always see the effective (layered) value; writes go through
/// [`LayeredValueResolver::set_effective_value`], so an edit on a derived
/// item is stored as a patch. Link operations take their settings and
/// parameter codec from the resolver's configuration unless the caller's
/// context sets them.
pub struct LayoutField<'a> {
    resolver: &'a LayeredValueResolver,
    store: &'a mut dyn FieldStore,
    field: FieldRef,
    role: FieldRole,
}

impl<'a> LayoutField<'a> {
    /// Open `field`
    ///
    /// # Errors
    /// - `InvalidFieldRole` if `field` is not a layout field
    /// - `InvalidArgument` if the item is unknown
    pub fn open(
        resolver: &'a LayeredValueResolver,
        store: &'a mut dyn FieldStore,
        field: FieldRef,
    ) -> Result<Self, ResolveError> {
        let role = FieldRole::from_field_id(field.field)?;
        if store.item(&field.item).is_none() {
            return Err(ResolveError::invalid_argument(format!("unknown item {}", field.item)));
        }
        Ok(Self {
            resolver,
            store,
            field,
            role,
        })
    }

    /// Addressed field
    #[inline]
    #[must_use]
    pub fn field(&self) -> FieldRef {
        self.field
    }

    /// Role of the addressed field
    #[inline]
    #[must_use]
    pub fn role(&self) -> FieldRole {
        self.role
    }

    /// Effective text
    ///
    /// # Errors
    /// Propagates resolver errors
    pub fn value(&self) -> Result<String, ResolveError> {
        self.resolver.get_effective_value(&*self.store, &self.field)
    }

    /// Store a new effective text
    ///
    /// # Errors
    /// Propagates resolver errors
    pub fn set_value(&mut self, value: &str) -> Result<WriteOutcome, ResolveError> {
        self.resolver.set_effective_value(&mut *self.store, &self.field, value)
    }

    /// Parsed effective value
    ///
    /// # Errors
    /// Returns `ResolveError::Document` if the effective text is not
    /// well-formed
    pub fn document(&self) -> Result<LayoutDocument, ResolveError> {
        Ok(LayoutDocument::parse(&self.value()?)?)
    }

    /// Device with identifier `device_id`
    ///
    /// # Errors
    /// Same as [`document`](Self::document)
    pub fn device(&self, device_id: &EntityId) -> Result<Option<Device>, ResolveError> {
        Ok(self.document()?.device_by_id(device_id).cloned())
    }

    /// Layout of device `device_id`, when it is an identifier
    ///
    /// # Errors
    /// Same as [`document`](Self::document)
    pub fn layout_id(&self, device_id: &EntityId) -> Result<Option<EntityId>, ResolveError> {
        Ok(self.document()?.layout_id(device_id))
    }

    /// Rendering references of device `device_id`
    ///
    /// Empty when the device is absent.
    ///
    /// # Errors
    /// Same as [`document`](Self::document)
    pub fn references(&self, device_id: &EntityId) -> Result<Vec<RenderingReference>, ResolveError> {
        let doc = self.document()?;
        let references = doc
            .renderings_for(device_id)
            .map(|refs| refs.into_iter().cloned().collect())
            .unwrap_or_default();
        Ok(references)
    }

    /// Point every device at `layout_id`
    ///
    /// Returns `false` and writes nothing when the layout has no devices.
    ///
    /// # Errors
    /// Propagates document and resolver errors
    pub fn set_layout_for_all(&mut self, layout_id: &EntityId) -> Result<bool, ResolveError> {
        let mut doc = self.document()?;
        if !doc.set_layout_for_all(&layout_id.to_string()) {
            return Ok(false);
        }
        self.set_value(&doc.to_xml()?)?;
        Ok(true)
    }

    /// Apply `op` to the effective document and store the result
    ///
    /// A blank field is left untouched.
    fn rewrite(&mut self, op: impl FnOnce(&mut LayoutDocument)) -> Result<(), ResolveError> {
        let value = self.value()?;
        if value.trim().is_empty() {
            trace!(field = %self.field, "blank layout, nothing to rewrite");
            return Ok(());
        }
        let mut doc = LayoutDocument::parse(&value)?;
        op(&mut doc);
        let outcome = self.set_value(&doc.to_xml()?)?;
        debug!(field = %self.field, ?outcome, "layout rewritten");
        Ok(())
    }
}

impl LinkedField for LayoutField<'_> {
    type Error = ResolveError;

    fn relink(
        &mut self,
        cx: &LinkContext<'_>,
        link: &ItemLink,
        new_target: &Entity,
    ) -> Result<(), ResolveError> {
        let resolver = self.resolver;
        let cx = resolver.link_context(cx);
        self.rewrite(|doc| ReferenceGraphMaintainer::new().relink(&cx, doc, link, new_target))
    }

    fn remove_link(&mut self, cx: &LinkContext<'_>, link: &ItemLink) -> Result<(), ResolveError> {
        let resolver = self.resolver;
        let cx = resolver.link_context(cx);
        self.rewrite(|doc| ReferenceGraphMaintainer::new().remove_link(&cx, doc, link))
    }

    fn validate_links(
        &self,
        cx: &LinkContext<'_>,
        sink: &mut dyn LinkSink,
    ) -> Result<(), ResolveError> {
        let doc = self.document()?;
        let cx = self.resolver.link_context(cx);
        ReferenceGraphMaintainer::new().validate_links(&cx, &doc, sink);
        Ok(())
    }
}

impl std::fmt::Debug for LayoutField<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutField")
            .field("field", &self.field)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}
