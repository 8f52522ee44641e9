//! Reference graph maintenance over a parsed layout
//!
//! # Traversal
//!
//! Devices, then within each device its placeholders and its renderings,
//! then each rendering's parameter sub-fields and rule set. Sibling lists
//! are visited tail-to-head so that deletions never shift a position that
//! is still to be visited.
//!
//! # Matching
//!
//! Identifier references match by GUID (case and braces ignored). Path
//! references (datasources, placeholder metadata) also match the link's
//! path, case-insensitively.

use crate::context::LinkContext;
use crate::error::LinkError;
use crate::field::{LinkedField, SubField};
use crate::report::{LinkSink, LinkSite};
use layout_model::{Device, Entity, ItemLink, LayoutDocument, RenderingReference};
use tracing::{debug, trace, warn};

/// Walks a layout document to rewrite, remove or validate references
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceGraphMaintainer;

impl ReferenceGraphMaintainer {
    /// Create maintainer
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Point every reference to `link` at `new_target`
    ///
    /// Identifier sites receive the new identifier; path-matched datasources
    /// and all matching placeholder metadata receive the new full path.
    pub fn relink(
        &self,
        cx: &LinkContext<'_>,
        doc: &mut LayoutDocument,
        link: &ItemLink,
        new_target: &Entity,
    ) {
        let new_id = new_target.id.to_string();
        debug!(from = %link.target_id, to = %new_id, "relinking layout");

        for device in doc.devices_mut().rev() {
            if device.id().is_some_and(|id| link.matches_id(id)) {
                device.set_id(Some(&new_id));
            }
            if device.layout().is_some_and(|l| link.matches_id(l)) {
                device.set_layout(Some(&new_id));
            }
            for placeholder in device.placeholders_mut().rev() {
                if placeholder.metadata().is_some_and(|md| link.matches(md)) {
                    placeholder.set_metadata(Some(&new_target.full_path));
                }
            }
            for rendering in device.renderings_mut().rev() {
                relink_rendering(cx, rendering, link, new_target, &new_id);
            }
        }
    }

    /// Drop every reference to `link`
    ///
    /// A device whose identifier matches is deleted with everything in it;
    /// a rendering whose component matches is deleted with its parameters
    /// and rules. Other matching sites are cleared.
    pub fn remove_link(&self, cx: &LinkContext<'_>, doc: &mut LayoutDocument, link: &ItemLink) {
        debug!(target_id = %link.target_id, "removing link from layout");

        for index in (0..doc.device_count()).rev() {
            if doc
                .device(index)
                .and_then(Device::id)
                .is_some_and(|id| link.matches_id(id))
            {
                doc.remove_device(index);
                debug!(index, "removed device");
                continue;
            }
            if let Some(device) = doc.device_mut(index) {
                remove_from_device(cx, device, link);
            }
        }
    }

    /// Report every reference in `doc` to `sink`
    pub fn validate_links(&self, cx: &LinkContext<'_>, doc: &LayoutDocument, sink: &mut dyn LinkSink) {
        for device in doc.devices().rev() {
            if let Some(id) = device.id() {
                check(cx, sink, LinkSite::Device, id);
            }
            if let Some(layout) = device.layout() {
                check(cx, sink, LinkSite::Layout, layout);
            }
            for placeholder in device.placeholders().rev() {
                if let Some(md) = placeholder.metadata() {
                    check(cx, sink, LinkSite::PlaceholderMetadata, md);
                }
            }
            for rendering in device.renderings().rev() {
                validate_rendering(cx, sink, rendering);
            }
        }
    }
}

fn relink_rendering(
    cx: &LinkContext<'_>,
    rendering: &mut RenderingReference,
    link: &ItemLink,
    new_target: &Entity,
    new_id: &str,
) {
    if rendering.component_id().is_some_and(|c| link.matches_id(c)) {
        rendering.set_component_id(new_id);
    }
    if let Some(datasource) = rendering.datasource() {
        if link.matches_id(datasource) {
            rendering.set_datasource(Some(new_id));
        } else if link.matches_path(datasource) {
            rendering.set_datasource(Some(&new_target.full_path));
        }
    }
    if rendering.multivariate_test().is_some_and(|t| link.matches_id(t)) {
        rendering.set_multivariate_test(Some(new_id));
    }
    if rendering.personalization_test().is_some_and(|t| link.matches_id(t)) {
        rendering.set_personalization_test(Some(new_id));
    }

    update_parameters(cx, rendering, |field| field.relink(cx, link, new_target));
    update_rules(cx, rendering, |rules| rules.relink(cx, link, new_target));
}

fn remove_from_device(cx: &LinkContext<'_>, device: &mut Device, link: &ItemLink) {
    if device.layout().is_some_and(|l| link.matches_id(l)) {
        device.set_layout(None);
    }

    for index in (0..device.placeholder_count()).rev() {
        if device
            .placeholder(index)
            .and_then(|p| p.metadata())
            .is_some_and(|md| link.matches(md))
        {
            device.remove_placeholder(index);
        }
    }

    for index in (0..device.rendering_count()).rev() {
        let Some(rendering) = device.rendering_mut(index) else {
            continue;
        };
        if rendering.datasource().is_some_and(|ds| link.matches(ds)) {
            rendering.set_datasource(None);
        }
        if rendering.component_id().is_some_and(|c| link.matches_id(c)) {
            device.remove_rendering(index);
            debug!(index, "removed rendering");
            continue;
        }
        if rendering.multivariate_test().is_some_and(|t| link.matches_id(t)) {
            rendering.set_multivariate_test(None);
        }
        if rendering.personalization_test().is_some_and(|t| link.matches_id(t)) {
            rendering.set_personalization_test(None);
        }
        update_parameters(cx, rendering, |field| field.remove_link(cx, link));
        update_rules(cx, rendering, |rules| rules.remove_link(cx, link));
    }
}

/// Renderings without a component carry no checked references
fn validate_rendering(cx: &LinkContext<'_>, sink: &mut dyn LinkSink, rendering: &RenderingReference) {
    let Some(component_id) = rendering.component_id() else {
        return;
    };
    let component = check(cx, sink, LinkSite::Component, component_id);

    if let Some(raw) = rendering.datasource() {
        let datasource = cx.datasources().resolve(raw, cx.owner());
        match cx.resolve(&datasource) {
            Some(target) => sink.add_valid(LinkSite::Datasource, &datasource, &target),
            None if cx.config().is_dynamic_datasource(&datasource) => {
                trace!(%datasource, "skipping dynamic datasource");
            }
            None => sink.add_broken(LinkSite::Datasource, &datasource),
        }
    }
    if let Some(test) = rendering.multivariate_test() {
        check(cx, sink, LinkSite::MultivariateTest, test);
    }
    if let Some(test) = rendering.personalization_test() {
        check(cx, sink, LinkSite::PersonalizationTest, test);
    }

    let Some(component) = component else {
        return;
    };
    if let Some(raw) = rendering.parameters() {
        for (name, field) in &cx.parameters().parse(&component, raw) {
            if let Err(err) = field.validate_links(cx, sink) {
                warn!(parameter = %name, error = %err, "skipping parameter validation");
            }
        }
    }
    match open_rules(cx, rendering) {
        Ok(Some(rules)) => {
            if let Err(err) = rules.validate_links(cx, sink) {
                warn!(error = %err, "skipping rule validation");
            }
        }
        Ok(None) => {}
        Err(err) => warn!(error = %err, "skipping unreadable rule set"),
    }
}

/// Resolve `reference` and record the outcome
fn check(
    cx: &LinkContext<'_>,
    sink: &mut dyn LinkSink,
    site: LinkSite,
    reference: &str,
) -> Option<Entity> {
    let target = cx.resolve(reference);
    match &target {
        Some(entity) => sink.add_valid(site, reference, entity),
        None => sink.add_broken(site, reference),
    }
    target
}

/// Run `op` on every non-empty parameter sub-field and write back on change
///
/// Parameters are only interpreted when the rendering's component resolves,
/// since the component decides the parameter types.
fn update_parameters(
    cx: &LinkContext<'_>,
    rendering: &mut RenderingReference,
    mut op: impl FnMut(&mut dyn SubField) -> Result<(), LinkError>,
) {
    let Some(raw) = rendering.parameters() else {
        return;
    };
    let Some(component) = rendering.component_id().and_then(|id| cx.resolve(id)) else {
        trace!("component unresolved, leaving parameters as is");
        return;
    };
    let mut fields = cx.parameters().parse(&component, raw);
    let mut changed = false;
    for (name, field) in &mut fields {
        if field.value().is_empty() {
            continue;
        }
        let before = field.value().to_string();
        if let Err(err) = op(field.as_mut()) {
            warn!(parameter = %name, error = %err, "skipping parameter");
            continue;
        }
        changed |= field.value() != before;
    }
    if changed {
        let encoded = cx.parameters().serialize(&fields);
        rendering.set_parameters(Some(encoded.as_str()).filter(|p| !p.is_empty()));
    }
}

/// Run `op` on the rendering's rule set and write back on change
fn update_rules(
    cx: &LinkContext<'_>,
    rendering: &mut RenderingReference,
    op: impl FnOnce(&mut dyn SubField) -> Result<(), LinkError>,
) {
    let mut rules = match open_rules(cx, rendering) {
        Ok(Some(rules)) => rules,
        Ok(None) => return,
        Err(err) => {
            warn!(error = %err, "skipping unreadable rule set");
            return;
        }
    };
    let before = rules.value().to_string();
    if let Err(err) = op(rules.as_mut()) {
        warn!(error = %err, "skipping rule set");
        return;
    }
    if rules.value() != before {
        if let Err(err) = rendering.set_rules_xml(rules.value()) {
            warn!(error = %err, "rewritten rule set is not well-formed");
        }
    }
}

fn open_rules(
    cx: &LinkContext<'_>,
    rendering: &RenderingReference,
) -> Result<Option<Box<dyn SubField>>, LinkError> {
    match rendering.rules_xml()? {
        Some(xml) => cx.rules().open(&xml).map(Some),
        None => Ok(None),
    }
}
