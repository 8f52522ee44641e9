//! Value sources for layered resolution
//!
//! A [`ValueSourcePipeline`] lists the texts a layout field may take its
//! value from, most specific first. The resolver scans that list for the
//! first complete document and collects the patches in front of it.
//!
//! # Default order
//!
//! For each field in the role's chain (final: final then override;
//! override: override), the item's own value followed by the value on each
//! prototype up the chain, so a patch stored on a clone stacks onto its
//! prototype's layout. Then for each field in the chain, the template
//! default on the item's template and on the prototype's template.

use crate::config::ResolverConfig;
use crate::store::{FieldRef, FieldRole, FieldStore, ItemRecord};
use layout_model::{DeltaPatchPort, EntityId};
use std::collections::HashSet;

/// One candidate value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueCandidate {
    /// Stored text
    pub text: String,
    /// Text is a patch against a base found further down the list
    pub is_patch_fragment: bool,
}

impl ValueCandidate {
    /// Classify `text` with `patches`
    #[must_use]
    pub fn classify(text: String, patches: &dyn DeltaPatchPort) -> Self {
        let is_patch_fragment = patches.is_patch_fragment(&text);
        Self {
            text,
            is_patch_fragment,
        }
    }

    /// Check if the candidate carries no content
    #[inline]
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Inputs to a pipeline run
pub struct SourceRequest<'a> {
    /// Raw storage
    pub store: &'a dyn FieldStore,
    /// Patch engine, for classification
    pub patches: &'a dyn DeltaPatchPort,
    /// Item whose field is resolved
    pub item: &'a ItemRecord,
    /// Field being resolved
    pub role: FieldRole,
    /// Settings
    pub config: &'a ResolverConfig,
}

impl SourceRequest<'_> {
    fn is_standard_values(&self) -> bool {
        self.config.is_standard_values(self.item)
    }

    fn candidate(&self, text: String) -> ValueCandidate {
        ValueCandidate::classify(text, self.patches)
    }
}

/// Produces ordered value candidates
pub trait ValueSourcePipeline {
    /// Candidates for the request, or `None` when this pipeline cannot run
    fn candidates(&self, request: &SourceRequest<'_>) -> Option<Vec<ValueCandidate>>;
}

/// Own value, prototype chain, then template defaults
#[derive(Debug, Clone, Copy, Default)]
pub struct InheritanceChainPipeline;

impl ValueSourcePipeline for InheritanceChainPipeline {
    fn candidates(&self, request: &SourceRequest<'_>) -> Option<Vec<ValueCandidate>> {
        let SourceRequest { store, item, role, .. } = *request;
        let chain = role.chain();
        let lineage = lineage(store, item);
        let mut texts: Vec<Option<String>> = chain
            .iter()
            .flat_map(|r| {
                lineage
                    .iter()
                    .map(move |id| store.raw_value(&FieldRef::new(*id, r.field_id())))
            })
            .collect();

        let mut templates: Vec<EntityId> = Vec::new();
        if !request.is_standard_values() {
            templates.extend(item.template_defaults);
        }
        if let Some(proto_template) = item
            .prototype
            .and_then(|p| store.item(&p))
            .and_then(|p| p.template_defaults)
        {
            if proto_template != item.id && !templates.contains(&proto_template) {
                templates.push(proto_template);
            }
        }
        for r in chain {
            for template in &templates {
                texts.push(store.raw_value(&FieldRef::new(*template, r.field_id())));
            }
        }

        Some(texts.into_iter().flatten().map(|t| request.candidate(t)).collect())
    }
}

/// Pipeline that never runs, forcing the legacy source list
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailablePipeline;

impl ValueSourcePipeline for UnavailablePipeline {
    fn candidates(&self, _request: &SourceRequest<'_>) -> Option<Vec<ValueCandidate>> {
        None
    }
}

/// Fixed four-slot source list
///
/// Slots: final own-or-inherited, override own-or-inherited, final template
/// default, override template default. Leading slots are skipped by role:
/// one for override, two for final on a template-defaults item, three for
/// override on a template-defaults item.
pub(crate) fn legacy_candidates(request: &SourceRequest<'_>) -> Vec<ValueCandidate> {
    let SourceRequest { store, item, role, .. } = *request;
    let is_standard_values = request.is_standard_values();
    let skip = match (is_standard_values, role) {
        (true, FieldRole::Override) => 3,
        (true, FieldRole::Final) => 2,
        (false, FieldRole::Override) => 1,
        (false, FieldRole::Final) => 0,
    };
    let defaults = if is_standard_values {
        Some(item.id)
    } else {
        item.template_defaults
    };
    let template_default = |r: FieldRole| {
        defaults.and_then(|t| store.raw_value(&FieldRef::new(t, r.field_id())))
    };

    let slots = [
        own_or_inherited(store, item, FieldRole::Final),
        own_or_inherited(store, item, FieldRole::Override),
        template_default(FieldRole::Final),
        template_default(FieldRole::Override),
    ];
    slots
        .into_iter()
        .skip(skip)
        .flatten()
        .map(|t| request.candidate(t))
        .collect()
}

/// Item followed by its prototypes, nearest first
///
/// Stops at the first prototype seen twice.
fn lineage(store: &dyn FieldStore, item: &ItemRecord) -> Vec<EntityId> {
    let mut ids = vec![item.id];
    let mut next = item.prototype;
    while let Some(id) = next {
        if ids.contains(&id) {
            break;
        }
        let Some(record) = store.item(&id) else {
            break;
        };
        ids.push(id);
        next = record.prototype;
    }
    ids
}

/// Item's own value, else the nearest prototype's
fn own_or_inherited(store: &dyn FieldStore, item: &ItemRecord, role: FieldRole) -> Option<String> {
    let mut visited = HashSet::new();
    let mut current = Some(item.clone());
    while let Some(record) = current {
        if !visited.insert(record.id) {
            break;
        }
        if let Some(value) = store.raw_value(&FieldRef::new(record.id, role.field_id())) {
            return Some(value);
        }
        current = record.prototype.and_then(|p| store.item(&p));
    }
    None
}
