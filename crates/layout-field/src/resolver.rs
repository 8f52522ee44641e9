//! Layered value resolution
//!
//! # Core Concepts
//!
//! A layout field's stored text is either a complete document or a patch
//! against whatever it inherits. Reading collects candidates from a
//! [`ValueSourcePipeline`], stacks the patches found before the first
//! complete document, and applies them onto it in discovery order:
//!
//! ```text
//! candidates: P1, P2, B, ...   →   apply(apply(B, P1), P2)
//! ```
//!
//! Writing stores the smallest thing that reproduces the requested value:
//! nothing (reset) when it equals the baseline, a patch when there is a
//! baseline, the value itself otherwise. An empty value is an explicit
//! empty layout and is written as one.

use crate::config::ResolverConfig;
use crate::error::ResolveError;
use crate::sources::{
    legacy_candidates, InheritanceChainPipeline, SourceRequest, ValueCandidate,
    ValueSourcePipeline,
};
use crate::store::{FieldRef, FieldRole, FieldStore, ItemRecord};
use layout_links::{LinkContext, UrlParameterCodec};
use layout_model::{layouts_equal, DeltaPatchPort, EMPTY_LAYOUT};
use tracing::{debug, trace};

/// What a write did to storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Own value dropped; the field inherits again
    Reset,
    /// Patch against the baseline stored
    StoredPatch,
    /// Complete value stored
    StoredVerbatim,
    /// Stored value already produces the requested value
    Unchanged,
}

/// Reads and writes layout fields through inheritance layers
pub struct LayeredValueResolver {
    patches: Box<dyn DeltaPatchPort>,
    pipeline: Box<dyn ValueSourcePipeline>,
    config: ResolverConfig,
    parameters: UrlParameterCodec,
}

impl LayeredValueResolver {
    /// Resolver using `patches`, the default pipeline and default settings
    #[must_use]
    pub fn new(patches: impl DeltaPatchPort + 'static) -> Self {
        Self {
            patches: Box::new(patches),
            pipeline: Box::new(InheritanceChainPipeline),
            config: ResolverConfig::default(),
            parameters: UrlParameterCodec::new(),
        }
    }

    /// With value source pipeline
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: impl ValueSourcePipeline + 'static) -> Self {
        self.pipeline = Box::new(pipeline);
        self
    }

    /// With settings
    #[must_use]
    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.parameters = UrlParameterCodec::from_config(&config.links);
        self.config = config;
        self
    }

    /// Settings
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Patch engine
    #[inline]
    #[must_use]
    pub fn patches(&self) -> &dyn DeltaPatchPort {
        self.patches.as_ref()
    }

    /// `cx` with this resolver's link settings wherever the caller kept
    /// the defaults
    #[must_use]
    pub fn link_context<'c>(&'c self, cx: &LinkContext<'c>) -> LinkContext<'c> {
        cx.with_fallback_settings(&self.config.links, &self.parameters)
    }

    /// Effective text of `field`
    ///
    /// Empty when no candidate holds a complete document.
    ///
    /// # Errors
    /// - `InvalidFieldRole` if `field` is not a layout field
    /// - `InvalidArgument` if the item is unknown
    /// - `SourcesUnavailable` if the pipeline cannot run and the legacy
    ///   fallback is disabled
    /// - `MalformedPatch` if a stacked patch cannot be applied
    pub fn get_effective_value(
        &self,
        store: &dyn FieldStore,
        field: &FieldRef,
    ) -> Result<String, ResolveError> {
        let (role, item) = self.lookup(store, field)?;
        let request = SourceRequest {
            store,
            patches: self.patches(),
            item: &item,
            role,
            config: &self.config,
        };
        let candidates = match self.pipeline.candidates(&request) {
            Some(candidates) => candidates,
            None if self.config.allow_legacy_fallback => {
                debug!(%field, "value source pipeline unavailable, using legacy sources");
                legacy_candidates(&request)
            }
            None => return Err(ResolveError::SourcesUnavailable(field.field)),
        };
        self.fold(field, candidates)
    }

    /// Store `value` on `field` relative to its natural baseline
    ///
    /// The baseline is the effective value of:
    /// - nothing, for the override field of a template-defaults item
    /// - the item's override field, for a final field
    /// - the template-defaults item's final field, for an override field
    ///
    /// # Errors
    /// Same as [`get_effective_value`](Self::get_effective_value)
    pub fn set_effective_value(
        &self,
        store: &mut dyn FieldStore,
        field: &FieldRef,
        value: &str,
    ) -> Result<WriteOutcome, ResolveError> {
        let (role, item) = self.lookup(&*store, field)?;
        let value = explicit(value);
        let baseline_field = match (self.config.is_standard_values(&item), role) {
            (true, FieldRole::Override) => None,
            (_, FieldRole::Final) => Some(field.with_role(FieldRole::Override)),
            (false, FieldRole::Override) => item
                .template_defaults
                .filter(|t| store.item(t).is_some())
                .map(|t| FieldRef::new(t, FieldRole::Final.field_id())),
        };
        let baseline = match baseline_field {
            Some(f) => self.get_effective_value(&*store, &f)?,
            None => String::new(),
        };

        if layouts_equal(value, &baseline) {
            debug!(%field, "value equals baseline, resetting");
            store.reset(field);
            return Ok(WriteOutcome::Reset);
        }
        if baseline.trim().is_empty() {
            store.set_raw_value(field, value);
            return Ok(WriteOutcome::StoredVerbatim);
        }
        let patch = self.patches.diff(&baseline, value)?;
        store.set_raw_value(field, &patch);
        Ok(WriteOutcome::StoredPatch)
    }

    /// Store `value` on `field` relative to an explicit `baseline`
    ///
    /// Skips the write when the stored value already yields the same
    /// document on top of `baseline`.
    ///
    /// # Errors
    /// - `InvalidFieldRole` if `field` is not a layout field
    /// - `InvalidArgument` if the item is unknown
    /// - `MalformedPatch` if a patch cannot be computed or applied
    pub fn set_effective_value_with_base(
        &self,
        store: &mut dyn FieldStore,
        field: &FieldRef,
        value: &str,
        baseline: &str,
    ) -> Result<WriteOutcome, ResolveError> {
        self.lookup(&*store, field)?;
        let value = explicit(value);

        if layouts_equal(value, baseline) {
            store.reset(field);
            return Ok(WriteOutcome::Reset);
        }
        let (text, outcome) = if baseline.trim().is_empty() {
            (value.to_string(), WriteOutcome::StoredVerbatim)
        } else {
            (self.patches.diff(baseline, value)?, WriteOutcome::StoredPatch)
        };

        let current = store.raw_value(field).unwrap_or_default();
        if layouts_equal(&self.overlay(baseline, &current)?, &self.overlay(baseline, &text)?) {
            trace!(%field, "stored value already current");
            return Ok(WriteOutcome::Unchanged);
        }
        store.set_raw_value(field, &text);
        Ok(outcome)
    }

    fn lookup(
        &self,
        store: &dyn FieldStore,
        field: &FieldRef,
    ) -> Result<(FieldRole, ItemRecord), ResolveError> {
        let role = FieldRole::from_field_id(field.field)?;
        let item = store
            .item(&field.item)
            .ok_or_else(|| ResolveError::invalid_argument(format!("unknown item {}", field.item)))?;
        Ok((role, item))
    }

    fn fold(&self, field: &FieldRef, candidates: Vec<ValueCandidate>) -> Result<String, ResolveError> {
        let mut stack = Vec::new();
        let mut base = None;
        for candidate in candidates {
            if candidate.is_blank() {
                continue;
            }
            if candidate.is_patch_fragment {
                stack.push(candidate.text);
            } else {
                base = Some(candidate.text);
                break;
            }
        }
        let Some(base) = base else {
            trace!(%field, patches = stack.len(), "no complete layout found");
            return Ok(String::new());
        };
        trace!(%field, patches = stack.len(), "applying patch stack");
        let folded = stack
            .iter()
            .try_fold(base, |acc, patch| self.patches.apply(&acc, patch))?;
        Ok(folded)
    }

    /// Document produced by `text` stored on top of `baseline`
    fn overlay(&self, baseline: &str, text: &str) -> Result<String, ResolveError> {
        if text.trim().is_empty() {
            Ok(baseline.to_string())
        } else if self.patches.is_patch_fragment(text) {
            Ok(self.patches.apply(baseline, text)?)
        } else {
            Ok(text.to_string())
        }
    }
}

/// Blank input stands for an explicit empty layout
fn explicit(value: &str) -> &str {
    if value.trim().is_empty() {
        EMPTY_LAYOUT
    } else {
        value
    }
}

impl std::fmt::Debug for LayeredValueResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredValueResolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
