//! Layered resolution against an in-memory store

use layout_field::{
    FieldRef, FieldRole, ItemRecord, LayeredValueResolver, ResolveError, ResolverConfig,
    UnavailablePipeline, WriteOutcome,
};
use layout_model::{
    layouts_equal, DeltaError, DeltaPatchPort, Device, EntityId, FieldId, LayoutDocument,
    WholeValuePatch,
};
use layout_test_utils::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;

fn layout_with(devices: &[&str]) -> String {
    let mut doc = LayoutDocument::empty();
    for d in devices {
        doc.push_device(Device::new(Some(*d)));
    }
    doc.to_xml().unwrap()
}

fn device_ids(text: &str) -> Vec<String> {
    LayoutDocument::parse(text)
        .unwrap()
        .devices()
        .filter_map(|d| d.id().map(str::to_string))
        .collect()
}

const P1: &str = "{11111111-1111-4111-8111-111111111111}";
const P2: &str = "{22222222-2222-4222-8222-222222222222}";

fn final_of(item: EntityId) -> FieldRef {
    FieldRef::new(item, FieldId::FINAL_LAYOUT)
}

fn shared_of(item: EntityId) -> FieldRef {
    FieldRef::new(item, FieldId::LAYOUT)
}

#[test]
fn inherits_template_default() {
    init_test_tracing();
    let mut store = InMemoryFieldStore::new();
    let (page, defaults) = page_with_template(&mut store, "/sitecore/content/Home");
    store.put(shared_of(defaults), &sample_layout());

    let resolver = LayeredValueResolver::new(WholeValuePatch::new());
    let value = resolver.get_effective_value(&store, &final_of(page)).unwrap();
    assert_eq!(value, sample_layout());
}

#[test]
fn patches_fold_in_discovery_order() {
    let mut store = InMemoryFieldStore::new();
    let (page, defaults) = page_with_template(&mut store, "/sitecore/content/Home");
    let base = layout_with(&[DEFAULT_DEVICE]);
    store.put(shared_of(defaults), &base);
    store.put(final_of(page), &AppendingPatchPort::patch_adding(P1));
    store.put(shared_of(page), &AppendingPatchPort::patch_adding(P2));

    let port = Arc::new(RecordingPatchPort::new(AppendingPatchPort));
    let resolver = LayeredValueResolver::new(Arc::clone(&port));
    let value = resolver.get_effective_value(&store, &final_of(page)).unwrap();

    assert_eq!(device_ids(&value), vec![DEFAULT_DEVICE, P1, P2]);
    let applied = port.applied();
    assert_eq!(applied.len(), 2);
    assert_eq!(applied[0].0, base);
    assert_eq!(applied[0].1, AppendingPatchPort::patch_adding(P1));
    assert_eq!(applied[1].1, AppendingPatchPort::patch_adding(P2));
}

#[test]
fn patches_without_base_resolve_to_empty() {
    let mut store = InMemoryFieldStore::new();
    let (page, _) = page_with_template(&mut store, "/sitecore/content/Home");
    store.put(final_of(page), &AppendingPatchPort::patch_adding(P1));

    let resolver = LayeredValueResolver::new(AppendingPatchPort);
    assert_eq!(resolver.get_effective_value(&store, &final_of(page)).unwrap(), "");
}

#[test]
fn blank_values_are_skipped() {
    let mut store = InMemoryFieldStore::new();
    let (page, defaults) = page_with_template(&mut store, "/sitecore/content/Home");
    store.put(final_of(page), "   ");
    store.put(shared_of(defaults), &layout_with(&[DEFAULT_DEVICE]));

    let resolver = LayeredValueResolver::new(WholeValuePatch::new());
    let value = resolver.get_effective_value(&store, &final_of(page)).unwrap();
    assert_eq!(device_ids(&value), vec![DEFAULT_DEVICE]);
}

#[test]
fn override_role_ignores_final_values() {
    let mut store = InMemoryFieldStore::new();
    let (page, defaults) = page_with_template(&mut store, "/sitecore/content/Home");
    store.put(final_of(page), &layout_with(&[P1]));
    store.put(shared_of(defaults), &layout_with(&[DEFAULT_DEVICE]));

    let resolver = LayeredValueResolver::new(WholeValuePatch::new());
    let value = resolver.get_effective_value(&store, &shared_of(page)).unwrap();
    assert_eq!(device_ids(&value), vec![DEFAULT_DEVICE]);
}

#[test]
fn prototype_value_is_inherited() {
    let mut store = InMemoryFieldStore::new();
    let (page, _) = page_with_template(&mut store, "/sitecore/content/Home");
    store.put(final_of(page), &layout_with(&[P1]));
    let clone = store.add_item(
        ItemRecord::new(EntityId::new_random(), "/sitecore/content/Clone").with_prototype(page),
    );

    let resolver = LayeredValueResolver::new(WholeValuePatch::new());
    let value = resolver.get_effective_value(&store, &final_of(clone)).unwrap();
    assert_eq!(device_ids(&value), vec![P1]);
}

#[test]
fn clone_patch_stacks_on_prototype_layout() {
    let mut store = InMemoryFieldStore::new();
    let (page, _) = page_with_template(&mut store, "/sitecore/content/Home");
    store.put(final_of(page), &layout_with(&[DEFAULT_DEVICE]));
    let clone = store.add_item(
        ItemRecord::new(EntityId::new_random(), "/sitecore/content/Clone").with_prototype(page),
    );
    store.put(final_of(clone), &AppendingPatchPort::patch_adding(P1));

    let resolver = LayeredValueResolver::new(AppendingPatchPort);
    let value = resolver.get_effective_value(&store, &final_of(clone)).unwrap();
    assert_eq!(device_ids(&value), vec![DEFAULT_DEVICE, P1]);
}

#[test]
fn clone_patch_stacks_through_prototype_patch() {
    let mut store = InMemoryFieldStore::new();
    let (page, defaults) = page_with_template(&mut store, "/sitecore/content/Home");
    store.put(shared_of(defaults), &layout_with(&[DEFAULT_DEVICE]));
    store.put(final_of(page), &AppendingPatchPort::patch_adding(P2));
    let clone = store.add_item(
        ItemRecord::new(EntityId::new_random(), "/sitecore/content/Clone").with_prototype(page),
    );
    store.put(final_of(clone), &AppendingPatchPort::patch_adding(P1));

    let resolver = LayeredValueResolver::new(AppendingPatchPort);
    let value = resolver.get_effective_value(&store, &final_of(clone)).unwrap();
    assert_eq!(device_ids(&value), vec![DEFAULT_DEVICE, P1, P2]);
}

#[test]
fn prototype_cycle_terminates() {
    let mut store = InMemoryFieldStore::new();
    let a = EntityId::new_random();
    let b = EntityId::new_random();
    store.add_item(ItemRecord::new(a, "/a").with_prototype(b));
    store.add_item(ItemRecord::new(b, "/b").with_prototype(a));

    let resolver = LayeredValueResolver::new(WholeValuePatch::new());
    assert_eq!(resolver.get_effective_value(&store, &final_of(a)).unwrap(), "");
}

#[test]
fn contract_violations() {
    let mut store = InMemoryFieldStore::new();
    let (page, _) = page_with_template(&mut store, "/sitecore/content/Home");
    let resolver = LayeredValueResolver::new(WholeValuePatch::new());

    let other = FieldRef::new(page, FieldId::new(EntityId::new_random()));
    assert!(resolver.get_effective_value(&store, &other).unwrap_err().is_invalid_field_role());

    let unknown = final_of(EntityId::new_random());
    assert!(resolver.get_effective_value(&store, &unknown).unwrap_err().is_invalid_argument());
    assert!(resolver
        .set_effective_value(&mut store, &unknown, "<r/>")
        .unwrap_err()
        .is_invalid_argument());
}

struct RejectingPort;

impl DeltaPatchPort for RejectingPort {
    fn diff(&self, _: &str, derived: &str) -> Result<String, DeltaError> {
        Ok(derived.to_string())
    }

    fn apply(&self, _: &str, _: &str) -> Result<String, DeltaError> {
        Err(DeltaError::malformed("unsupported operation"))
    }
}

#[test]
fn malformed_patch_propagates() {
    let mut store = InMemoryFieldStore::new();
    let (page, defaults) = page_with_template(&mut store, "/sitecore/content/Home");
    store.put(shared_of(defaults), &layout_with(&[DEFAULT_DEVICE]));
    store.put(final_of(page), &AppendingPatchPort::patch_adding(P1));

    let resolver = LayeredValueResolver::new(RejectingPort);
    let err = resolver.get_effective_value(&store, &final_of(page)).unwrap_err();
    assert!(err.is_malformed_patch());
}

#[test]
fn legacy_fallback_matches_pipeline_for_simple_items() {
    let mut store = InMemoryFieldStore::new();
    let (page, defaults) = page_with_template(&mut store, "/sitecore/content/Home");
    store.put(shared_of(defaults), &layout_with(&[DEFAULT_DEVICE]));
    store.put(final_of(page), &AppendingPatchPort::patch_adding(P1));

    let pipeline = LayeredValueResolver::new(AppendingPatchPort);
    let legacy = LayeredValueResolver::new(AppendingPatchPort).with_pipeline(UnavailablePipeline);
    for field in [final_of(page), shared_of(page)] {
        assert_eq!(
            legacy.get_effective_value(&store, &field).unwrap(),
            pipeline.get_effective_value(&store, &field).unwrap()
        );
    }
}

#[test]
fn legacy_fallback_on_standard_values_item() {
    let mut store = InMemoryFieldStore::new();
    let (_, defaults) = page_with_template(&mut store, "/sitecore/content/Home");
    store.put(shared_of(defaults), &layout_with(&[DEFAULT_DEVICE]));

    let legacy = LayeredValueResolver::new(WholeValuePatch::new()).with_pipeline(UnavailablePipeline);
    let shared = legacy.get_effective_value(&store, &shared_of(defaults)).unwrap();
    let fin = legacy.get_effective_value(&store, &final_of(defaults)).unwrap();
    assert_eq!(device_ids(&shared), vec![DEFAULT_DEVICE]);
    assert_eq!(device_ids(&fin), vec![DEFAULT_DEVICE]);
}

#[test]
fn disabled_legacy_fallback_is_an_error() {
    let mut store = InMemoryFieldStore::new();
    let (page, _) = page_with_template(&mut store, "/sitecore/content/Home");
    let resolver = LayeredValueResolver::new(WholeValuePatch::new())
        .with_pipeline(UnavailablePipeline)
        .with_config(ResolverConfig::new().with_legacy_fallback(false));

    let err = resolver.get_effective_value(&store, &final_of(page)).unwrap_err();
    assert!(matches!(err, ResolveError::SourcesUnavailable(_)));
}

#[test]
fn write_equal_to_baseline_resets() {
    let mut store = InMemoryFieldStore::new();
    let (page, defaults) = page_with_template(&mut store, "/sitecore/content/Home");
    store.put(shared_of(defaults), &sample_layout());
    store.put(final_of(page), &layout_with(&[P1]));

    let resolver = LayeredValueResolver::new(WholeValuePatch::new());
    let reformatted = sample_layout().replace("><", ">\n  <");
    let outcome = resolver
        .set_effective_value(&mut store, &final_of(page), &reformatted)
        .unwrap();

    assert_eq!(outcome, WriteOutcome::Reset);
    assert_eq!(store.stored(&final_of(page)), None);
}

#[test]
fn write_on_derived_item_stores_patch() {
    let mut store = InMemoryFieldStore::new();
    let (page, defaults) = page_with_template(&mut store, "/sitecore/content/Home");
    store.put(shared_of(defaults), &layout_with(&[DEFAULT_DEVICE]));
    let resolver = LayeredValueResolver::new(WholeValuePatch::new());
    let edited = layout_with(&[DEFAULT_DEVICE, PRINT_DEVICE]);

    for field in [final_of(page), shared_of(page)] {
        let outcome = resolver.set_effective_value(&mut store, &field, &edited).unwrap();
        assert_eq!(outcome, WriteOutcome::StoredPatch);
        assert!(resolver.patches().is_patch_fragment(store.stored(&field).unwrap()));
        let value = resolver.get_effective_value(&store, &field).unwrap();
        assert!(layouts_equal(&value, &edited));
    }
}

#[test]
fn write_without_baseline_stores_verbatim() {
    let mut store = InMemoryFieldStore::new();
    let (_, defaults) = page_with_template(&mut store, "/sitecore/content/Home");
    let resolver = LayeredValueResolver::new(WholeValuePatch::new());
    let layout = layout_with(&[DEFAULT_DEVICE]);

    let outcome = resolver
        .set_effective_value(&mut store, &shared_of(defaults), &layout)
        .unwrap();
    assert_eq!(outcome, WriteOutcome::StoredVerbatim);
    assert_eq!(store.stored(&shared_of(defaults)), Some(layout.as_str()));
}

#[test]
fn standard_values_final_is_relative_to_own_shared() {
    let mut store = InMemoryFieldStore::new();
    let (_, defaults) = page_with_template(&mut store, "/sitecore/content/Home");
    store.put(shared_of(defaults), &layout_with(&[DEFAULT_DEVICE]));
    let resolver = LayeredValueResolver::new(WholeValuePatch::new());

    let same = resolver
        .set_effective_value(&mut store, &final_of(defaults), &layout_with(&[DEFAULT_DEVICE]))
        .unwrap();
    assert_eq!(same, WriteOutcome::Reset);

    let edited = layout_with(&[PRINT_DEVICE]);
    let outcome = resolver
        .set_effective_value(&mut store, &final_of(defaults), &edited)
        .unwrap();
    assert_eq!(outcome, WriteOutcome::StoredPatch);
    assert!(layouts_equal(
        &resolver.get_effective_value(&store, &final_of(defaults)).unwrap(),
        &edited
    ));
}

#[test]
fn explicit_baseline_write_is_idempotent() {
    let mut store = InMemoryFieldStore::new();
    let (page, _) = page_with_template(&mut store, "/sitecore/content/Home");
    let resolver = LayeredValueResolver::new(WholeValuePatch::new());
    let baseline = layout_with(&[DEFAULT_DEVICE]);
    let edited = layout_with(&[DEFAULT_DEVICE, P1]);

    let first = resolver
        .set_effective_value_with_base(&mut store, &final_of(page), &edited, &baseline)
        .unwrap();
    let second = resolver
        .set_effective_value_with_base(&mut store, &final_of(page), &edited, &baseline)
        .unwrap();

    assert_eq!(first, WriteOutcome::StoredPatch);
    assert_eq!(second, WriteOutcome::Unchanged);
    assert_eq!(store.writes(), 1);

    let reset = resolver
        .set_effective_value_with_base(&mut store, &final_of(page), &baseline, &baseline)
        .unwrap();
    assert_eq!(reset, WriteOutcome::Reset);
    assert_eq!(store.stored(&final_of(page)), None);
}

#[test]
fn explicit_blank_baseline_stores_value() {
    let mut store = InMemoryFieldStore::new();
    let (page, _) = page_with_template(&mut store, "/sitecore/content/Home");
    let resolver = LayeredValueResolver::new(WholeValuePatch::new());
    let layout = layout_with(&[DEFAULT_DEVICE]);

    let outcome = resolver
        .set_effective_value_with_base(&mut store, &final_of(page), &layout, "")
        .unwrap();
    assert_eq!(outcome, WriteOutcome::StoredVerbatim);
    assert_eq!(store.stored(&final_of(page)), Some(layout.as_str()));
}

#[test]
fn empty_write_stores_explicit_empty_layout() {
    let mut store = InMemoryFieldStore::new();
    let (page, defaults) = page_with_template(&mut store, "/sitecore/content/Home");
    store.put(shared_of(defaults), &layout_with(&[DEFAULT_DEVICE]));
    let resolver = LayeredValueResolver::new(WholeValuePatch::new());

    let outcome = resolver.set_effective_value(&mut store, &final_of(page), "").unwrap();
    assert_eq!(outcome, WriteOutcome::StoredPatch);
    let read = resolver.get_effective_value(&store, &final_of(page)).unwrap();
    assert_eq!(LayoutDocument::parse(&read).unwrap().device_count(), 0);
    assert!(!read.trim().is_empty());
}

#[test]
fn empty_write_with_explicit_baseline() {
    let mut store = InMemoryFieldStore::new();
    let (page, _) = page_with_template(&mut store, "/sitecore/content/Home");
    let resolver = LayeredValueResolver::new(WholeValuePatch::new());
    let baseline = layout_with(&[DEFAULT_DEVICE]);

    let outcome = resolver
        .set_effective_value_with_base(&mut store, &final_of(page), "", &baseline)
        .unwrap();
    assert_eq!(outcome, WriteOutcome::StoredPatch);
    let stored = store.stored(&final_of(page)).unwrap().to_string();
    let applied = resolver.patches().apply(&baseline, &stored).unwrap();
    assert_eq!(LayoutDocument::parse(&applied).unwrap().device_count(), 0);
}

const POOL: [&str; 3] = [DEFAULT_DEVICE, PRINT_DEVICE, P1];

fn layout_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec(0..POOL.len(), 0..4).prop_map(|picks| {
        let ids: Vec<&str> = picks.into_iter().map(|i| POOL[i]).collect();
        layout_with(&ids)
    })
}

proptest! {
    #[test]
    fn write_then_read_roundtrips(
        inherited in layout_strategy(),
        value in prop_oneof![Just(String::new()), layout_strategy()],
        final_role in any::<bool>(),
    ) {
        let mut store = InMemoryFieldStore::new();
        let (page, defaults) = page_with_template(&mut store, "/sitecore/content/Home");
        store.put(shared_of(defaults), &inherited);
        let role = if final_role { FieldRole::Final } else { FieldRole::Override };
        let field = FieldRef::new(page, role.field_id());

        let resolver = LayeredValueResolver::new(WholeValuePatch::new());
        resolver.set_effective_value(&mut store, &field, &value).unwrap();
        let read = resolver.get_effective_value(&store, &field).unwrap();
        if value.is_empty() {
            prop_assert_eq!(LayoutDocument::parse(&read).unwrap().device_count(), 0);
        } else {
            prop_assert!(layouts_equal(&read, &value), "{} != {}", read, value);
        }
    }
}
