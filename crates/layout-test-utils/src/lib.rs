//! Testing utilities for the layout workspace
//!
//! In-memory stores, patch ports with observable behaviour, and fixtures.

#![allow(missing_docs)]

use layout_field::{FieldRef, FieldStore, ItemRecord};
use layout_links::EntityStore;
use layout_model::{
    is_patch_fragment, DeltaError, DeltaPatchPort, Device, Entity, EntityId, LayoutDocument,
    Placeholder, RenderingReference, PATCH_NAMESPACE,
};
use std::collections::HashMap;
use std::sync::Mutex;

pub const DEFAULT_DEVICE: &str = "{FE5D7FDF-89C0-4D99-9AA3-B5FBD009C9F3}";
pub const PRINT_DEVICE: &str = "{46D2F427-4CE5-4E1F-BA10-EF3636F43534}";
pub const MAIN_LAYOUT: &str = "{14030E9F-CE92-49C6-AD87-7D49B50E42EA}";
pub const TEASER_RENDERING: &str = "{B8A3B2D2-5A1C-4E05-8C3E-1E9C8E47C1B1}";
pub const PROMO_DATASOURCE: &str = "{5E1F2A3B-4C5D-4E6F-8A9B-0C1D2E3F4A5B}";
pub const PROMO_PATH: &str = "/sitecore/content/Data/Promo";
pub const MAIN_PLACEHOLDER_SETTINGS: &str = "{2C8A1F3E-7B6D-4A59-9E10-3F4B5C6D7E8F}";
pub const MAIN_PLACEHOLDER_PATH: &str = "/sitecore/layout/Placeholder Settings/main";
pub const TEST_DEFINITION: &str = "{7A6B5C4D-3E2F-4A1B-9C8D-7E6F5A4B3C2D}";

pub fn id(text: &str) -> EntityId {
    EntityId::parse(text).unwrap()
}

/// Entity store backed by a list
#[derive(Debug, Clone, Default)]
pub struct InMemoryEntityStore {
    entities: Vec<Entity>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, path: &str) -> Self {
        self.insert(Entity::new(EntityId::parse(id).unwrap(), path));
        self
    }

    pub fn insert(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    pub fn remove(&mut self, id: &EntityId) {
        self.entities.retain(|e| e.id != *id);
    }
}

impl EntityStore for InMemoryEntityStore {
    fn resolve(&self, id_or_path: &str) -> Option<Entity> {
        self.entities
            .iter()
            .find(|e| e.link().matches(id_or_path))
            .cloned()
    }
}

/// Store holding every entity named in [`sample_layout`]
pub fn sample_entities() -> InMemoryEntityStore {
    InMemoryEntityStore::new()
        .with(DEFAULT_DEVICE, "/sitecore/layout/Devices/Default")
        .with(PRINT_DEVICE, "/sitecore/layout/Devices/Print")
        .with(MAIN_LAYOUT, "/sitecore/layout/Layouts/Main")
        .with(TEASER_RENDERING, "/sitecore/layout/Renderings/Teaser")
        .with(PROMO_DATASOURCE, PROMO_PATH)
        .with(MAIN_PLACEHOLDER_SETTINGS, MAIN_PLACEHOLDER_PATH)
        .with(TEST_DEFINITION, "/sitecore/system/Tests/Hero")
}

/// Field store backed by maps
#[derive(Debug, Clone, Default)]
pub struct InMemoryFieldStore {
    items: HashMap<EntityId, ItemRecord>,
    values: HashMap<FieldRef, String>,
    writes: usize,
}

impl InMemoryFieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&mut self, record: ItemRecord) -> EntityId {
        let id = record.id;
        self.items.insert(id, record);
        id
    }

    pub fn put(&mut self, field: FieldRef, value: &str) {
        self.values.insert(field, value.to_string());
    }

    /// Stored (not effective) value
    pub fn stored(&self, field: &FieldRef) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    /// Number of `set_raw_value` / `reset` calls
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl FieldStore for InMemoryFieldStore {
    fn item(&self, id: &EntityId) -> Option<ItemRecord> {
        self.items.get(id).cloned()
    }

    fn raw_value(&self, field: &FieldRef) -> Option<String> {
        self.values.get(field).cloned()
    }

    fn set_raw_value(&mut self, field: &FieldRef, value: &str) {
        self.writes += 1;
        self.values.insert(*field, value.to_string());
    }

    fn reset(&mut self, field: &FieldRef) {
        self.writes += 1;
        self.values.remove(field);
    }
}

/// Patches that append devices
///
/// `diff(base, derived)` keeps the devices of `derived` past the device
/// count of `base`; `apply` appends them. Composition is visible in the
/// result, so fold order can be asserted.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendingPatchPort;

impl AppendingPatchPort {
    /// Patch adding one device with the given id
    pub fn patch_adding(device_id: &str) -> String {
        format!(r#"<r {PATCH_NAMESPACE}="p"><d id="{device_id}"/></r>"#)
    }
}

impl DeltaPatchPort for AppendingPatchPort {
    fn diff(&self, base: &str, derived: &str) -> Result<String, DeltaError> {
        let base = LayoutDocument::parse(base)?;
        let mut derived = LayoutDocument::parse(derived)?;
        for _ in 0..base.device_count() {
            derived.remove_device(0);
        }
        derived.attributes_mut().set(PATCH_NAMESPACE, "p");
        Ok(derived.to_xml()?)
    }

    fn apply(&self, base: &str, patch: &str) -> Result<String, DeltaError> {
        if !is_patch_fragment(patch) {
            return Err(DeltaError::malformed("missing patch namespace on root"));
        }
        let mut doc = LayoutDocument::parse(base)?;
        let patch = LayoutDocument::parse(patch).map_err(|e| DeltaError::malformed(e.to_string()))?;
        for device in patch.devices() {
            doc.push_device(device.clone());
        }
        Ok(doc.to_xml()?)
    }
}

/// Port wrapper recording every `apply` call
#[derive(Debug, Default)]
pub struct RecordingPatchPort<P> {
    inner: P,
    applied: Mutex<Vec<(String, String)>>,
}

impl<P: DeltaPatchPort> RecordingPatchPort<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            applied: Mutex::new(Vec::new()),
        }
    }

    /// `(base, patch)` pairs in call order
    pub fn applied(&self) -> Vec<(String, String)> {
        self.applied.lock().unwrap().clone()
    }
}

impl<P: DeltaPatchPort> DeltaPatchPort for RecordingPatchPort<P> {
    fn diff(&self, base: &str, derived: &str) -> Result<String, DeltaError> {
        self.inner.diff(base, derived)
    }

    fn apply(&self, base: &str, patch: &str) -> Result<String, DeltaError> {
        self.applied
            .lock()
            .unwrap()
            .push((base.to_string(), patch.to_string()));
        self.inner.apply(base, patch)
    }

    fn is_patch_fragment(&self, text: &str) -> bool {
        self.inner.is_patch_fragment(text)
    }
}

/// Layout with two devices covering every reference site
///
/// Default device: layout, one placeholder with metadata by path, one
/// teaser rendering with datasource by id, test reference, a rule set and
/// a parameter list naming the datasource. Print device: layout only.
pub fn sample_layout() -> String {
    let mut doc = LayoutDocument::empty();

    let mut default = Device::new(Some(DEFAULT_DEVICE));
    default.set_layout(Some(MAIN_LAYOUT));
    default.push_placeholder(Placeholder::new("main").with_metadata(MAIN_PLACEHOLDER_PATH));
    let mut teaser = RenderingReference::new(TEASER_RENDERING)
        .with_placeholder("main")
        .with_datasource(PROMO_DATASOURCE)
        .with_parameters(&format!("Items={}&Title=Hello", PROMO_DATASOURCE.replace('{', "%7B").replace('}', "%7D")));
    teaser.set_multivariate_test(Some(TEST_DEFINITION));
    teaser
        .set_rules_xml(&format!(
            r#"<ruleset><rule uid="1"><actions><action id="{TEST_DEFINITION}" DataSource="{PROMO_DATASOURCE}"/></actions></rule></ruleset>"#
        ))
        .unwrap();
    default.push_rendering(teaser);
    doc.push_device(default);

    let mut print = Device::new(Some(PRINT_DEVICE));
    print.set_layout(Some(MAIN_LAYOUT));
    doc.push_device(print);

    doc.to_xml().unwrap()
}

/// Item with template defaults under `/sitecore/templates`
pub fn page_with_template(store: &mut InMemoryFieldStore, path: &str) -> (EntityId, EntityId) {
    let defaults = store.add_item(ItemRecord::new(
        EntityId::new_random(),
        "/sitecore/templates/Page/__Standard Values",
    ));
    let page = store.add_item(ItemRecord::new(EntityId::new_random(), path).with_template_defaults(defaults));
    (page, defaults)
}

/// Install a test subscriber honouring `RUST_LOG`
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
