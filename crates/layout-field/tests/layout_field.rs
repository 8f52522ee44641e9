//! Store-backed layout field: accessors and link maintenance

use layout_field::{FieldRef, FieldRole, LayeredValueResolver, LayoutField, ResolverConfig};
use layout_links::{
    LinkConfig, LinkContext, LinkValidationResult, LinkedField, UrlParameterCodec,
};
use layout_model::{layouts_equal, Entity, EntityId, FieldId, ItemLink, WholeValuePatch};
use layout_test_utils::*;
use pretty_assertions::assert_eq;

struct Fixture {
    store: InMemoryFieldStore,
    resolver: LayeredValueResolver,
    page: EntityId,
    owner: Entity,
}

impl Fixture {
    fn new() -> Self {
        init_test_tracing();
        let mut store = InMemoryFieldStore::new();
        let (page, defaults) = page_with_template(&mut store, "/sitecore/content/Home");
        store.put(FieldRef::new(defaults, FieldId::LAYOUT), &sample_layout());
        Self {
            store,
            resolver: LayeredValueResolver::new(WholeValuePatch::new()),
            page,
            owner: Entity::new(page, "/sitecore/content/Home"),
        }
    }

    fn final_field(&self) -> FieldRef {
        FieldRef::new(self.page, FieldId::FINAL_LAYOUT)
    }
}

#[test]
fn open_checks_role_and_item() {
    let mut fx = Fixture::new();
    let bad_role = FieldRef::new(fx.page, FieldId::new(EntityId::new_random()));
    assert!(LayoutField::open(&fx.resolver, &mut fx.store, bad_role)
        .unwrap_err()
        .is_invalid_field_role());

    let unknown = FieldRef::new(EntityId::new_random(), FieldId::LAYOUT);
    assert!(LayoutField::open(&fx.resolver, &mut fx.store, unknown)
        .unwrap_err()
        .is_invalid_argument());

    let field = fx.final_field();
    let opened = LayoutField::open(&fx.resolver, &mut fx.store, field).unwrap();
    assert_eq!(opened.role(), FieldRole::Final);
    assert_eq!(opened.field(), field);
}

#[test]
fn device_accessors() {
    let mut fx = Fixture::new();
    let field = fx.final_field();
    let layout = LayoutField::open(&fx.resolver, &mut fx.store, field).unwrap();

    let default = id(DEFAULT_DEVICE);
    assert_eq!(layout.layout_id(&default).unwrap(), Some(id(MAIN_LAYOUT)));
    assert_eq!(layout.references(&default).unwrap().len(), 1);
    assert!(layout.device(&id(PRINT_DEVICE)).unwrap().is_some());

    let missing = EntityId::new_random();
    assert_eq!(layout.layout_id(&missing).unwrap(), None);
    assert!(layout.references(&missing).unwrap().is_empty());
}

#[test]
fn set_layout_for_all_devices() {
    let mut fx = Fixture::new();
    let field = fx.final_field();
    let wide = EntityId::new_random();
    {
        let mut layout = LayoutField::open(&fx.resolver, &mut fx.store, field).unwrap();
        assert!(layout.set_layout_for_all(&wide).unwrap());
        let doc = layout.document().unwrap();
        assert!(doc.devices().all(|d| d.layout_id() == Some(wide)));
    }
    assert!(fx.store.stored(&field).is_some());
}

#[test]
fn set_layout_on_empty_layout_writes_nothing() {
    let mut store = InMemoryFieldStore::new();
    let (page, _) = page_with_template(&mut store, "/sitecore/content/Empty");
    let resolver = LayeredValueResolver::new(WholeValuePatch::new());
    let field = FieldRef::new(page, FieldId::FINAL_LAYOUT);
    {
        let mut layout = LayoutField::open(&resolver, &mut store, field).unwrap();
        assert_eq!(layout.document().unwrap().device_count(), 0);
        assert!(!layout.set_layout_for_all(&EntityId::new_random()).unwrap());
    }
    assert_eq!(store.writes(), 0);
}

#[test]
fn relink_writes_once_as_patch() {
    let mut fx = Fixture::new();
    let field = fx.final_field();
    let entities = sample_entities();
    let cx = LinkContext::new(&entities, &fx.owner);
    let moved = Entity::new(EntityId::new_random(), "/sitecore/content/Data/Moved");
    {
        let mut layout = LayoutField::open(&fx.resolver, &mut fx.store, field).unwrap();
        layout
            .relink(&cx, &ItemLink::new(id(PROMO_DATASOURCE), PROMO_PATH), &moved)
            .unwrap();
        let rendering = layout.references(&id(DEFAULT_DEVICE)).unwrap().remove(0);
        assert_eq!(rendering.datasource(), Some(moved.id.to_string().as_str()));
    }
    assert_eq!(fx.store.writes(), 1);
    assert!(fx.resolver.patches().is_patch_fragment(fx.store.stored(&field).unwrap()));
}

#[test]
fn relink_without_matches_resets_to_inherited() {
    let mut fx = Fixture::new();
    let field = fx.final_field();
    let entities = sample_entities();
    let cx = LinkContext::new(&entities, &fx.owner);
    {
        let mut layout = LayoutField::open(&fx.resolver, &mut fx.store, field).unwrap();
        let unrelated = ItemLink::new(EntityId::new_random(), "/sitecore/content/Nowhere");
        layout
            .relink(&cx, &unrelated, &Entity::new(EntityId::new_random(), "/x"))
            .unwrap();
        assert!(layouts_equal(&layout.value().unwrap(), &sample_layout()));
    }
    assert_eq!(fx.store.stored(&field), None);
}

#[test]
fn remove_then_validate_has_no_broken_link() {
    let mut fx = Fixture::new();
    let field = fx.final_field();
    let mut entities = sample_entities();
    {
        let cx = LinkContext::new(&entities, &fx.owner);
        let mut layout = LayoutField::open(&fx.resolver, &mut fx.store, field).unwrap();
        layout
            .remove_link(&cx, &ItemLink::new(id(PROMO_DATASOURCE), PROMO_PATH))
            .unwrap();
    }
    entities.remove(&id(PROMO_DATASOURCE));

    let cx = LinkContext::new(&entities, &fx.owner);
    let layout = LayoutField::open(&fx.resolver, &mut fx.store, field).unwrap();
    let mut result = LinkValidationResult::new();
    layout.validate_links(&cx, &mut result).unwrap();
    assert!(!result.has_broken(), "{:?}", result.broken().collect::<Vec<_>>());
}

#[test]
fn config_drives_parameter_codec() {
    let config = ResolverConfig::from_toml_str(
        r#"
        [links]
        value_lookup_parameters = ["Items"]
        "#,
    )
    .unwrap();
    let mut fx = Fixture::new();
    fx.resolver = LayeredValueResolver::new(WholeValuePatch::new()).with_config(config);
    let field = fx.final_field();
    let entities = sample_entities();
    let cx = LinkContext::new(&entities, &fx.owner);

    // value lookups report nothing, so the parameter site disappears
    let layout = LayoutField::open(&fx.resolver, &mut fx.store, field).unwrap();
    let mut result = LinkValidationResult::new();
    layout.validate_links(&cx, &mut result).unwrap();
    assert_eq!(result.len(), 10);
}

#[test]
fn caller_codec_wins_over_config() {
    let config = ResolverConfig::new()
        .with_links(LinkConfig::new().with_value_lookup("Items"));
    let mut fx = Fixture::new();
    fx.resolver = LayeredValueResolver::new(WholeValuePatch::new()).with_config(config);
    let field = fx.final_field();
    let entities = sample_entities();
    let codec = UrlParameterCodec::new();
    let cx = LinkContext::new(&entities, &fx.owner).with_parameters(&codec);

    let layout = LayoutField::open(&fx.resolver, &mut fx.store, field).unwrap();
    let mut result = LinkValidationResult::new();
    layout.validate_links(&cx, &mut result).unwrap();
    assert_eq!(result.len(), 11);
}

#[test]
fn link_maintenance_on_blank_field_writes_nothing() {
    init_test_tracing();
    let mut store = InMemoryFieldStore::new();
    let (page, _) = page_with_template(&mut store, "/sitecore/content/Blank");
    let resolver = LayeredValueResolver::new(WholeValuePatch::new());
    let owner = Entity::new(page, "/sitecore/content/Blank");
    let entities = sample_entities();
    let cx = LinkContext::new(&entities, &owner);
    let link = ItemLink::new(id(PROMO_DATASOURCE), PROMO_PATH);

    for field in [
        FieldRef::new(page, FieldId::LAYOUT),
        FieldRef::new(page, FieldId::FINAL_LAYOUT),
    ] {
        let mut layout = LayoutField::open(&resolver, &mut store, field).unwrap();
        layout.remove_link(&cx, &link).unwrap();
        layout
            .relink(&cx, &link, &Entity::new(EntityId::new_random(), "/x"))
            .unwrap();
        assert_eq!(layout.value().unwrap(), "");
    }
    assert_eq!(store.writes(), 0);
    assert_eq!(store.stored(&FieldRef::new(page, FieldId::FINAL_LAYOUT)), None);
    assert_eq!(store.stored(&FieldRef::new(page, FieldId::LAYOUT)), None);
}
