//! Rendering parameter codec and sub-fields
//!
//! Parameters are stored URL-encoded (`a=1&b=%7B...%7D`). Each value is
//! wrapped in a sub-field chosen by name and shape:
//!
//! - [`ValueLookupField`] for names configured as value lookups
//! - [`ReferenceListField`] for pipe-separated identifier lists
//! - [`TextField`] for everything else

use crate::context::{LinkConfig, LinkContext, ParameterCodec, ParameterFields};
use crate::error::LinkError;
use crate::field::{LinkedField, SubField};
use crate::report::{LinkSink, LinkSite};
use layout_model::{Entity, EntityId, ItemLink};
use tracing::trace;
use url::form_urlencoded;

const LIST_SEPARATOR: char = '|';

/// URL-encoded parameter codec
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParameterCodec {
    value_lookups: Vec<String>,
}

impl UrlParameterCodec {
    /// Codec without value lookup parameters
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value_lookups: Vec::new(),
        }
    }

    /// Codec treating the configured names as value lookups
    #[must_use]
    pub fn from_config(config: &LinkConfig) -> Self {
        Self {
            value_lookups: config.value_lookup_parameters.clone(),
        }
    }

    fn is_value_lookup(&self, name: &str) -> bool {
        self.value_lookups.iter().any(|n| n.eq_ignore_ascii_case(name))
    }
}

impl ParameterCodec for UrlParameterCodec {
    fn parse(&self, component: &Entity, raw: &str) -> ParameterFields {
        let mut fields = ParameterFields::new();
        for (name, value) in form_urlencoded::parse(raw.as_bytes()) {
            let field: Box<dyn SubField> = if self.is_value_lookup(&name) {
                Box::new(ValueLookupField::new(value))
            } else if ReferenceListField::accepts(&value) {
                Box::new(ReferenceListField::new(value))
            } else {
                Box::new(TextField::new(value))
            };
            fields.insert(name.into_owned(), field);
        }
        trace!(component = %component.id, count = fields.len(), "parsed rendering parameters");
        fields
    }

    fn serialize(&self, fields: &ParameterFields) -> String {
        let mut encoder = form_urlencoded::Serializer::new(String::new());
        for (name, field) in fields {
            encoder.append_pair(name, field.value());
        }
        encoder.finish()
    }
}

/// Pipe-separated list of entity identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceListField {
    value: String,
}

impl ReferenceListField {
    /// Wrap list text
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Check if `value` is a non-empty list of identifiers
    #[must_use]
    pub fn accepts(value: &str) -> bool {
        let mut entries = value.split(LIST_SEPARATOR).filter(|e| !e.is_empty()).peekable();
        entries.peek().is_some() && entries.all(EntityId::is_id)
    }

    fn entries(&self) -> impl Iterator<Item = &str> {
        self.value.split(LIST_SEPARATOR).filter(|e| !e.is_empty())
    }
}

impl LinkedField for ReferenceListField {
    type Error = LinkError;

    fn relink(
        &mut self,
        _cx: &LinkContext<'_>,
        link: &ItemLink,
        new_target: &Entity,
    ) -> Result<(), LinkError> {
        let new_id = new_target.id.to_string();
        let entries: Vec<&str> = self
            .entries()
            .map(|e| if link.matches_id(e) { new_id.as_str() } else { e })
            .collect();
        self.value = entries.join("|");
        Ok(())
    }

    fn remove_link(&mut self, _cx: &LinkContext<'_>, link: &ItemLink) -> Result<(), LinkError> {
        let kept: Vec<&str> = self.entries().filter(|e| !link.matches_id(e)).collect();
        self.value = kept.join("|");
        Ok(())
    }

    fn validate_links(
        &self,
        cx: &LinkContext<'_>,
        sink: &mut dyn LinkSink,
    ) -> Result<(), LinkError> {
        for entry in self.entries() {
            match cx.resolve(entry) {
                Some(target) => sink.add_valid(LinkSite::Parameter, entry, &target),
                None => sink.add_broken(LinkSite::Parameter, entry),
            }
        }
        Ok(())
    }
}

impl SubField for ReferenceListField {
    fn value(&self) -> &str {
        &self.value
    }
}

/// Value chosen from a lookup source
///
/// Holds the target's identifier, path or name rather than a plain
/// reference. Removing the target clears the whole value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueLookupField {
    value: String,
}

impl ValueLookupField {
    /// Wrap looked-up value
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    fn refers_to(&self, link: &ItemLink) -> bool {
        link.matches(&self.value)
            || link
                .target_path
                .rsplit('/')
                .next()
                .is_some_and(|name| !name.is_empty() && name.eq_ignore_ascii_case(&self.value))
    }
}

impl LinkedField for ValueLookupField {
    type Error = LinkError;

    fn relink(
        &mut self,
        _cx: &LinkContext<'_>,
        link: &ItemLink,
        new_target: &Entity,
    ) -> Result<(), LinkError> {
        if link.matches_id(&self.value) {
            self.value = new_target.id.to_string();
        } else if self.refers_to(link) {
            self.value = new_target.name().to_string();
        }
        Ok(())
    }

    fn remove_link(&mut self, _cx: &LinkContext<'_>, link: &ItemLink) -> Result<(), LinkError> {
        if self.refers_to(link) {
            self.value.clear();
        }
        Ok(())
    }

    fn validate_links(
        &self,
        _cx: &LinkContext<'_>,
        _sink: &mut dyn LinkSink,
    ) -> Result<(), LinkError> {
        Ok(())
    }
}

impl SubField for ValueLookupField {
    fn value(&self) -> &str {
        &self.value
    }
}

/// Free text without references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextField {
    value: String,
}

impl TextField {
    /// Wrap text
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl LinkedField for TextField {
    type Error = LinkError;

    fn relink(&mut self, _: &LinkContext<'_>, _: &ItemLink, _: &Entity) -> Result<(), LinkError> {
        Ok(())
    }

    fn remove_link(&mut self, _: &LinkContext<'_>, _: &ItemLink) -> Result<(), LinkError> {
        Ok(())
    }

    fn validate_links(&self, _: &LinkContext<'_>, _: &mut dyn LinkSink) -> Result<(), LinkError> {
        Ok(())
    }
}

impl SubField for TextField {
    fn value(&self) -> &str {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EntityStore;
    use crate::report::LinkValidationResult;
    use pretty_assertions::assert_eq;

    const A: &str = "{6B0C8D8B-5D09-4A4C-9E0B-0D8C1E6F3A11}";
    const B: &str = "{0E6C5B31-1B6B-4C8E-8F8A-7A3C2D1E0F22}";

    struct Only(Entity);

    impl EntityStore for Only {
        fn resolve(&self, id_or_path: &str) -> Option<Entity> {
            self.0.link().matches(id_or_path).then(|| self.0.clone())
        }
    }

    fn entity(id: &str, path: &str) -> Entity {
        Entity::new(id.parse().unwrap(), path)
    }

    #[test]
    fn parse_picks_sub_field_kinds() {
        let codec = UrlParameterCodec::from_config(&LinkConfig::new().with_value_lookup("Color"));
        let component = entity(A, "/sitecore/layout/Renderings/Teaser");
        let raw = format!("Items={}|{}&Color=Red&Title=Hello%20world", A, B);
        let fields = codec.parse(&component, &raw);

        let kinds: Vec<String> = fields
            .iter()
            .map(|(name, field)| format!("{name}:{field:?}"))
            .collect();
        assert!(kinds[0].starts_with("Items:ReferenceListField"));
        assert!(kinds[1].starts_with("Color:ValueLookupField"));
        assert!(kinds[2].starts_with("Title:TextField"));
        assert_eq!(fields["Title"].value(), "Hello world");
    }

    #[test]
    fn serialize_keeps_order() {
        let codec = UrlParameterCodec::new();
        let component = entity(A, "/c");
        let fields = codec.parse(&component, "b=2&a=1");
        assert_eq!(codec.serialize(&fields), "b=2&a=1");
    }

    #[test]
    fn reference_list_relink_and_remove() {
        let store = Only(entity(A, "/a"));
        let owner = entity(B, "/owner");
        let cx = LinkContext::new(&store, &owner);
        let link = ItemLink::new(A.parse().unwrap(), "/a");
        let target = entity(B, "/b");

        let mut list = ReferenceListField::new(format!("{A}|{B}"));
        list.relink(&cx, &link, &target).unwrap();
        assert_eq!(list.value(), format!("{B}|{B}"));

        let mut list = ReferenceListField::new(format!("{A}|{B}"));
        list.remove_link(&cx, &link).unwrap();
        assert_eq!(list.value(), B);
    }

    #[test]
    fn reference_list_validation_reports_each_entry() {
        let store = Only(entity(A, "/a"));
        let owner = entity(B, "/owner");
        let cx = LinkContext::new(&store, &owner);
        let list = ReferenceListField::new(format!("{A}|{B}"));

        let mut result = LinkValidationResult::new();
        list.validate_links(&cx, &mut result).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.is_broken_where(|r| r == B));
    }

    #[test]
    fn value_lookup_cleared_only_when_it_refers_to_target() {
        let store = Only(entity(A, "/a"));
        let owner = entity(B, "/owner");
        let cx = LinkContext::new(&store, &owner);
        let link = ItemLink::new(A.parse().unwrap(), "/sitecore/system/Colors/Red");

        let mut other = ValueLookupField::new("Blue");
        other.remove_link(&cx, &link).unwrap();
        assert_eq!(other.value(), "Blue");

        let mut red = ValueLookupField::new("red");
        red.remove_link(&cx, &link).unwrap();
        assert_eq!(red.value(), "");
    }

    #[test]
    fn accepts_only_identifier_lists() {
        assert!(ReferenceListField::accepts(A));
        assert!(ReferenceListField::accepts(&format!("{A}|{B}|")));
        assert!(!ReferenceListField::accepts(""));
        assert!(!ReferenceListField::accepts(&format!("{A}|text")));
    }
}
