//! Rule set sub-documents
//!
//! Personalization rules are stored as an XML rule set inside a rendering
//! (`<rls><ruleset><rule>..</rule></ruleset></rls>`). Conditions and
//! actions refer to entities by identifier in attribute values.

use crate::context::{LinkContext, RuleFieldFactory};
use crate::error::LinkError;
use crate::field::{LinkedField, SubField};
use crate::report::{LinkSink, LinkSite};
use indexmap::IndexSet;
use layout_model::xml::{XmlElement, XmlNode};
use layout_model::{Entity, ItemLink};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

const RULE: &str = "rule";

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\{[0-9A-Fa-f]{8}(?:-[0-9A-Fa-f]{4}){3}-[0-9A-Fa-f]{12}\}|[0-9A-Fa-f]{8}(?:-[0-9A-Fa-f]{4}){3}-[0-9A-Fa-f]{12}",
    )
    .expect("identifier pattern is valid")
});

/// Opens rule sets as [`RuleXmlField`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlRuleFactory;

impl RuleFieldFactory for XmlRuleFactory {
    fn open(&self, rules_xml: &str) -> Result<Box<dyn SubField>, LinkError> {
        Ok(Box::new(RuleXmlField::parse(rules_xml)?))
    }
}

/// Rule set text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleXmlField {
    value: String,
}

impl RuleXmlField {
    /// Wrap rule set text
    ///
    /// # Errors
    /// Returns `LinkError::Rules` if the text is not well-formed
    pub fn parse(value: impl Into<String>) -> Result<Self, LinkError> {
        let value = value.into();
        XmlElement::parse(&value).map_err(|e| LinkError::Rules(e.to_string()))?;
        Ok(Self { value })
    }

    /// Distinct identifiers in order of appearance
    #[must_use]
    pub fn identifiers(&self) -> IndexSet<&str> {
        IDENTIFIER.find_iter(&self.value).map(|m| m.as_str()).collect()
    }
}

impl LinkedField for RuleXmlField {
    type Error = LinkError;

    fn relink(
        &mut self,
        _cx: &LinkContext<'_>,
        link: &ItemLink,
        new_target: &Entity,
    ) -> Result<(), LinkError> {
        let new_id = new_target.id.to_string();
        let rewritten = IDENTIFIER.replace_all(&self.value, |caps: &Captures<'_>| {
            if link.matches_id(&caps[0]) {
                new_id.clone()
            } else {
                caps[0].to_string()
            }
        });
        self.value = rewritten.into_owned();
        Ok(())
    }

    fn remove_link(&mut self, _cx: &LinkContext<'_>, link: &ItemLink) -> Result<(), LinkError> {
        let mut root = XmlElement::parse(&self.value)?;
        let removed = prune_rules(&mut root, link);
        if removed > 0 {
            debug!(removed, "dropped rules referencing removed entity");
            self.value = root.to_xml()?;
        }
        Ok(())
    }

    fn validate_links(
        &self,
        cx: &LinkContext<'_>,
        sink: &mut dyn LinkSink,
    ) -> Result<(), LinkError> {
        for id in self.identifiers() {
            match cx.resolve(id) {
                Some(target) => sink.add_valid(LinkSite::Rule, id, &target),
                None => sink.add_broken(LinkSite::Rule, id),
            }
        }
        Ok(())
    }
}

impl SubField for RuleXmlField {
    fn value(&self) -> &str {
        &self.value
    }
}

/// Drop `<rule>` elements with an attribute naming `link`; returns the count
fn prune_rules(element: &mut XmlElement, link: &ItemLink) -> usize {
    let before = element.children.len();
    element.children.retain(|node| {
        !node
            .as_element()
            .is_some_and(|e| e.name == RULE && references(e, link))
    });
    let mut removed = before - element.children.len();
    for node in &mut element.children {
        if let XmlNode::Element(child) = node {
            removed += prune_rules(child, link);
        }
    }
    removed
}

fn references(element: &XmlElement, link: &ItemLink) -> bool {
    element.any_descendant(&|e: &XmlElement| e.attributes.iter().any(|(_, v)| link.matches(v)))
}
