//! Entity identifiers and references
//!
//! Provides [`EntityId`] for GUID-based addressing of content entities,
//! [`Entity`] for a resolved entity, and [`ItemLink`] for a reference that is
//! about to be rewritten or removed.

use crate::error::IdError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier of a content entity
///
/// Rendered in braced upper-case form, e.g.
/// `{FE5D7FDF-89C0-4D99-9AA3-B5FBD009C9F3}`. Parsing accepts any case with
/// or without braces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Wrap raw UUID
    #[inline]
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Build from a 128-bit constant
    #[inline]
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Fresh random identifier
    #[inline]
    #[must_use]
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID
    #[inline]
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parse identifier text
    ///
    /// # Errors
    /// Returns error if `text` is blank or not a GUID
    pub fn parse(text: &str) -> Result<Self, IdError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(IdError::Empty);
        }
        let inner = trimmed
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .unwrap_or(trimmed);
        Uuid::parse_str(inner)
            .map(Self)
            .map_err(|_| IdError::Invalid(text.to_string()))
    }

    /// Check if `text` denotes this identifier
    #[inline]
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        Self::parse(text).map_or(false, |id| id == *self)
    }

    /// Check if `text` looks like an identifier
    #[inline]
    #[must_use]
    pub fn is_id(text: &str) -> bool {
        Self::parse(text).is_ok()
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{{{:X}}}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Identifier of a field definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldId(EntityId);

impl FieldId {
    /// Shared layout field (`__Renderings`)
    pub const LAYOUT: Self = Self(EntityId::from_u128(0xF1A1_FE9E_A60C_4DDB_A3A0_BB5B_29FE_732E));

    /// Final layout field (`__Final Renderings`)
    pub const FINAL_LAYOUT: Self =
        Self(EntityId::from_u128(0x04BF_00DB_F5FB_41F7_8AB7_2240_8372_A981));

    /// Wrap entity identifier
    #[inline]
    #[must_use]
    pub const fn new(id: EntityId) -> Self {
        Self(id)
    }

    /// Underlying identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.0
    }
}

impl Display for FieldId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A resolved entity from the external store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identifier
    pub id: EntityId,
    /// Hierarchical path, e.g. `/sitecore/content/Home`
    pub full_path: String,
}

impl Entity {
    /// Create entity
    #[inline]
    #[must_use]
    pub fn new(id: EntityId, full_path: impl Into<String>) -> Self {
        Self {
            id,
            full_path: full_path.into(),
        }
    }

    /// Last path segment
    #[must_use]
    pub fn name(&self) -> &str {
        self.full_path
            .rsplit('/')
            .next()
            .unwrap_or(self.full_path.as_str())
    }

    /// Reference to this entity as a link target
    #[must_use]
    pub fn link(&self) -> ItemLink {
        ItemLink::new(self.id, self.full_path.clone())
    }
}

/// Reference to an entity that is being relinked or removed
///
/// Carries both the identifier and the path the entity had when the
/// reference was recorded; either form may appear in a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemLink {
    /// Target identifier
    pub target_id: EntityId,
    /// Target path
    pub target_path: String,
}

impl ItemLink {
    /// Create link
    #[inline]
    #[must_use]
    pub fn new(target_id: EntityId, target_path: impl Into<String>) -> Self {
        Self {
            target_id,
            target_path: target_path.into(),
        }
    }

    /// Check if `text` names the target by identifier
    #[inline]
    #[must_use]
    pub fn matches_id(&self, text: &str) -> bool {
        self.target_id.matches(text)
    }

    /// Check if `text` names the target by path (case-insensitive)
    #[inline]
    #[must_use]
    pub fn matches_path(&self, text: &str) -> bool {
        !self.target_path.is_empty() && text.eq_ignore_ascii_case(&self.target_path)
    }

    /// Check if `text` names the target either way
    #[inline]
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.matches_id(text) || self.matches_path(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "{FE5D7FDF-89C0-4D99-9AA3-B5FBD009C9F3}";

    #[test]
    fn display_is_braced_upper() {
        let id = EntityId::parse("fe5d7fdf-89c0-4d99-9aa3-b5fbd009c9f3").unwrap();
        assert_eq!(id.to_string(), RAW);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(EntityId::parse("  "), Err(IdError::Empty));
        assert!(matches!(EntityId::parse("/sitecore/content"), Err(IdError::Invalid(_))));
        assert!(!EntityId::is_id("query:./*"));
    }

    #[test]
    fn matches_ignores_case_and_braces() {
        let id: EntityId = RAW.parse().unwrap();
        assert!(id.matches("fe5d7fdf-89c0-4d99-9aa3-b5fbd009c9f3"));
        assert!(id.matches(RAW));
        assert!(!id.matches("{00000000-0000-0000-0000-000000000000}"));
    }

    #[test]
    fn field_ids_are_distinct() {
        assert_ne!(FieldId::LAYOUT, FieldId::FINAL_LAYOUT);
        assert_eq!(
            FieldId::LAYOUT.to_string(),
            "{F1A1FE9E-A60C-4DDB-A3A0-BB5B29FE732E}"
        );
    }

    #[test]
    fn item_link_matches_path_case_insensitively() {
        let link = ItemLink::new(RAW.parse().unwrap(), "/sitecore/content/Home");
        assert!(link.matches("/SITECORE/content/home"));
        assert!(link.matches(RAW));
        assert!(!link.matches("/sitecore/content/Other"));
    }

    #[test]
    fn entity_name_is_last_segment() {
        let entity = Entity::new(EntityId::new_random(), "/sitecore/layout/Main");
        assert_eq!(entity.name(), "Main");
        assert_eq!(entity.link().target_path, "/sitecore/layout/Main");
    }

    proptest::proptest! {
        #[test]
        fn display_parses_back(value in proptest::prelude::any::<u128>()) {
            let id = EntityId::from_u128(value);
            proptest::prop_assert_eq!(id.to_string().parse::<EntityId>(), Ok(id));
            proptest::prop_assert!(id.matches(&id.to_string().to_lowercase()));
        }
    }
}
