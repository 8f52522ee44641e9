//! Field storage seam
//!
//! The resolver never owns data; it reads and writes raw field values
//! through a [`FieldStore`].

use crate::error::ResolveError;
use layout_model::{Entity, EntityId, FieldId};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Which of the two layout fields is addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldRole {
    /// Shared layout (`__Renderings`)
    Override,
    /// Final layout (`__Final Renderings`)
    Final,
}

impl FieldRole {
    /// Role of field `id`
    ///
    /// # Errors
    /// Returns `ResolveError::InvalidFieldRole` for any other field
    pub fn from_field_id(id: FieldId) -> Result<Self, ResolveError> {
        if id == FieldId::LAYOUT {
            Ok(Self::Override)
        } else if id == FieldId::FINAL_LAYOUT {
            Ok(Self::Final)
        } else {
            Err(ResolveError::InvalidFieldRole(id))
        }
    }

    /// Field definition for this role
    #[inline]
    #[must_use]
    pub fn field_id(self) -> FieldId {
        match self {
            Self::Override => FieldId::LAYOUT,
            Self::Final => FieldId::FINAL_LAYOUT,
        }
    }

    /// Fields consulted, in order, when resolving this role
    #[inline]
    #[must_use]
    pub fn chain(self) -> &'static [FieldRole] {
        match self {
            Self::Override => &[Self::Override],
            Self::Final => &[Self::Final, Self::Override],
        }
    }
}

impl Display for FieldRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Override => f.write_str("override"),
            Self::Final => f.write_str("final"),
        }
    }
}

/// One field on one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    /// Owning item
    pub item: EntityId,
    /// Field definition
    pub field: FieldId,
}

impl FieldRef {
    /// Create reference
    #[inline]
    #[must_use]
    pub fn new(item: EntityId, field: FieldId) -> Self {
        Self { item, field }
    }

    /// Same item, role's field
    #[inline]
    #[must_use]
    pub fn with_role(self, role: FieldRole) -> Self {
        Self::new(self.item, role.field_id())
    }
}

impl Display for FieldRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.item, self.field)
    }
}

/// Item metadata the resolver needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Identifier
    pub id: EntityId,
    /// Item name (last path segment)
    pub name: String,
    /// Hierarchical path
    pub full_path: String,
    /// Template-defaults entity of the item's template
    pub template_defaults: Option<EntityId>,
    /// Inheritance prototype the item was cloned from
    pub prototype: Option<EntityId>,
}

impl ItemRecord {
    /// Record at `full_path`; name is the last segment
    #[must_use]
    pub fn new(id: EntityId, full_path: impl Into<String>) -> Self {
        let full_path = full_path.into();
        let name = full_path.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            id,
            name,
            full_path,
            template_defaults: None,
            prototype: None,
        }
    }

    /// With template-defaults entity
    #[inline]
    #[must_use]
    pub fn with_template_defaults(mut self, id: EntityId) -> Self {
        self.template_defaults = Some(id);
        self
    }

    /// With inheritance prototype
    #[inline]
    #[must_use]
    pub fn with_prototype(mut self, id: EntityId) -> Self {
        self.prototype = Some(id);
        self
    }

    /// Entity view for link maintenance
    #[must_use]
    pub fn entity(&self) -> Entity {
        Entity::new(self.id, self.full_path.clone())
    }
}

/// Raw field storage
///
/// `None` from [`raw_value`](FieldStore::raw_value) means the item has no
/// value of its own; an empty string is a stored empty value.
pub trait FieldStore {
    /// Item metadata
    fn item(&self, id: &EntityId) -> Option<ItemRecord>;

    /// Item's own stored value
    fn raw_value(&self, field: &FieldRef) -> Option<String>;

    /// Store a value on the item
    fn set_raw_value(&mut self, field: &FieldRef, value: &str);

    /// Drop the item's own value so it inherits again
    fn reset(&mut self, field: &FieldRef);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_map_to_field_ids() {
        assert_eq!(FieldRole::from_field_id(FieldId::LAYOUT).unwrap(), FieldRole::Override);
        assert_eq!(FieldRole::from_field_id(FieldId::FINAL_LAYOUT).unwrap(), FieldRole::Final);
        assert!(FieldRole::from_field_id(FieldId::new(EntityId::new_random()))
            .unwrap_err()
            .is_invalid_field_role());
    }

    #[test]
    fn final_chain_includes_override() {
        assert_eq!(FieldRole::Final.chain(), &[FieldRole::Final, FieldRole::Override]);
        assert_eq!(FieldRole::Override.chain(), &[FieldRole::Override]);
    }

    #[test]
    fn record_name_is_last_segment() {
        let record = ItemRecord::new(EntityId::new_random(), "/sitecore/templates/Page/__Standard Values");
        assert_eq!(record.name, "__Standard Values");
        assert_eq!(record.entity().full_path, record.full_path);
    }
}
