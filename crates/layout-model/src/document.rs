//! Layout document model
//!
//! Typed view over the persisted layout XML:
//!
//! ```text
//! <r>                                   LayoutDocument
//!   <d id="{device}" l="{layout}">      Device
//!     <r id="{component}" ds=".." par=".." mvt=".." pt="..">   RenderingReference
//!       <rls><ruleset>..</ruleset></rls>                        rule set
//!     </r>
//!     <p key="main" md="{metadata}"/>   Placeholder
//!   </d>
//! </r>
//! ```
//!
//! Only the attributes this crate mutates are interpreted; everything else
//! (unknown attributes, elements, comments, ordering) is carried through
//! untouched.

use crate::error::DocumentError;
use crate::id::EntityId;
use crate::xml::{Attributes, XmlDocument, XmlElement, XmlNode};
use tracing::trace;

/// Canonical text of a layout with no devices
pub const EMPTY_LAYOUT: &str = "<r/>";

const ROOT: &str = "r";
const DEVICE: &str = "d";
const RENDERING: &str = "r";
const PLACEHOLDER: &str = "p";
const RULES: &str = "rls";

/// Root of a parsed layout value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutDocument {
    prolog: Vec<XmlNode>,
    root_name: String,
    attributes: Attributes,
    children: Vec<Slot<Device>>,
    epilog: Vec<XmlNode>,
}

/// Known child or preserved foreign node
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot<T> {
    Known(T),
    Other(XmlNode),
}

impl LayoutDocument {
    /// Document with no devices
    #[must_use]
    pub fn empty() -> Self {
        Self {
            prolog: Vec::new(),
            root_name: ROOT.to_string(),
            attributes: Attributes::new(),
            children: Vec::new(),
            epilog: Vec::new(),
        }
    }

    /// Parse layout text
    ///
    /// Blank text parses to the empty document.
    ///
    /// # Errors
    /// Returns error if the text is not well-formed XML
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        if text.trim().is_empty() {
            return Ok(Self::empty());
        }
        let XmlDocument { prolog, root, epilog } = XmlDocument::parse(text)?;
        let children = root
            .children
            .into_iter()
            .map(|node| match node {
                XmlNode::Element(e) if e.name == DEVICE => Slot::Known(Device::from_element(e)),
                other => Slot::Other(other),
            })
            .collect();
        let doc = Self {
            prolog,
            root_name: root.name,
            attributes: root.attributes,
            children,
            epilog,
        };
        trace!(devices = doc.device_count(), "parsed layout");
        Ok(doc)
    }

    /// Serialize to layout text
    ///
    /// # Errors
    /// Returns error if the writer rejects a node
    pub fn to_xml(&self) -> Result<String, DocumentError> {
        self.to_xml_document().to_xml()
    }

    /// Rebuild the generic tree
    #[must_use]
    pub fn to_xml_document(&self) -> XmlDocument {
        let root = XmlElement {
            name: self.root_name.clone(),
            attributes: self.attributes.clone(),
            children: self
                .children
                .iter()
                .map(|slot| match slot {
                    Slot::Known(device) => XmlNode::Element(device.to_element()),
                    Slot::Other(node) => node.clone(),
                })
                .collect(),
        };
        XmlDocument {
            prolog: self.prolog.clone(),
            root,
            epilog: self.epilog.clone(),
        }
    }

    /// Root attributes
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Root attributes, mutably
    #[inline]
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    /// Devices in document order
    pub fn devices(&self) -> impl DoubleEndedIterator<Item = &Device> {
        known(&self.children)
    }

    /// Devices in document order, mutably
    pub fn devices_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut Device> {
        known_mut(&mut self.children)
    }

    /// Number of devices
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices().count()
    }

    /// Check for zero devices
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.device_count() == 0
    }

    /// Device at ordinal `index`
    #[must_use]
    pub fn device(&self, index: usize) -> Option<&Device> {
        self.devices().nth(index)
    }

    /// Device at ordinal `index`, mutably
    pub fn device_mut(&mut self, index: usize) -> Option<&mut Device> {
        self.devices_mut().nth(index)
    }

    /// Append device
    pub fn push_device(&mut self, device: Device) {
        self.children.push(Slot::Known(device));
    }

    /// Remove device at ordinal `index`
    pub fn remove_device(&mut self, index: usize) -> Option<Device> {
        remove_known(&mut self.children, index)
    }

    /// Device whose `id` denotes `device_id`
    #[must_use]
    pub fn device_by_id(&self, device_id: &EntityId) -> Option<&Device> {
        self.devices()
            .find(|d| d.id().is_some_and(|id| device_id.matches(id)))
    }

    /// Layout identifier of device `device_id`
    ///
    /// Returns `None` when the device is absent or its layout reference is
    /// not an identifier.
    #[must_use]
    pub fn layout_id(&self, device_id: &EntityId) -> Option<EntityId> {
        self.device_by_id(device_id)?.layout_id()
    }

    /// Rendering references of device `device_id`
    #[must_use]
    pub fn renderings_for(&self, device_id: &EntityId) -> Option<Vec<&RenderingReference>> {
        self.device_by_id(device_id)
            .map(|device| device.renderings().collect())
    }

    /// Point every device at the same layout
    ///
    /// Returns `false` (and changes nothing) when there are no devices.
    pub fn set_layout_for_all(&mut self, layout: &str) -> bool {
        let mut touched = false;
        for device in self.devices_mut() {
            device.set_layout(Some(layout));
            touched = true;
        }
        touched
    }

    /// Compare with another document ignoring formatting
    #[must_use]
    pub fn structurally_eq(&self, other: &Self) -> bool {
        self.to_xml_document().root.structurally_eq(&other.to_xml_document().root)
    }
}

impl Default for LayoutDocument {
    fn default() -> Self {
        Self::empty()
    }
}

/// Compare two layout texts structurally
///
/// Blank texts are equal to each other and to nothing else. Text that does
/// not parse is compared verbatim.
#[must_use]
pub fn layouts_equal(a: &str, b: &str) -> bool {
    match (a.trim().is_empty(), b.trim().is_empty()) {
        (true, true) => return true,
        (true, false) | (false, true) => return false,
        (false, false) => {}
    }
    match (XmlElement::parse(a), XmlElement::parse(b)) {
        (Ok(x), Ok(y)) => x.structurally_eq(&y),
        _ => a == b,
    }
}

/// Presentation context within a layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    name: String,
    attributes: Attributes,
    children: Vec<DeviceSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DeviceSlot {
    Rendering(RenderingReference),
    Placeholder(Placeholder),
    Other(XmlNode),
}

impl Device {
    /// Device with optional id
    #[must_use]
    pub fn new(id: Option<&str>) -> Self {
        let mut attributes = Attributes::new();
        attributes.assign("id", id);
        Self {
            name: DEVICE.to_string(),
            attributes,
            children: Vec::new(),
        }
    }

    fn from_element(element: XmlElement) -> Self {
        let children = element
            .children
            .into_iter()
            .map(|node| match node {
                XmlNode::Element(e) if e.name == RENDERING => {
                    DeviceSlot::Rendering(RenderingReference::from_element(e))
                }
                XmlNode::Element(e) if e.name == PLACEHOLDER => {
                    DeviceSlot::Placeholder(Placeholder::from_element(e))
                }
                other => DeviceSlot::Other(other),
            })
            .collect();
        Self {
            name: element.name,
            attributes: element.attributes,
            children,
        }
    }

    fn to_element(&self) -> XmlElement {
        XmlElement {
            name: self.name.clone(),
            attributes: self.attributes.clone(),
            children: self
                .children
                .iter()
                .map(|slot| match slot {
                    DeviceSlot::Rendering(r) => XmlNode::Element(r.element.clone()),
                    DeviceSlot::Placeholder(p) => XmlNode::Element(p.element.clone()),
                    DeviceSlot::Other(node) => node.clone(),
                })
                .collect(),
        }
    }

    /// Device identifier (`id`)
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        non_empty(self.attributes.get("id"))
    }

    /// Set or clear device identifier
    pub fn set_id(&mut self, id: Option<&str>) {
        self.attributes.assign("id", id);
    }

    /// Layout reference (`l`)
    #[must_use]
    pub fn layout(&self) -> Option<&str> {
        non_empty(self.attributes.get("l"))
    }

    /// Layout reference parsed as identifier
    #[must_use]
    pub fn layout_id(&self) -> Option<EntityId> {
        self.layout().and_then(|l| EntityId::parse(l).ok())
    }

    /// Set or clear layout reference
    pub fn set_layout(&mut self, layout: Option<&str>) {
        self.attributes.assign("l", layout);
    }

    /// All attributes
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Renderings in document order
    pub fn renderings(&self) -> impl DoubleEndedIterator<Item = &RenderingReference> {
        self.children.iter().filter_map(|slot| match slot {
            DeviceSlot::Rendering(r) => Some(r),
            _ => None,
        })
    }

    /// Renderings in document order, mutably
    pub fn renderings_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut RenderingReference> {
        self.children.iter_mut().filter_map(|slot| match slot {
            DeviceSlot::Rendering(r) => Some(r),
            _ => None,
        })
    }

    /// Number of renderings
    #[must_use]
    pub fn rendering_count(&self) -> usize {
        self.renderings().count()
    }

    /// Rendering at ordinal `index`
    #[must_use]
    pub fn rendering(&self, index: usize) -> Option<&RenderingReference> {
        self.renderings().nth(index)
    }

    /// Rendering at ordinal `index`, mutably
    pub fn rendering_mut(&mut self, index: usize) -> Option<&mut RenderingReference> {
        self.renderings_mut().nth(index)
    }

    /// Append rendering
    pub fn push_rendering(&mut self, rendering: RenderingReference) {
        self.children.push(DeviceSlot::Rendering(rendering));
    }

    /// Remove rendering at ordinal `index`
    pub fn remove_rendering(&mut self, index: usize) -> Option<RenderingReference> {
        let pos = self
            .children
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot, DeviceSlot::Rendering(_)))
            .nth(index)?
            .0;
        match self.children.remove(pos) {
            DeviceSlot::Rendering(r) => Some(r),
            _ => None,
        }
    }

    /// Placeholders in document order
    pub fn placeholders(&self) -> impl DoubleEndedIterator<Item = &Placeholder> {
        self.children.iter().filter_map(|slot| match slot {
            DeviceSlot::Placeholder(p) => Some(p),
            _ => None,
        })
    }

    /// Placeholders in document order, mutably
    pub fn placeholders_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut Placeholder> {
        self.children.iter_mut().filter_map(|slot| match slot {
            DeviceSlot::Placeholder(p) => Some(p),
            _ => None,
        })
    }

    /// Number of placeholders
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.placeholders().count()
    }

    /// Placeholder at ordinal `index`
    #[must_use]
    pub fn placeholder(&self, index: usize) -> Option<&Placeholder> {
        self.placeholders().nth(index)
    }

    /// Placeholder at ordinal `index`, mutably
    pub fn placeholder_mut(&mut self, index: usize) -> Option<&mut Placeholder> {
        self.placeholders_mut().nth(index)
    }

    /// Append placeholder
    pub fn push_placeholder(&mut self, placeholder: Placeholder) {
        self.children.push(DeviceSlot::Placeholder(placeholder));
    }

    /// Remove placeholder at ordinal `index`
    pub fn remove_placeholder(&mut self, index: usize) -> Option<Placeholder> {
        let pos = self
            .children
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot, DeviceSlot::Placeholder(_)))
            .nth(index)?
            .0;
        match self.children.remove(pos) {
            DeviceSlot::Placeholder(p) => Some(p),
            _ => None,
        }
    }
}

/// Reference to a renderable component within a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderingReference {
    element: XmlElement,
}

impl RenderingReference {
    /// Rendering of component `component_id`
    #[must_use]
    pub fn new(component_id: &str) -> Self {
        Self {
            element: XmlElement::new(RENDERING).with_attribute("id", component_id),
        }
    }

    fn from_element(element: XmlElement) -> Self {
        Self { element }
    }

    /// Builder: datasource
    #[must_use]
    pub fn with_datasource(mut self, datasource: &str) -> Self {
        self.set_datasource(Some(datasource));
        self
    }

    /// Builder: parameters
    #[must_use]
    pub fn with_parameters(mut self, parameters: &str) -> Self {
        self.set_parameters(Some(parameters));
        self
    }

    /// Builder: placeholder key
    #[must_use]
    pub fn with_placeholder(mut self, key: &str) -> Self {
        self.element.attributes.set("ph", key);
        self
    }

    /// Component reference (`id`)
    #[must_use]
    pub fn component_id(&self) -> Option<&str> {
        non_empty(self.element.attributes.get("id"))
    }

    /// Set component reference
    pub fn set_component_id(&mut self, id: &str) {
        self.element.attributes.set("id", id);
    }

    /// Datasource (`ds`)
    #[must_use]
    pub fn datasource(&self) -> Option<&str> {
        non_empty(self.element.attributes.get("ds"))
    }

    /// Set or clear datasource
    pub fn set_datasource(&mut self, datasource: Option<&str>) {
        self.element.attributes.assign("ds", datasource);
    }

    /// URL-encoded parameters (`par`)
    #[must_use]
    pub fn parameters(&self) -> Option<&str> {
        non_empty(self.element.attributes.get("par"))
    }

    /// Set or clear parameters
    pub fn set_parameters(&mut self, parameters: Option<&str>) {
        self.element.attributes.assign("par", parameters);
    }

    /// Placeholder key (`ph`)
    #[must_use]
    pub fn placeholder(&self) -> Option<&str> {
        non_empty(self.element.attributes.get("ph"))
    }

    /// Instance identifier (`uid`)
    #[must_use]
    pub fn unique_id(&self) -> Option<&str> {
        non_empty(self.element.attributes.get("uid"))
    }

    /// Multivariate test reference (`mvt`)
    #[must_use]
    pub fn multivariate_test(&self) -> Option<&str> {
        non_empty(self.element.attributes.get("mvt"))
    }

    /// Set or clear multivariate test reference
    pub fn set_multivariate_test(&mut self, value: Option<&str>) {
        self.element.attributes.assign("mvt", value);
    }

    /// Personalization test reference (`pt`)
    #[must_use]
    pub fn personalization_test(&self) -> Option<&str> {
        non_empty(self.element.attributes.get("pt"))
    }

    /// Set or clear personalization test reference
    pub fn set_personalization_test(&mut self, value: Option<&str>) {
        self.element.attributes.assign("pt", value);
    }

    /// Rule sub-document (first element inside `<rls>`)
    #[must_use]
    pub fn rules(&self) -> Option<&XmlElement> {
        self.element.child(RULES)?.elements().next()
    }

    /// Rule sub-document as text
    ///
    /// # Errors
    /// Returns error if the writer rejects a node
    pub fn rules_xml(&self) -> Result<Option<String>, DocumentError> {
        self.rules().map(XmlElement::to_xml).transpose()
    }

    /// Replace rule sub-document
    ///
    /// Blank text removes the `<rls>` element.
    ///
    /// # Errors
    /// Returns error if `rules` is not well-formed
    pub fn set_rules_xml(&mut self, rules: &str) -> Result<(), DocumentError> {
        if rules.trim().is_empty() {
            self.element
                .children
                .retain(|n| n.as_element().map_or(true, |e| e.name != RULES));
            return Ok(());
        }
        let ruleset = XmlElement::parse(rules)?;
        match self.element.child_mut(RULES) {
            Some(container) => container.children = vec![XmlNode::Element(ruleset)],
            None => self
                .element
                .children
                .push(XmlNode::Element(XmlElement::new(RULES).with_child(ruleset))),
        }
        Ok(())
    }

    /// Underlying element
    #[inline]
    #[must_use]
    pub fn element(&self) -> &XmlElement {
        &self.element
    }
}

/// Named slot binding within a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    element: XmlElement,
}

impl Placeholder {
    /// Placeholder with key
    #[must_use]
    pub fn new(key: &str) -> Self {
        Self {
            element: XmlElement::new(PLACEHOLDER).with_attribute("key", key),
        }
    }

    fn from_element(element: XmlElement) -> Self {
        Self { element }
    }

    /// Builder: metadata reference
    #[must_use]
    pub fn with_metadata(mut self, metadata: &str) -> Self {
        self.set_metadata(Some(metadata));
        self
    }

    /// Placeholder key
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        non_empty(self.element.attributes.get("key"))
    }

    /// Metadata reference (`md`), identifier or path
    #[must_use]
    pub fn metadata(&self) -> Option<&str> {
        non_empty(self.element.attributes.get("md"))
    }

    /// Set or clear metadata reference
    pub fn set_metadata(&mut self, metadata: Option<&str>) {
        self.element.attributes.assign("md", metadata);
    }

    /// Underlying element
    #[inline]
    #[must_use]
    pub fn element(&self) -> &XmlElement {
        &self.element
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn known<T>(slots: &[Slot<T>]) -> impl DoubleEndedIterator<Item = &T> {
    slots.iter().filter_map(|slot| match slot {
        Slot::Known(item) => Some(item),
        Slot::Other(_) => None,
    })
}

fn known_mut<T>(slots: &mut [Slot<T>]) -> impl DoubleEndedIterator<Item = &mut T> {
    slots.iter_mut().filter_map(|slot| match slot {
        Slot::Known(item) => Some(item),
        Slot::Other(_) => None,
    })
}

fn remove_known<T>(slots: &mut Vec<Slot<T>>, index: usize) -> Option<T> {
    let pos = slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| matches!(slot, Slot::Known(_)))
        .nth(index)?
        .0;
    match slots.remove(pos) {
        Slot::Known(item) => Some(item),
        Slot::Other(_) => None,
    }
}
