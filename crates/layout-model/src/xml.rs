//! Lossless XML tree
//!
//! A small owned element tree read and written with `quick-xml`. It keeps
//! element order, attribute order, text, comments, CDATA and processing
//! instructions so that content the layout model does not understand
//! survives a parse/serialize cycle.

use crate::error::DocumentError;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::escape::partial_escape;
use quick_xml::{Reader, Writer};
use std::borrow::Cow;

/// Ordered attribute list
///
/// Setting an existing attribute keeps its position; new attributes are
/// appended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    /// Empty list
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Value of attribute `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set attribute `name`, keeping position if present
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.0.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    /// Remove attribute `name`, returning its value
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.0.iter().position(|(key, _)| key == name)?;
        Some(self.0.remove(index).1)
    }

    /// Set or remove depending on `value`
    pub fn assign(&mut self, name: &str, value: Option<&str>) {
        match value {
            Some(value) => self.set(name, value),
            None => {
                self.remove(name);
            }
        }
    }

    /// Check for attribute
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate `(name, value)` pairs in document order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate mutable values in document order
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut String> {
        self.0.iter_mut().map(|(_, v)| v)
    }

    /// Number of attributes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn sorted(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<_> = self.iter().collect();
        pairs.sort_unstable();
        pairs
    }
}

/// Node in the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    /// Nested element
    Element(XmlElement),
    /// Unescaped character data
    Text(String),
    /// CDATA section content
    CData(String),
    /// Comment body (raw)
    Comment(String),
    /// Processing instruction body (raw)
    ProcessingInstruction(String),
    /// XML declaration
    Declaration {
        version: String,
        encoding: Option<String>,
        standalone: Option<String>,
    },
    /// Doctype body (raw)
    DocType(String),
}

impl XmlNode {
    /// Element view, if this node is one
    #[inline]
    #[must_use]
    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Check for whitespace-only text
    #[must_use]
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Self::Text(text) if text.trim().is_empty())
    }

    fn write_to(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), DocumentError> {
        match self {
            Self::Element(element) => element.write_to(writer)?,
            Self::Text(text) => {
                writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))?;
            }
            Self::CData(text) => writer.write_event(Event::CData(BytesCData::new(text.as_str())))?,
            Self::Comment(raw) => writer.write_event(Event::Comment(BytesText::from_escaped(raw.as_str())))?,
            Self::ProcessingInstruction(raw) => {
                writer.write_event(Event::PI(BytesPI::new(raw.as_str())))?;
            }
            Self::Declaration {
                version,
                encoding,
                standalone,
            } => writer.write_event(Event::Decl(BytesDecl::new(
                version,
                encoding.as_deref(),
                standalone.as_deref(),
            )))?,
            Self::DocType(raw) => writer.write_event(Event::DocType(BytesText::from_escaped(raw.as_str())))?,
        }
        Ok(())
    }
}

/// Element with ordered attributes and children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written
    pub name: String,
    /// Attributes in document order
    pub attributes: Attributes,
    /// Child nodes in document order
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create empty element
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Attributes::new(),
            children: Vec::new(),
        }
    }

    /// Builder: add attribute
    #[inline]
    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.set(name, value);
        self
    }

    /// Builder: add child element
    #[inline]
    #[must_use]
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Child elements in document order
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(XmlNode::as_element)
    }

    /// First child element named `name`
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.name == name)
    }

    /// First child element named `name`, mutably
    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.children.iter_mut().find_map(|node| match node {
            XmlNode::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// Check if the element or any descendant satisfies `pred`
    pub fn any_descendant(&self, pred: &impl Fn(&XmlElement) -> bool) -> bool {
        pred(self) || self.elements().any(|child| child.any_descendant(pred))
    }

    /// Concatenated text of this element and its descendants
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(t) | XmlNode::CData(t) => out.push_str(t),
                XmlNode::Element(e) => e.collect_text(out),
                _ => {}
            }
        }
    }

    /// Parse a single element from text
    ///
    /// # Errors
    /// Returns error if text is not well-formed or has no root element
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        XmlDocument::parse(text).map(|doc| doc.root)
    }

    /// Serialize element to text
    ///
    /// # Errors
    /// Returns error if the writer rejects a node
    pub fn to_xml(&self) -> Result<String, DocumentError> {
        let mut writer = Writer::new(Vec::new());
        self.write_to(&mut writer)?;
        Ok(into_string(writer))
    }

    /// Compare ignoring attribute order, whitespace-only text and comments
    #[must_use]
    pub fn structurally_eq(&self, other: &Self) -> bool {
        if self.name != other.name || self.attributes.sorted() != other.attributes.sorted() {
            return false;
        }
        let mine: Vec<_> = self.significant_children().collect();
        let theirs: Vec<_> = other.significant_children().collect();
        mine.len() == theirs.len()
            && mine.iter().zip(&theirs).all(|(a, b)| match (a, b) {
                (XmlNode::Element(a), XmlNode::Element(b)) => a.structurally_eq(b),
                (XmlNode::Text(a) | XmlNode::CData(a), XmlNode::Text(b) | XmlNode::CData(b)) => {
                    a.trim() == b.trim()
                }
                (a, b) => a == b,
            })
    }

    fn significant_children(&self) -> impl Iterator<Item = &XmlNode> {
        self.children
            .iter()
            .filter(|n| !n.is_blank_text() && !matches!(n, XmlNode::Comment(_)))
    }

    pub(crate) fn write_to(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), DocumentError> {
        let mut start = BytesStart::new(self.name.as_str());
        for (name, value) in self.attributes.iter() {
            start.push_attribute((name, value));
        }
        if self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }
        writer.write_event(Event::Start(start))?;
        for child in &self.children {
            child.write_to(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }
}

/// Parsed document: prolog, root element, epilog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    /// Nodes before the root element
    pub prolog: Vec<XmlNode>,
    /// Root element
    pub root: XmlElement,
    /// Nodes after the root element
    pub epilog: Vec<XmlNode>,
}

impl XmlDocument {
    /// Wrap root element
    #[inline]
    #[must_use]
    pub fn new(root: XmlElement) -> Self {
        Self {
            prolog: Vec::new(),
            root,
            epilog: Vec::new(),
        }
    }

    /// Parse document text
    ///
    /// # Errors
    /// - `DocumentError::Syntax` for malformed XML
    /// - `DocumentError::MissingRoot` if no element is present
    /// - `DocumentError::Unclosed` for unterminated elements
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(false);

        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root: Option<XmlElement> = None;
        let mut stack: Vec<XmlElement> = Vec::new();

        loop {
            let node = match reader.read_event()? {
                Event::Eof => break,
                Event::Start(start) => {
                    stack.push(open_element(&start)?);
                    continue;
                }
                Event::End(_) => {
                    let Some(done) = stack.pop() else {
                        return Err(DocumentError::Syntax("unbalanced end tag".to_string()));
                    };
                    XmlNode::Element(done)
                }
                Event::Empty(start) => XmlNode::Element(open_element(&start)?),
                Event::Text(text) => XmlNode::Text(text.unescape().map_err(syntax)?.into_owned()),
                Event::CData(data) => XmlNode::CData(utf8(data.into_inner())?),
                Event::Comment(raw) => XmlNode::Comment(utf8(raw.into_inner())?),
                Event::PI(pi) => XmlNode::ProcessingInstruction(utf8(Cow::Borrowed(&*pi))?),
                Event::DocType(raw) => XmlNode::DocType(utf8(raw.into_inner())?),
                Event::Decl(decl) => XmlNode::Declaration {
                    version: utf8(decl.version().map_err(syntax)?)?,
                    encoding: decl.encoding().transpose().map_err(syntax)?.map(utf8).transpose()?,
                    standalone: decl.standalone().transpose().map_err(syntax)?.map(utf8).transpose()?,
                },
            };

            if let Some(parent) = stack.last_mut() {
                parent.children.push(node);
                continue;
            }
            match node {
                XmlNode::Element(element) if root.is_none() => root = Some(element),
                XmlNode::Element(element) => {
                    return Err(DocumentError::TrailingContent(format!("<{}>", element.name)));
                }
                XmlNode::Text(text) if !text.trim().is_empty() => {
                    return Err(DocumentError::TrailingContent(text));
                }
                other if root.is_none() => prolog.push(other),
                other => epilog.push(other),
            }
        }

        if let Some(open) = stack.pop() {
            return Err(DocumentError::Unclosed(open.name));
        }
        let root = root.ok_or(DocumentError::MissingRoot)?;
        Ok(Self { prolog, root, epilog })
    }

    /// Serialize document
    ///
    /// # Errors
    /// Returns error if the writer rejects a node
    pub fn to_xml(&self) -> Result<String, DocumentError> {
        let mut writer = Writer::new(Vec::new());
        for node in &self.prolog {
            node.write_to(&mut writer)?;
        }
        self.root.write_to(&mut writer)?;
        for node in &self.epilog {
            node.write_to(&mut writer)?;
        }
        Ok(into_string(writer))
    }
}

fn open_element(start: &BytesStart<'_>) -> Result<XmlElement, DocumentError> {
    let name = utf8(Cow::Borrowed(start.name().as_ref()))?;
    let mut element = XmlElement::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| DocumentError::attribute(&element.name, e))?;
        let key = utf8(Cow::Borrowed(attr.key.as_ref()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| DocumentError::attribute(&element.name, e))?;
        element.attributes.set(&key, value.into_owned());
    }
    Ok(element)
}

fn syntax(err: impl ToString) -> DocumentError {
    DocumentError::Syntax(err.to_string())
}

fn utf8(bytes: Cow<'_, [u8]>) -> Result<String, DocumentError> {
    String::from_utf8(bytes.into_owned()).map_err(syntax)
}

fn into_string(writer: Writer<Vec<u8>>) -> String {
    // Every node is written from `&str`, so the buffer is valid UTF-8.
    String::from_utf8_lossy(&writer.into_inner()).into_owned()
}
