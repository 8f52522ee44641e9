//! Error types for the layout model
//!
//! Covers:
//! - Document parsing (text → tree)
//! - Entity identifier parsing

/// Errors while reading layout text into a tree
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The text is not well-formed XML
    #[error("malformed layout xml: {0}")]
    Syntax(String),

    /// An attribute could not be decoded
    #[error("invalid attribute in <{element}>: {message}")]
    Attribute { element: String, message: String },

    /// The text contains no root element
    #[error("layout xml has no root element")]
    MissingRoot,

    /// An element was opened but never closed
    #[error("unclosed element <{0}>")]
    Unclosed(String),

    /// Serializer failure
    #[error("failed to write layout xml: {0}")]
    Write(String),

    /// Content after the root element that is not whitespace or markup
    #[error("unexpected content outside root element: {0}")]
    TrailingContent(String),
}

impl DocumentError {
    /// Create attribute error for element
    pub fn attribute(element: impl Into<String>, message: impl ToString) -> Self {
        Self::Attribute {
            element: element.into(),
            message: message.to_string(),
        }
    }
}

impl From<quick_xml::Error> for DocumentError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Syntax(err.to_string())
    }
}

impl From<std::io::Error> for DocumentError {
    fn from(err: std::io::Error) -> Self {
        Self::Write(err.to_string())
    }
}

/// Errors while parsing entity identifiers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// Empty input
    #[error("empty identifier")]
    Empty,

    /// Not a GUID
    #[error("invalid identifier '{0}'")]
    Invalid(String),
}
