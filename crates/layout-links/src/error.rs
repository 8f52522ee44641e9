//! Error types for link maintenance

use layout_model::DocumentError;

/// Errors raised while maintaining references
///
/// Unresolved references are never errors; they are reported through a
/// [`LinkSink`](crate::LinkSink).
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Required input missing or blank
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Layout or sub-document text cannot be parsed
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// Rule sub-document cannot be opened
    #[error("invalid rule set: {0}")]
    Rules(String),
}

impl LinkError {
    /// Create invalid argument error
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    /// Check if error is an invalid argument
    #[inline]
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Check if error comes from unparseable text
    #[inline]
    #[must_use]
    pub fn is_document(&self) -> bool {
        matches!(self, Self::Document(_) | Self::Rules(_))
    }
}
