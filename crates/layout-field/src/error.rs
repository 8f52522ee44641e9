//! Error types for layered field resolution

use layout_links::LinkError;
use layout_model::{DeltaError, DocumentError, FieldId};

/// Errors raised while reading or writing a layout field
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Required input missing, unknown or blank
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Field is neither the shared nor the final layout field
    #[error("field {0} is not a layout field")]
    InvalidFieldRole(FieldId),

    /// Patch engine rejected a patch
    #[error("patch failed: {0}")]
    MalformedPatch(#[from] DeltaError),

    /// Resolved value is not a readable layout
    #[error("layout document error: {0}")]
    Document(#[from] DocumentError),

    /// Value sources are unavailable and the legacy fallback is disabled
    #[error("no value sources available for field {0}")]
    SourcesUnavailable(FieldId),

    /// Link maintenance failed
    #[error("link maintenance failed: {0}")]
    Link(#[from] LinkError),

    /// Configuration text cannot be read
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl ResolveError {
    /// Create invalid argument error
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    /// Check if error is an invalid argument
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        match self {
            Self::InvalidArgument(_) => true,
            Self::Link(inner) => inner.is_invalid_argument(),
            _ => false,
        }
    }

    /// Check if error is an invalid field role
    #[inline]
    #[must_use]
    pub fn is_invalid_field_role(&self) -> bool {
        matches!(self, Self::InvalidFieldRole(_))
    }

    /// Check if error comes from the patch engine
    #[inline]
    #[must_use]
    pub fn is_malformed_patch(&self) -> bool {
        matches!(self, Self::MalformedPatch(_))
    }
}
