//! Resolver configuration
//!
//! Loadable from TOML:
//!
//! ```toml
//! standard_values_name = "__Standard Values"
//! allow_legacy_fallback = true
//!
//! [links]
//! dynamic_datasource_separator = ":"
//! value_lookup_parameters = ["Color"]
//! ```

use crate::error::ResolveError;
use crate::store::ItemRecord;
use layout_links::LinkConfig;
use serde::{Deserialize, Serialize};

/// Name of the entity holding a template's default values
pub const STANDARD_VALUES_NAME: &str = "__Standard Values";

/// Settings for resolution and link maintenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Name identifying template-defaults entities
    pub standard_values_name: String,
    /// Use the fixed four-slot source list when the pipeline is unavailable
    pub allow_legacy_fallback: bool,
    /// Link maintenance settings
    pub links: LinkConfig,
}

impl ResolverConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from TOML text
    ///
    /// Missing keys take their defaults.
    ///
    /// # Errors
    /// Returns `ResolveError::Config` if the text is not valid TOML or has
    /// mistyped keys
    pub fn from_toml_str(text: &str) -> Result<Self, ResolveError> {
        Ok(toml::from_str(text)?)
    }

    /// With template-defaults entity name
    #[inline]
    #[must_use]
    pub fn with_standard_values_name(mut self, name: impl Into<String>) -> Self {
        self.standard_values_name = name.into();
        self
    }

    /// With legacy fallback switch
    #[inline]
    #[must_use]
    pub fn with_legacy_fallback(mut self, allow: bool) -> Self {
        self.allow_legacy_fallback = allow;
        self
    }

    /// With link maintenance settings
    #[inline]
    #[must_use]
    pub fn with_links(mut self, links: LinkConfig) -> Self {
        self.links = links;
        self
    }

    /// Check if `item` is a template-defaults entity
    #[inline]
    #[must_use]
    pub fn is_standard_values(&self, item: &ItemRecord) -> bool {
        item.name == self.standard_values_name
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            standard_values_name: STANDARD_VALUES_NAME.to_string(),
            allow_legacy_fallback: true,
            links: LinkConfig::default(),
        }
    }
}
