//! Collaborators consulted during link maintenance
//!
//! A [`LinkContext`] bundles everything the maintainer needs besides the
//! document itself: the entity store, the datasource resolver, the
//! parameter codec, the rule sub-document factory, the owning entity and
//! the [`LinkConfig`].

use crate::datasource::ContextDatasourceResolver;
use crate::error::LinkError;
use crate::field::SubField;
use crate::parameters::UrlParameterCodec;
use crate::rules::XmlRuleFactory;
use indexmap::IndexMap;
use layout_model::Entity;
use serde::{Deserialize, Serialize};

/// Resolves identifiers and paths to entities
pub trait EntityStore {
    /// Entity denoted by `id_or_path`, if it exists
    fn resolve(&self, id_or_path: &str) -> Option<Entity>;
}

/// Normalizes raw datasource text before resolution
pub trait DatasourceResolver {
    /// Normalized datasource for `raw`, evaluated relative to `context`
    fn resolve(&self, raw: &str, context: &Entity) -> String;
}

/// Ordered parameter name → sub-field map
pub type ParameterFields = IndexMap<String, Box<dyn SubField>>;

/// Encodes and decodes rendering parameters
pub trait ParameterCodec {
    /// Split `raw` into typed sub-fields, using `component` to decide types
    fn parse(&self, component: &Entity, raw: &str) -> ParameterFields;

    /// Encode sub-fields back into parameter text
    fn serialize(&self, fields: &ParameterFields) -> String;
}

/// Opens rule sub-documents as linked fields
pub trait RuleFieldFactory {
    /// Wrap rule set text
    ///
    /// # Errors
    /// Returns error if the text cannot be read as a rule set
    fn open(&self, rules_xml: &str) -> Result<Box<dyn SubField>, LinkError>;
}

/// Link maintenance settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Marker of query-style datasources (`query:./*`, `code:..`)
    ///
    /// An unresolved datasource containing it is not reported as broken.
    pub dynamic_datasource_separator: char,

    /// Parameter names whose value is a looked-up value rather than a reference
    pub value_lookup_parameters: Vec<String>,
}

impl LinkConfig {
    const DEFAULT: Self = Self {
        dynamic_datasource_separator: ':',
        value_lookup_parameters: Vec::new(),
    };

    /// Create config with defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::DEFAULT
    }

    /// Builder: dynamic datasource separator
    #[must_use]
    pub fn with_dynamic_datasource_separator(mut self, separator: char) -> Self {
        self.dynamic_datasource_separator = separator;
        self
    }

    /// Builder: add value lookup parameter name
    #[must_use]
    pub fn with_value_lookup(mut self, name: impl Into<String>) -> Self {
        self.value_lookup_parameters.push(name.into());
        self
    }

    /// Check if `datasource` is a query-style datasource
    #[inline]
    #[must_use]
    pub fn is_dynamic_datasource(&self, datasource: &str) -> bool {
        datasource.contains(self.dynamic_datasource_separator)
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

static DEFAULT_CONFIG: LinkConfig = LinkConfig::DEFAULT;
static DEFAULT_DATASOURCES: ContextDatasourceResolver = ContextDatasourceResolver;
static DEFAULT_PARAMETERS: UrlParameterCodec = UrlParameterCodec::new();
static DEFAULT_RULES: XmlRuleFactory = XmlRuleFactory;

/// Everything a link operation consults besides the document
#[derive(Clone, Copy)]
pub struct LinkContext<'a> {
    entities: &'a dyn EntityStore,
    owner: &'a Entity,
    datasources: &'a dyn DatasourceResolver,
    parameters: Option<&'a dyn ParameterCodec>,
    rules: &'a dyn RuleFieldFactory,
    config: Option<&'a LinkConfig>,
}

impl<'a> LinkContext<'a> {
    /// Context for the field owned by `owner`, with default collaborators
    #[must_use]
    pub fn new(entities: &'a dyn EntityStore, owner: &'a Entity) -> Self {
        Self {
            entities,
            owner,
            datasources: &DEFAULT_DATASOURCES,
            parameters: None,
            rules: &DEFAULT_RULES,
            config: None,
        }
    }

    /// Builder: datasource resolver
    #[must_use]
    pub fn with_datasources(mut self, datasources: &'a dyn DatasourceResolver) -> Self {
        self.datasources = datasources;
        self
    }

    /// Builder: parameter codec
    #[must_use]
    pub fn with_parameters(mut self, parameters: &'a dyn ParameterCodec) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Builder: rule factory
    #[must_use]
    pub fn with_rules(mut self, rules: &'a dyn RuleFieldFactory) -> Self {
        self.rules = rules;
        self
    }

    /// Builder: settings
    #[must_use]
    pub fn with_config(mut self, config: &'a LinkConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Builder: settings and parameter codec used where none was set
    ///
    /// Lets an owner with its own configuration supply it without
    /// overriding a caller's explicit choice.
    #[must_use]
    pub fn with_fallback_settings(
        mut self,
        config: &'a LinkConfig,
        parameters: &'a dyn ParameterCodec,
    ) -> Self {
        self.config = self.config.or(Some(config));
        self.parameters = self.parameters.or(Some(parameters));
        self
    }

    /// Entity store
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &'a dyn EntityStore {
        self.entities
    }

    /// Entity owning the field being maintained
    #[inline]
    #[must_use]
    pub fn owner(&self) -> &'a Entity {
        self.owner
    }

    /// Datasource resolver
    #[inline]
    #[must_use]
    pub fn datasources(&self) -> &'a dyn DatasourceResolver {
        self.datasources
    }

    /// Parameter codec
    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &'a dyn ParameterCodec {
        self.parameters.unwrap_or(&DEFAULT_PARAMETERS)
    }

    /// Rule factory
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &'a dyn RuleFieldFactory {
        self.rules
    }

    /// Settings
    #[inline]
    #[must_use]
    pub fn config(&self) -> &'a LinkConfig {
        self.config.unwrap_or(&DEFAULT_CONFIG)
    }

    /// Resolve a reference through the entity store
    #[inline]
    #[must_use]
    pub fn resolve(&self, id_or_path: &str) -> Option<Entity> {
        self.entities.resolve(id_or_path)
    }
}
