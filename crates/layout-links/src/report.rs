//! Link validation reports
//!
//! [`ReferenceGraphMaintainer::validate_links`](crate::ReferenceGraphMaintainer::validate_links)
//! appends one entry per reference site to a [`LinkSink`]. The sink never
//! fails; broken references are data, not errors.

use layout_model::Entity;
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// Where in a layout a reference was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkSite {
    /// Device identifier (`d/@id`)
    Device,
    /// Device layout (`d/@l`)
    Layout,
    /// Placeholder settings (`p/@md`)
    PlaceholderMetadata,
    /// Rendering component (`r/@id`)
    Component,
    /// Rendering datasource (`r/@ds`)
    Datasource,
    /// Multivariate test (`r/@mvt`)
    MultivariateTest,
    /// Personalization test (`r/@pt`)
    PersonalizationTest,
    /// Reference inside rendering parameters
    Parameter,
    /// Reference inside a rule set
    Rule,
}

impl Display for LinkSite {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Device => "device",
            Self::Layout => "layout",
            Self::PlaceholderMetadata => "placeholder_metadata",
            Self::Component => "component",
            Self::Datasource => "datasource",
            Self::MultivariateTest => "multivariate_test",
            Self::PersonalizationTest => "personalization_test",
            Self::Parameter => "parameter",
            Self::Rule => "rule",
        };
        f.write_str(name)
    }
}

/// Outcome of resolving one reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LinkStatus {
    /// Reference resolved to an entity
    Valid(Entity),
    /// Reference did not resolve
    Broken,
}

/// One validated reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkReport {
    /// Reference site
    pub site: LinkSite,
    /// Reference text as checked
    pub reference: String,
    /// Resolution outcome
    pub status: LinkStatus,
}

impl LinkReport {
    /// Check if the reference is broken
    #[inline]
    #[must_use]
    pub fn is_broken(&self) -> bool {
        matches!(self.status, LinkStatus::Broken)
    }
}

/// Receiver of validation results
pub trait LinkSink {
    /// Record a reference that resolved to `target`
    fn add_valid(&mut self, site: LinkSite, reference: &str, target: &Entity);

    /// Record a reference that did not resolve
    fn add_broken(&mut self, site: LinkSite, reference: &str);
}

/// Collecting sink
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkValidationResult {
    reports: Vec<LinkReport>,
}

impl LinkValidationResult {
    /// Create empty result
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All reports in arrival order
    #[inline]
    #[must_use]
    pub fn reports(&self) -> &[LinkReport] {
        &self.reports
    }

    /// Reports that resolved
    pub fn valid(&self) -> impl Iterator<Item = &LinkReport> {
        self.reports.iter().filter(|r| !r.is_broken())
    }

    /// Reports that did not resolve
    pub fn broken(&self) -> impl Iterator<Item = &LinkReport> {
        self.reports.iter().filter(|r| r.is_broken())
    }

    /// Check if any reference is broken
    #[must_use]
    pub fn has_broken(&self) -> bool {
        self.broken().next().is_some()
    }

    /// Check if `predicate` matches a broken reference
    #[must_use]
    pub fn is_broken_where(&self, predicate: impl Fn(&str) -> bool) -> bool {
        self.broken().any(|r| predicate(&r.reference))
    }

    /// Number of reports
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Check if nothing was reported
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

impl LinkSink for LinkValidationResult {
    fn add_valid(&mut self, site: LinkSite, reference: &str, target: &Entity) {
        self.reports.push(LinkReport {
            site,
            reference: reference.to_string(),
            status: LinkStatus::Valid(target.clone()),
        });
    }

    fn add_broken(&mut self, site: LinkSite, reference: &str) {
        self.reports.push(LinkReport {
            site,
            reference: reference.to_string(),
            status: LinkStatus::Broken,
        });
    }
}
