//! Datasource normalization

use crate::context::DatasourceResolver;
use layout_model::Entity;

const LOCAL_PREFIX: &str = "local:";

/// Expands `local:` datasources relative to the owning entity
///
/// `local:/Data/Promo` on `/sitecore/content/Home` becomes
/// `/sitecore/content/Home/Data/Promo`. Anything else passes through
/// trimmed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextDatasourceResolver;

impl DatasourceResolver for ContextDatasourceResolver {
    fn resolve(&self, raw: &str, context: &Entity) -> String {
        let raw = raw.trim();
        let local = raw
            .get(..LOCAL_PREFIX.len())
            .filter(|prefix| prefix.eq_ignore_ascii_case(LOCAL_PREFIX))
            .map(|_| &raw[LOCAL_PREFIX.len()..]);
        match local {
            Some(relative) => {
                let base = context.full_path.trim_end_matches('/');
                let relative = relative.trim_start_matches('/');
                if relative.is_empty() {
                    base.to_string()
                } else {
                    format!("{base}/{relative}")
                }
            }
            None => raw.to_string(),
        }
    }
}
