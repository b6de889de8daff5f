//! In-memory site registry with query support.

use crate::{
    catalog::parse_catalog,
    definition::SiteDefinition,
    error::{RegistryError, Result, ValidationError},
    provider::{CatalogProvider, CatalogSource},
};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// What to do with a catalog entry that fails validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadPolicy {
    /// Drop the entry, record why, keep loading
    #[default]
    Lenient,
    /// Fail the whole load on the first invalid entry
    Strict,
}

/// Outcome of resolving requested site names against the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteSelection {
    /// Registry names that matched, sorted case-insensitively
    pub matched: Vec<String>,
    /// Requested names with no registry entry
    pub unmatched: Vec<String>,
}

/// Mapping from site name to definition.
///
/// Built once from a catalog and then only read; probe tasks share it
/// behind an `Arc` and never mutate it.
#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    sites: HashMap<String, SiteDefinition>,
    skipped: Vec<ValidationError>,
    schema: Option<String>,
}

impl SiteRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry from a path or URL string.
    ///
    /// # Errors
    /// Returns error if the source has the wrong extension, cannot be
    /// fetched, is malformed, or (strict policy) holds an invalid entry.
    pub async fn load(source: &str, policy: LoadPolicy) -> Result<Self> {
        let provider = CatalogSource::parse(source)?.into_provider()?;
        Self::load_from(provider.as_ref(), policy).await
    }

    /// Load a registry from an injected provider.
    pub async fn load_from(provider: &dyn CatalogProvider, policy: LoadPolicy) -> Result<Self> {
        let raw = provider.fetch().await?;
        Self::from_catalog_str(&raw.contents, &raw.location, policy)
    }

    /// Build a registry from catalog text.
    pub fn from_catalog_str(contents: &str, location: &str, policy: LoadPolicy) -> Result<Self> {
        let parsed = parse_catalog(contents, location)?;
        let mut registry = Self {
            schema: parsed.schema,
            ..Self::default()
        };

        for entry in parsed.entries {
            match entry {
                Ok(definition) => {
                    registry.sites.insert(definition.name.clone(), definition);
                }
                Err(e) if policy == LoadPolicy::Strict => {
                    return Err(RegistryError::Validation(e));
                }
                Err(e) => {
                    warn!(
                        site = %e.site,
                        field = %e.field,
                        error = %e,
                        "skipping invalid site definition"
                    );
                    registry.skipped.push(e);
                }
            }
        }

        info!(
            count = registry.sites.len(),
            skipped = registry.skipped.len(),
            location = %location,
            "loaded site catalog"
        );

        Ok(registry)
    }

    /// Build a registry from definitions constructed in code.
    ///
    /// # Errors
    /// Returns the first validation failure.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = SiteDefinition>,
    ) -> std::result::Result<Self, ValidationError> {
        let mut registry = Self::new();
        for definition in definitions {
            registry.insert(definition)?;
        }
        Ok(registry)
    }

    /// Add or replace a definition, returning the one it replaced.
    pub fn insert(
        &mut self,
        definition: SiteDefinition,
    ) -> std::result::Result<Option<SiteDefinition>, ValidationError> {
        definition.validate()?;

        debug!(site = %definition.name, "inserted site definition");
        Ok(self.sites.insert(definition.name.clone(), definition))
    }

    /// Get a definition by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SiteDefinition> {
        self.sites.get(name)
    }

    /// Check if a site exists in the registry.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.sites.contains_key(name)
    }

    /// Number of sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Whether the registry has no sites.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Iterate over all definitions in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &SiteDefinition> {
        self.sites.values()
    }

    /// Entries dropped during a lenient load, with reasons.
    #[must_use]
    pub fn skipped(&self) -> &[ValidationError] {
        &self.skipped
    }

    /// Schema tag declared by the catalog.
    #[must_use]
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Site names sorted case-insensitively.
    #[must_use]
    pub fn site_name_list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sites.keys().cloned().collect();
        names.sort_by(|a, b| {
            a.to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b))
        });
        names
    }

    /// Drop every NSFW site in place, returning how many were removed.
    pub fn remove_nsfw_sites(&mut self) -> usize {
        self.remove_nsfw_sites_except(&[])
    }

    /// Drop NSFW sites in place, keeping those named in `keep`
    /// (matched case-insensitively).
    pub fn remove_nsfw_sites_except(&mut self, keep: &[String]) -> usize {
        let keep: BTreeSet<String> = keep.iter().map(|k| k.to_lowercase()).collect();
        let before = self.sites.len();

        self.sites
            .retain(|name, site| !site.is_nsfw || keep.contains(&name.to_lowercase()));

        let removed = before - self.sites.len();
        if removed > 0 {
            debug!(removed, "removed NSFW sites");
        }
        removed
    }

    /// Copy of the registry without NSFW sites.
    #[must_use]
    pub fn without_nsfw(&self) -> Self {
        let mut copy = self.clone();
        copy.remove_nsfw_sites();
        copy
    }

    /// Copy of the registry, NSFW sites removed when `exclude_nsfw` is set.
    #[must_use]
    pub fn filter(&self, exclude_nsfw: bool) -> Self {
        if exclude_nsfw {
            self.without_nsfw()
        } else {
            self.clone()
        }
    }

    /// Resolve requested names case-insensitively.
    ///
    /// A request matches every registry name equal to it ignoring case.
    #[must_use]
    pub fn select(&self, requested: &[String]) -> SiteSelection {
        let mut matched = BTreeSet::new();
        let mut unmatched = Vec::new();

        for wanted in requested {
            let wanted_lower = wanted.to_lowercase();
            let hits: Vec<&String> = self
                .sites
                .keys()
                .filter(|name| name.to_lowercase() == wanted_lower)
                .collect();

            if hits.is_empty() {
                unmatched.push(wanted.clone());
            } else {
                matched.extend(hits.into_iter().cloned());
            }
        }

        let matched = self
            .site_name_list()
            .into_iter()
            .filter(|name| matched.contains(name))
            .collect();

        SiteSelection { matched, unmatched }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::DetectionRule;

    fn create_test_definition(name: &str, nsfw: bool) -> SiteDefinition {
        SiteDefinition::new(
            name,
            format!("https://{}.test", name.to_lowercase()),
            format!("https://{}.test/{{}}", name.to_lowercase()),
            DetectionRule::StatusCode {
                error_codes: vec![404],
            },
            "alice",
        )
        .expect("valid definition")
        .with_nsfw(nsfw)
    }

    fn sample_registry() -> SiteRegistry {
        SiteRegistry::from_definitions([
            create_test_definition("beta", false),
            create_test_definition("Alpha", false),
            create_test_definition("gamma", true),
            create_test_definition("Delta", true),
        ])
        .expect("valid registry")
    }

    #[test]
    fn test_registry_new() {
        let registry = SiteRegistry::new();
        assert_eq!(registry.len(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_insert_and_get() {
        let mut registry = SiteRegistry::new();
        let replaced = registry
            .insert(create_test_definition("GitHub", false))
            .expect("insert definition");
        assert!(replaced.is_none());

        let site = registry.get("GitHub").expect("get definition");
        assert_eq!(site.name, "GitHub");
        assert!(registry.get("github").is_none(), "names are case-sensitive");
    }

    #[test]
    fn test_insert_replaces_same_name() {
        let mut registry = SiteRegistry::new();
        registry
            .insert(create_test_definition("GitHub", false))
            .expect("first insert");
        let replaced = registry
            .insert(create_test_definition("GitHub", true))
            .expect("second insert");

        assert!(replaced.is_some());
        assert_eq!(registry.len(), 1);
        assert!(registry.get("GitHub").expect("present").is_nsfw);
    }

    #[test]
    fn test_site_name_list_case_insensitive() {
        let registry = sample_registry();
        assert_eq!(
            registry.site_name_list(),
            vec!["Alpha", "beta", "Delta", "gamma"]
        );
    }

    #[test]
    fn test_remove_nsfw_in_place() {
        let mut registry = sample_registry();
        let removed = registry.remove_nsfw_sites();

        assert_eq!(removed, 2);
        assert_eq!(registry.site_name_list(), vec!["Alpha", "beta"]);
    }

    #[test]
    fn test_remove_nsfw_keeps_requested() {
        let mut registry = sample_registry();
        let removed = registry.remove_nsfw_sites_except(&["DELTA".to_string()]);

        assert_eq!(removed, 1);
        assert!(registry.contains("Delta"));
        assert!(!registry.contains("gamma"));
    }

    #[test]
    fn test_without_nsfw_leaves_original() {
        let registry = sample_registry();
        let filtered = registry.without_nsfw();

        assert_eq!(filtered.len(), 2);
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.filter(false).len(), 4);
        assert_eq!(registry.filter(true).len(), 2);
    }

    #[test]
    fn test_select_case_insensitive() {
        let registry = sample_registry();
        let selection = registry.select(&[
            "ALPHA".to_string(),
            "gamma".to_string(),
            "missing".to_string(),
            "alpha".to_string(),
        ]);

        assert_eq!(selection.matched, vec!["Alpha", "gamma"]);
        assert_eq!(selection.unmatched, vec!["missing"]);
    }

    #[test]
    fn test_lenient_load_skips_invalid() {
        let catalog = r#"{
            "Good": { "urlMain": "https://g.test", "url": "https://g.test/{}", "username_claimed": "a", "errorType": "status_code" },
            "Bad": { "url": "https://b.test/{}", "username_claimed": "a", "errorType": "status_code" }
        }"#;

        let registry = SiteRegistry::from_catalog_str(catalog, "inline.json", LoadPolicy::Lenient)
            .expect("lenient load");

        assert_eq!(registry.site_name_list(), vec!["Good"]);
        assert_eq!(registry.skipped().len(), 1);
        assert_eq!(registry.skipped()[0].site, "Bad");
        assert_eq!(registry.skipped()[0].field, "urlMain");
    }

    #[test]
    fn test_strict_load_fails_on_invalid() {
        let catalog = r#"{
            "Good": { "urlMain": "https://g.test", "url": "https://g.test/{}", "username_claimed": "a", "errorType": "status_code" },
            "Bad": { "urlMain": "https://b.test", "url": "https://b.test/{}", "errorType": "status_code" }
        }"#;

        let err = SiteRegistry::from_catalog_str(catalog, "inline.json", LoadPolicy::Strict)
            .expect_err("strict load");

        match err {
            RegistryError::Validation(e) => {
                assert_eq!(e.site, "Bad");
                assert_eq!(e.field, "username_claimed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
