//! Entity alias table and search path resolution
//!
//! Pages name the same search target many ways (`product`, `products`,
//! `article`, `item`). Every name goes through [`EntityResolver::normalize`]
//! before it reaches a cache key or an endpoint path, so all synonyms share
//! one cache namespace and one endpoint.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use url::Url;

use crate::config::EngineConfig;
use crate::error::{LookupError, Result};
use crate::util::constants::SEARCH_PATH_PREFIX;

/// Built-in synonyms → canonical entity
static BUILTIN_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let groups: &[(&str, &[&str])] = &[
        (
            "items",
            &["item", "items", "product", "products", "article", "articles", "sku"],
        ),
        (
            "customers",
            &["customer", "customers", "client", "clients", "buyer"],
        ),
        ("suppliers", &["supplier", "suppliers", "vendor", "vendors"]),
        (
            "deliverers",
            &[
                "deliverer",
                "deliverers",
                "delivery_person",
                "delivery_people",
                "driver",
                "drivers",
                "courier",
            ],
        ),
        ("rooms", &["room", "rooms"]),
        ("guests", &["guest", "guests", "lodger"]),
        ("users", &["user", "users", "employee", "employees", "staff"]),
    ];

    groups
        .iter()
        .flat_map(|(canonical, names)| names.iter().map(move |n| (*n, *canonical)))
        .collect()
});

/// Lowercase, trim, and fold `-` / spaces into `_`
fn fold(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Canonical entity using only the built-in alias table
pub fn canonical_entity(name: &str) -> String {
    let folded = fold(name);
    BUILTIN_ALIASES
        .get(folded.as_str())
        .map(|c| (*c).to_string())
        .unwrap_or(folded)
}

/// All built-in `(alias, canonical)` pairs, sorted by alias
pub fn builtin_aliases() -> Vec<(&'static str, &'static str)> {
    let mut pairs: Vec<_> = BUILTIN_ALIASES.iter().map(|(a, c)| (*a, *c)).collect();
    pairs.sort_unstable();
    pairs
}

/// Resolves entity names and search URLs for one engine
#[derive(Debug, Clone)]
pub struct EntityResolver {
    base_url: Url,
    extra_aliases: HashMap<String, String>,
    entity_paths: HashMap<String, String>,
}

impl EntityResolver {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| LookupError::InvalidBaseUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;

        let extra_aliases = config
            .aliases
            .iter()
            .map(|(alias, canonical)| (fold(alias), canonical_entity(canonical)))
            .collect();
        let entity_paths = config
            .entity_paths
            .iter()
            .map(|(entity, path)| (canonical_entity(entity), path.clone()))
            .collect();

        Ok(Self {
            base_url,
            extra_aliases,
            entity_paths,
        })
    }

    /// Map any synonym to its canonical entity. Idempotent.
    pub fn normalize(&self, name: &str) -> String {
        let folded = fold(name);
        if let Some(canonical) = self.extra_aliases.get(&folded) {
            return canonical.clone();
        }
        canonical_entity(&folded)
    }

    /// Search URL for a canonical entity, honoring a per-binding override
    ///
    /// An override may be an absolute URL or a path relative to `base_url`.
    pub fn search_url(&self, canonical: &str, endpoint_override: Option<&str>) -> Result<Url> {
        let target = match endpoint_override {
            Some(endpoint) if !endpoint.trim().is_empty() => endpoint.trim().to_string(),
            _ => self
                .entity_paths
                .get(canonical)
                .cloned()
                .unwrap_or_else(|| format!("{}/{}", SEARCH_PATH_PREFIX, canonical)),
        };

        if let Ok(absolute) = Url::parse(&target) {
            return Ok(absolute);
        }
        self.base_url
            .join(&target)
            .map_err(|e| LookupError::InvalidBaseUrl {
                url: target,
                reason: e.to_string(),
            })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn resolver() -> EntityResolver {
        let mut config = EngineConfig::default().with_base_url("https://erp.example.com/app/");
        config.aliases.insert("Stock Line".into(), "product".into());
        config
            .entity_paths
            .insert("rooms".into(), "/hotel/rooms/find".into());
        EntityResolver::new(&config).unwrap()
    }

    #[test]
    fn product_synonyms_map_to_items() {
        for name in ["product", "Products", " ITEM ", "article", "items"] {
            assert_eq!(canonical_entity(name), "items", "{name}");
        }
    }

    #[test]
    fn delivery_person_variants() {
        assert_eq!(canonical_entity("delivery-person"), "deliverers");
        assert_eq!(canonical_entity("Delivery People"), "deliverers");
        assert_eq!(canonical_entity("driver"), "deliverers");
    }

    #[test]
    fn unknown_entity_is_folded_not_rejected() {
        assert_eq!(canonical_entity("Tax-Rates"), "tax_rates");
    }

    #[test]
    fn configured_alias_resolves_through_builtins() {
        let r = resolver();
        assert_eq!(r.normalize("stock-line"), "items");
    }

    #[test]
    fn default_search_url() {
        let r = resolver();
        let url = r.search_url("items", None).unwrap();
        assert_eq!(url.as_str(), "https://erp.example.com/api/lookup/items");
    }

    #[test]
    fn configured_entity_path() {
        let r = resolver();
        let url = r.search_url("rooms", None).unwrap();
        assert_eq!(url.as_str(), "https://erp.example.com/hotel/rooms/find");
    }

    #[test]
    fn relative_override_joins_base() {
        let r = resolver();
        let url = r.search_url("items", Some("search/pos-items")).unwrap();
        assert_eq!(url.as_str(), "https://erp.example.com/app/search/pos-items");
    }

    #[test]
    fn absolute_override_wins() {
        let r = resolver();
        let url = r
            .search_url("items", Some("https://other.example.com/q"))
            .unwrap();
        assert_eq!(url.as_str(), "https://other.example.com/q");
    }

    #[test]
    fn builtin_aliases_are_sorted() {
        let pairs = builtin_aliases();
        assert!(pairs.windows(2).all(|w| w[0].0 <= w[1].0));
        assert!(pairs.contains(&("product", "items")));
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(name in "[A-Za-z _-]{0,16}") {
            let r = resolver();
            let once = r.normalize(&name);
            prop_assert_eq!(r.normalize(&once), once);
        }
    }
}
