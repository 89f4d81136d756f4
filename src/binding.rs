//! Binding configuration
//!
//! [`BindingSpec`] is what a caller (or the markup scanner) asks for;
//! [`BindingConfig`] is the resolved form every other module reads: entity
//! normalized through the alias table, defaults filled in.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::BindingDefaults;
use crate::entity::EntityResolver;
use crate::error::{LookupError, Result};
use crate::page::ElementId;
use crate::panel::RowFormatter;
use crate::row::{ResultRow, Rows};

/// Custom pick handler, invoked after write-back
pub type PickHandler = Arc<dyn Fn(&ElementId, &ResultRow) + Send + Sync>;

/// Semantic role of a write-back target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillRole {
    Id,
    Name,
    Code,
    Unit,
    Price,
    Description,
}

impl FillRole {
    pub const ALL: [FillRole; 6] = [
        FillRole::Id,
        FillRole::Name,
        FillRole::Code,
        FillRole::Unit,
        FillRole::Price,
        FillRole::Description,
    ];

    /// Markup attribute carrying the target selector
    pub fn attribute(self) -> &'static str {
        match self {
            FillRole::Id => "data-fill-id",
            FillRole::Name => "data-fill-name",
            FillRole::Code => "data-fill-code",
            FillRole::Unit => "data-fill-unit",
            FillRole::Price => "data-fill-price",
            FillRole::Description => "data-fill-description",
        }
    }

    /// Record field written for this role
    pub fn default_field(self) -> &'static str {
        match self {
            FillRole::Id => "id",
            FillRole::Name => "label",
            FillRole::Code => "code",
            FillRole::Unit => "unit",
            FillRole::Price => "price",
            FillRole::Description => "description",
        }
    }
}

/// Write `field` of the picked record into the element matched by `target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillRule {
    pub target: String,
    pub field: String,
}

/// Requested binding configuration
#[derive(Clone, Default)]
pub struct BindingSpec {
    pub entity: Option<String>,
    pub endpoint: Option<String>,
    pub min_chars: Option<usize>,
    pub debounce: Option<Duration>,
    pub limit: Option<usize>,
    pub fills: Vec<FillRule>,
    pub formatter: Option<RowFormatter>,
    pub on_pick: Option<PickHandler>,
    pub pool: Option<Rows>,
    pub write_back_only: bool,
}

impl BindingSpec {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: Some(entity.into()),
            ..Self::default()
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn min_chars(mut self, min: usize) -> Self {
        self.min_chars = Some(min);
        self
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = Some(debounce);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Write record `field` into `target` on pick
    pub fn fill(mut self, target: impl Into<String>, field: impl Into<String>) -> Self {
        self.fills.push(FillRule {
            target: target.into(),
            field: field.into(),
        });
        self
    }

    /// Write the role's default field into `target` on pick
    pub fn fill_role(self, role: FillRole, target: impl Into<String>) -> Self {
        self.fill(target, role.default_field())
    }

    pub fn formatter(mut self, formatter: RowFormatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn on_pick(mut self, handler: PickHandler) -> Self {
        self.on_pick = Some(handler);
        self
    }

    /// Search this in-memory pool instead of the remote endpoint
    pub fn local_pool(mut self, rows: impl Into<Rows>) -> Self {
        self.pool = Some(rows.into());
        self
    }

    /// Only write targets; leave the anchor's own text alone
    pub fn write_back_only(mut self, enabled: bool) -> Self {
        self.write_back_only = enabled;
        self
    }
}

impl fmt::Debug for BindingSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingSpec")
            .field("entity", &self.entity)
            .field("endpoint", &self.endpoint)
            .field("min_chars", &self.min_chars)
            .field("debounce", &self.debounce)
            .field("limit", &self.limit)
            .field("fills", &self.fills)
            .field("formatter", &self.formatter.is_some())
            .field("on_pick", &self.on_pick.is_some())
            .field("pool", &self.pool.as_ref().map(|p| p.len()))
            .field("write_back_only", &self.write_back_only)
            .finish()
    }
}

/// Resolved configuration of one binding
#[derive(Clone)]
pub struct BindingConfig {
    /// Canonical entity (alias-normalized)
    pub entity: String,
    pub endpoint: Option<String>,
    pub min_chars: usize,
    pub debounce: Duration,
    /// Rows per search; 0 means "no limit parameter"
    pub limit: usize,
    pub fills: Vec<FillRule>,
    pub formatter: Option<RowFormatter>,
    pub on_pick: Option<PickHandler>,
    pub pool: Option<Rows>,
    pub write_back_only: bool,
}

impl BindingConfig {
    /// Resolve a spec; a missing or blank entity is a configuration error
    pub fn resolve(
        element: &ElementId,
        spec: BindingSpec,
        defaults: &BindingDefaults,
        resolver: &EntityResolver,
    ) -> Result<Self> {
        let entity = spec
            .entity
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| LookupError::MissingEntity {
                element: element.to_string(),
            })?;

        Ok(Self {
            entity: resolver.normalize(entity),
            endpoint: spec.endpoint.filter(|e| !e.trim().is_empty()),
            min_chars: spec.min_chars.unwrap_or(defaults.min_chars),
            debounce: spec
                .debounce
                .unwrap_or_else(|| Duration::from_millis(defaults.debounce_ms)),
            limit: spec.limit.unwrap_or(defaults.limit),
            fills: spec.fills,
            formatter: spec.formatter,
            on_pick: spec.on_pick,
            pool: spec.pool,
            write_back_only: spec.write_back_only,
        })
    }
}

impl fmt::Debug for BindingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingConfig")
            .field("entity", &self.entity)
            .field("endpoint", &self.endpoint)
            .field("min_chars", &self.min_chars)
            .field("debounce", &self.debounce)
            .field("limit", &self.limit)
            .field("fills", &self.fills)
            .field("local_pool", &self.pool.is_some())
            .field("write_back_only", &self.write_back_only)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn resolver() -> EntityResolver {
        EntityResolver::new(&EngineConfig::default()).unwrap()
    }

    #[test]
    fn resolve_applies_defaults_and_aliases() {
        let el = ElementId::from("#product");
        let config = BindingConfig::resolve(
            &el,
            BindingSpec::new("Product").fill_role(FillRole::Price, "#price"),
            &BindingDefaults::default(),
            &resolver(),
        )
        .unwrap();

        assert_eq!(config.entity, "items");
        assert_eq!(config.min_chars, 1);
        assert_eq!(config.debounce, Duration::from_millis(160));
        assert_eq!(config.limit, 50);
        assert_eq!(
            config.fills,
            vec![FillRule {
                target: "#price".into(),
                field: "price".into()
            }]
        );
    }

    #[test]
    fn missing_entity_is_rejected() {
        let el = ElementId::from("#x");
        let err = BindingConfig::resolve(
            &el,
            BindingSpec::default(),
            &BindingDefaults::default(),
            &resolver(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "LOOKUP-010");

        let blank = BindingSpec::new("   ");
        assert!(
            BindingConfig::resolve(&el, blank, &BindingDefaults::default(), &resolver()).is_err()
        );
    }

    #[test]
    fn blank_endpoint_is_ignored() {
        let el = ElementId::from("#x");
        let config = BindingConfig::resolve(
            &el,
            BindingSpec::new("rooms").endpoint(" "),
            &BindingDefaults::default(),
            &resolver(),
        )
        .unwrap();
        assert_eq!(config.endpoint, None);
    }

    #[test]
    fn fill_roles_have_distinct_attributes() {
        let mut attrs: Vec<_> = FillRole::ALL.iter().map(|r| r.attribute()).collect();
        attrs.sort_unstable();
        attrs.dedup();
        assert_eq!(attrs.len(), FillRole::ALL.len());
        assert_eq!(FillRole::Name.default_field(), "label");
    }
}
