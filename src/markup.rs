//! Declarative attribute contract
//!
//! Pages opt elements in with `data-lookup="<entity>"` plus optional
//! tuning and write-back attributes. An [`ElementDescriptor`] is the host's
//! report of one element: its id and its attribute map.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::binding::{BindingSpec, FillRole};
use crate::error::{LookupError, Result};
use crate::page::ElementId;

pub const ATTR_ENTITY: &str = "data-lookup";
pub const ATTR_ENDPOINT: &str = "data-lookup-endpoint";
pub const ATTR_MIN: &str = "data-lookup-min";
pub const ATTR_DEBOUNCE: &str = "data-lookup-debounce";
pub const ATTR_LIMIT: &str = "data-lookup-limit";
pub const ATTR_FILL_ONLY: &str = "data-lookup-fill-only";

/// One element as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    pub id: ElementId,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ElementDescriptor {
    pub fn new(id: impl Into<ElementId>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Carries the opt-in attribute (even with an empty value)
    pub fn is_annotated(&self) -> bool {
        self.attributes.contains_key(ATTR_ENTITY)
    }

    /// Build a binding spec from the attributes
    ///
    /// The entity is copied as-is; a blank one is rejected later by
    /// binding resolution. Unparsable numbers are an error.
    pub fn to_spec(&self) -> Result<BindingSpec> {
        let mut spec = BindingSpec {
            entity: self.get(ATTR_ENTITY).map(str::to_string),
            ..BindingSpec::default()
        };

        if let Some(endpoint) = self.get(ATTR_ENDPOINT) {
            spec = spec.endpoint(endpoint);
        }
        if let Some(min) = self.count(ATTR_MIN)? {
            spec = spec.min_chars(min);
        }
        if let Some(ms) = self.number(ATTR_DEBOUNCE)? {
            spec = spec.debounce(Duration::from_millis(ms));
        }
        if let Some(limit) = self.count(ATTR_LIMIT)? {
            spec = spec.limit(limit);
        }
        if let Some(flag) = self.get(ATTR_FILL_ONLY) {
            spec = spec.write_back_only(parse_flag(flag));
        }

        for role in FillRole::ALL {
            if let Some(target) = self.get(role.attribute()).map(str::trim) {
                if !target.is_empty() {
                    spec = spec.fill_role(role, target);
                }
            }
        }
        Ok(spec)
    }

    /// A number that must also fit the platform's `usize`
    fn count(&self, attribute: &str) -> Result<Option<usize>> {
        match self.number(attribute)? {
            None => Ok(None),
            Some(n) => usize::try_from(n)
                .map(Some)
                .map_err(|_| self.invalid(attribute)),
        }
    }

    fn number(&self, attribute: &str) -> Result<Option<u64>> {
        match self.get(attribute).map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse::<u64>()
                .map(Some)
                .map_err(|_| self.invalid(attribute)),
        }
    }

    fn invalid(&self, attribute: &str) -> LookupError {
        LookupError::InvalidAttribute {
            element: self.id.to_string(),
            attribute: attribute.to_string(),
            value: self.get(attribute).unwrap_or_default().trim().to_string(),
        }
    }
}

/// Boolean attribute: present and not explicitly "false"/"0"
fn parse_flag(value: &str) -> bool {
    !matches!(value.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no")
}
