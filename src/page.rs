//! Host page seam
//!
//! The engine never touches a real document. The host identifies elements
//! with [`ElementId`] (typically a CSS selector or DOM id), performs
//! write-back through a [`FieldWriter`], and reports pointer hits as
//! [`HitTarget`]s.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Opaque identity of an element on the page
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(Arc<str>);

impl ElementId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ElementId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

/// Writes picked values into page fields
///
/// Implementations set the target's value and fire its change notification
/// so other page logic (totals, discounts) can react.
pub trait FieldWriter: Send + Sync {
    fn write(&self, selector: &str, value: &str);
}

/// Writer that drops every write (fetch-only hosts, dry runs)
#[derive(Debug, Clone, Copy, Default)]
pub struct NullWriter;

impl FieldWriter for NullWriter {
    fn write(&self, _selector: &str, _value: &str) {}
}

/// One recorded write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWrite {
    pub selector: String,
    pub value: String,
}

/// Writer that records every write in order
#[derive(Debug, Clone, Default)]
pub struct RecordingWriter {
    writes: Arc<Mutex<Vec<FieldWrite>>>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<FieldWrite> {
        self.writes.lock().clone()
    }

    /// Most recent value written to `selector`
    pub fn value_of(&self, selector: &str) -> Option<String> {
        self.writes
            .lock()
            .iter()
            .rev()
            .find(|w| w.selector == selector)
            .map(|w| w.value.clone())
    }

    pub fn clear(&self) {
        self.writes.lock().clear();
    }
}

impl FieldWriter for RecordingWriter {
    fn write(&self, selector: &str, value: &str) {
        self.writes.lock().push(FieldWrite {
            selector: selector.to_string(),
            value: value.to_string(),
        });
    }
}

/// What a page-wide pointer-down landed on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitTarget {
    /// A bound anchor input
    Anchor(ElementId),
    /// A row of the panel owned by `owner`
    PanelRow { owner: ElementId, row: usize },
    /// Panel chrome (padding, scrollbar) owned by `owner`
    Panel(ElementId),
    /// Anything else on the page
    Outside,
}

impl HitTarget {
    /// Binding whose anchor or panel contains the hit
    pub fn owner(&self) -> Option<&ElementId> {
        match self {
            Self::Anchor(id) | Self::Panel(id) | Self::PanelRow { owner: id, .. } => Some(id),
            Self::Outside => None,
        }
    }
}
