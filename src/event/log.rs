//! EventLog - append-only record of lookup events
//!
//! - LookupEvent: envelope with id + timestamp + kind
//! - EventKind: binding / search / panel / selection variants
//! - EventLog: thread-safe, cheap to clone (shared storage)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

use crate::page::ElementId;
use crate::row::ResultRow;

/// Single event in the log
#[derive(Debug, Clone, Serialize)]
pub struct LookupEvent {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since the log was created (ms)
    pub timestamp_ms: u64,
    pub kind: EventKind,
}

/// All event types
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // BINDING LIFECYCLE
    // ═══════════════════════════════════════════
    BindingCreated {
        element: ElementId,
        entity: String,
    },
    BindingRemoved {
        element: ElementId,
    },

    // ═══════════════════════════════════════════
    // SEARCH
    // ═══════════════════════════════════════════
    SearchIssued {
        element: Option<ElementId>,
        key: String,
    },
    SearchFailed {
        element: Option<ElementId>,
        key: String,
        code: String,
        error: String,
    },

    // ═══════════════════════════════════════════
    // PANEL + SELECTION
    // ═══════════════════════════════════════════
    PanelOpened {
        element: ElementId,
        rows: usize,
    },
    PanelClosed {
        element: ElementId,
    },
    /// The "selected" notification dispatched on the anchor
    Selected {
        element: ElementId,
        row: ResultRow,
    },
}

impl EventKind {
    /// Anchor element this event concerns, if any
    pub fn element(&self) -> Option<&ElementId> {
        match self {
            Self::BindingCreated { element, .. }
            | Self::BindingRemoved { element }
            | Self::PanelOpened { element, .. }
            | Self::PanelClosed { element }
            | Self::Selected { element, .. } => Some(element),
            Self::SearchIssued { element, .. } | Self::SearchFailed { element, .. } => {
                element.as_ref()
            }
        }
    }

    pub fn is_search_event(&self) -> bool {
        matches!(self, Self::SearchIssued { .. } | Self::SearchFailed { .. })
    }
}

/// Thread-safe event log
#[derive(Debug, Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<LookupEvent>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event (thread-safe, returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = LookupEvent {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };

        self.events.write().push(event);
        id
    }

    /// Get all events (cloned)
    pub fn events(&self) -> Vec<LookupEvent> {
        self.events.read().clone()
    }

    /// Zero-copy access to events via callback
    ///
    /// Holds read lock for duration of callback - keep it short.
    pub fn with_events<T>(&self, f: impl FnOnce(&[LookupEvent]) -> T) -> T {
        f(&self.events.read())
    }

    /// Events concerning one anchor element
    pub fn filter_element(&self, element: &ElementId) -> Vec<LookupEvent> {
        self.with_events(|events| {
            events
                .iter()
                .filter(|e| e.kind.element() == Some(element))
                .cloned()
                .collect()
        })
    }

    /// Number of `Selected` events for an anchor
    pub fn count_selected(&self, element: &ElementId) -> usize {
        self.with_events(|events| {
            events
                .iter()
                .filter(|e| {
                    matches!(&e.kind, EventKind::Selected { element: el, .. } if el == element)
                })
                .count()
        })
    }

    /// Serialize to JSON for debugging
    pub fn to_json(&self) -> Value {
        self.with_events(|events| serde_json::to_value(events).unwrap_or(Value::Null))
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn emit_assigns_sequential_ids() {
        let log = EventLog::new();
        let el = ElementId::from("#item");
        log.emit(EventKind::BindingCreated {
            element: el.clone(),
            entity: "items".into(),
        });
        log.emit(EventKind::PanelOpened {
            element: el.clone(),
            rows: 3,
        });

        let events = log.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, 0);
        assert_eq!(events[1].id, 1);
    }

    #[test]
    fn filter_element_ignores_other_anchors() {
        let log = EventLog::new();
        let a = ElementId::from("#a");
        let b = ElementId::from("#b");
        log.emit(EventKind::PanelClosed { element: a.clone() });
        log.emit(EventKind::PanelClosed { element: b });
        log.emit(EventKind::SearchIssued {
            element: None,
            key: "items||x|50".into(),
        });

        assert_eq!(log.filter_element(&a).len(), 1);
    }

    #[test]
    fn count_selected() {
        let log = EventLog::new();
        let a = ElementId::from("#a");
        log.emit(EventKind::Selected {
            element: a.clone(),
            row: ResultRow::from_value(json!({"id": 1})),
        });
        assert_eq!(log.count_selected(&a), 1);
        assert_eq!(log.count_selected(&ElementId::from("#b")), 0);
    }

    #[test]
    fn to_json_uses_snake_case_tags() {
        let log = EventLog::new();
        log.emit(EventKind::PanelOpened {
            element: ElementId::from("#a"),
            rows: 1,
        });
        let value = log.to_json();
        assert_eq!(value[0]["kind"]["type"], "panel_opened");
        assert_eq!(value[0]["kind"]["element"], "#a");
    }

    #[test]
    fn search_events_classified() {
        let kind = EventKind::SearchFailed {
            element: None,
            key: "k".into(),
            code: "LOOKUP-023".into(),
            error: "timeout".into(),
        };
        assert!(kind.is_search_event());
        assert_eq!(kind.element(), None);
    }
}
