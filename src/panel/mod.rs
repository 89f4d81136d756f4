//! # Panel
//!
//! Headless model of one binding's floating suggestion list. Pure
//! rendering and accessibility state: it knows which rows are shown, which
//! one is highlighted, and which slice is scrolled into view. The host paints
//! it (via [`Panel::to_html`] or the [`PanelSnapshot`]).

mod html;

pub use html::escape_html;

use std::sync::Arc;

use serde::Serialize;

use crate::page::ElementId;
use crate::row::ResultRow;
use crate::util::constants::NO_MATCHES_LABEL;

/// Text lines of one rendered row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedRow {
    pub primary: String,
    pub secondary: Option<String>,
}

/// Custom row formatter
pub type RowFormatter = Arc<dyn Fn(&ResultRow) -> RenderedRow + Send + Sync>;

/// Label line plus optional secondary line
pub fn default_format(row: &ResultRow) -> RenderedRow {
    RenderedRow {
        primary: row.label(),
        secondary: row.secondary(),
    }
}

/// One row as displayed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelRow {
    pub option_id: String,
    pub primary: String,
    pub secondary: Option<String>,
    pub disabled: bool,
    pub active: bool,
}

/// Combobox attributes for the anchor input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AriaState {
    pub expanded: bool,
    pub controls: String,
    pub active_descendant: Option<String>,
}

impl AriaState {
    /// Attribute pairs to set on the anchor
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        let mut attrs = vec![
            ("role", "combobox".to_string()),
            ("aria-autocomplete", "list".to_string()),
            ("aria-expanded", self.expanded.to_string()),
            ("aria-controls", self.controls.clone()),
        ];
        if let Some(id) = &self.active_descendant {
            attrs.push(("aria-activedescendant", id.clone()));
        }
        attrs
    }
}

/// Serializable view of a panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelSnapshot {
    pub id: String,
    pub anchor: ElementId,
    pub open: bool,
    pub rows: Vec<PanelRow>,
    pub active: Option<usize>,
    pub scroll_top: usize,
    pub aria: AriaState,
}

impl PanelSnapshot {
    /// Primary labels in display order
    pub fn labels(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.primary.as_str()).collect()
    }

    /// Whether the panel shows only the disabled "no matches" row
    pub fn is_no_matches(&self) -> bool {
        self.rows.len() == 1 && self.rows[0].disabled
    }
}

/// Suggestion panel anchored to one input
#[derive(Debug, Clone)]
pub struct Panel {
    id: String,
    anchor: ElementId,
    rows: Vec<PanelRow>,
    open: bool,
    active: Option<usize>,
    scroll_top: usize,
    visible_rows: usize,
    attached: bool,
}

impl Panel {
    /// `serial` keeps ids unique when the same selector is bound twice over
    /// a page's lifetime
    pub fn new(anchor: ElementId, serial: u64, visible_rows: usize) -> Self {
        Self {
            id: format!("lookup-panel-{}", serial),
            anchor,
            rows: Vec::new(),
            open: false,
            active: None,
            scroll_top: 0,
            visible_rows: visible_rows.max(1),
            attached: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn option_id(&self, index: usize) -> String {
        format!("{}-opt-{}", self.id, index)
    }

    /// Show rows (or the disabled "no matches" row) and open the panel
    ///
    /// Nothing is highlighted afterwards; callers pick the initial row.
    pub fn render(&mut self, rows: &[ResultRow], formatter: Option<&RowFormatter>) {
        self.rows = if rows.is_empty() {
            vec![PanelRow {
                option_id: self.option_id(0),
                primary: NO_MATCHES_LABEL.to_string(),
                secondary: None,
                disabled: true,
                active: false,
            }]
        } else {
            rows.iter()
                .enumerate()
                .map(|(i, row)| {
                    let rendered = match formatter {
                        Some(f) => f(row),
                        None => default_format(row),
                    };
                    PanelRow {
                        option_id: self.option_id(i),
                        primary: rendered.primary,
                        secondary: rendered.secondary,
                        disabled: false,
                        active: false,
                    }
                })
                .collect()
        };
        self.active = None;
        self.scroll_top = 0;
        self.open = true;
        self.attached = true;
    }

    /// Highlight a row and scroll it into view; `None` clears the highlight
    pub fn highlight(&mut self, index: Option<usize>) {
        let index = index.filter(|&i| self.is_selectable(i));
        if let Some(prev) = self.active.and_then(|i| self.rows.get_mut(i)) {
            prev.active = false;
        }
        self.active = index;
        if let Some(i) = index {
            self.rows[i].active = true;
            self.scroll_into_view(i);
        }
    }

    fn scroll_into_view(&mut self, index: usize) {
        if index < self.scroll_top {
            self.scroll_top = index;
        } else if index >= self.scroll_top + self.visible_rows {
            self.scroll_top = index + 1 - self.visible_rows;
        }
    }

    /// Hide the panel; it stays attached for reuse
    pub fn close(&mut self) {
        self.open = false;
        self.active = None;
        self.rows.clear();
        self.scroll_top = 0;
    }

    /// Remove the panel from the page
    pub fn detach(&mut self) {
        self.close();
        self.attached = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// A rendered, non-disabled row
    pub fn is_selectable(&self, index: usize) -> bool {
        self.rows.get(index).is_some_and(|r| !r.disabled)
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    /// Indices currently inside the scroll window
    pub fn visible_range(&self) -> std::ops::Range<usize> {
        let end = (self.scroll_top + self.visible_rows).min(self.rows.len());
        self.scroll_top..end
    }

    pub fn aria(&self) -> AriaState {
        AriaState {
            expanded: self.open,
            controls: self.id.clone(),
            active_descendant: self
                .active
                .filter(|_| self.open)
                .map(|i| self.rows[i].option_id.clone()),
        }
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        PanelSnapshot {
            id: self.id.clone(),
            anchor: self.anchor.clone(),
            open: self.open,
            rows: self.rows.clone(),
            active: self.active,
            scroll_top: self.scroll_top,
            aria: self.aria(),
        }
    }

    /// Listbox markup for the current state
    pub fn to_html(&self) -> String {
        html::render_listbox(self)
    }

    pub(crate) fn rows(&self) -> &[PanelRow] {
        &self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(n: usize) -> Vec<ResultRow> {
        (0..n)
            .map(|i| {
                ResultRow::from_value(json!({
                    "id": i,
                    "name": format!("Item {}", i),
                    "code": format!("C{}", i)
                }))
            })
            .collect()
    }

    fn panel() -> Panel {
        Panel::new(ElementId::from("#product"), 7, 3)
    }

    #[test]
    fn render_opens_with_default_format() {
        let mut p = panel();
        p.render(&rows(2), None);
        assert!(p.is_open());
        assert!(p.is_attached());
        let snap = p.snapshot();
        assert_eq!(snap.labels(), vec!["Item 0", "Item 1"]);
        assert_eq!(snap.rows[1].secondary.as_deref(), Some("C1"));
        assert_eq!(snap.rows[1].option_id, "lookup-panel-7-opt-1");
        assert_eq!(p.active(), None);
    }

    #[test]
    fn empty_render_shows_disabled_row() {
        let mut p = panel();
        p.render(&[], None);
        let snap = p.snapshot();
        assert!(snap.is_no_matches());
        assert_eq!(snap.rows[0].primary, NO_MATCHES_LABEL);
        assert!(!p.is_selectable(0));

        p.highlight(Some(0));
        assert_eq!(p.active(), None);
    }

    #[test]
    fn custom_formatter_is_used() {
        let mut p = panel();
        let f: RowFormatter = Arc::new(|row: &ResultRow| RenderedRow {
            primary: format!("[{}] {}", row.id().unwrap_or_default(), row.label()),
            secondary: None,
        });
        p.render(&rows(1), Some(&f));
        assert_eq!(p.snapshot().labels(), vec!["[0] Item 0"]);
    }

    #[test]
    fn highlight_moves_active_flag() {
        let mut p = panel();
        p.render(&rows(3), None);
        p.highlight(Some(0));
        p.highlight(Some(2));
        let snap = p.snapshot();
        assert_eq!(
            snap.rows.iter().filter(|r| r.active).count(),
            1,
            "exactly one active row"
        );
        assert!(snap.rows[2].active);
        assert_eq!(
            snap.aria.active_descendant.as_deref(),
            Some("lookup-panel-7-opt-2")
        );
    }

    #[test]
    fn highlight_scrolls_into_view() {
        let mut p = panel();
        p.render(&rows(10), None);
        p.highlight(Some(5));
        assert_eq!(p.scroll_top(), 3);
        assert_eq!(p.visible_range(), 3..6);

        p.highlight(Some(1));
        assert_eq!(p.scroll_top(), 1);

        p.highlight(Some(9));
        assert_eq!(p.visible_range(), 7..10);
    }

    #[test]
    fn close_keeps_panel_attached() {
        let mut p = panel();
        p.render(&rows(2), None);
        p.highlight(Some(1));
        p.close();
        assert!(!p.is_open());
        assert!(p.is_attached());
        assert_eq!(p.row_count(), 0);
        assert!(!p.aria().expanded);
        assert_eq!(p.aria().active_descendant, None);
    }

    #[test]
    fn detach_removes_panel() {
        let mut p = panel();
        p.render(&rows(1), None);
        p.detach();
        assert!(!p.is_attached());
        assert!(!p.is_open());
    }

    #[test]
    fn aria_attributes() {
        let mut p = panel();
        p.render(&rows(2), None);
        p.highlight(Some(0));
        let attrs = p.aria().attributes();
        assert!(attrs.contains(&("role", "combobox".to_string())));
        assert!(attrs.contains(&("aria-expanded", "true".to_string())));
        assert!(attrs.contains(&("aria-controls", "lookup-panel-7".to_string())));
        assert!(attrs.contains(&("aria-activedescendant", "lookup-panel-7-opt-0".to_string())));
    }
}
