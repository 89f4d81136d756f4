//! # Selection State Machine
//!
//! Open/closed state and the active row of one binding. Pure and
//! synchronous: every input returns a [`Command`] the binding runtime carries
//! out (schedule a query, render, highlight, pick, close).
//!
//! ```text
//!            text ≥ min ──► ScheduleQuery ──► results ──► Open{0} / Open{None}
//!   Closed ◄─ Escape / pick / outside / too short ── Open{active}
//!   Closed ── ArrowUp/Down with retained rows ──► Open{0}
//! ```

use crate::row::{ResultRow, Rows};

/// Keys the engine reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowDown,
    ArrowUp,
    Enter,
    Escape,
    Other,
}

impl Key {
    /// Map a DOM `KeyboardEvent.key` value
    pub fn from_dom(key: &str) -> Self {
        match key {
            "ArrowDown" | "Down" => Key::ArrowDown,
            "ArrowUp" | "Up" => Key::ArrowUp,
            "Enter" => Key::Enter,
            "Escape" | "Esc" => Key::Escape,
            _ => Key::Other,
        }
    }
}

/// Open/closed state; `active: None` means no row highlighted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Closed,
    Open { active: Option<usize> },
}

/// What the binding runtime must do next
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Input consumed, nothing to do
    None,
    /// Debounced search for the current text
    ScheduleQuery,
    /// Immediate search; pick the first row if any
    QueryAndPickFirst,
    /// Render the retained rows and highlight `active`
    Render { active: Option<usize> },
    /// Move the highlight (panel already shows the rows)
    Highlight(usize),
    /// Hide the panel
    Close,
    /// Commit this row, then close
    Pick(ResultRow),
}

/// Selection state of one binding
#[derive(Debug, Clone)]
pub struct SelectionMachine {
    state: SelectionState,
    rows: Rows,
    min_chars: usize,
}

impl SelectionMachine {
    pub fn new(min_chars: usize) -> Self {
        Self {
            state: SelectionState::Closed,
            rows: Vec::new().into(),
            min_chars,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, SelectionState::Open { .. })
    }

    pub fn active(&self) -> Option<usize> {
        match self.state {
            SelectionState::Open { active } => active,
            SelectionState::Closed => None,
        }
    }

    /// Rows from the last completed query
    pub fn rows(&self) -> &Rows {
        &self.rows
    }

    fn long_enough(&self, text: &str) -> bool {
        text.trim().chars().count() >= self.min_chars
    }

    /// Text edited
    pub fn on_text_changed(&mut self, text: &str) -> Command {
        if self.long_enough(text) {
            Command::ScheduleQuery
        } else {
            self.rows = Vec::new().into();
            self.close_command()
        }
    }

    /// A query finished with rows (possibly none)
    pub fn on_results(&mut self, rows: Rows) -> Command {
        let active = if rows.is_empty() { None } else { Some(0) };
        self.rows = rows;
        self.state = SelectionState::Open { active };
        Command::Render { active }
    }

    /// A query was rejected for being too short
    pub fn on_too_short(&mut self) -> Command {
        self.rows = Vec::new().into();
        self.close_command()
    }

    pub fn on_key(&mut self, key: Key, text: &str) -> Command {
        match (key, self.state) {
            (Key::ArrowDown | Key::ArrowUp, SelectionState::Closed) => {
                if self.rows.is_empty() {
                    Command::None
                } else {
                    self.state = SelectionState::Open { active: Some(0) };
                    Command::Render { active: Some(0) }
                }
            }
            (Key::ArrowDown, SelectionState::Open { active }) => self.step(active, true),
            (Key::ArrowUp, SelectionState::Open { active }) => self.step(active, false),
            (Key::Enter, SelectionState::Open { active: Some(i) }) => match self.rows.get(i) {
                Some(row) => {
                    let row = row.clone();
                    self.state = SelectionState::Closed;
                    Command::Pick(row)
                }
                None => Command::None,
            },
            (Key::Enter, SelectionState::Open { active: None }) => Command::None,
            (Key::Enter, SelectionState::Closed) => {
                if self.long_enough(text) {
                    Command::QueryAndPickFirst
                } else {
                    Command::None
                }
            }
            (Key::Escape, SelectionState::Open { .. }) => {
                self.rows = Vec::new().into();
                self.close_command()
            }
            (Key::Escape, SelectionState::Closed) | (Key::Other, _) => Command::None,
        }
    }

    fn step(&mut self, active: Option<usize>, down: bool) -> Command {
        let len = self.rows.len();
        if len == 0 {
            return Command::None;
        }
        let next = match (active, down) {
            (None, true) => 0,
            (None, false) => len - 1,
            (Some(i), true) => (i + 1) % len,
            (Some(0), false) => len - 1,
            (Some(i), false) => i - 1,
        };
        self.state = SelectionState::Open {
            active: Some(next),
        };
        Command::Highlight(next)
    }

    /// Pointer-down on panel row `index`
    pub fn on_row_pointer(&mut self, index: usize) -> Command {
        if !self.is_open() {
            return Command::None;
        }
        match self.rows.get(index) {
            Some(row) => {
                let row = row.clone();
                self.state = SelectionState::Closed;
                Command::Pick(row)
            }
            // Disabled "no matches" row or stale index
            None => Command::None,
        }
    }

    /// Close without committing; retained rows allow arrow-key reopen
    pub fn close(&mut self) -> Command {
        self.close_command()
    }

    fn close_command(&mut self) -> Command {
        let was_open = self.is_open();
        self.state = SelectionState::Closed;
        if was_open {
            Command::Close
        } else {
            Command::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(n: usize) -> Rows {
        (0..n)
            .map(|i| ResultRow::from_value(json!({ "id": i, "name": format!("R{}", i) })))
            .collect::<Vec<_>>()
            .into()
    }

    fn open_with(n: usize) -> SelectionMachine {
        let mut m = SelectionMachine::new(1);
        m.on_results(rows(n));
        m
    }

    #[test]
    fn text_schedules_query_when_long_enough() {
        let mut m = SelectionMachine::new(2);
        assert_eq!(m.on_text_changed("a"), Command::None);
        assert_eq!(m.on_text_changed("ab"), Command::ScheduleQuery);
    }

    #[test]
    fn short_text_closes_open_panel() {
        let mut m = open_with(2);
        assert_eq!(m.on_text_changed(""), Command::Close);
        assert_eq!(m.state(), SelectionState::Closed);
        assert!(m.rows().is_empty());
    }

    #[test]
    fn results_open_at_first_row() {
        let mut m = SelectionMachine::new(1);
        assert_eq!(m.on_results(rows(3)), Command::Render { active: Some(0) });
        assert_eq!(m.active(), Some(0));
    }

    #[test]
    fn empty_results_open_without_highlight() {
        let mut m = SelectionMachine::new(1);
        assert_eq!(m.on_results(rows(0)), Command::Render { active: None });
        assert!(m.is_open());
        assert_eq!(m.on_key(Key::Enter, "zz"), Command::None);
        assert_eq!(m.on_row_pointer(0), Command::None);
        assert!(m.is_open());
    }

    #[test]
    fn arrows_wrap_around() {
        let mut m = open_with(3);
        assert_eq!(m.on_key(Key::ArrowDown, "x"), Command::Highlight(1));
        assert_eq!(m.on_key(Key::ArrowDown, "x"), Command::Highlight(2));
        assert_eq!(m.on_key(Key::ArrowDown, "x"), Command::Highlight(0));
        assert_eq!(m.on_key(Key::ArrowUp, "x"), Command::Highlight(2));
        assert_eq!(m.on_key(Key::ArrowUp, "x"), Command::Highlight(1));
    }

    #[test]
    fn arrow_reopens_closed_panel_with_retained_rows() {
        let mut m = open_with(2);
        m.close();
        assert_eq!(m.on_key(Key::ArrowDown, "x"), Command::Render { active: Some(0) });
        m.close();
        assert_eq!(m.on_key(Key::ArrowUp, "x"), Command::Render { active: Some(0) });
    }

    #[test]
    fn arrow_on_closed_without_rows_is_noop() {
        let mut m = SelectionMachine::new(1);
        assert_eq!(m.on_key(Key::ArrowDown, "x"), Command::None);
    }

    #[test]
    fn enter_commits_active_row() {
        let mut m = open_with(3);
        m.on_key(Key::ArrowDown, "x");
        match m.on_key(Key::Enter, "x") {
            Command::Pick(row) => assert_eq!(row.id().as_deref(), Some("1")),
            other => panic!("expected pick, got {:?}", other),
        }
        assert_eq!(m.state(), SelectionState::Closed);
    }

    #[test]
    fn enter_while_closed_queries_immediately() {
        let mut m = SelectionMachine::new(2);
        assert_eq!(m.on_key(Key::Enter, "a"), Command::None);
        assert_eq!(m.on_key(Key::Enter, "ab"), Command::QueryAndPickFirst);
    }

    #[test]
    fn escape_discards_rows() {
        let mut m = open_with(2);
        assert_eq!(m.on_key(Key::Escape, "x"), Command::Close);
        assert!(m.rows().is_empty());
        assert_eq!(m.on_key(Key::ArrowDown, "x"), Command::None);
        assert_eq!(m.on_key(Key::Escape, "x"), Command::None);
    }

    #[test]
    fn pointer_picks_regardless_of_active() {
        let mut m = open_with(3);
        match m.on_row_pointer(2) {
            Command::Pick(row) => assert_eq!(row.label(), "R2"),
            other => panic!("expected pick, got {:?}", other),
        }
        assert_eq!(m.on_row_pointer(0), Command::None, "closed panel ignores pointer");
    }

    #[test]
    fn key_from_dom() {
        assert_eq!(Key::from_dom("ArrowDown"), Key::ArrowDown);
        assert_eq!(Key::from_dom("Esc"), Key::Escape);
        assert_eq!(Key::from_dom("a"), Key::Other);
    }
}
