//! Binding runtime
//!
//! One [`Session`] per bound element. It owns the binding's selection
//! machine, its lazily created panel, its debounce timer and its query slot.
//! State changes happen synchronously under the session lock; only the
//! search itself runs on a spawned task.
//!
//! Host callbacks (field writes, pick handler, emitted events) always run
//! after the lock is released, so a pick handler or an emitter may call back
//! into the engine (even unbind its own element).

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::binding::BindingConfig;
use crate::dispatch::{Dispatcher, QueryOutcome, QuerySlot, QueryTicket};
use crate::event::{EventEmitter, EventKind};
use crate::page::{ElementId, FieldWriter};
use crate::panel::{Panel, PanelSnapshot};
use crate::row::ResultRow;
use crate::select::{Command, Key, SelectionMachine};

/// Bindings whose panel is currently open
///
/// A binding is in the set iff its panel is open; sessions update it in the
/// same critical section that opens or closes the panel.
#[derive(Debug, Default)]
pub struct OpenSet {
    inner: Mutex<BTreeSet<ElementId>>,
}

impl OpenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, element: &ElementId) -> bool {
        self.inner.lock().contains(element)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Copy of the current members
    pub fn members(&self) -> Vec<ElementId> {
        self.inner.lock().iter().cloned().collect()
    }

    fn insert(&self, element: &ElementId) -> bool {
        self.inner.lock().insert(element.clone())
    }

    fn remove(&self, element: &ElementId) -> bool {
        self.inner.lock().remove(element)
    }
}

/// Collaborators shared by every session of one engine
pub(crate) struct Services {
    pub dispatcher: Dispatcher,
    pub writer: Arc<dyn FieldWriter>,
    pub emitter: Arc<dyn EventEmitter>,
    pub open: Arc<OpenSet>,
    pub visible_rows: usize,
    /// Runtime the engine was built on; sync entry points spawn through it
    pub runtime: Handle,
}

/// Work left over once the session lock is released
#[derive(Default)]
struct Effects {
    events: Vec<EventKind>,
    pick: Option<ResultRow>,
}

struct SessionState {
    machine: SelectionMachine,
    panel: Option<Panel>,
    text: String,
    /// Label written into the anchor by the last pick
    committed_label: Option<String>,
    debounce: Option<JoinHandle<()>>,
    bound: bool,
}

/// Runtime state of one binding
pub struct Session {
    element: ElementId,
    config: BindingConfig,
    serial: u64,
    services: Arc<Services>,
    lifetime: CancellationToken,
    slot: QuerySlot,
    state: Mutex<SessionState>,
}

impl Session {
    pub(crate) fn new(
        element: ElementId,
        config: BindingConfig,
        serial: u64,
        services: Arc<Services>,
    ) -> Self {
        let lifetime = CancellationToken::new();
        let min_chars = config.min_chars;
        Self {
            element,
            config,
            serial,
            services,
            slot: QuerySlot::new(lifetime.clone()),
            lifetime,
            state: Mutex::new(SessionState {
                machine: SelectionMachine::new(min_chars),
                panel: None,
                text: String::new(),
                committed_label: None,
                debounce: None,
                bound: true,
            }),
        }
    }

    pub fn element(&self) -> &ElementId {
        &self.element
    }

    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().machine.is_open()
    }

    pub fn is_bound(&self) -> bool {
        self.state.lock().bound
    }

    /// Current text of the anchor as last reported
    pub fn text(&self) -> String {
        self.state.lock().text.clone()
    }

    pub fn snapshot(&self) -> Option<PanelSnapshot> {
        self.state.lock().panel.as_ref().map(Panel::snapshot)
    }

    pub fn panel_html(&self) -> Option<String> {
        self.state.lock().panel.as_ref().map(Panel::to_html)
    }

    /// Anchor text changed
    pub fn on_input(self: &Arc<Self>, text: &str) {
        let mut fx = Effects::default();
        {
            let mut state = self.state.lock();
            if !state.bound {
                return;
            }
            state.text = text.to_string();

            // Echo of our own write-back
            if state.committed_label.as_deref() == Some(text) {
                return;
            }
            state.committed_label = None;

            match state.machine.on_text_changed(text) {
                Command::ScheduleQuery => self.schedule(&mut state),
                command => {
                    // Too short: nothing pending may reopen the panel
                    cancel_debounce(&mut state);
                    self.slot.cancel();
                    self.apply(&mut state, command, &mut fx);
                }
            }
        }
        self.finish(fx);
    }

    /// Key pressed in the anchor; returns whether the engine consumed it
    pub fn on_key(self: &Arc<Self>, key: Key) -> bool {
        let mut fx = Effects::default();
        {
            let mut state = self.state.lock();
            if !state.bound {
                return false;
            }
            let text = state.text.clone();
            match state.machine.on_key(key, &text) {
                Command::None => return false,
                Command::QueryAndPickFirst => {
                    cancel_debounce(&mut state);
                    let ticket = self.slot.begin();
                    let session = Arc::clone(self);
                    self.services
                        .runtime
                        .spawn(async move { session.run_query(text, ticket, true).await });
                }
                command => self.apply(&mut state, command, &mut fx),
            }
        }
        self.finish(fx);
        true
    }

    /// Pointer-down on one of this binding's panel rows
    pub fn on_row_pointer(self: &Arc<Self>, index: usize) {
        let mut fx = Effects::default();
        {
            let mut state = self.state.lock();
            if !state.bound {
                return;
            }
            let command = state.machine.on_row_pointer(index);
            self.apply(&mut state, command, &mut fx);
        }
        self.finish(fx);
    }

    /// Close without committing (outside click)
    pub fn close(&self) {
        let mut fx = Effects::default();
        {
            let mut state = self.state.lock();
            let command = state.machine.close();
            self.apply(&mut state, command, &mut fx);
        }
        self.finish(fx);
    }

    /// Tear down: cancel pending work, detach the panel, leave the open set
    pub fn teardown(&self) {
        self.lifetime.cancel();
        let was_open = {
            let mut state = self.state.lock();
            if !state.bound {
                return;
            }
            state.bound = false;
            cancel_debounce(&mut state);
            state.machine.close();
            if let Some(mut panel) = state.panel.take() {
                panel.detach();
            }
            self.services.open.remove(&self.element)
        };
        if was_open {
            self.services.emitter.emit(EventKind::PanelClosed {
                element: self.element.clone(),
            });
        }
    }

    /// Restart the debounce timer
    ///
    /// Only the wait is aborted by the next keystroke. A search that already
    /// started keeps running until the next one begins and supersedes it
    /// through the query slot.
    fn schedule(self: &Arc<Self>, state: &mut SessionState) {
        cancel_debounce(state);
        let session = Arc::clone(self);
        let text = state.text.clone();
        let delay = self.config.debounce;
        let runtime = self.services.runtime.clone();
        state.debounce = Some(self.services.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let ticket = session.slot.begin();
            runtime.spawn(async move { session.run_query(text, ticket, false).await });
        }));
    }

    async fn run_query(self: Arc<Self>, text: String, ticket: QueryTicket, pick_first: bool) {
        let outcome = self
            .services
            .dispatcher
            .query(&self.element, &self.config, &text, &ticket)
            .await;

        let mut fx = Effects::default();
        {
            let mut state = self.state.lock();
            if !state.bound || !self.slot.is_current(&ticket) {
                debug!(element = %self.element, "Discarding superseded results");
                return;
            }
            let command = match outcome {
                QueryOutcome::Cancelled => return,
                QueryOutcome::TooShort => state.machine.on_too_short(),
                outcome => {
                    let rows = outcome.rows();
                    if !pick_first {
                        state.machine.on_results(rows)
                    } else if rows.is_empty() {
                        // Nothing to pick; the panel stays closed
                        state.machine.close()
                    } else {
                        let first = rows[0].clone();
                        state.machine.on_results(rows);
                        state.machine.close();
                        Command::Pick(first)
                    }
                }
            };
            self.apply(&mut state, command, &mut fx);
        }
        self.finish(fx);
    }

    /// Carry out a machine command on the panel
    ///
    /// Events and picks are queued in `fx` for [`Session::finish`].
    fn apply(&self, state: &mut SessionState, command: Command, fx: &mut Effects) {
        match command {
            Command::None | Command::ScheduleQuery | Command::QueryAndPickFirst => {}
            Command::Render { active } => {
                let rows = Arc::clone(state.machine.rows());
                let panel = state.panel.get_or_insert_with(|| {
                    Panel::new(
                        self.element.clone(),
                        self.serial,
                        self.services.visible_rows,
                    )
                });
                panel.render(&rows, self.config.formatter.as_ref());
                panel.highlight(active);
                if self.services.open.insert(&self.element) {
                    fx.events.push(EventKind::PanelOpened {
                        element: self.element.clone(),
                        rows: rows.len(),
                    });
                }
            }
            Command::Highlight(index) => {
                if let Some(panel) = state.panel.as_mut() {
                    panel.highlight(Some(index));
                }
            }
            Command::Close => self.hide_panel(state, fx),
            Command::Pick(row) => {
                self.hide_panel(state, fx);
                if !self.config.write_back_only {
                    let label = row.label();
                    state.text = label.clone();
                    state.committed_label = Some(label);
                }
                fx.pick = Some(row);
            }
        }
    }

    fn hide_panel(&self, state: &mut SessionState, fx: &mut Effects) {
        if let Some(panel) = state.panel.as_mut() {
            panel.close();
        }
        if self.services.open.remove(&self.element) {
            fx.events.push(EventKind::PanelClosed {
                element: self.element.clone(),
            });
        }
    }

    /// Emit queued events, then commit the pick; the lock must be released
    fn finish(&self, fx: Effects) {
        for event in fx.events {
            self.services.emitter.emit(event);
        }
        if let Some(row) = fx.pick {
            self.commit(&row);
        }
    }

    /// Write-back, anchor label, pick handler, selection notification
    fn commit(&self, row: &ResultRow) {
        let writer = &self.services.writer;
        for rule in &self.config.fills {
            let value = row.field_value(&rule.field).unwrap_or_default();
            writer.write(&rule.target, &value);
        }
        if !self.config.write_back_only {
            writer.write(self.element.as_str(), &row.label());
        }
        if let Some(on_pick) = &self.config.on_pick {
            on_pick(&self.element, row);
        }
        self.services.emitter.emit(EventKind::Selected {
            element: self.element.clone(),
            row: row.clone(),
        });
        debug!(element = %self.element, id = ?row.id(), "Lookup row picked");
    }
}

fn cancel_debounce(state: &mut SessionState) {
    if let Some(handle) = state.debounce.take() {
        handle.abort();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}
