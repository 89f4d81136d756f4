//! Global Registry
//!
//! Page-wide ownership: which element is bound to which session, which
//! panels are open, and the single outside-click listener. One registry per
//! [`Lookup`](crate::Lookup) instance.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::page::{ElementId, HitTarget};
use crate::session::{OpenSet, Session};

/// Marker for the page-level pointer-down listener
#[derive(Debug)]
pub struct OutsideClickListener {
    pub installed_at: Instant,
}

pub struct Registry {
    bindings: DashMap<ElementId, Arc<Session>>,
    open: Arc<OpenSet>,
    listener: OnceLock<OutsideClickListener>,
    listener_installs: AtomicUsize,
    serial: AtomicU64,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("bindings", &self.elements())
            .field("open", &self.open)
            .field("listener", &self.listener.get().is_some())
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            bindings: DashMap::new(),
            open: Arc::new(OpenSet::new()),
            listener: OnceLock::new(),
            listener_installs: AtomicUsize::new(0),
            serial: AtomicU64::new(0),
        }
    }

    pub fn open_set(&self) -> &Arc<OpenSet> {
        &self.open
    }

    /// Register a session unless the element is already bound
    ///
    /// `make` receives a fresh serial and only runs when the slot is free.
    /// Returns `false` if a binding already existed.
    pub fn insert_with(&self, element: &ElementId, make: impl FnOnce(u64) -> Session) -> bool {
        match self.bindings.entry(element.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let serial = self.serial.fetch_add(1, Ordering::Relaxed) + 1;
                slot.insert(Arc::new(make(serial)));
                self.install_listener();
                true
            }
        }
    }

    pub fn get(&self, element: &ElementId) -> Option<Arc<Session>> {
        // Clone out so callers never hold a shard lock while running a session
        self.bindings.get(element).map(|s| Arc::clone(s.value()))
    }

    pub fn remove(&self, element: &ElementId) -> Option<Arc<Session>> {
        self.bindings.remove(element).map(|(_, session)| session)
    }

    pub fn contains(&self, element: &ElementId) -> bool {
        self.bindings.contains_key(element)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bound elements, sorted
    pub fn elements(&self) -> Vec<ElementId> {
        let mut elements: Vec<_> = self.bindings.iter().map(|e| e.key().clone()).collect();
        elements.sort();
        elements
    }

    /// Installed once on first bind, never torn down
    fn install_listener(&self) {
        self.listener.get_or_init(|| {
            self.listener_installs.fetch_add(1, Ordering::Relaxed);
            debug!("Outside-click listener installed");
            OutsideClickListener {
                installed_at: Instant::now(),
            }
        });
    }

    pub fn listener(&self) -> Option<&OutsideClickListener> {
        self.listener.get()
    }

    /// How many times the listener was installed (0 or 1)
    pub fn listener_installs(&self) -> usize {
        self.listener_installs.load(Ordering::Relaxed)
    }

    /// Route a page-wide pointer-down
    ///
    /// Every open panel except the one owning the hit closes. A hit on a
    /// panel row is then handed to its owner.
    pub fn pointer_down(&self, hit: &HitTarget) {
        if self.listener.get().is_none() {
            return;
        }
        let owner = hit.owner();
        for element in self.open.members() {
            if Some(&element) == owner {
                continue;
            }
            if let Some(session) = self.get(&element) {
                session.close();
            }
        }

        if let HitTarget::PanelRow { owner, row } = hit {
            if let Some(session) = self.get(owner) {
                session.on_row_pointer(*row);
            }
        }
    }
}
