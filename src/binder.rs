//! # Binder
//!
//! [`Lookup`] is the public face of the engine: bind and unbind anchors,
//! route page input (text, keys, pointer-down) to the right binding, scan
//! annotated markup and run raw searches.
//!
//! Nothing here returns a network error. Configuration problems are reported
//! through [`BindOutcome::Rejected`] and logged once per element.

use std::sync::Arc;

use dashmap::DashSet;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::binding::{BindingConfig, BindingSpec};
use crate::cache::{CacheStats, LookupCache};
use crate::config::EngineConfig;
use crate::dispatch::{Dispatcher, HttpBackend, SearchBackend};
use crate::entity::EntityResolver;
use crate::error::{LookupError, Result};
use crate::event::{EventEmitter, EventKind, NoopEmitter};
use crate::markup::ElementDescriptor;
use crate::page::{ElementId, FieldWriter, HitTarget, NullWriter};
use crate::panel::PanelSnapshot;
use crate::registry::Registry;
use crate::row::ResultRow;
use crate::select::Key;
use crate::session::{Services, Session};
use crate::util::constants::PANEL_VISIBLE_ROWS;

/// Result of [`Lookup::bind`]
#[derive(Debug, Clone, PartialEq)]
pub enum BindOutcome {
    Bound,
    /// Element already had a binding; nothing changed
    AlreadyBound,
    /// Configuration error; no binding was created
    Rejected(LookupError),
}

impl BindOutcome {
    pub fn is_bound(&self) -> bool {
        matches!(self, BindOutcome::Bound)
    }
}

/// What a markup scan did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub bound: Vec<ElementId>,
    pub already_bound: Vec<ElementId>,
    pub rejected: Vec<(ElementId, LookupError)>,
    /// Elements without the opt-in attribute
    pub skipped: usize,
}

/// Fluent construction of a [`Lookup`]
pub struct LookupBuilder {
    config: EngineConfig,
    writer: Arc<dyn FieldWriter>,
    backend: Option<Arc<dyn SearchBackend>>,
    emitter: Arc<dyn EventEmitter>,
    visible_rows: usize,
}

impl LookupBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            writer: Arc::new(NullWriter),
            backend: None,
            emitter: Arc::new(NoopEmitter),
            visible_rows: PANEL_VISIBLE_ROWS,
        }
    }

    pub fn writer(mut self, writer: Arc<dyn FieldWriter>) -> Self {
        self.writer = writer;
        self
    }

    /// Replace the HTTP backend (tests, offline hosts)
    pub fn backend(mut self, backend: Arc<dyn SearchBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Rows visible in a panel before it scrolls
    pub fn visible_rows(mut self, rows: usize) -> Self {
        self.visible_rows = rows.max(1);
        self
    }

    /// Must be called inside a tokio runtime; the engine keeps a handle to
    /// it, so later calls work from any thread.
    pub fn build(self) -> Result<Lookup> {
        self.config.validate()?;
        let runtime = Handle::try_current().map_err(|_| LookupError::ConfigError {
            reason: "no tokio runtime; build the lookup engine inside a runtime".to_string(),
        })?;
        let backend = match self.backend {
            Some(backend) => backend,
            None => Arc::new(HttpBackend::new(&self.config)?),
        };
        let resolver = Arc::new(EntityResolver::new(&self.config)?);
        let cache = Arc::new(LookupCache::new(self.config.cache_capacity));
        let dispatcher = Dispatcher::new(
            cache,
            backend,
            resolver,
            self.config.search_timeout(),
            Arc::clone(&self.emitter),
        );
        let registry = Registry::new();
        let services = Arc::new(Services {
            dispatcher,
            writer: self.writer,
            emitter: self.emitter,
            open: Arc::clone(registry.open_set()),
            visible_rows: self.visible_rows,
            runtime,
        });

        Ok(Lookup {
            inner: Arc::new(LookupInner {
                config: self.config,
                registry,
                services,
                warned: DashSet::new(),
            }),
        })
    }
}

struct LookupInner {
    config: EngineConfig,
    registry: Registry,
    services: Arc<Services>,
    /// Elements whose rejection was already logged
    warned: DashSet<ElementId>,
}

/// Page-wide lookup engine; cheap to clone
#[derive(Clone)]
pub struct Lookup {
    inner: Arc<LookupInner>,
}

impl std::fmt::Debug for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lookup")
            .field("registry", &self.inner.registry)
            .field("cache", self.inner.services.dispatcher.cache())
            .finish()
    }
}

impl Lookup {
    /// Engine over the HTTP backend
    pub fn new(config: EngineConfig, writer: Arc<dyn FieldWriter>) -> Result<Self> {
        Self::builder(config).writer(writer).build()
    }

    pub fn builder(config: EngineConfig) -> LookupBuilder {
        LookupBuilder::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.inner.services.runtime
    }

    fn dispatcher(&self) -> &Dispatcher {
        &self.inner.services.dispatcher
    }

    fn session(&self, element: &ElementId) -> Option<Arc<Session>> {
        self.inner.registry.get(element)
    }

    // ═══════════════════════════════════════════
    // BINDING LIFECYCLE
    // ═══════════════════════════════════════════

    /// Attach lookup behavior to an element; idempotent
    pub fn bind(&self, element: impl Into<ElementId>, spec: BindingSpec) -> BindOutcome {
        let element = element.into();
        if self.inner.registry.contains(&element) {
            return BindOutcome::AlreadyBound;
        }

        let config = match BindingConfig::resolve(
            &element,
            spec,
            &self.inner.config.defaults,
            self.dispatcher().resolver(),
        ) {
            Ok(config) => config,
            Err(err) => return self.reject(element, err),
        };
        let entity = config.entity.clone();

        let services = Arc::clone(&self.inner.services);
        let created = self.inner.registry.insert_with(&element, |serial| {
            Session::new(element.clone(), config, serial, services)
        });
        if !created {
            return BindOutcome::AlreadyBound;
        }

        self.inner.warned.remove(&element);
        debug!(element = %element, entity = %entity, "Lookup bound");
        self.inner
            .services
            .emitter
            .emit(EventKind::BindingCreated { element, entity });
        BindOutcome::Bound
    }

    fn reject(&self, element: ElementId, err: LookupError) -> BindOutcome {
        if self.inner.warned.insert(element.clone()) {
            warn!(element = %element, code = err.code(), error = %err, "Lookup binding rejected");
        }
        BindOutcome::Rejected(err)
    }

    /// Detach lookup behavior; returns whether the element was bound
    ///
    /// In-flight searches are cancelled and the panel is removed.
    pub fn unbind(&self, element: &ElementId) -> bool {
        let Some(session) = self.inner.registry.remove(element) else {
            return false;
        };
        session.teardown();
        debug!(element = %element, "Lookup unbound");
        self.inner.services.emitter.emit(EventKind::BindingRemoved {
            element: element.clone(),
        });
        true
    }

    /// Clean up bindings whose elements left the page
    pub fn elements_removed(&self, elements: &[ElementId]) -> usize {
        elements.iter().filter(|e| self.unbind(e)).count()
    }

    /// Bind every annotated, not-yet-bound element
    pub fn scan(&self, elements: &[ElementDescriptor]) -> ScanReport {
        let mut report = ScanReport::default();
        for element in elements {
            if !element.is_annotated() {
                report.skipped += 1;
                continue;
            }
            if self.is_bound(&element.id) {
                report.already_bound.push(element.id.clone());
                continue;
            }
            let outcome = match element.to_spec() {
                Ok(spec) => self.bind(element.id.clone(), spec),
                Err(err) => self.reject(element.id.clone(), err),
            };
            match outcome {
                BindOutcome::Bound => report.bound.push(element.id.clone()),
                BindOutcome::AlreadyBound => report.already_bound.push(element.id.clone()),
                BindOutcome::Rejected(err) => report.rejected.push((element.id.clone(), err)),
            }
        }
        report
    }

    /// Scan again after new markup was inserted
    pub fn rescan(&self, elements: &[ElementDescriptor]) -> ScanReport {
        self.scan(elements)
    }

    // ═══════════════════════════════════════════
    // INPUT ROUTING
    // ═══════════════════════════════════════════

    /// Anchor text changed; returns whether the element is bound
    pub fn input(&self, element: &ElementId, text: &str) -> bool {
        match self.session(element) {
            Some(session) => {
                session.on_input(text);
                true
            }
            None => false,
        }
    }

    /// Key pressed in an anchor; returns whether the engine consumed it
    pub fn key(&self, element: &ElementId, key: Key) -> bool {
        self.session(element).is_some_and(|s| s.on_key(key))
    }

    /// Page-wide pointer-down
    pub fn pointer_down(&self, hit: HitTarget) {
        self.inner.registry.pointer_down(&hit);
    }

    // ═══════════════════════════════════════════
    // RAW SEARCH
    // ═══════════════════════════════════════════

    /// Search without a binding; failures yield no rows
    pub async fn fetch_only(
        &self,
        entity: &str,
        text: &str,
        limit: usize,
        endpoint: Option<&str>,
    ) -> Vec<ResultRow> {
        self.dispatcher()
            .fetch_only(entity, text, limit, endpoint)
            .await
            .rows()
            .to_vec()
    }

    // ═══════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════

    pub fn is_bound(&self, element: &ElementId) -> bool {
        self.inner.registry.contains(element)
    }

    pub fn bound_elements(&self) -> Vec<ElementId> {
        self.inner.registry.elements()
    }

    /// Panel state of a binding (None if unbound or never shown)
    pub fn panel(&self, element: &ElementId) -> Option<PanelSnapshot> {
        self.session(element).and_then(|s| s.snapshot())
    }

    /// Panel markup of a binding
    pub fn panel_html(&self, element: &ElementId) -> Option<String> {
        self.session(element).and_then(|s| s.panel_html())
    }

    pub fn is_open(&self, element: &ElementId) -> bool {
        self.inner.registry.open_set().contains(element)
    }

    pub fn open_count(&self) -> usize {
        self.inner.registry.open_set().len()
    }

    /// Last text reported for an anchor (including picked labels)
    pub fn text(&self, element: &ElementId) -> Option<String> {
        self.session(element).map(|s| s.text())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.dispatcher().cache().stats()
    }

    pub fn cache(&self) -> &Arc<LookupCache> {
        self.dispatcher().cache()
    }

    pub fn listener_installs(&self) -> usize {
        self.inner.registry.listener_installs()
    }
}
