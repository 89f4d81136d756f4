//! Lookup - typeahead / autocomplete engine for data-entry pages
//!
//! Binds search-as-you-type behavior to input elements: debounced remote
//! search, a shared de-duplicating result cache, a keyboard and pointer
//! driven suggestion panel, and write-back of the picked record into
//! related fields.
//!
//! ## Module Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         PUBLIC API                           │
//! │  binder/    Lookup: bind, unbind, scan, input routing        │
//! │  watcher/   StructureWatcher: removed/inserted markup        │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      APPLICATION LAYER                       │
//! │  registry/  element → session, open set, outside click       │
//! │  session/   per-binding runtime (debounce, apply, commit)    │
//! │  select/    selection state machine (pure)                   │
//! │  panel/     suggestion panel model + HTML                    │
//! │  dispatch/  cache, dedup, cancellation, timeout, backends    │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    INFRASTRUCTURE LAYER                      │
//! │  cache/     bounded LRU of Ready / Pending entries           │
//! │  entity/    alias table, search paths                        │
//! │  row/       result records, response parsing                 │
//! │  markup/    data-lookup-* attribute contract                 │
//! │  page/      host seam: ElementId, FieldWriter, HitTarget     │
//! │  event/     lifecycle events (EventLog, EventKind)           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`binder`] | Public [`Lookup`] engine and its builder |
//! | [`registry`] | Page-wide binding ownership (DashMap) |
//! | [`session`] | One binding's live state |
//! | [`select`] | Closed / Open{active} transitions |
//! | [`panel`] | Rows, highlight, scroll window, ARIA |
//! | [`dispatch`] | Query path: pool, cache, shared fetch, HTTP |
//! | [`cache`] | LRU cache with in-flight entries |
//! | [`error`] | Error types with fix suggestions |

// ═══════════════════════════════════════════════════════════════
// DOMAIN MODEL
// ═══════════════════════════════════════════════════════════════
pub mod binding;
pub mod entity;
pub mod markup;
pub mod page;
pub mod row;

// ═══════════════════════════════════════════════════════════════
// APPLICATION LAYER
// ═══════════════════════════════════════════════════════════════
pub mod binder;
pub mod dispatch;
pub mod panel;
pub mod registry;
pub mod select;
pub mod session;
pub mod watcher;

// ═══════════════════════════════════════════════════════════════
// INFRASTRUCTURE LAYER
// ═══════════════════════════════════════════════════════════════
pub mod cache;
pub mod event;
pub mod util;

// ═══════════════════════════════════════════════════════════════
// CROSS-CUTTING
// ═══════════════════════════════════════════════════════════════
pub mod config;
pub mod error;

// ═══════════════════════════════════════════════════════════════
// PUBLIC API RE-EXPORTS
// ═══════════════════════════════════════════════════════════════

// Error types
pub use error::{FixSuggestion, LookupError, Result};

// Config types
pub use config::{BindingDefaults, EngineConfig};

// Engine
pub use binder::{BindOutcome, Lookup, LookupBuilder, ScanReport};
pub use binding::{BindingSpec, FillRole, PickHandler};
pub use markup::ElementDescriptor;
pub use watcher::{StructureChange, StructureWatcher};

// Host seam
pub use page::{ElementId, FieldWriter, HitTarget, NullWriter, RecordingWriter};
pub use panel::{PanelSnapshot, RenderedRow, RowFormatter};
pub use row::ResultRow;
pub use select::Key;

// Backends
pub use dispatch::{HttpBackend, MockBackend, MockResponse, SearchBackend};

// Events
pub use event::{EventEmitter, EventKind, EventLog, LookupEvent, NoopEmitter};
