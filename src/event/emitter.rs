//! EventEmitter Trait - abstraction for event emission
//!
//! The host page injects its own emitter to turn `Selected` events into a
//! DOM notification on the anchor; tests inject an [`EventLog`].

use super::log::{EventKind, EventLog};

/// Trait for emitting lookup events
pub trait EventEmitter: Send + Sync {
    /// Emit an event and return its ID
    fn emit(&self, kind: EventKind) -> u64;
}

impl EventEmitter for EventLog {
    fn emit(&self, kind: EventKind) -> u64 {
        EventLog::emit(self, kind)
    }
}

/// No-op emitter (always returns 0, does nothing)
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    pub fn new() -> Self {
        Self
    }
}

impl EventEmitter for NoopEmitter {
    fn emit(&self, _kind: EventKind) -> u64 {
        0
    }
}
