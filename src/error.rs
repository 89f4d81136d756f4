// The #[error] attribute from thiserror uses struct fields via string interpolation,
// but Rust's unused_assignments lint doesn't recognize this.
#![allow(unused_assignments)]

//! Lookup Error Types with Error Codes
//!
//! Error code ranges:
//! - LOOKUP-000-009: Configuration errors
//! - LOOKUP-010-019: Binding errors (markup / bind-time)
//! - LOOKUP-020-029: Search errors (transport, status, body, timeout)
//!
//! Cancellation and "query too short" are not errors: they surface as
//! [`QueryOutcome`](crate::dispatch::QueryOutcome) variants instead.

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LookupError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Implements both `thiserror::Error` for std error compatibility
/// and `miette::Diagnostic` for terminal error display.
#[derive(Error, Debug, Clone, Diagnostic, PartialEq)]
pub enum LookupError {
    // ═══════════════════════════════════════════
    // CONFIGURATION ERRORS (000-009)
    // ═══════════════════════════════════════════
    #[error("[LOOKUP-001] Configuration error: {reason}")]
    #[diagnostic(
        code(lookup::config_error),
        help("Check ~/.config/lookup/config.toml for syntax errors")
    )]
    ConfigError { reason: String },

    #[error("[LOOKUP-002] Invalid base URL '{url}': {reason}")]
    #[diagnostic(
        code(lookup::invalid_base_url),
        help("Use an absolute URL such as https://erp.example.com")
    )]
    InvalidBaseUrl { url: String, reason: String },

    // ═══════════════════════════════════════════
    // BINDING ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[LOOKUP-010] Element '{element}' declares a lookup without an entity")]
    #[diagnostic(
        code(lookup::missing_entity),
        help("Add data-lookup=\"<entity>\" to the element")
    )]
    MissingEntity { element: String },

    #[error("[LOOKUP-011] Element '{element}' has invalid {attribute}='{value}'")]
    #[diagnostic(
        code(lookup::invalid_attribute),
        help("Numeric lookup attributes must be non-negative integers")
    )]
    InvalidAttribute {
        element: String,
        attribute: String,
        value: String,
    },

    // ═══════════════════════════════════════════
    // SEARCH ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[LOOKUP-020] Search request to {url} failed: {reason}")]
    #[diagnostic(code(lookup::transport))]
    Transport { url: String, reason: String },

    #[error("[LOOKUP-021] Search endpoint {url} answered HTTP {status}")]
    #[diagnostic(code(lookup::http_status))]
    HttpStatus { url: String, status: u16 },

    #[error("[LOOKUP-022] Search endpoint {url} returned a malformed body: {details}")]
    #[diagnostic(code(lookup::malformed_body))]
    MalformedBody { url: String, details: String },

    #[error("[LOOKUP-023] Search request to {url} timed out after {timeout_ms}ms")]
    #[diagnostic(code(lookup::timeout))]
    Timeout { url: String, timeout_ms: u64 },
}

impl LookupError {
    /// Get the error code (e.g., "LOOKUP-001")
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError { .. } => "LOOKUP-001",
            Self::InvalidBaseUrl { .. } => "LOOKUP-002",
            Self::MissingEntity { .. } => "LOOKUP-010",
            Self::InvalidAttribute { .. } => "LOOKUP-011",
            Self::Transport { .. } => "LOOKUP-020",
            Self::HttpStatus { .. } => "LOOKUP-021",
            Self::MalformedBody { .. } => "LOOKUP-022",
            Self::Timeout { .. } => "LOOKUP-023",
        }
    }

    /// Transient search failures: the cache entry is dropped and the next
    /// keystroke retries.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::HttpStatus { .. }
                | Self::MalformedBody { .. }
                | Self::Timeout { .. }
        )
    }
}

impl FixSuggestion for LookupError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            LookupError::ConfigError { .. } => {
                Some("Check ~/.config/lookup/config.toml for syntax errors")
            }
            LookupError::InvalidBaseUrl { .. } => {
                Some("Set LOOKUP_BASE_URL or base_url to an absolute http(s) URL")
            }
            LookupError::MissingEntity { .. } => {
                Some("Add data-lookup=\"<entity>\" to the element")
            }
            LookupError::InvalidAttribute { .. } => {
                Some("Use plain integers for data-lookup-min, -debounce and -limit")
            }
            LookupError::Transport { .. } => Some("Check the search endpoint is reachable"),
            LookupError::HttpStatus { .. } => Some("Check the search endpoint path and auth"),
            LookupError::MalformedBody { .. } => {
                Some("Endpoint must return a JSON array or {\"items\": [...]}")
            }
            LookupError::Timeout { .. } => {
                Some("Increase search_timeout_ms or speed up the endpoint")
            }
        }
    }
}
