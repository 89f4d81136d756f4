//! Centralized constants for lookup engine configuration
//!
//! All timeout and limit values in one place for easy tuning.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════
// Search Timeouts
// ═══════════════════════════════════════════════════════════════

/// Hard timeout for one remote search (request dropped, treated as failure)
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(8);

/// Timeout for establishing HTTP connections
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Maximum number of HTTP redirects to follow
pub const REDIRECT_LIMIT: usize = 5;

/// User agent sent with search requests
pub const USER_AGENT: &str = concat!("lookup/", env!("CARGO_PKG_VERSION"));

// ═══════════════════════════════════════════════════════════════
// Binding Defaults
// ═══════════════════════════════════════════════════════════════

/// Minimum characters before a search is issued
pub const DEFAULT_MIN_CHARS: usize = 1;

/// Trailing-edge debounce between the last keystroke and the search
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(160);

/// Rows requested per search
pub const DEFAULT_LIMIT: usize = 50;

/// Distinct queries kept in the result cache
pub const DEFAULT_CACHE_CAPACITY: usize = 200;

/// Rows visible in a panel before it scrolls
pub const PANEL_VISIBLE_ROWS: usize = 8;

/// Label of the disabled row shown when a search returned nothing
pub const NO_MATCHES_LABEL: &str = "No matches";

/// Path prefix for per-entity search endpoints
pub const SEARCH_PATH_PREFIX: &str = "/api/lookup";

// ═══════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_are_positive() {
        assert!(SEARCH_TIMEOUT.as_millis() > 0);
        assert!(CONNECT_TIMEOUT.as_millis() > 0);
    }

    #[test]
    fn connect_timeout_fits_inside_search_timeout() {
        assert!(CONNECT_TIMEOUT < SEARCH_TIMEOUT);
    }

    #[test]
    fn debounce_is_much_shorter_than_timeout() {
        assert!(DEFAULT_DEBOUNCE * 10 < SEARCH_TIMEOUT);
    }

    #[test]
    fn defaults_are_usable() {
        assert!(DEFAULT_LIMIT > 0);
        assert!(DEFAULT_CACHE_CAPACITY >= DEFAULT_LIMIT);
        assert!(PANEL_VISIBLE_ROWS > 0);
    }
}
