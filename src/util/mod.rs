//! Utilities Module - shared infrastructure
//!
//! - `constants`: Centralized timeouts, limits and engine defaults

pub mod constants;

pub use constants::{
    CONNECT_TIMEOUT, DEFAULT_CACHE_CAPACITY, DEFAULT_DEBOUNCE, DEFAULT_LIMIT, DEFAULT_MIN_CHARS,
    SEARCH_TIMEOUT,
};
