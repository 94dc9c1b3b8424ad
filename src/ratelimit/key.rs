//! Counter key derivation.

use std::fmt;

/// Namespace prefix shared by every counter key.
pub const KEY_PREFIX: &str = "rate_limit";

/// Identity of one client's counter within one window.
///
/// Requests from the same identifier in the same window share a key; the next window
/// always gets a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    /// The client identifier
    pub identifier: String,
    /// The window start (epoch seconds, floored to the window boundary)
    pub window_start: u64,
}

impl CounterKey {
    /// Create a new counter key.
    pub fn new(identifier: &str, window_start: u64) -> Self {
        Self {
            identifier: identifier.to_string(),
            window_start,
        }
    }

    /// Convert to the key stored in the counter store.
    /// Format: "rate_limit:{identifier}:{window_start}"
    /// The window is the last segment and purely numeric, so identifiers containing ':'
    /// cannot collide.
    pub fn to_store_key(&self) -> String {
        format!("{}:{}:{}", KEY_PREFIX, self.identifier, self.window_start)
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_store_key())
    }
}
