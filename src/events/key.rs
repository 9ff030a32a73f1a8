//! # Event keys and wildcard-prefix matching.
//!
//! An [`EventKey`] names the topic an event is published under. Keys are
//! immutable string values; equality and ordering are by value.
//!
//! ## Wildcard syntax
//! A single trailing [`WILDCARD`] marker (`>`) turns a key into a prefix
//! subscription: `"fx.eur>"` means `"fx.eur"` and every key sharing that
//! prefix. The root (`"fx.eur"`) is the literal before the marker. Nested or
//! multiple markers are not supported; the root is cut at the first marker
//! and anything after it is ignored.
//!
//! ## Rules
//! - Wildcard keys are valid for **registration only**; publishing requires
//!   a concrete key.
//! - A wildcard matches its own root literal: `"2>"` matches `"2"` and `"22"`.
//! - Tokens are conventionally separated by [`DELIMITER`] (`.`); the routing
//!   core matches on raw prefixes and does not interpret token boundaries.

use std::fmt;
use std::sync::Arc;

/// Marker that turns the preceding literal into a prefix subscription.
pub const WILDCARD: char = '>';

/// Conventional token separator inside key literals.
pub const DELIMITER: char = '.';

/// Immutable topic identifier with string value semantics.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey(Arc<str>);

impl EventKey {
    /// Creates a key from a string value.
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        EventKey(value.into())
    }

    /// Returns the key's string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the key carries the wildcard marker.
    pub fn is_wildcard(&self) -> bool {
        self.0.contains(WILDCARD)
    }

    /// Returns the literal prefix before the wildcard marker, or `None` for
    /// a concrete key.
    ///
    /// # Example
    /// ```
    /// use chronobus::EventKey;
    ///
    /// assert_eq!(EventKey::new("1.2.3.4.>").wildcard_root(), Some("1.2.3.4."));
    /// assert_eq!(EventKey::new("1.2.3.4").wildcard_root(), None);
    /// ```
    pub fn wildcard_root(&self) -> Option<&str> {
        self.0.find(WILDCARD).map(|i| &self.0[..i])
    }

    /// Checks whether this key matches `other` under prefix-wildcard semantics.
    ///
    /// Concrete keys match by equality; a wildcard matches any key that
    /// starts with its root (and vice versa); two wildcards match when either
    /// root is a prefix of the other.
    pub fn matches(&self, other: &EventKey) -> bool {
        match (self.wildcard_root(), other.wildcard_root()) {
            (None, None) => self.0 == other.0,
            (Some(root), None) => other.as_str().starts_with(root),
            (None, Some(root)) => self.as_str().starts_with(root),
            (Some(a), Some(b)) => a.starts_with(b) || b.starts_with(a),
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventKey({:?})", &*self.0)
    }
}

impl From<&str> for EventKey {
    fn from(value: &str) -> Self {
        EventKey::new(value)
    }
}

impl From<String> for EventKey {
    fn from(value: String) -> Self {
        EventKey::new(value)
    }
}
