// File: src/location.rs
// Purpose: Contract with the external location (address bar) collaborator

use std::sync::{Arc, Mutex};

use crate::lock;

/// An external, user-visible location such as the browser hash
///
/// The binding that owns the real location forwards its change
/// notifications to `Router::location_changed`; the router writes canonical
/// urls back through `set`.
pub trait Location: Send + Sync {
    /// The raw current location, e.g. `#/users/42?tab=posts`
    fn current(&self) -> String;

    /// Replaces the location with `href`
    fn set(&self, href: &str);
}

/// In-process location keeping a history of every value it held
///
/// Clones share the same history.
#[derive(Debug, Clone, Default)]
pub struct MemoryLocation {
    history: Arc<Mutex<Vec<String>>>,
}

impl MemoryLocation {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            history: Arc::new(Mutex::new(vec![initial.into()])),
        }
    }

    /// Every value held so far, oldest first
    pub fn history(&self) -> Vec<String> {
        lock(&self.history).clone()
    }
}

impl Location for MemoryLocation {
    fn current(&self) -> String {
        lock(&self.history).last().cloned().unwrap_or_default()
    }

    fn set(&self, href: &str) {
        lock(&self.history).push(href.to_string());
    }
}
