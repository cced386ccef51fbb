// File: src/router/events.rs
// Purpose: Lifecycle notifications emitted by the router

use std::sync::Arc;

use crate::{ActiveStates, Params};

/// Synchronous observer of published snapshots
pub type Observer = Arc<dyn Fn(&ActiveStates) + Send + Sync>;

/// Lifecycle notification, broadcast to every `Router::events` receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterEvent {
    /// An activation is about to start
    Activating { state: String, params: Params },
    /// A new snapshot was published
    Activated { state: String, params: Params },
    /// An initializer failed; the previous snapshot is kept
    Rejected {
        state: String,
        params: Params,
        reason: String,
    },
    /// A previously active state left the active set
    Destroyed { state: String },
}

impl RouterEvent {
    /// Name of the state the event is about
    pub fn state(&self) -> &str {
        match self {
            RouterEvent::Activating { state, .. }
            | RouterEvent::Activated { state, .. }
            | RouterEvent::Rejected { state, .. }
            | RouterEvent::Destroyed { state } => state,
        }
    }
}
