// File: src/error.rs
// Purpose: Error types for registration, navigation and activation

use crate::Params;
use thiserror::Error;

/// Errors surfaced by the router to its callers.
///
/// Registration errors (`DuplicateState`, `MissingParent`, `InvalidPattern`,
/// `DuplicateParam`) are returned synchronously from `Router::state`.
/// Navigation errors are returned from the `go` / `set_url` futures and leave
/// the published snapshot untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("state '{0}' is already defined")]
    DuplicateState(String),

    #[error("parent state '{parent}' of '{state}' does not exist")]
    MissingParent { state: String, parent: String },

    #[error("invalid url pattern for state '{state}': {reason}")]
    InvalidPattern { state: String, reason: String },

    #[error("parameter '{param}' is declared more than once in the url chain of '{state}'")]
    DuplicateParam { state: String, param: String },

    #[error("no such state {0}")]
    UnknownState(String),

    #[error("no matching state found for '{0}'")]
    NoMatch(String),

    #[error("virtual state '{0}' has no url")]
    VirtualUrl(String),

    #[error("missing parameter '{param}' to build the url of '{state}'")]
    MissingParam { state: String, param: String },

    #[error("redirect limit of {limit} exceeded while activating '{state}'")]
    RedirectLimit { limit: usize, state: String },

    #[error("state '{0}' was destroyed and is no longer attached to a router")]
    Detached(String),

    /// Returned to a navigation requested from inside a running initializer;
    /// the router moves on to that target once the initializer returns.
    #[error("navigation to '{0}' replaces the running activation")]
    Deferred(String),

    #[error("activation was dropped before it settled")]
    Aborted,
}

/// A request to activate another target instead of the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub name: String,
    pub params: Params,
}

/// Outcome of a failed initializer.
///
/// `Redirect` is not a failure from the caller's point of view: the router
/// catches it and navigates to the new target. Anything else rejects the
/// activation.
#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("redirecting to {}", .0.name)]
    Redirect(Redirect),

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl ActivationError {
    pub fn redirect(name: impl Into<String>, params: Params) -> Self {
        ActivationError::Redirect(Redirect {
            name: name.into(),
            params,
        })
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, ActivationError::Redirect(_))
    }
}

impl From<RouterError> for ActivationError {
    fn from(err: RouterError) -> Self {
        ActivationError::Failed(err.into())
    }
}
