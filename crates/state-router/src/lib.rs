//! # State Router
//!
//! A hierarchical, url-driven state router for single-page applications:
//! - Nested states named by dots (`app`, `app.users`, `app.users.profile`)
//! - Url templates with `:param` placeholders, concatenated parent to child
//! - Parent-first asynchronous activation
//! - Reuse of every state whose own parameters did not change
//! - Redirects from initializers, and a default state for unmatched urls
//! - Virtual states that group children without a url of their own
//!
//! ## Activation
//!
//! Navigating to `app.users.profile` activates `app`, then `app.users`, then
//! `app.users.profile`. A level whose declared params are unchanged keeps
//! its existing [`State`] instance; otherwise its initializer builds a new one
//! starting from a copy of the parent's data. The finished [`ActiveStates`]
//! snapshot is published in one step, and the states it no longer holds are
//! destroyed.
//!
//! Only one activation runs at a time. A navigation requested meanwhile is
//! deferred; the latest one wins once the running activation settles.
//!
//! ## Example
//!
//! ```
//! use state_router::{inherit, params, Init, Router};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let router = Router::new();
//! router
//!     .state("app", "/app", |mut init: Init| async move {
//!         init.set("title", "Inbox");
//!         init.finish()
//!     })?
//!     .state("app.message", "/messages/:id", inherit)?;
//!
//! let message = router.set_url("/app/messages/42").await?.unwrap();
//! assert_eq!(message.param("id"), Some("42"));
//! assert_eq!(message.get_as::<String>("title").as_deref(), Some("Inbox"));
//!
//! let app = router.active_states().get("app").cloned().unwrap();
//! router.go("app.message", params! { "id" => 43 }).await?;
//! assert!(!app.is_destroyed());
//! # Ok::<_, state_router::RouterError>(())
//! # }).unwrap();
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// ============================================================================
// Module Declarations
// ============================================================================

pub mod config;
pub mod definition;
mod error;
pub mod location;
pub mod path;
mod router;
mod snapshot;
mod state;

pub use config::Config;
pub use definition::{inherit, Init, InitResult, Initializer, StateDefinition};
pub use error::{ActivationError, Redirect, RouterError};
pub use location::{Location, MemoryLocation};
pub use router::{Navigation, Observer, Router, RouterEvent};
pub use snapshot::ActiveStates;
pub use state::State;

// ============================================================================
// Core Types
// ============================================================================

/// Resolved parameters, always string-valued
pub type Params = HashMap<String, String>;

/// Payload a state carries, established by its initializer and ancestors
pub type StateData = serde_json::Map<String, serde_json::Value>;

/// Builds [`Params`] from `key => value` pairs; values use their `Display` form
///
/// ```
/// use state_router::params;
///
/// let params = params! { "id" => 42, "tab" => "info" };
/// assert_eq!(params["id"], "42");
/// assert_eq!(params["tab"], "info");
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::Params::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut params = $crate::Params::new();
        $(
            params.insert(
                ::std::string::ToString::to_string(&$key),
                ::std::string::ToString::to_string(&$value),
            );
        )+
        params
    }};
}

// Router locks are never held across an await, so a poisoned lock only
// means a user hook panicked; the data is still consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
