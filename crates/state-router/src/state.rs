// File: src/state.rs
// Purpose: Runtime state instances produced by activation

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::definition::StateDefinition;
use crate::router::{Navigation, WeakRouter};
use crate::{lock, Params, RouterError, StateData};

type DestroyHook = Box<dyn FnOnce(&State) + Send>;

/// A state instance, created when its definition activates
///
/// Instances are shared as `Arc<State>` between consecutive snapshots while
/// their parameters stay unchanged. The router destroys an instance exactly
/// once, when a published snapshot stops holding it.
pub struct State {
    name: String,
    definition: Arc<StateDefinition>,
    params: Params,
    data: StateData,
    router: Mutex<Option<WeakRouter>>,
    on_destroy: Mutex<Vec<DestroyHook>>,
    destroyed: AtomicBool,
}

impl State {
    pub(crate) fn new(
        definition: Arc<StateDefinition>,
        params: Params,
        data: StateData,
        router: WeakRouter,
    ) -> Self {
        Self {
            name: definition.name().to_string(),
            definition,
            params,
            data,
            router: Mutex::new(Some(router)),
            on_destroy: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &Arc<StateDefinition> {
        &self.definition
    }

    /// Parameters of the activation that created this instance
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Data established by this state's initializer and its ancestors
    pub fn data(&self) -> &StateData {
        &self.data
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Reads a data field into a typed value
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Registers a hook run when the state is destroyed
    ///
    /// Runs immediately if the state is already gone.
    pub fn on_destroy<F>(&self, hook: F)
    where
        F: FnOnce(&State) + Send + 'static,
    {
        {
            let mut hooks = lock(&self.on_destroy);
            if !self.destroyed.load(Ordering::SeqCst) {
                hooks.push(Box::new(hook));
                return;
            }
        }
        hook(self);
    }

    /// Navigates the owning router
    pub async fn go(&self, name: &str, params: Params) -> Navigation {
        let router = lock(&self.router)
            .as_ref()
            .and_then(WeakRouter::upgrade)
            .ok_or_else(|| RouterError::Detached(self.name.clone()))?;
        router.go(name, params).await
    }

    pub(crate) fn destroy(&self) {
        // The flag flips under the hook lock so no hook slips in after the take
        let hooks = {
            let mut hooks = lock(&self.on_destroy);
            if self.destroyed.swap(true, Ordering::SeqCst) {
                return;
            }
            std::mem::take(&mut *hooks)
        };

        debug!(state = %self.name, "destroying state");
        for hook in hooks {
            hook(self);
        }

        lock(&self.router).take();
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("data", &self.data)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
