// File: src/snapshot.rs
// Purpose: The published record of active states

use std::collections::HashMap;
use std::sync::Arc;

use crate::{Params, State};

/// Which states are active, and with which params
///
/// Built completely during activation and then published as an
/// `Arc<ActiveStates>`; never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct ActiveStates {
    params: Params,
    current: Option<Arc<State>>,
    states: HashMap<String, Arc<State>>,
}

impl ActiveStates {
    /// Empty snapshot carrying the incoming params
    pub(crate) fn seed(params: Params) -> Self {
        Self {
            params,
            current: None,
            states: HashMap::new(),
        }
    }

    /// Records `state` as the new deepest state
    pub(crate) fn push(&mut self, state: Arc<State>) {
        self.states.insert(state.name().to_string(), state.clone());
        self.current = Some(state);
    }

    /// Params used for this activation
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The leaf state
    pub fn current(&self) -> Option<&Arc<State>> {
        self.current.as_ref()
    }

    pub fn states(&self) -> &HashMap<String, Arc<State>> {
        &self.states
    }

    pub fn get(&self, name: &str) -> Option<&Arc<State>> {
        self.states.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Whether this snapshot holds this exact instance
    pub fn holds(&self, state: &Arc<State>) -> bool {
        self.states
            .get(state.name())
            .map_or(false, |held| Arc::ptr_eq(held, state))
    }

    /// Destroys every instance not also held by `kept`
    ///
    /// Returns the names of the destroyed states.
    pub(crate) fn release_unless_held(&self, kept: &ActiveStates) -> Vec<String> {
        self.states
            .values()
            .filter(|state| !state.is_destroyed() && !kept.holds(state))
            .map(|state| {
                state.destroy();
                state.name().to_string()
            })
            .collect()
    }
}
