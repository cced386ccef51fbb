// File: src/definition/init.rs
// Purpose: User-supplied state initializers

use futures::future::{self, BoxFuture, FutureExt, Ready};
use serde_json::Value;
use std::future::Future;

use crate::{ActivationError, Params, StateData};

/// Result of running an initializer: the data the new state will carry.
pub type InitResult = Result<StateData, ActivationError>;

/// Builds the payload of a freshly created state
///
/// Implemented for any `Fn(Init) -> impl Future<Output = InitResult>`, so
/// plain async closures can be registered directly:
///
/// ```
/// use state_router::{Init, Router};
///
/// let router = Router::new();
/// router
///     .state("app", "/app", |mut init: Init| async move {
///         init.set("title", "Dashboard");
///         init.finish()
///     })
///     .unwrap();
/// ```
pub trait Initializer: Send + Sync + 'static {
    fn init(&self, init: Init) -> BoxFuture<'static, InitResult>;
}

impl<F, Fut> Initializer for F
where
    F: Fn(Init) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = InitResult> + Send + 'static,
{
    fn init(&self, init: Init) -> BoxFuture<'static, InitResult> {
        self(init).boxed()
    }
}

/// Initializer that keeps whatever the parent state established
pub fn inherit(init: Init) -> Ready<InitResult> {
    future::ready(init.finish())
}

/// Input handed to an initializer
///
/// `data` starts as a copy of the immediate parent state's data; changes
/// here never reach the parent.
#[derive(Debug)]
pub struct Init {
    name: String,
    args: Vec<Option<String>>,
    params: Params,
    data: StateData,
}

impl Init {
    pub(crate) fn new(
        name: &str,
        args: Vec<Option<String>>,
        params: Params,
        data: StateData,
    ) -> Self {
        Self {
            name: name.to_string(),
            args,
            params,
            data,
        }
    }

    /// Name of the state being created
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Positional parameters, in the definition's declared order
    pub fn args(&self) -> &[Option<String>] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).and_then(|a| a.as_deref())
    }

    /// The full parameter mapping of this activation
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn data(&self) -> &StateData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut StateData {
        &mut self.data
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Builds a redirect signal, to be returned as the initializer's error
    pub fn redirect(&self, name: impl Into<String>, params: Params) -> ActivationError {
        ActivationError::redirect(name, params)
    }

    /// Completes the initializer with the current data
    pub fn finish(self) -> InitResult {
        Ok(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;
    use serde_json::json;

    fn sample() -> Init {
        let mut inherited = StateData::new();
        inherited.insert("user".to_string(), json!("ada"));
        Init::new(
            "app.users",
            vec![Some("7".to_string()), None],
            params! { "id" => 7 },
            inherited,
        )
    }

    #[test]
    fn test_accessors() {
        let init = sample();
        assert_eq!(init.name(), "app.users");
        assert_eq!(init.arg(0), Some("7"));
        assert_eq!(init.arg(1), None);
        assert_eq!(init.arg(5), None);
        assert_eq!(init.param("id"), Some("7"));
        assert_eq!(init.get("user"), Some(&json!("ada")));
    }

    #[test]
    fn test_set_and_finish() {
        let mut init = sample();
        init.set("count", 3);
        let data = init.finish().unwrap();
        assert_eq!(data.get("count"), Some(&json!(3)));
        assert_eq!(data.get("user"), Some(&json!("ada")));
    }

    #[tokio::test]
    async fn test_closure_initializer() {
        let initializer = |mut init: Init| async move {
            init.set("ready", true);
            init.finish()
        };
        let data = Initializer::init(&initializer, sample()).await.unwrap();
        assert_eq!(data.get("ready"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_inherit_keeps_parent_data() {
        let data = Initializer::init(&inherit, sample()).await.unwrap();
        assert_eq!(data.get("user"), Some(&json!("ada")));
        assert_eq!(data.len(), 1);
    }
}
