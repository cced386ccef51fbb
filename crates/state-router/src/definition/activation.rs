//! Parent-first activation of a definition chain
//!
//! Each level either reuses the instance from the previous snapshot (when
//! every parameter it declares is unchanged) or builds a new one from a
//! copy of its parent's data. A level never starts before the level above
//! it has fully settled.

use std::sync::Arc;
use tracing::debug;

use super::{Init, StateDefinition};
use crate::router::WeakRouter;
use crate::{ActivationError, ActiveStates, Params, State};

/// Root-to-leaf chain ending at `target`
pub(crate) fn lineage(target: &Arc<StateDefinition>) -> Vec<Arc<StateDefinition>> {
    let mut chain = vec![target.clone()];
    let mut current = target.parent().cloned();
    while let Some(def) = current {
        current = def.parent().cloned();
        chain.push(def);
    }
    chain.reverse();
    chain
}

/// Snapshot under construction
///
/// Unless taken with `finish`, dropping it destroys the instances it created.
struct Building<'a> {
    result: ActiveStates,
    previous: &'a ActiveStates,
    finished: bool,
}

impl Building<'_> {
    fn finish(mut self) -> ActiveStates {
        self.finished = true;
        std::mem::take(&mut self.result)
    }
}

impl Drop for Building<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.result.release_unless_held(self.previous);
        }
    }
}

/// Activates `target` and all of its ancestors
///
/// If this fails or is dropped midway, instances created so far are
/// destroyed; instances reused from `previous` are left alone.
pub(crate) async fn activate(
    target: &Arc<StateDefinition>,
    params: &Params,
    previous: &ActiveStates,
    router: &WeakRouter,
) -> Result<ActiveStates, ActivationError> {
    let mut building = Building {
        result: ActiveStates::seed(params.clone()),
        previous,
        finished: false,
    };

    for def in lineage(target) {
        let reusable = previous
            .get(def.name())
            .filter(|_| def.same_params(previous.params(), params))
            .cloned();

        let state = match reusable {
            Some(existing) => {
                debug!(state = def.name(), "reusing active state");
                existing
            }
            None => {
                let inherited = building
                    .result
                    .current()
                    .map(|parent| parent.data().clone())
                    .unwrap_or_default();
                let init = Init::new(def.name(), def.args(params), params.clone(), inherited);

                debug!(state = def.name(), "initializing state");
                let data = def.initializer().init(init).await?;

                Arc::new(State::new(def.clone(), params.clone(), data, router.clone()))
            }
        };

        building.result.push(state);
    }

    Ok(building.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutingConfig;
    use crate::definition::{inherit, Initializer};
    use crate::{params, StateData};
    use serde_json::json;

    fn define<I: Initializer>(
        name: &str,
        url: &str,
        parent: Option<&Arc<StateDefinition>>,
        init: I,
    ) -> Arc<StateDefinition> {
        Arc::new(
            StateDefinition::new(
                name,
                url,
                parent.cloned(),
                false,
                Box::new(init),
                &RoutingConfig::default(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_lineage_is_root_first() {
        let a = define("a", "/a", None, inherit);
        let b = define("a.b", "/b", Some(&a), inherit);
        let c = define("a.b.c", "/c", Some(&b), inherit);

        let names: Vec<String> = lineage(&c).iter().map(|d| d.name().to_string()).collect();
        assert_eq!(names, vec!["a", "a.b", "a.b.c"]);
    }

    #[tokio::test]
    async fn test_child_sees_parent_data() {
        let a = define("a", "/a", None, |mut init: Init| async move {
            init.set("user", "ada");
            init.finish()
        });
        let b = define("a.b", "/b", Some(&a), |mut init: Init| async move {
            let user = init
                .get("user")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            init.set("greeting", format!("hello {}", user));
            init.finish()
        });

        let result = activate(&b, &Params::new(), &ActiveStates::default(), &WeakRouter::detached())
            .await
            .unwrap();

        let parent = result.get("a").unwrap();
        let child = result.current().unwrap();
        assert_eq!(child.name(), "a.b");
        assert_eq!(child.get("user"), Some(&json!("ada")));
        assert_eq!(child.get("greeting"), Some(&json!("hello ada")));
        assert_eq!(parent.get("greeting"), None);
    }

    #[tokio::test]
    async fn test_reuses_when_declared_params_unchanged() {
        let a = define("a", "/a/:org", None, inherit);
        let b = define("a.b", "/b/:id", Some(&a), inherit);
        let router = WeakRouter::detached();

        let first = activate(&b, &params! { "org" => 1, "id" => 1 }, &ActiveStates::default(), &router)
            .await
            .unwrap();
        let second = activate(&b, &params! { "org" => 1, "id" => 2 }, &first, &router)
            .await
            .unwrap();

        assert!(Arc::ptr_eq(first.get("a").unwrap(), second.get("a").unwrap()));
        assert!(!Arc::ptr_eq(first.get("a.b").unwrap(), second.get("a.b").unwrap()));
    }

    #[tokio::test]
    async fn test_failure_releases_fresh_states() {
        let a = define("a", "/a/:org", None, inherit);
        let b = define("a.b", "/b", Some(&a), |_init: Init| async move {
            Err::<StateData, _>(ActivationError::from(anyhow::anyhow!("nope")))
        });
        let router = WeakRouter::detached();

        let a_only = activate(&a, &params! { "org" => 1 }, &ActiveStates::default(), &router)
            .await
            .unwrap();
        let err = activate(&b, &params! { "org" => 1 }, &a_only, &router)
            .await
            .unwrap_err();

        assert!(!err.is_redirect());
        assert!(!a_only.get("a").unwrap().is_destroyed());
    }
}
