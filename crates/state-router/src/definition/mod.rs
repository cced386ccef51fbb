//! State definitions: the static, registration-time description of each
//! node in the state tree.

pub(crate) mod activation;
mod init;
mod pattern;

pub use init::{inherit, Init, InitResult, Initializer};
pub use pattern::UrlPattern;

use std::fmt;
use std::sync::Arc;

use crate::config::RoutingConfig;
use crate::{Params, RouterError};

/// One routable (or virtual) node of the state tree
///
/// `app.users.profile` is a child of `app.users`; its url is the
/// concatenation of every ancestor fragment followed by its own.
pub struct StateDefinition {
    name: String,
    url: UrlPattern,
    parent: Option<Arc<StateDefinition>>,
    is_virtual: bool,
    initializer: Box<dyn Initializer>,
}

impl StateDefinition {
    pub(crate) fn new(
        name: &str,
        fragment: &str,
        parent: Option<Arc<StateDefinition>>,
        is_virtual: bool,
        initializer: Box<dyn Initializer>,
        routing: &RoutingConfig,
    ) -> Result<Self, RouterError> {
        let url = UrlPattern::compile(name, fragment, parent.as_deref().map(|p| &p.url), routing)?;

        Ok(Self {
            name: name.to_string(),
            url,
            parent,
            is_virtual,
            initializer,
        })
    }

    /// Dot-qualified name, e.g. `app.users.profile`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Segment after the last `.`, e.g. `profile`
    pub fn local_name(&self) -> &str {
        self.name
            .rsplit_once('.')
            .map(|(_, local)| local)
            .unwrap_or(&self.name)
    }

    pub fn parent(&self) -> Option<&Arc<StateDefinition>> {
        self.parent.as_ref()
    }

    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    /// The full url template, ancestors included
    pub fn url_pattern(&self) -> &str {
        self.url.full()
    }

    /// Parameter names of the whole chain, root first
    pub fn param_names(&self) -> &[String] {
        self.url.param_names()
    }

    /// Matches a url path against this definition
    ///
    /// Virtual definitions never match.
    pub fn matches(&self, url: &str) -> Option<Params> {
        if self.is_virtual {
            return None;
        }
        self.url.matches(url)
    }

    /// Builds the canonical url for `params`
    pub fn url(&self, params: &Params) -> Result<String, RouterError> {
        if self.is_virtual {
            return Err(RouterError::VirtualUrl(self.name.clone()));
        }
        self.url.build(&self.name, params)
    }

    /// Whether `self` is a strict ancestor of `other`
    pub fn is_ancestor_of(&self, other: &StateDefinition) -> bool {
        let mut current = other.parent();
        while let Some(def) = current {
            if std::ptr::eq(def.as_ref(), self) {
                return true;
            }
            current = def.parent();
        }
        false
    }

    /// Compares only the parameters this definition declares
    pub(crate) fn same_params(&self, previous: &Params, next: &Params) -> bool {
        self.param_names()
            .iter()
            .all(|name| previous.get(name) == next.get(name))
    }

    pub(crate) fn args(&self, params: &Params) -> Vec<Option<String>> {
        self.param_names()
            .iter()
            .map(|name| params.get(name).cloned())
            .collect()
    }

    pub(crate) fn initializer(&self) -> &dyn Initializer {
        self.initializer.as_ref()
    }
}

impl fmt::Debug for StateDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateDefinition")
            .field("name", &self.name)
            .field("url", &self.url.full())
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("is_virtual", &self.is_virtual)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    fn define(
        name: &str,
        url: &str,
        parent: Option<&Arc<StateDefinition>>,
        is_virtual: bool,
    ) -> Arc<StateDefinition> {
        Arc::new(
            StateDefinition::new(
                name,
                url,
                parent.cloned(),
                is_virtual,
                Box::new(inherit),
                &RoutingConfig::default(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_names() {
        let app = define("app", "/app", None, false);
        let users = define("app.users", "/users", Some(&app), false);
        assert_eq!(users.name(), "app.users");
        assert_eq!(users.local_name(), "users");
        assert_eq!(app.local_name(), "app");
        assert_eq!(users.parent().map(|p| p.name()), Some("app"));
    }

    #[test]
    fn test_virtual_has_no_url() {
        let app = define("app", "/app", None, true);
        assert_eq!(app.matches("/app"), None);
        assert_eq!(
            app.url(&Params::new()),
            Err(RouterError::VirtualUrl("app".to_string()))
        );
    }

    #[test]
    fn test_virtual_fragment_still_prefixes_children() {
        let app = define("app", "/app", None, true);
        let users = define("app.users", "/users/:id", Some(&app), false);
        assert_eq!(users.url_pattern(), "/app/users/:id");
        assert_eq!(users.matches("/app/users/3"), Some(params! { "id" => 3 }));
    }

    #[test]
    fn test_is_ancestor_of() {
        let app = define("app", "/app", None, false);
        let users = define("app.users", "/users", Some(&app), false);
        let profile = define("app.users.profile", "/profile", Some(&users), false);

        assert!(app.is_ancestor_of(&profile));
        assert!(users.is_ancestor_of(&profile));
        assert!(!profile.is_ancestor_of(&app));
        assert!(!profile.is_ancestor_of(&profile));
    }

    #[test]
    fn test_same_params_only_checks_declared_names() {
        let app = define("app", "/app/:org", None, false);
        let previous = params! { "org" => "acme", "page" => 1 };
        let next = params! { "org" => "acme", "page" => 2 };
        assert!(app.same_params(&previous, &next));
        assert!(!app.same_params(&previous, &params! { "org" => "other" }));
    }

    #[test]
    fn test_args_are_positional() {
        let app = define("app", "/org/:org", None, false);
        let repo = define("app.repo", "/repo/:repo", Some(&app), false);
        let args = repo.args(&params! { "repo" => "router", "org" => "acme" });
        assert_eq!(
            args,
            vec![Some("acme".to_string()), Some("router".to_string())]
        );
    }
}
