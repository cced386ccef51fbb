//! Url pattern compilation for state definitions
//!
//! A pattern is the concatenation of every ancestor's url fragment followed
//! by the definition's own fragment. Each `:name` token becomes a capture
//! group; literal text is matched verbatim and the whole path must match.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::config::RoutingConfig;
use crate::{Params, RouterError};

static PARAM_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":[a-zA-Z_$][a-zA-Z0-9_$]*").unwrap());

/// A compiled url template such as `/users/:id/posts/:post`
///
/// # Examples
///
/// ```
/// use state_router::definition::UrlPattern;
/// use state_router::config::RoutingConfig;
///
/// let users = UrlPattern::compile("app.users", "/users/:id", None, &RoutingConfig::default()).unwrap();
/// let posts = UrlPattern::compile("app.users.posts", "/posts/:post", Some(&users), &RoutingConfig::default()).unwrap();
///
/// assert_eq!(posts.full(), "/users/:id/posts/:post");
/// assert_eq!(posts.param_names(), ["id", "post"]);
///
/// let params = posts.matches("/users/7/posts/hello").unwrap();
/// assert_eq!(params["id"], "7");
/// assert_eq!(params["post"], "hello");
/// ```
#[derive(Debug, Clone)]
pub struct UrlPattern {
    fragment: String,
    full: String,
    regex: Regex,
    param_names: Vec<String>,
}

impl UrlPattern {
    /// Compiles `fragment` under `parent` into an anchored matcher
    ///
    /// Fails with `DuplicateParam` when a parameter name repeats anywhere in
    /// the ancestor chain.
    pub fn compile(
        state: &str,
        fragment: &str,
        parent: Option<&UrlPattern>,
        routing: &RoutingConfig,
    ) -> Result<Self, RouterError> {
        let full = format!("{}{}", parent.map(|p| p.full()).unwrap_or(""), fragment);

        let mut source = String::from("^");
        let mut param_names: Vec<String> = Vec::new();
        let mut last = 0;

        for token in PARAM_TOKEN.find_iter(&full) {
            let name = &token.as_str()[1..];
            if param_names.iter().any(|existing| existing == name) {
                return Err(RouterError::DuplicateParam {
                    state: state.to_string(),
                    param: name.to_string(),
                });
            }

            source.push_str(&regex::escape(&full[last..token.start()]));
            source.push_str(routing.param_pattern.capture());
            param_names.push(name.to_string());
            last = token.end();
        }

        source.push_str(&regex::escape(&full[last..]));
        source.push('$');

        let regex = RegexBuilder::new(&source)
            .case_insensitive(routing.case_insensitive)
            .build()
            .map_err(|e| RouterError::InvalidPattern {
                state: state.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            fragment: fragment.to_string(),
            full,
            regex,
            param_names,
        })
    }

    /// The definition's own fragment
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// The full root-to-leaf template
    pub fn full(&self) -> &str {
        &self.full
    }

    /// Parameter names in root-to-leaf order
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Matches a whole url path, returning captured parameters
    pub fn matches(&self, url: &str) -> Option<Params> {
        let captures = self.regex.captures(url)?;

        Some(
            self.param_names
                .iter()
                .enumerate()
                .filter_map(|(i, name)| {
                    captures
                        .get(i + 1)
                        .map(|m| (name.clone(), m.as_str().to_string()))
                })
                .collect(),
        )
    }

    /// Substitutes every `:name` token with its value from `params`
    pub fn build(&self, state: &str, params: &Params) -> Result<String, RouterError> {
        let mut url = String::with_capacity(self.full.len());
        let mut last = 0;

        for token in PARAM_TOKEN.find_iter(&self.full) {
            let name = &token.as_str()[1..];
            let value = params.get(name).ok_or_else(|| RouterError::MissingParam {
                state: state.to_string(),
                param: name.to_string(),
            })?;

            url.push_str(&self.full[last..token.start()]);
            url.push_str(value);
            last = token.end();
        }

        url.push_str(&self.full[last..]);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParamPattern;
    use crate::params;
    use pretty_assertions::assert_eq;

    fn compile(fragment: &str, parent: Option<&UrlPattern>) -> UrlPattern {
        UrlPattern::compile("test", fragment, parent, &RoutingConfig::default()).unwrap()
    }

    #[test]
    fn test_static_pattern() {
        let pattern = compile("/about", None);
        assert!(pattern.param_names().is_empty());
        assert_eq!(pattern.matches("/about"), Some(Params::new()));
        assert_eq!(pattern.matches("/about/"), None);
        assert_eq!(pattern.matches("/about/team"), None);
        assert_eq!(pattern.matches("/prefix/about"), None);
    }

    #[test]
    fn test_param_names_follow_chain_order() {
        let root = compile("/org/:org", None);
        let child = compile("/repo/:repo", Some(&root));
        let leaf = compile("/issues/:issue", Some(&child));

        assert_eq!(leaf.full(), "/org/:org/repo/:repo/issues/:issue");
        assert_eq!(leaf.fragment(), "/issues/:issue");
        assert_eq!(leaf.param_names(), ["org", "repo", "issue"]);
    }

    #[test]
    fn test_matches_captures_strings() {
        let pattern = compile("/b/:id", None);
        assert_eq!(pattern.matches("/b/42"), Some(params! { "id" => "42" }));
        assert_eq!(pattern.matches("/b/abc"), Some(params! { "id" => "abc" }));
        assert_eq!(pattern.matches("/b/"), None);
        assert_eq!(pattern.matches("/b/1/2"), None);
    }

    #[test]
    fn test_digits_only_config() {
        let routing = RoutingConfig {
            param_pattern: ParamPattern::Digits,
            ..RoutingConfig::default()
        };
        let pattern = UrlPattern::compile("test", "/b/:id", None, &routing).unwrap();
        assert_eq!(pattern.matches("/b/42"), Some(params! { "id" => "42" }));
        assert_eq!(pattern.matches("/b/abc"), None);
    }

    #[test]
    fn test_case_insensitive_config() {
        let routing = RoutingConfig {
            case_insensitive: true,
            ..RoutingConfig::default()
        };
        let pattern = UrlPattern::compile("test", "/Users/:id", None, &routing).unwrap();
        assert!(pattern.matches("/users/1").is_some());
        assert!(compile("/Users/:id", None).matches("/users/1").is_none());
    }

    #[test]
    fn test_literal_text_is_escaped() {
        let pattern = compile("/files/:name.txt", None);
        assert_eq!(pattern.param_names(), ["name"]);
        assert!(pattern.matches("/files/readme.txt").is_some());
        assert!(pattern.matches("/files/readmeXtxt").is_none());
    }

    #[test]
    fn test_duplicate_param_rejected() {
        let root = compile("/a/:id", None);
        let err = UrlPattern::compile("a.b", "/b/:id", Some(&root), &RoutingConfig::default())
            .unwrap_err();
        assert_eq!(
            err,
            RouterError::DuplicateParam {
                state: "a.b".to_string(),
                param: "id".to_string()
            }
        );
    }

    #[test]
    fn test_build_substitutes_params() {
        let root = compile("/a", None);
        let leaf = compile("/b/:id/:tab", Some(&root));
        let url = leaf
            .build("a.b", &params! { "id" => 7, "tab" => "info" })
            .unwrap();
        assert_eq!(url, "/a/b/7/info");
    }

    #[test]
    fn test_build_missing_param() {
        let pattern = compile("/b/:id", None);
        let err = pattern.build("a.b", &Params::new()).unwrap_err();
        assert!(matches!(err, RouterError::MissingParam { ref param, .. } if param == "id"));
    }

    #[test]
    fn test_build_then_match_round_trip() {
        let pattern = compile("/users/:user/posts/:post", None);
        let params = params! { "user" => "ada", "post" => 12 };
        let url = pattern.build("test", &params).unwrap();
        assert_eq!(pattern.matches(&url), Some(params));
    }
}
