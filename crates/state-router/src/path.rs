//! Url path handling between the location and the matcher
//!
//! A raw location such as `#/users//42/?tab=posts` goes through
//! [`location_path`] (prefix and query removed) and, when
//! `routing.normalize_urls` is on, [`normalize_url`] before any definition
//! sees it.

use std::borrow::Cow;

/// Rebuilds a url from its non-empty segments
///
/// Backslashes separate segments like slashes do. The result always starts
/// with `/` and has no trailing slash, except for the root itself. Urls that
/// are already in that shape come back borrowed.
///
/// ```
/// use state_router::path::normalize_url;
///
/// assert_eq!(normalize_url("/users/42/"), "/users/42");
/// assert_eq!(normalize_url("\\users\\42"), "/users/42");
/// assert_eq!(normalize_url(""), "/");
/// ```
pub fn normalize_url(url: &str) -> Cow<'_, str> {
    let mut normalized = String::with_capacity(url.len() + 1);
    for segment in url.split(['/', '\\']).filter(|s| !s.is_empty()) {
        normalized.push('/');
        normalized.push_str(segment);
    }

    if normalized.is_empty() {
        normalized.push('/');
    }

    if normalized == url {
        Cow::Borrowed(url)
    } else {
        Cow::Owned(normalized)
    }
}

/// Extracts the routable path from a raw location string
///
/// Strips the location `prefix` (e.g. `#`) and everything from the query
/// separator onwards.
///
/// ```
/// use state_router::path::location_path;
///
/// assert_eq!(location_path("#/users/42?tab=posts", "#", '?'), "/users/42");
/// assert_eq!(location_path("/users/42", "#", '?'), "/users/42");
/// assert_eq!(location_path("", "#", '?'), "");
/// ```
pub fn location_path<'a>(raw: &'a str, prefix: &str, query_separator: char) -> &'a str {
    let without_prefix = raw.strip_prefix(prefix).unwrap_or(raw);
    without_prefix
        .split_once(query_separator)
        .map(|(path, _query)| path)
        .unwrap_or(without_prefix)
}
