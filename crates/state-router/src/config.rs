// File: src/config.rs
// Purpose: Router configuration parsing from router.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Router configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub location: LocationConfig,

    #[serde(default)]
    pub events: EventsConfig,
}

/// What a `:name` placeholder accepts when matching a url
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParamPattern {
    /// Any run of characters except `/`
    #[default]
    Segment,
    /// ASCII digits only
    Digits,
}

impl ParamPattern {
    pub(crate) fn capture(self) -> &'static str {
        match self {
            ParamPattern::Segment => "([^/]+)",
            ParamPattern::Digits => "([0-9]+)",
        }
    }
}

/// Routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub param_pattern: ParamPattern,

    #[serde(default = "default_false")]
    pub case_insensitive: bool,

    /// Normalize trailing/double slashes and backslashes before matching
    #[serde(default = "default_false")]
    pub normalize_urls: bool,

    /// Redirects raised by initializers allowed within one navigation
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

/// How urls are read from and written to a linked location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_query_separator")]
    pub query_separator: char,
}

/// Lifecycle event channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

// Default values
fn default_false() -> bool {
    false
}

fn default_max_redirects() -> usize {
    8
}

fn default_prefix() -> String {
    "#".to_string()
}

fn default_query_separator() -> char {
    '?'
}

fn default_capacity() -> usize {
    64
}

// Default implementations
impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            param_pattern: ParamPattern::default(),
            case_insensitive: false,
            normalize_urls: false,
            max_redirects: default_max_redirects(),
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            query_separator: default_query_separator(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Load configuration from default path (./router.toml)
    pub fn load_default() -> Result<Self> {
        Self::load("router.toml")
    }
}
