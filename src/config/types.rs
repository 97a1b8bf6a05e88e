//! Configuration types for shark-fin
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files and/or environment variables.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Graph relation store connection settings
    pub store: StoreConfig,

    /// Ranks, layer policies and wildcard grants
    pub access: AccessConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Graph relation store connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the store's command endpoint (e.g., `http://127.0.0.1:7379`)
    pub url: String,

    /// Bearer token (prefer env var GRAPH_STORE_TOKEN)
    pub token: Option<StoreToken>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Whether to verify SSL certificates
    pub verify_ssl: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:7379".to_string(),
            token: None,
            timeout_secs: 10,
            verify_ssl: true,
        }
    }
}

impl StoreConfig {
    /// Full URL for a store command
    pub fn command_url(&self, command: &str) -> String {
        format!("{}/call/{}", self.url.trim_end_matches('/'), command)
    }
}

/// Store credential that never shows up in logs or debug output.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct StoreToken(String);

impl StoreToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building the authorization header only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for StoreToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StoreToken([REDACTED])")
    }
}

/// Access configuration
///
/// ```toml
/// [access.actions]
/// read = 1
/// write = 2
/// admin = 3
///
/// [access.layers.school._default]
/// anyone_can = "read"
/// owner_can = "admin"
///
/// [access.layers.school.classroom._default]
/// inherit = true
///
/// [[access.wild]]
/// user_id = "root"
/// layer = "school"
/// action = "admin"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Action name to rank. Ranks must be positive.
    pub actions: HashMap<String, u32>,

    /// Layer policy tree
    pub layers: LayersConfig,

    /// Wildcard allow-list seeded at startup
    pub wild: Vec<WildGrantConfig>,
}

/// Layer tree as written in configuration.
///
/// Keys starting with `_` are policy variants of the enclosing layer
/// (`_default`, `_staff`); every other key is a child layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct LayersConfig(pub BTreeMap<String, LayerEntryConfig>);

/// One entry of a layer table: either a variant policy or a child layer
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LayerEntryConfig {
    Policy(PolicyConfig),
    Layer(LayersConfig),
}

/// Rules of a single layer variant
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Action granted to the owner of the resource
    #[serde(default, alias = "ownerCan")]
    pub owner_can: Option<String>,

    /// Action granted to every user
    #[serde(default, alias = "anyoneCan")]
    pub anyone_can: Option<String>,

    /// Action (and everything above it) denied at this layer
    #[serde(default, alias = "noOneCan")]
    pub no_one_can: Option<String>,

    /// Fall through to the parent layer on denial
    #[serde(default)]
    pub inherit: bool,
}

/// Wildcard allow-list entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WildGrantConfig {
    #[serde(alias = "userId")]
    pub user_id: String,
    /// Layer path; an empty string grants on every layer
    #[serde(default)]
    pub layer: String,
    pub action: String,
}

impl WildGrantConfig {
    pub fn new(
        user_id: impl Into<String>,
        layer: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            layer: layer.into(),
            action: action.into(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}
