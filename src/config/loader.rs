//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (SHARKFIN__*)
//! 2. Conventional store variables (GRAPH_STORE_URL, GRAPH_STORE_TOKEN),
//!    used only when the matching SHARKFIN__ variable is absent
//! 3. Configuration file (TOML)
//! 4. Default values

use crate::config::types::AppConfig;
use crate::error::ConfigError;
use config::{Config, Environment, File, FileFormat};
use std::path::Path;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "shark-fin.toml",
    ".shark-fin.toml",
    "~/.config/shark-fin/config.toml",
    "/etc/shark-fin/config.toml",
];

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml_str, FileFormat::Toml))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. Start with defaults (handled by serde defaults on AppConfig)

    // 2. Add configuration file
    if let Some(path) = config_path {
        // Explicit path provided - must exist
        if !Path::new(path).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path
            )));
        }
        builder = builder.add_source(File::new(path, FileFormat::Toml));
    } else {
        // Try default paths (first existing one wins)
        for path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                break;
            }
        }
    }

    // 3. Conventional store variables, unless the prefixed form is set
    if std::env::var("SHARKFIN__STORE__URL").is_err()
        && let Ok(url) = std::env::var("GRAPH_STORE_URL")
    {
        builder = builder
            .set_override("store.url", url)
            .map_err(|e| ConfigError::Load(e.to_string()))?;
    }
    if std::env::var("SHARKFIN__STORE__TOKEN").is_err()
        && let Ok(token) = std::env::var("GRAPH_STORE_TOKEN")
    {
        builder = builder
            .set_override("store.token", token)
            .map_err(|e| ConfigError::Load(e.to_string()))?;
    }

    // 4. Add environment variables with SHARKFIN prefix
    // e.g., SHARKFIN__STORE__URL, SHARKFIN__LOGGING__LEVEL
    // Double underscore (__) maps to nested keys (store.url)
    builder = builder.add_source(
        Environment::with_prefix("SHARKFIN")
            .separator("__")
            .try_parsing(true),
    );

    // Build and deserialize
    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    // Validate the configuration
    validate_config(&app_config)?;

    Ok(app_config)
}

/// Validate configuration values
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    // Validate store URL
    if config.store.url.is_empty() {
        return Err(ConfigError::Missing {
            field: "store.url".to_string(),
        });
    }

    if !config.store.url.starts_with("http://") && !config.store.url.starts_with("https://") {
        return Err(ConfigError::Invalid {
            message: format!(
                "store.url must start with http:// or https://, got: {}",
                config.store.url
            ),
        });
    }

    // Validate timeout
    if config.store.timeout_secs == 0 {
        return Err(ConfigError::Invalid {
            message: "store.timeout_secs must be greater than 0".to_string(),
        });
    }

    // Rank 0 is reserved for "no access"
    if let Some((action, _)) = config.access.actions.iter().find(|(_, rank)| **rank == 0) {
        return Err(ConfigError::ZeroRank {
            action: action.clone(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_from_str_basic() {
        let toml = r#"
[store]
url = "http://graph.example.com:7379"
token = "test-token"

[access.actions]
read = 1
write = 2
"#;

        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.store.url, "http://graph.example.com:7379");
        assert_eq!(
            config.store.token.as_ref().map(|t| t.expose()),
            Some("test-token")
        );
        assert_eq!(config.access.actions.get("write"), Some(&2));
    }

    #[test]
    fn test_load_config_from_str_with_layers() {
        let toml = r#"
[access.actions]
read = 1

[access.layers.topic._default]
anyone_can = "read"
inherit = false
"#;

        let config = load_config_from_str(toml).unwrap();
        assert!(config.access.layers.0.contains_key("topic"));
    }

    #[test]
    fn test_invalid_url_error() {
        let toml = r#"
[store]
url = "not-a-url"
"#;

        let result = load_config_from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_rank_rejected() {
        let toml = r#"
[access.actions]
none = 0
read = 1
"#;

        let result = load_config_from_str(toml);
        assert!(matches!(result.unwrap_err(), ConfigError::ZeroRank { action } if action == "none"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = AppConfig {
            store: crate::config::types::StoreConfig {
                timeout_secs: 0,
                ..Default::default()
            },
            ..Default::default()
        };

        let result = validate_config(&config);
        assert!(matches!(result.unwrap_err(), ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_empty_url_error() {
        let toml = r#"
[store]
url = ""
"#;

        let result = load_config_from_str(toml);
        assert!(matches!(result.unwrap_err(), ConfigError::Missing { .. }));
    }
}
