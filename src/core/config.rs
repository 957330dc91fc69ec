//! # Configuration Module
//!
//! Site configuration for Webgen. Settings are layered from a TOML file,
//! environment variables and programmatic overrides, in that order, and
//! validated once at the end.
//!
//! ## Example
//!
//! ```rust,no_run
//! use webgen::core::config::ConfigBuilder;
//!
//! let config = ConfigBuilder::new()
//!     .with_file("webgen.toml")
//!     .with_env_prefix("WEBGEN_")
//!     .with_override("versions.retain", 2)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.versions.retain, 2);
//! ```
//!
//! ## File format
//!
//! ```toml
//! processors = ["YamlTemplate", "HtmlTemplate", "CssYaml"]
//! abort_on_error = false
//! minify_html = false
//!
//! [versions]
//! auto_promote = false
//! retain = 0
//! deploy_dir = "/srv/www"
//!
//! [variables]
//! site_name = "Example"
//! ```

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use toml::Value as TomlValue;

use crate::core::error::{Result, WebgenError};
use crate::processors::ProcessorKind;

/// Default prefix for environment overrides.
pub const DEFAULT_ENV_PREFIX: &str = "WEBGEN_";

/// Represents the site configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_processors")]
    /// Ordered renderer names placed between the ignore and copy processors.
    pub processors: Vec<String>,

    #[serde(default)]
    /// Stops a generation run at the first per-file failure.
    pub abort_on_error: bool,

    #[serde(default)]
    /// Minifies HTML emitted by template renderers.
    pub minify_html: bool,

    #[serde(default)]
    /// Settings for versioned generation.
    pub versions: VersionsConfig,

    #[serde(default)]
    /// Variables exported to renderers through the run context.
    pub variables: toml::Table,
}

/// Settings for the versioned release manager.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionsConfig {
    #[serde(default)]
    /// Promote every freshly generated version, not only the first.
    pub auto_promote: bool,

    #[serde(default)]
    /// Number of most recent non-current versions garbage collection
    /// keeps alongside the current one.
    pub retain: usize,

    #[serde(default)]
    /// Publish directory kept in sync with the current version.
    pub deploy_dir: Option<PathBuf>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            processors: default_processors(),
            abort_on_error: false,
            minify_html: false,
            versions: VersionsConfig::default(),
            variables: toml::Table::new(),
        }
    }
}

impl SiteConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        validate_config(self)
    }

    /// Parses the configured processor names, failing on the first
    /// unknown one.
    pub fn processor_kinds(&self) -> Result<Vec<ProcessorKind>> {
        self.processors
            .iter()
            .map(|name| ProcessorKind::from_str(name))
            .collect()
    }

    /// Renderer variables as a JSON object.
    pub fn variables_json(&self) -> Result<Map<String, JsonValue>> {
        match serde_json::to_value(&self.variables) {
            Ok(JsonValue::Object(map)) => Ok(map),
            Ok(_) => Ok(Map::new()),
            Err(e) => Err(WebgenError::config_error(
                format!("Invalid variables table: {}", e),
                None,
            )),
        }
    }
}

/// Builds a `SiteConfig` from layered sources.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_file: Option<PathBuf>,
    env_prefix: Option<String>,
    overrides: Vec<(String, TomlValue)>,
}

impl ConfigBuilder {
    /// Initialises a new `ConfigBuilder` instance with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a configuration file to the builder.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Adds a prefix for environment variables to override configuration
    /// values, e.g. `WEBGEN_` makes `WEBGEN_VERSIONS_RETAIN=3` set
    /// `versions.retain`.
    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Adds a key-value pair to override configuration values. Overrides
    /// are applied in insertion order, after the environment.
    pub fn with_override<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<TomlValue>,
    {
        self.overrides.push((key.into(), value.into()));
        self
    }

    /// Builds the final configuration.
    pub fn build(self) -> Result<SiteConfig> {
        let mut config = if let Some(path) = &self.config_file {
            load_from_file(path)?
        } else {
            SiteConfig::default()
        };

        if let Some(prefix) = &self.env_prefix {
            apply_env_overrides(&mut config, prefix, env::vars())?;
        }

        for (key, value) in &self.overrides {
            apply_config_value(&mut config, key, value)?;
        }

        validate_config(&config)?;
        Ok(config)
    }
}

fn load_from_file(path: &Path) -> Result<SiteConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        WebgenError::config_error(
            format!("Failed to read config file: {}", e),
            Some(path.to_path_buf()),
        )
    })?;

    toml::from_str(&content).map_err(|e| {
        WebgenError::config_error(
            format!("Failed to parse config file: {}", e),
            Some(path.to_path_buf()),
        )
    })
}

fn apply_env_overrides<I>(
    config: &mut SiteConfig,
    prefix: &str,
    vars: I,
) -> Result<()>
where
    I: IntoIterator<Item = (String, String)>,
{
    // Sorted so that repeated keys resolve the same way on every run.
    let vars: HashMap<String, String> = vars.into_iter().collect();
    let mut keys: Vec<&String> = vars.keys().collect();
    keys.sort();

    for key in keys {
        let Some(stripped) = key.strip_prefix(prefix) else {
            continue;
        };
        let stripped = stripped.trim_start_matches('_');
        let config_key = if let Some(var) = stripped.strip_prefix("VAR_") {
            format!("variables.{}", var.to_lowercase())
        } else if let Some(rest) = stripped.strip_prefix("VERSIONS_") {
            format!("versions.{}", rest.to_lowercase())
        } else {
            stripped.to_lowercase()
        };
        if !is_known_key(&config_key) {
            log::warn!("Ignoring {}: no configuration key {}", key, config_key);
            continue;
        }
        apply_config_value(
            config,
            &config_key,
            &TomlValue::String(vars[key].clone()),
        )?;
    }
    Ok(())
}

const CONFIG_KEYS: &[&str] = &[
    "processors",
    "abort_on_error",
    "minify_html",
    "versions.auto_promote",
    "versions.retain",
    "versions.deploy_dir",
];

fn is_known_key(key: &str) -> bool {
    CONFIG_KEYS.contains(&key)
        || key.strip_prefix("variables.").is_some_and(|name| !name.is_empty())
}

fn apply_config_value(
    config: &mut SiteConfig,
    key: &str,
    value: &TomlValue,
) -> Result<()> {
    match key {
        "processors" => config.processors = parse_list(key, value)?,
        "abort_on_error" => config.abort_on_error = parse_bool(key, value)?,
        "minify_html" => config.minify_html = parse_bool(key, value)?,
        "versions.auto_promote" => {
            config.versions.auto_promote = parse_bool(key, value)?
        }
        "versions.retain" => config.versions.retain = parse_usize(key, value)?,
        "versions.deploy_dir" => {
            config.versions.deploy_dir = Some(PathBuf::from(as_text(value)))
        }
        _ => {
            if let Some(name) = key.strip_prefix("variables.") {
                _ = config.variables.insert(name.to_string(), value.clone());
            } else {
                return Err(WebgenError::config_error(
                    format!("Unknown configuration key: {}", key),
                    None,
                ));
            }
        }
    }
    Ok(())
}

fn as_text(value: &TomlValue) -> String {
    match value {
        TomlValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_bool(key: &str, value: &TomlValue) -> Result<bool> {
    match value {
        TomlValue::Boolean(b) => Ok(*b),
        other => as_text(other).trim().parse().map_err(|e| {
            WebgenError::config_error(
                format!("Invalid {} value '{}': {}", key, other, e),
                None,
            )
        }),
    }
}

fn parse_usize(key: &str, value: &TomlValue) -> Result<usize> {
    match value {
        TomlValue::Integer(i) => usize::try_from(*i).map_err(|e| {
            WebgenError::config_error(
                format!("Invalid {} value '{}': {}", key, i, e),
                None,
            )
        }),
        other => as_text(other).trim().parse().map_err(|e| {
            WebgenError::config_error(
                format!("Invalid {} value '{}': {}", key, other, e),
                None,
            )
        }),
    }
}

fn parse_list(key: &str, value: &TomlValue) -> Result<Vec<String>> {
    match value {
        TomlValue::Array(items) => items
            .iter()
            .map(|item| match item {
                TomlValue::String(s) => Ok(s.clone()),
                other => Err(WebgenError::config_error(
                    format!("Invalid {} entry '{}'", key, other),
                    None,
                )),
            })
            .collect(),
        other => Ok(as_text(other)
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()),
    }
}

fn validate_config(config: &SiteConfig) -> Result<()> {
    let kinds = config.processor_kinds()?;
    for (i, kind) in kinds.iter().enumerate() {
        if kinds[..i].contains(kind) {
            return Err(WebgenError::config_error(
                format!("Processor {} listed more than once", kind),
                None,
            ));
        }
    }

    if let Some(deploy_dir) = &config.versions.deploy_dir {
        if deploy_dir.as_os_str().is_empty() {
            return Err(WebgenError::config_error(
                "versions.deploy_dir cannot be empty",
                None,
            ));
        }
    }

    _ = config.variables_json()?;
    Ok(())
}

fn default_processors() -> Vec<String> {
    ProcessorKind::ALL.iter().map(|k| k.name().to_string()).collect()
}
