//! Cache configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use jsonc_parser::ParseOptions;
use jsonschema::Validator;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::{CachePolicy, CacheError};

// Embed the schema
const SCHEMA_JSON: &str = include_str!("../../../schemas/v1/config.json");
static CONFIG_SCHEMA: OnceLock<Validator> = OnceLock::new();

/// Environment variable that overrides the cache root.
pub const ROOT_ENV: &str = "SKILLCACHE_DIR";

/// Environment variable that disables the cache when truthy.
pub const DISABLE_ENV: &str = "SKILLCACHE_DISABLE";

/// Configuration for the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache root directory.
    #[serde(default = "default_root")]
    pub root: String,

    /// Whether caching is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Identity recorded on written entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,

    /// Directory relative tracked paths resolve against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<String>,

    /// Shared resources by logical name.
    #[serde(default)]
    pub shared: BTreeMap<String, SharedResourceConfig>,

    /// Directory containing the configuration file.
    #[serde(skip)]
    pub config_dir: Option<PathBuf>,
}

/// Settings for one shared resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedResourceConfig {
    #[serde(default)]
    pub policy: CachePolicy,
}

fn default_root() -> String {
    ".claude/cache".to_string()
}

fn default_enabled() -> bool {
    true
}

impl CacheConfig {
    /// File names looked up by [`CacheConfig::discover`], in order.
    pub const CONFIG_FILES: &[&str] = &[".skillcache.jsonc", ".skillcache.json"];

    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            root: default_root(),
            enabled: true,
            producer: None,
            base_dir: None,
            shared: BTreeMap::new(),
            config_dir: None,
        }
    }

    /// Loads configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| CacheError::config(format!("Failed to read config: {}", e)))?;

        let mut config = Self::from_json(&content)?;

        if let Some(parent) = path.parent() {
            config.config_dir = Some(parent.to_path_buf());
        }

        Ok(config)
    }

    /// Looks for a configuration file in `dir`.
    pub fn discover(dir: impl AsRef<Path>) -> Result<Option<Self>, CacheError> {
        let dir = dir.as_ref();
        for name in Self::CONFIG_FILES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Self::from_file(candidate).map(Some);
            }
        }
        Ok(None)
    }

    /// Parses configuration from JSON (comments allowed) with schema validation.
    pub fn from_json(json: &str) -> Result<Self, CacheError> {
        let value: serde_json::Value = jsonc_parser::parse_to_serde_value(json, &ParseOptions::default())
            .map_err(|e| CacheError::config(format!("Invalid JSON: {}", e)))?
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        let schema = CONFIG_SCHEMA.get_or_init(|| {
            let schema_json: serde_json::Value =
                serde_json::from_str(SCHEMA_JSON).expect("Invalid embedded config schema");
            Validator::new(&schema_json).expect("Invalid config schema compilation")
        });

        if let Err(e) = schema.validate(&value) {
            let error_msg = format!("{} at {}", e, e.instance_path());
            return Err(CacheError::config(format!(
                "Config validation failed: {}",
                error_msg
            )));
        }

        serde_json::from_value(value)
            .map_err(|e| CacheError::config(format!("Invalid config: {}", e)))
    }

    /// Applies `SKILLCACHE_DIR` and `SKILLCACHE_DISABLE` from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup(ROOT_ENV).filter(|root| !root.is_empty()) {
            self.root = root;
            // an override is taken as given, not relative to the config file
            self.config_dir = None;
        }

        if lookup(DISABLE_ENV).is_some_and(|value| is_truthy(&value)) {
            self.enabled = false;
        }
    }

    /// Applies overrides from the process environment.
    pub fn apply_process_env(&mut self) {
        self.apply_env(|name| std::env::var(name).ok());
    }

    /// Cache root, resolved against the configuration file's directory.
    pub fn resolved_root(&self) -> PathBuf {
        self.resolve(&self.root)
    }

    /// Base directory for tracked files.
    ///
    /// Defaults to the configuration file's directory.
    pub fn resolved_base_dir(&self) -> Option<PathBuf> {
        match &self.base_dir {
            Some(base_dir) => Some(self.resolve(base_dir)),
            None => self.config_dir.clone(),
        }
    }

    /// Policy for a shared resource, `Manual` when not configured.
    pub fn shared_policy(&self, name: &str) -> CachePolicy {
        self.shared
            .get(name)
            .map(|resource| resource.policy.clone())
            .unwrap_or_default()
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        match &self.config_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
