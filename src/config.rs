//! Mounter configuration.
//!
//! Handles loading, validating, and merging `mounter.toml`. The file lives at
//! the root of the local site and is optional: stock defaults are serialized
//! to a TOML table, the user file is merged on top key by key, and the result
//! is deserialized and validated.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! log_level = "info"           # tracing filter when RUST_LOG is unset
//!
//! [api]
//! host = "http://localhost:3000"
//! email = "admin@example.com"
//! api_key = "..."              # MOUNTER_API_KEY overrides this
//! per_page = 50                # page size for list requests
//! timeout_secs = 30
//!
//! [push]
//! resources = ["site", "content_types", "content_entries", "snippets",
//!              "pages", "theme_assets", "content_assets", "translations"]
//! force = false                # re-upload theme assets even when unchanged
//!
//! [tree]
//! orphans = "error"            # or "warn": keep pages without a parent unattached
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::tree::OrphanPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file at the site root.
pub const CONFIG_FILENAME: &str = "mounter.toml";

/// Environment variable overriding `api.api_key`.
pub const API_KEY_ENV: &str = "MOUNTER_API_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Mounter configuration loaded from `mounter.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MounterConfig {
    /// Default tracing filter directive.
    pub log_level: String,
    /// Remote engine connection.
    pub api: ApiConfig,
    /// What `push` sends.
    pub push: PushConfig,
    /// Page tree building.
    pub tree: TreeConfig,
}

impl Default for MounterConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            api: ApiConfig::default(),
            push: PushConfig::default(),
            tree: TreeConfig::default(),
        }
    }
}

impl MounterConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.per_page == 0 {
            return Err(ConfigError::Validation("api.per_page must be > 0".into()));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "api.timeout_secs must be > 0".into(),
            ));
        }
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Validation(
                "log_level must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Apply overrides from the environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.is_empty()) {
            self.api.api_key = Some(key);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL of the engine. A bare host gets `https://`.
    pub host: String,
    pub email: Option<String>,
    pub api_key: Option<String>,
    /// Page size for list requests.
    pub per_page: usize,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:3000".to_string(),
            email: None,
            api_key: None,
            per_page: 50,
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    /// Credentials, or a validation error naming what is missing.
    pub fn credentials(&self) -> Result<(&str, &str), ConfigError> {
        match (self.email.as_deref(), self.api_key.as_deref()) {
            (Some(email), Some(key)) => Ok((email, key)),
            (None, _) => Err(ConfigError::Validation("api.email is required".into())),
            (_, None) => Err(ConfigError::Validation(format!(
                "api.api_key (or {API_KEY_ENV}) is required"
            ))),
        }
    }
}

/// Resource kinds `push` can send, in push order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Site,
    ContentTypes,
    ContentEntries,
    Snippets,
    Pages,
    ThemeAssets,
    ContentAssets,
    Translations,
}

impl Resource {
    pub const ALL: [Resource; 8] = [
        Resource::Site,
        Resource::ContentTypes,
        Resource::ContentEntries,
        Resource::Snippets,
        Resource::Pages,
        Resource::ThemeAssets,
        Resource::ContentAssets,
        Resource::Translations,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PushConfig {
    pub resources: Vec<Resource>,
    /// Re-upload theme assets whose checksum matches the remote copy.
    pub force: bool,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            resources: Resource::ALL.to_vec(),
            force: false,
        }
    }
}

impl PushConfig {
    pub fn includes(&self, resource: Resource) -> bool {
        self.resources.contains(&resource)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TreeConfig {
    pub orphans: OrphanPolicy,
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// The base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(MounterConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `mounter.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no config file.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<MounterConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: MounterConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config for the site at `root`, with environment overrides applied.
pub fn load_config(root: &Path) -> Result<MounterConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(root)?;
    let mut config = resolve_config(base, overlay)?;
    config.apply_env(|name| std::env::var(name).ok());
    Ok(config)
}

/// Returns a fully-commented stock `mounter.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Site Mounter Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file at the root of the local site as mounter.toml.
# Unknown keys will cause an error.

# Log filter used when RUST_LOG is not set ("error", "warn", "info", "debug",
# or any tracing directive such as "site_mounter=debug").
log_level = "info"

# ---------------------------------------------------------------------------
# Remote engine
# ---------------------------------------------------------------------------
[api]
# Base URL of the engine. A bare host name gets https:// prepended.
host = "http://localhost:3000"

# Account used for the token handshake.
# email = "admin@example.com"

# API key of that account. The MOUNTER_API_KEY environment variable takes
# precedence over this value.
# api_key = ""

# Number of records requested per page when listing resources.
per_page = 50

# Request timeout, in seconds.
timeout_secs = 30

# ---------------------------------------------------------------------------
# Push
# ---------------------------------------------------------------------------
[push]
# Resources sent by `push`, always in dependency order regardless of the
# order listed here.
resources = ["site", "content_types", "content_entries", "snippets", "pages", "theme_assets", "content_assets", "translations"]

# Re-upload theme assets even when the remote checksum matches.
force = false

# ---------------------------------------------------------------------------
# Page tree
# ---------------------------------------------------------------------------
[tree]
# What to do with a page whose parent page does not exist:
#   "error" - abort loading the site
#   "warn"  - log it and leave it out of the tree
orphans = "error"
"##
}
