//! Application configuration.
//!
//! Settings come from one TOML file (default `config.toml` in the working
//! directory). The same file can serve several tools: root-level keys are
//! shared, and a `[apps.<key>]` table overrides them for one tool.
//!
//! ## Precedence
//!
//! ```text
//! built-in defaults  <  root-level keys  <  [apps.batch-crop]
//! ```
//!
//! Layers are merged key-by-key with [`merge_toml`], so a layer only needs
//! the keys it changes.
//!
//! ## Example
//!
//! ```toml
//! update_url = "https://example.com/latest.json"
//!
//! [apps.batch-crop]
//! app_name = "Batch Crop"
//!
//! [apps.batch-crop.crop]
//! bottom = 120
//! ```
//!
//! ## Leniency
//!
//! Config files are shared with older tools, so unknown keys are ignored
//! rather than rejected. `app_name`, `version` and `update_url` accept any
//! scalar and keep its text form (`version = 2` reads as `"2"`).
//! [`load_app_config_or_default`] goes further and never fails: a missing
//! or broken file yields the defaults plus a warning for the caller to show.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Key of this tool's table under `[apps]`.
pub const DEFAULT_APP_KEY: &str = "batch-crop";

/// Bottom margin removed when no crop mode is given.
pub const DEFAULT_BOTTOM_MARGIN: u32 = 175;

/// Keys whose values are always read as strings.
const STRING_KEYS: &[&str] = &["app_name", "version", "update_url"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Settings for the application as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app_name: String,
    /// Version compared against update feeds.
    pub version: String,
    /// Where the release feed is published. Empty when not configured.
    pub update_url: String,
    pub crop: CropDefaults,
    pub processing: ProcessingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "Batch Crop".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            update_url: String::new(),
            crop: CropDefaults::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        if self.app_name.trim().is_empty() {
            return Err(ConfigError::Validation("app_name must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropDefaults {
    /// Pixels removed from the bottom edge in the default crop mode.
    pub bottom: u32,
}

impl Default for CropDefaults {
    fn default() -> Self {
        Self {
            bottom: DEFAULT_BOTTOM_MARGIN,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Maximum number of parallel crop workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
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

/// Flatten the shared layer and the `[apps.<app_key>]` layer into one table.
///
/// A missing or non-table `apps.<app_key>` contributes nothing.
pub fn layer_for_app(raw: toml::Table, app_key: &str) -> toml::Value {
    let mut shared = raw;
    let app_layer = match shared.remove("apps") {
        Some(toml::Value::Table(mut apps)) => match apps.remove(app_key) {
            Some(layer @ toml::Value::Table(_)) => Some(layer),
            Some(_) => {
                warn!(app_key, "ignoring [apps] entry that is not a table");
                None
            }
            None => None,
        },
        Some(_) => {
            warn!("ignoring `apps` key that is not a table");
            None
        }
        None => None,
    };

    let shared = toml::Value::Table(shared);
    match app_layer {
        Some(layer) => merge_toml(shared, layer),
        None => shared,
    }
}

/// Give the string keys their text form, dropping values that have none.
fn coerce_string_keys(value: &mut toml::Value) {
    let Some(table) = value.as_table_mut() else {
        return;
    };
    for &key in STRING_KEYS {
        let coerced = match table.get(key) {
            None | Some(toml::Value::String(_)) => continue,
            Some(toml::Value::Integer(i)) => Some(i.to_string()),
            Some(toml::Value::Float(f)) => Some(f.to_string()),
            Some(toml::Value::Boolean(b)) => Some(b.to_string()),
            Some(toml::Value::Datetime(d)) => Some(d.to_string()),
            Some(toml::Value::Array(_) | toml::Value::Table(_)) => None,
        };
        match coerced {
            Some(text) => {
                table.insert(key.to_string(), toml::Value::String(text));
            }
            None => {
                warn!(key, "ignoring non-scalar value");
                table.remove(key);
            }
        }
    }
}

/// Resolve the app config from the text of a config file.
pub fn parse_app_config(content: &str, app_key: &str) -> Result<AppConfig, ConfigError> {
    let raw: toml::Table = toml::from_str(content)?;
    let mut merged = layer_for_app(raw, app_key);
    coerce_string_keys(&mut merged);
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the app config from `path`.
///
/// A missing file yields the defaults. A file that exists but cannot be
/// read, parsed or validated is an error.
pub fn load_app_config(path: &Path, app_key: &str) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(AppConfig::default());
    }
    let content = fs::read_to_string(path)?;
    parse_app_config(&content, app_key)
}

/// A config that always resolves, plus the reason it fell back, if any.
#[derive(Debug)]
pub struct ConfigLoad {
    pub config: AppConfig,
    pub warning: Option<ConfigError>,
}

/// Like [`load_app_config`], but a broken file degrades to the defaults.
pub fn load_app_config_or_default(path: &Path, app_key: &str) -> ConfigLoad {
    match load_app_config(path, app_key) {
        Ok(config) => ConfigLoad {
            config,
            warning: None,
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "config unusable, using defaults");
            ConfigLoad {
                config: AppConfig::default(),
                warning: Some(e),
            }
        }
    }
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Batch Crop Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Root-level keys are shared by every tool reading this file. Keys under
# [apps.batch-crop] apply to batch-crop only and win over the shared ones.
# Unknown keys are ignored.

# Display name.
app_name = "Batch Crop"

# URL of the release feed checked for updates (empty = not configured).
update_url = ""

# ---------------------------------------------------------------------------
# Cropping
# ---------------------------------------------------------------------------
[crop]
# Pixels removed from the bottom edge when no crop mode is given.
bottom = 175

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum number of parallel crop workers.
# Omit to use all CPU cores. Values above the core count are clamped down.
# max_processes = 4

# ---------------------------------------------------------------------------
# Per-tool overrides
# ---------------------------------------------------------------------------
# [apps.batch-crop]
# app_name = "Batch Crop (studio)"
#
# [apps.batch-crop.crop]
# bottom = 120
"##
}
