//! Run configuration module.
//!
//! CLI flags choose what a run does; the optional `config.toml` tunes the
//! constants behind it. A config file is passed explicitly with `--config`
//! and is sparse: its values are merged on top of the stock defaults, so it
//! only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [raw]
//! extensions = ["cr2", "nef"]   # Recognised RAW extensions (case-insensitive)
//!
//! [jpeg]
//! quality = 90                  # JPEG quality (1-100)
//!
//! [defects]
//! sigma = 6.0                   # Outlier threshold in robust standard deviations
//! confirm_ratio = 0.9           # Fraction of a batch that must agree on a defect
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::catalog::{DEFAULT_RAW_EXTENSIONS, PathCatalog};
use crate::imaging::{DetectionParams, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

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

/// Run configuration loaded from a `config.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub raw: RawConfig,
    pub jpeg: JpegConfig,
    pub defects: DefectsConfig,
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.raw.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "raw.extensions must not be empty".into(),
            ));
        }
        if let Some(bad) = self.raw.extensions.iter().find(|ext| {
            let ext = ext.trim().trim_start_matches('.');
            ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric())
        }) {
            return Err(ConfigError::Validation(format!(
                "raw.extensions entry {:?} is not a file extension",
                bad
            )));
        }
        if !(1..=100).contains(&self.jpeg.quality) {
            return Err(ConfigError::Validation(
                "jpeg.quality must be 1-100".into(),
            ));
        }
        if !self.defects.sigma.is_finite() || self.defects.sigma <= 0.0 {
            return Err(ConfigError::Validation(
                "defects.sigma must be a positive number".into(),
            ));
        }
        if !(self.defects.confirm_ratio > 0.0 && self.defects.confirm_ratio <= 1.0) {
            return Err(ConfigError::Validation(
                "defects.confirm_ratio must be in (0, 1]".into(),
            ));
        }
        Ok(())
    }

    pub fn catalog(&self) -> PathCatalog {
        PathCatalog::new(&self.raw.extensions)
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.jpeg.quality)
    }

    pub fn detection(&self) -> DetectionParams {
        DetectionParams {
            sigma: self.defects.sigma as f32,
            confirm_ratio: self.defects.confirm_ratio as f32,
        }
    }
}

/// Which files count as RAW.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfig {
    pub extensions: Vec<String>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_RAW_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// JPEG encoder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JpegConfig {
    pub quality: u32,
}

impl Default for JpegConfig {
    fn default() -> Self {
        Self {
            quality: u32::from(Quality::default().value()),
        }
    }
}

/// Bad-pixel detection thresholds used by `--enhance` and `--group-enhance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefectsConfig {
    /// A pixel is a candidate when its residual exceeds this many robust
    /// standard deviations.
    pub sigma: f64,
    /// Fraction of the frames in a batch that must flag a pixel.
    pub confirm_ratio: f64,
}

impl Default for DefectsConfig {
    fn default() -> Self {
        Self {
            sigma: 6.0,
            confirm_ratio: 0.9,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(RunConfig::default())?)
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

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<RunConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: RunConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the run configuration.
///
/// Without a path the stock defaults apply. A path that was given must exist;
/// a missing file is an error rather than a silent fallback.
pub fn load_config(path: Option<&Path>) -> Result<RunConfig, ConfigError> {
    let overlay = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Printed by `--gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# raw-to-jpg Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Pass the file with:  raw-to-jpg --config config.toml <SOURCE> <DESTINATION>
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# RAW detection
# ---------------------------------------------------------------------------
[raw]
# File extensions treated as camera RAW files (case-insensitive, no dot).
# Everything else is copied in smart mode and ignored in archive mode.
extensions = ["cr2", "nef"]

# ---------------------------------------------------------------------------
# JPEG output
# ---------------------------------------------------------------------------
[jpeg]
# Encoding quality (1 = worst, 100 = best). TIFF output is always lossless.
quality = 90

# ---------------------------------------------------------------------------
# Bad-pixel detection (--enhance / --group-enhance)
# ---------------------------------------------------------------------------
[defects]
# A pixel is a defect candidate when it differs from its same-colour
# neighbours by more than this many robust standard deviations.
# Lower values find more defects and risk flagging real detail.
sigma = 6.0

# Fraction of the frames in a batch that must flag the same pixel before it
# is repaired. With --enhance every file is its own batch of one.
confirm_ratio = 0.9
"##
}
