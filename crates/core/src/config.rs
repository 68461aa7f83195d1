//! Export configuration.
//!
//! Every knob of reconciliation lives here. Configuration can be loaded from a
//! JSON file, environment variables, or built programmatically.

use doc_model::{DEFAULT_BASELINE_RATIO, DEFAULT_OVERLAY_FONT_SIZE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Settings for one export (and for color sampling while editing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Points added on every side of a run's box when masking it
    pub mask_margin: f32,
    /// Baseline offset of added text, as a fraction of its font size
    pub baseline_ratio: f32,
    /// Font size for overlay layers that do not carry one
    pub overlay_font_size: f32,
    /// Line height multiplier for added text without its own
    pub line_height_ratio: f32,
    /// Raster scale (pixels per point) used for color sampling
    pub sample_scale: f32,
    pub fetch_web_fonts: bool,
    pub font_fetch_timeout_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            mask_margin: 2.0,
            baseline_ratio: DEFAULT_BASELINE_RATIO,
            overlay_font_size: DEFAULT_OVERLAY_FONT_SIZE,
            line_height_ratio: 1.2,
            sample_scale: 2.0,
            fetch_web_fonts: true,
            font_fetch_timeout_secs: 10,
        }
    }
}

impl ExportConfig {
    pub fn with_mask_margin(mut self, margin: f32) -> Self {
        self.mask_margin = margin;
        self
    }

    pub fn with_baseline_ratio(mut self, ratio: f32) -> Self {
        self.baseline_ratio = ratio;
        self
    }

    pub fn with_overlay_font_size(mut self, size: f32) -> Self {
        self.overlay_font_size = size;
        self
    }

    pub fn with_line_height_ratio(mut self, ratio: f32) -> Self {
        self.line_height_ratio = ratio;
        self
    }

    pub fn with_sample_scale(mut self, scale: f32) -> Self {
        self.sample_scale = scale;
        self
    }

    /// Disables (or re-enables) fetching the web-font allowlist.
    pub fn with_web_fonts(mut self, enabled: bool) -> Self {
        self.fetch_web_fonts = enabled;
        self
    }

    pub fn with_font_fetch_timeout(mut self, secs: u64) -> Self {
        self.font_fetch_timeout_secs = secs;
        self
    }

    pub fn font_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.font_fetch_timeout_secs)
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `INKPATCH_MASK_MARGIN`: mask margin in points (default: 2)
    /// - `INKPATCH_BASELINE_RATIO`: added-text baseline ratio (default: 0.75)
    /// - `INKPATCH_SAMPLE_SCALE`: sampling raster scale (default: 2)
    /// - `INKPATCH_OFFLINE`: `1`/`true` disables web-font fetching
    /// - `INKPATCH_FONT_TIMEOUT_SECS`: web-font fetch timeout (default: 10)
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("INKPATCH_MASK_MARGIN") {
            config.mask_margin = parse_non_negative("INKPATCH_MASK_MARGIN", &val)?;
        }

        if let Ok(val) = std::env::var("INKPATCH_BASELINE_RATIO") {
            config.baseline_ratio = parse_non_negative("INKPATCH_BASELINE_RATIO", &val)?;
        }

        if let Ok(val) = std::env::var("INKPATCH_SAMPLE_SCALE") {
            let scale = parse_non_negative("INKPATCH_SAMPLE_SCALE", &val)?;
            if scale == 0.0 {
                return Err(ConfigError::InvalidValue("INKPATCH_SAMPLE_SCALE".to_string()));
            }
            config.sample_scale = scale;
        }

        if let Ok(val) = std::env::var("INKPATCH_OFFLINE") {
            let offline = match val.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                _ => return Err(ConfigError::InvalidValue("INKPATCH_OFFLINE".to_string())),
            };
            config.fetch_web_fonts = !offline;
        }

        if let Ok(val) = std::env::var("INKPATCH_FONT_TIMEOUT_SECS") {
            config.font_fetch_timeout_secs = val
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue("INKPATCH_FONT_TIMEOUT_SECS".to_string()))?;
        }

        Ok(config)
    }

    /// Loads configuration from a JSON file. Missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("mask_margin", self.mask_margin >= 0.0),
            ("baseline_ratio", self.baseline_ratio >= 0.0),
            ("overlay_font_size", self.overlay_font_size > 0.0),
            ("line_height_ratio", self.line_height_ratio > 0.0),
            ("sample_scale", self.sample_scale > 0.0),
        ];
        match checks.iter().find(|(_, ok)| !ok) {
            Some((key, _)) => Err(ConfigError::InvalidValue((*key).to_string())),
            None => Ok(()),
        }
    }
}

fn parse_non_negative(key: &str, value: &str) -> Result<f32, ConfigError> {
    value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| ConfigError::InvalidValue(key.to_string()))
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
