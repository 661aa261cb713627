//! Layered application configuration.
//!
//! Configuration is loaded from (in order of precedence, lowest to highest):
//!
//! 1. Built-in defaults (via `#[serde(default = ...)]`)
//! 2. A TOML file (default `hexapod.toml`, overridable with `--config`)
//! 3. Environment variables prefixed `HEXAPOD_`, nested keys joined by `_`
//! 4. CLI flags, merged in by the caller after [`AppConfig::load_from`]
//!
//! # Environment variable overrides
//!
//! Each config section owns its own `HEXAPOD_<SECTION>_` prefix, and
//! whatever remains of the variable name becomes the field name verbatim
//! (lower-cased), so multi-word fields survive intact:
//!
//! ```text
//! HEXAPOD_SERIAL_DEVICE=/dev/ttyUSB1
//! HEXAPOD_SERIAL_BAUD=1000000
//! HEXAPOD_SERVER_PORT=9000
//! HEXAPOD_DETECTOR_STOP_DISTANCE_THRESHOLD=0.5
//! HEXAPOD_CAMERA_JPEG_QUALITY=80
//! ```
//!
//! Validation happens once, immediately after merging, and before any
//! hardware resource (serial port, camera subprocess, HTTP listener) is
//! opened.

use std::path::Path;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::HexError;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            camera: CameraConfig::default(),
            detector: DetectorConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Actuator bus connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            baud: default_baud(),
        }
    }
}

/// Camera capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

/// Obstacle detector thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default = "default_min_area")]
    pub min_area: u32,
    #[serde(default = "default_stop_threshold")]
    pub stop_distance_threshold: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_area: default_min_area(),
            stop_distance_threshold: default_stop_threshold(),
        }
    }
}

/// HTTP streaming server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

fn default_device() -> String {
    "/dev/ttyUSB0".to_string()
}
fn default_baud() -> u32 {
    1_000_000
}
fn default_width() -> u32 {
    640
}
fn default_height() -> u32 {
    240
}
fn default_fps() -> u32 {
    10
}
fn default_jpeg_quality() -> u8 {
    60
}
fn default_min_area() -> u32 {
    4000
}
fn default_stop_threshold() -> f32 {
    0.65
}
fn default_port() -> u16 {
    8080
}

impl AppConfig {
    /// Load configuration from `hexapod.toml` in the current directory and
    /// `HEXAPOD_`-prefixed environment variables, then validate.
    pub fn load() -> Result<Self, HexError> {
        Self::load_from("hexapod.toml")
    }

    /// Load configuration from a specific file path, merging environment
    /// overrides on top, then validate.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, HexError> {
        // `Env::prefixed(..).split("_")` would split every underscore in the
        // remaining key, breaking multi-word field names like
        // `stop_distance_threshold` into `stop.distance.threshold`. Instead,
        // each section gets its own prefix and maps its remaining key
        // straight to `<section>.<field>`, underscores and all.
        let section_env = |section: &'static str| {
            Env::prefixed(&format!("HEXAPOD_{}_", section.to_uppercase()))
                .map(move |key| format!("{section}.{}", key.as_str().to_lowercase()).into())
        };

        let config: Self = Figment::from(figment::providers::Serialized::defaults(
            AppConfig::default(),
        ))
        .merge(Toml::file(path.as_ref()))
        .merge(section_env("serial"))
        .merge(section_env("camera"))
        .merge(section_env("detector"))
        .merge(section_env("server"))
        .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration. Must be called before any hardware resource
    /// is opened.
    pub fn validate(&self) -> Result<(), HexError> {
        if self.serial.baud == 0 {
            return Err(HexError::Config(
                "serial.baud must be non-zero".to_string(),
            ));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(HexError::Config(
                "camera.width and camera.height must be non-zero".to_string(),
            ));
        }
        if self.camera.fps == 0 {
            return Err(HexError::Config("camera.fps must be non-zero".to_string()));
        }
        if self.detector.min_area == 0 {
            return Err(HexError::Config(
                "detector.min_area must be non-zero".to_string(),
            ));
        }
        if !(self.detector.stop_distance_threshold > 0.0
            && self.detector.stop_distance_threshold <= 1.0)
        {
            return Err(HexError::Config(
                "detector.stop_distance_threshold must be in (0, 1]".to_string(),
            ));
        }
        if self.server.port == 0 {
            return Err(HexError::Config(
                "server.port must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_camera_dimensions_rejected() {
        let mut cfg = AppConfig::default();
        cfg.camera.width = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_min_area_rejected() {
        let mut cfg = AppConfig::default();
        cfg.detector.min_area = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn stop_threshold_out_of_range_rejected() {
        let mut cfg = AppConfig::default();
        cfg.detector.stop_distance_threshold = 1.5;
        assert!(cfg.validate().is_err());

        cfg.detector.stop_distance_threshold = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_from_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from("does-not-exist.toml").expect("defaults should load");
        assert_eq!(config.server.port, default_port());
    }
}
