//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Autonomous hexapod control stack: gait engine, obstacle avoidance, and
/// an MJPEG monitoring server.
#[derive(Parser, Debug)]
#[command(name = "hexapod_control", version, about)]
pub struct Cli {
    /// Operating mode.
    #[arg(value_enum, default_value_t = Mode::Manual)]
    pub mode: Mode,

    /// Path to a TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// HTTP streaming server port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Actuator bus serial device path.
    #[arg(long)]
    pub device: Option<String>,

    /// Actuator bus baud rate.
    #[arg(long)]
    pub baud: Option<u32>,

    /// Camera capture width in pixels.
    #[arg(long = "camera-width")]
    pub camera_width: Option<u32>,

    /// Camera capture height in pixels.
    #[arg(long = "camera-height")]
    pub camera_height: Option<u32>,

    /// Camera capture framerate.
    #[arg(long = "camera-fps")]
    pub camera_fps: Option<u32>,

    /// Minimum contour area, in pixels squared, to count as an obstacle.
    #[arg(long = "min-area")]
    pub min_area: Option<u32>,
}

/// Selects which orchestrator loop runs: teleop keyboard control, or the
/// vision-driven autonomy policy.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Manual,
    Autonomous,
}

impl Cli {
    /// Apply the CLI overrides on top of an already-loaded configuration.
    /// CLI flags take precedence over the file/environment layers.
    pub fn apply_overrides(&self, config: &mut crate::config::AppConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(device) = &self.device {
            config.serial.device = device.clone();
        }
        if let Some(baud) = self.baud {
            config.serial.baud = baud;
        }
        if let Some(w) = self.camera_width {
            config.camera.width = w;
        }
        if let Some(h) = self.camera_height {
            config.camera.height = h;
        }
        if let Some(fps) = self.camera_fps {
            config.camera.fps = fps;
        }
        if let Some(min_area) = self.min_area {
            config.detector.min_area = min_area;
        }
    }
}
