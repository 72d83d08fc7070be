//! Configuration loader - YAML manifest + .env settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("label '{label}': max_samples must be > 0")]
    ZeroSamples { label: String },
    #[error("label '{label}': stride must be >= 1")]
    ZeroStride { label: String },
    #[error("{name} must be a finite value >= 0, got {value}")]
    NegativeOffset { name: &'static str, value: f64 },
    #[error("transition_window must be >= 1")]
    ZeroTransitionWindow,
    #[error("invalid render setting: {0}")]
    Render(String),
    #[error("invalid intro setting: {0}")]
    Intro(String),
}

/// Main configuration loaded from flythrough.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub columns: ColumnNames,
    /// Column -> required value; rows that differ on any entry are dropped
    pub select: BTreeMap<String, String>,
    /// Gaussian sigma applied to each position axis before planning
    pub position_sigma: Option<f64>,
    pub planner: PlannerConfig,
    pub render: RenderConfig,
    pub intro: IntroConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            columns: ColumnNames::default(),
            select: BTreeMap::new(),
            position_sigma: Some(5.0),
            planner: PlannerConfig::default(),
            render: RenderConfig::default(),
            intro: IntroConfig::default(),
        }
    }
}

/// Which input columns hold the record fields
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub label: String,
    pub frame: String,
    pub order: String,
    pub x: String,
    pub y: String,
    pub z: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            label: "state".to_string(),
            frame: "fmCam1".to_string(),
            order: "fmCam1".to_string(),
            x: "comp0".to_string(),
            y: "comp1".to_string(),
            z: "comp2".to_string(),
        }
    }
}

/// Per-label decimation: keep at most `max_samples` raw records, then every `stride`-th
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSampling {
    pub max_samples: usize,
    pub stride: usize,
}

impl LabelSampling {
    pub fn new(max_samples: usize, stride: usize) -> Self {
        Self { max_samples, stride }
    }
}

/// Camera planner options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Labels absent from this map get no camera path
    pub labels: BTreeMap<String, LabelSampling>,
    pub azimuth_offset: f64,
    pub elevation_offset: f64,
    /// Added to the planned view distance when the pose is applied
    pub distance_offset: f64,
    /// Zero-opacity border width and Gaussian sigma, in records
    pub transition_window: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        let labels = [
            ("drink_left", LabelSampling::new(150, 1)),
            ("drink_right", LabelSampling::new(150, 1)),
            ("run_left", LabelSampling::new(400, 2)),
            ("run_right", LabelSampling::new(400, 2)),
        ]
        .into_iter()
        .map(|(label, sampling)| (label.to_string(), sampling))
        .collect();

        Self {
            labels,
            azimuth_offset: 8.0,
            elevation_offset: 10.0,
            distance_offset: 0.8,
            transition_window: 10,
        }
    }
}

impl PlannerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (label, sampling) in &self.labels {
            if sampling.max_samples == 0 {
                return Err(ConfigError::ZeroSamples { label: label.clone() });
            }
            if sampling.stride == 0 {
                return Err(ConfigError::ZeroStride { label: label.clone() });
            }
        }
        for (name, value) in [
            ("azimuth_offset", self.azimuth_offset),
            ("elevation_offset", self.elevation_offset),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::NegativeOffset { name, value });
            }
        }
        if !self.distance_offset.is_finite() {
            return Err(ConfigError::NegativeOffset {
                name: "distance_offset",
                value: self.distance_offset,
            });
        }
        if self.transition_window == 0 {
            return Err(ConfigError::ZeroTransitionWindow);
        }
        Ok(())
    }
}

/// Output video and scene appearance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub background: [u8; 3],
    pub colorize: bool,
    pub show_video: bool,
    /// Share of the canvas height given to the behavior frame panel
    pub video_fraction: f64,
    pub point_radius: f32,
    /// Point opacity; the marker is always opaque
    pub point_alpha: f32,
    pub marker_radius: f32,
    /// Draw x/y/z reference axes through the origin
    pub show_axes: bool,
    pub fov_degrees: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1440,
            fps: 30,
            background: [255, 255, 255],
            colorize: true,
            show_video: true,
            video_fraction: 0.2,
            point_radius: 0.004,
            point_alpha: 0.9,
            marker_radius: 0.02,
            show_axes: true,
            fov_degrees: 45.0,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Render(format!(
                "canvas size {}x{} is empty",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(ConfigError::Render("fps must be > 0".to_string()));
        }
        if !(0.0..1.0).contains(&self.video_fraction) {
            return Err(ConfigError::Render(format!(
                "video_fraction must be in [0, 1), got {}",
                self.video_fraction
            )));
        }
        if !(self.point_radius > 0.0 && self.marker_radius > 0.0) {
            return Err(ConfigError::Render("marker sizes must be > 0".to_string()));
        }
        if !(self.point_alpha > 0.0 && self.point_alpha <= 1.0) {
            return Err(ConfigError::Render(format!(
                "point_alpha must be in (0, 1], got {}",
                self.point_alpha
            )));
        }
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return Err(ConfigError::Render(format!(
                "fov_degrees must be in (0, 180), got {}",
                self.fov_degrees
            )));
        }
        Ok(())
    }

    /// Height of the 3-D view; the rest of the canvas is the video panel
    pub fn scene_height(&self) -> u32 {
        if !self.show_video {
            return self.height;
        }
        let panel = (self.height as f64 * self.video_fraction).round() as u32;
        self.height.saturating_sub(panel).max(1)
    }
}

/// Turntable sweep shown before the fly-through
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntroConfig {
    pub frames: usize,
    pub elevation: f64,
    pub distance: f64,
    /// Total azimuth travelled over the intro, in degrees
    pub sweep: f64,
    /// Per-label colours during the intro; off paints the cloud black
    pub colorize: bool,
}

impl Default for IntroConfig {
    fn default() -> Self {
        Self {
            frames: 600,
            elevation: 45.0,
            distance: 1.3,
            sweep: 180.0,
            colorize: false,
        }
    }
}

impl IntroConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames == 0 {
            return Err(ConfigError::Intro("frames must be > 0".to_string()));
        }
        if !(self.distance.is_finite() && self.distance > 0.0) {
            return Err(ConfigError::Intro(format!(
                "distance must be > 0, got {}",
                self.distance
            )));
        }
        if !(self.elevation.is_finite() && self.sweep.is_finite()) {
            return Err(ConfigError::Intro("angles must be finite".to_string()));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.planner.validate()?;
        self.render.validate()?;
        self.intro.validate()?;
        if let Some(sigma) = self.position_sigma {
            if !sigma.is_finite() || sigma < 0.0 {
                return Err(ConfigError::NegativeOffset {
                    name: "position_sigma",
                    value: sigma,
                });
            }
        }
        Ok(())
    }
}

/// Settings loaded from the environment / .env
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub ffmpeg_bin: Option<PathBuf>,
    pub log_dir: String,
}

impl Settings {
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        Settings {
            ffmpeg_bin: std::env::var("FFMPEG_BIN").ok().map(PathBuf::from),
            log_dir: std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
        }
    }
}
