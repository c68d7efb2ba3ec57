use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use palette::{LinSrgba, Srgb, Srgba};
use serde::Deserialize;

use crate::carousel::tween::Easing;
use crate::error::CarouselError;
use crate::events::PointerKind;

/// Element box as fractions of the window.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SurfaceBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for SurfaceBox {
    fn default() -> Self {
        Self {
            left: 0.2,
            top: 0.15,
            width: 0.6,
            height: 0.7,
        }
    }
}

impl SurfaceBox {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("left", self.left),
            ("top", self.top),
            ("width", self.width),
            ("height", self.height),
        ] {
            ensure!(
                value.is_finite() && (0.0..=1.0).contains(&value),
                "surface.{name} must be within [0, 1]"
            );
        }
        ensure!(
            self.width > 0.0 && self.height > 0.0,
            "surface width and height must be positive"
        );
        ensure!(
            self.left + self.width <= 1.0 + f32::EPSILON
                && self.top + self.height <= 1.0 + f32::EPSILON,
            "surface box must fit inside the window"
        );
        Ok(())
    }
}

/// Crossfade ramp used for every advance.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct TransitionSettings {
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub easing: Easing,
}

impl Default for TransitionSettings {
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(1500),
            easing: Easing::ExpoInOut,
        }
    }
}

/// First-paint reveal timeline.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct RevealSettings {
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub label_duration: Duration,
    #[serde(with = "humantime_serde")]
    pub label_stagger: Duration,
    pub label_easing: Easing,
    #[serde(with = "humantime_serde")]
    pub progress_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub progress_duration: Duration,
    pub progress_easing: Easing,
}

impl Default for RevealSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            label_duration: Duration::from_secs(3),
            label_stagger: Duration::from_millis(20),
            label_easing: Easing::ELASTIC_OUT,
            progress_delay: Duration::from_millis(200),
            progress_duration: Duration::from_secs(2),
            progress_easing: Easing::ExpoInOut,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct WheelSettings {
    pub stability: usize,
    pub sensitivity: f32,
    pub tolerance: f32,
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
}

impl Default for WheelSettings {
    fn default() -> Self {
        Self {
            stability: 8,
            sensitivity: 100.0,
            tolerance: 1.1,
            delay: Duration::from_millis(150),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct DragSettings {
    pub threshold_px: f32,
}

impl Default for DragSettings {
    fn default() -> Self {
        Self { threshold_px: 3.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct InputSettings {
    /// `fine` enables the wheel, `coarse` enables horizontal drags.
    pub pointer: PointerKind,
    pub wheel: WheelSettings,
    pub drag: DragSettings,
}

/// Static dissolve mask sampled by the shader.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct NoiseSettings {
    pub width: u32,
    pub height: u32,
    pub seed: Option<u64>,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            width: 16,
            height: 24,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct WindowSettings {
    pub title: String,
    pub fullscreen: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Photo Carousel".to_owned(),
            fullscreen: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Images in carousel order; relative paths resolve against the config file.
    pub images: Vec<PathBuf>,
    /// Optional caption per image.
    pub labels: Vec<String>,
    /// Optional clear colour per image (`#rrggbb` or `#rrggbbaa`).
    pub backgrounds: Vec<String>,
    /// Clear colour before the first image and for images without one.
    pub default_background: String,
    pub label_color: String,
    /// Font family for captions; falls back to the system sans-serif.
    pub font: Option<String>,
    /// Camera distance from the surface plane, in pixels.
    pub camera_distance: f32,
    pub surface: SurfaceBox,
    pub transition: TransitionSettings,
    pub reveal: RevealSettings,
    pub input: InputSettings,
    pub noise: NoiseSettings,
    pub window: WindowSettings,
    /// Maximum number of concurrent image decodes in the loader.
    pub loader_max_concurrent_decodes: usize,
    /// Keyboard scrubbing of `progress` and manual advances.
    pub debug_panel: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            images: Vec::new(),
            labels: Vec::new(),
            backgrounds: Vec::new(),
            default_background: "#ffffff".to_owned(),
            label_color: "#111111".to_owned(),
            font: None,
            camera_distance: 800.0,
            surface: SurfaceBox::default(),
            transition: TransitionSettings::default(),
            reveal: RevealSettings::default(),
            input: InputSettings::default(),
            noise: NoiseSettings::default(),
            window: WindowSettings::default(),
            loader_max_concurrent_decodes: 4,
            debug_panel: false,
        }
    }
}

impl Configuration {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Parses the file and resolves image paths relative to its directory.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)?;
        let mut cfg = Self::from_yaml_str(&s)?;
        if let Some(base) = path.parent() {
            for image in &mut cfg.images {
                if image.is_relative() {
                    *image = base.join(&*image);
                }
            }
        }
        Ok(cfg)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        let images = self.images.len();
        if images < 2 {
            return Err(CarouselError::TooFewImages { count: images }.into());
        }
        if !self.labels.is_empty() && self.labels.len() != images {
            return Err(CarouselError::LabelCountMismatch {
                labels: self.labels.len(),
                images,
            }
            .into());
        }
        if !self.backgrounds.is_empty() && self.backgrounds.len() != images {
            return Err(CarouselError::BackgroundCountMismatch {
                backgrounds: self.backgrounds.len(),
                images,
            }
            .into());
        }
        for value in self
            .backgrounds
            .iter()
            .chain([&self.default_background, &self.label_color])
        {
            parse_color(value).context("invalid colour configuration")?;
        }
        ensure!(
            self.camera_distance.is_finite() && self.camera_distance > 0.0,
            "camera-distance must be positive"
        );
        ensure!(
            self.loader_max_concurrent_decodes > 0,
            "loader-max-concurrent-decodes must be greater than zero"
        );
        ensure!(
            !self.transition.duration.is_zero(),
            "transition.duration must be greater than zero"
        );
        ensure!(
            !self.reveal.enabled
                || (!self.reveal.label_duration.is_zero()
                    && !self.reveal.progress_duration.is_zero()),
            "reveal durations must be greater than zero"
        );
        ensure!(
            self.input.wheel.stability > 0,
            "input.wheel.stability must be greater than zero"
        );
        ensure!(
            self.input.drag.threshold_px.is_finite() && self.input.drag.threshold_px >= 0.0,
            "input.drag.threshold-px must not be negative"
        );
        ensure!(
            self.noise.width > 0 && self.noise.height > 0,
            "noise dimensions must be greater than zero"
        );
        self.surface
            .validate()
            .context("invalid surface configuration")?;
        Ok(self)
    }

    pub fn background_colors(&self) -> Result<Vec<LinSrgba>, CarouselError> {
        self.backgrounds.iter().map(|c| parse_color(c)).collect()
    }
}

/// Parses `#rrggbb` / `#rrggbbaa` into linear RGBA.
pub fn parse_color(value: &str) -> Result<LinSrgba, CarouselError> {
    let invalid = || CarouselError::InvalidColor {
        value: value.to_owned(),
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }
    if let Ok(rgba) = Srgba::<u8>::from_str(trimmed) {
        let rgba: Srgba<f32> = rgba.into_format();
        return Ok(rgba.into_linear());
    }
    let rgb = Srgb::<u8>::from_str(trimmed).map_err(|_| invalid())?;
    let rgba: Srgba<f32> = Srgba::new(rgb.red, rgb.green, rgb.blue, 255).into_format();
    Ok(rgba.into_linear())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colours() {
        let white = parse_color("#ffffff").unwrap();
        assert!((white.red - 1.0).abs() < 1e-6 && (white.alpha - 1.0).abs() < 1e-6);
        let half = parse_color("#00000080").unwrap();
        assert!((half.alpha - 128.0 / 255.0).abs() < 1e-3);
        assert!(matches!(
            parse_color("teal"),
            Err(CarouselError::InvalidColor { .. })
        ));
    }

    #[test]
    fn surface_must_fit() {
        let mut surface = SurfaceBox::default();
        assert!(surface.validate().is_ok());
        surface.left = 0.6;
        assert!(surface.validate().is_err());
    }
}
