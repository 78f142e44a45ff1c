use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Viewer and renderer configuration. Every field is optional in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub shadow_map_size: u32,
    pub resolution: Resolution,
    pub present_mode: PresentModeSetting,
    pub shadows_enabled: bool,
    pub auto_rotate: bool,
    /// Degrees per second.
    pub rotation_speed: f32,
    pub ambient_intensity: f32,
    /// Log unresolved uniform names at startup in release builds too.
    pub verify_uniforms: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            shadow_map_size: crate::renderer::shadow_map::DEFAULT_SHADOW_MAP_SIZE,
            resolution: Resolution::default(),
            present_mode: PresentModeSetting::default(),
            shadows_enabled: true,
            auto_rotate: true,
            rotation_speed: 10.0,
            ambient_intensity: 0.2,
            verify_uniforms: false,
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path(SETTINGS_FILE)
    }

    /// Never fails: a missing or broken file yields the defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::read(path) {
            Ok(settings) => {
                info!("Loaded render settings from {:?}", path);
                settings.validate()
            }
            Err(SettingsError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("No settings at {:?}; using defaults", path);
                Self::default()
            }
            Err(err) => {
                warn!("{err} ({:?}); using defaults", path);
                Self::default()
            }
        }
    }

    pub fn read(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub(crate) fn validate(mut self) -> Self {
        let defaults = Self::default();

        if self.shadow_map_size == 0 {
            warn!("shadow_map_size must be positive; using {}", defaults.shadow_map_size);
            self.shadow_map_size = defaults.shadow_map_size;
        }
        if self.resolution.width == 0 || self.resolution.height == 0 {
            warn!("resolution must be non-zero; using the default window size");
            self.resolution = defaults.resolution;
        }
        if !self.rotation_speed.is_finite() {
            warn!("rotation_speed must be finite; using {}", defaults.rotation_speed);
            self.rotation_speed = defaults.rotation_speed;
        }
        if !(self.ambient_intensity.is_finite() && self.ambient_intensity >= 0.0) {
            warn!(
                "ambient_intensity must be a non-negative number; using {}",
                defaults.ambient_intensity
            );
            self.ambient_intensity = defaults.ambient_intensity;
        }

        self
    }

    /// The configured mode if the surface offers it, else FIFO, else
    /// whatever the surface lists first.
    pub fn present_mode(&self, available: &[wgpu::PresentMode]) -> wgpu::PresentMode {
        let desired = wgpu::PresentMode::from(self.present_mode);
        if available.contains(&desired) {
            return desired;
        }
        warn!("Present mode {:?} is unsupported; falling back", desired);

        [wgpu::PresentMode::Fifo]
            .into_iter()
            .chain(available.iter().copied())
            .find(|mode| available.contains(mode))
            .unwrap_or(wgpu::PresentMode::Fifo)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeSetting {
    #[default]
    Fifo,
    FifoRelaxed,
    Immediate,
    Mailbox,
    AutoVsync,
    AutoNoVsync,
}

impl From<PresentModeSetting> for wgpu::PresentMode {
    fn from(setting: PresentModeSetting) -> Self {
        match setting {
            PresentModeSetting::Fifo => Self::Fifo,
            PresentModeSetting::FifoRelaxed => Self::FifoRelaxed,
            PresentModeSetting::Immediate => Self::Immediate,
            PresentModeSetting::Mailbox => Self::Mailbox,
            PresentModeSetting::AutoVsync => Self::AutoVsync,
            PresentModeSetting::AutoNoVsync => Self::AutoNoVsync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_replaces_invalid_values_with_defaults() {
        let invalid = RenderSettings {
            shadow_map_size: 0,
            resolution: Resolution {
                width: 0,
                height: 0,
            },
            rotation_speed: f32::NAN,
            ambient_intensity: -1.0,
            ..RenderSettings::default()
        };

        let validated = invalid.validate();

        assert_eq!(validated.shadow_map_size, 1024);
        assert_eq!(validated.resolution, Resolution::default());
        assert_eq!(validated.rotation_speed, 10.0);
        assert_eq!(validated.ambient_intensity, 0.2);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let settings: RenderSettings =
            serde_json::from_str(r#"{ "shadow_map_size": 2048, "auto_rotate": false }"#).unwrap();
        assert_eq!(settings.shadow_map_size, 2048);
        assert!(!settings.auto_rotate);
        assert!(settings.shadows_enabled);
        assert!(!settings.verify_uniforms);
        assert_eq!(settings.rotation_speed, 10.0);
        assert_eq!(settings.present_mode, PresentModeSetting::Fifo);
    }

    #[test]
    fn present_mode_parses_snake_case() {
        let settings: RenderSettings =
            serde_json::from_str(r#"{ "present_mode": "auto_no_vsync" }"#).unwrap();
        assert_eq!(settings.present_mode, PresentModeSetting::AutoNoVsync);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = RenderSettings::load_from_path("does/not/exist/settings.json");
        assert_eq!(settings.shadow_map_size, 1024);
        assert!(matches!(
            RenderSettings::read(Path::new("does/not/exist/settings.json")),
            Err(SettingsError::Io(_))
        ));
    }

    #[test]
    fn present_mode_falls_back_to_fifo_when_desired_missing() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let available = [wgpu::PresentMode::Immediate, wgpu::PresentMode::Fifo];

        assert_eq!(settings.present_mode(&available), wgpu::PresentMode::Fifo);
    }

    #[test]
    fn present_mode_uses_first_available_when_fifo_missing() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let available = [wgpu::PresentMode::Immediate];

        assert_eq!(
            settings.present_mode(&available),
            wgpu::PresentMode::Immediate
        );
    }
}
