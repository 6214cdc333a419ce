use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backend::ExecutionMode;
use crate::error::ConfigError;

/// Hits at or beyond this distance are rejected. Also the "no hit" distance.
pub const MAXIMUM_DISTANCE: f32 = 1.0e4;
pub const EPSILON: f32 = 1.0e-4;
/// Every plane sits at `dot(p, normal) == PLANE_CONSTANT`.
pub const PLANE_CONSTANT: f32 = -2.0;

pub const SIZE_OF_RAY: usize = 6;
pub const SIZE_OF_INTERSECTION: usize = 8;
pub const SIZE_OF_PIXEL: usize = 3;
pub const SIZE_OF_CAMERA: usize = 19;

/// Session settings. Missing keys in a TOML file fall back to the defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub view_plane_distance: f32,
    pub eye: [f32; 3],
    pub look_at: [f32; 3],
    pub up: [f32; 3],
    /// World units travelled per frame while a movement key is held.
    pub movement_speed: f32,
    pub execution_mode: ExecutionMode,
    pub texture_path: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            view_plane_distance: 800.0,
            eye: [0.0, 1.0, -12.0],
            look_at: [0.0, 0.0, 0.0],
            up: [0.0, 1.0, 0.0],
            movement_speed: 0.25,
            execution_mode: ExecutionMode::Gpu,
            texture_path: None,
        }
    }
}

impl RenderConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "image size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if !(self.view_plane_distance > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "view_plane_distance must be positive, got {}",
                self.view_plane_distance
            )));
        }
        Ok(())
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: RenderConfig = toml::from_str(
            r#"
            width = 320
            height = 200
            execution_mode = "cpu"
            "#,
        )
        .unwrap();

        assert_eq!(config.width, 320);
        assert_eq!(config.height, 200);
        assert_eq!(config.execution_mode, ExecutionMode::Cpu);
        assert_eq!(config.view_plane_distance, RenderConfig::default().view_plane_distance);
        assert!(config.texture_path.is_none());
        assert_eq!(config.pixel_count(), 64_000);
    }

    #[test]
    fn zero_sized_image_is_rejected() {
        let config = RenderConfig {
            width: 0,
            ..RenderConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = RenderConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
