/// Viewer configuration, loadable from JSON
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::asset::AssetRef;
use crate::error::ConfigError;
use crate::projection::CameraConfig;
use crate::scene::{Lighting, Material, MaterialPolicy};
use crate::transform::MotionConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub asset: AssetRef,
    pub camera: CameraConfig,
    pub lighting: Lighting,
    pub motion: MotionConfig,
    /// When set, every loaded mesh is drawn with this material
    pub debug_material: Option<Material>,
    /// Refresh rate for hosts that pace their own loop
    pub target_fps: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            asset: AssetRef::default(),
            camera: CameraConfig::default(),
            lighting: Lighting::default(),
            motion: MotionConfig::default(),
            debug_material: None,
            target_fps: 30,
        }
    }
}

impl ViewerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn material_policy(&self) -> MaterialPolicy {
        MaterialPolicy::from_override(self.debug_material)
    }

    pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
        self.asset = AssetRef::new(asset);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(ViewerConfig::from_json_str("{}").unwrap(), ViewerConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = ViewerConfig::from_json_str(
            r#"{
                "asset": "models/part.stl",
                "motion": { "turns": 1.0 },
                "camera": { "mode": "orthographic" },
                "debug_material": { "color": [0.0, 1.0, 0.0], "metalness": 0.3, "roughness": 0.4 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.asset.as_str(), "models/part.stl");
        assert_eq!(config.motion.turns, 1.0);
        assert_eq!(config.motion.scale_growth, 0.5);
        assert_eq!(config.camera.fov_degrees, 75.0);
        assert_eq!(
            config.material_policy(),
            MaterialPolicy::DebugOverride(Material::debug_green())
        );
    }

    #[test]
    fn test_bad_json_is_error() {
        assert!(matches!(
            ViewerConfig::from_json_str("{ asset: }"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            ViewerConfig::from_path("/nonexistent/scroll3d.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
