/// Asset references, format detection and decoding into a model root
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LoadError;
use crate::glb;
use crate::scene::{Material, MaterialPolicy, MeshPart, ModelNode};
use crate::stl;

/// Location of the binary asset: a URL on the web, a path natively
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetRef(String);

impl AssetRef {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, used as the model name
    pub fn file_name(&self) -> &str {
        self.0
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(self.0.as_str())
    }
}

impl Default for AssetRef {
    fn default() -> Self {
        Self::new("/Greenopenmodel.glb")
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetFormat {
    Glb,
    Stl,
}

/// Sniff the container format from the leading bytes
pub fn detect_format(data: &[u8]) -> Option<AssetFormat> {
    if glb::is_glb(data) {
        Some(AssetFormat::Glb)
    } else if data.starts_with(b"solid") || data.len() >= 84 {
        Some(AssetFormat::Stl)
    } else {
        None
    }
}

/// Decode raw bytes into mesh parts
pub fn decode_asset(data: &[u8]) -> Result<Vec<MeshPart>, LoadError> {
    let parts = match detect_format(data) {
        Some(AssetFormat::Glb) => glb::parse_glb(data)?,
        Some(AssetFormat::Stl) => vec![MeshPart {
            name: None,
            mesh: stl::parse_stl(data)?,
            material: Material::default(),
        }],
        None => {
            return Err(LoadError::Decode(format!(
                "unrecognized asset format ({} bytes)",
                data.len()
            )))
        }
    };

    if parts.iter().all(|p| p.mesh.is_empty()) {
        return Err(LoadError::Decode("asset contains no geometry".to_string()));
    }
    Ok(parts)
}

/// Decode, apply the material policy and center the model on the origin.
pub fn prepare_model(
    asset: &AssetRef,
    data: &[u8],
    policy: &MaterialPolicy,
) -> Result<ModelNode, LoadError> {
    let parts = decode_asset(data)?;
    let mut node = ModelNode::new(Some(asset.file_name().to_string()), parts);
    node.apply_material_policy(policy);
    node.center_on_origin();
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn offset_cube_stl() -> Vec<u8> {
        let mut mesh = crate::geometry::Mesh::cube(2.0);
        mesh.translate(&nalgebra::Vector3::new(10.0, 10.0, 10.0));
        let mut data = vec![0u8; 80];
        data.extend_from_slice(&(mesh.triangles.len() as u32).to_le_bytes());
        for t in &mesh.triangles {
            let n = t.vertices[0].normal;
            for c in [n.x, n.y, n.z] {
                data.extend_from_slice(&c.to_le_bytes());
            }
            for v in &t.vertices {
                for c in [v.position.x, v.position.y, v.position.z] {
                    data.extend_from_slice(&c.to_le_bytes());
                }
            }
            data.extend_from_slice(&[0, 0]);
        }
        data
    }

    #[test]
    fn test_file_name() {
        assert_eq!(AssetRef::new("/models/Greenopenmodel.glb").file_name(), "Greenopenmodel.glb");
        assert_eq!(AssetRef::new("C:\\a\\b.stl").file_name(), "b.stl");
        assert_eq!(AssetRef::new("plain").file_name(), "plain");
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(b"glTF...."), Some(AssetFormat::Glb));
        assert_eq!(detect_format(b"solid x"), Some(AssetFormat::Stl));
        assert_eq!(detect_format(b"PK"), None);
    }

    #[test]
    fn test_prepare_model_centers_and_overrides() {
        let data = offset_cube_stl();
        let policy = MaterialPolicy::DebugOverride(Material::debug_green());
        let node = prepare_model(&AssetRef::new("cube.stl"), &data, &policy).unwrap();
        assert_eq!(node.name.as_deref(), Some("cube.stl"));
        assert_eq!(node.triangle_count(), 12);
        assert!((node.bounds().unwrap().center() - Point3::origin()).norm() < 1e-4);
        assert_eq!(node.parts[0].material, Material::debug_green());
    }

    #[test]
    fn test_empty_geometry_is_decode_error() {
        let mut data = vec![0u8; 84];
        data[80..84].copy_from_slice(&0u32.to_le_bytes());
        assert!(matches!(decode_asset(&data), Err(LoadError::Decode(_))));
    }

    #[test]
    fn test_unknown_format_is_decode_error() {
        assert!(matches!(decode_asset(b"nope"), Err(LoadError::Decode(_))));
    }
}
