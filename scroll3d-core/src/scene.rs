/// Scene graph: camera, lights and at most one model root
use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};

use crate::geometry::{Aabb, Mesh};
use crate::projection::Camera;
use crate::transform::ModelTransform;

/// Surface appearance of a mesh part
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub color: [f32; 3],
    pub metalness: f32,
    pub roughness: f32,
}

impl Material {
    /// Bright green used to make a freshly loaded model easy to spot
    pub fn debug_green() -> Self {
        Self {
            color: [0.0, 1.0, 0.0],
            metalness: 0.3,
            roughness: 0.4,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: [0.8, 0.8, 0.8],
            metalness: 0.0,
            roughness: 1.0,
        }
    }
}

/// Whether a loaded asset keeps its own materials.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MaterialPolicy {
    #[default]
    AsAuthored,
    DebugOverride(Material),
}

impl MaterialPolicy {
    pub fn from_override(material: Option<Material>) -> Self {
        material.map_or(MaterialPolicy::AsAuthored, MaterialPolicy::DebugOverride)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientLight {
    pub color: [f32; 3],
    pub intensity: f32,
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            intensity: 0.6,
        }
    }
}

/// Directional light shining from `position` towards the origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionalLight {
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: [f32; 3],
}

impl DirectionalLight {
    /// Unit vector from the surface towards the light
    pub fn direction(&self) -> Vector3<f32> {
        let [x, y, z] = self.position;
        let v = Vector3::new(x, y, z);
        if v.norm() < 1e-6 {
            Vector3::z()
        } else {
            v.normalize()
        }
    }
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            intensity: 0.8,
            position: [5.0, 5.0, 5.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Lighting {
    pub ambient: AmbientLight,
    pub directional: DirectionalLight,
}

/// One drawable piece of a model
#[derive(Debug, Clone, PartialEq)]
pub struct MeshPart {
    pub name: Option<String>,
    pub mesh: Mesh,
    pub material: Material,
}

/// Root node of a loaded model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelNode {
    pub name: Option<String>,
    pub parts: Vec<MeshPart>,
    pub transform: ModelTransform,
    /// Translation baked into the vertices by [`ModelNode::center_on_origin`]
    pub centering_offset: Vector3<f32>,
}

impl ModelNode {
    pub fn new(name: Option<String>, parts: Vec<MeshPart>) -> Self {
        Self {
            name,
            parts,
            transform: ModelTransform::identity(),
            centering_offset: Vector3::zeros(),
        }
    }

    pub fn bounds(&self) -> Option<Aabb> {
        let mut boxes = self.parts.iter().filter_map(|p| p.mesh.bounds());
        let mut aabb = boxes.next()?;
        for b in boxes {
            aabb.merge(&b);
        }
        Some(aabb)
    }

    /// Translate the geometry so its bounding-box center sits at the origin.
    pub fn center_on_origin(&mut self) {
        let Some(bounds) = self.bounds() else {
            return;
        };
        let offset = -bounds.center().coords;
        log::debug!("centering model of size {:?} by {:?}", bounds.extent(), offset);
        for part in &mut self.parts {
            part.mesh.translate(&offset);
        }
        self.centering_offset += offset;
    }

    pub fn apply_material_policy(&mut self, policy: &MaterialPolicy) {
        if let MaterialPolicy::DebugOverride(material) = policy {
            for part in &mut self.parts {
                part.material = *material;
            }
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.parts.iter().map(|p| p.mesh.triangles.len()).sum()
    }

    pub fn model_matrix(&self) -> Matrix4<f32> {
        self.transform.matrix()
    }
}

/// Resources released by [`SceneGraph`], in release order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneResource {
    ModelRoot,
    Lights,
    Camera,
}

/// Renderable hierarchy owned by one viewer session
#[derive(Debug)]
pub struct SceneGraph {
    camera: Option<Camera>,
    lighting: Option<Lighting>,
    model: Option<ModelNode>,
    released: Vec<SceneResource>,
}

impl SceneGraph {
    pub fn new(camera: Camera, lighting: Lighting) -> Self {
        Self {
            camera: Some(camera),
            lighting: Some(lighting),
            model: None,
            released: Vec::new(),
        }
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    pub fn lighting(&self) -> Option<&Lighting> {
        self.lighting.as_ref()
    }

    pub fn model(&self) -> Option<&ModelNode> {
        self.model.as_ref()
    }

    pub fn model_count(&self) -> usize {
        usize::from(self.model.is_some())
    }

    pub fn is_disposed(&self) -> bool {
        self.camera.is_none() && self.lighting.is_none() && self.model.is_none()
    }

    /// Releases recorded so far, oldest first
    pub fn released(&self) -> &[SceneResource] {
        &self.released
    }

    /// Replace the model root. The previous root is released before the new
    /// one is attached.
    pub fn set_model(&mut self, node: ModelNode) {
        if self.is_disposed() {
            log::warn!("dropping model set on a disposed scene");
            return;
        }
        self.release_model();
        log::debug!(
            "attaching model {:?} ({} triangles)",
            node.name,
            node.triangle_count()
        );
        self.model = Some(node);
    }

    /// Set rotation and scale of the model root; no-op without a model.
    pub fn apply_transform(&mut self, transform: ModelTransform) {
        if let Some(model) = self.model.as_mut() {
            model.transform = transform;
        }
    }

    /// Release model root, lights, then camera. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        self.release_model();
        if self.lighting.take().is_some() {
            self.released.push(SceneResource::Lights);
        }
        if self.camera.take().is_some() {
            self.released.push(SceneResource::Camera);
            log::debug!("scene disposed");
        }
    }

    fn release_model(&mut self) {
        if let Some(old) = self.model.take() {
            log::debug!("releasing model {:?}", old.name);
            self.released.push(SceneResource::ModelRoot);
        }
    }
}
