/// Model transforms and the scroll-progress mapping
use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

/// Rotation state around three axes (in radians)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationState {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl RotationState {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }
}

impl Default for RotationState {
    fn default() -> Self {
        Self::zero()
    }
}

/// How scroll progress drives the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Full turns about Z across the whole page.
    pub turns: f32,
    /// Rotation about Y reached at the bottom of the page.
    pub tilt_degrees: f32,
    pub base_scale: f32,
    /// Scale added at the bottom of the page.
    pub scale_growth: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            turns: 2.0,
            tilt_degrees: 90.0,
            base_scale: 1.0,
            scale_growth: 0.5,
        }
    }
}

/// Rotation and uniform scale applied to the model root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelTransform {
    pub rotation: RotationState,
    pub scale: f32,
}

impl ModelTransform {
    pub fn identity() -> Self {
        Self {
            rotation: RotationState::zero(),
            scale: 1.0,
        }
    }

    /// Pure mapping from scroll progress. Progress outside [0, 1] is clamped
    /// and NaN counts as the top of the page.
    pub fn from_progress(progress: f32, motion: &MotionConfig) -> Self {
        let p = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
        Self {
            rotation: RotationState::new(
                0.0,
                p * motion.tilt_degrees * PI / 180.0,
                p * motion.turns * TAU,
            ),
            scale: motion.base_scale + p * motion.scale_growth,
        }
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        Transform::rotation_matrix(&self.rotation)
            * Transform::scale_matrix(self.scale, self.scale, self.scale)
    }
}

impl Default for ModelTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Transform builder for 3D transformations
pub struct Transform;

impl Transform {
    /// Euler rotation in X, Y, Z order (`Rx * Ry * Rz`)
    pub fn rotation_matrix(rotation: &RotationState) -> Matrix4<f32> {
        let rx = Matrix4::new_rotation(Vector3::new(rotation.x, 0.0, 0.0));
        let ry = Matrix4::new_rotation(Vector3::new(0.0, rotation.y, 0.0));
        let rz = Matrix4::new_rotation(Vector3::new(0.0, 0.0, rotation.z));

        rx * ry * rz
    }

    pub fn scale_matrix(sx: f32, sy: f32, sz: f32) -> Matrix4<f32> {
        Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz))
    }

    /// Create a model-view-projection matrix
    pub fn mvp_matrix(
        model: &Matrix4<f32>,
        view: &Matrix4<f32>,
        projection: &Matrix4<f32>,
    ) -> Matrix4<f32> {
        projection * view * model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distance(a: &ModelTransform, b: &ModelTransform) -> f32 {
        (a.rotation.x - b.rotation.x).abs()
            .max((a.rotation.y - b.rotation.y).abs())
            .max((a.rotation.z - b.rotation.z).abs())
            .max((a.scale - b.scale).abs())
    }

    #[test]
    fn test_identity_rotation() {
        let matrix = Transform::rotation_matrix(&RotationState::zero());
        assert!((matrix - Matrix4::identity()).norm() < 1e-6);
    }

    #[test]
    fn test_progress_endpoints() {
        let motion = MotionConfig::default();
        let top = ModelTransform::from_progress(0.0, &motion);
        assert_eq!(top, ModelTransform::identity());

        let bottom = ModelTransform::from_progress(1.0, &motion);
        assert!((bottom.rotation.z - 4.0 * PI).abs() < 1e-5);
        assert!((bottom.rotation.y - PI / 2.0).abs() < 1e-5);
        assert!((bottom.scale - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_progress_is_deterministic() {
        let motion = MotionConfig::default();
        for i in 0..=100 {
            let p = i as f32 / 100.0;
            assert_eq!(
                ModelTransform::from_progress(p, &motion),
                ModelTransform::from_progress(p, &motion)
            );
        }
    }

    #[test]
    fn test_progress_is_lipschitz() {
        // Steepest component is the Z turn rate, turns * 2pi per unit progress.
        let motion = MotionConfig::default();
        let bound = motion.turns * TAU;
        let eps = 1e-3;
        for i in 0..1000 {
            let p = i as f32 / 1000.0;
            let a = ModelTransform::from_progress(p, &motion);
            let b = ModelTransform::from_progress(p + eps, &motion);
            assert!(distance(&a, &b) <= bound * eps * 1.01);
        }
    }

    #[test]
    fn test_out_of_range_progress_is_clamped() {
        let motion = MotionConfig::default();
        assert_eq!(
            ModelTransform::from_progress(-3.0, &motion),
            ModelTransform::from_progress(0.0, &motion)
        );
        assert_eq!(
            ModelTransform::from_progress(7.0, &motion),
            ModelTransform::from_progress(1.0, &motion)
        );
        assert_eq!(
            ModelTransform::from_progress(f32::NAN, &motion),
            ModelTransform::identity()
        );
    }

    #[test]
    fn test_matrix_scales_uniformly() {
        let t = ModelTransform {
            rotation: RotationState::zero(),
            scale: 2.0,
        };
        let m = t.matrix();
        let p = m.transform_point(&nalgebra::Point3::new(1.0, 1.0, 1.0));
        assert!((p.coords - Vector3::new(2.0, 2.0, 2.0)).norm() < 1e-6);
    }
}
