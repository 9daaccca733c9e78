/// Geometry primitives for the loaded model
use nalgebra::{Matrix4, Point3, Vector3};

/// A 3D vertex with position and normal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
}

impl Vertex {
    pub fn new(x: f32, y: f32, z: f32, nx: f32, ny: f32, nz: f32) -> Self {
        Self {
            position: Point3::new(x, y, z),
            normal: Vector3::new(nx, ny, nz),
        }
    }
}

/// A triangle face defined by three vertices
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    pub vertices: [Vertex; 3],
}

impl Triangle {
    pub fn new(v0: Vertex, v1: Vertex, v2: Vertex) -> Self {
        Self {
            vertices: [v0, v1, v2],
        }
    }

    /// Face normal from the winding order, or `None` for a degenerate triangle.
    pub fn calculate_normal(&self) -> Option<Vector3<f32>> {
        let v0 = self.vertices[0].position;
        let v1 = self.vertices[1].position;
        let v2 = self.vertices[2].position;

        let n = (v1 - v0).cross(&(v2 - v0));
        let len = n.norm();
        if len < 1e-12 || !len.is_finite() {
            return None;
        }
        Some(n / len)
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    pub fn from_point(p: Point3<f32>) -> Self {
        Self { min: p, max: p }
    }

    pub fn grow(&mut self, p: &Point3<f32>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    pub fn merge(&mut self, other: &Aabb) {
        self.grow(&other.min);
        self.grow(&other.max);
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn extent(&self) -> Vector3<f32> {
        self.max - self.min
    }
}

/// A 3D mesh composed of triangles
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            triangles: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            triangles: Vec::with_capacity(capacity),
        }
    }

    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Bounding box over every vertex, `None` when the mesh is empty.
    pub fn bounds(&self) -> Option<Aabb> {
        let mut points = self
            .triangles
            .iter()
            .flat_map(|t| t.vertices.iter().map(|v| v.position));
        let mut aabb = Aabb::from_point(points.next()?);
        for p in points {
            aabb.grow(&p);
        }
        Some(aabb)
    }

    /// Shift every vertex by `offset`.
    pub fn translate(&mut self, offset: &Vector3<f32>) {
        for triangle in &mut self.triangles {
            for vertex in &mut triangle.vertices {
                vertex.position += *offset;
            }
        }
    }

    /// Bake an affine transform into the vertices. Normals go through the
    /// inverse transpose so non-uniform node scales stay correct.
    pub fn transform(&mut self, matrix: &Matrix4<f32>) {
        let normal_matrix = matrix
            .fixed_view::<3, 3>(0, 0)
            .clone_owned()
            .try_inverse()
            .map(|m| m.transpose());

        for triangle in &mut self.triangles {
            for vertex in &mut triangle.vertices {
                vertex.position = matrix.transform_point(&vertex.position);
                if let Some(nm) = &normal_matrix {
                    let n = nm * vertex.normal;
                    if n.norm() > 1e-12 {
                        vertex.normal = n.normalize();
                    }
                }
            }
        }
    }

    /// Axis-aligned cube centered at the origin
    #[cfg(test)]
    pub(crate) fn cube(size: f32) -> Self {
        let half = size / 2.0;
        let mut mesh = Self::with_capacity(12);

        // (normal, four corners counter-clockwise seen from outside)
        let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
            ([0.0, 0.0, 1.0], [[-half, -half, half], [half, -half, half], [half, half, half], [-half, half, half]]),
            ([0.0, 0.0, -1.0], [[half, -half, -half], [-half, -half, -half], [-half, half, -half], [half, half, -half]]),
            ([0.0, 1.0, 0.0], [[-half, half, half], [half, half, half], [half, half, -half], [-half, half, -half]]),
            ([0.0, -1.0, 0.0], [[-half, -half, -half], [half, -half, -half], [half, -half, half], [-half, -half, half]]),
            ([1.0, 0.0, 0.0], [[half, -half, half], [half, -half, -half], [half, half, -half], [half, half, half]]),
            ([-1.0, 0.0, 0.0], [[-half, -half, -half], [-half, -half, half], [-half, half, half], [-half, half, -half]]),
        ];

        for ([nx, ny, nz], corners) in faces {
            let v = |c: [f32; 3]| Vertex::new(c[0], c[1], c[2], nx, ny, nz);
            mesh.add_triangle(Triangle::new(v(corners[0]), v(corners[1]), v(corners[2])));
            mesh.add_triangle(Triangle::new(v(corners[0]), v(corners[2]), v(corners[3])));
        }

        mesh
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_bounds() {
        let cube = Mesh::cube(2.0);
        assert_eq!(cube.triangles.len(), 12);
        let bounds = cube.bounds().unwrap();
        assert!((bounds.center() - Point3::origin()).norm() < 1e-6);
        assert!((bounds.extent() - Vector3::new(2.0, 2.0, 2.0)).norm() < 1e-6);
    }

    #[test]
    fn test_cube_winding_matches_normals() {
        for triangle in Mesh::cube(1.0).triangles {
            let face = triangle.calculate_normal().unwrap();
            assert!((face - triangle.vertices[0].normal).norm() < 1e-5);
        }
    }

    #[test]
    fn test_translate_moves_bounds() {
        let mut cube = Mesh::cube(2.0);
        cube.translate(&Vector3::new(3.0, -1.0, 0.5));
        let center = cube.bounds().unwrap().center();
        assert!((center - Point3::new(3.0, -1.0, 0.5)).norm() < 1e-6);
    }

    #[test]
    fn test_degenerate_triangle_has_no_normal() {
        let v = Vertex::new(1.0, 1.0, 1.0, 0.0, 0.0, 1.0);
        assert!(Triangle::new(v, v, v).calculate_normal().is_none());
    }

    #[test]
    fn test_empty_mesh_has_no_bounds() {
        assert!(Mesh::new().bounds().is_none());
    }
}
