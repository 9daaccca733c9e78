/// Binary glTF (GLB) decoding
///
/// Walks the default scene (or the first scene) so node transforms are baked
/// into the vertices, and keeps the PBR factors of each primitive's material.
/// Embedded images are never decoded; only buffers are resolved.
use gltf::mesh::Mode;
use nalgebra::{Matrix4, Point3, Vector3};

use crate::error::LoadError;
use crate::geometry::{Mesh, Triangle, Vertex};
use crate::scene::{Material, MeshPart};

/// Magic bytes at the start of every GLB container.
pub const GLB_MAGIC: &[u8; 4] = b"glTF";

pub fn is_glb(data: &[u8]) -> bool {
    data.starts_with(GLB_MAGIC)
}

/// Decode a GLB container into mesh parts, one per triangle primitive.
pub fn parse_glb(data: &[u8]) -> Result<Vec<MeshPart>, LoadError> {
    let gltf::Gltf { document, blob } =
        gltf::Gltf::from_slice(data).map_err(|e| LoadError::Decode(format!("invalid glTF: {}", e)))?;
    let buffers = gltf::import_buffers(&document, None, blob)
        .map_err(|e| LoadError::Decode(format!("invalid glTF buffers: {}", e)))?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| LoadError::Decode("glTF contains no scene".to_string()))?;

    let mut parts = Vec::new();
    for node in scene.nodes() {
        collect_node(&node, &Matrix4::identity(), &buffers, &mut parts)?;
    }

    if parts.is_empty() {
        return Err(LoadError::Decode("glTF contains no triangle primitives".to_string()));
    }
    Ok(parts)
}

fn collect_node(
    node: &gltf::Node,
    parent: &Matrix4<f32>,
    buffers: &[gltf::buffer::Data],
    parts: &mut Vec<MeshPart>,
) -> Result<(), LoadError> {
    let local = Matrix4::from(node.transform().matrix());
    let world = parent * local;

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != Mode::Triangles {
                log::debug!("skipping non-triangle primitive in mesh {:?}", mesh.name());
                continue;
            }
            let mut part_mesh = read_primitive(&primitive, buffers)?;
            if part_mesh.is_empty() {
                continue;
            }
            part_mesh.transform(&world);
            parts.push(MeshPart {
                name: mesh.name().map(str::to_string),
                mesh: part_mesh,
                material: material_of(&primitive.material()),
            });
        }
    }

    for child in node.children() {
        collect_node(&child, &world, buffers, parts)?;
    }
    Ok(())
}

fn read_primitive(
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
) -> Result<Mesh, LoadError> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));

    let positions: Vec<Point3<f32>> = reader
        .read_positions()
        .ok_or_else(|| LoadError::Decode("primitive has no POSITION attribute".to_string()))?
        .map(|p| Point3::new(p[0], p[1], p[2]))
        .collect();
    let normals: Option<Vec<Vector3<f32>>> = reader
        .read_normals()
        .map(|it| it.map(|n| Vector3::new(n[0], n[1], n[2])).collect());
    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };

    let mut mesh = Mesh::with_capacity(indices.len() / 3);
    for chunk in indices.chunks_exact(3) {
        let mut corners = [Vertex::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0); 3];
        for (corner, &index) in corners.iter_mut().zip(chunk) {
            let position = *positions.get(index as usize).ok_or_else(|| {
                LoadError::Decode(format!("index {} out of range ({} vertices)", index, positions.len()))
            })?;
            let normal = normals
                .as_ref()
                .and_then(|n| n.get(index as usize).copied())
                .unwrap_or_else(Vector3::zeros);
            *corner = Vertex { position, normal };
        }

        let mut triangle = Triangle::new(corners[0], corners[1], corners[2]);
        if normals.is_none() {
            if let Some(face) = triangle.calculate_normal() {
                for v in &mut triangle.vertices {
                    v.normal = face;
                }
            }
        }
        mesh.add_triangle(triangle);
    }

    Ok(mesh)
}

fn material_of(material: &gltf::Material) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, _a] = pbr.base_color_factor();
    Material {
        color: [r, g, b],
        metalness: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TRIANGLE: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];

    fn chunk(out: &mut Vec<u8>, kind: &[u8; 4], mut body: Vec<u8>, pad: u8) {
        while body.len() % 4 != 0 {
            body.push(pad);
        }
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(&body);
    }

    /// One-triangle GLB, optionally carrying an embedded image of `mime_type`
    fn triangle_glb(image: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut bin: Vec<u8> = TRIANGLE
            .iter()
            .flatten()
            .flat_map(|c| c.to_le_bytes())
            .collect();
        let mut views = vec![json!({"buffer": 0, "byteOffset": 0, "byteLength": 36})];
        let mut doc = json!({
            "asset": {"version": "2.0"},
            "scene": 0,
            "scenes": [{"nodes": [0]}],
            "nodes": [{"mesh": 0}],
            "meshes": [{"primitives": [{"attributes": {"POSITION": 0}}]}],
            "accessors": [{
                "bufferView": 0,
                "componentType": 5126,
                "count": 3,
                "type": "VEC3",
                "min": [0.0, 0.0, 0.0],
                "max": [1.0, 1.0, 0.0]
            }],
        });
        if let Some((mime_type, bytes)) = image {
            views.push(json!({"buffer": 0, "byteOffset": 36, "byteLength": bytes.len()}));
            bin.extend_from_slice(bytes);
            doc["images"] = json!([{"bufferView": 1, "mimeType": mime_type}]);
        }
        while bin.len() % 4 != 0 {
            bin.push(0);
        }
        doc["bufferViews"] = json!(views);
        doc["buffers"] = json!([{"byteLength": bin.len()}]);

        let mut chunks = Vec::new();
        chunk(&mut chunks, b"JSON", doc.to_string().into_bytes(), b' ');
        chunk(&mut chunks, b"BIN\0", bin, 0);

        let mut out = Vec::new();
        out.extend_from_slice(GLB_MAGIC);
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(12 + chunks.len() as u32).to_le_bytes());
        out.extend_from_slice(&chunks);
        out
    }

    #[test]
    fn test_untextured_triangle() {
        let parts = parse_glb(&triangle_glb(None)).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].mesh.triangles.len(), 1);
        let normal = parts[0].mesh.triangles[0].vertices[0].normal;
        assert!((normal - Vector3::z()).norm() < 1e-6);
    }

    #[test]
    fn test_undecodable_images_are_ignored() {
        let webp = b"RIFF\x04\x00\x00\x00WEBP";
        let parts = parse_glb(&triangle_glb(Some(("image/webp", webp)))).unwrap();
        assert_eq!(parts[0].mesh.triangles.len(), 1);

        // Bytes that are not a PNG at all, labelled as one
        let parts = parse_glb(&triangle_glb(Some(("image/png", b"not a png")))).unwrap();
        assert_eq!(parts[0].mesh.triangles.len(), 1);
    }

    #[test]
    fn test_magic_detection() {
        assert!(is_glb(b"glTF\x02\x00\x00\x00"));
        assert!(!is_glb(b"solid cube"));
    }

    #[test]
    fn test_garbage_with_magic_is_decode_error() {
        let data = b"glTF\x02\x00\x00\x00\x10\x00\x00\x00garbage!";
        assert!(matches!(parse_glb(data), Err(LoadError::Decode(_))));
    }
}
