/// Software rasterizer shared by every surface
use nalgebra::{Matrix4, Vector3};

use crate::geometry::{Triangle, Vertex};
use crate::projection::Viewport;
use crate::scene::{Lighting, Material};

/// RGBA8 color buffer with a matching depth buffer
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    depth: Vec<f32>,
    pixels: Vec<[u8; 4]>,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            depth: vec![f32::INFINITY; size],
            pixels: vec![[0, 0, 0, 0]; size],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        if width == self.width && height == self.height {
            return;
        }
        *self = Self::new(width, height);
    }

    /// Reset to fully transparent, infinitely far pixels
    pub fn clear(&mut self) {
        self.depth.fill(f32::INFINITY);
        self.pixels.fill([0, 0, 0, 0]);
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        self.pixels[y * self.width + x]
    }

    /// Overwrite one pixel, bypassing the depth test
    pub fn put_pixel(&mut self, x: usize, y: usize, rgba: [u8; 4]) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = rgba;
        }
    }

    /// Row-major RGBA pixels
    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.pixels
    }

    /// Flat RGBA bytes, as expected by canvas image data
    pub fn as_rgba_bytes(&self) -> Vec<u8> {
        self.pixels.iter().flatten().copied().collect()
    }

    pub fn covered_pixels(&self) -> usize {
        self.pixels.iter().filter(|p| p[3] != 0).count()
    }
}

/// Per-draw state: transforms and lights resolved once per mesh part
pub struct DrawContext<'a> {
    pub mvp: Matrix4<f32>,
    pub model: Matrix4<f32>,
    pub viewport: Viewport,
    pub lighting: &'a Lighting,
    pub view_dir: Vector3<f32>,
}

/// Rasterize one triangle; returns whether any pixel was written.
pub fn draw_triangle(
    target: &mut FrameBuffer,
    ctx: &DrawContext<'_>,
    triangle: &Triangle,
    material: &Material,
) -> bool {
    let mut screen = [(0.0f32, 0.0f32, 0.0f32); 3];
    for (slot, vertex) in screen.iter_mut().zip(&triangle.vertices) {
        match ctx.viewport.project(&ctx.mvp, &vertex.position) {
            Some(p) => *slot = p,
            None => return false, // behind the camera
        }
    }

    let world = Triangle::new(
        transformed(&ctx.model, &triangle.vertices[0]),
        transformed(&ctx.model, &triangle.vertices[1]),
        transformed(&ctx.model, &triangle.vertices[2]),
    );
    let Some(normal) = world.calculate_normal() else {
        return false;
    };

    let color = shade(normal, material, ctx);
    rasterize(target, &screen, color)
}

fn transformed(model: &Matrix4<f32>, vertex: &Vertex) -> Vertex {
    Vertex {
        position: model.transform_point(&vertex.position),
        normal: vertex.normal,
    }
}

/// Lambert diffuse plus a Blinn-Phong highlight, both sides lit
fn shade(normal: Vector3<f32>, material: &Material, ctx: &DrawContext<'_>) -> [u8; 4] {
    let normal = if normal.dot(&ctx.view_dir) < 0.0 { -normal } else { normal };
    let ambient = &ctx.lighting.ambient;
    let directional = &ctx.lighting.directional;
    let light_dir = directional.direction();

    let diffuse = normal.dot(&light_dir).max(0.0);
    let half = (light_dir + ctx.view_dir).normalize();
    let shininess = 2.0 + (1.0 - material.roughness.clamp(0.0, 1.0)) * 62.0;
    let specular = normal.dot(&half).max(0.0).powf(shininess) * (0.04 + 0.96 * material.metalness.clamp(0.0, 1.0));
    let diffuse_weight = 1.0 - 0.5 * material.metalness.clamp(0.0, 1.0);

    let mut out = [0u8, 0, 0, 255];
    for c in 0..3 {
        let lit = material.color[c]
            * (ambient.intensity * ambient.color[c]
                + diffuse_weight * directional.intensity * diffuse * directional.color[c])
            + specular * directional.intensity * directional.color[c];
        out[c] = (lit.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
    out
}

fn rasterize(target: &mut FrameBuffer, coords: &[(f32, f32, f32); 3], color: [u8; 4]) -> bool {
    let (v0, v1, v2) = (coords[0], coords[1], coords[2]);

    // Bounding box
    let min_x = v0.0.min(v1.0).min(v2.0).floor() as i64;
    let max_x = v0.0.max(v1.0).max(v2.0).ceil() as i64;
    let min_y = v0.1.min(v1.1).min(v2.1).floor() as i64;
    let max_y = v0.1.max(v1.1).max(v2.1).ceil() as i64;

    // Clip to screen bounds
    let min_x = min_x.max(0);
    let max_x = max_x.min(target.width as i64 - 1);
    let min_y = min_y.max(0);
    let max_y = max_y.min(target.height as i64 - 1);

    let mut wrote = false;
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let px = x as f32 + 0.5;
            let py = y as f32 + 0.5;

            let Some((w0, w1, w2)) = barycentric((v0.0, v0.1), (v1.0, v1.1), (v2.0, v2.1), (px, py)) else {
                continue;
            };
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            let depth = w0 * v0.2 + w1 * v1.2 + w2 * v2.2;
            if !(-1.0..=1.0).contains(&depth) {
                continue; // outside the near/far planes
            }

            let idx = y as usize * target.width + x as usize;
            if depth < target.depth[idx] {
                target.depth[idx] = depth;
                target.put_pixel(x as usize, y as usize, color);
                wrote = true;
            }
        }
    }
    wrote
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}
