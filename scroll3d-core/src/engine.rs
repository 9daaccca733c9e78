/// Render engine: owns the drawing surface, viewport and projection aspect
use crate::error::ViewerError;
use crate::projection::Viewport;
use crate::raster::{draw_triangle, DrawContext, FrameBuffer};
use crate::scene::SceneGraph;
use crate::transform::Transform;

/// A drawing target the engine can bind to and present frames on.
///
/// Implemented by the hosts: a canvas in the browser, the terminal, and
/// recording surfaces in tests.
pub trait Surface {
    /// Bind the surface exclusively and report its current size.
    fn acquire(&mut self) -> Result<Viewport, ViewerError>;

    /// Match the backing store to a new viewport.
    fn resize(&mut self, viewport: Viewport);

    /// Submit one finished frame.
    fn present(&mut self, frame: &FrameBuffer) -> Result<(), ViewerError>;

    /// Drop every binding taken in `acquire`.
    fn release(&mut self);

    /// Whether the previous submission has been consumed.
    fn is_ready(&self) -> bool {
        true
    }
}

/// Summary of one drawn frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub viewport: Viewport,
    pub aspect: f32,
    pub triangles: usize,
    pub model_attached: bool,
}

pub struct RenderEngine<S: Surface> {
    surface: Option<S>,
    viewport: Viewport,
    aspect: f32,
    framebuffer: FrameBuffer,
    last_frame: Option<FrameStats>,
}

impl<S: Surface> RenderEngine<S> {
    /// Bind `surface`; fails with `SurfaceUnavailable` when it cannot be acquired.
    pub fn create(mut surface: S) -> Result<Self, ViewerError> {
        let viewport = surface.acquire()?;
        log::debug!("render engine bound to {}x{} surface", viewport.width, viewport.height);
        Ok(Self {
            surface: Some(surface),
            viewport,
            aspect: viewport.aspect(),
            framebuffer: FrameBuffer::new(viewport.width as usize, viewport.height as usize),
            last_frame: None,
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Aspect ratio used by the camera projection
    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.framebuffer
    }

    pub fn last_frame(&self) -> Option<FrameStats> {
        self.last_frame
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn is_disposed(&self) -> bool {
        self.surface.is_none()
    }

    pub fn is_ready(&self) -> bool {
        self.surface.as_ref().map_or(false, |s| s.is_ready())
    }

    /// Update viewport, framebuffer, surface and aspect together.
    pub fn resize(&mut self, width: u32, height: u32) {
        let Some(surface) = self.surface.as_mut() else {
            log::debug!("ignoring resize on disposed engine");
            return;
        };
        let viewport = Viewport::new(width, height);
        if viewport == self.viewport {
            return;
        }

        self.viewport = viewport;
        self.aspect = viewport.aspect();
        self.framebuffer.resize(width as usize, height as usize);
        surface.resize(viewport);
        log::debug!("resized to {}x{} (aspect {:.3})", width, height, self.aspect);
    }

    /// Render the scene once and present it. Never mutates the scene.
    pub fn draw_frame(&mut self, scene: &SceneGraph) -> Result<FrameStats, ViewerError> {
        let surface = self.surface.as_mut().ok_or(ViewerError::EngineDisposed)?;
        debug_assert_eq!(self.aspect, self.viewport.aspect());

        let mut stats = FrameStats {
            viewport: self.viewport,
            aspect: self.aspect,
            triangles: 0,
            model_attached: scene.model().is_some(),
        };

        if self.viewport.is_empty() {
            self.last_frame = Some(stats);
            return Ok(stats);
        }

        self.framebuffer.clear();
        if let (Some(camera), Some(lighting), Some(model)) =
            (scene.camera(), scene.lighting(), scene.model())
        {
            let view = camera.view_matrix();
            let projection = camera.projection_matrix(self.aspect);
            let model_matrix = model.model_matrix();
            let view_dir = (camera.position - camera.target)
                .try_normalize(1e-6)
                .unwrap_or_else(nalgebra::Vector3::z);

            let ctx = DrawContext {
                mvp: Transform::mvp_matrix(&model_matrix, &view, &projection),
                model: model_matrix,
                viewport: self.viewport,
                lighting,
                view_dir,
            };
            for part in &model.parts {
                for triangle in &part.mesh.triangles {
                    if draw_triangle(&mut self.framebuffer, &ctx, triangle, &part.material) {
                        stats.triangles += 1;
                    }
                }
            }
        }

        surface.present(&self.framebuffer)?;
        self.last_frame = Some(stats);
        Ok(stats)
    }

    /// Release the surface. Later calls are no-ops.
    pub fn dispose(&mut self) {
        if let Some(mut surface) = self.surface.take() {
            surface.release();
            log::debug!("render engine disposed");
        }
    }
}

impl<S: Surface> Drop for RenderEngine<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Mesh;
    use crate::projection::Camera;
    use crate::scene::{Lighting, Material, MeshPart, ModelNode};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        presents: Vec<(usize, usize)>,
        releases: usize,
    }

    struct TestSurface {
        size: Viewport,
        log: Rc<RefCell<Log>>,
        fail_acquire: bool,
    }

    impl Surface for TestSurface {
        fn acquire(&mut self) -> Result<Viewport, ViewerError> {
            if self.fail_acquire {
                return Err(ViewerError::SurfaceUnavailable("no context".into()));
            }
            Ok(self.size)
        }

        fn resize(&mut self, viewport: Viewport) {
            self.size = viewport;
        }

        fn present(&mut self, frame: &FrameBuffer) -> Result<(), ViewerError> {
            self.log.borrow_mut().presents.push((frame.width(), frame.height()));
            Ok(())
        }

        fn release(&mut self) {
            self.log.borrow_mut().releases += 1;
        }
    }

    fn engine(width: u32, height: u32) -> (RenderEngine<TestSurface>, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let surface = TestSurface {
            size: Viewport::new(width, height),
            log: log.clone(),
            fail_acquire: false,
        };
        (RenderEngine::create(surface).unwrap(), log)
    }

    fn cube_scene() -> SceneGraph {
        let mut scene = SceneGraph::new(Camera::default(), Lighting::default());
        scene.set_model(ModelNode::new(
            None,
            vec![MeshPart {
                name: None,
                mesh: Mesh::cube(2.0),
                material: Material::debug_green(),
            }],
        ));
        scene
    }

    #[test]
    fn test_create_fails_without_surface() {
        let surface = TestSurface {
            size: Viewport::new(1, 1),
            log: Rc::default(),
            fail_acquire: true,
        };
        assert!(matches!(
            RenderEngine::create(surface),
            Err(ViewerError::SurfaceUnavailable(_))
        ));
    }

    #[test]
    fn test_draw_presents_once() {
        let (mut engine, log) = engine(64, 48);
        let stats = engine.draw_frame(&cube_scene()).unwrap();
        assert!(stats.model_attached);
        assert!(stats.triangles > 0);
        assert!(engine.framebuffer().covered_pixels() > 0);
        assert_eq!(log.borrow().presents, vec![(64, 48)]);
    }

    #[test]
    fn test_empty_scene_draws_nothing() {
        let (mut engine, _log) = engine(32, 32);
        let scene = SceneGraph::new(Camera::default(), Lighting::default());
        let stats = engine.draw_frame(&scene).unwrap();
        assert_eq!(stats.triangles, 0);
        assert_eq!(engine.framebuffer().covered_pixels(), 0);
    }

    #[test]
    fn test_resize_keeps_aspect_in_step() {
        let (mut engine, log) = engine(100, 100);
        engine.resize(800, 600);
        engine.resize(800, 600);
        let stats = engine.draw_frame(&cube_scene()).unwrap();
        assert_eq!(stats.viewport, Viewport::new(800, 600));
        assert!((stats.aspect - 800.0 / 600.0).abs() < 1e-6);
        assert_eq!(log.borrow().presents, vec![(800, 600)]);
    }

    #[test]
    fn test_zero_area_viewport_skips_present() {
        let (mut engine, log) = engine(10, 10);
        engine.resize(0, 0);
        let stats = engine.draw_frame(&cube_scene()).unwrap();
        assert_eq!(stats.triangles, 0);
        assert!(log.borrow().presents.is_empty());
    }

    #[test]
    fn test_dispose_is_idempotent_and_fails_fast() {
        let (mut engine, log) = engine(10, 10);
        engine.dispose();
        engine.dispose();
        assert_eq!(log.borrow().releases, 1);
        assert!(matches!(
            engine.draw_frame(&cube_scene()),
            Err(ViewerError::EngineDisposed)
        ));
        drop(engine);
        assert_eq!(log.borrow().releases, 1);
    }

    #[test]
    fn test_drop_releases_surface() {
        let (engine, log) = engine(10, 10);
        drop(engine);
        assert_eq!(log.borrow().releases, 1);
    }
}
