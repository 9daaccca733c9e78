/// `<canvas>` surface inside a host element
use scroll3d_core::{FrameBuffer, Surface, ViewerError, Viewport};
use wasm_bindgen::{Clamped, JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, Document, Element, HtmlCanvasElement, ImageData};

/// Set on a container while a viewer draws into it
pub const BOUND_ATTRIBUTE: &str = "data-scroll3d-bound";

const CANVAS_STYLE: &str = "display:block;width:100%;height:100%;pointer-events:none";

fn unavailable(what: impl std::fmt::Display) -> ViewerError {
    ViewerError::SurfaceUnavailable(what.to_string())
}

fn js_unavailable(e: JsValue) -> ViewerError {
    unavailable(format!("{:?}", e))
}

fn document() -> Option<Document> {
    web_sys::window()?.document()
}

/// Backing-store size for a CSS box at the given device pixel ratio, so the
/// canvas stays sharp on HiDPI screens. Unusable ratios count as 1.
pub fn backing_size(css_width: f64, css_height: f64, pixel_ratio: f64) -> Viewport {
    let ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
        pixel_ratio
    } else {
        1.0
    };
    let scale = |css: f64| (css.max(0.0) * ratio).round() as u32;
    Viewport::new(scale(css_width), scale(css_height))
}

/// Drawing size in device pixels for the element with id `container_id`.
/// Falls back to the window's inner size when the container has no layout.
pub fn measure(container_id: &str) -> Option<Viewport> {
    let window = web_sys::window()?;
    let container = window.document()?.get_element_by_id(container_id)?;
    let (mut width, mut height) = (
        f64::from(container.client_width()),
        f64::from(container.client_height()),
    );
    if width <= 0.0 || height <= 0.0 {
        width = window.inner_width().ok()?.as_f64()?;
        height = window.inner_height().ok()?.as_f64()?;
    }
    Some(backing_size(width, height, window.device_pixel_ratio()))
}

struct Binding {
    container: Element,
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
}

/// Transparent canvas appended to a container element on acquire and
/// removed on release. A container hosts at most one bound canvas.
pub struct CanvasSurface {
    container_id: String,
    binding: Option<Binding>,
}

impl CanvasSurface {
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            binding: None,
        }
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    fn bind(&self) -> Result<(Binding, Viewport), ViewerError> {
        let document = document().ok_or_else(|| unavailable("no document"))?;
        let container = document
            .get_element_by_id(&self.container_id)
            .ok_or_else(|| unavailable(format!("no element #{}", self.container_id)))?;
        if container.has_attribute(BOUND_ATTRIBUTE) {
            return Err(unavailable(format!(
                "#{} already hosts a viewer",
                self.container_id
            )));
        }

        let canvas: HtmlCanvasElement = document
            .create_element("canvas")
            .map_err(js_unavailable)?
            .dyn_into()
            .map_err(|_| unavailable("created element is not a canvas"))?;
        let context: CanvasRenderingContext2d = canvas
            .get_context("2d")
            .map_err(js_unavailable)?
            .ok_or_else(|| unavailable("2d context not supported"))?
            .dyn_into()
            .map_err(|_| unavailable("unexpected 2d context type"))?;

        let viewport = measure(&self.container_id).unwrap_or_else(|| Viewport::new(0, 0));
        canvas.set_width(viewport.width);
        canvas.set_height(viewport.height);
        canvas
            .set_attribute("style", CANVAS_STYLE)
            .map_err(js_unavailable)?;
        container.append_child(&canvas).map_err(js_unavailable)?;
        container
            .set_attribute(BOUND_ATTRIBUTE, "")
            .map_err(js_unavailable)?;

        Ok((
            Binding {
                container,
                canvas,
                context,
            },
            viewport,
        ))
    }
}

impl Surface for CanvasSurface {
    fn acquire(&mut self) -> Result<Viewport, ViewerError> {
        if self.binding.is_some() {
            return Err(unavailable("canvas surface already acquired"));
        }
        let (binding, viewport) = self.bind()?;
        self.binding = Some(binding);
        Ok(viewport)
    }

    fn resize(&mut self, viewport: Viewport) {
        if let Some(binding) = &self.binding {
            binding.canvas.set_width(viewport.width);
            binding.canvas.set_height(viewport.height);
        }
    }

    fn present(&mut self, frame: &FrameBuffer) -> Result<(), ViewerError> {
        let binding = self
            .binding
            .as_ref()
            .ok_or_else(|| unavailable("canvas surface released"))?;
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(());
        }

        let bytes = frame.as_rgba_bytes();
        let image = ImageData::new_with_u8_clamped_array_and_sh(
            Clamped(&bytes),
            frame.width() as u32,
            frame.height() as u32,
        )
        .map_err(js_unavailable)?;
        binding
            .context
            .put_image_data(&image, 0.0, 0.0)
            .map_err(js_unavailable)
    }

    fn release(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.canvas.remove();
            if let Err(e) = binding.container.remove_attribute(BOUND_ATTRIBUTE) {
                log::warn!("failed to unmark #{}: {:?}", self.container_id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backing_size_scales_by_pixel_ratio() {
        assert_eq!(backing_size(400.0, 300.0, 1.0), Viewport::new(400, 300));
        assert_eq!(backing_size(400.0, 300.0, 2.0), Viewport::new(800, 600));
        assert_eq!(backing_size(401.0, 301.0, 1.5), Viewport::new(602, 452));
    }

    #[test]
    fn test_backing_size_ignores_bad_ratio() {
        assert_eq!(backing_size(400.0, 300.0, 0.0), Viewport::new(400, 300));
        assert_eq!(backing_size(400.0, 300.0, f64::NAN), Viewport::new(400, 300));
        assert_eq!(backing_size(-5.0, 300.0, 2.0), Viewport::new(0, 600));
    }
}
