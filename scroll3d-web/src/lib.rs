/// scroll3d web - the viewer as a WASM module drawing into a page overlay
///
/// A host page creates one `ScrollViewer` per container element, calls
/// `activate()` when the overlay is shown and `deactivate()` when it goes
/// away. Everything the viewer registers on the page is removed again on
/// deactivation.
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use scroll3d_core::{AssetRef, ViewerConfig, ViewerController, ViewerEvent, ViewerState};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

pub mod canvas;
pub mod fetch;
pub mod scroll;
pub mod spawn;

pub use canvas::CanvasSurface;
pub use fetch::HttpAssetSource;
pub use scroll::WindowScroll;
pub use spawn::WasmSpawner;

type WebController = ViewerController<CanvasSurface, HttpAssetSource, WindowScroll, WasmSpawner>;
type FrameCallback = Closure<dyn FnMut(f64)>;

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Lowercase name of a viewer state, as reported to the page
pub fn state_name(state: ViewerState) -> &'static str {
    match state {
        ViewerState::Inactive => "inactive",
        ViewerState::Activating => "activating",
        ViewerState::Running => "running",
        ViewerState::Deactivating => "deactivating",
        ViewerState::Error => "error",
    }
}

/// Message passed to the page's warning callback, if the event warrants one
pub fn warning_message(event: &ViewerEvent) -> Option<String> {
    match event {
        ViewerEvent::AssetLoaded { .. } => None,
        ViewerEvent::AssetLoadFailed { asset, error } => {
            Some(format!("could not load {}: {}", asset, error))
        }
        ViewerEvent::Fatal(message) => Some(format!("viewer stopped: {}", message)),
    }
}

/// Whether a JSON config names its own asset
fn names_asset(json: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(json)
        .map(|value| value.get("asset").is_some())
        .unwrap_or(false)
}

struct Shared {
    controller: WebController,
    on_warning: Option<js_sys::Function>,
}

impl Shared {
    /// One animation frame; returns whether to schedule another.
    fn tick(&mut self, timestamp: f64) -> bool {
        let result = self.controller.on_frame(timestamp);
        self.flush_events();
        result.is_ok() && self.controller.state() == ViewerState::Running
    }

    fn resize(&mut self, container_id: &str) {
        if let Some(viewport) = canvas::measure(container_id) {
            self.controller.resize(viewport.width, viewport.height);
        }
    }

    fn flush_events(&mut self) {
        // Logged by the controller already; the page only hears about failures
        let warnings: Vec<String> = self
            .controller
            .drain_events()
            .iter()
            .filter_map(warning_message)
            .collect();
        if warnings.is_empty() {
            return;
        }
        if let Some(callback) = self.on_warning.clone() {
            warn_page(callback, warnings);
        }
    }
}

/// Deferred to a microtask: the page may call back into the viewer from it.
fn warn_page(callback: js_sys::Function, warnings: Vec<String>) {
    wasm_bindgen_futures::spawn_local(async move {
        for message in warnings {
            if let Err(e) = callback.call1(&JsValue::NULL, &JsValue::from_str(&message)) {
                log::warn!("warning callback threw: {:?}", e);
            }
        }
    });
}

fn request_frame(callback: &FrameCallback) -> Option<i32> {
    web_sys::window()?
        .request_animation_frame(callback.as_ref().unchecked_ref())
        .ok()
}

/// Scroll-synchronized viewer bound to one container element
#[wasm_bindgen]
pub struct ScrollViewer {
    container_id: String,
    shared: Rc<RefCell<Shared>>,
    frame: Rc<RefCell<Option<FrameCallback>>>,
    frame_handle: Rc<Cell<Option<i32>>>,
    on_resize: Option<Closure<dyn FnMut()>>,
}

impl ScrollViewer {
    fn build(container_id: String, config: ViewerConfig) -> Self {
        let controller =
            ViewerController::new(config, HttpAssetSource, WindowScroll, WasmSpawner);
        Self {
            container_id,
            shared: Rc::new(RefCell::new(Shared {
                controller,
                on_warning: None,
            })),
            frame: Rc::new(RefCell::new(None)),
            frame_handle: Rc::new(Cell::new(None)),
            on_resize: None,
        }
    }

    fn asset(&self) -> AssetRef {
        self.shared.borrow().controller.config().asset.clone()
    }

    fn start_frames(&mut self) {
        let shared = self.shared.clone();
        let frame = self.frame.clone();
        let handle = self.frame_handle.clone();
        let callback = Closure::wrap(Box::new(move |timestamp: f64| {
            handle.set(None);
            if !shared.borrow_mut().tick(timestamp) {
                return;
            }
            if let Some(callback) = frame.borrow().as_ref() {
                handle.set(request_frame(callback));
            }
        }) as Box<dyn FnMut(f64)>);

        self.frame_handle.set(request_frame(&callback));
        *self.frame.borrow_mut() = Some(callback);
    }

    fn stop_frames(&mut self) {
        if let (Some(handle), Some(window)) = (self.frame_handle.take(), web_sys::window()) {
            if let Err(e) = window.cancel_animation_frame(handle) {
                log::warn!("failed to cancel animation frame: {:?}", e);
            }
        }
        // Breaks the callback's reference to its own slot
        self.frame.borrow_mut().take();
    }

    fn listen_resize(&mut self) -> Result<(), JsValue> {
        let window = web_sys::window().ok_or_else(|| to_js("no window"))?;
        let shared = self.shared.clone();
        let container_id = self.container_id.clone();
        let callback = Closure::wrap(Box::new(move || {
            shared.borrow_mut().resize(&container_id);
        }) as Box<dyn FnMut()>);
        window.add_event_listener_with_callback("resize", callback.as_ref().unchecked_ref())?;
        self.on_resize = Some(callback);
        Ok(())
    }

    fn unlisten_resize(&mut self) {
        let (Some(callback), Some(window)) = (self.on_resize.take(), web_sys::window()) else {
            return;
        };
        if let Err(e) =
            window.remove_event_listener_with_callback("resize", callback.as_ref().unchecked_ref())
        {
            log::warn!("failed to remove resize listener: {:?}", e);
        }
    }
}

#[wasm_bindgen]
impl ScrollViewer {
    #[wasm_bindgen(constructor)]
    pub fn new(container_id: &str, asset_url: &str) -> ScrollViewer {
        Self::build(
            container_id.to_string(),
            ViewerConfig::default().with_asset(asset_url),
        )
    }

    /// Replace the configuration from JSON. The asset URL given to the
    /// constructor is kept unless the JSON names one, and so is the warning
    /// callback.
    pub fn with_config(self, json: &str) -> Result<ScrollViewer, JsValue> {
        let mut config = ViewerConfig::from_json_str(json).map_err(to_js)?;
        if !names_asset(json) {
            config.asset = self.asset();
        }
        let viewer = Self::build(self.container_id.clone(), config);
        viewer.shared.borrow_mut().on_warning = self.shared.borrow_mut().on_warning.take();
        Ok(viewer)
    }

    /// Called with a message string whenever loading fails or the viewer stops
    pub fn set_warning_callback(&mut self, callback: js_sys::Function) {
        self.shared.borrow_mut().on_warning = Some(callback);
    }

    /// Bind the container, start loading and start the frame loop.
    pub fn activate(&mut self) -> Result<(), JsValue> {
        let activated = {
            let mut shared = self.shared.borrow_mut();
            let result = shared
                .controller
                .activate(CanvasSurface::new(self.container_id.clone()));
            shared.flush_events();
            result
        };
        activated.map_err(to_js)?;

        if let Err(e) = self.listen_resize() {
            self.deactivate();
            return Err(e);
        }
        self.start_frames();
        Ok(())
    }

    /// Stop drawing, cancel any pending load and remove the canvas.
    /// Safe to call in any state.
    pub fn deactivate(&mut self) {
        self.stop_frames();
        self.unlisten_resize();
        self.shared.borrow_mut().controller.deactivate();
    }

    pub fn state(&self) -> String {
        state_name(self.shared.borrow().controller.state()).to_string()
    }

    /// Asset load progress in [0, 1]
    pub fn load_progress(&self) -> f32 {
        self.shared
            .borrow()
            .controller
            .session()
            .map_or(0.0, |session| session.load_progress())
    }

    pub fn asset_url(&self) -> String {
        self.asset().to_string()
    }
}

impl Drop for ScrollViewer {
    fn drop(&mut self) {
        self.deactivate();
    }
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        log::debug!("logger already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scroll3d_core::LoadError;

    #[test]
    fn test_state_names() {
        assert_eq!(state_name(ViewerState::Inactive), "inactive");
        assert_eq!(state_name(ViewerState::Running), "running");
        assert_eq!(state_name(ViewerState::Error), "error");
    }

    #[test]
    fn test_only_failures_warn() {
        let loaded = ViewerEvent::AssetLoaded {
            asset: AssetRef::new("/a.glb"),
            triangles: 12,
        };
        assert_eq!(warning_message(&loaded), None);

        let failed = ViewerEvent::AssetLoadFailed {
            asset: AssetRef::new("/a.glb"),
            error: LoadError::Network("HTTP 404 Not Found".into()),
        };
        assert_eq!(
            warning_message(&failed).as_deref(),
            Some("could not load /a.glb: network error: HTTP 404 Not Found")
        );
    }

    #[test]
    fn test_names_asset() {
        assert!(names_asset(r#"{"asset": "/b.stl"}"#));
        assert!(!names_asset(r#"{"motion": {"turns": 1.0}}"#));
        assert!(!names_asset("not json"));
    }

    #[test]
    fn test_with_config_keeps_asset_and_callback() {
        let mut viewer = ScrollViewer::new("overlay", "/a.glb");
        viewer.set_warning_callback(JsValue::NULL.unchecked_into());

        let viewer = viewer.with_config(r#"{"target_fps": 60}"#).unwrap();
        assert!(viewer.shared.borrow().on_warning.is_some());
        assert_eq!(viewer.asset_url(), "/a.glb");
        assert_eq!(viewer.shared.borrow().controller.config().target_fps, 60);

        let viewer = viewer.with_config(r#"{"asset": "/b.stl"}"#).unwrap();
        assert!(viewer.shared.borrow().on_warning.is_some());
        assert_eq!(viewer.asset_url(), "/b.stl");
    }
}
