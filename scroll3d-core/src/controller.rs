/// Viewer controller: the session state machine
///
/// ```text
/// Inactive --activate--> Activating --engine ready--> Running --deactivate--> Deactivating --> Inactive
///                            |                           |
///                            +------> Error <------------+   (only deactivate leaves Error)
/// ```
use futures::task::LocalSpawn;
use std::collections::VecDeque;

use crate::asset::AssetRef;
use crate::config::ViewerConfig;
use crate::engine::{FrameStats, RenderEngine, Surface};
use crate::error::{LoadError, ViewerError};
use crate::frame::{FrameCounters, FrameLoop};
use crate::loader::{AssetLoader, AssetSource, LoadRequest};
use crate::projection::Camera;
use crate::scene::SceneGraph;
use crate::scroll::{ScrollSignal, ScrollSource};
use crate::transform::ModelTransform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerState {
    Inactive,
    Activating,
    Running,
    Deactivating,
    Error,
}

/// Progress of the session's single asset load
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    Failed(LoadError),
}

/// Notifications for the host page
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    AssetLoaded { asset: AssetRef, triangles: usize },
    /// Non-fatal: the viewer keeps rendering an empty scene
    AssetLoadFailed { asset: AssetRef, error: LoadError },
    /// The session hit an unrecoverable error and needs deactivation
    Fatal(String),
}

/// What one refresh tick did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    Drawn(FrameStats),
    Skipped,
    Idle,
}

/// Everything one activation owns. Dropped or disposed as a unit.
pub struct ViewerSession<S: Surface> {
    engine: RenderEngine<S>,
    scene: SceneGraph,
    frame_loop: FrameLoop,
    request: Option<LoadRequest>,
    load_state: LoadState,
    disposed: bool,
}

impl<S: Surface> ViewerSession<S> {
    fn new(engine: RenderEngine<S>, scene: SceneGraph) -> Self {
        Self {
            engine,
            scene,
            frame_loop: FrameLoop::new(),
            request: None,
            load_state: LoadState::Idle,
            disposed: false,
        }
    }

    pub fn engine(&self) -> &RenderEngine<S> {
        &self.engine
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn frame_counters(&self) -> FrameCounters {
        self.frame_loop.counters()
    }

    /// Load progress in [0, 1]; 1 once the request is settled
    pub fn load_progress(&self) -> f32 {
        match (&self.request, &self.load_state) {
            (Some(request), _) => request.progress(),
            (None, LoadState::Loaded) => 1.0,
            _ => 0.0,
        }
    }

    fn start_load(&mut self, request: LoadRequest) {
        self.request = Some(request);
        self.load_state = LoadState::Loading;
    }

    /// Move a finished load into the scene. The request is dropped once it
    /// has delivered, so the loader keeps no hold on the model.
    fn deliver_load(&mut self) -> Option<ViewerEvent> {
        let outcome = self.request.as_mut()?.poll()?;
        let request = self.request.take()?;
        let asset = request.asset().clone();

        match outcome {
            Ok(model) => {
                let triangles = model.triangle_count();
                self.scene.set_model(model);
                self.load_state = LoadState::Loaded;
                log::info!("loaded {} ({} triangles)", asset, triangles);
                Some(ViewerEvent::AssetLoaded { asset, triangles })
            }
            Err(error) => {
                self.load_state = LoadState::Failed(error.clone());
                log::warn!("failed to load {}: {}", asset, error);
                Some(ViewerEvent::AssetLoadFailed { asset, error })
            }
        }
    }

    /// Stop the loop, cancel the load, then release scene and engine in
    /// that order. Safe to call more than once. A load still pending settles
    /// as `Failed(Cancelled)` and raises no event.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.frame_loop.stop();
        if let Some(mut request) = self.request.take() {
            if request.cancel() {
                self.load_state = LoadState::Failed(LoadError::Cancelled);
            }
        }
        self.scene.dispose();
        self.engine.dispose();
        self.disposed = true;
        log::debug!("viewer session disposed");
    }
}

impl<S: Surface> Drop for ViewerSession<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Orchestrates engine, scene, loader and scroll signal across sessions
pub struct ViewerController<S: Surface, Src, Sc, Sp> {
    config: ViewerConfig,
    loader: AssetLoader<Src>,
    scroll: ScrollSignal<Sc>,
    spawner: Sp,
    state: ViewerState,
    session: Option<ViewerSession<S>>,
    events: VecDeque<ViewerEvent>,
}

impl<S, Src, Sc, Sp> ViewerController<S, Src, Sc, Sp>
where
    S: Surface,
    Src: AssetSource,
    Sc: ScrollSource,
    Sp: LocalSpawn,
{
    pub fn new(config: ViewerConfig, source: Src, scroll: Sc, spawner: Sp) -> Self {
        Self {
            config,
            loader: AssetLoader::new(source),
            scroll: ScrollSignal::new(scroll),
            spawner,
            state: ViewerState::Inactive,
            session: None,
            events: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn state(&self) -> ViewerState {
        self.state
    }

    pub fn session(&self) -> Option<&ViewerSession<S>> {
        self.session.as_ref()
    }

    pub fn load_state(&self) -> LoadState {
        self.session
            .as_ref()
            .map_or(LoadState::Idle, |s| s.load_state.clone())
    }

    pub fn scroll(&self) -> &ScrollSignal<Sc> {
        &self.scroll
    }

    /// Take all pending host notifications
    pub fn drain_events(&mut self) -> Vec<ViewerEvent> {
        self.events.drain(..).collect()
    }

    /// Build a fresh session on `surface`, start the load and the frame loop.
    pub fn activate(&mut self, surface: S) -> Result<(), ViewerError> {
        if self.state != ViewerState::Inactive {
            return Err(ViewerError::NotInactive(self.state));
        }
        self.state = ViewerState::Activating;

        let engine = match RenderEngine::create(surface) {
            Ok(engine) => engine,
            Err(e) => {
                log::error!("viewer activation failed: {}", e);
                self.state = ViewerState::Error;
                self.events.push_back(ViewerEvent::Fatal(e.to_string()));
                return Err(e);
            }
        };

        let scene = SceneGraph::new(Camera::from_config(&self.config.camera), self.config.lighting);
        let mut session = ViewerSession::new(engine, scene);

        let request = self.loader.load(
            &self.config.asset,
            self.config.material_policy(),
            &self.spawner,
        );
        session.start_load(request);
        session.frame_loop.start();

        let viewport = session.engine.viewport();
        log::info!(
            "viewer running on {}x{} surface, loading {}",
            viewport.width,
            viewport.height,
            self.config.asset
        );
        self.session = Some(session);
        self.state = ViewerState::Running;
        Ok(())
    }

    /// One display-refresh tick.
    pub fn on_frame(&mut self, timestamp_ms: f64) -> Result<FrameOutcome, ViewerError> {
        if self.state != ViewerState::Running {
            return Ok(FrameOutcome::Idle);
        }
        let Some(session) = self.session.as_mut() else {
            return Ok(FrameOutcome::Idle);
        };

        if let Some(event) = session.deliver_load() {
            self.events.push_back(event);
        }

        if !session.frame_loop.begin(timestamp_ms, session.engine.is_ready()) {
            return Ok(FrameOutcome::Skipped);
        }

        let progress = self.scroll.sample();
        session
            .scene
            .apply_transform(ModelTransform::from_progress(progress, &self.config.motion));

        match session.engine.draw_frame(&session.scene) {
            Ok(stats) => {
                session.frame_loop.finish();
                Ok(FrameOutcome::Drawn(stats))
            }
            Err(e) => {
                log::error!("frame failed: {}", e);
                session.frame_loop.stop();
                self.state = ViewerState::Error;
                self.events.push_back(ViewerEvent::Fatal(e.to_string()));
                Err(e)
            }
        }
    }

    /// Forward a viewport change to the engine while running.
    pub fn resize(&mut self, width: u32, height: u32) {
        match (self.state, self.session.as_mut()) {
            (ViewerState::Running, Some(session)) => session.engine.resize(width, height),
            _ => log::debug!("ignoring resize to {}x{} while {:?}", width, height, self.state),
        }
    }

    /// Tear down the current session from any state. Idempotent.
    pub fn deactivate(&mut self) {
        if self.state == ViewerState::Inactive && self.session.is_none() {
            return;
        }
        self.state = ViewerState::Deactivating;
        if let Some(mut session) = self.session.take() {
            session.dispose();
        }
        self.state = ViewerState::Inactive;
        log::info!("viewer deactivated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetRef;
    use crate::loader::ProgressSink;
    use crate::projection::Viewport;
    use crate::raster::FrameBuffer;
    use crate::scene::{Lighting, MaterialPolicy};
    use futures::executor::LocalPool;
    use futures::future::{self, LocalBoxFuture};
    use futures::FutureExt;

    struct NullSurface;

    impl Surface for NullSurface {
        fn acquire(&mut self) -> Result<Viewport, ViewerError> {
            Ok(Viewport::new(8, 8))
        }

        fn resize(&mut self, _viewport: Viewport) {}

        fn present(&mut self, _frame: &FrameBuffer) -> Result<(), ViewerError> {
            Ok(())
        }

        fn release(&mut self) {}
    }

    /// Never finishes fetching
    struct StalledSource;

    impl AssetSource for StalledSource {
        fn fetch(
            &self,
            _asset: &AssetRef,
            _progress: ProgressSink,
        ) -> LocalBoxFuture<'static, Result<Vec<u8>, LoadError>> {
            future::pending().boxed_local()
        }
    }

    /// Fails as soon as it is polled
    struct MissingSource;

    impl AssetSource for MissingSource {
        fn fetch(
            &self,
            _asset: &AssetRef,
            _progress: ProgressSink,
        ) -> LocalBoxFuture<'static, Result<Vec<u8>, LoadError>> {
            future::ready(Err(LoadError::Network("HTTP 404".into()))).boxed_local()
        }
    }

    fn loading_session<Src: AssetSource>(source: Src, pool: &LocalPool) -> ViewerSession<NullSurface> {
        let engine = RenderEngine::create(NullSurface).unwrap();
        let scene = SceneGraph::new(Camera::default(), Lighting::default());
        let mut session = ViewerSession::new(engine, scene);
        let request = AssetLoader::new(source).load(
            &AssetRef::new("/model.glb"),
            MaterialPolicy::AsAuthored,
            &pool.spawner(),
        );
        session.start_load(request);
        session
    }

    #[test]
    fn test_dispose_mid_load_settles_as_cancelled() {
        let mut pool = LocalPool::new();
        let mut session = loading_session(StalledSource, &pool);
        pool.run_until_stalled();
        assert_eq!(session.load_state(), &LoadState::Loading);

        session.dispose();
        assert_eq!(session.load_state(), &LoadState::Failed(LoadError::Cancelled));
        assert!(session.deliver_load().is_none());
        assert_eq!(session.load_progress(), 0.0);
    }

    #[test]
    fn test_dispose_after_failure_keeps_cause() {
        let mut pool = LocalPool::new();
        let mut session = loading_session(MissingSource, &pool);
        pool.run_until_stalled();

        let event = session.deliver_load();
        assert!(matches!(event, Some(ViewerEvent::AssetLoadFailed { .. })));

        session.dispose();
        assert_eq!(
            session.load_state(),
            &LoadState::Failed(LoadError::Network("HTTP 404".into()))
        );
    }
}
