/// scroll3d core library - the scroll-synchronized asset viewer
///
/// Everything that does not touch a real window lives here: asset decoding,
/// the scene graph, the software render engine, scroll sampling, cancellable
/// loading and the viewer controller that ties them into sessions.

pub mod asset;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod glb;
pub mod loader;
pub mod projection;
pub mod raster;
pub mod scene;
pub mod scroll;
pub mod stl;
pub mod transform;

// Re-export commonly used types
pub use asset::AssetRef;
pub use config::ViewerConfig;
pub use controller::{FrameOutcome, LoadState, ViewerController, ViewerEvent, ViewerSession, ViewerState};
pub use engine::{FrameStats, RenderEngine, Surface};
pub use error::{ConfigError, LoadError, ViewerError};
pub use geometry::{Mesh, Triangle, Vertex};
pub use loader::{AssetLoader, AssetSource, LoadRequest, ProgressSink};
pub use projection::{Camera, ProjectionMode, Viewport};
pub use raster::FrameBuffer;
pub use scene::{Material, MaterialPolicy, ModelNode, SceneGraph};
pub use scroll::{ScrollMetrics, ScrollSignal, ScrollSource, VirtualScroll};
pub use transform::{ModelTransform, RotationState, Transform};
