//! Interactive viewer for a catalog of primitive 3D shapes.
//!
//! The crate keeps the scene lifecycle, persisted preferences and orbit
//! camera logic independent of any windowing system. Hosts plug in through
//! the ports in [`host`] and a [`render::RenderBackend`]; the native binary
//! uses winit and wgpu, browser builds use the DOM and a 2D canvas, and the
//! headless implementations drive everything in tests.

#[cfg(not(target_arch = "wasm32"))]
pub mod app;
pub mod catalog;
pub mod geometry;
pub mod host;
pub mod input;
pub mod lifecycle;
pub mod live;
pub mod obj;
pub mod orbit;
pub mod preferences;
pub mod render;
pub mod scene;
pub mod viewer;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use catalog::{ShapeDescriptor, CATALOG, DEFAULT_SHAPE_KEY};
pub use geometry::{Geometry, Primitive};
pub use host::{FrameScheduler, HeadlessTarget, ManualScheduler, RenderTarget};
pub use input::{InputState, KeyCode, MouseButton, NamedKey};
pub use lifecycle::{SceneManager, SceneParams};
pub use obj::load_obj_from_str;
pub use orbit::{HumanoidLoader, ModelLoader, ObjModelLoader, OrbitControls, OrbitScene, OrbitView};
pub use preferences::{FileStore, MemoryStore, PreferenceStore, Preferences};
pub use render::{CameraParams, HeadlessBackend, LightParams, RenderBackend, SceneRenderer};
pub use scene::{Color, SceneGraph};
pub use viewer::{Viewer, ViewerCommand, ViewerState};
