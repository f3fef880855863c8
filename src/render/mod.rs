//! Renderers that draw a [`SceneGraph`] from a [`PerspectiveCamera`].
//!
//! Every renderer follows the same lifecycle: created at a pixel size by a
//! [`RenderBackend`], resized, asked to render once per frame, and finally
//! disposed. Disposal releases graphics resources; the scene manager detaches
//! the canvas from its mount afterwards.

use anyhow::Result;

use crate::host::CanvasId;
use crate::scene::{PerspectiveCamera, SceneGraph};

pub mod common;
pub mod headless;
#[cfg(not(target_arch = "wasm32"))]
pub mod native;
#[cfg(not(target_arch = "wasm32"))]
mod shared;
#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use common::{backing_size, linear_to_css, project_point, CameraParams, LightParams};
pub use headless::{HeadlessBackend, HeadlessRenderer, RenderLog, RenderStats};

pub trait SceneRenderer {
    fn canvas(&self) -> CanvasId;

    fn set_size(&mut self, width: u32, height: u32);

    fn render(&mut self, scene: &SceneGraph, camera: &PerspectiveCamera) -> Result<()>;

    /// Releases graphics resources. Rendering afterwards is a no-op.
    fn dispose(&mut self);
}

pub trait RenderBackend {
    type Renderer: SceneRenderer;

    fn create_renderer(&mut self, width: u32, height: u32) -> Result<Self::Renderer>;
}
