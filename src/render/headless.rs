use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;

use super::{RenderBackend, SceneRenderer};
use crate::host::{CallLog, CanvasId, HostCall};
use crate::scene::{PerspectiveCamera, SceneGraph};

/// Counters collected by headless renderers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderStats {
    pub renderers_created: u64,
    pub renderers_disposed: u64,
    pub renders: u64,
    pub size: (u32, u32),
    pub aspect: f32,
    pub draw_items: usize,
    pub triangles: usize,
    pub helper_lines: usize,
    pub wireframe: Option<bool>,
}

/// Shared handle on [`RenderStats`]; clones observe the same counters.
#[derive(Debug, Clone, Default)]
pub struct RenderLog {
    stats: Arc<Mutex<RenderStats>>,
}

impl RenderLog {
    pub fn snapshot(&self) -> RenderStats {
        self.stats.lock().clone()
    }
}

/// Backend that draws nothing and records what it was asked to do.
#[derive(Debug, Clone, Default)]
pub struct HeadlessBackend {
    log: RenderLog,
    calls: CallLog,
    next_canvas: u64,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderers created from here on record into `calls` as well.
    pub fn with_call_log(mut self, calls: CallLog) -> Self {
        self.calls = calls;
        self
    }

    pub fn log(&self) -> RenderLog {
        self.log.clone()
    }
}

impl RenderBackend for HeadlessBackend {
    type Renderer = HeadlessRenderer;

    fn create_renderer(&mut self, width: u32, height: u32) -> Result<HeadlessRenderer> {
        self.next_canvas += 1;
        {
            let mut stats = self.log.stats.lock();
            stats.renderers_created += 1;
            stats.size = (width, height);
        }
        let canvas = CanvasId(self.next_canvas);
        self.calls.record(HostCall::CreateRenderer(canvas));
        Ok(HeadlessRenderer {
            canvas,
            log: self.log.clone(),
            calls: self.calls.clone(),
            disposed: false,
        })
    }
}

#[derive(Debug)]
pub struct HeadlessRenderer {
    canvas: CanvasId,
    log: RenderLog,
    calls: CallLog,
    disposed: bool,
}

impl SceneRenderer for HeadlessRenderer {
    fn canvas(&self) -> CanvasId {
        self.canvas
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.log.stats.lock().size = (width, height);
    }

    fn render(&mut self, scene: &SceneGraph, camera: &PerspectiveCamera) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        let items = scene.draw_items();
        let mut stats = self.log.stats.lock();
        stats.renders += 1;
        stats.aspect = camera.aspect;
        stats.draw_items = items.len();
        stats.triangles = items.iter().map(|item| item.geometry.triangle_count()).sum();
        stats.helper_lines = scene.helper_lines().len();
        stats.wireframe = items.first().map(|item| item.material.wireframe());
        Ok(())
    }

    fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.calls.record(HostCall::DisposeRenderer(self.canvas));
            self.log.stats.lock().renderers_disposed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposed_renderer_stops_counting() {
        let mut backend = HeadlessBackend::new();
        let log = backend.log();
        let mut renderer = backend.create_renderer(320, 240).unwrap();
        let camera = PerspectiveCamera::new(75.0, 320.0 / 240.0, 0.1, 1000.0);
        renderer.render(&SceneGraph::new(), &camera).unwrap();
        renderer.dispose();
        renderer.dispose();
        renderer.render(&SceneGraph::new(), &camera).unwrap();
        let stats = log.snapshot();
        assert_eq!(stats.renders, 1);
        assert_eq!(stats.renderers_disposed, 1);
        assert_eq!(stats.size, (320, 240));
    }

    #[test]
    fn each_renderer_gets_its_own_canvas() {
        let mut backend = HeadlessBackend::new();
        let first = backend.create_renderer(1, 1).unwrap();
        let second = backend.create_renderer(1, 1).unwrap();
        assert_ne!(first.canvas(), second.canvas());
    }

    #[test]
    fn renderers_share_the_backend_call_log() {
        let calls = CallLog::new();
        let mut backend = HeadlessBackend::new().with_call_log(calls.clone());
        let mut renderer = backend.create_renderer(1, 1).unwrap();
        renderer.dispose();
        renderer.dispose();
        let canvas = renderer.canvas();
        assert_eq!(
            calls.calls(),
            vec![HostCall::CreateRenderer(canvas), HostCall::DisposeRenderer(canvas)]
        );
    }
}
