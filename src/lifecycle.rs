//! Owns the scene, camera, renderer and frame loop of the shape viewer and
//! guarantees they are released in a fixed order.

use anyhow::{Context, Result};
use glam::Vec3;
use log::{debug, info};

use crate::catalog::{self, ShapeDescriptor};
use crate::host::{FrameHandle, FrameScheduler, ListenerId, RenderTarget};
use crate::live::LiveFlags;
use crate::render::{RenderBackend, SceneRenderer};
use crate::scene::{
    AmbientLight, AxesHelper, Color, DirectionalLight, GridHelper, Material, MaterialKind, Mesh,
    NodeId, PerspectiveCamera, SceneGraph, SceneNode,
};

pub const BACKGROUND: Color = Color::from_hex(0x0a0a0a);
pub const CAMERA_FOV: f32 = 75.0;
pub const CAMERA_NEAR: f32 = 0.1;
pub const CAMERA_FAR: f32 = 1000.0;
pub const CAMERA_POSITION: Vec3 = Vec3::new(3.0, 2.0, 4.0);

/// Radians added to the mesh rotation per frame while auto-rotate is on.
pub const ROTATION_STEP_X: f32 = 0.01;
pub const ROTATION_STEP_Y: f32 = 0.015;

/// Size used when the mount reports a zero dimension.
pub const FALLBACK_SIZE: (f32, f32) = (800.0, 600.0);

/// Replaces each zero or negative dimension with its fallback.
pub fn effective_size((width, height): (f32, f32)) -> (f32, f32) {
    let width = if width > 0.0 { width } else { FALLBACK_SIZE.0 };
    let height = if height > 0.0 { height } else { FALLBACK_SIZE.1 };
    (width, height)
}

/// Inputs a scene is built from. Two params are equal when they would build
/// the same mesh, which is what decides whether a rebuild is needed.
#[derive(Debug, Clone, Copy)]
pub struct SceneParams {
    pub descriptor: &'static ShapeDescriptor,
}

impl SceneParams {
    pub fn new(descriptor: &'static ShapeDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn for_key(key: &str) -> Self {
        Self::new(catalog::find(key))
    }

    pub fn key(&self) -> &'static str {
        self.descriptor.key
    }
}

impl PartialEq for SceneParams {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor.key == other.descriptor.key && self.descriptor.color == other.descriptor.color
    }
}

/// Everything created by one build of the scene.
#[derive(Debug)]
pub struct SceneHandle<R> {
    params: SceneParams,
    scene: SceneGraph,
    camera: PerspectiveCamera,
    renderer: Option<R>,
    mesh: NodeId,
    resize_listener: Option<ListenerId>,
    frame: Option<FrameHandle>,
}

impl<R: SceneRenderer> SceneHandle<R> {
    pub fn params(&self) -> SceneParams {
        self.params
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn renderer(&self) -> Option<&R> {
        self.renderer.as_ref()
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        self.scene.mesh(self.mesh)
    }

    /// Releases every resource of this build and hands back the disposed
    /// mesh. Each step tolerates the resource being absent, so calling this
    /// twice is harmless; the second call returns `None`.
    pub fn dispose<T: RenderTarget, S: FrameScheduler>(
        &mut self,
        target: &mut T,
        scheduler: &mut S,
    ) -> Option<Mesh> {
        if let Some(listener) = self.resize_listener.take() {
            target.remove_resize_listener(listener);
        }
        if let Some(frame) = self.frame.take() {
            scheduler.cancel_frame(frame);
        }
        if let Some(mut renderer) = self.renderer.take() {
            renderer.dispose();
            let canvas = renderer.canvas();
            if target.contains_canvas(canvas) {
                target.remove_canvas(canvas);
            } else {
                debug!("canvas {canvas:?} was already detached");
            }
        }
        if let Some(mesh) = self.scene.mesh_mut(self.mesh) {
            mesh.geometry.dispose();
            mesh.material.dispose();
        }
        self.scene.take_mesh_and_clear(self.mesh)
    }
}

#[derive(Debug)]
pub enum SceneState<R> {
    Uninitialized,
    Active(SceneHandle<R>),
}

/// Drives the Uninitialized/Active state machine over the host ports.
pub struct SceneManager<B: RenderBackend, T: RenderTarget, S: FrameScheduler> {
    backend: B,
    target: T,
    scheduler: S,
    flags: LiveFlags,
    state: SceneState<B::Renderer>,
    released: Option<Mesh>,
}

impl<B: RenderBackend, T: RenderTarget, S: FrameScheduler> SceneManager<B, T, S> {
    pub fn new(backend: B, target: T, scheduler: S, flags: LiveFlags) -> Self {
        Self {
            backend,
            target,
            scheduler,
            flags,
            state: SceneState::Uninitialized,
            released: None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SceneState::Active(_))
    }

    /// Activates the scene once the mount exists. Returns whether the manager
    /// is active afterwards; a missing mount leaves it uninitialized so a later
    /// call can retry.
    pub fn mount(&mut self, params: SceneParams) -> Result<bool> {
        if self.is_active() {
            self.reconcile(params)?;
            return Ok(true);
        }
        if !self.target.is_available() {
            debug!("mount element not available yet");
            return Ok(false);
        }
        self.build_scene(params)?;
        Ok(true)
    }

    /// Rebuilds only when `params` would produce a different mesh.
    pub fn reconcile(&mut self, params: SceneParams) -> Result<()> {
        match &self.state {
            SceneState::Active(handle) if handle.params == params => Ok(()),
            SceneState::Active(_) => self.build_scene(params),
            SceneState::Uninitialized => self.mount(params).map(|_| ()),
        }
    }

    /// Tears down any previous build and constructs a fresh scene.
    pub fn build_scene(&mut self, params: SceneParams) -> Result<()> {
        self.teardown();

        let mut scene = SceneGraph::new();
        scene.background = Some(BACKGROUND);

        let (width, height) = effective_size(self.target.bounding_size());
        let mut camera = PerspectiveCamera::new(CAMERA_FOV, width / height, CAMERA_NEAR, CAMERA_FAR);
        camera.position = CAMERA_POSITION;
        camera.look_at(Vec3::ZERO);

        let renderer = self
            .backend
            .create_renderer(width as u32, height as u32)
            .context("failed to create renderer")?;
        self.target.append_canvas(renderer.canvas());

        scene.add(SceneNode::AmbientLight(AmbientLight {
            color: Color::WHITE,
            intensity: 0.35,
        }));
        scene.add(SceneNode::DirectionalLight(DirectionalLight {
            color: Color::WHITE,
            intensity: 0.9,
            position: Vec3::new(5.0, 5.0, 5.0),
        }));
        scene.add(SceneNode::Axes(AxesHelper { size: 2.0 }));
        scene.add(SceneNode::Grid(GridHelper {
            size: 10.0,
            divisions: 10,
            center_color: Color::from_hex(0x444444),
            line_color: Color::from_hex(0x222222),
        }));

        let descriptor = params.descriptor;
        let material = Material::new(MaterialKind::Phong, descriptor.color, self.flags.wireframe.get());
        let mesh = scene.add(SceneNode::Mesh(Mesh::new(
            descriptor.name,
            descriptor.geometry(),
            material,
        )));

        let resize_listener = Some(self.target.add_resize_listener());
        let frame = Some(self.scheduler.request_frame());

        info!(
            "built scene for {} ({}x{})",
            descriptor.key, width as u32, height as u32
        );
        self.state = SceneState::Active(SceneHandle {
            params,
            scene,
            camera,
            renderer: Some(renderer),
            mesh,
            resize_listener,
            frame,
        });
        Ok(())
    }

    /// Runs one tick of the frame loop. Returns `false` without doing anything
    /// when `frame` is not the registration currently pending.
    pub fn on_frame(&mut self, frame: FrameHandle) -> Result<bool> {
        let SceneState::Active(handle) = &mut self.state else {
            return Ok(false);
        };
        if handle.frame != Some(frame) {
            return Ok(false);
        }
        handle.frame = Some(self.scheduler.request_frame());

        let auto_rotate = self.flags.auto_rotate.get();
        let wireframe = self.flags.wireframe.get();
        if let Some(mesh) = handle.scene.mesh_mut(handle.mesh) {
            if auto_rotate {
                mesh.transform.rotation.x += ROTATION_STEP_X;
                mesh.transform.rotation.y += ROTATION_STEP_Y;
            }
            mesh.material.set_wireframe(wireframe);
        }

        if let Some(renderer) = handle.renderer.as_mut() {
            renderer.render(&handle.scene, &handle.camera)?;
        }
        Ok(true)
    }

    /// Re-measures the mount and updates the camera and renderer to match.
    pub fn handle_resize(&mut self) {
        let SceneState::Active(handle) = &mut self.state else {
            return;
        };
        let (width, height) = effective_size(self.target.bounding_size());
        handle.camera.aspect = width / height;
        handle.camera.update_projection_matrix();
        if let Some(renderer) = handle.renderer.as_mut() {
            renderer.set_size(width as u32, height as u32);
        }
    }

    /// Flips the live material's wireframe flag without rebuilding.
    pub fn apply_wireframe(&mut self, wireframe: bool) {
        if let SceneState::Active(handle) = &mut self.state {
            if let Some(mesh) = handle.scene.mesh_mut(handle.mesh) {
                mesh.material.set_wireframe(wireframe);
            }
        }
    }

    /// Releases the active scene, if any, and returns to `Uninitialized`.
    pub fn teardown(&mut self) {
        if let SceneState::Active(mut handle) =
            std::mem::replace(&mut self.state, SceneState::Uninitialized)
        {
            self.released = handle.dispose(&mut self.target, &mut self.scheduler);
            info!("tore down scene for {}", handle.params.key());
        }
    }

    pub fn unmount(&mut self) {
        self.teardown();
    }

    pub fn handle(&self) -> Option<&SceneHandle<B::Renderer>> {
        match &self.state {
            SceneState::Active(handle) => Some(handle),
            SceneState::Uninitialized => None,
        }
    }

    pub fn params(&self) -> Option<SceneParams> {
        self.handle().map(SceneHandle::params)
    }

    pub fn mesh_rotation(&self) -> Option<Vec3> {
        self.handle()
            .and_then(SceneHandle::mesh)
            .map(|mesh| mesh.transform.rotation)
    }

    pub fn material_wireframe(&self) -> Option<bool> {
        self.handle()
            .and_then(SceneHandle::mesh)
            .map(|mesh| mesh.material.wireframe())
    }

    pub fn camera(&self) -> Option<&PerspectiveCamera> {
        self.handle().map(SceneHandle::camera)
    }

    pub fn scene(&self) -> Option<&SceneGraph> {
        self.handle().map(SceneHandle::scene)
    }

    /// The mesh released by the most recent teardown, kept after disposal.
    pub fn released_mesh(&self) -> Option<&Mesh> {
        self.released.as_ref()
    }
}

impl<B: RenderBackend, T: RenderTarget, S: FrameScheduler> Drop for SceneManager<B, T, S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{CallLog, HeadlessTarget, HostCall, ManualScheduler};
    use crate::render::{HeadlessBackend, RenderLog};

    type TestManager = SceneManager<HeadlessBackend, HeadlessTarget, ManualScheduler>;

    struct Fixture {
        manager: TestManager,
        target: HeadlessTarget,
        scheduler: ManualScheduler,
        log: RenderLog,
        flags: LiveFlags,
    }

    fn fixture(width: f32, height: f32) -> Fixture {
        let backend = HeadlessBackend::new();
        let log = backend.log();
        let target = HeadlessTarget::new(width, height);
        let scheduler = ManualScheduler::new();
        let flags = LiveFlags::new(false, true);
        let manager = SceneManager::new(backend, target.clone(), scheduler.clone(), flags.clone());
        Fixture {
            manager,
            target,
            scheduler,
            log,
            flags,
        }
    }

    fn run_frames(fx: &mut Fixture, frames: usize) -> usize {
        let mut ran = 0;
        for _ in 0..frames {
            let Some(handle) = fx.scheduler.fire() else {
                break;
            };
            if fx.manager.on_frame(handle).unwrap() {
                ran += 1;
            }
        }
        ran
    }

    #[test]
    fn build_attaches_exactly_one_canvas() {
        let mut fx = fixture(640.0, 480.0);
        assert!(fx.manager.mount(SceneParams::for_key("box")).unwrap());
        assert_eq!(fx.target.canvases().len(), 1);
        assert_eq!(fx.target.resize_listener_count(), 1);
        assert!(fx.scheduler.pending().is_some());

        fx.manager.reconcile(SceneParams::for_key("torus")).unwrap();
        let canvases = fx.target.canvases();
        assert_eq!(canvases.len(), 1);
        let renderer = fx.manager.handle().and_then(SceneHandle::renderer).unwrap();
        assert_eq!(canvases[0], renderer.canvas());
        assert_eq!(fx.target.resize_listener_count(), 1);

        let stats = fx.log.snapshot();
        assert_eq!(stats.renderers_created, 2);
        assert_eq!(stats.renderers_disposed, 1);
    }

    #[test]
    fn scene_contents_follow_descriptor() {
        let mut fx = fixture(640.0, 480.0);
        fx.manager.mount(SceneParams::for_key("cone")).unwrap();
        let scene = fx.manager.scene().unwrap();
        assert_eq!(scene.background, Some(BACKGROUND));
        assert_eq!(scene.ambient_light().unwrap().intensity, 0.35);
        assert_eq!(scene.directional_light().unwrap().intensity, 0.9);
        assert_eq!(scene.helper_lines().len(), 3 + 22);
        let mesh = fx.manager.handle().and_then(SceneHandle::mesh).unwrap();
        assert_eq!(mesh.material.color, catalog::find("cone").color);
        assert_eq!(mesh.material.kind, MaterialKind::Phong);

        let camera = fx.manager.camera().unwrap();
        assert_eq!(camera.position, CAMERA_POSITION);
        assert_eq!(camera.fov_degrees, 75.0);
        assert!((camera.aspect - 640.0 / 480.0).abs() < 1e-6);
        assert_eq!(fx.log.snapshot().size, (640, 480));
    }

    #[test]
    fn same_params_do_not_rebuild() {
        let mut fx = fixture(640.0, 480.0);
        fx.manager.mount(SceneParams::for_key("sphere")).unwrap();
        fx.manager.reconcile(SceneParams::for_key("sphere")).unwrap();
        fx.manager.mount(SceneParams::for_key("sphere")).unwrap();
        assert_eq!(fx.log.snapshot().renderers_created, 1);
    }

    #[test]
    fn rotation_accumulates_per_frame() {
        let mut fx = fixture(640.0, 480.0);
        fx.manager.mount(SceneParams::for_key("box")).unwrap();
        assert_eq!(run_frames(&mut fx, 100), 100);
        let rotation = fx.manager.mesh_rotation().unwrap();
        assert!((rotation.x - 100.0 * ROTATION_STEP_X).abs() < 1e-4);
        assert!((rotation.y - 100.0 * ROTATION_STEP_Y).abs() < 1e-4);
        assert_eq!(rotation.z, 0.0);
        assert_eq!(fx.log.snapshot().renders, 100);
    }

    #[test]
    fn paused_rotation_still_renders() {
        let mut fx = fixture(640.0, 480.0);
        fx.flags.auto_rotate.set(false);
        fx.manager.mount(SceneParams::for_key("box")).unwrap();
        run_frames(&mut fx, 5);
        assert_eq!(fx.manager.mesh_rotation(), Some(Vec3::ZERO));
        assert_eq!(fx.log.snapshot().renders, 5);

        fx.flags.auto_rotate.set(true);
        run_frames(&mut fx, 2);
        let rotation = fx.manager.mesh_rotation().unwrap();
        assert!((rotation.x - 0.02).abs() < 1e-6);
    }

    #[test]
    fn teardown_stops_the_loop() {
        let mut fx = fixture(640.0, 480.0);
        fx.manager.mount(SceneParams::for_key("box")).unwrap();
        run_frames(&mut fx, 3);
        let stale = fx.scheduler.pending().unwrap();

        fx.manager.unmount();
        assert!(!fx.manager.is_active());
        assert!(fx.target.canvases().is_empty());
        assert_eq!(fx.target.resize_listener_count(), 0);
        assert_eq!(fx.scheduler.canceled(), 1);

        assert_eq!(run_frames(&mut fx, 10), 0);
        assert!(!fx.manager.on_frame(stale).unwrap());
        let stats = fx.log.snapshot();
        assert_eq!(stats.renders, 3);
        assert_eq!(stats.renderers_disposed, 1);
    }

    #[test]
    fn teardown_is_idempotent_and_safe_before_mount() {
        let mut fx = fixture(640.0, 480.0);
        fx.manager.teardown();
        fx.manager.mount(SceneParams::for_key("box")).unwrap();
        fx.manager.teardown();
        fx.manager.teardown();
        assert_eq!(fx.log.snapshot().renderers_disposed, 1);
    }

    #[test]
    fn stale_frame_handle_is_ignored() {
        let mut fx = fixture(640.0, 480.0);
        fx.manager.mount(SceneParams::for_key("box")).unwrap();
        let first = fx.scheduler.fire().unwrap();
        assert!(fx.manager.on_frame(first).unwrap());
        assert!(!fx.manager.on_frame(first).unwrap());
        assert_eq!(fx.log.snapshot().renders, 1);
    }

    #[test]
    fn zero_area_mount_falls_back() {
        let mut fx = fixture(0.0, 0.0);
        fx.manager.mount(SceneParams::for_key("box")).unwrap();
        assert_eq!(fx.log.snapshot().size, (800, 600));

        fx.target.set_size(1024.0, 512.0);
        fx.manager.handle_resize();
        assert!((fx.manager.camera().unwrap().aspect - 2.0).abs() < 1e-6);
        assert_eq!(fx.log.snapshot().size, (1024, 512));

        fx.target.set_size(0.0, 0.0);
        fx.manager.handle_resize();
        let camera = fx.manager.camera().unwrap();
        assert!((camera.aspect - 800.0 / 600.0).abs() < 1e-6);
        assert_eq!(fx.log.snapshot().size, (800, 600));
    }

    #[test]
    fn fallback_applies_per_dimension() {
        assert_eq!(effective_size((0.0, 300.0)), (800.0, 300.0));
        assert_eq!(effective_size((500.0, 0.0)), (500.0, 600.0));
        assert_eq!(effective_size((500.0, 300.0)), (500.0, 300.0));
    }

    #[test]
    fn double_wireframe_toggle_restores_material() {
        let mut fx = fixture(640.0, 480.0);
        fx.manager.mount(SceneParams::for_key("box")).unwrap();
        let original = fx.manager.material_wireframe().unwrap();
        fx.manager.apply_wireframe(!original);
        assert_eq!(fx.manager.material_wireframe(), Some(!original));
        fx.manager.apply_wireframe(original);
        assert_eq!(fx.manager.material_wireframe(), Some(original));
        assert_eq!(fx.log.snapshot().renderers_created, 1);
    }

    #[test]
    fn frame_copies_live_wireframe_flag() {
        let mut fx = fixture(640.0, 480.0);
        fx.manager.mount(SceneParams::for_key("box")).unwrap();
        fx.flags.wireframe.set(true);
        run_frames(&mut fx, 1);
        assert_eq!(fx.manager.material_wireframe(), Some(true));
        assert_eq!(fx.log.snapshot().wireframe, Some(true));
    }

    #[test]
    fn missing_mount_stays_uninitialized_until_available() {
        let backend = HeadlessBackend::new();
        let target = HeadlessTarget::detached(640.0, 480.0);
        let mut manager = SceneManager::new(
            backend,
            target.clone(),
            ManualScheduler::new(),
            LiveFlags::default(),
        );
        assert!(!manager.mount(SceneParams::for_key("box")).unwrap());
        assert!(!manager.is_active());

        target.set_available(true);
        assert!(manager.mount(SceneParams::for_key("box")).unwrap());
        assert_eq!(target.canvases().len(), 1);
    }

    #[test]
    fn dropping_the_manager_tears_down() {
        let fx = fixture(640.0, 480.0);
        let Fixture {
            mut manager,
            target,
            log,
            ..
        } = fx;
        manager.mount(SceneParams::for_key("box")).unwrap();
        drop(manager);
        assert!(target.canvases().is_empty());
        assert_eq!(log.snapshot().renderers_disposed, 1);
    }

    #[test]
    fn params_compare_by_key_and_color() {
        assert_eq!(SceneParams::for_key("box"), SceneParams::for_key("unknown"));
        assert_ne!(SceneParams::for_key("box"), SceneParams::for_key("sphere"));
    }

    #[test]
    fn teardown_releases_in_order() {
        let calls = CallLog::new();
        let backend = HeadlessBackend::new().with_call_log(calls.clone());
        let target = HeadlessTarget::new(640.0, 480.0).with_call_log(calls.clone());
        let scheduler = ManualScheduler::new().with_call_log(calls.clone());
        let mut manager =
            SceneManager::new(backend, target.clone(), scheduler.clone(), LiveFlags::default());
        manager.mount(SceneParams::for_key("box")).unwrap();

        let canvas = manager.handle().and_then(SceneHandle::renderer).unwrap().canvas();
        let mut setup = calls.take();
        let listener = match setup[2] {
            HostCall::AddResizeListener(listener) => listener,
            other => panic!("unexpected call {other:?}"),
        };
        let first_frame = match setup.pop() {
            Some(HostCall::RequestFrame(frame)) => frame,
            other => panic!("unexpected call {other:?}"),
        };
        assert_eq!(
            setup,
            vec![
                HostCall::CreateRenderer(canvas),
                HostCall::AppendCanvas(canvas),
                HostCall::AddResizeListener(listener),
            ]
        );

        let fired = scheduler.fire().unwrap();
        assert_eq!(fired, first_frame);
        manager.on_frame(fired).unwrap();
        let pending = scheduler.pending().unwrap();
        calls.take();

        manager.teardown();
        assert_eq!(
            calls.take(),
            vec![
                HostCall::RemoveResizeListener(listener),
                HostCall::CancelFrame(pending),
                HostCall::DisposeRenderer(canvas),
                HostCall::RemoveCanvas(canvas),
            ]
        );

        manager.teardown();
        assert!(calls.calls().is_empty());
    }

    #[test]
    fn teardown_disposes_geometry_and_material() {
        let mut fx = fixture(640.0, 480.0);
        fx.manager.mount(SceneParams::for_key("box")).unwrap();
        assert!(fx.manager.released_mesh().is_none());

        fx.manager.reconcile(SceneParams::for_key("torus")).unwrap();
        let replaced = fx.manager.released_mesh().unwrap();
        assert_eq!(replaced.name, catalog::find("box").name);
        assert!(replaced.geometry.is_disposed());
        assert!(replaced.geometry.vertices().is_empty());
        assert!(replaced.material.is_disposed());
        let live = fx.manager.handle().and_then(SceneHandle::mesh).unwrap();
        assert!(!live.geometry.is_disposed());
        assert!(!live.material.is_disposed());

        fx.manager.unmount();
        let released = fx.manager.released_mesh().unwrap();
        assert_eq!(released.name, catalog::find("torus").name);
        assert!(released.geometry.is_disposed());
        assert!(released.material.is_disposed());
    }

    #[test]
    fn rebuild_detaches_the_previous_canvas() {
        let mut fx = fixture(640.0, 480.0);
        fx.manager.mount(SceneParams::for_key("box")).unwrap();
        let old = fx.manager.handle().and_then(SceneHandle::renderer).unwrap().canvas();
        fx.manager.reconcile(SceneParams::for_key("cone")).unwrap();
        let new = fx.manager.handle().and_then(SceneHandle::renderer).unwrap().canvas();
        assert_ne!(old, new);
        assert!(!fx.target.contains_canvas(old));
        assert!(fx.target.contains_canvas(new));
    }

    #[test]
    fn canvas_detached_elsewhere_is_skipped() {
        let mut fx = fixture(640.0, 480.0);
        fx.manager.mount(SceneParams::for_key("box")).unwrap();
        let canvas = fx.manager.handle().and_then(SceneHandle::renderer).unwrap().canvas();
        fx.target.clone().remove_canvas(canvas);
        fx.manager.unmount();
        assert!(fx.target.canvases().is_empty());
        assert_eq!(fx.log.snapshot().renderers_disposed, 1);
    }
}
