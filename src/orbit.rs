//! The orbit screen: a static cube next to a loaded model, viewed through a
//! camera the user can orbit with inertial damping.

use std::f32::consts::{FRAC_PI_4, PI, TAU};
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use glam::Vec3;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::geometry::box_geometry;
use crate::host::{FrameHandle, FrameScheduler, ListenerId, RenderTarget};
use crate::lifecycle::effective_size;
use crate::obj::load_obj_from_str;
use crate::render::{RenderBackend, SceneRenderer};
use crate::scene::{
    AmbientLight, Color, DirectionalLight, Group, Material, MaterialKind, Mesh, NodeId,
    PerspectiveCamera, SceneGraph, SceneNode, Transform,
};

pub const CAMERA_POSITION: Vec3 = Vec3::new(10.0, 10.0, 10.0);
pub const CAMERA_FOV: f32 = 60.0;
pub const CUBE_COLOR: Color = Color::from_hex(0x44aa88);

/// Where the loaded model sits in the orbit scene.
pub const MODEL_PLACEMENT: Placement = Placement {
    position: Vec3::new(10.0, 0.0, 0.0),
    rotation: Vec3::new(0.0, FRAC_PI_4, 0.0),
    scale: Vec3::splat(1.2),
};

/// Position, rotation and per-axis scale applied to a loaded model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl From<Placement> for Transform {
    fn from(placement: Placement) -> Self {
        Transform {
            position: placement.position,
            rotation: placement.rotation,
            scale: placement.scale,
        }
    }
}

/// Source of the articulated model shown next to the cube.
pub trait ModelLoader {
    fn load(&self) -> Result<Group>;
}

/// Built-in humanoid assembled from boxes.
#[derive(Debug, Clone, Copy, Default)]
pub struct HumanoidLoader;

impl ModelLoader for HumanoidLoader {
    fn load(&self) -> Result<Group> {
        let body = Color::from_hex(0x8d99ae);
        let skin = Color::from_hex(0xedf2f4);
        let limbs = Color::from_hex(0x2b2d42);
        let part = |name: &str, size: Vec3, position: Vec3, color: Color| {
            Mesh::new(
                name,
                box_geometry(size.x, size.y, size.z),
                Material::new(MaterialKind::Standard, color, false),
            )
            .with_transform(Transform {
                position,
                ..Transform::default()
            })
        };
        let arm = Vec3::new(0.3, 1.2, 0.3);
        let leg = Vec3::new(0.4, 1.4, 0.4);
        Ok(Group {
            name: "humanoid".into(),
            transform: Transform::default(),
            children: vec![
                part("torso", Vec3::new(1.0, 1.4, 0.5), Vec3::new(0.0, 2.1, 0.0), body),
                part("head", Vec3::splat(0.6), Vec3::new(0.0, 3.2, 0.0), skin),
                part("left_arm", arm, Vec3::new(-0.7, 2.1, 0.0), limbs),
                part("right_arm", arm, Vec3::new(0.7, 2.1, 0.0), limbs),
                part("left_leg", leg, Vec3::new(-0.25, 0.7, 0.0), limbs),
                part("right_leg", leg, Vec3::new(0.25, 0.7, 0.0), limbs),
            ],
        })
    }
}

/// Single-mesh model read from a Wavefront OBJ file.
#[derive(Debug, Clone)]
pub struct ObjModelLoader {
    path: PathBuf,
    color: Color,
}

impl ObjModelLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            color: Color::from_hex(0x8d99ae),
        }
    }
}

impl ModelLoader for ObjModelLoader {
    fn load(&self) -> Result<Group> {
        let source = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read model {}", self.path.display()))?;
        let geometry = load_obj_from_str(&source)
            .with_context(|| format!("failed to parse model {}", self.path.display()))?;
        let name = self
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".into());
        Ok(Group {
            name: name.clone(),
            transform: Transform::default(),
            children: vec![Mesh::new(
                name,
                geometry,
                Material::new(MaterialKind::Standard, self.color, false),
            )],
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Spherical {
    radius: f32,
    theta: f32,
    phi: f32,
}

impl Spherical {
    fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius == 0.0 {
            return Self {
                radius,
                theta: 0.0,
                phi: 0.0,
            };
        }
        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    fn to_offset(self) -> Vec3 {
        let sin_phi = self.phi.sin();
        Vec3::new(
            self.radius * sin_phi * self.theta.sin(),
            self.radius * self.phi.cos(),
            self.radius * sin_phi * self.theta.cos(),
        )
    }
}

/// Orbit camera controls around `target`. Pointer drags rotate, the wheel
/// dollies. With damping on, motion decays over several updates.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitControls {
    pub target: Vec3,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            enable_damping: true,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.5,
            max_distance: 500.0,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
        }
    }
}

impl OrbitControls {
    const EPS: f32 = 1e-6;

    pub fn new(target: Vec3) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.delta_theta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.delta_phi -= angle;
    }

    /// Pointer movement in pixels over a viewport `height` pixels tall.
    pub fn handle_drag(&mut self, dx: f32, dy: f32, height: f32) {
        let height = height.max(1.0);
        self.rotate_left(TAU * dx / height * self.rotate_speed);
        self.rotate_up(TAU * dy / height * self.rotate_speed);
    }

    /// Scrolling up (negative delta) moves closer.
    pub fn handle_wheel(&mut self, delta_y: f32) {
        let zoom = 0.95_f32.powf(self.zoom_speed);
        if delta_y < 0.0 {
            self.scale *= zoom;
        } else if delta_y > 0.0 {
            self.scale /= zoom;
        }
    }

    /// Applies pending motion to `camera`. Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let mut spherical = Spherical::from_offset(camera.position - self.target);
        if self.enable_damping {
            spherical.theta += self.delta_theta * self.damping_factor;
            spherical.phi += self.delta_phi * self.damping_factor;
        } else {
            spherical.theta += self.delta_theta;
            spherical.phi += self.delta_phi;
        }
        spherical.phi = spherical
            .phi
            .clamp(self.min_polar_angle, self.max_polar_angle)
            .clamp(Self::EPS, PI - Self::EPS);
        spherical.radius = (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        let previous = camera.position;
        camera.position = self.target + spherical.to_offset();
        camera.look_at(self.target);

        if self.enable_damping {
            self.delta_theta *= 1.0 - self.damping_factor;
            self.delta_phi *= 1.0 - self.damping_factor;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
        }
        self.scale = 1.0;

        previous.distance_squared(camera.position) > Self::EPS
    }
}

/// Scene, camera and controls of the orbit screen.
#[derive(Debug)]
pub struct OrbitScene {
    pub scene: SceneGraph,
    pub camera: PerspectiveCamera,
    pub controls: OrbitControls,
    cube: NodeId,
    model: NodeId,
}

impl OrbitScene {
    /// Builds the scene around an already loaded model.
    pub fn assemble(mut model: Group, aspect: f32) -> Self {
        let mut scene = SceneGraph::new();
        scene.add(SceneNode::AmbientLight(AmbientLight {
            color: Color::WHITE,
            intensity: 0.5,
        }));
        scene.add(SceneNode::DirectionalLight(DirectionalLight {
            color: Color::WHITE,
            intensity: 1.0,
            position: Vec3::new(3.0, 3.0, 3.0),
        }));
        let cube = scene.add(SceneNode::Mesh(
            Mesh::new(
                "cube",
                box_geometry(1.0, 1.0, 1.0),
                Material::new(MaterialKind::Standard, CUBE_COLOR, false),
            )
            .with_transform(Transform {
                rotation: Vec3::new(0.5, 0.5, 0.0),
                ..Transform::default()
            }),
        ));

        model.transform = MODEL_PLACEMENT.into();
        info!("placed model {} with {} part(s)", model.name, model.children.len());
        let model = scene.add(SceneNode::Group(model));

        let mut camera = PerspectiveCamera::new(CAMERA_FOV, aspect, 0.1, 1000.0);
        camera.position = CAMERA_POSITION;
        camera.look_at(Vec3::ZERO);

        Self {
            scene,
            camera,
            controls: OrbitControls::new(Vec3::ZERO),
            cube,
            model,
        }
    }

    pub fn cube(&self) -> Option<&Mesh> {
        self.scene.mesh(self.cube)
    }

    pub fn model(&self) -> Option<&Group> {
        self.scene.group(self.model)
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.camera.aspect = aspect;
        self.camera.update_projection_matrix();
    }

    pub fn update(&mut self) -> bool {
        self.controls.update(&mut self.camera)
    }

    fn dispose(&mut self) {
        let mut disposed = 0;
        for mesh in self.scene.meshes_mut() {
            mesh.dispose();
            disposed += 1;
        }
        debug!("disposed {disposed} orbit mesh(es)");
        self.scene.clear();
    }
}

/// Hosts an [`OrbitScene`] on a render target with its own frame loop.
pub struct OrbitView<B: RenderBackend, T: RenderTarget, S: FrameScheduler> {
    backend: B,
    target: T,
    scheduler: S,
    orbit: OrbitScene,
    model: Group,
    renderer: Option<B::Renderer>,
    resize_listener: Option<ListenerId>,
    frame: Option<FrameHandle>,
}

impl<B: RenderBackend, T: RenderTarget, S: FrameScheduler> OrbitView<B, T, S> {
    pub fn new(backend: B, target: T, scheduler: S, loader: &dyn ModelLoader) -> Result<Self> {
        let model = loader.load().context("failed to load orbit model")?;
        let (width, height) = effective_size(target.bounding_size());
        let orbit = OrbitScene::assemble(model.clone(), width / height);
        Ok(Self {
            backend,
            target,
            scheduler,
            orbit,
            model,
            renderer: None,
            resize_listener: None,
            frame: None,
        })
    }

    pub fn mount(&mut self) -> Result<bool> {
        if self.renderer.is_some() {
            return Ok(true);
        }
        if !self.target.is_available() {
            return Ok(false);
        }
        let (width, height) = effective_size(self.target.bounding_size());
        if self.orbit.scene.is_empty() {
            // Torn down by an earlier unmount.
            self.orbit = OrbitScene::assemble(self.model.clone(), width / height);
        }
        self.orbit.set_aspect(width / height);
        let renderer = self
            .backend
            .create_renderer(width as u32, height as u32)
            .context("failed to create renderer")?;
        self.target.append_canvas(renderer.canvas());
        self.renderer = Some(renderer);
        self.resize_listener = Some(self.target.add_resize_listener());
        self.frame = Some(self.scheduler.request_frame());
        info!("orbit scene mounted ({}x{})", width as u32, height as u32);
        Ok(true)
    }

    pub fn on_frame(&mut self, frame: FrameHandle) -> Result<bool> {
        if self.frame != Some(frame) {
            return Ok(false);
        }
        self.frame = Some(self.scheduler.request_frame());
        self.orbit.update();
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.render(&self.orbit.scene, &self.orbit.camera)?;
        }
        Ok(true)
    }

    pub fn handle_resize(&mut self) {
        let (width, height) = effective_size(self.target.bounding_size());
        self.orbit.set_aspect(width / height);
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.set_size(width as u32, height as u32);
        }
    }

    pub fn pointer_drag(&mut self, dx: f32, dy: f32) {
        let (_, height) = effective_size(self.target.bounding_size());
        self.orbit.controls.handle_drag(dx, dy, height);
    }

    pub fn wheel(&mut self, delta_y: f32) {
        self.orbit.controls.handle_wheel(delta_y);
    }

    pub fn unmount(&mut self) {
        if let Some(listener) = self.resize_listener.take() {
            self.target.remove_resize_listener(listener);
        }
        if let Some(frame) = self.frame.take() {
            self.scheduler.cancel_frame(frame);
        }
        if let Some(mut renderer) = self.renderer.take() {
            renderer.dispose();
            let canvas = renderer.canvas();
            if self.target.contains_canvas(canvas) {
                self.target.remove_canvas(canvas);
            } else {
                debug!("canvas {canvas:?} was already detached");
            }
            self.orbit.dispose();
            info!("orbit scene torn down");
        }
    }

    pub fn orbit(&self) -> &OrbitScene {
        &self.orbit
    }
}

impl<B: RenderBackend, T: RenderTarget, S: FrameScheduler> Drop for OrbitView<B, T, S> {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HeadlessTarget, ManualScheduler};
    use crate::render::HeadlessBackend;

    fn compose() -> OrbitScene {
        OrbitScene::assemble(HumanoidLoader.load().unwrap(), 4.0 / 3.0)
    }

    #[test]
    fn composition_matches_layout() {
        let orbit = compose();
        assert_eq!(orbit.camera.position, CAMERA_POSITION);
        assert_eq!(orbit.camera.fov_degrees, 60.0);
        assert_eq!(orbit.scene.ambient_light().unwrap().intensity, 0.5);
        let sun = orbit.scene.directional_light().unwrap();
        assert_eq!(sun.intensity, 1.0);
        assert_eq!(sun.position, Vec3::new(3.0, 3.0, 3.0));

        let cube = orbit.cube().unwrap();
        assert_eq!(cube.material.color, CUBE_COLOR);
        assert_eq!(cube.material.kind, MaterialKind::Standard);
        assert_eq!(cube.transform.rotation, Vec3::new(0.5, 0.5, 0.0));

        let model = orbit.model().unwrap();
        assert_eq!(model.transform.position, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(model.transform.scale, Vec3::splat(1.2));
        assert!((model.transform.rotation.y - FRAC_PI_4).abs() < 1e-6);
    }

    #[test]
    fn humanoid_has_six_parts() {
        let model = HumanoidLoader.load().unwrap();
        let names: Vec<_> = model.children.iter().map(|part| part.name.as_str()).collect();
        assert_eq!(
            names,
            ["torso", "head", "left_arm", "right_arm", "left_leg", "right_leg"]
        );
    }

    #[test]
    fn obj_loader_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.obj");
        fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        let model = ObjModelLoader::new(&path).load().unwrap();
        assert_eq!(model.name, "tri");
        assert_eq!(model.children[0].geometry.triangle_count(), 1);

        let missing = ObjModelLoader::new(dir.path().join("missing.obj")).load();
        assert!(missing.is_err());
    }

    #[test]
    fn damping_decays_rotation() {
        let mut orbit = compose();
        let start = orbit.camera.position;
        orbit.controls.rotate_left(1.0);
        assert!(orbit.update());
        let first_step = orbit.camera.position.distance(start);
        let before = orbit.camera.position;
        orbit.update();
        let second_step = orbit.camera.position.distance(before);
        assert!(second_step < first_step);
        assert!((orbit.camera.position.length() - start.length()).abs() < 1e-3);

        for _ in 0..1000 {
            orbit.update();
        }
        assert!(!orbit.update());
    }

    #[test]
    fn wheel_dollies_towards_target() {
        let mut orbit = compose();
        let distance = orbit.camera.position.length();
        orbit.controls.handle_wheel(-100.0);
        orbit.update();
        assert!((orbit.camera.position.length() - distance * 0.95).abs() < 1e-3);
    }

    #[test]
    fn polar_angle_stays_off_the_poles() {
        let mut orbit = compose();
        orbit.controls.enable_damping = false;
        orbit.controls.rotate_up(10.0);
        orbit.update();
        let position = orbit.camera.position;
        assert!(position.is_finite());
        assert!(position.y > 0.0);
        assert!(glam::Vec2::new(position.x, position.z).length() > 0.0);

        orbit.controls.rotate_up(-1.0);
        orbit.update();
        let position = orbit.camera.position;
        assert!(position.y < position.length() * 0.9);
    }

    #[test]
    fn view_renders_and_tears_down() {
        let backend = HeadlessBackend::new();
        let log = backend.log();
        let target = HeadlessTarget::new(1280.0, 720.0);
        let scheduler = ManualScheduler::new();
        let mut view =
            OrbitView::new(backend, target.clone(), scheduler.clone(), &HumanoidLoader).unwrap();
        assert!(view.mount().unwrap());
        assert_eq!(target.canvases().len(), 1);

        for _ in 0..3 {
            let frame = scheduler.fire().unwrap();
            assert!(view.on_frame(frame).unwrap());
        }
        let stats = log.snapshot();
        assert_eq!(stats.renders, 3);
        assert_eq!(stats.draw_items, 7);

        view.unmount();
        assert!(target.canvases().is_empty());
        assert_eq!(scheduler.fire(), None);
        assert_eq!(log.snapshot().renderers_disposed, 1);
    }

    #[test]
    fn remount_after_unmount_restores_the_scene() {
        let backend = HeadlessBackend::new();
        let log = backend.log();
        let target = HeadlessTarget::new(800.0, 600.0);
        let scheduler = ManualScheduler::new();
        let mut view =
            OrbitView::new(backend, target.clone(), scheduler.clone(), &HumanoidLoader).unwrap();
        assert!(view.mount().unwrap());
        view.unmount();
        assert!(view.orbit().scene.is_empty());

        assert!(view.mount().unwrap());
        assert_eq!(view.orbit().model().map(|model| model.children.len()), Some(6));
        assert!(view.orbit().cube().is_some_and(|cube| !cube.geometry.is_disposed()));
        let frame = scheduler.fire().unwrap();
        assert!(view.on_frame(frame).unwrap());
        let stats = log.snapshot();
        assert_eq!(stats.renderers_created, 2);
        assert_eq!(stats.draw_items, 7);
        assert_eq!(target.canvases().len(), 1);
    }
}
